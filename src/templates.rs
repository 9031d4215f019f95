use std::collections::HashMap;

use tera::Tera;
use url::Url;

use crate::error::AppError;

/// Templates compiled into the binary, so pages render regardless of working directory
const TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("../templates/base.html")),
    ("values.html", include_str!("../templates/values.html")),
    ("write.html", include_str!("../templates/write.html")),
    ("env.html", include_str!("../templates/env.html")),
    ("object_store.html", include_str!("../templates/object_store.html")),
];

/// Initialize the Tera template engine
pub fn init_templates() -> Result<Tera, AppError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.to_vec())?;

    tera.register_filter("redact_uri", redact_uri_filter);

    Ok(tera)
}

/// Shown in place of a connection URI that cannot be parsed
pub const REDACTED_URI: &str = "****";

/// Replace the password of a connection URI with `****`.
///
/// A URI that does not parse is replaced entirely.
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some(REDACTED_URI)).is_err() {
                return REDACTED_URI.to_string();
            }
            parsed.to_string()
        }
        Err(_) => REDACTED_URI.to_string(),
    }
}

fn redact_uri_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("redact_uri filter expects a string"))?;
    Ok(tera::Value::String(redact_uri(s)))
}
