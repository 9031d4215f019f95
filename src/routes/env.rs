//! Process environment dump for debugging bindings.

use std::collections::BTreeMap;

use axum::{extract::State, response::Html};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

/// List every environment variable, sorted by name.
pub async fn env(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let vars: Vec<EnvVar> = std::env::vars()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(name, value)| EnvVar { name, value })
        .collect();

    let mut context = tera::Context::new();
    context.insert("vars", &vars);

    Ok(Html(state.tera.render("env.html", &context)?))
}
