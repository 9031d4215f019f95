//! Database connection manager.
//!
//! Owns the single database session shared by every request and drives the
//! connection state machine:
//!
//! ```text
//! Unconfigured -> Connecting -> Connected
//!                     ^   \
//!                     |    -> Failed --(retry delay)--+
//!                     +-----------------------------+
//! Connected -> Connecting   (runtime connection error or failed ping)
//! ```
//!
//! A supervisor task runs the connect loop. Requests never connect on their
//! own: when an operation reports a broken connection the session is dropped
//! and the supervisor is woken to open a new one. While the session is idle
//! the supervisor pings it on the keepalive interval, so a server restart is
//! noticed without any traffic. There is no retry cap.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::instrument;

use super::schema::{self, SchemaStatus};
use super::{validate_table_name, ConnectionState, Driver, SampleRecord, Session, StoreError};

type SessionSlot = Option<Box<dyn Session>>;

struct Inner {
    driver: Option<Arc<dyn Driver>>,
    state: watch::Sender<ConnectionState>,
    /// The one session; requests serialize on this lock
    session: Mutex<SessionSlot>,
    /// Signalled when the session is discarded
    lost: Notify,
    retry_delay: Duration,
    /// Idle ping period; `None` leaves breakage to be found by requests
    keepalive: Option<Duration>,
}

/// Cloneable handle to the connection manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager for a configured store. Nothing connects until [`spawn`](Self::spawn).
    pub fn new(
        driver: Arc<dyn Driver>,
        retry_delay: Duration,
        keepalive: Option<Duration>,
    ) -> Self {
        Self::build(Some(driver), retry_delay, keepalive)
    }

    /// Create a manager for a process with no database binding.
    pub fn unconfigured() -> Self {
        Self::build(None, Duration::ZERO, None)
    }

    fn build(
        driver: Option<Arc<dyn Driver>>,
        retry_delay: Duration,
        keepalive: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unconfigured);
        Self {
            inner: Arc::new(Inner {
                driver,
                state,
                session: Mutex::new(None),
                lost: Notify::new(),
                retry_delay,
                keepalive: keepalive.filter(|period| !period.is_zero()),
            }),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.driver.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Spawn the supervisor task. Returns `None` when no store is configured.
    pub fn spawn(&self) -> Option<JoinHandle<Result<Infallible, StoreError>>> {
        let driver = self.inner.driver.clone()?;
        let manager = self.clone();
        Some(tokio::spawn(async move { manager.run(driver).await }))
    }

    /// Connect, set up the schema, wait for the session to break, repeat.
    ///
    /// Only returns on a failed schema existence check.
    #[instrument(name = "store.supervisor", skip_all)]
    async fn run(self, driver: Arc<dyn Driver>) -> Result<Infallible, StoreError> {
        let delay = self.inner.retry_delay;

        loop {
            self.set_state(ConnectionState::Connecting);

            let mut session = match driver.connect().await {
                Ok(session) => session,
                Err(e) => {
                    self.set_state(ConnectionState::Failed);
                    tracing::error!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Problem connecting to database, will try again"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            // Hold the slot while the schema is checked so requests wait for it
            let mut slot = self.inner.session.lock().await;
            self.set_state(ConnectionState::Connected);
            tracing::info!("Connected to database");

            if schema::ensure_sample_table(&mut *session).await? == SchemaStatus::Created {
                tracing::info!("Sample table created");
            }
            *slot = Some(session);
            drop(slot);

            self.wait_for_loss().await;
            tracing::info!("Reconnecting to database");
        }
    }

    /// Wait until the session is discarded, pinging it while it sits idle.
    async fn wait_for_loss(&self) {
        let Some(period) = self.inner.keepalive else {
            self.inner.lost.notified().await;
            return;
        };

        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.inner.lost.notified() => return,
                _ = ticks.tick() => self.keepalive().await,
            }
        }
    }

    /// Ping the session; a failure discards it, which wakes [`wait_for_loss`](Self::wait_for_loss).
    async fn keepalive(&self) {
        let mut slot = self.inner.session.lock().await;
        let Some(session) = slot.as_mut() else {
            return;
        };
        let result = session.ping().await;
        match result {
            Ok(()) => tracing::trace!("Keepalive ping succeeded"),
            Err(err) => self.discard(&mut slot, &err),
        }
    }

    /// Drop the session and wake the supervisor. No-op if already dropped.
    fn discard(&self, slot: &mut MutexGuard<'_, SessionSlot>, err: &StoreError) {
        if slot.take().is_some() {
            self.set_state(ConnectionState::Connecting);
            tracing::warn!(
                error = %err,
                retry_in_ms = self.inner.retry_delay.as_millis() as u64,
                "Issue with database, attempting to reconnect"
            );
            self.inner.lost.notify_one();
        }
    }

    /// Pass a result through, discarding the session on connection errors.
    fn observe<T>(
        &self,
        slot: &mut MutexGuard<'_, SessionSlot>,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if let Err(err) = &result {
            if err.is_connection_lost() {
                self.discard(slot, err);
            }
        }
        result
    }

    async fn lock(&self) -> Result<MutexGuard<'_, SessionSlot>, StoreError> {
        if !self.is_configured() {
            return Err(StoreError::NotConfigured);
        }
        Ok(self.inner.session.lock().await)
    }

    /// Liveness check. Any failure discards the session and triggers a reconnect.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut slot = self.lock().await?;
        let session = slot.as_mut().ok_or(StoreError::NotReady)?;
        let result = session.ping().await;
        if let Err(err) = &result {
            self.discard(&mut slot, err);
        }
        result
    }

    pub async fn insert_sample(&self, record: &SampleRecord) -> Result<(), StoreError> {
        let mut slot = self.lock().await?;
        let session = slot.as_mut().ok_or(StoreError::NotReady)?;
        let result = session.insert_sample(record).await;
        self.observe(&mut slot, result)
    }

    pub async fn read_table(&self, table: &str) -> Result<Vec<SampleRecord>, StoreError> {
        let mut slot = self.lock().await?;
        let table = validate_table_name(table)?;
        let session = slot.as_mut().ok_or(StoreError::NotReady)?;
        let result = session.read_table(table).await;
        self.observe(&mut slot, result)
    }
}
