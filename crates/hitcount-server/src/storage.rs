//! Async seam between request handlers and the counter store.
//!
//! SQLite calls block, so they run on tokio's blocking pool inside the caller's
//! span. If the caller's future is dropped (client went away), the statement
//! in flight is interrupted and its transaction rolls back. A transaction
//! that outlives the interrupt is rolled back instead of committed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hitcount_core::error::{HitError, Result};
use hitcount_core::store::{CounterConn, InterruptHandle};
use hitcount_core::{CounterDb, StoreOptions};
use tracing::{debug, Span};

/// Storage the hello handler talks to. Injected through `AppState`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `name` and return the committed value.
    async fn increment_and_get(&self, name: &str) -> Result<i64>;
}

/// `CounterStore` over the SQLite-backed `CounterDb`.
#[derive(Clone)]
pub struct SqliteCounterStore {
    db: CounterDb,
}

impl SqliteCounterStore {
    pub fn new(db: CounterDb) -> Self {
        Self { db }
    }

    /// Blocking; meant for startup.
    pub fn open(opts: &StoreOptions) -> Result<Self> {
        Ok(Self::new(CounterDb::open(opts)?))
    }

    pub fn db(&self) -> &CounterDb {
        &self.db
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment_and_get(&self, name: &str) -> Result<i64> {
        let slot = Arc::new(CancelSlot::default());
        let guard = InterruptOnDrop::new(Arc::clone(&slot));

        let db = self.db.clone();
        let name = name.to_owned();
        let span = Span::current();

        let joined = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            increment_blocking(&db, &name, &slot)
        })
        .await;

        guard.disarm();
        joined.map_err(|e| HitError::Internal(format!("storage task failed: {e}")))?
    }
}

fn increment_blocking(db: &CounterDb, name: &str, slot: &CancelSlot) -> Result<i64> {
    let mut conn: CounterConn = db.checkout()?;
    {
        let mut state = slot.lock();
        if state.cancelled {
            debug!(name, "caller gone before transaction start");
            return Err(HitError::Interrupted);
        }
        state.handle = Some(conn.interrupt_handle());
    }

    // A statement the interrupt missed (e.g. a lock wait) still stops here.
    let res = conn.increment_unless(name, || slot.lock().cancelled);

    // Cleared before the connection goes back to the pool.
    slot.lock().handle = None;
    res
}

// --------------------
// Cancellation
// --------------------
#[derive(Default)]
struct CancelSlot {
    state: Mutex<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: bool,
    handle: Option<InterruptHandle>,
}

impl CancelSlot {
    fn lock(&self) -> MutexGuard<'_, CancelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Interrupts the blocking call unless disarmed once its result arrived.
struct InterruptOnDrop {
    slot: Arc<CancelSlot>,
    armed: bool,
}

impl InterruptOnDrop {
    fn new(slot: Arc<CancelSlot>) -> Self {
        Self { slot, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.slot.lock();
        state.cancelled = true;
        if let Some(handle) = state.handle.take() {
            handle.interrupt();
            debug!("interrupted in-flight storage call");
        }
    }
}
