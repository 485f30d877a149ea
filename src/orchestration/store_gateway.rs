use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, warn};

use crate::error::{BatchError, Result};
use crate::history::HistoryStore;

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides, exactly once, whether a queued store call runs or is abandoned
#[derive(Debug, Default)]
struct CallClaim(AtomicU8);

impl CallClaim {
    /// Claimed by the blocking thread. `false` means the caller gave up.
    fn start(&self) -> bool {
        self.0
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claimed by the caller on timeout. `false` means the call is running.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Async access to the [`HistoryStore`] for the runner and retry controller.
///
/// Store calls flush to disk under the store's lock, so they run on the
/// blocking pool. A call that has not started within `timeout` is abandoned
/// and reported as `StoreIo`; it will never touch the store. A call that has
/// started is awaited to its real outcome, so a caller never sees `Err` for
/// a change that landed.
#[derive(Debug, Clone)]
pub struct StoreGateway {
    store: Arc<HistoryStore>,
    timeout: Duration,
}

impl StoreGateway {
    pub fn new(store: Arc<HistoryStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&HistoryStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let claim = Arc::new(CallClaim::default());
        let worker_claim = Arc::clone(&claim);
        let mut handle = tokio::task::spawn_blocking(move || {
            if worker_claim.start() {
                Some(f(&store))
            } else {
                None
            }
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => self.finish(operation, joined),
            Err(_) if claim.abandon() => {
                error!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "History store call abandoned before it started"
                );
                Err(BatchError::store_io(
                    operation,
                    self.store.path(),
                    format!("no response within {:?}", self.timeout),
                ))
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "History store call overran its deadline, awaiting its outcome"
                );
                self.finish(operation, handle.await)
            }
        }
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        joined: std::result::Result<Option<Result<T>>, JoinError>,
    ) -> Result<T> {
        match joined {
            Ok(Some(result)) => result,
            Ok(None) => Err(BatchError::store_io(
                operation,
                self.store.path(),
                "store call abandoned",
            )),
            Err(join_error) => {
                error!(operation, error = %join_error, "History store call aborted");
                Err(BatchError::store_io(
                    operation,
                    self.store.path(),
                    format!("store call aborted: {join_error}"),
                ))
            }
        }
    }
}
