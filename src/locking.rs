//! SMB2 byte-range lock semantics over the metadata store's POSIX lock
//! table.
//!
//! Elements of one LOCK request apply left to right. Locks acquired
//! earlier in the same request roll back when a later element fails;
//! unlocks are final either way, a documented non-atomic seam.

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::EngineConfig;
use crate::parser::smb2::lock::LockElement;
use crate::smb2::{
    LOCKFLAG_EXCLUSIVE, LOCKFLAG_FAIL_IMMEDIATELY, LOCKFLAG_SHARED, LOCKFLAG_UNLOCK,
};
use crate::status::NtStatus;
use crate::store::{FileLock, StoreError, StoreResult};

/// The two range-lock operations the bridge needs; the dispatcher
/// adapts the metadata service into this.
#[async_trait]
pub trait RangeLockBackend: Send + Sync {
    async fn lock(&self, lock: &FileLock) -> StoreResult<()>;

    async fn unlock(&self, lock: &FileLock) -> StoreResult<()>;
}

/// Validates flag combinations for every element up front.
fn validate(elements: &[LockElement]) -> bool {
    elements.iter().all(|element| {
        let shared = element.flags & LOCKFLAG_SHARED != 0;
        let exclusive = element.flags & LOCKFLAG_EXCLUSIVE != 0;
        let unlock = element.flags & LOCKFLAG_UNLOCK != 0;
        if unlock {
            !shared && !exclusive
        } else {
            shared != exclusive
        }
    })
}

/// Applies one LOCK request. Returns the wire status; SUCCESS only when
/// every element went through.
pub async fn apply(
    backend: &dyn RangeLockBackend,
    session_id: u64,
    elements: &[LockElement],
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> NtStatus {
    if !validate(elements) {
        return NtStatus::INVALID_PARAMETER;
    }

    let mut acquired: Vec<FileLock> = Vec::new();
    for element in elements {
        let lock = FileLock {
            session_id,
            offset: element.offset,
            length: element.length,
            exclusive: element.flags & LOCKFLAG_EXCLUSIVE != 0,
        };
        let result = if element.flags & LOCKFLAG_UNLOCK != 0 {
            backend.unlock(&lock).await
        } else {
            let outcome = if element.flags & LOCKFLAG_FAIL_IMMEDIATELY != 0 {
                backend.lock(&lock).await
            } else {
                lock_with_retry(backend, &lock, config, cancel).await
            };
            if outcome.is_ok() {
                acquired.push(lock.clone());
            }
            outcome
        };

        if let Err(err) = result {
            rollback(backend, &acquired).await;
            return err.status();
        }
    }
    NtStatus::SUCCESS
}

/// Blocking-lock retry loop: poll the backend on the configured cadence
/// until the deadline or cancellation.
async fn lock_with_retry(
    backend: &dyn RangeLockBackend,
    lock: &FileLock,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> StoreResult<()> {
    let deadline = Instant::now() + config.lock_wait_timeout();
    loop {
        match backend.lock(lock).await {
            Err(StoreError::Locked) => {}
            other => return other,
        }
        if Instant::now() >= deadline {
            return Err(StoreError::Locked);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            _ = sleep(config.lock_retry_interval()) => {}
        }
    }
}

/// Releases locks acquired earlier in a failed request, newest first.
async fn rollback(backend: &dyn RangeLockBackend, acquired: &[FileLock]) {
    for lock in acquired.iter().rev() {
        if let Err(err) = backend.unlock(lock).await {
            warn!(?err, offset = lock.offset, "rollback unlock failed");
        }
    }
}
