//! Oplock and lease management.
//!
//! Legacy oplocks are tracked in-process per normalized `share/path`.
//! SMB2.1 leases persist through the unified lock store so POSIX-side
//! protocol heads observe them. State transitions for a given path or
//! lease key are linearizable under the manager mutex; break
//! notifications are captured under the lock and dispatched after it is
//! released.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::ftime::UnixTime;
use crate::smb2::{FileId, LeaseState, OplockLevel};
use crate::store::{LeaseRecord, LockQuery, LockRecord, LockStore, StoreResult};

/// Owner-id prefix under which lease records live in the lock store.
const LEASE_OWNER_PREFIX: &str = "smb:lease:";

/// Transport-side delivery of break notifications. Never invoked while
/// the manager mutex is held.
#[async_trait]
pub trait BreakNotifier: Send + Sync {
    async fn send_oplock_break(&self, session_id: u64, file_id: FileId, level: u8);

    async fn send_lease_break(
        &self,
        session_id: u64,
        key: [u8; 16],
        current: LeaseState,
        target: LeaseState,
        epoch: u16,
    );
}

/// Legacy oplock state for one path.
#[derive(Debug, Clone)]
struct OplockState {
    level: OplockLevel,
    holder_file_id: FileId,
    holder_session_id: u64,
    break_pending: bool,
    break_to: OplockLevel,
}

/// Where a lease key routes its notifications.
#[derive(Debug, Clone)]
struct LeaseHolder {
    session_id: u64,
    file: String,
}

/// Notification captured under the mutex, sent after release.
enum Pending {
    Oplock { session_id: u64, file_id: FileId, level: u8 },
    Lease { session_id: u64, key: [u8; 16], current: LeaseState, target: LeaseState, epoch: u16 },
}

pub struct OplockManager {
    notifier: Arc<dyn BreakNotifier>,
    lock_store: Arc<dyn LockStore>,
    config: EngineConfig,
    oplocks: Mutex<HashMap<String, OplockState>>,
    lease_sessions: Mutex<HashMap<[u8; 16], LeaseHolder>>,
}

pub fn lease_owner(key: &[u8; 16]) -> String {
    let mut owner = String::with_capacity(LEASE_OWNER_PREFIX.len() + 32);
    owner.push_str(LEASE_OWNER_PREFIX);
    for byte in key {
        owner.push_str(&format!("{:02x}", byte));
    }
    owner
}

impl OplockManager {
    pub fn new(
        notifier: Arc<dyn BreakNotifier>,
        lock_store: Arc<dyn LockStore>,
        config: EngineConfig,
    ) -> OplockManager {
        OplockManager {
            notifier,
            lock_store,
            config,
            oplocks: Mutex::new(HashMap::new()),
            lease_sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn dispatch(&self, pending: Vec<Pending>) {
        for item in pending {
            match item {
                Pending::Oplock { session_id, file_id, level } => {
                    self.notifier.send_oplock_break(session_id, file_id, level).await;
                }
                Pending::Lease { session_id, key, current, target, epoch } => {
                    self.notifier.send_lease_break(session_id, key, current, target, epoch).await;
                }
            }
        }
    }

    /// Grants or downgrades a legacy oplock for an open of `path`.
    /// Returns the level the response should carry; `None` while a break
    /// is in flight, the client retries after acknowledgment.
    pub async fn request_oplock(
        &self,
        path: &str,
        session_id: u64,
        file_id: FileId,
        requested: OplockLevel,
    ) -> OplockLevel {
        if requested == OplockLevel::None {
            return OplockLevel::None;
        }
        let mut pending = Vec::new();
        let granted = {
            let mut oplocks = self.oplocks.lock().await;
            match oplocks.get_mut(path) {
                None => {
                    oplocks.insert(
                        path.to_owned(),
                        OplockState {
                            level: requested,
                            holder_file_id: file_id,
                            holder_session_id: session_id,
                            break_pending: false,
                            break_to: OplockLevel::None,
                        },
                    );
                    requested
                }
                Some(state)
                    if state.holder_session_id == session_id
                        && state.holder_file_id == file_id =>
                {
                    state.level
                }
                Some(state) if state.level == OplockLevel::II && requested == OplockLevel::II => {
                    OplockLevel::II
                }
                Some(state) => {
                    let break_to = match (state.level, requested) {
                        // A level II holder yields entirely to an
                        // exclusive opener.
                        (OplockLevel::II, _) => OplockLevel::None,
                        (_, OplockLevel::Exclusive | OplockLevel::Batch) => OplockLevel::None,
                        _ => OplockLevel::II,
                    };
                    if !state.break_pending {
                        state.break_pending = true;
                        state.break_to = break_to;
                        pending.push(Pending::Oplock {
                            session_id: state.holder_session_id,
                            file_id: state.holder_file_id,
                            level: break_to as u8,
                        });
                    }
                    OplockLevel::None
                }
            }
        };
        self.dispatch(pending).await;
        granted
    }

    /// Handles an OPLOCK_BREAK acknowledgment. The new level must match
    /// the pending break target or lower, and only None/II are legal.
    pub async fn acknowledge_oplock(
        &self,
        file_id: FileId,
        new_level: OplockLevel,
    ) -> Result<OplockLevel, ()> {
        if !matches!(new_level, OplockLevel::None | OplockLevel::II) {
            return Err(());
        }
        let mut oplocks = self.oplocks.lock().await;
        let path = oplocks
            .iter()
            .find(|(_, state)| state.holder_file_id == file_id && state.break_pending)
            .map(|(path, _)| path.clone())
            .ok_or(())?;
        let state = oplocks.get_mut(&path).ok_or(())?;
        if new_level > state.break_to {
            return Err(());
        }
        if new_level == OplockLevel::None {
            oplocks.remove(&path);
        } else {
            state.level = new_level;
            state.break_pending = false;
        }
        Ok(new_level)
    }

    /// Drops oplock state held by a closing file.
    pub async fn release_file(&self, file_id: FileId) {
        self.oplocks.lock().await.retain(|_, state| state.holder_file_id != file_id);
    }

    /// Session teardown: drop its oplocks and delete its lease records.
    pub async fn release_session(&self, session_id: u64) {
        self.oplocks.lock().await.retain(|_, state| state.holder_session_id != session_id);
        let keys: Vec<([u8; 16], String)> = {
            let mut sessions = self.lease_sessions.lock().await;
            let keys: Vec<_> = sessions
                .iter()
                .filter(|(_, holder)| holder.session_id == session_id)
                .map(|(key, holder)| (*key, holder.file.clone()))
                .collect();
            for (key, _) in &keys {
                sessions.remove(key);
            }
            keys
        };
        for (key, file) in keys {
            if let Err(err) = self.lock_store.delete_lock(&lease_owner(&key), &file).await {
                warn!(?err, "lease record removal failed during session teardown");
            }
        }
    }

    /// Grants, upgrades, or defers a lease for an open of `file`.
    pub async fn request_lease(
        &self,
        file: &str,
        session_id: u64,
        key: [u8; 16],
        requested: LeaseState,
        is_directory: bool,
    ) -> StoreResult<LeaseState> {
        let requested = if is_directory && !requested.valid_for_directory() {
            // Directories may cache reads and handles only.
            LeaseState::READ_HANDLE
        } else {
            requested
        };
        if requested.is_none() {
            return Ok(LeaseState::NONE);
        }

        let mut pending = Vec::new();
        let granted = {
            let mut sessions = self.lease_sessions.lock().await;
            let records = self
                .lock_store
                .list_locks(&LockQuery { file: Some(file.to_owned()), is_lease: Some(true) })
                .await?;

            let mine = records.iter().find_map(|record| {
                record.lease.as_ref().filter(|lease| lease.key == key).cloned()
            });
            if let Some(lease) = mine {
                let merged = lease.state.union(requested);
                let epoch = lease.epoch.wrapping_add(1);
                self.persist(file, &key, merged, epoch, false, LeaseState::NONE, None).await?;
                sessions
                    .insert(key, LeaseHolder { session_id, file: file.to_owned() });
                merged
            } else {
                let conflicting: Vec<LeaseRecord> = records
                    .iter()
                    .filter_map(|record| record.lease.clone())
                    .filter(|lease| lease.key != key && states_conflict(requested, lease.state))
                    .collect();
                if conflicting.is_empty() {
                    self.persist(file, &key, requested, 1, false, LeaseState::NONE, None).await?;
                    sessions
                        .insert(key, LeaseHolder { session_id, file: file.to_owned() });
                    requested
                } else {
                    let target =
                        if requested.write() { LeaseState::READ } else { LeaseState::NONE };
                    for lease in conflicting {
                        if lease.breaking {
                            continue;
                        }
                        self.persist(
                            file,
                            &lease.key,
                            lease.state,
                            lease.epoch,
                            true,
                            target,
                            Some(UnixTime::now()),
                        )
                        .await?;
                        if let Some(holder) = sessions.get(&lease.key) {
                            pending.push(Pending::Lease {
                                session_id: holder.session_id,
                                key: lease.key,
                                current: lease.state,
                                target,
                                epoch: lease.epoch,
                            });
                        }
                    }
                    LeaseState::NONE
                }
            }
        };
        self.dispatch(pending).await;
        Ok(granted)
    }

    /// Lease break acknowledgment: the new state must not exceed the
    /// break target.
    pub async fn acknowledge_lease(
        &self,
        key: [u8; 16],
        new_state: LeaseState,
    ) -> StoreResult<Option<LeaseState>> {
        let mut sessions = self.lease_sessions.lock().await;
        let Some(holder) = sessions.get(&key).cloned() else {
            return Ok(None);
        };
        let records = self
            .lock_store
            .list_locks(&LockQuery { file: Some(holder.file.clone()), is_lease: Some(true) })
            .await?;
        let Some(lease) =
            records.iter().find_map(|r| r.lease.as_ref().filter(|l| l.key == key))
        else {
            return Ok(None);
        };
        if !lease.breaking || new_state.bits() & !lease.break_to.bits() != 0 {
            return Ok(None);
        }
        if new_state.is_none() {
            self.lock_store.delete_lock(&lease_owner(&key), &holder.file).await?;
            sessions.remove(&key);
        } else {
            self.persist(
                &holder.file,
                &key,
                new_state,
                lease.epoch,
                false,
                LeaseState::NONE,
                None,
            )
            .await?;
        }
        Ok(Some(new_state))
    }

    /// Cross-protocol hook: a non-SMB writer is about to touch `file`;
    /// every lease there breaks to None.
    pub async fn check_and_break_for_write(&self, file: &str) -> StoreResult<()> {
        self.break_matching(file, |_| true, LeaseState::NONE, None).await
    }

    /// Cross-protocol hook: a non-SMB reader only disturbs Write leases,
    /// which break down to Read|Handle.
    pub async fn check_and_break_for_read(&self, file: &str) -> StoreResult<()> {
        self.break_matching(file, |state| state.write(), LeaseState::READ_HANDLE, None).await
    }

    /// SMB-side I/O on a handle without the lease: break the other
    /// holders, leaving the writer's own key alone.
    pub async fn break_leases_for_io(
        &self,
        file: &str,
        write: bool,
        except: Option<[u8; 16]>,
    ) -> StoreResult<()> {
        if write {
            self.break_matching(file, |_| true, LeaseState::NONE, except).await
        } else {
            self.break_matching(file, |state| state.write(), LeaseState::READ_HANDLE, except)
                .await
        }
    }

    async fn break_matching(
        &self,
        file: &str,
        wants: impl Fn(LeaseState) -> bool,
        target: LeaseState,
        except: Option<[u8; 16]>,
    ) -> StoreResult<()> {
        let mut pending = Vec::new();
        {
            let sessions = self.lease_sessions.lock().await;
            let records = self
                .lock_store
                .list_locks(&LockQuery { file: Some(file.to_owned()), is_lease: Some(true) })
                .await?;
            for record in records {
                let Some(lease) = record.lease else { continue };
                if lease.breaking || !wants(lease.state) || Some(lease.key) == except {
                    continue;
                }
                self.persist(
                    file,
                    &lease.key,
                    lease.state,
                    lease.epoch,
                    true,
                    target,
                    Some(UnixTime::now()),
                )
                .await?;
                if let Some(holder) = sessions.get(&lease.key) {
                    pending.push(Pending::Lease {
                        session_id: holder.session_id,
                        key: lease.key,
                        current: lease.state,
                        target,
                        epoch: lease.epoch,
                    });
                }
            }
        }
        self.dispatch(pending).await;
        Ok(())
    }

    /// Scans for breaks that were never acknowledged and force-revokes
    /// them.
    pub async fn scan_expired_breaks(&self) -> StoreResult<()> {
        let timeout = self.config.lease_break_timeout().as_secs() as i64;
        let now = UnixTime::now().seconds;
        let records =
            self.lock_store.list_locks(&LockQuery { file: None, is_lease: Some(true) }).await?;
        for record in records {
            let Some(lease) = record.lease else { continue };
            let Some(started) = lease.break_started else { continue };
            if lease.breaking && now - started.seconds >= timeout {
                debug!(file = %record.file, "revoking lease after unacknowledged break");
                self.lock_store.delete_lock(&record.owner, &record.file).await?;
                self.on_lease_break_timeout(&lease.key).await;
            }
        }
        Ok(())
    }

    /// Forgets routing state for a force-revoked lease.
    async fn on_lease_break_timeout(&self, key: &[u8; 16]) {
        self.lease_sessions.lock().await.remove(key);
    }

    /// Background scanner driving
    /// [`scan_expired_breaks`](Self::scan_expired_breaks) on the
    /// configured period.
    pub fn spawn_scanner(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.lease_scan_period();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.scan_expired_breaks().await {
                    warn!(?err, "lease break scan failed");
                }
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        file: &str,
        key: &[u8; 16],
        state: LeaseState,
        epoch: u16,
        breaking: bool,
        break_to: LeaseState,
        break_started: Option<UnixTime>,
    ) -> StoreResult<()> {
        self.lock_store
            .put_lock(LockRecord {
                owner: lease_owner(key),
                file: file.to_owned(),
                is_lease: true,
                lease: Some(LeaseRecord {
                    key: *key,
                    state,
                    epoch,
                    breaking,
                    break_to,
                    break_started,
                }),
            })
            .await
    }
}

/// Two leases with different keys conflict when either wants Write while
/// the other caches anything at all.
fn states_conflict(a: LeaseState, b: LeaseState) -> bool {
    (a.write() && (b.read() || b.handle() || b.write()))
        || (b.write() && (a.read() || a.handle() || a.write()))
}
