//! Session, tree-connection, and open-file tables.
//!
//! Tables take many concurrent readers and serialize writers per table.
//! Session and tree teardown grabs every table's write guard before
//! mutating anything, so a cascade is observed either not-at-all or in
//! full. Numeric identifiers are monotonic and never reused within a
//! process lifetime; file identifiers are random 128-bit values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use rand::RngCore;
use tokio::sync::{Mutex, RwLock};

use crate::auth::SharePermission;
use crate::ftime::UnixTime;
use crate::smb2::{FileId, OplockLevel, ShareKind};
use crate::store::{NodeHandle, UserRecord};

/// Authenticated peer state handed over by the transport.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u64,
    pub user: Option<UserRecord>,
    pub is_guest: bool,
    pub created: UnixTime,
}

/// A session's binding to one share.
#[derive(Debug, Clone)]
pub struct TreeConnection {
    pub tree_id: u32,
    pub session_id: u64,
    /// Normalized: lowercase, leading `/`.
    pub share_name: String,
    pub kind: ShareKind,
    pub permission: SharePermission,
}

/// Server-side state of one open file or directory.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub file_id: FileId,
    pub tree_id: u32,
    pub session_id: u64,
    pub share_name: String,
    /// Share-relative path, `/`-separated, no leading slash.
    pub path: String,
    /// Leaf name; empty only for the share root.
    pub file_name: String,
    /// Metadata handle of the parent directory; empty means this open
    /// is the share root itself.
    pub parent_handle: NodeHandle,
    pub metadata_handle: NodeHandle,
    pub content_id: Option<String>,
    /// Target of a backend symlink opened as a file; READ materializes
    /// it as an MFsymlink payload.
    pub symlink_target: Option<String>,
    pub is_directory: bool,
    pub is_pipe: bool,
    pub desired_access: u32,
    pub oplock_level: OplockLevel,
    pub lease_key: Option<[u8; 16]>,
    pub delete_pending: bool,
    pub enumeration_complete: bool,
    pub enumeration_index: usize,
}

/// Everything torn down by a session removal; the caller releases
/// oplocks, leases, and watchers outside the table locks.
pub struct RemovedSession {
    pub session: Arc<Session>,
    pub trees: Vec<Arc<TreeConnection>>,
    pub files: Vec<Arc<Mutex<OpenFile>>>,
}

/// Table slot keeping the owner ids readable without taking the
/// per-file mutex; both are immutable for the lifetime of the open.
struct FileSlot {
    session_id: u64,
    tree_id: u32,
    file: Arc<Mutex<OpenFile>>,
}

#[derive(Default)]
pub struct Handles {
    next_session_id: AtomicU64,
    next_tree_id: AtomicU32,
    sessions: RwLock<HashMap<u64, Arc<Session>>>,
    trees: RwLock<HashMap<u32, Arc<TreeConnection>>>,
    files: RwLock<HashMap<FileId, FileSlot>>,
}

impl Handles {
    pub fn new() -> Handles {
        Handles {
            next_session_id: AtomicU64::new(1),
            next_tree_id: AtomicU32::new(1),
            ..Handles::default()
        }
    }

    /// Fresh random file identifier; the all-zero id is reserved for
    /// FSCTL calls addressed to no file.
    pub fn new_file_id(&self) -> FileId {
        let mut id = [0u8; 16];
        loop {
            rand::thread_rng().fill_bytes(&mut id);
            if id != [0u8; 16] {
                return id;
            }
        }
    }

    pub async fn register_session(
        &self,
        user: Option<UserRecord>,
        is_guest: bool,
    ) -> Arc<Session> {
        let session = Arc::new(Session {
            session_id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            user,
            is_guest,
            created: UnixTime::now(),
        });
        self.sessions.write().await.insert(session.session_id, session.clone());
        session
    }

    pub async fn session(&self, session_id: u64) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn add_tree(
        &self,
        session_id: u64,
        share_name: String,
        kind: ShareKind,
        permission: SharePermission,
    ) -> Arc<TreeConnection> {
        let tree = Arc::new(TreeConnection {
            tree_id: self.next_tree_id.fetch_add(1, Ordering::Relaxed),
            session_id,
            share_name,
            kind,
            permission,
        });
        self.trees.write().await.insert(tree.tree_id, tree.clone());
        tree
    }

    /// Resolves a tree and checks it belongs to the session.
    pub async fn tree(&self, tree_id: u32, session_id: u64) -> Option<Arc<TreeConnection>> {
        let tree = self.trees.read().await.get(&tree_id).cloned()?;
        (tree.session_id == session_id).then_some(tree)
    }

    pub async fn insert_file(&self, file: OpenFile) -> Arc<Mutex<OpenFile>> {
        let file_id = file.file_id;
        let session_id = file.session_id;
        let tree_id = file.tree_id;
        let entry = Arc::new(Mutex::new(file));
        self.files
            .write()
            .await
            .insert(file_id, FileSlot { session_id, tree_id, file: entry.clone() });
        entry
    }

    pub async fn file(&self, file_id: &FileId) -> Option<Arc<Mutex<OpenFile>>> {
        self.files.read().await.get(file_id).map(|slot| slot.file.clone())
    }

    pub async fn remove_file(&self, file_id: &FileId) -> Option<Arc<Mutex<OpenFile>>> {
        self.files.write().await.remove(file_id).map(|slot| slot.file)
    }

    /// Removes a tree and all open files under it. Both write guards are
    /// held across the whole cascade.
    pub async fn remove_tree(
        &self,
        tree_id: u32,
        session_id: u64,
    ) -> Option<(Arc<TreeConnection>, Vec<Arc<Mutex<OpenFile>>>)> {
        let mut trees = self.trees.write().await;
        let mut files = self.files.write().await;
        let tree = trees.get(&tree_id).cloned()?;
        if tree.session_id != session_id {
            return None;
        }
        trees.remove(&tree_id);
        let removed = drain_files(&mut files, |slot| slot.tree_id == tree_id);
        Some((tree, removed))
    }

    /// Removes a session, cascading to its trees and open files under a
    /// single write epoch across all three tables.
    pub async fn remove_session(&self, session_id: u64) -> Option<RemovedSession> {
        let mut sessions = self.sessions.write().await;
        let mut trees = self.trees.write().await;
        let mut files = self.files.write().await;
        let session = sessions.remove(&session_id)?;
        let removed_trees: Vec<_> = {
            let ids: Vec<u32> = trees
                .values()
                .filter(|tree| tree.session_id == session_id)
                .map(|tree| tree.tree_id)
                .collect();
            ids.iter().filter_map(|id| trees.remove(id)).collect()
        };
        let removed_files = drain_files(&mut files, |slot| slot.session_id == session_id);
        Some(RemovedSession { session, trees: removed_trees, files: removed_files })
    }
}

fn drain_files(
    files: &mut HashMap<FileId, FileSlot>,
    matcher: impl Fn(&FileSlot) -> bool,
) -> Vec<Arc<Mutex<OpenFile>>> {
    let ids: Vec<FileId> =
        files.iter().filter(|(_, slot)| matcher(slot)).map(|(id, _)| *id).collect();
    ids.iter().filter_map(|id| files.remove(id)).map(|slot| slot.file).collect()
}
