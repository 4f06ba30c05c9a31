//! Directory change-notify registry.
//!
//! CHANGE_NOTIFY answers `STATUS_PENDING` immediately; the watcher sits
//! here until a matching filesystem event, CANCEL, or directory CLOSE
//! completes the pending request through the transport-provided sink.
//! Each registration delivers at most once; clients re-arm with a fresh
//! CHANGE_NOTIFY, so nothing is ever matched and silently dropped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::serializer::smb2::{notify as notify_wire, query as query_wire};
use crate::smb2::{
    FileId, NotifyAction, FILTER_ATTRIBUTES, FILTER_DIR_NAME, FILTER_FILE_NAME, FILTER_LAST_WRITE,
    FILTER_SIZE,
};
use crate::status::NtStatus;

/// Transport-side completion of a pending request. Never invoked while
/// the registry mutex is held.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn complete(&self, session_id: u64, message_id: u64, status: NtStatus, body: Vec<u8>);
}

/// One pending CHANGE_NOTIFY registration.
#[derive(Debug, Clone)]
pub struct Watcher {
    pub file_id: FileId,
    pub session_id: u64,
    pub message_id: u64,
    /// Normalized share name the watched directory belongs to.
    pub share_name: String,
    /// Share-relative path of the watched directory.
    pub watch_path: String,
    pub completion_filter: u32,
    pub watch_tree: bool,
    pub max_output_length: u32,
}

/// A filesystem change the dispatcher observed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub share_name: String,
    /// Share-relative path of the directory containing the change.
    pub parent_path: String,
    pub file_name: String,
    pub action: NotifyAction,
}

/// Does `action` pass a completion filter?
pub fn matches_filter(action: NotifyAction, filter: u32) -> bool {
    let wanted = match action {
        NotifyAction::Added | NotifyAction::Removed => FILTER_FILE_NAME | FILTER_DIR_NAME,
        NotifyAction::Modified => FILTER_SIZE | FILTER_LAST_WRITE | FILTER_ATTRIBUTES,
        NotifyAction::RenamedOld | NotifyAction::RenamedNew => FILTER_FILE_NAME | FILTER_DIR_NAME,
    };
    filter & wanted != 0
}

#[derive(Default)]
struct Tables {
    by_file: HashMap<FileId, Watcher>,
    /// `share_name + watch_path` → watcher file ids.
    by_path: HashMap<String, Vec<FileId>>,
}

impl Tables {
    fn path_key(share_name: &str, watch_path: &str) -> String {
        format!("{}\u{0}{}", share_name, watch_path)
    }

    fn insert(&mut self, watcher: Watcher) -> Option<Watcher> {
        let key = Self::path_key(&watcher.share_name, &watcher.watch_path);
        let previous = self.remove(&watcher.file_id);
        self.by_path.entry(key).or_default().push(watcher.file_id);
        self.by_file.insert(watcher.file_id, watcher);
        previous
    }

    fn remove(&mut self, file_id: &FileId) -> Option<Watcher> {
        let watcher = self.by_file.remove(file_id)?;
        let key = Self::path_key(&watcher.share_name, &watcher.watch_path);
        if let Some(ids) = self.by_path.get_mut(&key) {
            ids.retain(|id| id != file_id);
            if ids.is_empty() {
                self.by_path.remove(&key);
            }
        }
        Some(watcher)
    }
}

pub struct NotifyRegistry {
    sink: Arc<dyn NotifySink>,
    tables: Mutex<Tables>,
}

impl NotifyRegistry {
    pub fn new(sink: Arc<dyn NotifySink>) -> NotifyRegistry {
        NotifyRegistry { sink, tables: Mutex::new(Tables::default()) }
    }

    /// Registers a watcher; a directory handle carries at most one, so a
    /// re-arm replaces the previous registration.
    pub async fn register(&self, watcher: Watcher) {
        self.tables.lock().await.insert(watcher);
    }

    /// CANCEL targeting a pending CHANGE_NOTIFY: the pending request
    /// completes with `STATUS_CANCELLED` and the watcher goes away.
    pub async fn cancel(&self, session_id: u64, message_id: u64) -> bool {
        let removed = {
            let mut tables = self.tables.lock().await;
            let target = tables
                .by_file
                .values()
                .find(|w| w.session_id == session_id && w.message_id == message_id)
                .map(|w| w.file_id);
            target.and_then(|id| tables.remove(&id))
        };
        match removed {
            Some(watcher) => {
                self.sink
                    .complete(
                        watcher.session_id,
                        watcher.message_id,
                        NtStatus::CANCELLED,
                        Vec::new(),
                    )
                    .await;
                true
            }
            None => false,
        }
    }

    /// Directory CLOSE: the pending request completes with
    /// `STATUS_NOTIFY_CLEANUP`.
    pub async fn remove_file(&self, file_id: &FileId) {
        let removed = self.tables.lock().await.remove(file_id);
        if let Some(watcher) = removed {
            self.sink
                .complete(
                    watcher.session_id,
                    watcher.message_id,
                    NtStatus::NOTIFY_CLEANUP,
                    Vec::new(),
                )
                .await;
        }
    }

    /// Session teardown: the client is gone, so pending watchers drop
    /// without completion.
    pub async fn remove_session(&self, session_id: u64) {
        let mut tables = self.tables.lock().await;
        let ids: Vec<FileId> = tables
            .by_file
            .values()
            .filter(|w| w.session_id == session_id)
            .map(|w| w.file_id)
            .collect();
        for id in &ids {
            tables.remove(id);
        }
    }

    /// Fans a filesystem event out to every matching watcher. Matching
    /// watchers are removed and their pending requests completed with an
    /// encoded FILE_NOTIFY_INFORMATION entry.
    pub async fn emit(&self, event: &ChangeEvent) {
        let matched = {
            let mut tables = self.tables.lock().await;
            let ids: Vec<FileId> = tables
                .by_file
                .values()
                .filter(|w| watcher_matches(w, event))
                .map(|w| w.file_id)
                .collect();
            ids.iter().filter_map(|id| tables.remove(id)).collect::<Vec<_>>()
        };
        for watcher in matched {
            let relative = relative_name(&watcher.watch_path, &event.parent_path, &event.file_name);
            let mut entries = notify_wire::events(&[(event.action, relative)]);
            if entries.len() as u32 > watcher.max_output_length {
                // Too big for the client's buffer; it rescans instead.
                entries.clear();
            }
            let mut body = Vec::new();
            if query_wire::result(&mut body, &entries).is_err() {
                body.clear();
            }
            debug!(
                message_id = watcher.message_id,
                action = ?event.action,
                "delivering change notification"
            );
            self.sink
                .complete(watcher.session_id, watcher.message_id, NtStatus::SUCCESS, body)
                .await;
        }
    }
}

fn watcher_matches(watcher: &Watcher, event: &ChangeEvent) -> bool {
    if watcher.share_name != event.share_name {
        return false;
    }
    if !matches_filter(event.action, watcher.completion_filter) {
        return false;
    }
    if watcher.watch_path == event.parent_path {
        return true;
    }
    watcher.watch_tree
        && (watcher.watch_path.is_empty()
            || event
                .parent_path
                .strip_prefix(&watcher.watch_path)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false))
}

/// Name reported to the client, relative to the watched directory, with
/// wire separators.
fn relative_name(watch_path: &str, parent_path: &str, file_name: &str) -> String {
    let below = parent_path
        .strip_prefix(watch_path)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(parent_path);
    if below.is_empty() {
        file_name.to_owned()
    } else {
        format!("{}\\{}", below.replace('/', "\\"), file_name)
    }
}
