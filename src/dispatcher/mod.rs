//! The per-connection command dispatcher.
//!
//! The transport feeds `(command, context, body)` triples in; each
//! handler decodes via the parser, resolves references in the handle
//! tables, talks to the backing stores, and encodes an exact-length
//! response body. Errors never escape as panics: every failure becomes
//! an NT status in the [`HandlerResult`].

mod close;
mod create;
mod dir;
mod info_query;
mod info_set;
mod ioctl;
mod lock;
mod mfsymlink;
mod misc;
mod notify;
mod oplock;
mod read;
mod tree;
mod write;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::AuthContext;
use crate::config::EngineConfig;
use crate::handles::{Handles, OpenFile, RemovedSession, Session, TreeConnection};
use crate::notify::{ChangeEvent, NotifyRegistry};
use crate::oplock::OplockManager;
use crate::parser::{self, Arguments};
use crate::smb2::{Command, NotifyAction};
use crate::status::NtStatus;
use crate::store::{BlockCache, ContentService, MetadataService, NodeHandle, Registry, UserRecord};

/// Outcome of one dispatched command.
#[derive(Debug)]
pub struct HandlerResult {
    pub status: NtStatus,
    pub body: Vec<u8>,
    /// Tree id allocated by TREE_CONNECT, for the response header.
    pub granted_tree_id: Option<u32>,
}

impl HandlerResult {
    pub fn status_only(status: NtStatus) -> HandlerResult {
        HandlerResult { status, body: Vec::new(), granted_tree_id: None }
    }

    fn encoded(
        status: NtStatus,
        encode: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
    ) -> HandlerResult {
        let mut body = Vec::new();
        match encode(&mut body) {
            Ok(()) => HandlerResult { status, body, granted_tree_id: None },
            // Serialization into a Vec cannot fail; an error here is an
            // encoding bug.
            Err(_) => HandlerResult::status_only(NtStatus::INTERNAL_ERROR),
        }
    }

    pub fn ok(encode: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> HandlerResult {
        HandlerResult::encoded(NtStatus::SUCCESS, encode)
    }

    fn with_tree(mut self, tree_id: u32) -> HandlerResult {
        self.granted_tree_id = Some(tree_id);
        self
    }
}

/// Transport-supplied per-request context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: u64,
    pub tree_id: u32,
    pub message_id: u64,
    pub client_addr: SocketAddr,
    pub cancel: CancellationToken,
}

/// Services resolved for one disk share.
pub(crate) struct ShareServices {
    pub meta: Arc<dyn MetadataService>,
    pub content: Arc<dyn ContentService>,
    pub cache: Option<Arc<dyn BlockCache>>,
    pub root: NodeHandle,
}

pub struct Dispatcher {
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) handles: Arc<Handles>,
    pub(crate) oplocks: Arc<OplockManager>,
    pub(crate) notifies: Arc<NotifyRegistry>,
    pub(crate) config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn Registry>,
        handles: Arc<Handles>,
        oplocks: Arc<OplockManager>,
        notifies: Arc<NotifyRegistry>,
        config: EngineConfig,
    ) -> Dispatcher {
        Dispatcher { registry, handles, oplocks, notifies, config }
    }

    /// Entry point for authentication: the transport registers the
    /// session it established and gets the engine-side record back.
    pub async fn register_session(
        &self,
        user: Option<UserRecord>,
        is_guest: bool,
    ) -> Arc<Session> {
        self.handles.register_session(user, is_guest).await
    }

    /// LOGOFF and transport-close path: cascades to trees, open files,
    /// watchers, oplocks, leases, and byte-range locks.
    pub async fn remove_session(&self, session_id: u64) {
        let Some(RemovedSession { trees, files, .. }) =
            self.handles.remove_session(session_id).await
        else {
            return;
        };
        self.notifies.remove_session(session_id).await;
        self.oplocks.release_session(session_id).await;
        for file in files {
            let file = file.lock().await;
            debug!(path = %file.path, "open file dropped by session teardown");
        }
        for tree in trees {
            if let Some(meta) = self.registry.get_metadata_service(&tree.share_name) {
                if let Err(err) = meta.release_session_locks(session_id).await {
                    tracing::warn!(?err, share = %tree.share_name, "session lock sweep failed");
                }
            }
        }
    }

    /// Dispatches one request. `None` means the response is suppressed
    /// (CANCEL never answers for itself).
    pub async fn dispatch(
        &self,
        command: Command,
        ctx: &RequestContext,
        body: &[u8],
    ) -> Option<HandlerResult> {
        if matches!(command, Command::Negotiate | Command::SessionSetup) {
            return Some(HandlerResult::status_only(NtStatus::NOT_SUPPORTED));
        }
        let arguments = match parser::parse_body(command, body) {
            Ok(arguments) => arguments,
            Err(err) => {
                debug!(?command, ?err, "request decode failed");
                return Some(HandlerResult::status_only(NtStatus::INVALID_PARAMETER));
            }
        };

        Some(match arguments {
            Arguments::Echo => misc::echo(),
            Arguments::Cancel => return notify::cancel(self, ctx).await,
            Arguments::Logoff => misc::logoff(self, ctx).await,
            Arguments::TreeConnect(args) => tree::connect(self, ctx, args).await,
            Arguments::TreeDisconnect => tree::disconnect(self, ctx).await,
            Arguments::Create(args) => create::create(self, ctx, args).await,
            Arguments::Close(args) => close::close(self, ctx, args).await,
            Arguments::Flush(args) => misc::flush(self, ctx, args).await,
            Arguments::Read(args) => read::read(self, ctx, args).await,
            Arguments::Write(args) => write::write(self, ctx, args).await,
            Arguments::Lock(args) => lock::lock(self, ctx, args).await,
            Arguments::Ioctl(args) => ioctl::ioctl(self, ctx, args).await,
            Arguments::QueryDirectory(args) => dir::query_directory(self, ctx, args).await,
            Arguments::ChangeNotify(args) => notify::change_notify(self, ctx, args).await,
            Arguments::QueryInfo(args) => info_query::query_info(self, ctx, args).await,
            Arguments::SetInfo(args) => info_set::set_info(self, ctx, args).await,
            Arguments::OplockBreak(args) => oplock::acknowledge(self, ctx, args).await,
        })
    }

    pub(crate) async fn session(&self, ctx: &RequestContext) -> Result<Arc<Session>, NtStatus> {
        self.handles.session(ctx.session_id).await.ok_or(NtStatus::USER_SESSION_DELETED)
    }

    pub(crate) async fn tree(
        &self,
        ctx: &RequestContext,
    ) -> Result<Arc<TreeConnection>, NtStatus> {
        self.handles
            .tree(ctx.tree_id, ctx.session_id)
            .await
            .ok_or(NtStatus::NETWORK_NAME_DELETED)
    }

    pub(crate) async fn file(
        &self,
        _ctx: &RequestContext,
        file_id: &crate::smb2::FileId,
    ) -> Result<Arc<Mutex<OpenFile>>, NtStatus> {
        self.handles.file(file_id).await.ok_or(NtStatus::INVALID_HANDLE)
    }

    /// Derives the backend identity for a session per the auth bridge
    /// rules.
    pub(crate) fn auth_context(&self, session: &Session, ctx: &RequestContext) -> AuthContext {
        match (&session.user, session.is_guest) {
            (Some(user), _) => AuthContext::for_user(ctx.client_addr, user),
            (None, true) => AuthContext::for_guest(ctx.client_addr),
            (None, false) => AuthContext::for_anonymous(ctx.client_addr),
        }
    }

    /// Resolves the service bundle for a disk share.
    pub(crate) fn services(&self, share_name: &str) -> Result<ShareServices, NtStatus> {
        let meta = self
            .registry
            .get_metadata_service(share_name)
            .ok_or(NtStatus::NETWORK_NAME_DELETED)?;
        let content = self
            .registry
            .get_content_service(share_name)
            .ok_or(NtStatus::NETWORK_NAME_DELETED)?;
        let cache = self.registry.get_cache_for_share(share_name);
        let root =
            self.registry.get_root_handle(share_name).ok_or(NtStatus::NETWORK_NAME_DELETED)?;
        Ok(ShareServices { meta, content, cache, root })
    }

    /// Key under which oplocks and leases track a file.
    pub(crate) fn share_path(share_name: &str, path: &str) -> String {
        format!("{}/{}", share_name, path)
    }

    /// Publishes a filesystem change to the notify registry.
    pub(crate) async fn emit_change(
        &self,
        share_name: &str,
        parent_path: &str,
        file_name: &str,
        action: NotifyAction,
    ) {
        self.notifies
            .emit(&ChangeEvent {
                share_name: share_name.to_owned(),
                parent_path: parent_path.to_owned(),
                file_name: file_name.to_owned(),
                action,
            })
            .await;
    }
}
