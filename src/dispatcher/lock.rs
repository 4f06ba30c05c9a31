//! LOCK: the byte-range lock bridge glued to the metadata store.

use async_trait::async_trait;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::auth::AuthContext;
use crate::locking::{self, RangeLockBackend};
use crate::parser::smb2::lock as lock_args;
use crate::serializer::smb2::misc as misc_wire;
use crate::status::NtStatus;
use crate::store::{FileLock, MetadataService, NodeHandle, StoreResult};

/// Adapter binding the metadata service's lock calls to one open file.
struct MetaRangeLocks {
    meta: std::sync::Arc<dyn MetadataService>,
    auth: AuthContext,
    handle: NodeHandle,
}

#[async_trait]
impl RangeLockBackend for MetaRangeLocks {
    async fn lock(&self, lock: &FileLock) -> StoreResult<()> {
        self.meta.lock_file(&self.auth, &self.handle, lock.clone()).await
    }

    async fn unlock(&self, lock: &FileLock) -> StoreResult<()> {
        self.meta.unlock_file(&self.auth, &self.handle, lock.clone()).await
    }
}

pub async fn lock(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: lock_args::Args,
) -> HandlerResult {
    let session = match dispatcher.session(ctx).await {
        Ok(session) => session,
        Err(status) => return HandlerResult::status_only(status),
    };
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    let file = match dispatcher.file(ctx, &args.file_id).await {
        Ok(file) => file,
        Err(status) => return HandlerResult::status_only(status),
    };
    let (handle, is_directory, is_pipe) = {
        let file = file.lock().await;
        (file.metadata_handle.clone(), file.is_directory, file.is_pipe)
    };
    if is_directory || is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };

    let backend = MetaRangeLocks {
        meta: services.meta,
        auth: dispatcher.auth_context(&session, ctx),
        handle,
    };
    let status = locking::apply(
        &backend,
        ctx.session_id,
        &args.elements,
        &dispatcher.config,
        &ctx.cancel,
    )
    .await;
    if status.is_success() {
        HandlerResult::ok(misc_wire::lock)
    } else {
        HandlerResult::status_only(status)
    }
}
