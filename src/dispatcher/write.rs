//! WRITE: the two-phase pipeline.
//!
//! Phase one stages the blob and new size, the payload lands in cache or
//! content store, and only the metadata commit publishes it. A commit
//! failure after a successful data write surfaces the commit error; the
//! bytes stay in storage and no rollback is attempted.

use tracing::debug;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::write as write_args;
use crate::path;
use crate::serializer::smb2::write as write_wire;
use crate::smb2::NotifyAction;
use crate::status::NtStatus;

pub async fn write(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: write_args::Args,
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
    let (handle, is_directory, is_pipe, file_path, lease_key) = {
        let file = file.lock().await;
        (
            file.metadata_handle.clone(),
            file.is_directory,
            file.is_pipe,
            file.path.clone(),
            file.lease_key,
        )
    };
    if is_directory || is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    if !tree.permission.has_write() {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }
    if args.data.len() as u32 > dispatcher.config.max_write_size {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    }

    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);

    // Conflicting byte-range locks of other sessions fail the write.
    if let Err(err) = services
        .meta
        .check_lock_for_io(
            &auth,
            &handle,
            ctx.session_id,
            args.offset,
            args.data.len() as u64,
            true,
        )
        .await
    {
        return HandlerResult::status_only(err.status());
    }
    // A writer invalidates every other holder's lease.
    if let Err(err) = dispatcher
        .oplocks
        .break_leases_for_io(
            &Dispatcher::share_path(&tree.share_name, &file_path),
            true,
            lease_key,
        )
        .await
    {
        return HandlerResult::status_only(err.status());
    }

    let new_size = args.offset + args.data.len() as u64;
    let op = match services.meta.prepare_write(&auth, &handle, new_size).await {
        Ok(op) => op,
        Err(err) => return HandlerResult::status_only(err.status()),
    };

    let data_write = match &services.cache {
        Some(cache) => cache.write_at(&op.content_id, args.offset, &args.data).await,
        None => services.content.write_at(&op.content_id, args.offset, &args.data).await,
    };
    if let Err(err) = data_write {
        return HandlerResult::status_only(err.status());
    }

    if let Err(err) = services.meta.commit_write(&auth, &op).await {
        // Data already landed; the client sees the commit error and the
        // stores reconcile out of band.
        debug!(?err, content_id = %op.content_id, "write commit failed after data write");
        return HandlerResult::status_only(err.status());
    }

    {
        let mut file = file.lock().await;
        file.content_id = Some(op.content_id.clone());
    }
    dispatcher
        .emit_change(
            &tree.share_name,
            path::parent(&file_path),
            path::leaf(&file_path),
            NotifyAction::Modified,
        )
        .await;
    let count = args.data.len() as u32;
    HandlerResult::ok(|dest| write_wire::result(dest, count))
}
