//! READ.

use super::{mfsymlink, Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::read as read_args;
use crate::serializer::smb2::read as read_wire;
use crate::status::NtStatus;
use crate::store::StoreError;

pub async fn read(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: read_args::Args,
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
    let (handle, is_directory, is_pipe, symlink_target, path, lease_key) = {
        let file = file.lock().await;
        (
            file.metadata_handle.clone(),
            file.is_directory,
            file.is_pipe,
            file.symlink_target.clone(),
            file.path.clone(),
            file.lease_key,
        )
    };
    // Pipe payloads belong to the pipe subsystem, never this path.
    if is_directory || is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    if !tree.permission.has_read() {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }

    let length = args.length.min(dispatcher.config.max_read_size) as u64;

    // Backend symlinks read back as MFsymlink payloads.
    if let Some(target) = symlink_target {
        let Some(payload) = mfsymlink::build(&target) else {
            return HandlerResult::status_only(NtStatus::INTERNAL_ERROR);
        };
        if args.offset >= payload.len() as u64 {
            return HandlerResult::status_only(NtStatus::END_OF_FILE);
        }
        let start = args.offset as usize;
        let end = (args.offset + length).min(payload.len() as u64) as usize;
        return HandlerResult::ok(|dest| read_wire::result(dest, &payload[start..end], 0));
    }

    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);

    let plan = match services.meta.prepare_read(&auth, &handle).await {
        Ok(plan) => plan,
        Err(err) => return HandlerResult::status_only(err.status()),
    };
    let Some(content_id) = plan.content_id.filter(|_| plan.size > 0) else {
        return HandlerResult::ok(|dest| read_wire::result(dest, &[], 0));
    };
    if args.offset >= plan.size {
        return HandlerResult::status_only(NtStatus::END_OF_FILE);
    }
    let actual_len = length.min(plan.size - args.offset) as usize;

    // A reader without the Write lease disturbs other holders' write
    // caches.
    if let Err(err) = dispatcher
        .oplocks
        .break_leases_for_io(&Dispatcher::share_path(&tree.share_name, &path), false, lease_key)
        .await
    {
        return HandlerResult::status_only(err.status());
    }

    let mut buf = vec![0u8; actual_len];
    let filled = match read_bytes(&services, &content_id, args.offset, &mut buf).await {
        Ok(filled) => filled,
        Err(err) => return HandlerResult::status_only(err.status()),
    };
    buf.truncate(filled);
    let remaining = plan.size - args.offset - buf.len() as u64;
    HandlerResult::ok(|dest| read_wire::result(dest, &buf, remaining as u32))
}

/// Cache first when the cached copy is authoritative, then a positional
/// content read, then a whole-object read sliced at the offset.
async fn read_bytes(
    services: &super::ShareServices,
    content_id: &str,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize, StoreError> {
    if let Some(cache) = &services.cache {
        if cache.state(content_id).await.is_readable() {
            return cache.read_at(content_id, offset, buf).await;
        }
    }
    if let Some(filled) = services.content.read_at(content_id, offset, buf).await? {
        return Ok(filled);
    }
    let whole = services.content.read_content(content_id).await?;
    let start = (offset as usize).min(whole.len());
    let end = (start + buf.len()).min(whole.len());
    buf[..end - start].copy_from_slice(&whole[start..end]);
    Ok(end - start)
}
