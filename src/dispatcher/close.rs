//! CLOSE: flush, MFsymlink conversion, delete-on-close, post-close
//! attributes.

use tracing::{debug, warn};

use super::{mfsymlink, Dispatcher, HandlerResult, RequestContext, ShareServices};
use crate::auth::AuthContext;
use crate::handles::OpenFile;
use crate::parser::smb2::close as close_args;
use crate::path;
use crate::serializer::smb2::close as close_wire;
use crate::smb2::{NotifyAction, CLOSE_FLAG_POSTQUERY_ATTRIB, MFSYMLINK_SIZE};
use crate::status::NtStatus;
use crate::store::FileInfo;

pub async fn close(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: close_args::Args,
) -> HandlerResult {
    let session = match dispatcher.session(ctx).await {
        Ok(session) => session,
        Err(status) => return HandlerResult::status_only(status),
    };
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    let Some(entry) = dispatcher.handles.remove_file(&args.file_id).await else {
        return HandlerResult::status_only(NtStatus::INVALID_HANDLE);
    };
    let file = entry.lock().await.clone();

    dispatcher.notifies.remove_file(&file.file_id).await;
    dispatcher.oplocks.release_file(file.file_id).await;

    if file.is_pipe {
        return HandlerResult::ok(|dest| close_wire::result(dest, None));
    }
    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);

    // Push buffered bytes towards the content store; failure never
    // blocks the client from releasing its handle.
    if !file.is_directory {
        if let (Some(content_id), Some(cache)) = (&file.content_id, &services.cache) {
            if let Err(err) = cache.flush_and_finalize(content_id).await {
                warn!(?err, %content_id, "close-time flush failed");
            }
        }
    }

    if !file.is_directory && file.symlink_target.is_none() {
        convert_mfsymlink(dispatcher, &services, &auth, &tree.share_name, &file).await;
    }

    let post_info: Option<FileInfo> = if args.flags & CLOSE_FLAG_POSTQUERY_ATTRIB != 0 {
        services.meta.get_file(&auth, &file.metadata_handle).await.ok()
    } else {
        None
    };

    if file.delete_pending {
        remove_on_close(dispatcher, &services, &auth, &tree.share_name, &file).await;
    }

    HandlerResult::ok(|dest| close_wire::result(dest, post_info.as_ref()))
}

/// A 1067-byte regular file starting with the MFsymlink magic becomes a
/// real symlink: payload out, file and blob removed, link created in
/// their place. Every step is best-effort.
async fn convert_mfsymlink(
    dispatcher: &Dispatcher,
    services: &ShareServices,
    auth: &AuthContext,
    share_name: &str,
    file: &OpenFile,
) {
    if file.parent_handle.is_root() && file.file_name.is_empty() {
        return;
    }
    let Ok(info) = services.meta.get_file(auth, &file.metadata_handle).await else {
        return;
    };
    if info.size != MFSYMLINK_SIZE {
        return;
    }
    let Some(content_id) = info.content_id.as_deref().or(file.content_id.as_deref()) else {
        return;
    };

    let payload = match read_payload(services, content_id).await {
        Some(payload) => payload,
        None => return,
    };
    let Some(target) = mfsymlink::parse(&payload) else {
        return;
    };

    if let Err(err) = services.meta.remove_file(auth, &file.parent_handle, &file.file_name).await
    {
        warn!(?err, path = %file.path, "mfsymlink conversion could not remove payload file");
        return;
    }
    if let Err(err) = services.content.delete(content_id).await {
        warn!(?err, %content_id, "mfsymlink payload blob removal failed");
    }
    match services
        .meta
        .create_symlink(auth, &file.parent_handle, &file.file_name, &target)
        .await
    {
        Ok(_) => {
            debug!(path = %file.path, target, "mfsymlink converted to symlink");
            dispatcher
                .emit_change(
                    share_name,
                    path::parent(&file.path),
                    &file.file_name,
                    NotifyAction::Modified,
                )
                .await;
        }
        Err(err) => warn!(?err, path = %file.path, "mfsymlink conversion failed to link"),
    }
}

async fn read_payload(services: &ShareServices, content_id: &str) -> Option<Vec<u8>> {
    if let Some(cache) = &services.cache {
        if cache.state(content_id).await.is_readable() {
            let mut buf = vec![0u8; MFSYMLINK_SIZE as usize];
            if let Ok(filled) = cache.read_at(content_id, 0, &mut buf).await {
                buf.truncate(filled);
                return Some(buf);
            }
        }
    }
    services.content.read_content(content_id).await.ok()
}

/// Delete-on-close. Failure is logged, the CLOSE still succeeds.
async fn remove_on_close(
    dispatcher: &Dispatcher,
    services: &ShareServices,
    auth: &AuthContext,
    share_name: &str,
    file: &OpenFile,
) {
    if file.file_name.is_empty() {
        return;
    }
    let removal = if file.is_directory {
        services.meta.remove_directory(auth, &file.parent_handle, &file.file_name).await
    } else {
        services.meta.remove_file(auth, &file.parent_handle, &file.file_name).await
    };
    match removal {
        Ok(()) => {
            dispatcher
                .emit_change(
                    share_name,
                    path::parent(&file.path),
                    &file.file_name,
                    NotifyAction::Removed,
                )
                .await;
        }
        Err(err) => warn!(?err, path = %file.path, "delete-on-close failed"),
    }
}
