//! SET_INFO: attribute, rename, disposition, and size changes.

use tracing::debug;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::ftime::{from_filetime, UnixTime};
use crate::parser::smb2::set_info::{Args, Payload};
use crate::path;
use crate::serializer::smb2::misc as misc_wire;
use crate::smb2::{FileBasicInfo, NotifyAction, ATTR_READONLY};
use crate::status::NtStatus;
use crate::store::{NodeHandle, SetAttrs, StoreError};

pub async fn set_info(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: Args,
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
    if !tree.permission.has_write() {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }
    if file.lock().await.is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);

    let status = match args.payload {
        Payload::Basic(basic) => {
            let (handle, file_path) = {
                let file = file.lock().await;
                (file.metadata_handle.clone(), file.path.clone())
            };
            let attrs = basic_to_attrs(&basic);
            match services.meta.set_file_attributes(&auth, &handle, attrs).await {
                Ok(_) => {
                    dispatcher
                        .emit_change(
                            &tree.share_name,
                            path::parent(&file_path),
                            path::leaf(&file_path),
                            NotifyAction::Modified,
                        )
                        .await;
                    NtStatus::SUCCESS
                }
                Err(err) => err.status(),
            }
        }
        Payload::Rename { replace, name } => {
            rename(dispatcher, &tree.share_name, &services, &auth, &file, replace, &name).await
        }
        Payload::Disposition { delete } => {
            let mut open = file.lock().await;
            if open.file_name.is_empty() {
                // The share root cannot be deleted.
                NtStatus::ACCESS_DENIED
            } else {
                open.delete_pending = delete;
                NtStatus::SUCCESS
            }
        }
        Payload::EndOfFile(size) => {
            let (handle, file_path) = {
                let file = file.lock().await;
                (file.metadata_handle.clone(), file.path.clone())
            };
            let attrs = SetAttrs { size: Some(size), ..SetAttrs::default() };
            match services.meta.set_file_attributes(&auth, &handle, attrs).await {
                Ok(_) => {
                    dispatcher
                        .emit_change(
                            &tree.share_name,
                            path::parent(&file_path),
                            path::leaf(&file_path),
                            NotifyAction::Modified,
                        )
                        .await;
                    NtStatus::SUCCESS
                }
                Err(err) => err.status(),
            }
        }
        // Allocation hints are accepted and ignored; the cache grows on
        // demand.
        Payload::Allocation(_) => NtStatus::SUCCESS,
        Payload::Link => NtStatus::NOT_SUPPORTED,
        // Incoming descriptors are accepted and dropped; POSIX modes
        // stay authoritative.
        Payload::Security(_) => NtStatus::SUCCESS,
        Payload::Other { class } => {
            debug!(class, "unsupported set-info class");
            NtStatus::NOT_SUPPORTED
        }
    };

    if status.is_success() {
        HandlerResult::ok(misc_wire::set_info)
    } else {
        HandlerResult::status_only(status)
    }
}

/// Zero and all-ones FILETIMEs mean "leave unchanged"; a zero attribute
/// mask leaves attributes alone.
fn basic_to_attrs(basic: &FileBasicInfo) -> SetAttrs {
    fn time(raw: u64) -> Option<UnixTime> {
        (raw != 0 && raw != u64::MAX).then(|| from_filetime(raw))
    }
    SetAttrs {
        size: None,
        readonly: (basic.attributes != 0)
            .then(|| basic.attributes & ATTR_READONLY != 0),
        created: time(basic.created),
        accessed: time(basic.accessed),
        modified: time(basic.written),
    }
}

async fn rename(
    dispatcher: &Dispatcher,
    share_name: &str,
    services: &super::ShareServices,
    auth: &crate::auth::AuthContext,
    file: &std::sync::Arc<tokio::sync::Mutex<crate::handles::OpenFile>>,
    replace: bool,
    raw_target: &str,
) -> NtStatus {
    let target = path::normalize(raw_target);
    if target.is_empty() {
        return NtStatus::INVALID_PARAMETER;
    }
    let (old_parent, old_name, old_path, is_root) = {
        let open = file.lock().await;
        (
            open.parent_handle.clone(),
            open.file_name.clone(),
            open.path.clone(),
            open.file_name.is_empty(),
        )
    };
    if is_root {
        return NtStatus::ACCESS_DENIED;
    }

    // The destination parent may differ from the source parent.
    let (new_parent_handle, new_name): (NodeHandle, String) = if path::parent(&target)
        == path::parent(&old_path)
    {
        (old_parent.clone(), path::leaf(&target).to_owned())
    } else {
        match path::walk_parent(services.meta.as_ref(), auth, &services.root, &target).await {
            Ok((parent_info, leaf_name)) => (parent_info.handle, leaf_name.to_owned()),
            Err(StoreError::NotFound) => return NtStatus::OBJECT_PATH_NOT_FOUND,
            Err(err) => return err.status(),
        }
    };

    match services.meta.lookup(auth, &new_parent_handle, &new_name).await {
        Ok(_) if !replace => return NtStatus::OBJECT_NAME_COLLISION,
        Ok(_) | Err(StoreError::NotFound) => {}
        Err(err) => return err.status(),
    }

    if let Err(err) = services
        .meta
        .move_entry(auth, &old_parent, &old_name, &new_parent_handle, &new_name)
        .await
    {
        return err.status();
    }

    {
        let mut open = file.lock().await;
        open.parent_handle = new_parent_handle;
        open.file_name = new_name.clone();
        open.path = target.clone();
    }
    dispatcher
        .emit_change(share_name, path::parent(&old_path), &old_name, NotifyAction::RenamedOld)
        .await;
    dispatcher
        .emit_change(share_name, path::parent(&target), &new_name, NotifyAction::RenamedNew)
        .await;
    debug!(from = %old_path, to = %target, "renamed");
    NtStatus::SUCCESS
}
