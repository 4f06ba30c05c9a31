//! CREATE: disposition resolution, open-file setup, oplock/lease grant.

use tracing::debug;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::ftime::UnixTime;
use crate::handles::OpenFile;
use crate::parser::smb2::create as create_args;
use crate::path;
use crate::serializer::smb2::create as create_wire;
use crate::smb2::{
    CreateAction, FileId, LeaseState, NotifyAction, OplockLevel, ShareKind, ATTR_READONLY,
    FILE_DELETE_ON_CLOSE, FILE_DIRECTORY_FILE, FILE_NON_DIRECTORY_FILE, MFSYMLINK_SIZE,
};
use crate::status::NtStatus;
use crate::store::{
    CreateKind, FileInfo, FileKind, NodeHandle, SetAttrs, StoreError,
};

pub async fn create(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: create_args::Args,
) -> HandlerResult {
    let session = match dispatcher.session(ctx).await {
        Ok(session) => session,
        Err(status) => return HandlerResult::status_only(status),
    };
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    if tree.kind == ShareKind::Pipe {
        return open_pipe(dispatcher, ctx, &tree.share_name, &args).await;
    }
    if !tree.permission.has_read() {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }

    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);
    let normalized = path::normalize(&args.name);

    let resolved = if normalized.is_empty() {
        // The share root can only ever be opened.
        use crate::smb2::CreateDisposition::{Open, OpenIf};
        if !matches!(args.disposition, Open | OpenIf) {
            return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
        }
        match services.meta.get_file(&auth, &services.root).await {
            Ok(info) => Resolved {
                action: CreateAction::Opened,
                info,
                parent_handle: NodeHandle::root(),
            },
            Err(err) => return HandlerResult::status_only(err.status()),
        }
    } else {
        match resolve(&services, &auth, &tree.permission, &normalized, &args).await {
            Ok(resolved) => resolved,
            Err(status) => return HandlerResult::status_only(status),
        }
    };
    let Resolved { action, mut info, parent_handle } = resolved;

    let delete_on_close = args.create_options & FILE_DELETE_ON_CLOSE != 0;
    if delete_on_close && !tree.permission.has_write() {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }

    // Backend symlinks opened as files materialize as MFsymlink
    // payloads.
    let mut symlink_target = None;
    if info.kind == FileKind::Symlink {
        match services.meta.read_symlink(&auth, &info.handle).await {
            Ok(target) => {
                symlink_target = Some(target);
                info.size = MFSYMLINK_SIZE;
            }
            Err(err) => return HandlerResult::status_only(err.status()),
        }
    }

    let file_id = dispatcher.handles.new_file_id();
    let share_path = Dispatcher::share_path(&tree.share_name, &normalized);
    let (oplock_level, granted_lease) = grant_caching(
        dispatcher,
        ctx,
        &share_path,
        file_id,
        info.is_directory(),
        &args,
    )
    .await;

    let open = OpenFile {
        file_id,
        tree_id: tree.tree_id,
        session_id: ctx.session_id,
        share_name: tree.share_name.clone(),
        path: normalized.clone(),
        file_name: path::leaf(&normalized).to_owned(),
        parent_handle,
        metadata_handle: info.handle.clone(),
        content_id: info.content_id.clone(),
        symlink_target,
        is_directory: info.is_directory(),
        is_pipe: false,
        desired_access: args.desired_access,
        oplock_level,
        lease_key: granted_lease.map(|grant| grant.key),
        delete_pending: delete_on_close,
        enumeration_complete: false,
        enumeration_index: 0,
    };
    dispatcher.handles.insert_file(open).await;

    match action {
        CreateAction::Created => {
            dispatcher
                .emit_change(
                    &tree.share_name,
                    path::parent(&normalized),
                    path::leaf(&normalized),
                    NotifyAction::Added,
                )
                .await;
        }
        CreateAction::Overwritten | CreateAction::Superseded => {
            dispatcher
                .emit_change(
                    &tree.share_name,
                    path::parent(&normalized),
                    path::leaf(&normalized),
                    NotifyAction::Modified,
                )
                .await;
        }
        CreateAction::Opened => {}
    }
    debug!(path = %normalized, ?action, "create completed");

    let wire_level =
        if granted_lease.is_some() { OplockLevel::Lease as u8 } else { oplock_level as u8 };
    HandlerResult::ok(|dest| {
        create_wire::result(
            dest,
            &create_wire::Response {
                oplock_level: wire_level,
                action,
                info: &info,
                file_id,
                lease: granted_lease,
            },
        )
    })
}

struct Resolved {
    action: CreateAction,
    info: FileInfo,
    parent_handle: NodeHandle,
}

async fn resolve(
    services: &super::ShareServices,
    auth: &crate::auth::AuthContext,
    permission: &crate::auth::SharePermission,
    normalized: &str,
    args: &create_args::Args,
) -> Result<Resolved, NtStatus> {
    let (parent_info, leaf_name) =
        match path::walk_parent(services.meta.as_ref(), auth, &services.root, normalized).await {
            Ok(found) => found,
            // A missing intermediate component is a path error, not a
            // leaf miss.
            Err(StoreError::NotFound) => return Err(NtStatus::OBJECT_PATH_NOT_FOUND),
            Err(err) => return Err(err.status()),
        };

    let existing = match services.meta.lookup(auth, &parent_info.handle, leaf_name).await {
        Ok(info) => Some(info),
        Err(StoreError::NotFound) => None,
        Err(err) => return Err(err.status()),
    };

    if let Some(info) = &existing {
        if args.create_options & FILE_DIRECTORY_FILE != 0 && !info.is_directory() {
            return Err(NtStatus::NOT_A_DIRECTORY);
        }
        if args.create_options & FILE_NON_DIRECTORY_FILE != 0 && info.is_directory() {
            return Err(NtStatus::FILE_IS_A_DIRECTORY);
        }
    }

    let action = path::resolve_disposition(args.disposition, existing.is_some())?;
    if !matches!(action, CreateAction::Opened) && !permission.has_write() {
        return Err(NtStatus::ACCESS_DENIED);
    }

    let info = match action {
        CreateAction::Opened => match existing {
            Some(info) => info,
            None => return Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        },
        CreateAction::Created => {
            let kind = if args.create_options & FILE_DIRECTORY_FILE != 0 {
                CreateKind::Directory
            } else {
                CreateKind::File
            };
            let attrs = SetAttrs {
                readonly: (args.file_attributes & ATTR_READONLY != 0).then_some(true),
                created: Some(UnixTime::now()),
                ..SetAttrs::default()
            };
            services
                .meta
                .create(auth, &parent_info.handle, leaf_name, kind, attrs)
                .await
                .map_err(|err| err.status())?
        }
        CreateAction::Overwritten | CreateAction::Superseded => {
            let target = existing.as_ref().map(|info| &info.handle);
            let Some(handle) = target else {
                return Err(NtStatus::OBJECT_NAME_NOT_FOUND);
            };
            // Truncation happens before the handle is returned.
            services
                .meta
                .set_file_attributes(
                    auth,
                    handle,
                    SetAttrs { size: Some(0), ..SetAttrs::default() },
                )
                .await
                .map_err(|err| err.status())?
        }
    };
    Ok(Resolved { action, info, parent_handle: parent_info.handle })
}

/// Routes the caching request: leases via the lock store, legacy
/// oplocks via the per-path table. Directories never take legacy
/// oplocks.
async fn grant_caching(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    share_path: &str,
    file_id: FileId,
    is_directory: bool,
    args: &create_args::Args,
) -> (OplockLevel, Option<create_wire::LeaseGrant>) {
    match (args.oplock_level, args.lease) {
        (OplockLevel::Lease, Some(request)) => {
            match dispatcher
                .oplocks
                .request_lease(
                    share_path,
                    ctx.session_id,
                    request.key,
                    request.state,
                    is_directory,
                )
                .await
            {
                Ok(state) if state != LeaseState::NONE => (
                    OplockLevel::None,
                    Some(create_wire::LeaseGrant { key: request.key, state }),
                ),
                Ok(_) => (OplockLevel::None, None),
                Err(_) => (OplockLevel::None, None),
            }
        }
        (OplockLevel::None | OplockLevel::Lease, _) => (OplockLevel::None, None),
        (_, _) if is_directory => (OplockLevel::None, None),
        (requested, _) => {
            let granted = dispatcher
                .oplocks
                .request_oplock(share_path, ctx.session_id, file_id, requested)
                .await;
            (granted, None)
        }
    }
}

/// Pipe opens carry no metadata; the response is synthesized.
async fn open_pipe(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    share_name: &str,
    args: &create_args::Args,
) -> HandlerResult {
    let normalized = path::normalize(&args.name);
    let file_id = dispatcher.handles.new_file_id();
    let now = UnixTime::now();
    let info = FileInfo {
        handle: NodeHandle::root(),
        uuid: file_id,
        kind: FileKind::Regular,
        size: 0,
        uid: 0,
        gid: 0,
        mode: 0o600,
        nlink: 1,
        created: now,
        accessed: now,
        modified: now,
        changed: now,
        content_id: None,
    };
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    dispatcher
        .handles
        .insert_file(OpenFile {
            file_id,
            tree_id: tree.tree_id,
            session_id: ctx.session_id,
            share_name: share_name.to_owned(),
            path: normalized.clone(),
            file_name: path::leaf(&normalized).to_owned(),
            parent_handle: NodeHandle::root(),
            metadata_handle: NodeHandle::root(),
            content_id: None,
            symlink_target: None,
            is_directory: false,
            is_pipe: true,
            desired_access: args.desired_access,
            oplock_level: OplockLevel::None,
            lease_key: None,
            delete_pending: false,
            enumeration_complete: false,
            enumeration_index: 0,
        })
        .await;
    HandlerResult::ok(|dest| {
        create_wire::result(
            dest,
            &create_wire::Response {
                oplock_level: OplockLevel::None as u8,
                action: CreateAction::Opened,
                info: &info,
                file_id,
                lease: None,
            },
        )
    })
}
