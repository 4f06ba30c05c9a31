//! TREE_CONNECT and TREE_DISCONNECT.

use tracing::debug;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::auth::SharePermission;
use crate::parser::smb2::tree_connect as connect_args;
use crate::serializer::smb2::{misc as misc_wire, tree_connect as connect_wire};
use crate::smb2::{
    ShareKind, MAXIMAL_ACCESS_ADMIN, MAXIMAL_ACCESS_PIPE, MAXIMAL_ACCESS_READ,
    MAXIMAL_ACCESS_READ_WRITE,
};
use crate::status::NtStatus;

/// The virtual named-pipe share.
const IPC_SHARE: &str = "/ipc$";

/// `\\server\EXPORT` → `/export`.
fn share_name_of(unc: &str) -> String {
    let leaf = unc.trim_end_matches(['\\', '/']).rsplit(['\\', '/']).next().unwrap_or("");
    format!("/{}", leaf.to_lowercase())
}

pub async fn connect(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: connect_args::Args,
) -> HandlerResult {
    let session = match dispatcher.session(ctx).await {
        Ok(session) => session,
        Err(status) => return HandlerResult::status_only(status),
    };
    let share_name = share_name_of(&args.path);

    if share_name == IPC_SHARE {
        let tree = dispatcher
            .handles
            .add_tree(session.session_id, share_name, ShareKind::Pipe, SharePermission::ReadWrite)
            .await;
        debug!(tree_id = tree.tree_id, "connected pipe share");
        return HandlerResult::ok(|dest| {
            connect_wire::result(
                dest,
                &connect_wire::Response {
                    kind: ShareKind::Pipe,
                    maximal_access: MAXIMAL_ACCESS_PIPE,
                },
            )
        })
        .with_tree(tree.tree_id);
    }

    let Some(share) = dispatcher.registry.get_share(&share_name) else {
        return HandlerResult::status_only(NtStatus::BAD_NETWORK_NAME);
    };

    let mut permission = share.guest_permission;
    if let Some(user) = &session.user {
        match dispatcher
            .registry
            .get_user_store()
            .share_permission(&user.username, &share_name)
            .await
        {
            Ok(Some(specific)) => permission = specific,
            Ok(None) => {}
            Err(err) => return HandlerResult::status_only(err.status()),
        }
    }
    if share.read_only {
        permission = permission.capped_to_read_only();
    }
    if permission == SharePermission::None {
        return HandlerResult::status_only(NtStatus::ACCESS_DENIED);
    }

    let maximal_access = match permission {
        SharePermission::Admin => MAXIMAL_ACCESS_ADMIN,
        SharePermission::ReadWrite => MAXIMAL_ACCESS_READ_WRITE,
        _ => MAXIMAL_ACCESS_READ,
    };
    let tree = dispatcher
        .handles
        .add_tree(session.session_id, share_name, ShareKind::Disk, permission)
        .await;
    debug!(tree_id = tree.tree_id, share = %tree.share_name, ?permission, "tree connected");
    HandlerResult::ok(|dest| {
        connect_wire::result(
            dest,
            &connect_wire::Response { kind: ShareKind::Disk, maximal_access },
        )
    })
    .with_tree(tree.tree_id)
}

pub async fn disconnect(dispatcher: &Dispatcher, ctx: &RequestContext) -> HandlerResult {
    if let Err(status) = dispatcher.session(ctx).await {
        return HandlerResult::status_only(status);
    }
    let Some((tree, files)) =
        dispatcher.handles.remove_tree(ctx.tree_id, ctx.session_id).await
    else {
        return HandlerResult::status_only(NtStatus::NETWORK_NAME_DELETED);
    };
    for file in files {
        let file = file.lock().await;
        dispatcher.notifies.remove_file(&file.file_id).await;
        dispatcher.oplocks.release_file(file.file_id).await;
    }
    debug!(tree_id = tree.tree_id, share = %tree.share_name, "tree disconnected");
    HandlerResult::ok(misc_wire::tree_disconnect)
}
