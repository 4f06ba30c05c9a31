//! CHANGE_NOTIFY registration and CANCEL.

use tracing::debug;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::notify::Watcher;
use crate::parser::smb2::change_notify as notify_args;
use crate::smb2::NOTIFY_WATCH_TREE;
use crate::status::NtStatus;

/// Registers the watcher and answers `STATUS_PENDING`; the real payload
/// arrives later through the notify sink under the original message id.
pub async fn change_notify(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: notify_args::Args,
) -> HandlerResult {
    if let Err(status) = dispatcher.session(ctx).await {
        return HandlerResult::status_only(status);
    }
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    let file = match dispatcher.file(ctx, &args.file_id).await {
        Ok(file) => file,
        Err(status) => return HandlerResult::status_only(status),
    };
    let (is_directory, watch_path) = {
        let file = file.lock().await;
        (file.is_directory, file.path.clone())
    };
    if !is_directory {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    }

    dispatcher
        .notifies
        .register(Watcher {
            file_id: args.file_id,
            session_id: ctx.session_id,
            message_id: ctx.message_id,
            share_name: tree.share_name.clone(),
            watch_path,
            completion_filter: args.completion_filter,
            watch_tree: args.flags & NOTIFY_WATCH_TREE != 0,
            max_output_length: args.output_buffer_length,
        })
        .await;
    debug!(message_id = ctx.message_id, "change-notify watcher armed");
    HandlerResult::status_only(NtStatus::PENDING)
}

/// CANCEL never answers for itself; the canceled request completes with
/// `STATUS_CANCELLED` through the sink.
pub async fn cancel(dispatcher: &Dispatcher, ctx: &RequestContext) -> Option<HandlerResult> {
    ctx.cancel.cancel();
    if dispatcher.session(ctx).await.is_ok() {
        dispatcher.notifies.cancel(ctx.session_id, ctx.message_id).await;
    }
    None
}
