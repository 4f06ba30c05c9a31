//! ECHO, LOGOFF, and FLUSH.

use tracing::warn;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::flush as flush_args;
use crate::serializer::smb2::misc as misc_wire;
use crate::status::NtStatus;

/// ECHO is stateless: no session required.
pub fn echo() -> HandlerResult {
    HandlerResult::ok(misc_wire::echo)
}

pub async fn logoff(dispatcher: &Dispatcher, ctx: &RequestContext) -> HandlerResult {
    if dispatcher.session(ctx).await.is_err() {
        return HandlerResult::status_only(NtStatus::USER_SESSION_DELETED);
    }
    dispatcher.remove_session(ctx.session_id).await;
    HandlerResult::ok(misc_wire::logoff)
}

pub async fn flush(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: flush_args::Args,
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
    let (content_id, is_pipe) = {
        let file = file.lock().await;
        (file.content_id.clone(), file.is_pipe)
    };
    if is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    if let Some(content_id) = content_id {
        if let Some(cache) = dispatcher.registry.get_cache_for_share(&tree.share_name) {
            if let Err(err) = cache.flush_and_finalize(&content_id).await {
                warn!(?err, %content_id, "flush-and-finalize failed");
                return HandlerResult::status_only(err.status());
            }
        }
    }
    HandlerResult::ok(misc_wire::flush)
}
