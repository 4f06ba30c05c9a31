//! OPLOCK_BREAK / lease-break acknowledgments.

use num_traits::FromPrimitive;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::oplock_break as ack_args;
use crate::serializer::smb2::oplock as oplock_wire;
use crate::smb2::OplockLevel;
use crate::status::NtStatus;

pub async fn acknowledge(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: ack_args::Args,
) -> HandlerResult {
    if let Err(status) = dispatcher.session(ctx).await {
        return HandlerResult::status_only(status);
    }
    match args {
        ack_args::Args::Oplock { level, file_id } => {
            if dispatcher.file(ctx, &file_id).await.is_err() {
                return HandlerResult::status_only(NtStatus::INVALID_HANDLE);
            }
            let Some(level) = OplockLevel::from_u8(level) else {
                return HandlerResult::status_only(NtStatus::INVALID_OPLOCK_PROTOCOL);
            };
            match dispatcher.oplocks.acknowledge_oplock(file_id, level).await {
                Ok(accepted) => HandlerResult::ok(|dest| {
                    oplock_wire::oplock_break(dest, file_id, accepted as u8)
                }),
                Err(()) => HandlerResult::status_only(NtStatus::INVALID_OPLOCK_PROTOCOL),
            }
        }
        ack_args::Args::Lease { key, state } => {
            match dispatcher.oplocks.acknowledge_lease(key, state).await {
                Ok(Some(accepted)) => {
                    HandlerResult::ok(|dest| oplock_wire::lease_ack(dest, &key, accepted))
                }
                Ok(None) => HandlerResult::status_only(NtStatus::INVALID_OPLOCK_PROTOCOL),
                Err(err) => HandlerResult::status_only(err.status()),
            }
        }
    }
}
