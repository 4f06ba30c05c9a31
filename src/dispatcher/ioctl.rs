//! IOCTL dispatch by control code.

use std::io::{self, Write as _};

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::primitive as parse;
use crate::parser::smb2::ioctl as ioctl_args;
use crate::serializer::{self, smb2::ioctl as ioctl_wire, utf16_bytes};
use crate::smb2::{
    FileId, DIALECT_2_0_2, DIALECT_2_1, FSCTL_GET_REPARSE_POINT, FSCTL_PIPE_TRANSCEIVE,
    FSCTL_VALIDATE_NEGOTIATE_INFO, IO_REPARSE_TAG_SYMLINK,
};
use crate::status::NtStatus;

/// FileId a client must address FSCTL_VALIDATE_NEGOTIATE_INFO to.
const NULL_FILE_ID: FileId = [0xFF; 16];

pub async fn ioctl(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: ioctl_args::Args,
) -> HandlerResult {
    let session = match dispatcher.session(ctx).await {
        Ok(session) => session,
        Err(status) => return HandlerResult::status_only(status),
    };
    match args.ctl_code {
        FSCTL_VALIDATE_NEGOTIATE_INFO => validate_negotiate(dispatcher, &args),
        FSCTL_GET_REPARSE_POINT => get_reparse_point(dispatcher, ctx, &session, &args).await,
        FSCTL_PIPE_TRANSCEIVE => {
            let Ok(file) = dispatcher.file(ctx, &args.file_id).await else {
                return HandlerResult::status_only(NtStatus::INVALID_HANDLE);
            };
            if !file.lock().await.is_pipe {
                // Pipe transceive against a disk handle is a category
                // error, not an unsupported code.
                return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
            }
            HandlerResult::status_only(NtStatus::NOT_SUPPORTED)
        }
        _ => HandlerResult::status_only(NtStatus::NOT_SUPPORTED),
    }
}

/// Re-derives the dialect choice from the client's list and answers with
/// the server identity, proving the original negotiation was untampered.
fn validate_negotiate(dispatcher: &Dispatcher, args: &ioctl_args::Args) -> HandlerResult {
    if args.file_id != NULL_FILE_ID {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    }
    let mut src = args.input.as_slice();
    let Ok(_capabilities) = parse::u32(&mut src) else {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    };
    if parse::skip(&mut src, 16).is_err() {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    }
    let Ok(security_mode) = parse::u16(&mut src) else {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    };
    let Ok(dialect_count) = parse::u16(&mut src) else {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    };
    let mut best: Option<u16> = None;
    for _ in 0..dialect_count {
        let Ok(dialect) = parse::u16(&mut src) else {
            return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
        };
        if matches!(dialect, DIALECT_2_0_2 | DIALECT_2_1) && Some(dialect) > best {
            best = Some(dialect);
        }
    }
    let Some(dialect) = best else {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    };

    let guid = dispatcher.registry.server_guid();
    let output = {
        let mut out = Vec::with_capacity(24);
        let dest: &mut Vec<u8> = &mut out;
        let encoded: io::Result<()> = (|| {
            serializer::u32(dest, 0)?; // Capabilities
            dest.write_all(&guid)?;
            serializer::u16(dest, security_mode)?;
            serializer::u16(dest, dialect)
        })();
        if encoded.is_err() {
            return HandlerResult::status_only(NtStatus::INTERNAL_ERROR);
        }
        out
    };
    let response = ioctl_wire::Response {
        ctl_code: FSCTL_VALIDATE_NEGOTIATE_INFO,
        file_id: NULL_FILE_ID,
        output: &output,
    };
    HandlerResult::ok(|dest| ioctl_wire::result(dest, &response))
}

/// SYMBOLIC_LINK_REPARSE_DATA_BUFFER for a symlink handle.
async fn get_reparse_point(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    session: &crate::handles::Session,
    args: &ioctl_args::Args,
) -> HandlerResult {
    let tree = match dispatcher.tree(ctx).await {
        Ok(tree) => tree,
        Err(status) => return HandlerResult::status_only(status),
    };
    let file = match dispatcher.file(ctx, &args.file_id).await {
        Ok(file) => file,
        Err(status) => return HandlerResult::status_only(status),
    };
    let (handle, stored_target) = {
        let file = file.lock().await;
        (file.metadata_handle.clone(), file.symlink_target.clone())
    };

    let target = match stored_target {
        Some(target) => target,
        None => {
            let services = match dispatcher.services(&tree.share_name) {
                Ok(services) => services,
                Err(status) => return HandlerResult::status_only(status),
            };
            let auth = dispatcher.auth_context(session, ctx);
            match services.meta.read_symlink(&auth, &handle).await {
                Ok(target) => target,
                Err(err) => return HandlerResult::status_only(err.status()),
            }
        }
    };

    let name = utf16_bytes(&target.replace('/', "\\"));
    let output = {
        let mut out = Vec::new();
        let encoded: io::Result<()> = (|| {
            let dest: &mut Vec<u8> = &mut out;
            serializer::u32(dest, IO_REPARSE_TAG_SYMLINK)?;
            serializer::u16(dest, (12 + 2 * name.len()) as u16)?; // ReparseDataLength
            serializer::u16(dest, 0)?;
            serializer::u16(dest, 0)?; // SubstituteNameOffset
            serializer::u16(dest, name.len() as u16)?;
            serializer::u16(dest, name.len() as u16)?; // PrintNameOffset
            serializer::u16(dest, name.len() as u16)?;
            serializer::u32(dest, 0x1)?; // SYMLINK_FLAG_RELATIVE
            serializer::bytes(dest, &name)?;
            serializer::bytes(dest, &name)
        })();
        if encoded.is_err() {
            return HandlerResult::status_only(NtStatus::INTERNAL_ERROR);
        }
        out
    };
    let response = ioctl_wire::Response {
        ctl_code: FSCTL_GET_REPARSE_POINT,
        file_id: args.file_id,
        output: &output,
    };
    HandlerResult::ok(|dest| ioctl_wire::result(dest, &response))
}
