//! QUERY_DIRECTORY.

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::query_directory as dir_args;
use crate::path;
use crate::serializer::smb2::{dir_entry, query as query_wire};
use crate::smb2::{QDIR_REOPEN, QDIR_RESTART_SCANS, QDIR_RETURN_SINGLE_ENTRY};
use crate::status::NtStatus;
use crate::store::DirEntry;

pub async fn query_directory(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: dir_args::Args,
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
    if !dir_entry::is_supported(args.info_class) {
        return HandlerResult::status_only(NtStatus::NOT_SUPPORTED);
    }

    let mut open = file.lock().await;
    if open.is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    if !open.is_directory {
        return HandlerResult::status_only(NtStatus::INVALID_PARAMETER);
    }

    let restart = args.flags & (QDIR_RESTART_SCANS | QDIR_REOPEN) != 0;
    if restart {
        open.enumeration_complete = false;
        open.enumeration_index = 0;
    }
    if open.enumeration_complete {
        return HandlerResult::status_only(NtStatus::NO_MORE_FILES);
    }

    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);
    let page = match services
        .meta
        .read_directory(&auth, &open.metadata_handle, 0, dispatcher.config.directory_page_size)
        .await
    {
        Ok(page) => page,
        Err(err) => return HandlerResult::status_only(err.status()),
    };

    let match_all = matches!(args.pattern.as_str(), "" | "*" | "<" | "*.*");
    let single = args.flags & QDIR_RETURN_SINGLE_ENTRY != 0;
    let mut writer = dir_entry::EntryWriter::new(args.info_class);
    let limit = args.output_buffer_length as usize;

    // A fresh scan with a match-all pattern reports the directory
    // itself and its parent first.
    let mut synthesized: Vec<DirEntry> = Vec::new();
    if match_all {
        let self_info = match services.meta.get_file(&auth, &open.metadata_handle).await {
            Ok(info) => info,
            Err(err) => return HandlerResult::status_only(err.status()),
        };
        synthesized.push(DirEntry { name: ".".to_owned(), info: self_info.clone() });
        synthesized.push(DirEntry { name: "..".to_owned(), info: self_info });
    }

    for entry in synthesized.iter().chain(page.entries.iter()) {
        if entry.info.kind.is_unix_special() {
            continue;
        }
        if entry.name != "." && entry.name != ".." && !path::matches_pattern(&args.pattern, &entry.name)
        {
            continue;
        }
        let mark = writer.mark();
        if writer.append(&entry.name, &entry.info).is_err() {
            return HandlerResult::status_only(NtStatus::INTERNAL_ERROR);
        }
        if writer.len() > limit {
            writer.reset(mark);
            break;
        }
        open.enumeration_index += 1;
        if single {
            break;
        }
    }
    open.enumeration_complete = true;
    drop(open);

    if writer.is_empty() {
        return HandlerResult::status_only(NtStatus::NO_MORE_FILES);
    }
    let buffer = writer.finish();
    HandlerResult::ok(|dest| query_wire::result(dest, &buffer))
}
