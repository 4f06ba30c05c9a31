//! QUERY_INFO across the file, filesystem, and security info types.

use std::io;

use super::{Dispatcher, HandlerResult, RequestContext};
use crate::parser::smb2::query_info as query_args;
use crate::security;
use crate::serializer::smb2::{fs_info as fs_wire, info as info_wire, query as query_wire};
use crate::smb2::{file_info, fs_info, InfoType};
use crate::status::NtStatus;
use crate::store::{FileInfo, FsStatistics};

/// Statistics served when the backend reports none.
const FALLBACK_STATS: FsStatistics = FsStatistics {
    total_bytes: 1 << 40,
    free_bytes: 1 << 39,
    available_bytes: 1 << 39,
};

pub async fn query_info(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    args: query_args::Args,
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
    let (handle, file_path, delete_pending, is_pipe) = {
        let file = file.lock().await;
        (file.metadata_handle.clone(), file.path.clone(), file.delete_pending, file.is_pipe)
    };
    if is_pipe {
        return HandlerResult::status_only(NtStatus::INVALID_DEVICE_REQUEST);
    }
    let services = match dispatcher.services(&tree.share_name) {
        Ok(services) => services,
        Err(status) => return HandlerResult::status_only(status),
    };
    let auth = dispatcher.auth_context(&session, ctx);

    let info = match services.meta.get_file(&auth, &handle).await {
        Ok(info) => info,
        Err(err) => return HandlerResult::status_only(err.status()),
    };

    let buffer = match args.info_type {
        t if t == InfoType::File as u8 => {
            file_class(args.info_class, &info, &file_path, delete_pending)
        }
        t if t == InfoType::Filesystem as u8 => {
            let stats = services
                .meta
                .get_filesystem_statistics(&auth)
                .await
                .unwrap_or(FALLBACK_STATS);
            filesystem_class(dispatcher, args.info_class, &stats)
        }
        t if t == InfoType::Security as u8 => {
            let acl = services.meta.get_acl(&auth, &handle).await.unwrap_or(None);
            let descriptor = match acl {
                Some(aces) => security::SecurityDescriptor {
                    owner: Some(security::Sid::local_rid(info.uid)),
                    group: Some(security::Sid::local_rid(info.gid)),
                    dacl: Some(security::nfs_to_windows(&aces, info.uid, info.gid)),
                },
                None => security::SecurityDescriptor::minimal(info.uid, info.gid),
            };
            Some(security::encode_descriptor(&descriptor))
        }
        _ => None,
    };

    match buffer {
        Some(mut buffer) => {
            // Oversized answers truncate; clients treating overflow as
            // fatal get success plus what fits.
            buffer.truncate(args.output_buffer_length as usize);
            HandlerResult::ok(|dest| query_wire::result(dest, &buffer))
        }
        None => HandlerResult::status_only(NtStatus::NOT_SUPPORTED),
    }
}

fn encode(fill: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> Option<Vec<u8>> {
    let mut buffer = Vec::new();
    fill(&mut buffer).ok()?;
    Some(buffer)
}

fn file_class(
    class: u8,
    info: &FileInfo,
    file_path: &str,
    delete_pending: bool,
) -> Option<Vec<u8>> {
    match class {
        file_info::BASIC => encode(|dest| info_wire::basic(dest, info)),
        file_info::STANDARD => encode(|dest| info_wire::standard(dest, info, delete_pending)),
        file_info::INTERNAL => encode(|dest| info_wire::internal(dest, info)),
        file_info::EA => encode(info_wire::ea),
        file_info::ACCESS => encode(info_wire::access),
        file_info::POSITION => encode(info_wire::position),
        file_info::NETWORK_OPEN => encode(|dest| info_wire::network_open(dest, info)),
        file_info::ATTRIBUTE_TAG => encode(|dest| info_wire::attribute_tag(dest, info)),
        file_info::ALL => {
            let wire_name = format!("\\{}", file_path.replace('/', "\\"));
            encode(|dest| info_wire::all(dest, info, &wire_name, delete_pending))
        }
        _ => None,
    }
}

fn filesystem_class(
    dispatcher: &Dispatcher,
    class: u8,
    stats: &FsStatistics,
) -> Option<Vec<u8>> {
    let guid = dispatcher.registry.server_guid();
    match class {
        fs_info::VOLUME => {
            let serial = u32::from_le_bytes([guid[0], guid[1], guid[2], guid[3]]);
            encode(|dest| fs_wire::volume(dest, &dispatcher.config.volume_label, serial))
        }
        fs_info::LABEL => encode(|dest| fs_wire::label(dest, &dispatcher.config.volume_label)),
        fs_info::SIZE => encode(|dest| fs_wire::size(dest, stats)),
        fs_info::DEVICE => encode(fs_wire::device),
        fs_info::ATTRIBUTE => encode(fs_wire::attribute),
        fs_info::FULL_SIZE => encode(|dest| fs_wire::full_size(dest, stats)),
        fs_info::OBJECT_ID => encode(|dest| fs_wire::object_id(dest, &guid)),
        fs_info::SECTOR_SIZE => encode(fs_wire::sector_size),
        _ => None,
    }
}
