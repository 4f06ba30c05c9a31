//! Per-command response serialization.

pub mod close;
pub mod create;
pub mod dir_entry;
pub mod fs_info;
pub mod info;
pub mod ioctl;
pub mod misc;
pub mod notify;
pub mod oplock;
pub mod query;
pub mod read;
pub mod tree_connect;
pub mod write;

use crate::smb2::{
    ALLOCATION_UNIT, ATTR_DIRECTORY, ATTR_NORMAL, ATTR_READONLY, ATTR_REPARSE_POINT,
};
use crate::store::{FileInfo, FileKind};

/// Windows attribute mask for a metadata record. A plain writable file
/// reports FILE_ATTRIBUTE_NORMAL alone.
pub fn file_attributes(info: &FileInfo) -> u32 {
    let mut attrs = match info.kind {
        FileKind::Directory => ATTR_DIRECTORY,
        FileKind::Symlink => ATTR_REPARSE_POINT,
        _ => 0,
    };
    if info.is_readonly() {
        attrs |= ATTR_READONLY;
    }
    if attrs == 0 {
        attrs = ATTR_NORMAL;
    }
    attrs
}

/// Size on disk, rounded up to whole allocation units.
pub fn allocation_size(size: u64) -> u64 {
    size.div_ceil(ALLOCATION_UNIT) * ALLOCATION_UNIT
}
