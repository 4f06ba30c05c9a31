//! File-information class buffers for QUERY_INFO.

use std::io::{self, Write};

use super::{allocation_size, file_attributes};
use crate::ftime::to_filetime;
use crate::serializer::{bytes, filetime, u32, u64, u8, utf16_bytes, zeros};
use crate::smb2::{FileBasicInfo, FILE_ALL_ACCESS, IO_REPARSE_TAG_SYMLINK};
use crate::store::{FileInfo, FileKind};

/// FILE_BASIC_INFORMATION in wire form; shared with the SET_INFO decoder
/// so the two stay byte-compatible.
pub fn basic_info(dest: &mut impl Write, info: &FileBasicInfo) -> io::Result<()> {
    u64(dest, info.created)?;
    u64(dest, info.accessed)?;
    u64(dest, info.written)?;
    u64(dest, info.changed)?;
    u32(dest, info.attributes)?;
    zeros(dest, 4)
}

fn basic_of(info: &FileInfo) -> FileBasicInfo {
    FileBasicInfo {
        created: to_filetime(info.created),
        accessed: to_filetime(info.accessed),
        written: to_filetime(info.modified),
        changed: to_filetime(info.changed),
        attributes: file_attributes(info),
    }
}

pub fn basic(dest: &mut impl Write, info: &FileInfo) -> io::Result<()> {
    basic_info(dest, &basic_of(info))
}

pub fn standard(dest: &mut impl Write, info: &FileInfo, delete_pending: bool) -> io::Result<()> {
    u64(dest, allocation_size(info.size))?;
    u64(dest, info.size)?;
    u32(dest, info.nlink)?;
    u8(dest, delete_pending as u8)?;
    u8(dest, info.is_directory() as u8)?;
    zeros(dest, 2)
}

/// IndexNumber: the first eight bytes of the file identity.
pub fn internal(dest: &mut impl Write, info: &FileInfo) -> io::Result<()> {
    bytes(dest, &info.uuid[..8])
}

pub fn ea(dest: &mut impl Write) -> io::Result<()> {
    u32(dest, 0)
}

pub fn access(dest: &mut impl Write) -> io::Result<()> {
    u32(dest, FILE_ALL_ACCESS)
}

pub fn position(dest: &mut impl Write) -> io::Result<()> {
    u64(dest, 0)
}

pub fn network_open(dest: &mut impl Write, info: &FileInfo) -> io::Result<()> {
    filetime(dest, info.created)?;
    filetime(dest, info.accessed)?;
    filetime(dest, info.modified)?;
    filetime(dest, info.changed)?;
    u64(dest, allocation_size(info.size))?;
    u64(dest, info.size)?;
    u32(dest, file_attributes(info))?;
    zeros(dest, 4)
}

pub fn attribute_tag(dest: &mut impl Write, info: &FileInfo) -> io::Result<()> {
    u32(dest, file_attributes(info))?;
    let tag = if info.kind == FileKind::Symlink { IO_REPARSE_TAG_SYMLINK } else { 0 };
    u32(dest, tag)
}

/// FILE_ALL_INFORMATION: the aggregate of the classes above plus the
/// name block.
pub fn all(
    dest: &mut impl Write,
    info: &FileInfo,
    name: &str,
    delete_pending: bool,
) -> io::Result<()> {
    basic(dest, info)?;
    standard(dest, info, delete_pending)?;
    internal(dest, info)?;
    u32(dest, 0)?; // EaSize
    u32(dest, FILE_ALL_ACCESS)?;
    u64(dest, 0)?; // CurrentByteOffset
    u32(dest, 0)?; // Mode
    u32(dest, 0)?; // AlignmentRequirement
    let encoded = utf16_bytes(name);
    u32(dest, encoded.len() as u32)?;
    bytes(dest, &encoded)
}
