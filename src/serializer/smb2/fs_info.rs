//! Filesystem-information class buffers for QUERY_INFO.

use std::io::{self, Write};

use crate::serializer::{bytes, u32, u64, u8, utf16_bytes, zeros};
use crate::smb2::{
    ALLOCATION_UNIT, FILE_DEVICE_DISK, FS_ATTRIBUTE_FLAGS, SECTOR_SIZE,
};
use crate::store::FsStatistics;

/// FileFsVolumeInformation.
pub fn volume(dest: &mut impl Write, label: &str, serial: u32) -> io::Result<()> {
    u64(dest, 0)?; // VolumeCreationTime: unknown
    u32(dest, serial)?;
    let encoded = utf16_bytes(label);
    u32(dest, encoded.len() as u32)?;
    u8(dest, 0)?; // SupportsObjects
    u8(dest, 0)?;
    bytes(dest, &encoded)
}

/// FileFsLabelInformation.
pub fn label(dest: &mut impl Write, label: &str) -> io::Result<()> {
    let encoded = utf16_bytes(label);
    u32(dest, encoded.len() as u32)?;
    bytes(dest, &encoded)
}

/// FileFsSizeInformation: sizes in allocation units of 4096 bytes.
pub fn size(dest: &mut impl Write, stats: &FsStatistics) -> io::Result<()> {
    u64(dest, stats.total_bytes / ALLOCATION_UNIT)?;
    u64(dest, stats.available_bytes / ALLOCATION_UNIT)?;
    u32(dest, (ALLOCATION_UNIT as u32) / SECTOR_SIZE)?;
    u32(dest, SECTOR_SIZE)
}

/// FileFsFullSizeInformation.
pub fn full_size(dest: &mut impl Write, stats: &FsStatistics) -> io::Result<()> {
    u64(dest, stats.total_bytes / ALLOCATION_UNIT)?;
    u64(dest, stats.available_bytes / ALLOCATION_UNIT)?;
    u64(dest, stats.free_bytes / ALLOCATION_UNIT)?;
    u32(dest, (ALLOCATION_UNIT as u32) / SECTOR_SIZE)?;
    u32(dest, SECTOR_SIZE)
}

/// FileFsDeviceInformation.
pub fn device(dest: &mut impl Write) -> io::Result<()> {
    u32(dest, FILE_DEVICE_DISK)?;
    u32(dest, 0)
}

/// FileFsAttributeInformation: case-sensitive, case-preserving, "NTFS".
pub fn attribute(dest: &mut impl Write) -> io::Result<()> {
    u32(dest, FS_ATTRIBUTE_FLAGS)?;
    u32(dest, 255)?;
    let name = utf16_bytes("NTFS");
    u32(dest, name.len() as u32)?;
    bytes(dest, &name)
}

/// FileFsObjectIdInformation: the server GUID plus empty extended info.
pub fn object_id(dest: &mut impl Write, guid: &[u8; 16]) -> io::Result<()> {
    bytes(dest, guid)?;
    zeros(dest, 48)
}

/// FileFsSectorSizeInformation.
pub fn sector_size(dest: &mut impl Write) -> io::Result<()> {
    u32(dest, SECTOR_SIZE)?;
    u32(dest, SECTOR_SIZE)?;
    u32(dest, SECTOR_SIZE)?;
    u32(dest, SECTOR_SIZE)?;
    u32(dest, 0)?; // Flags
    u32(dest, 0)?;
    u32(dest, 0)
}
