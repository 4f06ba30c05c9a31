//! CLOSE response serialization.

use std::io::{self, Write};

use super::{allocation_size, file_attributes};
use crate::serializer::{filetime, u16, u32, u64, zeros};
use crate::smb2::{response_size, CLOSE_FLAG_POSTQUERY_ATTRIB};
use crate::store::FileInfo;

/// Attribute block is filled only when the client set POSTQUERY_ATTRIB.
pub fn result(dest: &mut impl Write, info: Option<&FileInfo>) -> io::Result<()> {
    u16(dest, response_size::CLOSE)?;
    match info {
        Some(info) => {
            u16(dest, CLOSE_FLAG_POSTQUERY_ATTRIB)?;
            u32(dest, 0)?;
            filetime(dest, info.created)?;
            filetime(dest, info.accessed)?;
            filetime(dest, info.modified)?;
            filetime(dest, info.changed)?;
            u64(dest, allocation_size(info.size))?;
            u64(dest, info.size)?;
            u32(dest, file_attributes(info))
        }
        None => zeros(dest, 58),
    }
}
