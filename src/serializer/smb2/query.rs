//! Shared 9-byte response wrapper for QUERY_INFO, QUERY_DIRECTORY, and
//! CHANGE_NOTIFY deliveries: the output buffer always sits at header
//! offset 72.

use std::io::{self, Write};

use crate::serializer::{bytes, u16, u32};
use crate::smb2::HEADER_SIZE;

/// Fixed part of the wrapper, before the output buffer.
const FIXED: usize = 8;

pub fn result(dest: &mut impl Write, buffer: &[u8]) -> io::Result<()> {
    u16(dest, 9)?;
    u16(dest, (HEADER_SIZE + FIXED) as u16)?;
    u32(dest, buffer.len() as u32)?;
    bytes(dest, buffer)
}
