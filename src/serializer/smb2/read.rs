//! READ response serialization.

use std::io::{self, Write};

use crate::serializer::{bytes, u16, u32, u8};
use crate::smb2::{response_size, HEADER_SIZE};

/// Fixed part is 16 bytes, so data always lands at header offset 0x50.
const DATA_OFFSET: u8 = (HEADER_SIZE + 16) as u8;

pub fn result(dest: &mut impl Write, data: &[u8], remaining: u32) -> io::Result<()> {
    u16(dest, response_size::READ)?;
    u8(dest, DATA_OFFSET)?;
    u8(dest, 0)?;
    u32(dest, data.len() as u32)?;
    u32(dest, remaining)?;
    u32(dest, 0)?;
    bytes(dest, data)
}
