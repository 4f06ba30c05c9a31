//! IOCTL response serialization.

use std::io::{self, Write};

use crate::serializer::{bytes, u16, u32, zeros};
use crate::smb2::{response_size, FileId, HEADER_SIZE};

/// Fixed part of the response body; output lands right after it.
const FIXED: usize = 48;

pub struct Response<'a> {
    pub ctl_code: u32,
    pub file_id: FileId,
    pub output: &'a [u8],
}

pub fn result(dest: &mut impl Write, resp: &Response<'_>) -> io::Result<()> {
    let buffer_offset = (HEADER_SIZE + FIXED) as u32;
    u16(dest, response_size::IOCTL)?;
    u16(dest, 0)?;
    u32(dest, resp.ctl_code)?;
    bytes(dest, &resp.file_id)?;
    u32(dest, buffer_offset)?; // InputOffset
    u32(dest, 0)?; // InputCount
    u32(dest, buffer_offset)?; // OutputOffset
    u32(dest, resp.output.len() as u32)?;
    u32(dest, 0)?; // Flags
    zeros(dest, 4)?;
    bytes(dest, resp.output)
}
