//! WRITE response serialization.

use std::io::{self, Write};

use crate::serializer::{u16, u32};
use crate::smb2::response_size;

pub fn result(dest: &mut impl Write, count: u32) -> io::Result<()> {
    u16(dest, response_size::WRITE)?;
    u16(dest, 0)?;
    u32(dest, count)?;
    u32(dest, 0)?;
    u16(dest, 0)?;
    u16(dest, 0)
}
