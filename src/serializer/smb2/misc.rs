//! Status-only response bodies.

use std::io::{self, Write};

use crate::serializer::u16;
use crate::smb2::response_size;

fn empty(dest: &mut impl Write, structure_size: u16) -> io::Result<()> {
    u16(dest, structure_size)?;
    u16(dest, 0)
}

pub fn echo(dest: &mut impl Write) -> io::Result<()> {
    empty(dest, response_size::ECHO)
}

pub fn flush(dest: &mut impl Write) -> io::Result<()> {
    empty(dest, response_size::FLUSH)
}

pub fn lock(dest: &mut impl Write) -> io::Result<()> {
    empty(dest, response_size::LOCK)
}

pub fn tree_disconnect(dest: &mut impl Write) -> io::Result<()> {
    empty(dest, response_size::TREE_DISCONNECT)
}

pub fn logoff(dest: &mut impl Write) -> io::Result<()> {
    empty(dest, 4)
}

/// SET_INFO succeeds with just its two-byte StructureSize.
pub fn set_info(dest: &mut impl Write) -> io::Result<()> {
    u16(dest, response_size::SET_INFO)
}
