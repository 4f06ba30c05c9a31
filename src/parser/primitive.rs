//! Primitive wire-format parsing utilities.
//!
//! SMB2 bodies are little-endian with UTF-16LE strings. Offsets carried
//! inside request bodies are relative to the start of the SMB2 header;
//! [`body_offset`] rebases them onto the body buffer.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use super::{Error, Result};
use crate::smb2::HEADER_SIZE;

pub fn u8(src: &mut impl Read) -> Result<u8> {
    src.read_u8().map_err(Error::IO)
}

pub fn u16(src: &mut impl Read) -> Result<u16> {
    src.read_u16::<LittleEndian>().map_err(Error::IO)
}

pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<LittleEndian>().map_err(Error::IO)
}

pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<LittleEndian>().map_err(Error::IO)
}

/// Reads a fixed-size byte array, no padding.
pub fn array<const N: usize>(src: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(Error::IO)?;
    Ok(buf)
}

/// Reads and discards `n` bytes.
pub fn skip(src: &mut impl Read, n: usize) -> Result<()> {
    let mut remaining = n;
    let mut buf = [0u8; 16];
    while remaining > 0 {
        let chunk = remaining.min(buf.len());
        src.read_exact(&mut buf[..chunk]).map_err(Error::IO)?;
        remaining -= chunk;
    }
    Ok(())
}

/// Validates the leading `StructureSize` field of a request body.
pub fn structure_size(src: &mut impl Read, expected: u16) -> Result<()> {
    let found = u16(src)?;
    if found != expected {
        return Err(Error::StructureSizeMismatch { expected, found });
    }
    Ok(())
}

/// Reads a wire enum discriminant encoded as `u32`.
pub fn variant32<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    FromPrimitive::from_u32(u32(src)?).ok_or(Error::EnumDiscMismatch)
}

/// Reads a wire enum discriminant encoded as a single byte.
pub fn variant8<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    FromPrimitive::from_u8(u8(src)?).ok_or(Error::EnumDiscMismatch)
}

/// Rebases a header-relative offset onto the body buffer, clamped to the
/// end of the fixed part so variable data can never alias the fixed
/// fields.
pub fn body_offset(wire_offset: usize, fixed_end: usize) -> usize {
    wire_offset.saturating_sub(HEADER_SIZE).max(fixed_end)
}

/// Borrows `len` bytes of variable request data at a rebased offset.
pub fn body_slice(body: &[u8], wire_offset: usize, fixed_end: usize, len: usize) -> Result<&[u8]> {
    let start = body_offset(wire_offset, fixed_end);
    let end = start.checked_add(len).ok_or(Error::OutOfBounds)?;
    body.get(start..end).ok_or(Error::OutOfBounds)
}

/// Decodes a UTF-16LE buffer into a string. The byte length must be even.
pub fn utf16_string(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Utf16);
    }
    let units: Vec<u16> =
        bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
    String::from_utf16(&units).map_err(|_| Error::Utf16)
}
