//! SMB2 response-body serialization.
//!
//! Responses are little-endian with UTF-16LE strings and FILETIME
//! timestamps. Offsets emitted into response bodies are relative to the
//! start of the SMB2 header, so a buffer at body offset `n` is announced
//! as `HEADER_SIZE + n`.

pub mod smb2;

#[cfg(test)]
mod tests;

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ftime::{self, UnixTime};

pub fn u8(dest: &mut dyn Write, n: u8) -> io::Result<()> {
    dest.write_u8(n)
}

pub fn u16(dest: &mut dyn Write, n: u16) -> io::Result<()> {
    dest.write_u16::<LittleEndian>(n)
}

pub fn u32(dest: &mut dyn Write, n: u32) -> io::Result<()> {
    dest.write_u32::<LittleEndian>(n)
}

pub fn u64(dest: &mut dyn Write, n: u64) -> io::Result<()> {
    dest.write_u64::<LittleEndian>(n)
}

pub fn bytes(dest: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    dest.write_all(data)
}

/// Writes `n` zero bytes (reserved fields, alignment padding).
pub fn zeros(dest: &mut dyn Write, n: usize) -> io::Result<()> {
    const ZERO: [u8; 8] = [0u8; 8];
    let mut remaining = n;
    while remaining > 0 {
        let chunk = remaining.min(ZERO.len());
        dest.write_all(&ZERO[..chunk])?;
        remaining -= chunk;
    }
    Ok(())
}

/// Serializes a timestamp as a FILETIME tick count.
pub fn filetime(dest: &mut dyn Write, time: UnixTime) -> io::Result<()> {
    u64(dest, ftime::to_filetime(time))
}

/// Encodes a string as UTF-16LE bytes.
pub fn utf16_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}
