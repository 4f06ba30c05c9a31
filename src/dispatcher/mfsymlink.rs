//! MFsymlink payloads: the exact-1067-byte regular files some SMB
//! clients write to smuggle symlinks over the protocol.
//!
//! Layout: `XSym\n`, four-digit target length and newline, 32 hex md5
//! digits of the target and newline, the target and newline, padded
//! with spaces to 1067 bytes.

use md5::{Digest, Md5};

use crate::smb2::{MFSYMLINK_MAGIC, MFSYMLINK_SIZE};

/// Longest target a payload can carry.
const MAX_TARGET_LEN: usize = 1024;

/// Byte offset of the target text inside the payload.
const TARGET_OFFSET: usize = 5 + 5 + 33;

/// Builds the payload for a symlink target, or `None` when the target
/// does not fit the format.
pub fn build(target: &str) -> Option<Vec<u8>> {
    if target.len() > MAX_TARGET_LEN {
        return None;
    }
    let digest = Md5::digest(target.as_bytes());
    let mut payload = Vec::with_capacity(MFSYMLINK_SIZE as usize);
    payload.extend_from_slice(MFSYMLINK_MAGIC);
    payload.extend_from_slice(format!("{:04}\n", target.len()).as_bytes());
    for byte in digest {
        payload.extend_from_slice(format!("{:02x}", byte).as_bytes());
    }
    payload.push(b'\n');
    payload.extend_from_slice(target.as_bytes());
    payload.push(b'\n');
    payload.resize(MFSYMLINK_SIZE as usize, b' ');
    Some(payload)
}

/// Recovers the target from a payload; `None` if the buffer is not an
/// MFsymlink.
pub fn parse(data: &[u8]) -> Option<String> {
    if data.len() != MFSYMLINK_SIZE as usize || !data.starts_with(MFSYMLINK_MAGIC) {
        return None;
    }
    let length_line = data.get(5..10)?;
    if length_line[4] != b'\n' {
        return None;
    }
    let target_len: usize = std::str::from_utf8(&length_line[..4]).ok()?.parse().ok()?;
    if target_len > MAX_TARGET_LEN {
        return None;
    }
    let target = data.get(TARGET_OFFSET..TARGET_OFFSET + target_len)?;
    String::from_utf8(target.to_vec()).ok()
}
