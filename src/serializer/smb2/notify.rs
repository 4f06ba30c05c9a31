//! FILE_NOTIFY_INFORMATION encoding for CHANGE_NOTIFY deliveries.

use crate::serializer::utf16_bytes;
use crate::smb2::NotifyAction;

/// Encodes a chain of notify entries. Entries are 4-byte aligned and
/// linked via `NextEntryOffset`; the last entry keeps zero there.
pub fn events(changes: &[(NotifyAction, String)]) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    let mut prev: Option<usize> = None;

    for (action, name) in changes {
        let aligned = buf.len().div_ceil(4) * 4;
        buf.resize(aligned, 0);

        if let Some(pos) = prev {
            let distance = (aligned - pos) as u32;
            buf[pos..pos + 4].copy_from_slice(&distance.to_le_bytes());
        }
        prev = Some(aligned);

        let encoded = utf16_bytes(name);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&(*action as u32).to_le_bytes());
        buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        buf.extend_from_slice(&encoded);
    }
    buf
}
