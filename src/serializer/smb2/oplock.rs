//! OPLOCK_BREAK and lease-break wire bodies: the acknowledgment
//! response and the server-initiated notifications the transport sends.

use std::io::{self, Write};

use crate::serializer::{bytes, u16, u32, u64, u8, zeros};
use crate::smb2::{response_size, FileId, LeaseState};

/// Shared layout of the break notification and the acknowledgment
/// response.
pub fn oplock_break(dest: &mut impl Write, file_id: FileId, level: u8) -> io::Result<()> {
    u16(dest, response_size::OPLOCK_BREAK)?;
    u8(dest, level)?;
    zeros(dest, 5)?;
    bytes(dest, &file_id)
}

/// Lease break acknowledgment response (StructureSize 36).
pub fn lease_ack(dest: &mut impl Write, key: &[u8; 16], state: LeaseState) -> io::Result<()> {
    u16(dest, 36)?;
    u16(dest, 0)?;
    u32(dest, 0)?; // Flags
    bytes(dest, key)?;
    u32(dest, state.bits())?;
    u64(dest, 0) // LeaseDuration
}

/// Lease break notification (StructureSize 44). `ACK_REQUIRED` is always
/// set: the engine waits for the acknowledgment or the scanner timeout.
pub fn lease_break(
    dest: &mut impl Write,
    key: &[u8; 16],
    current: LeaseState,
    target: LeaseState,
    new_epoch: u16,
) -> io::Result<()> {
    u16(dest, 44)?;
    u16(dest, new_epoch)?;
    u32(dest, 0x01)?;
    bytes(dest, key)?;
    u32(dest, current.bits())?;
    u32(dest, target.bits())?;
    u32(dest, 0)?; // BreakReason
    u32(dest, 0)?; // AccessMaskHint
    u32(dest, 0) // ShareMaskHint
}
