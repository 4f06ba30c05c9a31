//! OPLOCK_BREAK acknowledgment parsing. The same command code carries
//! legacy oplock acks (StructureSize 24) and lease acks (StructureSize
//! 36); the leading field picks the layout.

use crate::parser::primitive::{array, skip, u16, u32, u8};
use crate::parser::{Error, Result};
use crate::smb2::{request_size, FileId, LeaseState};

#[derive(Debug)]
pub enum Args {
    /// Legacy acknowledgment. Only levels None (0) and II (1) are
    /// legal; the oplock manager rejects the rest.
    Oplock { level: u8, file_id: FileId },
    /// Lease acknowledgment carrying the state the client kept.
    Lease { key: [u8; 16], state: LeaseState },
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    let structure_size = u16(&mut src)?;
    match structure_size {
        s if s == request_size::OPLOCK_BREAK => {
            let level = u8(&mut src)?;
            skip(&mut src, 5)?;
            let file_id = array(&mut src)?;
            Ok(Args::Oplock { level, file_id })
        }
        36 => {
            skip(&mut src, 6)?; // Reserved + Flags
            let key: [u8; 16] = array(&mut src)?;
            let bits = u32(&mut src)?;
            let state = LeaseState::from_bits(bits).ok_or(Error::EnumDiscMismatch)?;
            Ok(Args::Lease { key, state })
        }
        found => Err(Error::StructureSizeMismatch {
            expected: request_size::OPLOCK_BREAK,
            found,
        }),
    }
}
