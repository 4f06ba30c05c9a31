//! CREATE response serialization, with the optional lease grant context.

use std::io::{self, Write};

use super::{allocation_size, file_attributes};
use crate::serializer::{bytes, filetime, u16, u32, u64, u8, zeros};
use crate::smb2::{response_size, CreateAction, FileId, LeaseState, HEADER_SIZE};
use crate::store::FileInfo;

/// Fixed part of the response body.
const FIXED: usize = 88;

/// Size of one serialized lease response context.
const LEASE_CONTEXT_LEN: usize = 56;

/// Lease granted alongside the open.
#[derive(Debug, Copy, Clone)]
pub struct LeaseGrant {
    pub key: [u8; 16],
    pub state: LeaseState,
}

pub struct Response<'a> {
    pub oplock_level: u8,
    pub action: CreateAction,
    pub info: &'a FileInfo,
    pub file_id: FileId,
    pub lease: Option<LeaseGrant>,
}

pub fn result(dest: &mut impl Write, resp: &Response<'_>) -> io::Result<()> {
    u16(dest, response_size::CREATE)?;
    u8(dest, resp.oplock_level)?;
    u8(dest, 0)?;
    u32(dest, resp.action as u32)?;
    filetime(dest, resp.info.created)?;
    filetime(dest, resp.info.accessed)?;
    filetime(dest, resp.info.modified)?;
    filetime(dest, resp.info.changed)?;
    u64(dest, allocation_size(resp.info.size))?;
    u64(dest, resp.info.size)?;
    u32(dest, file_attributes(resp.info))?;
    zeros(dest, 4)?;
    bytes(dest, &resp.file_id)?;
    match resp.lease {
        Some(lease) => {
            u32(dest, (HEADER_SIZE + FIXED) as u32)?;
            u32(dest, LEASE_CONTEXT_LEN as u32)?;
            lease_context(dest, &lease)
        }
        None => {
            u32(dest, 0)?;
            u32(dest, 0)
        }
    }
}

/// SMB2_CREATE_RESPONSE_LEASE context carrying the granted state.
fn lease_context(dest: &mut impl Write, lease: &LeaseGrant) -> io::Result<()> {
    u32(dest, 0)?; // Next: last context in the chain
    u16(dest, 16)?; // NameOffset
    u16(dest, 4)?; // NameLength
    u16(dest, 0)?;
    u16(dest, 24)?; // DataOffset
    u32(dest, 32)?; // DataLength
    bytes(dest, b"RqLs")?;
    zeros(dest, 4)?;
    bytes(dest, &lease.key)?;
    u32(dest, lease.state.bits())?;
    u32(dest, 0)?; // LeaseFlags
    u64(dest, 0) // LeaseDuration
}
