//! CREATE request parsing, including the lease create context.

use crate::parser::primitive::{
    array, body_slice, skip, structure_size, u16, u32, utf16_string, variant32, variant8,
};
use crate::parser::{Error, Result};
use crate::smb2::{request_size, CreateDisposition, LeaseState, OplockLevel};

/// End of the fixed part of the request body.
const FIXED_END: usize = 56;

/// Name of the lease-request create context.
const CONTEXT_LEASE: &[u8] = b"RqLs";

/// Lease asked for via the `RqLs` create context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LeaseRequest {
    pub key: [u8; 16],
    pub state: LeaseState,
}

#[derive(Debug)]
pub struct Args {
    pub oplock_level: OplockLevel,
    pub desired_access: u32,
    pub file_attributes: u32,
    pub share_access: u32,
    pub disposition: CreateDisposition,
    pub create_options: u32,
    /// Share-relative name, still in wire form (backslashes).
    pub name: String,
    pub lease: Option<LeaseRequest>,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::CREATE)?;
    skip(&mut src, 1)?;
    let oplock_level: OplockLevel = variant8(&mut src)?;
    skip(&mut src, 20)?;
    let desired_access = u32(&mut src)?;
    let file_attributes = u32(&mut src)?;
    let share_access = u32(&mut src)?;
    let disposition: CreateDisposition = variant32(&mut src)?;
    let create_options = u32(&mut src)?;
    let name_offset = u16(&mut src)? as usize;
    let name_length = u16(&mut src)? as usize;
    let contexts_offset = u32(&mut src)? as usize;
    let contexts_length = u32(&mut src)? as usize;

    let name = utf16_string(body_slice(body, name_offset, FIXED_END, name_length)?)?;

    let lease = if contexts_length > 0 {
        let contexts = body_slice(body, contexts_offset, FIXED_END, contexts_length)?;
        lease_context(contexts)?
    } else {
        None
    };

    Ok(Args {
        oplock_level,
        desired_access,
        file_attributes,
        share_access,
        disposition,
        create_options,
        name,
        lease,
    })
}

/// Walks the create-context chain looking for `RqLs`. Contexts the
/// engine does not understand are skipped, per protocol.
fn lease_context(contexts: &[u8]) -> Result<Option<LeaseRequest>> {
    let mut pos = 0usize;
    loop {
        let ctx = contexts.get(pos..).ok_or(Error::OutOfBounds)?;
        if ctx.len() < 16 {
            return Ok(None);
        }
        let mut src = ctx;
        let next = u32(&mut src)? as usize;
        let name_offset = u16(&mut src)? as usize;
        let name_length = u16(&mut src)? as usize;
        skip(&mut src, 2)?;
        let data_offset = u16(&mut src)? as usize;
        let data_length = u32(&mut src)? as usize;

        let name = ctx
            .get(name_offset..name_offset + name_length)
            .ok_or(Error::OutOfBounds)?;
        if name == CONTEXT_LEASE {
            let data = ctx
                .get(data_offset..data_offset + data_length)
                .ok_or(Error::OutOfBounds)?;
            return Ok(Some(lease_request(data)?));
        }

        if next == 0 {
            return Ok(None);
        }
        pos = pos.checked_add(next).ok_or(Error::OutOfBounds)?;
    }
}

/// SMB2_CREATE_REQUEST_LEASE payload: key, state, flags, duration.
fn lease_request(data: &[u8]) -> Result<LeaseRequest> {
    if data.len() < 24 {
        return Err(Error::OutOfBounds);
    }
    let mut src = data;
    let key: [u8; 16] = array(&mut src)?;
    let bits = u32(&mut src)?;
    // Undefined bits are ignored, not rejected.
    let state = LeaseState::from_bits(bits & 0x7).unwrap_or(LeaseState::NONE);
    Ok(LeaseRequest { key, state })
}
