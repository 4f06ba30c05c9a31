//! WRITE request parsing.

use crate::parser::primitive::{array, body_offset, skip, structure_size, u16, u32, u64};
use crate::parser::{Error, Result};
use crate::smb2::{request_size, FileId};

/// End of the fixed part of the request body.
const FIXED_END: usize = 48;

#[derive(Debug)]
pub struct Args {
    pub offset: u64,
    pub file_id: FileId,
    pub data: Vec<u8>,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::WRITE)?;
    let data_offset = u16(&mut src)? as usize;
    let length = u32(&mut src)? as usize;
    let offset = u64(&mut src)?;
    let file_id = array(&mut src)?;
    skip(&mut src, 12)?;

    let data = data_window(body, data_offset, length)?.to_vec();
    Ok(Args { offset, file_id, data })
}

/// Resolves the payload window. Clients that send a zero `DataOffset`
/// fall back to the fixed-part end, or to the tail of the body when the
/// buffer is exactly `length` bytes short of that.
fn data_window(body: &[u8], data_offset: usize, length: usize) -> Result<&[u8]> {
    if length == 0 {
        return Ok(&[]);
    }
    let start = if data_offset > 0 {
        body_offset(data_offset, FIXED_END)
    } else if body.len() >= FIXED_END + length {
        FIXED_END
    } else {
        body.len().checked_sub(length).ok_or(Error::OutOfBounds)?
    };
    let end = start.checked_add(length).ok_or(Error::OutOfBounds)?;
    body.get(start..end).ok_or(Error::OutOfBounds)
}
