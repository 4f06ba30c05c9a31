//! LOCK request parsing.

use crate::parser::primitive::{array, skip, structure_size, u16, u32, u64};
use crate::parser::{Error, Result};
use crate::smb2::{request_size, FileId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LockElement {
    pub offset: u64,
    pub length: u64,
    pub flags: u32,
}

#[derive(Debug)]
pub struct Args {
    pub file_id: FileId,
    pub elements: Vec<LockElement>,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::LOCK)?;
    let lock_count = u16(&mut src)? as usize;
    if lock_count == 0 {
        return Err(Error::EmptyLockList);
    }
    skip(&mut src, 4)?;
    let file_id = array(&mut src)?;

    let mut elements = Vec::with_capacity(lock_count);
    for _ in 0..lock_count {
        let offset = u64(&mut src)?;
        let length = u64(&mut src)?;
        let flags = u32(&mut src)?;
        skip(&mut src, 4)?;
        elements.push(LockElement { offset, length, flags });
    }
    Ok(Args { file_id, elements })
}
