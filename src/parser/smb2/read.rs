//! READ request parsing.

use crate::parser::primitive::{array, skip, structure_size, u32, u64};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

#[derive(Debug)]
pub struct Args {
    pub length: u32,
    pub offset: u64,
    pub file_id: FileId,
    pub minimum_count: u32,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::READ)?;
    skip(&mut src, 2)?;
    let length = u32(&mut src)?;
    let offset = u64(&mut src)?;
    let file_id = array(&mut src)?;
    let minimum_count = u32(&mut src)?;
    Ok(Args { length, offset, file_id, minimum_count })
}
