//! CHANGE_NOTIFY request parsing.

use crate::parser::primitive::{array, skip, structure_size, u16, u32};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

#[derive(Debug)]
pub struct Args {
    pub flags: u16,
    pub output_buffer_length: u32,
    pub file_id: FileId,
    pub completion_filter: u32,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::CHANGE_NOTIFY)?;
    let flags = u16(&mut src)?;
    let output_buffer_length = u32(&mut src)?;
    let file_id = array(&mut src)?;
    let completion_filter = u32(&mut src)?;
    skip(&mut src, 4)?;
    Ok(Args { flags, output_buffer_length, file_id, completion_filter })
}
