//! QUERY_DIRECTORY request parsing.

use crate::parser::primitive::{array, body_slice, structure_size, u16, u32, u8, utf16_string};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

/// End of the fixed part of the request body.
const FIXED_END: usize = 32;

#[derive(Debug)]
pub struct Args {
    pub info_class: u8,
    pub flags: u8,
    pub file_index: u32,
    pub file_id: FileId,
    /// Search pattern; empty means match-all.
    pub pattern: String,
    pub output_buffer_length: u32,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::QUERY_DIRECTORY)?;
    let info_class = u8(&mut src)?;
    let flags = u8(&mut src)?;
    let file_index = u32(&mut src)?;
    let file_id = array(&mut src)?;
    let name_offset = u16(&mut src)? as usize;
    let name_length = u16(&mut src)? as usize;
    let output_buffer_length = u32(&mut src)?;

    let pattern = if name_length > 0 {
        utf16_string(body_slice(body, name_offset, FIXED_END, name_length)?)?
    } else {
        String::new()
    };
    Ok(Args { info_class, flags, file_index, file_id, pattern, output_buffer_length })
}
