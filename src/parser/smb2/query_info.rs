//! QUERY_INFO request parsing.

use crate::parser::primitive::{array, skip, structure_size, u32, u8};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

#[derive(Debug)]
pub struct Args {
    pub info_type: u8,
    pub info_class: u8,
    pub output_buffer_length: u32,
    pub additional_information: u32,
    pub file_id: FileId,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::QUERY_INFO)?;
    let info_type = u8(&mut src)?;
    let info_class = u8(&mut src)?;
    let output_buffer_length = u32(&mut src)?;
    skip(&mut src, 8)?;
    let additional_information = u32(&mut src)?;
    skip(&mut src, 4)?;
    let file_id = array(&mut src)?;
    Ok(Args { info_type, info_class, output_buffer_length, additional_information, file_id })
}
