//! IOCTL request parsing.

use crate::parser::primitive::{array, body_slice, skip, structure_size, u32};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

/// End of the fixed part of the request body.
const FIXED_END: usize = 56;

#[derive(Debug)]
pub struct Args {
    pub ctl_code: u32,
    pub file_id: FileId,
    pub input: Vec<u8>,
    pub max_output: u32,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::IOCTL)?;
    skip(&mut src, 2)?;
    let ctl_code = u32(&mut src)?;
    let file_id = array(&mut src)?;
    let input_offset = u32(&mut src)? as usize;
    let input_count = u32(&mut src)? as usize;
    skip(&mut src, 12)?;
    let max_output = u32(&mut src)?;

    let input = if input_count > 0 {
        body_slice(body, input_offset, FIXED_END, input_count)?.to_vec()
    } else {
        Vec::new()
    };
    Ok(Args { ctl_code, file_id, input, max_output })
}
