//! TREE_CONNECT request parsing.

use crate::parser::primitive::{body_slice, skip, structure_size, u16, utf16_string};
use crate::parser::Result;
use crate::smb2::request_size;

/// End of the fixed part of the request body.
const FIXED_END: usize = 8;

#[derive(Debug)]
pub struct Args {
    /// Raw UNC path as sent, e.g. `\\server\EXPORT`.
    pub path: String,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::TREE_CONNECT)?;
    skip(&mut src, 2)?;
    let path_offset = u16(&mut src)? as usize;
    let path_length = u16(&mut src)? as usize;
    let raw = body_slice(body, path_offset, FIXED_END, path_length)?;
    Ok(Args { path: utf16_string(raw)? })
}
