//! CLOSE request parsing.

use crate::parser::primitive::{array, skip, structure_size, u16};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

#[derive(Debug)]
pub struct Args {
    /// `SMB2_CLOSE_FLAG_POSTQUERY_ATTRIB` is the only defined bit.
    pub flags: u16,
    pub file_id: FileId,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::CLOSE)?;
    let flags = u16(&mut src)?;
    skip(&mut src, 4)?;
    let file_id = array(&mut src)?;
    Ok(Args { flags, file_id })
}
