//! FLUSH request parsing.

use crate::parser::primitive::{array, skip, structure_size};
use crate::parser::Result;
use crate::smb2::{request_size, FileId};

#[derive(Debug)]
pub struct Args {
    pub file_id: FileId,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::FLUSH)?;
    skip(&mut src, 6)?;
    let file_id = array(&mut src)?;
    Ok(Args { file_id })
}
