//! Bodies that carry nothing beyond their `StructureSize`.

use crate::parser::primitive::structure_size;
use crate::parser::Result;
use crate::smb2::request_size;

pub fn echo(body: &[u8]) -> Result<()> {
    let mut src = body;
    structure_size(&mut src, request_size::ECHO)
}

pub fn cancel(body: &[u8]) -> Result<()> {
    let mut src = body;
    structure_size(&mut src, request_size::CANCEL)
}

pub fn tree_disconnect(body: &[u8]) -> Result<()> {
    let mut src = body;
    structure_size(&mut src, request_size::TREE_DISCONNECT)
}

pub fn logoff(body: &[u8]) -> Result<()> {
    let mut src = body;
    structure_size(&mut src, 4)
}
