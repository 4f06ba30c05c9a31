//! TREE_CONNECT response serialization.

use std::io::{self, Write};

use crate::serializer::{u16, u32, u8};
use crate::smb2::{response_size, ShareKind};

pub struct Response {
    pub kind: ShareKind,
    pub maximal_access: u32,
}

pub fn result(dest: &mut impl Write, resp: &Response) -> io::Result<()> {
    u16(dest, response_size::TREE_CONNECT)?;
    u8(dest, resp.kind as u8)?;
    u8(dest, 0)?;
    u32(dest, 0)?;
    u32(dest, 0)?;
    u32(dest, resp.maximal_access)
}
