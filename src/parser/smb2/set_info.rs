//! SET_INFO request parsing, including the per-class payload buffers.

use crate::parser::primitive::{array, body_slice, skip, structure_size, u16, u32, u64, u8};
use crate::parser::{Error, Result};
use crate::smb2::{file_info, request_size, FileBasicInfo, FileId, InfoType};

/// End of the fixed part of the request body; the payload buffer offset
/// clamps here.
const FIXED_END: usize = 32;

/// Decoded payload of a SET_INFO request.
#[derive(Debug)]
pub enum Payload {
    Basic(FileBasicInfo),
    Rename { replace: bool, name: String },
    Disposition { delete: bool },
    EndOfFile(u64),
    Allocation(u64),
    Link,
    /// Security descriptor blob, applied as accept-and-ignore.
    Security(Vec<u8>),
    /// Classes the engine does not support; kept raw so the dispatcher
    /// can answer `STATUS_NOT_SUPPORTED` rather than a decode error.
    Other { class: u8 },
}

#[derive(Debug)]
pub struct Args {
    pub info_type: u8,
    pub info_class: u8,
    pub file_id: FileId,
    pub payload: Payload,
}

pub fn args(body: &[u8]) -> Result<Args> {
    let mut src = body;
    structure_size(&mut src, request_size::SET_INFO)?;
    let info_type = u8(&mut src)?;
    let info_class = u8(&mut src)?;
    let buffer_length = u32(&mut src)? as usize;
    let buffer_offset = u16(&mut src)? as usize;
    skip(&mut src, 6)?;
    let file_id = array(&mut src)?;

    let buffer = if buffer_length > 0 {
        body_slice(body, buffer_offset, FIXED_END, buffer_length)?
    } else {
        &[]
    };

    let payload = match info_type {
        t if t == InfoType::File as u8 => file_payload(info_class, buffer)?,
        t if t == InfoType::Security as u8 => Payload::Security(buffer.to_vec()),
        _ => Payload::Other { class: info_class },
    };
    Ok(Args { info_type, info_class, file_id, payload })
}

fn file_payload(class: u8, buffer: &[u8]) -> Result<Payload> {
    match class {
        file_info::BASIC => Ok(Payload::Basic(basic(buffer)?)),
        file_info::RENAME => rename(buffer),
        file_info::LINK => Ok(Payload::Link),
        file_info::DISPOSITION => {
            let mut src = buffer;
            Ok(Payload::Disposition { delete: u8(&mut src)? != 0 })
        }
        file_info::DISPOSITION_EX => {
            let mut src = buffer;
            Ok(Payload::Disposition { delete: u32(&mut src)? & 0x1 != 0 })
        }
        file_info::END_OF_FILE => {
            let mut src = buffer;
            Ok(Payload::EndOfFile(u64(&mut src)?))
        }
        file_info::ALLOCATION => {
            let mut src = buffer;
            Ok(Payload::Allocation(u64(&mut src)?))
        }
        other => Ok(Payload::Other { class: other }),
    }
}

/// FILE_BASIC_INFORMATION: four FILETIMEs and the attribute mask.
pub fn basic(buffer: &[u8]) -> Result<FileBasicInfo> {
    let mut src = buffer;
    Ok(FileBasicInfo {
        created: u64(&mut src)?,
        accessed: u64(&mut src)?,
        written: u64(&mut src)?,
        changed: u64(&mut src)?,
        attributes: u32(&mut src)?,
    })
}

/// FILE_RENAME_INFORMATION: flag, root handle (must be NULL here), then
/// the counted UTF-16 target name.
fn rename(buffer: &[u8]) -> Result<Payload> {
    let mut src = buffer;
    let replace = u8(&mut src)? != 0;
    skip(&mut src, 7)?;
    let root_directory = u64(&mut src)?;
    if root_directory != 0 {
        return Err(Error::OutOfBounds);
    }
    let name_length = u32(&mut src)? as usize;
    let raw = buffer.get(20..20 + name_length).ok_or(Error::OutOfBounds)?;
    Ok(Payload::Rename { replace, name: crate::parser::primitive::utf16_string(raw)? })
}
