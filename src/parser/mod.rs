//! SMB2 request-body parsing.
//!
//! The transport strips framing and the 64-byte packet header; what
//! arrives here is the command body. Every decode failure collapses to
//! `STATUS_INVALID_PARAMETER` at the dispatch boundary.

pub mod primitive;
pub mod smb2;

#[cfg(test)]
mod tests;

use std::io;

use crate::smb2::Command;

/// Result of parsing operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Request decode failures.
#[derive(Debug)]
pub enum Error {
    /// Body truncated or unreadable.
    IO(io::Error),
    /// The leading `StructureSize` field does not match the command.
    StructureSizeMismatch { expected: u16, found: u16 },
    /// A wire enum field carried an undefined discriminant.
    EnumDiscMismatch,
    /// A string buffer was not valid UTF-16LE.
    Utf16,
    /// An offset/length pair points outside the body.
    OutOfBounds,
    /// LOCK carried zero lock elements.
    EmptyLockList,
}

/// Decoded arguments for one engine command.
#[derive(Debug)]
pub enum Arguments {
    Logoff,
    TreeConnect(smb2::tree_connect::Args),
    TreeDisconnect,
    Create(smb2::create::Args),
    Close(smb2::close::Args),
    Flush(smb2::flush::Args),
    Read(smb2::read::Args),
    Write(smb2::write::Args),
    Lock(smb2::lock::Args),
    Ioctl(smb2::ioctl::Args),
    Cancel,
    Echo,
    QueryDirectory(smb2::query_directory::Args),
    ChangeNotify(smb2::change_notify::Args),
    QueryInfo(smb2::query_info::Args),
    SetInfo(smb2::set_info::Args),
    OplockBreak(smb2::oplock_break::Args),
}

/// Decodes the body of an engine-dispatched command.
///
/// NEGOTIATE and SESSION_SETUP never reach this point; the transport
/// answers them during connection establishment.
pub fn parse_body(command: Command, body: &[u8]) -> Result<Arguments> {
    match command {
        Command::Logoff => {
            smb2::misc::logoff(body)?;
            Ok(Arguments::Logoff)
        }
        Command::TreeConnect => Ok(Arguments::TreeConnect(smb2::tree_connect::args(body)?)),
        Command::TreeDisconnect => {
            smb2::misc::tree_disconnect(body)?;
            Ok(Arguments::TreeDisconnect)
        }
        Command::Create => Ok(Arguments::Create(smb2::create::args(body)?)),
        Command::Close => Ok(Arguments::Close(smb2::close::args(body)?)),
        Command::Flush => Ok(Arguments::Flush(smb2::flush::args(body)?)),
        Command::Read => Ok(Arguments::Read(smb2::read::args(body)?)),
        Command::Write => Ok(Arguments::Write(smb2::write::args(body)?)),
        Command::Lock => Ok(Arguments::Lock(smb2::lock::args(body)?)),
        Command::Ioctl => Ok(Arguments::Ioctl(smb2::ioctl::args(body)?)),
        Command::Cancel => {
            smb2::misc::cancel(body)?;
            Ok(Arguments::Cancel)
        }
        Command::Echo => {
            smb2::misc::echo(body)?;
            Ok(Arguments::Echo)
        }
        Command::QueryDirectory => {
            Ok(Arguments::QueryDirectory(smb2::query_directory::args(body)?))
        }
        Command::ChangeNotify => Ok(Arguments::ChangeNotify(smb2::change_notify::args(body)?)),
        Command::QueryInfo => Ok(Arguments::QueryInfo(smb2::query_info::args(body)?)),
        Command::SetInfo => Ok(Arguments::SetInfo(smb2::set_info::args(body)?)),
        Command::OplockBreak => Ok(Arguments::OplockBreak(smb2::oplock_break::args(body)?)),
        Command::Negotiate | Command::SessionSetup => Err(Error::EnumDiscMismatch),
    }
}
