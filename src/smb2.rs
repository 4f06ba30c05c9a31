//! SMB2 protocol constants ([MS-SMB2]) and the file-system control codes
//! and attribute bits ([MS-FSCC]) the engine speaks.

use num_derive::FromPrimitive;

/// Size of the SMB2 packet header. Request-body offsets on the wire are
/// header-relative; subtract this to get a body-relative offset.
pub const HEADER_SIZE: usize = 64;

/// Length of the opaque file identifier (persistent + volatile halves).
pub const FILE_ID_SIZE: usize = 16;

/// Opaque 128-bit identifier of an open file.
pub type FileId = [u8; FILE_ID_SIZE];

/// All dialects the engine serves.
pub const DIALECT_2_0_2: u16 = 0x0202;
pub const DIALECT_2_1: u16 = 0x0210;

/// SMB2 command codes (header offset 12).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
pub enum Command {
    Negotiate = 0,
    SessionSetup = 1,
    Logoff = 2,
    TreeConnect = 3,
    TreeDisconnect = 4,
    Create = 5,
    Close = 6,
    Flush = 7,
    Read = 8,
    Write = 9,
    Lock = 10,
    Ioctl = 11,
    Cancel = 12,
    Echo = 13,
    QueryDirectory = 14,
    ChangeNotify = 15,
    QueryInfo = 16,
    SetInfo = 17,
    OplockBreak = 18,
}

/// Fixed `StructureSize` values, request side.
pub mod request_size {
    pub const TREE_CONNECT: u16 = 9;
    pub const TREE_DISCONNECT: u16 = 4;
    pub const CREATE: u16 = 57;
    pub const CLOSE: u16 = 24;
    pub const FLUSH: u16 = 24;
    pub const READ: u16 = 49;
    pub const WRITE: u16 = 49;
    pub const LOCK: u16 = 48;
    pub const IOCTL: u16 = 57;
    pub const CANCEL: u16 = 4;
    pub const ECHO: u16 = 4;
    pub const QUERY_DIRECTORY: u16 = 33;
    pub const CHANGE_NOTIFY: u16 = 32;
    pub const QUERY_INFO: u16 = 41;
    pub const SET_INFO: u16 = 33;
    pub const OPLOCK_BREAK: u16 = 24;
}

/// Fixed `StructureSize` values, response side.
pub mod response_size {
    pub const TREE_CONNECT: u16 = 16;
    pub const TREE_DISCONNECT: u16 = 4;
    pub const CREATE: u16 = 89;
    pub const CLOSE: u16 = 60;
    pub const FLUSH: u16 = 4;
    pub const READ: u16 = 17;
    pub const WRITE: u16 = 17;
    pub const LOCK: u16 = 4;
    pub const IOCTL: u16 = 49;
    pub const ECHO: u16 = 4;
    pub const QUERY_DIRECTORY: u16 = 9;
    pub const CHANGE_NOTIFY: u16 = 9;
    pub const QUERY_INFO: u16 = 9;
    pub const SET_INFO: u16 = 2;
    pub const OPLOCK_BREAK: u16 = 24;
}

/// `CreateDisposition` values in the CREATE request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum CreateDisposition {
    Supersede = 0,
    Open = 1,
    Create = 2,
    OpenIf = 3,
    Overwrite = 4,
    OverwriteIf = 5,
}

/// `CreateAction` values in the CREATE response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateAction {
    Superseded = 0,
    Opened = 1,
    Created = 2,
    Overwritten = 3,
}

/// Oplock levels on the wire. `Lease` routes the request through the
/// lease path instead of the legacy per-path oplock table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
pub enum OplockLevel {
    None = 0,
    II = 1,
    Exclusive = 8,
    Batch = 9,
    Lease = 0xFF,
}

/// Share types in the TREE_CONNECT response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShareKind {
    Disk = 0x01,
    Pipe = 0x02,
}

/// CreateOptions bits the engine honors.
pub const FILE_DIRECTORY_FILE: u32 = 0x0000_0001;
pub const FILE_NON_DIRECTORY_FILE: u32 = 0x0000_0040;
pub const FILE_DELETE_ON_CLOSE: u32 = 0x0000_1000;

/// [MS-FSCC] file attribute bits.
pub const ATTR_READONLY: u32 = 0x0000_0001;
pub const ATTR_HIDDEN: u32 = 0x0000_0002;
pub const ATTR_SYSTEM: u32 = 0x0000_0004;
pub const ATTR_DIRECTORY: u32 = 0x0000_0010;
pub const ATTR_ARCHIVE: u32 = 0x0000_0020;
pub const ATTR_NORMAL: u32 = 0x0000_0080;
pub const ATTR_REPARSE_POINT: u32 = 0x0000_0400;

/// Access masks surfaced as TREE_CONNECT `MaximalAccess`.
/// Read covers generic read + execute rights; ReadWrite adds generic
/// write and Delete; Admin is full file access.
pub const MAXIMAL_ACCESS_READ: u32 = 0x0012_00A9;
pub const MAXIMAL_ACCESS_READ_WRITE: u32 = 0x0013_01BF;
pub const MAXIMAL_ACCESS_ADMIN: u32 = 0x001F_01FF;
/// `/ipc$` is capped to bare read/write rights.
pub const MAXIMAL_ACCESS_PIPE: u32 = 0x0000_001F;

/// Granted-access answer for QUERY_INFO FileAccessInformation.
pub const FILE_ALL_ACCESS: u32 = 0x001F_01FF;

/// CLOSE request flags.
pub const CLOSE_FLAG_POSTQUERY_ATTRIB: u16 = 0x0001;

/// LOCK element flag bits.
pub const LOCKFLAG_SHARED: u32 = 0x0000_0001;
pub const LOCKFLAG_EXCLUSIVE: u32 = 0x0000_0002;
pub const LOCKFLAG_UNLOCK: u32 = 0x0000_0004;
pub const LOCKFLAG_FAIL_IMMEDIATELY: u32 = 0x0000_0010;

/// QUERY_DIRECTORY request flags.
pub const QDIR_RESTART_SCANS: u8 = 0x01;
pub const QDIR_RETURN_SINGLE_ENTRY: u8 = 0x02;
pub const QDIR_INDEX_SPECIFIED: u8 = 0x04;
pub const QDIR_REOPEN: u8 = 0x10;

/// CHANGE_NOTIFY flags.
pub const NOTIFY_WATCH_TREE: u16 = 0x0001;

/// CHANGE_NOTIFY completion-filter bits.
pub const FILTER_FILE_NAME: u32 = 0x0000_0001;
pub const FILTER_DIR_NAME: u32 = 0x0000_0002;
pub const FILTER_ATTRIBUTES: u32 = 0x0000_0004;
pub const FILTER_SIZE: u32 = 0x0000_0008;
pub const FILTER_LAST_WRITE: u32 = 0x0000_0010;
pub const FILTER_LAST_ACCESS: u32 = 0x0000_0020;
pub const FILTER_CREATION: u32 = 0x0000_0040;
pub const FILTER_SECURITY: u32 = 0x0000_0100;

/// FILE_NOTIFY_INFORMATION action values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyAction {
    Added = 1,
    Removed = 2,
    Modified = 3,
    RenamedOld = 4,
    RenamedNew = 5,
}

/// QUERY_INFO / SET_INFO `InfoType`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum InfoType {
    File = 0x01,
    Filesystem = 0x02,
    Security = 0x03,
    Quota = 0x04,
}

/// [MS-FSCC] FileInformation classes the engine answers or applies.
pub mod file_info {
    pub const DIRECTORY: u8 = 1;
    pub const FULL_DIRECTORY: u8 = 2;
    pub const BOTH_DIRECTORY: u8 = 3;
    pub const BASIC: u8 = 4;
    pub const STANDARD: u8 = 5;
    pub const INTERNAL: u8 = 6;
    pub const EA: u8 = 7;
    pub const ACCESS: u8 = 8;
    pub const RENAME: u8 = 10;
    pub const LINK: u8 = 11;
    pub const NAMES: u8 = 12;
    pub const DISPOSITION: u8 = 13;
    pub const POSITION: u8 = 14;
    pub const ALL: u8 = 18;
    pub const ALLOCATION: u8 = 19;
    pub const END_OF_FILE: u8 = 20;
    pub const NETWORK_OPEN: u8 = 34;
    pub const ATTRIBUTE_TAG: u8 = 35;
    pub const ID_BOTH_DIRECTORY: u8 = 37;
    pub const ID_FULL_DIRECTORY: u8 = 38;
    pub const DISPOSITION_EX: u8 = 64;
}

/// [MS-FSCC] FsInformation classes.
pub mod fs_info {
    pub const VOLUME: u8 = 1;
    pub const LABEL: u8 = 2;
    pub const SIZE: u8 = 3;
    pub const DEVICE: u8 = 4;
    pub const ATTRIBUTE: u8 = 5;
    pub const FULL_SIZE: u8 = 7;
    pub const OBJECT_ID: u8 = 8;
    pub const SECTOR_SIZE: u8 = 11;
}

/// FILE_BASIC_INFORMATION in wire form: raw FILETIMEs plus the
/// attribute mask. Zero-valued times mean "leave unchanged" on SET_INFO.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FileBasicInfo {
    pub created: u64,
    pub accessed: u64,
    pub written: u64,
    pub changed: u64,
    pub attributes: u32,
}

/// Lease state bit-set: Read = 1, Handle = 2, Write = 4. Call sites use
/// the predicates, not the raw bits.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LeaseState(u32);

impl LeaseState {
    pub const NONE: LeaseState = LeaseState(0);
    pub const READ: LeaseState = LeaseState(1);
    pub const HANDLE: LeaseState = LeaseState(2);
    pub const WRITE: LeaseState = LeaseState(4);
    pub const READ_HANDLE: LeaseState = LeaseState(1 | 2);

    /// Accepts any combination of the three defined bits; anything else
    /// is not a lease state.
    pub fn from_bits(bits: u32) -> Option<LeaseState> {
        if bits & !0x7 != 0 {
            return None;
        }
        Some(LeaseState(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn read(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn handle(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn write(self) -> bool {
        self.0 & 4 != 0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: LeaseState) -> LeaseState {
        LeaseState(self.0 | other.0)
    }

    /// Directories may only cache reads and handles.
    pub fn valid_for_directory(self) -> bool {
        self == LeaseState::NONE || self == LeaseState::READ || self == LeaseState::READ_HANDLE
    }
}

/// FSCTL codes dispatched by IOCTL.
pub const FSCTL_PIPE_TRANSCEIVE: u32 = 0x0011_C017;
pub const FSCTL_GET_REPARSE_POINT: u32 = 0x0009_00A8;
pub const FSCTL_VALIDATE_NEGOTIATE_INFO: u32 = 0x0014_0204;

/// Reparse tag emitted for symlinks.
pub const IO_REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;

/// Filesystem geometry reported to clients.
pub const ALLOCATION_UNIT: u64 = 4096;
pub const SECTOR_SIZE: u32 = 512;

/// FileFsDeviceInformation `DeviceType` for disks.
pub const FILE_DEVICE_DISK: u32 = 0x0000_0007;

/// FileFsAttributeInformation bits: case-sensitive + case-preserved.
pub const FS_ATTRIBUTE_FLAGS: u32 = 0x0000_0003;

/// Exact size of an MFsymlink payload file.
pub const MFSYMLINK_SIZE: u64 = 1067;
/// Magic the payload begins with.
pub const MFSYMLINK_MAGIC: &[u8; 5] = b"XSym\n";
