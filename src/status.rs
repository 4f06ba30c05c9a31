//! NT status codes returned in every SMB2 response header.

use std::fmt;

/// 32-bit NT status code ([MS-ERREF] 2.3).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);
    pub const PENDING: NtStatus = NtStatus(0x0000_0103);
    /// Completion status for a pending CHANGE_NOTIFY whose directory
    /// handle was closed.
    pub const NOTIFY_CLEANUP: NtStatus = NtStatus(0x0000_010B);
    /// Informational: output truncated to the client's buffer. Downgraded
    /// to SUCCESS on the wire, some clients mishandle it.
    pub const BUFFER_OVERFLOW: NtStatus = NtStatus(0x8000_0005);
    pub const NO_MORE_FILES: NtStatus = NtStatus(0x8000_0006);
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008);
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000_000D);
    pub const INVALID_DEVICE_REQUEST: NtStatus = NtStatus(0xC000_0010);
    pub const END_OF_FILE: NtStatus = NtStatus(0xC000_0011);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC000_0035);
    pub const OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000_003A);
    pub const LOCK_NOT_GRANTED: NtStatus = NtStatus(0xC000_0055);
    pub const DELETE_PENDING: NtStatus = NtStatus(0xC000_0056);
    pub const INVALID_OPLOCK_PROTOCOL: NtStatus = NtStatus(0xC000_005E);
    pub const RANGE_NOT_LOCKED: NtStatus = NtStatus(0xC000_007E);
    pub const FILE_IS_A_DIRECTORY: NtStatus = NtStatus(0xC000_00BA);
    pub const NOT_SUPPORTED: NtStatus = NtStatus(0xC000_00BB);
    pub const NETWORK_NAME_DELETED: NtStatus = NtStatus(0xC000_00C9);
    pub const BAD_NETWORK_NAME: NtStatus = NtStatus(0xC000_00CC);
    pub const INTERNAL_ERROR: NtStatus = NtStatus(0xC000_00E5);
    pub const DIRECTORY_NOT_EMPTY: NtStatus = NtStatus(0xC000_0101);
    pub const NOT_A_DIRECTORY: NtStatus = NtStatus(0xC000_0103);
    pub const CANCELLED: NtStatus = NtStatus(0xC000_0120);
    pub const FILE_CLOSED: NtStatus = NtStatus(0xC000_0128);
    pub const USER_SESSION_DELETED: NtStatus = NtStatus(0xC000_0203);

    /// Severity bits 31..30 are `11` for error-class codes.
    pub fn is_error(self) -> bool {
        self.0 & 0xC000_0000 == 0xC000_0000
    }

    pub fn is_success(self) -> bool {
        self == NtStatus::SUCCESS
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NtStatus({:#010X})", self.0)
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}
