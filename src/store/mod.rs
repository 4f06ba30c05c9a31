//! Backing-store contracts the engine dispatches against.
//!
//! The engine owns no durable state. Metadata, file content, the block
//! cache, and the unified lock store are reached exclusively through the
//! traits below; a deployment wires concrete services into a
//! [`Registry`] and hands it to the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::AuthContext;
use crate::ftime::UnixTime;
use crate::smb2::LeaseState;
use crate::status::NtStatus;

/// Result alias used by all store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Enumerated failure codes reported by the backing stores.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StoreError {
    /// The named entry or object does not exist.
    NotFound,
    /// An entry with the requested name already exists.
    Exists,
    /// The caller's identity may not perform the operation.
    PermissionDenied,
    /// A conflicting byte-range lock or lease blocks the operation.
    Locked,
    /// No matching lock record to release.
    LockNotFound,
    /// A non-directory operation was attempted on a directory.
    IsDirectory,
    /// A directory operation was attempted on a non-directory.
    NotDirectory,
    /// Directory removal was attempted while entries remain.
    NotEmpty,
    /// Malformed handle, name, or argument.
    InvalidArgument,
    /// The request's cancellation source fired mid-operation.
    Cancelled,
    /// Hard backend I/O failure.
    Io,
}

impl StoreError {
    /// The single shared translation from store failures to NT status.
    pub fn status(self) -> NtStatus {
        match self {
            StoreError::NotFound => NtStatus::OBJECT_NAME_NOT_FOUND,
            StoreError::Exists => NtStatus::OBJECT_NAME_COLLISION,
            StoreError::PermissionDenied => NtStatus::ACCESS_DENIED,
            StoreError::Locked => NtStatus::LOCK_NOT_GRANTED,
            StoreError::LockNotFound => NtStatus::RANGE_NOT_LOCKED,
            StoreError::IsDirectory => NtStatus::FILE_IS_A_DIRECTORY,
            StoreError::NotDirectory => NtStatus::NOT_A_DIRECTORY,
            StoreError::NotEmpty => NtStatus::DIRECTORY_NOT_EMPTY,
            StoreError::InvalidArgument => NtStatus::INVALID_PARAMETER,
            StoreError::Cancelled => NtStatus::CANCELLED,
            StoreError::Io => NtStatus::INTERNAL_ERROR,
        }
    }
}

/// Opaque handle the metadata service assigns to an inode. An empty
/// handle addresses the share root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodeHandle(pub Vec<u8>);

impl NodeHandle {
    pub fn root() -> Self {
        NodeHandle(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

/// POSIX-ish node kinds reported by the metadata service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Fifo,
    Socket,
    BlockDevice,
    CharDevice,
}

impl FileKind {
    /// FIFO, socket, and device nodes have no SMB representation and are
    /// filtered out of directory listings.
    pub fn is_unix_special(self) -> bool {
        matches!(
            self,
            FileKind::Fifo | FileKind::Socket | FileKind::BlockDevice | FileKind::CharDevice
        )
    }
}

/// Metadata record for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub handle: NodeHandle,
    /// Stable 128-bit identity; the first 8 bytes answer
    /// FileInternalInformation.
    pub uuid: [u8; 16],
    pub kind: FileKind,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub nlink: u32,
    pub created: UnixTime,
    pub accessed: UnixTime,
    pub modified: UnixTime,
    pub changed: UnixTime,
    /// Identifier of the content blob, when one has been allocated.
    pub content_id: Option<String>,
}

impl FileInfo {
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Owner write bits gone means read-only as far as SMB attributes go.
    pub fn is_readonly(&self) -> bool {
        self.mode & 0o200 == 0
    }
}

/// Attribute mutations, unset fields untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetAttrs {
    pub size: Option<u64>,
    pub readonly: Option<bool>,
    pub created: Option<UnixTime>,
    pub accessed: Option<UnixTime>,
    pub modified: Option<UnixTime>,
}

/// What CREATE asks the metadata service to make.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateKind {
    File,
    Directory,
}

/// One directory entry with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub info: FileInfo,
}

/// A page of directory entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DirPage {
    pub entries: Vec<DirEntry>,
    /// No further pages remain after this one.
    pub end: bool,
}

/// Read plan handed back by [`MetadataService::prepare_read`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan {
    pub content_id: Option<String>,
    pub size: u64,
}

/// In-flight write token. Data lands in content/cache first; only
/// [`MetadataService::commit_write`] makes the new size visible.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub handle: NodeHandle,
    pub content_id: String,
    pub new_size: u64,
}

/// One byte-range lock as the metadata service tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLock {
    pub session_id: u64,
    pub offset: u64,
    pub length: u64,
    pub exclusive: bool,
}

/// Filesystem statistics for the QUERY_INFO filesystem classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FsStatistics {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

/// Metadata service: namespace, attributes, the two-phase write pipeline,
/// and POSIX byte-range locks.
///
/// A failed [`commit_write`](Self::commit_write) after a successful data
/// write leaves the bytes durable with stale metadata; the engine
/// surfaces the commit error and performs no rollback.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn lookup(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<FileInfo>;

    async fn get_file(&self, ctx: &AuthContext, handle: &NodeHandle) -> StoreResult<FileInfo>;

    async fn create(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
        kind: CreateKind,
        attrs: SetAttrs,
    ) -> StoreResult<FileInfo>;

    async fn set_file_attributes(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        attrs: SetAttrs,
    ) -> StoreResult<FileInfo>;

    async fn move_entry(
        &self,
        ctx: &AuthContext,
        from_parent: &NodeHandle,
        from_name: &str,
        to_parent: &NodeHandle,
        to_name: &str,
    ) -> StoreResult<()>;

    async fn remove_file(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<()>;

    async fn remove_directory(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<()>;

    /// Reads one page of entries starting at `offset` entries into the
    /// directory.
    async fn read_directory(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        offset: usize,
        max_entries: usize,
    ) -> StoreResult<DirPage>;

    async fn read_symlink(&self, ctx: &AuthContext, handle: &NodeHandle) -> StoreResult<String>;

    async fn create_symlink(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
        target: &str,
    ) -> StoreResult<FileInfo>;

    /// Validates read access and resolves the content identifier.
    async fn prepare_read(&self, ctx: &AuthContext, handle: &NodeHandle)
        -> StoreResult<ReadPlan>;

    /// Phase one of a write: allocate/locate the content blob and stage
    /// the new size.
    async fn prepare_write(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        new_size: u64,
    ) -> StoreResult<WriteOp>;

    /// Phase two: publish size and modification time.
    async fn commit_write(&self, ctx: &AuthContext, op: &WriteOp) -> StoreResult<FileInfo>;

    async fn lock_file(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        lock: FileLock,
    ) -> StoreResult<()>;

    async fn unlock_file(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        lock: FileLock,
    ) -> StoreResult<()>;

    /// Fails with [`StoreError::Locked`] when a conflicting range held by
    /// another session overlaps the I/O window.
    async fn check_lock_for_io(
        &self,
        ctx: &AuthContext,
        handle: &NodeHandle,
        session_id: u64,
        offset: u64,
        length: u64,
        write: bool,
    ) -> StoreResult<()>;

    async fn get_filesystem_statistics(&self, ctx: &AuthContext) -> StoreResult<FsStatistics>;

    /// Janitorial sweep on session teardown: drop every byte-range lock
    /// the session still holds. Backends without per-owner tracking may
    /// leave this as the no-op default.
    async fn release_session_locks(&self, _session_id: u64) -> StoreResult<()> {
        Ok(())
    }

    /// NFSv4 ACL of a node, when the backend keeps one. The default is
    /// "no ACL": QUERY_INFO then answers with the minimal descriptor.
    async fn get_acl(
        &self,
        _ctx: &AuthContext,
        _handle: &NodeHandle,
    ) -> StoreResult<Option<Vec<crate::security::NfsAce>>> {
        Ok(None)
    }
}

/// Content (payload/block) service addressed by opaque blob identifiers.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Reads the whole object.
    async fn read_content(&self, id: &str) -> StoreResult<Vec<u8>>;

    /// Positional read. `Ok(None)` means the service cannot read at an
    /// offset and the caller should fall back to
    /// [`read_content`](Self::read_content).
    async fn read_at(
        &self,
        _id: &str,
        _offset: u64,
        _buf: &mut [u8],
    ) -> StoreResult<Option<usize>> {
        Ok(None)
    }

    async fn write_at(&self, id: &str, offset: u64, data: &[u8]) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Lifecycle of a blob inside the block cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheState {
    None,
    Prefetching,
    Cached,
    Buffering,
    Uploading,
}

impl CacheState {
    /// States in which cached bytes are authoritative for reads.
    pub fn is_readable(self) -> bool {
        matches!(self, CacheState::Buffering | CacheState::Uploading | CacheState::Cached)
    }
}

/// Block cache fronting the content service.
#[async_trait]
pub trait BlockCache: Send + Sync {
    async fn read_at(&self, id: &str, offset: u64, buf: &mut [u8]) -> StoreResult<usize>;

    async fn write_at(&self, id: &str, offset: u64, data: &[u8]) -> StoreResult<()>;

    async fn size(&self, id: &str) -> StoreResult<Option<u64>>;

    async fn state(&self, id: &str) -> CacheState;

    /// Drains buffered data towards the content service.
    async fn flush_and_finalize(&self, id: &str) -> StoreResult<()>;
}

/// Lease record persisted through the lock store.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseRecord {
    pub key: [u8; 16],
    pub state: LeaseState,
    pub epoch: u16,
    pub breaking: bool,
    pub break_to: LeaseState,
    pub break_started: Option<UnixTime>,
}

/// One record in the unified lock store. SMB leases coexist here with
/// POSIX locks owned by other protocol heads.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRecord {
    /// Owner id; SMB leases use `smb:lease:<hex-key>`.
    pub owner: String,
    /// Share-qualified path of the locked file.
    pub file: String,
    pub is_lease: bool,
    pub lease: Option<LeaseRecord>,
}

/// Filter for [`LockStore::list_locks`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockQuery {
    pub file: Option<String>,
    pub is_lease: Option<bool>,
}

/// Unified lock store shared across protocol heads.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Inserts or replaces the record keyed by `(owner, file)`.
    async fn put_lock(&self, record: LockRecord) -> StoreResult<()>;

    async fn delete_lock(&self, owner: &str, file: &str) -> StoreResult<()>;

    async fn list_locks(&self, query: &LockQuery) -> StoreResult<Vec<LockRecord>>;
}

/// Per-share configuration out of the share registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareConfig {
    /// Normalized: lowercase with a leading `/`.
    pub name: String,
    pub read_only: bool,
    /// Permission granted to guest sessions with no user record.
    pub guest_permission: crate::auth::SharePermission,
}

/// User record used to derive backend identities and share permissions.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

/// User/share registry.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, username: &str) -> StoreResult<UserRecord>;

    /// User-specific permission override for a share, if any.
    async fn share_permission(
        &self,
        username: &str,
        share: &str,
    ) -> StoreResult<Option<crate::auth::SharePermission>>;
}

/// Entry point tying the services together per share.
pub trait Registry: Send + Sync {
    fn get_share(&self, name: &str) -> Option<ShareConfig>;

    fn get_root_handle(&self, share: &str) -> Option<NodeHandle>;

    fn get_metadata_service(&self, share: &str) -> Option<Arc<dyn MetadataService>>;

    fn get_content_service(&self, share: &str) -> Option<Arc<dyn ContentService>>;

    fn get_cache_for_share(&self, share: &str) -> Option<Arc<dyn BlockCache>>;

    fn get_lock_store(&self) -> Arc<dyn LockStore>;

    fn get_user_store(&self) -> Arc<dyn UserStore>;

    /// GUID reported by FileFsObjectIdInformation and
    /// FSCTL_VALIDATE_NEGOTIATE_INFO.
    fn server_guid(&self) -> [u8; 16];
}
