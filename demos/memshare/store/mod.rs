//! Fully in-memory backing store: a metadata tree, a blob store, a
//! write-through block cache, a lock store, and a user registry wired
//! into one [`Registry`]. Backs the demo binary and the integration
//! suite.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smb_mamont::auth::{AuthContext, SharePermission};
use smb_mamont::ftime::UnixTime;
use smb_mamont::store::{
    BlockCache, CacheState, ContentService, CreateKind, DirEntry, DirPage, FileInfo, FileKind,
    FileLock, FsStatistics, LockQuery, LockRecord, LockStore, MetadataService, NodeHandle,
    ReadPlan, Registry, SetAttrs, ShareConfig, StoreError, StoreResult, UserRecord, UserStore,
    WriteOp,
};

const ROOT_ID: u64 = 1;

#[derive(Debug, Clone)]
struct Node {
    id: u64,
    kind: FileKind,
    size: u64,
    uid: u32,
    gid: u32,
    mode: u32,
    created: UnixTime,
    accessed: UnixTime,
    modified: UnixTime,
    changed: UnixTime,
    content_id: Option<String>,
    target: Option<String>,
    children: BTreeMap<String, u64>,
}

impl Node {
    fn new(id: u64, kind: FileKind, uid: u32, gid: u32) -> Node {
        let now = UnixTime::now();
        Node {
            id,
            kind,
            size: 0,
            uid,
            gid,
            mode: if kind == FileKind::Directory { 0o755 } else { 0o644 },
            created: now,
            accessed: now,
            modified: now,
            changed: now,
            content_id: None,
            target: None,
            children: BTreeMap::new(),
        }
    }

    fn uuid(&self) -> [u8; 16] {
        let mut uuid = [0u8; 16];
        uuid[..8].copy_from_slice(&self.id.to_le_bytes());
        uuid[8..].copy_from_slice(b"memshare");
        uuid
    }

    fn info(&self) -> FileInfo {
        FileInfo {
            handle: encode_handle(self.id),
            uuid: self.uuid(),
            kind: self.kind,
            size: self.size,
            uid: self.uid,
            gid: self.gid,
            mode: self.mode,
            nlink: 1,
            created: self.created,
            accessed: self.accessed,
            modified: self.modified,
            changed: self.changed,
            content_id: self.content_id.clone(),
        }
    }
}

fn encode_handle(id: u64) -> NodeHandle {
    NodeHandle(id.to_le_bytes().to_vec())
}

fn decode_handle(handle: &NodeHandle) -> StoreResult<u64> {
    if handle.is_root() {
        return Ok(ROOT_ID);
    }
    let bytes: [u8; 8] =
        handle.0.as_slice().try_into().map_err(|_| StoreError::InvalidArgument)?;
    Ok(u64::from_le_bytes(bytes))
}

fn overlaps(a_offset: u64, a_length: u64, b_offset: u64, b_length: u64) -> bool {
    a_offset < b_offset.saturating_add(b_length) && b_offset < a_offset.saturating_add(a_length)
}

/// Metadata tree plus the POSIX byte-range lock table.
pub struct MemMetadata {
    nodes: Mutex<HashMap<u64, Node>>,
    locks: Mutex<Vec<(u64, FileLock)>>,
    next_id: AtomicU64,
}

impl Default for MemMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MemMetadata {
    pub fn new() -> MemMetadata {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID, Node::new(ROOT_ID, FileKind::Directory, 0, 0));
        MemMetadata {
            nodes: Mutex::new(nodes),
            locks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(ROOT_ID + 1),
        }
    }

    pub fn root_handle(&self) -> NodeHandle {
        encode_handle(ROOT_ID)
    }

    fn with_node<T>(
        &self,
        handle: &NodeHandle,
        read: impl FnOnce(&Node) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let id = decode_handle(handle)?;
        let nodes = self.nodes.lock().unwrap();
        read(nodes.get(&id).ok_or(StoreError::NotFound)?)
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl MetadataService for MemMetadata {
    async fn lookup(
        &self,
        _ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<FileInfo> {
        let parent_id = decode_handle(parent)?;
        let nodes = self.nodes.lock().unwrap();
        let dir = nodes.get(&parent_id).ok_or(StoreError::NotFound)?;
        if dir.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        let child_id = dir.children.get(name).ok_or(StoreError::NotFound)?;
        Ok(nodes.get(child_id).ok_or(StoreError::NotFound)?.info())
    }

    async fn get_file(&self, _ctx: &AuthContext, handle: &NodeHandle) -> StoreResult<FileInfo> {
        self.with_node(handle, |node| Ok(node.info()))
    }

    async fn create(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
        kind: CreateKind,
        attrs: SetAttrs,
    ) -> StoreResult<FileInfo> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument);
        }
        let parent_id = decode_handle(parent)?;
        let id = self.alloc_id();
        let mut nodes = self.nodes.lock().unwrap();
        let dir = nodes.get_mut(&parent_id).ok_or(StoreError::NotFound)?;
        if dir.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        if dir.children.contains_key(name) {
            return Err(StoreError::Exists);
        }
        dir.children.insert(name.to_owned(), id);
        dir.modified = UnixTime::now();

        let node_kind = match kind {
            CreateKind::File => FileKind::Regular,
            CreateKind::Directory => FileKind::Directory,
        };
        let mut node = Node::new(id, node_kind, ctx.identity.uid, ctx.identity.gid);
        if attrs.readonly == Some(true) {
            node.mode &= !0o222;
        }
        if let Some(created) = attrs.created {
            node.created = created;
        }
        let info = node.info();
        nodes.insert(id, node);
        Ok(info)
    }

    async fn set_file_attributes(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        attrs: SetAttrs,
    ) -> StoreResult<FileInfo> {
        let id = decode_handle(handle)?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(size) = attrs.size {
            node.size = size;
            node.modified = UnixTime::now();
        }
        if let Some(readonly) = attrs.readonly {
            if readonly {
                node.mode &= !0o222;
            } else {
                node.mode |= 0o200;
            }
        }
        if let Some(created) = attrs.created {
            node.created = created;
        }
        if let Some(accessed) = attrs.accessed {
            node.accessed = accessed;
        }
        if let Some(modified) = attrs.modified {
            node.modified = modified;
        }
        node.changed = UnixTime::now();
        Ok(node.info())
    }

    async fn move_entry(
        &self,
        _ctx: &AuthContext,
        from_parent: &NodeHandle,
        from_name: &str,
        to_parent: &NodeHandle,
        to_name: &str,
    ) -> StoreResult<()> {
        let from_id = decode_handle(from_parent)?;
        let to_id = decode_handle(to_parent)?;
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.get(&to_id).ok_or(StoreError::NotFound)?.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        let moved = {
            let from = nodes.get_mut(&from_id).ok_or(StoreError::NotFound)?;
            from.children.remove(from_name).ok_or(StoreError::NotFound)?
        };
        {
            let to = nodes.get_mut(&to_id).ok_or(StoreError::NotFound)?;
            to.children.insert(to_name.to_owned(), moved);
            to.modified = UnixTime::now();
        }
        if let Some(node) = nodes.get_mut(&moved) {
            node.changed = UnixTime::now();
        }
        Ok(())
    }

    async fn remove_file(
        &self,
        _ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<()> {
        let parent_id = decode_handle(parent)?;
        let mut nodes = self.nodes.lock().unwrap();
        let child_id = {
            let dir = nodes.get(&parent_id).ok_or(StoreError::NotFound)?;
            *dir.children.get(name).ok_or(StoreError::NotFound)?
        };
        if nodes.get(&child_id).ok_or(StoreError::NotFound)?.kind == FileKind::Directory {
            return Err(StoreError::IsDirectory);
        }
        nodes.get_mut(&parent_id).map(|dir| dir.children.remove(name));
        nodes.remove(&child_id);
        Ok(())
    }

    async fn remove_directory(
        &self,
        _ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
    ) -> StoreResult<()> {
        let parent_id = decode_handle(parent)?;
        let mut nodes = self.nodes.lock().unwrap();
        let child_id = {
            let dir = nodes.get(&parent_id).ok_or(StoreError::NotFound)?;
            *dir.children.get(name).ok_or(StoreError::NotFound)?
        };
        let child = nodes.get(&child_id).ok_or(StoreError::NotFound)?;
        if child.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        if !child.children.is_empty() {
            return Err(StoreError::NotEmpty);
        }
        nodes.get_mut(&parent_id).map(|dir| dir.children.remove(name));
        nodes.remove(&child_id);
        Ok(())
    }

    async fn read_directory(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        offset: usize,
        max_entries: usize,
    ) -> StoreResult<DirPage> {
        let id = decode_handle(handle)?;
        let nodes = self.nodes.lock().unwrap();
        let dir = nodes.get(&id).ok_or(StoreError::NotFound)?;
        if dir.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        let entries: Vec<DirEntry> = dir
            .children
            .iter()
            .skip(offset)
            .take(max_entries)
            .filter_map(|(name, child_id)| {
                nodes.get(child_id).map(|child| DirEntry {
                    name: name.clone(),
                    info: child.info(),
                })
            })
            .collect();
        let end = offset + entries.len() >= dir.children.len();
        Ok(DirPage { entries, end })
    }

    async fn read_symlink(&self, _ctx: &AuthContext, handle: &NodeHandle) -> StoreResult<String> {
        self.with_node(handle, |node| {
            node.target.clone().ok_or(StoreError::InvalidArgument)
        })
    }

    async fn create_symlink(
        &self,
        ctx: &AuthContext,
        parent: &NodeHandle,
        name: &str,
        target: &str,
    ) -> StoreResult<FileInfo> {
        let parent_id = decode_handle(parent)?;
        let id = self.alloc_id();
        let mut nodes = self.nodes.lock().unwrap();
        let dir = nodes.get_mut(&parent_id).ok_or(StoreError::NotFound)?;
        if dir.kind != FileKind::Directory {
            return Err(StoreError::NotDirectory);
        }
        if dir.children.contains_key(name) {
            return Err(StoreError::Exists);
        }
        dir.children.insert(name.to_owned(), id);
        let mut node = Node::new(id, FileKind::Symlink, ctx.identity.uid, ctx.identity.gid);
        node.target = Some(target.to_owned());
        node.size = target.len() as u64;
        let info = node.info();
        nodes.insert(id, node);
        Ok(info)
    }

    async fn prepare_read(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
    ) -> StoreResult<ReadPlan> {
        self.with_node(handle, |node| {
            if node.kind == FileKind::Directory {
                return Err(StoreError::IsDirectory);
            }
            Ok(ReadPlan { content_id: node.content_id.clone(), size: node.size })
        })
    }

    async fn prepare_write(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        new_size: u64,
    ) -> StoreResult<WriteOp> {
        let id = decode_handle(handle)?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&id).ok_or(StoreError::NotFound)?;
        if node.kind == FileKind::Directory {
            return Err(StoreError::IsDirectory);
        }
        let content_id =
            node.content_id.get_or_insert_with(|| format!("blob-{}", id)).clone();
        Ok(WriteOp { handle: handle.clone(), content_id, new_size })
    }

    async fn commit_write(&self, _ctx: &AuthContext, op: &WriteOp) -> StoreResult<FileInfo> {
        let id = decode_handle(&op.handle)?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&id).ok_or(StoreError::NotFound)?;
        node.size = node.size.max(op.new_size);
        node.content_id = Some(op.content_id.clone());
        node.modified = UnixTime::now();
        node.changed = node.modified;
        Ok(node.info())
    }

    async fn lock_file(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        lock: FileLock,
    ) -> StoreResult<()> {
        let id = decode_handle(handle)?;
        let mut locks = self.locks.lock().unwrap();
        let conflict = locks.iter().any(|(node, held)| {
            *node == id
                && held.session_id != lock.session_id
                && overlaps(held.offset, held.length, lock.offset, lock.length)
                && (held.exclusive || lock.exclusive)
        });
        if conflict {
            return Err(StoreError::Locked);
        }
        locks.push((id, lock));
        Ok(())
    }

    async fn unlock_file(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        lock: FileLock,
    ) -> StoreResult<()> {
        let id = decode_handle(handle)?;
        let mut locks = self.locks.lock().unwrap();
        let position = locks.iter().position(|(node, held)| {
            *node == id
                && held.session_id == lock.session_id
                && held.offset == lock.offset
                && held.length == lock.length
        });
        match position {
            Some(at) => {
                locks.remove(at);
                Ok(())
            }
            None => Err(StoreError::LockNotFound),
        }
    }

    async fn check_lock_for_io(
        &self,
        _ctx: &AuthContext,
        handle: &NodeHandle,
        session_id: u64,
        offset: u64,
        length: u64,
        write: bool,
    ) -> StoreResult<()> {
        let id = decode_handle(handle)?;
        let locks = self.locks.lock().unwrap();
        let conflict = locks.iter().any(|(node, held)| {
            *node == id
                && held.session_id != session_id
                && overlaps(held.offset, held.length, offset, length)
                && (held.exclusive || write)
        });
        if conflict {
            return Err(StoreError::Locked);
        }
        Ok(())
    }

    async fn get_filesystem_statistics(&self, _ctx: &AuthContext) -> StoreResult<FsStatistics> {
        Ok(FsStatistics {
            total_bytes: 8 << 30,
            free_bytes: 6 << 30,
            available_bytes: 6 << 30,
        })
    }

    async fn release_session_locks(&self, session_id: u64) -> StoreResult<()> {
        self.locks.lock().unwrap().retain(|(_, lock)| lock.session_id != session_id);
        Ok(())
    }
}

/// Blob store over a map of byte vectors.
#[derive(Default)]
pub struct MemContent {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ContentService for MemContent {
    async fn read_content(&self, id: &str) -> StoreResult<Vec<u8>> {
        self.blobs.lock().unwrap().get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn read_at(&self, id: &str, offset: u64, buf: &mut [u8]) -> StoreResult<Option<usize>> {
        let blobs = self.blobs.lock().unwrap();
        let blob = blobs.get(id).ok_or(StoreError::NotFound)?;
        let start = (offset as usize).min(blob.len());
        let end = (start + buf.len()).min(blob.len());
        buf[..end - start].copy_from_slice(&blob[start..end]);
        Ok(Some(end - start))
    }

    async fn write_at(&self, id: &str, offset: u64, data: &[u8]) -> StoreResult<()> {
        let mut blobs = self.blobs.lock().unwrap();
        let blob = blobs.entry(id.to_owned()).or_default();
        let end = offset as usize + data.len();
        if blob.len() < end {
            blob.resize(end, 0);
        }
        blob[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.blobs.lock().unwrap().remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Write-through block cache over moka; blobs drain to the content store
/// on flush.
pub struct MemCache {
    entries: moka::sync::Cache<String, Arc<Mutex<Vec<u8>>>>,
    backing: Arc<MemContent>,
}

impl MemCache {
    pub fn new(backing: Arc<MemContent>) -> MemCache {
        MemCache { entries: moka::sync::Cache::new(1024), backing }
    }
}

#[async_trait]
impl BlockCache for MemCache {
    async fn read_at(&self, id: &str, offset: u64, buf: &mut [u8]) -> StoreResult<usize> {
        let entry = self.entries.get(id).ok_or(StoreError::NotFound)?;
        let data = entry.lock().unwrap();
        let start = (offset as usize).min(data.len());
        let end = (start + buf.len()).min(data.len());
        buf[..end - start].copy_from_slice(&data[start..end]);
        Ok(end - start)
    }

    async fn write_at(&self, id: &str, offset: u64, data: &[u8]) -> StoreResult<()> {
        let entry = self
            .entries
            .entry(id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .into_value();
        let mut blob = entry.lock().unwrap();
        let end = offset as usize + data.len();
        if blob.len() < end {
            blob.resize(end, 0);
        }
        blob[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    async fn size(&self, id: &str) -> StoreResult<Option<u64>> {
        Ok(self.entries.get(id).map(|entry| entry.lock().unwrap().len() as u64))
    }

    async fn state(&self, id: &str) -> CacheState {
        if self.entries.contains_key(id) {
            CacheState::Buffering
        } else {
            CacheState::None
        }
    }

    async fn flush_and_finalize(&self, id: &str) -> StoreResult<()> {
        let Some(entry) = self.entries.get(id) else {
            return Ok(());
        };
        let data = entry.lock().unwrap().clone();
        self.backing.write_at(id, 0, &data).await?;
        self.entries.invalidate(id);
        Ok(())
    }
}

/// Lease/lock records keyed by `(owner, file)`.
#[derive(Default)]
pub struct MemLockStore {
    records: Mutex<HashMap<(String, String), LockRecord>>,
}

#[async_trait]
impl LockStore for MemLockStore {
    async fn put_lock(&self, record: LockRecord) -> StoreResult<()> {
        self.records
            .lock()
            .unwrap()
            .insert((record.owner.clone(), record.file.clone()), record);
        Ok(())
    }

    async fn delete_lock(&self, owner: &str, file: &str) -> StoreResult<()> {
        self.records
            .lock()
            .unwrap()
            .remove(&(owner.to_owned(), file.to_owned()))
            .map(|_| ())
            .ok_or(StoreError::LockNotFound)
    }

    async fn list_locks(&self, query: &LockQuery) -> StoreResult<Vec<LockRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| {
                query.file.as_deref().map(|file| file == record.file).unwrap_or(true)
                    && query.is_lease.map(|lease| lease == record.is_lease).unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}

/// Users and per-share permission overrides.
#[derive(Default)]
pub struct MemUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    permissions: Mutex<HashMap<(String, String), SharePermission>>,
}

impl MemUserStore {
    pub fn add_user(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.username.clone(), user);
    }

    pub fn grant(&self, username: &str, share: &str, permission: SharePermission) {
        self.permissions
            .lock()
            .unwrap()
            .insert((username.to_owned(), share.to_owned()), permission);
    }
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn get_user(&self, username: &str) -> StoreResult<UserRecord> {
        self.users.lock().unwrap().get(username).cloned().ok_or(StoreError::NotFound)
    }

    async fn share_permission(
        &self,
        username: &str,
        share: &str,
    ) -> StoreResult<Option<SharePermission>> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .get(&(username.to_owned(), share.to_owned()))
            .copied())
    }
}

struct ShareServices {
    config: ShareConfig,
    meta: Arc<MemMetadata>,
    content: Arc<MemContent>,
    cache: Arc<MemCache>,
}

/// One registry instance wiring every in-memory service together.
pub struct MemRegistry {
    shares: HashMap<String, ShareServices>,
    locks: Arc<MemLockStore>,
    users: Arc<MemUserStore>,
    guid: [u8; 16],
}

impl Default for MemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemRegistry {
    pub fn new() -> MemRegistry {
        MemRegistry {
            shares: HashMap::new(),
            locks: Arc::new(MemLockStore::default()),
            users: Arc::new(MemUserStore::default()),
            guid: *b"mem-share-guid!!",
        }
    }

    /// Registers a share with its own metadata tree, blob store, and
    /// cache.
    pub fn add_share(
        &mut self,
        name: &str,
        read_only: bool,
        guest_permission: SharePermission,
    ) -> Arc<MemMetadata> {
        let meta = Arc::new(MemMetadata::new());
        let content = Arc::new(MemContent::default());
        let cache = Arc::new(MemCache::new(content.clone()));
        self.shares.insert(
            name.to_owned(),
            ShareServices {
                config: ShareConfig {
                    name: name.to_owned(),
                    read_only,
                    guest_permission,
                },
                meta: meta.clone(),
                content,
                cache,
            },
        );
        meta
    }

    pub fn user_store(&self) -> Arc<MemUserStore> {
        self.users.clone()
    }

    pub fn content_of(&self, share: &str) -> Option<Arc<MemContent>> {
        self.shares.get(share).map(|share| share.content.clone())
    }
}

impl Registry for MemRegistry {
    fn get_share(&self, name: &str) -> Option<ShareConfig> {
        self.shares.get(name).map(|share| share.config.clone())
    }

    fn get_root_handle(&self, share: &str) -> Option<NodeHandle> {
        self.shares.get(share).map(|share| share.meta.root_handle())
    }

    fn get_metadata_service(&self, share: &str) -> Option<Arc<dyn MetadataService>> {
        self.shares.get(share).map(|share| share.meta.clone() as Arc<dyn MetadataService>)
    }

    fn get_content_service(&self, share: &str) -> Option<Arc<dyn ContentService>> {
        self.shares.get(share).map(|share| share.content.clone() as Arc<dyn ContentService>)
    }

    fn get_cache_for_share(&self, share: &str) -> Option<Arc<dyn BlockCache>> {
        self.shares.get(share).map(|share| share.cache.clone() as Arc<dyn BlockCache>)
    }

    fn get_lock_store(&self) -> Arc<dyn LockStore> {
        self.locks.clone()
    }

    fn get_user_store(&self) -> Arc<dyn UserStore> {
        self.users.clone()
    }

    fn server_guid(&self) -> [u8; 16] {
        self.guid
    }
}
