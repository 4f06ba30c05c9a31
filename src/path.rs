//! Share-relative path handling and Windows create-disposition logic.

use crate::auth::AuthContext;
use crate::smb2::{CreateAction, CreateDisposition};
use crate::status::NtStatus;
use crate::store::{FileInfo, MetadataService, NodeHandle, StoreError, StoreResult};

/// Wire form to internal form: backslashes become slashes and the
/// leading slash goes away. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.replace('\\', "/").trim_start_matches('/').to_owned()
}

/// Leaf component of a normalized path; empty for the root.
pub fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Parent of a normalized path; empty for top-level entries and the
/// root itself.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Joins a normalized directory path with a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Walks a normalized share-relative path from the share root.
/// Traversing through a non-directory fails with
/// [`StoreError::NotDirectory`]; the empty path resolves to the root.
pub async fn walk(
    meta: &dyn MetadataService,
    ctx: &AuthContext,
    root: &NodeHandle,
    path: &str,
) -> StoreResult<FileInfo> {
    let mut current = meta.get_file(ctx, root).await?;
    for component in path.split('/').filter(|part| !part.is_empty()) {
        if !current.is_directory() {
            return Err(StoreError::NotDirectory);
        }
        current = meta.lookup(ctx, &current.handle, component).await?;
    }
    Ok(current)
}

/// Walks to the parent of `path` and returns it with the leaf name.
/// Fails with [`StoreError::InvalidArgument`] for the root, which has no
/// parent.
pub async fn walk_parent<'p>(
    meta: &dyn MetadataService,
    ctx: &AuthContext,
    root: &NodeHandle,
    path: &'p str,
) -> StoreResult<(FileInfo, &'p str)> {
    let name = leaf(path);
    if name.is_empty() {
        return Err(StoreError::InvalidArgument);
    }
    let parent_info = walk(meta, ctx, root, parent(path)).await?;
    if !parent_info.is_directory() {
        return Err(StoreError::NotDirectory);
    }
    Ok((parent_info, name))
}

/// Resolves a create disposition against the existence of the target.
pub fn resolve_disposition(
    disposition: CreateDisposition,
    exists: bool,
) -> Result<CreateAction, NtStatus> {
    match (disposition, exists) {
        (CreateDisposition::Open, true) => Ok(CreateAction::Opened),
        (CreateDisposition::Open, false) => Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        (CreateDisposition::Create, true) => Err(NtStatus::OBJECT_NAME_COLLISION),
        (CreateDisposition::Create, false) => Ok(CreateAction::Created),
        (CreateDisposition::OpenIf, true) => Ok(CreateAction::Opened),
        (CreateDisposition::OpenIf, false) => Ok(CreateAction::Created),
        (CreateDisposition::Supersede, true) => Ok(CreateAction::Superseded),
        (CreateDisposition::Supersede, false) => Ok(CreateAction::Created),
        (CreateDisposition::Overwrite, true) => Ok(CreateAction::Overwritten),
        (CreateDisposition::Overwrite, false) => Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        (CreateDisposition::OverwriteIf, true) => Ok(CreateAction::Overwritten),
        (CreateDisposition::OverwriteIf, false) => Ok(CreateAction::Created),
    }
}

/// Case-insensitive SMB wildcard match. `*` spans any run, `?` exactly
/// one character; the DOS match-all spellings are special-cased.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    if matches!(pattern, "" | "*" | "<" | "*.*") {
        return true;
    }
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();
    glob(&pattern, &name)
}

fn glob(pattern: &[char], name: &[char]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => {
            (0..=name.len()).any(|skip| glob(rest, &name[skip..]))
        }
        Some(('?', rest)) => !name.is_empty() && glob(rest, &name[1..]),
        Some((ch, rest)) => {
            name.split_first().map(|(first, tail)| first == ch && glob(rest, tail)).unwrap_or(false)
        }
    }
}
