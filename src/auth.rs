//! Backend identity derivation and share-level permission gating.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::store::UserRecord;

/// Fallback uid/gid for authenticated users whose record carries none.
const DEFAULT_UID: u32 = 1000;
const DEFAULT_GID: u32 = 1000;

/// Guest sessions map to `nobody`.
const GUEST_UID: u32 = 65534;
const GUEST_GID: u32 = 65534;

/// Effective permission of a session on a share.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    #[default]
    None,
    Read,
    ReadWrite,
    Admin,
}

impl SharePermission {
    pub fn has_read(self) -> bool {
        matches!(self, SharePermission::Read | SharePermission::ReadWrite | SharePermission::Admin)
    }

    pub fn has_write(self) -> bool {
        matches!(self, SharePermission::ReadWrite | SharePermission::Admin)
    }

    pub fn has_admin(self) -> bool {
        self == SharePermission::Admin
    }

    /// Read-only shares never grant more than Read.
    pub fn capped_to_read_only(self) -> SharePermission {
        match self {
            SharePermission::None => SharePermission::None,
            _ => SharePermission::Read,
        }
    }
}

/// Unix identity the backends enforce against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub username: Option<String>,
}

/// Per-call context every backend operation receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub client_addr: SocketAddr,
    pub identity: Identity,
}

impl AuthContext {
    /// Context for an authenticated user, falling back to the default
    /// uid/gid when the record leaves them unset.
    pub fn for_user(client_addr: SocketAddr, user: &UserRecord) -> AuthContext {
        AuthContext {
            client_addr,
            identity: Identity {
                uid: user.uid.unwrap_or(DEFAULT_UID),
                gid: user.gid.unwrap_or(DEFAULT_GID),
                username: Some(user.username.clone()),
            },
        }
    }

    /// Context for a guest session.
    pub fn for_guest(client_addr: SocketAddr) -> AuthContext {
        AuthContext {
            client_addr,
            identity: Identity { uid: GUEST_UID, gid: GUEST_GID, username: None },
        }
    }

    /// Context for an anonymous (null) session. Root identity; the share
    /// permission gate is what actually restricts these.
    pub fn for_anonymous(client_addr: SocketAddr) -> AuthContext {
        AuthContext { client_addr, identity: Identity { uid: 0, gid: 0, username: None } }
    }
}
