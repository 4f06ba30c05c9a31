//! Security descriptor codec ([MS-DTYP] 2.4): SIDs, ACLs, self-relative
//! descriptors, and the NFSv4 ACE translation used when the metadata
//! backend stores POSIX-world ACLs.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Control bits for a self-relative, DACL-present descriptor.
const CONTROL_SELF_RELATIVE: u16 = 0x8000;
const CONTROL_DACL_PRESENT: u16 = 0x0004;

/// RID owner mapping falls back to `nobody` for SIDs outside the local
/// domain.
const UNKNOWN_RID: u32 = 65534;

/// Codec failures; all collapse to `STATUS_INVALID_PARAMETER` upstream.
#[derive(Debug, PartialEq, Eq)]
pub enum SecurityError {
    Truncated,
    BadRevision,
    BadString,
}

type Result<T> = std::result::Result<T, SecurityError>;

/// Windows security identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sid {
    pub revision: u8,
    /// 48-bit identifier authority.
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    /// `S-1-1-0`.
    pub fn everyone() -> Sid {
        Sid { revision: 1, authority: 1, sub_authorities: vec![0] }
    }

    /// `S-1-5-21-0-0-0-<rid>`: the synthetic local domain carrying a
    /// Unix uid/gid as its final RID.
    pub fn local_rid(rid: u32) -> Sid {
        Sid { revision: 1, authority: 5, sub_authorities: vec![21, 0, 0, 0, rid] }
    }

    /// The RID if this SID belongs to the synthetic local domain.
    pub fn as_local_rid(&self) -> Option<u32> {
        match self.sub_authorities.as_slice() {
            [21, 0, 0, 0, rid] if self.authority == 5 => Some(*rid),
            _ => None,
        }
    }

    /// Serialized length: header, authority, sub-authorities.
    pub fn wire_len(&self) -> usize {
        8 + self.sub_authorities.len() * 4
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

/// Encodes a SID: revision, count, big-endian authority, little-endian
/// sub-authorities.
pub fn encode_sid(dest: &mut dyn Write, sid: &Sid) -> std::io::Result<()> {
    dest.write_u8(sid.revision)?;
    dest.write_u8(sid.sub_authorities.len() as u8)?;
    dest.write_all(&sid.authority.to_be_bytes()[2..])?;
    for sub in &sid.sub_authorities {
        dest.write_u32::<LittleEndian>(*sub)?;
    }
    Ok(())
}

pub fn decode_sid(src: &mut dyn Read) -> Result<Sid> {
    let revision = src.read_u8().map_err(|_| SecurityError::Truncated)?;
    if revision != 1 {
        return Err(SecurityError::BadRevision);
    }
    let count = src.read_u8().map_err(|_| SecurityError::Truncated)? as usize;
    let mut authority_bytes = [0u8; 8];
    src.read_exact(&mut authority_bytes[2..]).map_err(|_| SecurityError::Truncated)?;
    let authority = u64::from_be_bytes(authority_bytes);
    let mut sub_authorities = Vec::with_capacity(count);
    for _ in 0..count {
        sub_authorities
            .push(src.read_u32::<LittleEndian>().map_err(|_| SecurityError::Truncated)?);
    }
    Ok(Sid { revision, authority, sub_authorities })
}

/// Parses the `S-1-...` string form.
pub fn parse_sid_string(text: &str) -> Result<Sid> {
    let mut parts = text.split('-');
    if parts.next() != Some("S") {
        return Err(SecurityError::BadString);
    }
    let revision: u8 =
        parts.next().and_then(|p| p.parse().ok()).ok_or(SecurityError::BadString)?;
    let authority: u64 =
        parts.next().and_then(|p| p.parse().ok()).ok_or(SecurityError::BadString)?;
    let mut sub_authorities = Vec::new();
    for part in parts {
        sub_authorities.push(part.parse().map_err(|_| SecurityError::BadString)?);
    }
    Ok(Sid { revision, authority, sub_authorities })
}

/// Windows ACE types the translation understands; anything else is
/// dropped on either direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AceType {
    Allowed = 0x00,
    Denied = 0x01,
    Audit = 0x02,
}

impl AceType {
    fn from_u8(value: u8) -> Option<AceType> {
        match value {
            0x00 => Some(AceType::Allowed),
            0x01 => Some(AceType::Denied),
            0x02 => Some(AceType::Audit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    pub ace_type: AceType,
    pub flags: u8,
    pub access_mask: u32,
    pub sid: Sid,
}

impl Ace {
    fn wire_len(&self) -> usize {
        8 + self.sid.wire_len()
    }
}

/// NFSv4 ACE as the metadata backend hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsAce {
    /// 0 allow, 1 deny, 2 audit; others are unknown.
    pub ace_type: u32,
    pub flags: u32,
    pub access_mask: u32,
    /// `OWNER@`, `GROUP@`, `EVERYONE@`, or `<uid>@<domain>`.
    pub who: String,
}

/// Parsed or to-be-built security descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    pub dacl: Option<Vec<Ace>>,
}

impl SecurityDescriptor {
    /// Minimal descriptor: owner/group from the file identity, DACL
    /// granting Everyone full access.
    pub fn minimal(uid: u32, gid: u32) -> SecurityDescriptor {
        SecurityDescriptor {
            owner: Some(Sid::local_rid(uid)),
            group: Some(Sid::local_rid(gid)),
            dacl: Some(vec![Ace {
                ace_type: AceType::Allowed,
                flags: 0,
                access_mask: 0x001F_01FF,
                sid: Sid::everyone(),
            }]),
        }
    }
}

fn align4(n: usize) -> usize {
    n.div_ceil(4) * 4
}

/// Infallible SID append for in-memory buffers.
fn push_sid(buf: &mut Vec<u8>, sid: &Sid) {
    buf.push(sid.revision);
    buf.push(sid.sub_authorities.len() as u8);
    buf.extend_from_slice(&sid.authority.to_be_bytes()[2..]);
    for sub in &sid.sub_authorities {
        buf.extend_from_slice(&sub.to_le_bytes());
    }
}

/// Builds the self-relative form: 20-byte header, then owner and group
/// SIDs (4-byte aligned), then the DACL.
pub fn encode_descriptor(sd: &SecurityDescriptor) -> Vec<u8> {
    let mut control = CONTROL_SELF_RELATIVE;
    if sd.dacl.is_some() {
        control |= CONTROL_DACL_PRESENT;
    }

    let mut offset = 20usize;
    let owner_offset = sd.owner.as_ref().map(|sid| {
        let at = offset;
        offset = align4(at + sid.wire_len());
        at
    });
    let group_offset = sd.group.as_ref().map(|sid| {
        let at = offset;
        offset = align4(at + sid.wire_len());
        at
    });
    let dacl_offset = sd.dacl.as_ref().map(|_| offset);

    let mut buf = Vec::with_capacity(offset);
    buf.push(1); // Revision
    buf.push(0); // Sbz1
    buf.extend_from_slice(&control.to_le_bytes());
    buf.extend_from_slice(&(owner_offset.unwrap_or(0) as u32).to_le_bytes());
    buf.extend_from_slice(&(group_offset.unwrap_or(0) as u32).to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // OffsetSacl
    buf.extend_from_slice(&(dacl_offset.unwrap_or(0) as u32).to_le_bytes());

    if let Some(sid) = &sd.owner {
        push_sid(&mut buf, sid);
        buf.resize(align4(buf.len()), 0);
    }
    if let Some(sid) = &sd.group {
        push_sid(&mut buf, sid);
        buf.resize(align4(buf.len()), 0);
    }
    if let Some(aces) = &sd.dacl {
        encode_acl(&mut buf, aces);
    }
    buf
}

fn encode_acl(buf: &mut Vec<u8>, aces: &[Ace]) {
    let total: usize = 8 + aces.iter().map(Ace::wire_len).sum::<usize>();
    buf.push(2); // AclRevision
    buf.push(0);
    buf.extend_from_slice(&(total as u16).to_le_bytes());
    buf.extend_from_slice(&(aces.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    for ace in aces {
        buf.push(ace.ace_type as u8);
        buf.push(ace.flags);
        buf.extend_from_slice(&(ace.wire_len() as u16).to_le_bytes());
        buf.extend_from_slice(&ace.access_mask.to_le_bytes());
        push_sid(buf, &ace.sid);
    }
}

/// Parses a self-relative descriptor, tolerating absent owner/group/DACL.
pub fn decode_descriptor(data: &[u8]) -> Result<SecurityDescriptor> {
    if data.len() < 20 {
        return Err(SecurityError::Truncated);
    }
    if data[0] != 1 {
        return Err(SecurityError::BadRevision);
    }
    let owner_offset = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
    let group_offset = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
    let dacl_offset = u32::from_le_bytes(data[16..20].try_into().unwrap()) as usize;

    let owner = if owner_offset != 0 {
        Some(decode_sid(&mut data.get(owner_offset..).ok_or(SecurityError::Truncated)?)?)
    } else {
        None
    };
    let group = if group_offset != 0 {
        Some(decode_sid(&mut data.get(group_offset..).ok_or(SecurityError::Truncated)?)?)
    } else {
        None
    };
    let dacl = if dacl_offset != 0 {
        Some(decode_acl(data.get(dacl_offset..).ok_or(SecurityError::Truncated)?)?)
    } else {
        None
    };
    Ok(SecurityDescriptor { owner, group, dacl })
}

fn decode_acl(data: &[u8]) -> Result<Vec<Ace>> {
    if data.len() < 8 {
        return Err(SecurityError::Truncated);
    }
    let count = u16::from_le_bytes(data[4..6].try_into().unwrap()) as usize;
    let mut aces = Vec::with_capacity(count);
    let mut pos = 8usize;
    for _ in 0..count {
        let header = data.get(pos..pos + 8).ok_or(SecurityError::Truncated)?;
        let size = u16::from_le_bytes(header[2..4].try_into().unwrap()) as usize;
        if size < 8 {
            return Err(SecurityError::Truncated);
        }
        let access_mask = u32::from_le_bytes(header[4..8].try_into().unwrap());
        // ACE types outside the translation table are skipped, not
        // errors.
        if let Some(ace_type) = AceType::from_u8(header[0]) {
            let sid =
                decode_sid(&mut data.get(pos + 8..pos + size).ok_or(SecurityError::Truncated)?)?;
            aces.push(Ace { ace_type, flags: header[1], access_mask, sid });
        }
        pos = pos.checked_add(size).ok_or(SecurityError::Truncated)?;
    }
    Ok(aces)
}

/// Maps an NFSv4 principal onto a SID using the file's identity for the
/// special principals.
pub fn principal_to_sid(who: &str, uid: u32, gid: u32) -> Sid {
    match who {
        "OWNER@" => Sid::local_rid(uid),
        "GROUP@" => Sid::local_rid(gid),
        "EVERYONE@" => Sid::everyone(),
        other => {
            let rid = other
                .split('@')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(UNKNOWN_RID);
            Sid::local_rid(rid)
        }
    }
}

/// Inverse principal mapping. Local-domain RIDs become `<rid>@localdomain`,
/// Everyone maps back, other S-1-5-21 SIDs collapse to `nobody`, and
/// anything else keeps its string form.
pub fn sid_to_principal(sid: &Sid) -> String {
    if let Some(rid) = sid.as_local_rid() {
        return format!("{}@localdomain", rid);
    }
    if *sid == Sid::everyone() {
        return "EVERYONE@".to_owned();
    }
    if sid.authority == 5 && sid.sub_authorities.first() == Some(&21) {
        return format!("{}@localdomain", UNKNOWN_RID);
    }
    sid.to_string()
}

/// NFSv4 → Windows ACE translation; unknown NFS types are dropped.
pub fn nfs_to_windows(aces: &[NfsAce], uid: u32, gid: u32) -> Vec<Ace> {
    aces.iter()
        .filter_map(|ace| {
            let ace_type = match ace.ace_type {
                0 => AceType::Allowed,
                1 => AceType::Denied,
                2 => AceType::Audit,
                _ => return None,
            };
            Some(Ace {
                ace_type,
                flags: 0,
                access_mask: ace.access_mask,
                sid: principal_to_sid(&ace.who, uid, gid),
            })
        })
        .collect()
}

/// Windows → NFSv4 ACE translation.
pub fn windows_to_nfs(aces: &[Ace]) -> Vec<NfsAce> {
    aces.iter()
        .map(|ace| NfsAce {
            ace_type: ace.ace_type as u32,
            flags: 0,
            access_mask: ace.access_mask,
            who: sid_to_principal(&ace.sid),
        })
        .collect()
}
