#[path = "../../demos/memshare/store/mod.rs"]
pub mod memstore;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use smb_mamont::auth::SharePermission;
use smb_mamont::config::EngineConfig;
use smb_mamont::dispatcher::{Dispatcher, HandlerResult, RequestContext};
use smb_mamont::handles::Handles;
use smb_mamont::notify::{NotifyRegistry, NotifySink};
use smb_mamont::oplock::{BreakNotifier, OplockManager};
use smb_mamont::smb2::{Command, LeaseState};
use smb_mamont::status::NtStatus;
use smb_mamont::store::{Registry, UserRecord};

use memstore::MemRegistry;

/// Async completions captured from the notify sink.
#[derive(Default)]
pub struct RecordingSink {
    pub completed: Mutex<Vec<(u64, u64, NtStatus, Vec<u8>)>>,
}

#[async_trait]
impl NotifySink for RecordingSink {
    async fn complete(&self, session_id: u64, message_id: u64, status: NtStatus, body: Vec<u8>) {
        self.completed.lock().await.push((session_id, message_id, status, body));
    }
}

/// Break notifications captured from the oplock manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Break {
    Oplock { session_id: u64, level: u8 },
    Lease { session_id: u64, key: [u8; 16], target: LeaseState },
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Break>>,
}

#[async_trait]
impl BreakNotifier for RecordingNotifier {
    async fn send_oplock_break(&self, session_id: u64, _file_id: [u8; 16], level: u8) {
        self.sent.lock().await.push(Break::Oplock { session_id, level });
    }

    async fn send_lease_break(
        &self,
        session_id: u64,
        key: [u8; 16],
        _current: LeaseState,
        target: LeaseState,
        _epoch: u16,
    ) {
        self.sent.lock().await.push(Break::Lease { session_id, key, target });
    }
}

pub struct Fixture {
    pub dispatcher: Dispatcher,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<MemRegistry>,
    pub session_id: u64,
    pub tree_id: u32,
    next_message: u64,
}

impl Fixture {
    /// Engine over the in-memory store with one read-write `/export`
    /// share, a connected session, and sped-up lock timings.
    pub async fn new() -> Fixture {
        let mut registry = MemRegistry::new();
        registry.add_share("/export", false, SharePermission::ReadWrite);
        registry.add_share("/archive", true, SharePermission::ReadWrite);
        registry.add_share("/viewer", false, SharePermission::Read);
        registry.user_store().add_user(UserRecord {
            username: "artem".into(),
            uid: Some(1042),
            gid: Some(100),
        });
        let registry = Arc::new(registry);

        let config = EngineConfig {
            lock_retry_interval_ms: 5,
            lock_wait_timeout_ms: 50,
            ..EngineConfig::default()
        };
        let sink = Arc::new(RecordingSink::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let oplocks = Arc::new(OplockManager::new(
            notifier.clone(),
            registry.get_lock_store(),
            config.clone(),
        ));
        let dispatcher = Dispatcher::new(
            registry.clone() as Arc<dyn Registry>,
            Arc::new(Handles::new()),
            oplocks,
            Arc::new(NotifyRegistry::new(sink.clone())),
            config,
        );

        let mut fixture = Fixture {
            dispatcher,
            sink,
            notifier,
            registry,
            session_id: 0,
            tree_id: 0,
            next_message: 0,
        };
        let (session_id, tree_id) = fixture.login("\\\\srv\\EXPORT").await;
        fixture.session_id = session_id;
        fixture.tree_id = tree_id;
        fixture
    }

    /// Registers a fresh session and connects it to a share.
    pub async fn login(&mut self, unc: &str) -> (u64, u32) {
        let user = UserRecord { username: "artem".into(), uid: Some(1042), gid: Some(100) };
        let session = self.dispatcher.register_session(Some(user), false).await;
        let ctx = RequestContext {
            session_id: session.session_id,
            tree_id: 0,
            message_id: self.message_id(),
            client_addr: addr(),
            cancel: CancellationToken::new(),
        };
        let response = self
            .dispatcher
            .dispatch(Command::TreeConnect, &ctx, &tree_connect_body(unc))
            .await
            .expect("tree connect responds");
        assert_eq!(response.status, NtStatus::SUCCESS, "fixture tree connect");
        (session.session_id, response.granted_tree_id.expect("tree id granted"))
    }

    pub fn message_id(&mut self) -> u64 {
        self.next_message += 1;
        self.next_message
    }

    pub fn ctx(&mut self) -> RequestContext {
        RequestContext {
            session_id: self.session_id,
            tree_id: self.tree_id,
            message_id: self.message_id(),
            client_addr: addr(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn ctx_for(&mut self, session_id: u64, tree_id: u32) -> RequestContext {
        RequestContext {
            session_id,
            tree_id,
            message_id: self.message_id(),
            client_addr: addr(),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn send(&mut self, command: Command, body: &[u8]) -> HandlerResult {
        let ctx = self.ctx();
        self.dispatcher.dispatch(command, &ctx, body).await.expect("command responds")
    }

    /// Creates-or-opens and returns the granted file id.
    pub async fn open(&mut self, name: &str, disposition: u32, options: u32) -> [u8; 16] {
        let response = self.send(Command::Create, &create_body(name, disposition, options)).await;
        assert_eq!(response.status, NtStatus::SUCCESS, "open {}", name);
        file_id_of(&response)
    }

    pub async fn write(&mut self, file_id: [u8; 16], offset: u64, data: &[u8]) {
        let response = self.send(Command::Write, &write_body(file_id, offset, data)).await;
        assert_eq!(response.status, NtStatus::SUCCESS, "write");
    }

    pub async fn close(&mut self, file_id: [u8; 16]) {
        let response = self.send(Command::Close, &close_body(file_id, 0)).await;
        assert_eq!(response.status, NtStatus::SUCCESS, "close");
    }
}

pub fn addr() -> SocketAddr {
    "192.0.2.7:50445".parse().expect("literal address")
}

pub fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

pub fn tree_connect_body(unc: &str) -> Vec<u8> {
    let path = utf16(unc);
    let mut body = Vec::new();
    put16(&mut body, 9);
    put16(&mut body, 0);
    put16(&mut body, 72);
    put16(&mut body, path.len() as u16);
    body.extend_from_slice(&path);
    body
}

pub fn create_body(name: &str, disposition: u32, options: u32) -> Vec<u8> {
    create_body_with_oplock(name, disposition, options, 0)
}

pub fn create_body_with_oplock(
    name: &str,
    disposition: u32,
    options: u32,
    oplock: u8,
) -> Vec<u8> {
    let encoded = utf16(name);
    let mut body = Vec::new();
    put16(&mut body, 57);
    body.push(0);
    body.push(oplock);
    put32(&mut body, 2);
    put64(&mut body, 0);
    put64(&mut body, 0);
    put32(&mut body, 0x001F_01FF);
    put32(&mut body, 0);
    put32(&mut body, 0x7);
    put32(&mut body, disposition);
    put32(&mut body, options);
    put16(&mut body, 120);
    put16(&mut body, encoded.len() as u16);
    put32(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(&encoded);
    body
}

/// CREATE with an `RqLs` lease-request context appended.
pub fn create_body_with_lease(name: &str, disposition: u32, key: [u8; 16], state: u32) -> Vec<u8> {
    let mut body = create_body_with_oplock(name, disposition, 0, 0xFF);
    let name_len = utf16(name).len();
    // Contexts are 8-aligned after the name.
    let contexts_at = (56 + name_len).div_ceil(8) * 8;
    body.resize(contexts_at, 0);
    put32(&mut body, 0);
    put16(&mut body, 16);
    put16(&mut body, 4);
    put16(&mut body, 0);
    put16(&mut body, 24);
    put32(&mut body, 32);
    body.extend_from_slice(b"RqLs");
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(&key);
    put32(&mut body, state);
    put32(&mut body, 0);
    put64(&mut body, 0);
    body[48..52].copy_from_slice(&((64 + contexts_at) as u32).to_le_bytes());
    body[52..56].copy_from_slice(&56u32.to_le_bytes());
    body
}

pub fn close_body(file_id: [u8; 16], flags: u16) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 24);
    put16(&mut body, flags);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    body
}

pub fn write_body(file_id: [u8; 16], offset: u64, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 49);
    put16(&mut body, 112);
    put32(&mut body, data.len() as u32);
    put64(&mut body, offset);
    body.extend_from_slice(&file_id);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put16(&mut body, 0);
    put16(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(data);
    body
}

pub fn read_body(file_id: [u8; 16], offset: u64, length: u32) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 49);
    body.push(0);
    body.push(0);
    put32(&mut body, length);
    put64(&mut body, offset);
    body.extend_from_slice(&file_id);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put16(&mut body, 0);
    put16(&mut body, 0);
    body.push(0);
    body
}

pub fn flush_body(file_id: [u8; 16]) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 24);
    put16(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    body
}

pub struct LockElem {
    pub offset: u64,
    pub length: u64,
    pub flags: u32,
}

pub fn lock_body(file_id: [u8; 16], elements: &[LockElem]) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 48);
    put16(&mut body, elements.len() as u16);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    for element in elements {
        put64(&mut body, element.offset);
        put64(&mut body, element.length);
        put32(&mut body, element.flags);
        put32(&mut body, 0);
    }
    body
}

pub fn query_directory_body(file_id: [u8; 16], class: u8, flags: u8, pattern: &str) -> Vec<u8> {
    let encoded = utf16(pattern);
    let mut body = Vec::new();
    put16(&mut body, 33);
    body.push(class);
    body.push(flags);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    put16(&mut body, 96);
    put16(&mut body, encoded.len() as u16);
    put32(&mut body, 65536);
    body.extend_from_slice(&encoded);
    body
}

pub fn change_notify_body(file_id: [u8; 16], filter: u32, watch_tree: bool) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 32);
    put16(&mut body, watch_tree as u16);
    put32(&mut body, 4096);
    body.extend_from_slice(&file_id);
    put32(&mut body, filter);
    put32(&mut body, 0);
    body
}

pub fn query_info_body(file_id: [u8; 16], info_type: u8, class: u8) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 41);
    body.push(info_type);
    body.push(class);
    put32(&mut body, 65536);
    put16(&mut body, 0);
    put16(&mut body, 0);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    body
}

pub fn set_info_body(file_id: [u8; 16], info_type: u8, class: u8, buffer: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 33);
    body.push(info_type);
    body.push(class);
    put32(&mut body, buffer.len() as u32);
    put16(&mut body, 96);
    put16(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    body.extend_from_slice(buffer);
    body
}

pub fn rename_buffer(target: &str, replace: bool) -> Vec<u8> {
    let name = utf16(target);
    let mut buffer = Vec::new();
    buffer.push(replace as u8);
    buffer.extend_from_slice(&[0u8; 7]);
    put64(&mut buffer, 0);
    put32(&mut buffer, name.len() as u32);
    buffer.extend_from_slice(&name);
    buffer
}

pub fn ioctl_body(file_id: [u8; 16], ctl_code: u32, input: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    put16(&mut body, 57);
    put16(&mut body, 0);
    put32(&mut body, ctl_code);
    body.extend_from_slice(&file_id);
    put32(&mut body, 120);
    put32(&mut body, input.len() as u32);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put32(&mut body, 0);
    put32(&mut body, 4096);
    put32(&mut body, 0x1);
    put32(&mut body, 0);
    body.extend_from_slice(input);
    body
}

pub fn file_id_of(response: &HandlerResult) -> [u8; 16] {
    let mut file_id = [0u8; 16];
    file_id.copy_from_slice(&response.body[64..80]);
    file_id
}

/// Walks a FILE_NAMES_INFORMATION chain and returns the names.
pub fn names_of(buffer: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut pos = 0usize;
    loop {
        let next = u32::from_le_bytes(buffer[pos..pos + 4].try_into().unwrap()) as usize;
        let name_len =
            u32::from_le_bytes(buffer[pos + 8..pos + 12].try_into().unwrap()) as usize;
        let raw = &buffer[pos + 12..pos + 12 + name_len];
        let units: Vec<u16> =
            raw.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
        names.push(String::from_utf16(&units).unwrap());
        if next == 0 {
            break;
        }
        pos += next;
    }
    names
}

/// The engine-facing MFsymlink payload, assembled by hand the way a
/// client writes it.
pub fn mfsymlink_payload(target: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"XSym\n");
    payload.extend_from_slice(format!("{:04}\n", target.len()).as_bytes());
    payload.extend_from_slice(&[b'0'; 32]);
    payload.push(b'\n');
    payload.extend_from_slice(target.as_bytes());
    payload.push(b'\n');
    payload.resize(1067, b' ');
    payload
}
