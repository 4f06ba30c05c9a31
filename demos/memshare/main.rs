//! Scripted demo: drives the dispatcher against the in-memory backing
//! store the way a transport would, printing each wire exchange.
//!
//!     cargo run --example memshare -- --verbose

mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use smb_mamont::auth::SharePermission;
use smb_mamont::config::EngineConfig;
use smb_mamont::dispatcher::{Dispatcher, HandlerResult, RequestContext};
use smb_mamont::handles::Handles;
use smb_mamont::notify::{NotifyRegistry, NotifySink};
use smb_mamont::oplock::{BreakNotifier, OplockManager};
use smb_mamont::smb2::{Command, LeaseState};
use smb_mamont::status::NtStatus;
use smb_mamont::store::{Registry, UserRecord};

use store::MemRegistry;

#[derive(Parser)]
#[command(about = "In-memory SMB engine demo")]
struct Cli {
    /// Optional engine config in TOML form.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Log every request at debug level.
    #[arg(long, short)]
    verbose: bool,
}

/// Break notifications just get logged; there is no remote client.
struct LogNotifier;

#[async_trait]
impl BreakNotifier for LogNotifier {
    async fn send_oplock_break(&self, session_id: u64, _file_id: [u8; 16], level: u8) {
        info!(session_id, level, "oplock break notification");
    }

    async fn send_lease_break(
        &self,
        session_id: u64,
        _key: [u8; 16],
        current: LeaseState,
        target: LeaseState,
        _epoch: u16,
    ) {
        info!(session_id, ?current, ?target, "lease break notification");
    }
}

struct LogSink;

#[async_trait]
impl NotifySink for LogSink {
    async fn complete(&self, session_id: u64, message_id: u64, status: NtStatus, body: Vec<u8>) {
        info!(session_id, message_id, %status, bytes = body.len(), "async completion");
    }
}

fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn tree_connect_body(unc: &str) -> Vec<u8> {
    let path = utf16(unc);
    let mut body = Vec::new();
    put16(&mut body, 9);
    put16(&mut body, 0);
    put16(&mut body, 72);
    put16(&mut body, path.len() as u16);
    body.extend_from_slice(&path);
    body
}

fn create_body(name: &str, disposition: u32, options: u32) -> Vec<u8> {
    let encoded = utf16(name);
    let mut body = Vec::new();
    put16(&mut body, 57);
    body.push(0);
    body.push(0);
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

fn write_body(file_id: [u8; 16], offset: u64, data: &[u8]) -> Vec<u8> {
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

fn read_body(file_id: [u8; 16], offset: u64, length: u32) -> Vec<u8> {
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

fn query_directory_body(file_id: [u8; 16]) -> Vec<u8> {
    let pattern = utf16("*");
    let mut body = Vec::new();
    put16(&mut body, 33);
    body.push(3); // FileBothDirectoryInformation
    body.push(0x01); // restart
    put32(&mut body, 0);
    body.extend_from_slice(&file_id);
    put16(&mut body, 96);
    put16(&mut body, pattern.len() as u16);
    put32(&mut body, 65536);
    body.extend_from_slice(&pattern);
    body
}

fn file_id_of(create_response: &HandlerResult) -> [u8; 16] {
    let mut file_id = [0u8; 16];
    file_id.copy_from_slice(&create_response.body[64..80]);
    file_id
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
            }),
        )
        .init();

    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).expect("read config file");
            EngineConfig::from_toml(&text).expect("parse config file")
        }
        None => EngineConfig::default(),
    };

    let mut registry = MemRegistry::new();
    registry.add_share("/export", false, SharePermission::ReadWrite);
    registry.user_store().add_user(UserRecord {
        username: "demo".into(),
        uid: Some(1000),
        gid: Some(1000),
    });
    let registry: Arc<dyn Registry> = Arc::new(registry);

    let oplocks = Arc::new(OplockManager::new(
        Arc::new(LogNotifier),
        registry.get_lock_store(),
        config.clone(),
    ));
    oplocks.clone().spawn_scanner();
    let dispatcher = Dispatcher::new(
        registry.clone(),
        Arc::new(Handles::new()),
        oplocks,
        Arc::new(NotifyRegistry::new(Arc::new(LogSink))),
        config,
    );

    let addr: SocketAddr = "127.0.0.1:54321".parse().expect("literal address");
    let user = registry.get_user_store().get_user("demo").await.expect("seeded user");
    let session = dispatcher.register_session(Some(user), false).await;
    info!(session_id = session.session_id, "session registered");

    let mut ctx = RequestContext {
        session_id: session.session_id,
        tree_id: 0,
        message_id: 1,
        client_addr: addr,
        cancel: CancellationToken::new(),
    };

    let connect = dispatcher
        .dispatch(Command::TreeConnect, &ctx, &tree_connect_body("\\\\localhost\\EXPORT"))
        .await
        .expect("tree connect responds");
    info!(status = %connect.status, "TREE_CONNECT");
    ctx.tree_id = connect.granted_tree_id.expect("tree granted");

    ctx.message_id += 1;
    let create = dispatcher
        .dispatch(Command::Create, &ctx, &create_body("readme.txt", 3, 0))
        .await
        .expect("create responds");
    info!(status = %create.status, bytes = create.body.len(), "CREATE readme.txt");
    let file_id = file_id_of(&create);

    ctx.message_id += 1;
    let write = dispatcher
        .dispatch(Command::Write, &ctx, &write_body(file_id, 0, b"hello from memshare\n"))
        .await
        .expect("write responds");
    info!(status = %write.status, "WRITE");

    ctx.message_id += 1;
    let read = dispatcher
        .dispatch(Command::Read, &ctx, &read_body(file_id, 0, 64))
        .await
        .expect("read responds");
    let text = String::from_utf8_lossy(&read.body[16..]).into_owned();
    info!(status = %read.status, data = %text.trim_end(), "READ");

    ctx.message_id += 1;
    let root = dispatcher
        .dispatch(Command::Create, &ctx, &create_body("", 1, 0x1))
        .await
        .expect("root open responds");
    let root_id = file_id_of(&root);
    ctx.message_id += 1;
    let listing = dispatcher
        .dispatch(Command::QueryDirectory, &ctx, &query_directory_body(root_id))
        .await
        .expect("query directory responds");
    info!(status = %listing.status, bytes = listing.body.len(), "QUERY_DIRECTORY");

    info!("demo complete");
}
