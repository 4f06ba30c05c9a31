use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

#[tokio::test]
async fn tree_connect_reports_disk_share_and_access_mask() {
    let mut fixture = Fixture::new().await;
    let ctx = fixture.ctx_for(fixture.session_id, 0);
    let response = fixture
        .dispatcher
        .dispatch(Command::TreeConnect, &ctx, &tree_connect_body("\\\\srv\\EXPORT"))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 16);
    assert_eq!(response.body[2], 0x01); // disk
    assert_eq!(
        u32::from_le_bytes(response.body[12..16].try_into().unwrap()),
        0x0013_01BF
    );
    assert!(response.granted_tree_id.is_some());
}

#[tokio::test]
async fn read_only_share_caps_access_to_read() {
    let mut fixture = Fixture::new().await;
    let ctx = fixture.ctx_for(fixture.session_id, 0);
    let response = fixture
        .dispatcher
        .dispatch(Command::TreeConnect, &ctx, &tree_connect_body("\\\\srv\\ARCHIVE"))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(
        u32::from_le_bytes(response.body[12..16].try_into().unwrap()),
        0x0012_00A9
    );
}

#[tokio::test]
async fn unknown_share_is_rejected() {
    let mut fixture = Fixture::new().await;
    let ctx = fixture.ctx_for(fixture.session_id, 0);
    let response = fixture
        .dispatcher
        .dispatch(Command::TreeConnect, &ctx, &tree_connect_body("\\\\srv\\NOPE"))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::BAD_NETWORK_NAME);
}

#[tokio::test]
async fn ipc_share_is_a_capped_pipe() {
    let mut fixture = Fixture::new().await;
    let ctx = fixture.ctx_for(fixture.session_id, 0);
    let response = fixture
        .dispatcher
        .dispatch(Command::TreeConnect, &ctx, &tree_connect_body("\\\\srv\\IPC$"))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body[2], 0x02); // pipe
    assert_eq!(u32::from_le_bytes(response.body[12..16].try_into().unwrap()), 0x1F);
}

#[tokio::test]
async fn tree_disconnect_invalidates_the_tree() {
    let mut fixture = Fixture::new().await;
    let body = {
        let mut body = Vec::new();
        put16(&mut body, 4);
        put16(&mut body, 0);
        body
    };
    let response = fixture.send(Command::TreeDisconnect, &body).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 4);

    let again = fixture.send(Command::TreeDisconnect, &body).await;
    assert_eq!(again.status, NtStatus::NETWORK_NAME_DELETED);
}

#[tokio::test]
async fn echo_needs_no_session() {
    let mut fixture = Fixture::new().await;
    let ctx = fixture.ctx_for(9999, 0);
    let body = {
        let mut body = Vec::new();
        put16(&mut body, 4);
        put16(&mut body, 0);
        body
    };
    let response = fixture.dispatcher.dispatch(Command::Echo, &ctx, &body).await.unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body, [4, 0, 0, 0]);
}

#[tokio::test]
async fn logoff_cascades_to_trees_and_files() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("doomed.txt", 3, 0).await;

    let body = {
        let mut body = Vec::new();
        put16(&mut body, 4);
        put16(&mut body, 0);
        body
    };
    let response = fixture.send(Command::Logoff, &body).await;
    assert_eq!(response.status, NtStatus::SUCCESS);

    // Session, tree, and open file are all gone.
    let read = fixture.send(Command::Read, &read_body(file_id, 0, 4)).await;
    assert_eq!(read.status, NtStatus::USER_SESSION_DELETED);
}

#[tokio::test]
async fn session_scoped_failures_use_distinct_statuses() {
    let mut fixture = Fixture::new().await;
    // Unknown session.
    let ctx = fixture.ctx_for(424242, 1);
    let response = fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body("x", 1, 0))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::USER_SESSION_DELETED);

    // Valid session, unknown tree.
    let ctx = fixture.ctx_for(fixture.session_id, 777);
    let response = fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body("x", 1, 0))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::NETWORK_NAME_DELETED);

    // Valid tree, unknown file.
    let response = fixture.send(Command::Read, &read_body([9; 16], 0, 4)).await;
    assert_eq!(response.status, NtStatus::INVALID_HANDLE);
}
