use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

#[tokio::test]
async fn create_open_if_on_empty_share_creates() {
    let mut fixture = Fixture::new().await;
    let response = fixture.send(Command::Create, &create_body("readme.txt", 3, 0)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 88);
    // CreateAction = Created.
    assert_eq!(u32::from_le_bytes(response.body[4..8].try_into().unwrap()), 2);
    // AllocationSize and EndofFile are zero.
    assert_eq!(u64::from_le_bytes(response.body[40..48].try_into().unwrap()), 0);
    assert_eq!(u64::from_le_bytes(response.body[48..56].try_into().unwrap()), 0);
    // FILE_ATTRIBUTE_NORMAL.
    assert_eq!(u32::from_le_bytes(response.body[56..60].try_into().unwrap()), 0x80);
    assert_ne!(file_id_of(&response), [0u8; 16]);
}

#[tokio::test]
async fn second_open_if_reports_opened() {
    let mut fixture = Fixture::new().await;
    fixture.open("readme.txt", 3, 0).await;
    let response = fixture.send(Command::Create, &create_body("readme.txt", 3, 0)).await;
    assert_eq!(u32::from_le_bytes(response.body[4..8].try_into().unwrap()), 1);
}

#[tokio::test]
async fn disposition_failures() {
    let mut fixture = Fixture::new().await;
    fixture.open("taken.txt", 3, 0).await;
    // CREATE of an existing name collides.
    let response = fixture.send(Command::Create, &create_body("taken.txt", 2, 0)).await;
    assert_eq!(response.status, NtStatus::OBJECT_NAME_COLLISION);
    // OPEN of a missing name.
    let response = fixture.send(Command::Create, &create_body("missing.txt", 1, 0)).await;
    assert_eq!(response.status, NtStatus::OBJECT_NAME_NOT_FOUND);
    // OVERWRITE of a missing name.
    let response = fixture.send(Command::Create, &create_body("missing.txt", 4, 0)).await;
    assert_eq!(response.status, NtStatus::OBJECT_NAME_NOT_FOUND);
    // A missing intermediate directory is a path error.
    let response = fixture.send(Command::Create, &create_body("no\\dir\\x.txt", 3, 0)).await;
    assert_eq!(response.status, NtStatus::OBJECT_PATH_NOT_FOUND);
}

#[tokio::test]
async fn directory_constraints() {
    let mut fixture = Fixture::new().await;
    fixture.open("docs", 2, 0x1).await; // FILE_DIRECTORY_FILE
    fixture.open("plain.txt", 3, 0).await;

    let response = fixture.send(Command::Create, &create_body("plain.txt", 1, 0x1)).await;
    assert_eq!(response.status, NtStatus::NOT_A_DIRECTORY);

    let response = fixture.send(Command::Create, &create_body("docs", 1, 0x40)).await;
    assert_eq!(response.status, NtStatus::FILE_IS_A_DIRECTORY);
}

#[tokio::test]
async fn supersede_truncates() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("data.bin", 3, 0).await;
    fixture.write(file_id, 0, b"0123456789").await;

    let response = fixture.send(Command::Create, &create_body("data.bin", 0, 0)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    // CreateAction = Superseded, size back to zero.
    assert_eq!(u32::from_le_bytes(response.body[4..8].try_into().unwrap()), 0);
    assert_eq!(u64::from_le_bytes(response.body[48..56].try_into().unwrap()), 0);
}

#[tokio::test]
async fn write_then_read_round_trip() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("hello.txt", 3, 0).await;

    let response = fixture.send(Command::Write, &write_body(file_id, 0, b"hello")).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(u32::from_le_bytes(response.body[4..8].try_into().unwrap()), 5);

    let response = fixture.send(Command::Read, &read_body(file_id, 0, 16)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(&response.body[16..], b"hello");
    // DataRemaining.
    assert_eq!(u32::from_le_bytes(response.body[8..12].try_into().unwrap()), 0);
}

#[tokio::test]
async fn read_of_empty_file_is_empty_success() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("empty.txt", 3, 0).await;
    let response = fixture.send(Command::Read, &read_body(file_id, 0, 16)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 16);
}

#[tokio::test]
async fn read_past_end_of_file() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("short.txt", 3, 0).await;
    fixture.write(file_id, 0, b"abc").await;
    let response = fixture.send(Command::Read, &read_body(file_id, 3, 16)).await;
    assert_eq!(response.status, NtStatus::END_OF_FILE);
}

#[tokio::test]
async fn write_requires_share_write_permission() {
    let mut fixture = Fixture::new().await;
    let (session_id, tree_id) = fixture.login("\\\\srv\\VIEWER").await;
    let ctx = fixture.ctx_for(session_id, tree_id);
    // Creating anything on a read-gated share is a write-path command.
    let response = fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body("new.txt", 3, 0))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::ACCESS_DENIED);
}

#[tokio::test]
async fn io_against_directories_is_rejected() {
    let mut fixture = Fixture::new().await;
    let dir_id = fixture.open("docs", 2, 0x1).await;
    let response = fixture.send(Command::Read, &read_body(dir_id, 0, 4)).await;
    assert_eq!(response.status, NtStatus::INVALID_DEVICE_REQUEST);
    let response = fixture.send(Command::Write, &write_body(dir_id, 0, b"x")).await;
    assert_eq!(response.status, NtStatus::INVALID_DEVICE_REQUEST);
}

#[tokio::test]
async fn close_with_postquery_returns_attributes() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("sized.txt", 3, 0).await;
    fixture.write(file_id, 0, b"12345678").await;
    let response = fixture.send(Command::Close, &close_body(file_id, 0x0001)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 60);
    assert_eq!(u16::from_le_bytes([response.body[2], response.body[3]]), 0x0001);
    assert_eq!(u64::from_le_bytes(response.body[48..56].try_into().unwrap()), 8);
}

#[tokio::test]
async fn delete_on_close_removes_the_file() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("temp.txt", 3, 0x1000).await;
    fixture.close(file_id).await;
    let response = fixture.send(Command::Create, &create_body("temp.txt", 1, 0)).await;
    assert_eq!(response.status, NtStatus::OBJECT_NAME_NOT_FOUND);
}

#[tokio::test]
async fn closed_handle_is_invalid() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("gone.txt", 3, 0).await;
    fixture.close(file_id).await;
    let response = fixture.send(Command::Read, &read_body(file_id, 0, 4)).await;
    assert_eq!(response.status, NtStatus::INVALID_HANDLE);
}

#[tokio::test]
async fn flush_succeeds_on_written_file() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("flushed.txt", 3, 0).await;
    fixture.write(file_id, 0, b"data").await;
    let response = fixture.send(Command::Flush, &flush_body(file_id)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 4);
}
