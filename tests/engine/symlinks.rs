use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;
use smb_mamont::store::Registry;

use crate::common::*;

#[tokio::test]
async fn mfsymlink_close_converts_to_real_symlink() {
    let mut fixture = Fixture::new().await;
    let payload = mfsymlink_payload("bar");
    assert_eq!(payload.len(), 1067);

    let file_id = fixture.open("link.txt", 3, 0).await;
    fixture.write(file_id, 0, &payload).await;
    fixture.close(file_id).await;

    // Reopening materializes the payload from the symlink target.
    let response = fixture.send(Command::Create, &create_body("link.txt", 1, 0)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    // EndofFile reports the exact MFsymlink size, attributes carry the
    // reparse bit.
    assert_eq!(u64::from_le_bytes(response.body[48..56].try_into().unwrap()), 1067);
    assert_eq!(
        u32::from_le_bytes(response.body[56..60].try_into().unwrap()) & 0x400,
        0x400
    );

    let reopened = file_id_of(&response);
    let read = fixture.send(Command::Read, &read_body(reopened, 0, 16)).await;
    assert_eq!(read.status, NtStatus::SUCCESS);
    assert!(read.body[16..].starts_with(b"XSym\n0003\n"));
}

#[tokio::test]
async fn short_files_are_left_alone_on_close() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("not-a-link.txt", 3, 0).await;
    fixture.write(file_id, 0, b"XSym\nbut way too short").await;
    fixture.close(file_id).await;

    let response = fixture.send(Command::Create, &create_body("not-a-link.txt", 1, 0)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    // Still a plain file of the original size.
    assert_eq!(
        u64::from_le_bytes(response.body[48..56].try_into().unwrap()),
        22
    );
    assert_eq!(u32::from_le_bytes(response.body[56..60].try_into().unwrap()), 0x80);
}

#[tokio::test]
async fn exact_size_without_magic_is_left_alone() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("big.bin", 3, 0).await;
    fixture.write(file_id, 0, &[0x5A; 1067]).await;
    fixture.close(file_id).await;

    let response = fixture.send(Command::Create, &create_body("big.bin", 1, 0)).await;
    assert_eq!(u32::from_le_bytes(response.body[56..60].try_into().unwrap()), 0x80);
}

#[tokio::test]
async fn get_reparse_point_returns_the_target() {
    let mut fixture = Fixture::new().await;
    let payload = mfsymlink_payload("deep/target");
    let file_id = fixture.open("jump", 3, 0).await;
    fixture.write(file_id, 0, &payload).await;
    fixture.close(file_id).await;

    let link_id = fixture.open("jump", 1, 0).await;
    let response = fixture
        .send(Command::Ioctl, &ioctl_body(link_id, 0x0009_00A8, &[]))
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let output = &response.body[48..];
    // Reparse tag and the substitute name in wire separators.
    assert_eq!(u32::from_le_bytes(output[0..4].try_into().unwrap()), 0xA000_000C);
    let name = utf16("deep\\target");
    assert!(output.windows(name.len()).any(|window| window == name.as_slice()));
}

#[tokio::test]
async fn validate_negotiate_recomputes_the_dialect() {
    let mut fixture = Fixture::new().await;
    let mut input = Vec::new();
    put32(&mut input, 0); // Capabilities
    input.extend_from_slice(&[0u8; 16]); // client guid
    put16(&mut input, 0x1); // SecurityMode
    put16(&mut input, 2); // DialectCount
    put16(&mut input, 0x0202);
    put16(&mut input, 0x0210);

    let response = fixture
        .send(Command::Ioctl, &ioctl_body([0xFF; 16], 0x0014_0204, &input))
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let output = &response.body[48..];
    assert_eq!(output.len(), 24);
    assert_eq!(u32::from_le_bytes(output[0..4].try_into().unwrap()), 0);
    assert_eq!(output[4..20], fixture.registry.server_guid());
    assert_eq!(u16::from_le_bytes([output[22], output[23]]), 0x0210);
}

#[tokio::test]
async fn validate_negotiate_requires_the_null_file_id() {
    let mut fixture = Fixture::new().await;
    let mut input = Vec::new();
    put32(&mut input, 0);
    input.extend_from_slice(&[0u8; 16]);
    put16(&mut input, 0x1);
    put16(&mut input, 1);
    put16(&mut input, 0x0202);
    let response = fixture
        .send(Command::Ioctl, &ioctl_body([0x11; 16], 0x0014_0204, &input))
        .await;
    assert_eq!(response.status, NtStatus::INVALID_PARAMETER);
}

#[tokio::test]
async fn unknown_control_codes_are_unsupported() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("any.txt", 3, 0).await;
    let response = fixture
        .send(Command::Ioctl, &ioctl_body(file_id, 0x0009_0000, &[]))
        .await;
    assert_eq!(response.status, NtStatus::NOT_SUPPORTED);
}

#[tokio::test]
async fn pipe_transceive_on_disk_handle_is_a_category_error() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("disk.txt", 3, 0).await;
    let response = fixture
        .send(Command::Ioctl, &ioctl_body(file_id, 0x0011_C017, &[]))
        .await;
    assert_eq!(response.status, NtStatus::INVALID_DEVICE_REQUEST);
}
