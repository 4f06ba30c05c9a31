use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

const INFO_FILE: u8 = 0x01;
const INFO_FS: u8 = 0x02;
const INFO_SECURITY: u8 = 0x03;

#[tokio::test]
async fn file_basic_information() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("plain.txt", 3, 0).await;
    let response = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 4)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let buffer = &response.body[8..];
    assert_eq!(buffer.len(), 40);
    // FILE_ATTRIBUTE_NORMAL.
    assert_eq!(u32::from_le_bytes(buffer[32..36].try_into().unwrap()), 0x80);
}

#[tokio::test]
async fn file_standard_information() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("sized.txt", 3, 0).await;
    fixture.write(file_id, 0, &[7u8; 5000]).await;

    let response = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 5)).await;
    let buffer = &response.body[8..];
    assert_eq!(buffer.len(), 24);
    assert_eq!(u64::from_le_bytes(buffer[0..8].try_into().unwrap()), 8192); // allocation
    assert_eq!(u64::from_le_bytes(buffer[8..16].try_into().unwrap()), 5000); // eof
    assert_eq!(u32::from_le_bytes(buffer[16..20].try_into().unwrap()), 1); // links
    assert_eq!(buffer[21], 0); // not a directory
}

#[tokio::test]
async fn file_internal_information_is_stable() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("id.txt", 3, 0).await;
    let first = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 6)).await;
    let second = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 6)).await;
    assert_eq!(first.body, second.body);
    assert_eq!(first.body[8..].len(), 8);
}

#[tokio::test]
async fn file_all_information_carries_the_name() {
    let mut fixture = Fixture::new().await;
    fixture.open("docs", 2, 0x1).await;
    let file_id = fixture.open("docs\\deep.txt", 3, 0).await;
    let response =
        fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 18)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let buffer = &response.body[8..];
    assert!(buffer.len() >= 104);
    let name = utf16("\\docs\\deep.txt");
    assert!(buffer.windows(name.len()).any(|window| window == name.as_slice()));
}

#[tokio::test]
async fn unknown_file_class_is_unsupported() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("x.txt", 3, 0).await;
    let response =
        fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 250)).await;
    assert_eq!(response.status, NtStatus::NOT_SUPPORTED);
}

#[tokio::test]
async fn filesystem_size_information_uses_4096_units() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("any.txt", 3, 0).await;
    let response = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FS, 3)).await;
    let buffer = &response.body[8..];
    assert_eq!(buffer.len(), 24);
    // 8 GiB total in 4096-byte units.
    assert_eq!(u64::from_le_bytes(buffer[0..8].try_into().unwrap()), (8u64 << 30) / 4096);
    assert_eq!(u32::from_le_bytes(buffer[16..20].try_into().unwrap()), 8); // sectors per unit
    assert_eq!(u32::from_le_bytes(buffer[20..24].try_into().unwrap()), 512);
}

#[tokio::test]
async fn filesystem_attribute_information_names_ntfs() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("any.txt", 3, 0).await;
    let response = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FS, 5)).await;
    let buffer = &response.body[8..];
    assert_eq!(u32::from_le_bytes(buffer[0..4].try_into().unwrap()), 0x3);
    assert_eq!(&buffer[12..], utf16("NTFS").as_slice());
}

#[tokio::test]
async fn security_descriptor_is_self_relative_with_dacl() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("secured.txt", 3, 0).await;
    let response =
        fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_SECURITY, 0)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let buffer = &response.body[8..];
    assert_eq!(buffer[0], 1); // revision
    let control = u16::from_le_bytes([buffer[2], buffer[3]]);
    assert_eq!(control & 0x8000, 0x8000); // self-relative
    assert_eq!(control & 0x0004, 0x0004); // DACL present
    // Owner SID carries the creator uid as its final RID.
    let owner_offset = u32::from_le_bytes(buffer[4..8].try_into().unwrap()) as usize;
    let owner = &buffer[owner_offset..];
    let rid_offset = 8 + 4 * 4; // header + first four sub-authorities
    assert_eq!(
        u32::from_le_bytes(owner[rid_offset..rid_offset + 4].try_into().unwrap()),
        1042
    );
}

#[tokio::test]
async fn set_end_of_file_changes_size() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("grow.txt", 3, 0).await;
    let mut buffer = Vec::new();
    put64(&mut buffer, 9000);
    let response =
        fixture.send(Command::SetInfo, &set_info_body(file_id, INFO_FILE, 20, &buffer)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body, [2, 0]);

    let check = fixture.send(Command::QueryInfo, &query_info_body(file_id, INFO_FILE, 5)).await;
    assert_eq!(u64::from_le_bytes(check.body[8 + 8..8 + 16].try_into().unwrap()), 9000);
}

#[tokio::test]
async fn rename_moves_across_directories() {
    let mut fixture = Fixture::new().await;
    fixture.open("attic", 2, 0x1).await;
    let file_id = fixture.open("old.txt", 3, 0).await;
    let response = fixture
        .send(
            Command::SetInfo,
            &set_info_body(file_id, INFO_FILE, 10, &rename_buffer("attic\\new.txt", false)),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);

    let gone = fixture.send(Command::Create, &create_body("old.txt", 1, 0)).await;
    assert_eq!(gone.status, NtStatus::OBJECT_NAME_NOT_FOUND);
    let there = fixture.send(Command::Create, &create_body("attic\\new.txt", 1, 0)).await;
    assert_eq!(there.status, NtStatus::SUCCESS);
}

#[tokio::test]
async fn rename_collision_respects_replace_flag() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("src.txt", 3, 0).await;
    fixture.open("dst.txt", 3, 0).await;

    let refused = fixture
        .send(
            Command::SetInfo,
            &set_info_body(file_id, INFO_FILE, 10, &rename_buffer("dst.txt", false)),
        )
        .await;
    assert_eq!(refused.status, NtStatus::OBJECT_NAME_COLLISION);

    let replaced = fixture
        .send(
            Command::SetInfo,
            &set_info_body(file_id, INFO_FILE, 10, &rename_buffer("dst.txt", true)),
        )
        .await;
    assert_eq!(replaced.status, NtStatus::SUCCESS);
}

#[tokio::test]
async fn disposition_then_close_deletes() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("marked.txt", 3, 0).await;
    let response =
        fixture.send(Command::SetInfo, &set_info_body(file_id, INFO_FILE, 13, &[1])).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    fixture.close(file_id).await;

    let gone = fixture.send(Command::Create, &create_body("marked.txt", 1, 0)).await;
    assert_eq!(gone.status, NtStatus::OBJECT_NAME_NOT_FOUND);
}

#[tokio::test]
async fn allocation_is_accepted_and_link_is_not() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("hints.txt", 3, 0).await;
    let mut buffer = Vec::new();
    put64(&mut buffer, 1 << 20);
    let response =
        fixture.send(Command::SetInfo, &set_info_body(file_id, INFO_FILE, 19, &buffer)).await;
    assert_eq!(response.status, NtStatus::SUCCESS);

    let response =
        fixture.send(Command::SetInfo, &set_info_body(file_id, INFO_FILE, 11, &[])).await;
    assert_eq!(response.status, NtStatus::NOT_SUPPORTED);
}

#[tokio::test]
async fn security_set_is_accepted_and_ignored() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("sd.txt", 3, 0).await;
    let response = fixture
        .send(Command::SetInfo, &set_info_body(file_id, INFO_SECURITY, 0, &[0u8; 20]))
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
}
