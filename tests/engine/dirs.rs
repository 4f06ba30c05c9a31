use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

const NAMES_CLASS: u8 = 12;
const BOTH_CLASS: u8 = 3;
const RESTART: u8 = 0x01;

#[tokio::test]
async fn match_all_lists_dot_entries_and_children() {
    let mut fixture = Fixture::new().await;
    fixture.open("a.txt", 3, 0).await;
    fixture.open("b.log", 3, 0).await;
    fixture.open("docs", 2, 0x1).await;
    let root_id = fixture.open("", 1, 0x1).await;

    let response = fixture
        .send(
            Command::QueryDirectory,
            &query_directory_body(root_id, NAMES_CLASS, RESTART, "*"),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let names = names_of(&response.body[8..]);
    assert_eq!(names, [".", "..", "a.txt", "b.log", "docs"]);
}

#[tokio::test]
async fn pattern_filters_case_insensitively() {
    let mut fixture = Fixture::new().await;
    fixture.open("Readme.TXT", 3, 0).await;
    fixture.open("notes.md", 3, 0).await;
    let root_id = fixture.open("", 1, 0x1).await;

    let response = fixture
        .send(
            Command::QueryDirectory,
            &query_directory_body(root_id, NAMES_CLASS, RESTART, "*.txt"),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(names_of(&response.body[8..]), ["Readme.TXT"]);
}

#[tokio::test]
async fn exhausted_enumeration_reports_no_more_files() {
    let mut fixture = Fixture::new().await;
    fixture.open("only.txt", 3, 0).await;
    let root_id = fixture.open("", 1, 0x1).await;

    let first = fixture
        .send(Command::QueryDirectory, &query_directory_body(root_id, NAMES_CLASS, RESTART, "*"))
        .await;
    assert_eq!(first.status, NtStatus::SUCCESS);

    let second = fixture
        .send(Command::QueryDirectory, &query_directory_body(root_id, NAMES_CLASS, 0, "*"))
        .await;
    assert_eq!(second.status, NtStatus::NO_MORE_FILES);

    // A restart scans from the top again.
    let third = fixture
        .send(Command::QueryDirectory, &query_directory_body(root_id, NAMES_CLASS, RESTART, "*"))
        .await;
    assert_eq!(third.status, NtStatus::SUCCESS);
}

#[tokio::test]
async fn both_directory_entries_are_eight_aligned() {
    let mut fixture = Fixture::new().await;
    fixture.open("one.txt", 3, 0).await;
    fixture.open("two.txt", 3, 0).await;
    let root_id = fixture.open("", 1, 0x1).await;

    let response = fixture
        .send(
            Command::QueryDirectory,
            &query_directory_body(root_id, BOTH_CLASS, RESTART, "*.txt"),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let buffer = &response.body[8..];
    // Walk the chain: every entry base is 8-aligned, the last offset is
    // zero.
    let mut pos = 0usize;
    loop {
        assert_eq!(pos % 8, 0);
        let next = u32::from_le_bytes(buffer[pos..pos + 4].try_into().unwrap()) as usize;
        if next == 0 {
            break;
        }
        pos += next;
    }
}

#[tokio::test]
async fn query_on_file_handle_is_invalid() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("flat.txt", 3, 0).await;
    let response = fixture
        .send(Command::QueryDirectory, &query_directory_body(file_id, NAMES_CLASS, RESTART, "*"))
        .await;
    assert_eq!(response.status, NtStatus::INVALID_PARAMETER);
}

#[tokio::test]
async fn unknown_info_class_is_unsupported() {
    let mut fixture = Fixture::new().await;
    let root_id = fixture.open("", 1, 0x1).await;
    let response = fixture
        .send(Command::QueryDirectory, &query_directory_body(root_id, 200, RESTART, "*"))
        .await;
    assert_eq!(response.status, NtStatus::NOT_SUPPORTED);
}

#[tokio::test]
async fn listing_a_subdirectory() {
    let mut fixture = Fixture::new().await;
    fixture.open("docs", 2, 0x1).await;
    fixture.open("docs\\inner.txt", 3, 0).await;
    let dir_id = fixture.open("docs", 1, 0x1).await;

    let response = fixture
        .send(
            Command::QueryDirectory,
            &query_directory_body(dir_id, NAMES_CLASS, RESTART, "inner*"),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(names_of(&response.body[8..]), ["inner.txt"]);
}
