use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

const SHARED: u32 = 0x1;
const EXCLUSIVE: u32 = 0x2;
const UNLOCK: u32 = 0x4;
const FAIL_IMMEDIATELY: u32 = 0x10;

#[tokio::test]
async fn cross_session_conflict_rolls_back_whole_request() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("locked.bin", 3, 0).await;
    fixture.write(file_id, 0, &[0u8; 32]).await;

    // Another session takes [5, 10) exclusively.
    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    let other_open = fixture
        .dispatcher
        .dispatch(Command::Create, &other_ctx, &create_body("locked.bin", 1, 0))
        .await
        .unwrap();
    let other_file = file_id_of(&other_open);
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    let response = fixture
        .dispatcher
        .dispatch(
            Command::Lock,
            &other_ctx,
            &lock_body(
                other_file,
                &[LockElem { offset: 5, length: 5, flags: EXCLUSIVE | FAIL_IMMEDIATELY }],
            ),
        )
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);

    // This session asks for two elements; the conflict fails the
    // request and releases anything it acquired.
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(
                file_id,
                &[
                    LockElem { offset: 16, length: 8, flags: EXCLUSIVE | FAIL_IMMEDIATELY },
                    LockElem { offset: 5, length: 10, flags: SHARED | FAIL_IMMEDIATELY },
                ],
            ),
        )
        .await;
    assert_eq!(response.status, NtStatus::LOCK_NOT_GRANTED);

    // The other session can now take [16, 24): nothing lingered.
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    let response = fixture
        .dispatcher
        .dispatch(
            Command::Lock,
            &other_ctx,
            &lock_body(
                other_file,
                &[LockElem { offset: 16, length: 8, flags: EXCLUSIVE | FAIL_IMMEDIATELY }],
            ),
        )
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
}

#[tokio::test]
async fn unlock_of_unheld_range_reports_range_not_locked() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("plain.bin", 3, 0).await;
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(file_id, &[LockElem { offset: 0, length: 8, flags: UNLOCK }]),
        )
        .await;
    assert_eq!(response.status, NtStatus::RANGE_NOT_LOCKED);
}

#[tokio::test]
async fn lock_then_unlock_round_trip() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("cycle.bin", 3, 0).await;
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(
                file_id,
                &[LockElem { offset: 0, length: 8, flags: SHARED | FAIL_IMMEDIATELY }],
            ),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(file_id, &[LockElem { offset: 0, length: 8, flags: UNLOCK }]),
        )
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 4);
}

#[tokio::test]
async fn blocking_lock_gives_up_after_the_deadline() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("wait.bin", 3, 0).await;

    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    let other_open = fixture
        .dispatcher
        .dispatch(Command::Create, &other_ctx, &create_body("wait.bin", 1, 0))
        .await
        .unwrap();
    let other_file = file_id_of(&other_open);
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    fixture
        .dispatcher
        .dispatch(
            Command::Lock,
            &other_ctx,
            &lock_body(
                other_file,
                &[LockElem { offset: 0, length: 4, flags: EXCLUSIVE | FAIL_IMMEDIATELY }],
            ),
        )
        .await
        .unwrap();

    // No FAIL_IMMEDIATELY: the retry loop runs against the shortened
    // fixture deadline and then reports the conflict.
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(file_id, &[LockElem { offset: 0, length: 4, flags: EXCLUSIVE }]),
        )
        .await;
    assert_eq!(response.status, NtStatus::LOCK_NOT_GRANTED);
}

#[tokio::test]
async fn conflicting_byte_range_blocks_write() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("guarded.bin", 3, 0).await;
    fixture.write(file_id, 0, &[0u8; 16]).await;

    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    let other_open = fixture
        .dispatcher
        .dispatch(Command::Create, &other_ctx, &create_body("guarded.bin", 1, 0))
        .await
        .unwrap();
    let other_file = file_id_of(&other_open);
    let other_ctx = fixture.ctx_for(other_session, other_tree);
    fixture
        .dispatcher
        .dispatch(
            Command::Lock,
            &other_ctx,
            &lock_body(
                other_file,
                &[LockElem { offset: 0, length: 16, flags: EXCLUSIVE | FAIL_IMMEDIATELY }],
            ),
        )
        .await
        .unwrap();

    let response = fixture.send(Command::Write, &write_body(file_id, 4, b"xx")).await;
    assert_eq!(response.status, NtStatus::LOCK_NOT_GRANTED);
}

#[tokio::test]
async fn invalid_flag_combinations_are_rejected() {
    let mut fixture = Fixture::new().await;
    let file_id = fixture.open("flags.bin", 3, 0).await;
    let response = fixture
        .send(
            Command::Lock,
            &lock_body(
                file_id,
                &[LockElem { offset: 0, length: 4, flags: SHARED | EXCLUSIVE }],
            ),
        )
        .await;
    assert_eq!(response.status, NtStatus::INVALID_PARAMETER);
}
