use smb_mamont::smb2::Command;
use smb_mamont::status::NtStatus;

use crate::common::*;

const BATCH: u8 = 9;
const LEVEL_II: u8 = 1;

#[tokio::test]
async fn first_opener_is_granted_batch() {
    let mut fixture = Fixture::new().await;
    let response = fixture
        .send(Command::Create, &create_body_with_oplock("cached.txt", 3, 0, BATCH))
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body[2], BATCH);
    assert!(fixture.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn conflicting_open_breaks_the_holder() {
    let mut fixture = Fixture::new().await;
    fixture
        .send(Command::Create, &create_body_with_oplock("shared.txt", 3, 0, BATCH))
        .await;

    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let ctx = fixture.ctx_for(other_session, other_tree);
    let response = fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body_with_oplock("shared.txt", 1, 0, LEVEL_II))
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    // The second opener retries after the break: no grant yet.
    assert_eq!(response.body[2], 0);

    let sent = fixture.notifier.sent.lock().await;
    assert_eq!(
        sent.as_slice(),
        [Break::Oplock { session_id: fixture.session_id, level: LEVEL_II }]
    );
}

#[tokio::test]
async fn break_acknowledgment_round_trip() {
    let mut fixture = Fixture::new().await;
    let holder = fixture
        .send(Command::Create, &create_body_with_oplock("ack.txt", 3, 0, BATCH))
        .await;
    let holder_id = file_id_of(&holder);

    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let ctx = fixture.ctx_for(other_session, other_tree);
    fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body_with_oplock("ack.txt", 1, 0, LEVEL_II))
        .await
        .unwrap();

    // Acknowledge down to level II, as the break requested.
    let mut body = Vec::new();
    put16(&mut body, 24);
    body.push(LEVEL_II);
    body.extend_from_slice(&[0u8; 5]);
    body.extend_from_slice(&holder_id);
    let response = fixture.send(Command::OplockBreak, &body).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 24);
    assert_eq!(response.body[2], LEVEL_II);

    // A second acknowledgment has nothing pending.
    let response = fixture.send(Command::OplockBreak, &body).await;
    assert_eq!(response.status, NtStatus::INVALID_OPLOCK_PROTOCOL);
}

#[tokio::test]
async fn lease_grant_and_upgrade() {
    let mut fixture = Fixture::new().await;
    let key = [0x42; 16];
    let response = fixture
        .send(Command::Create, &create_body_with_lease("leased.txt", 3, key, 0x1))
        .await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 88 + 56);
    assert_eq!(response.body[2], 0xFF);
    // Granted state in the response context: Read.
    assert_eq!(&response.body[112..128], &key);
    assert_eq!(u32::from_le_bytes(response.body[128..132].try_into().unwrap()), 0x1);

    // Same key upgrades by union.
    let response = fixture
        .send(Command::Create, &create_body_with_lease("leased.txt", 1, key, 0x4))
        .await;
    assert_eq!(u32::from_le_bytes(response.body[128..132].try_into().unwrap()), 0x5);
}

#[tokio::test]
async fn conflicting_lease_key_gets_nothing_and_holder_breaks() {
    let mut fixture = Fixture::new().await;
    fixture
        .send(Command::Create, &create_body_with_lease("fought.txt", 3, [1; 16], 0x5))
        .await;

    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let ctx = fixture.ctx_for(other_session, other_tree);
    let response = fixture
        .dispatcher
        .dispatch(
            Command::Create,
            &ctx,
            &create_body_with_lease("fought.txt", 1, [2; 16], 0x4),
        )
        .await
        .unwrap();
    assert_eq!(response.status, NtStatus::SUCCESS);
    // No lease context: the open proceeds uncached.
    assert_eq!(response.body.len(), 88);

    let sent = fixture.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Break::Lease { session_id, key, target } => {
            assert_eq!(*session_id, fixture.session_id);
            assert_eq!(*key, [1; 16]);
            // Requester wanted Write, so the holder drops to Read.
            assert_eq!(target.bits(), 0x1);
        }
        other => panic!("expected lease break, got {:?}", other),
    }
}

#[tokio::test]
async fn lease_break_acknowledgment() {
    let mut fixture = Fixture::new().await;
    fixture
        .send(Command::Create, &create_body_with_lease("down.txt", 3, [7; 16], 0x5))
        .await;
    let (other_session, other_tree) = fixture.login("\\\\srv\\EXPORT").await;
    let ctx = fixture.ctx_for(other_session, other_tree);
    fixture
        .dispatcher
        .dispatch(Command::Create, &ctx, &create_body_with_lease("down.txt", 1, [8; 16], 0x4))
        .await
        .unwrap();

    // Holder acknowledges down to Read (the break target).
    let mut body = Vec::new();
    put16(&mut body, 36);
    put16(&mut body, 0);
    put32(&mut body, 0);
    body.extend_from_slice(&[7; 16]);
    put32(&mut body, 0x1);
    put64(&mut body, 0);
    let response = fixture.send(Command::OplockBreak, &body).await;
    assert_eq!(response.status, NtStatus::SUCCESS);
    assert_eq!(response.body.len(), 36);
    assert_eq!(u32::from_le_bytes(response.body[24..28].try_into().unwrap()), 0x1);
}
