use modemsms_core::{
    timestamp::TimezoneCorrection, Direction, IntegrityWarning, ModemScope, RawPart, StorageId,
};
use modemsms_engine::RefreshOutcome;
use modemsms_harness::{init_test_logging, TestModem};
use modemsms_storage::SqliteModemStore;

// ============================================================================
// Reassembly through the engine
// ============================================================================

#[test]
fn out_of_order_segments_reassemble() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut modem = TestModem::new()?;
    let ids = modem.receive_segments(
        "+15550001000",
        1_000,
        42,
        3,
        &[(3, "three"), (1, "one "), (2, "two ")],
    )?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let list = engine.conversations();
    assert_eq!(list.len(), 1);
    let message = &list[0].messages[0];
    assert_eq!(message.content, "one two three");
    assert!(message.is_complete());
    assert!(message.is_multipart);
    assert_eq!(message.part_ids, vec![ids[1], ids[2], ids[0]]);
    assert_eq!(message.id, ids[1]);
    Ok(())
}

#[test]
fn missing_segment_is_visible_and_flagged() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive_segments("555000100", 1_000, 7, 3, &[(1, "one "), (3, "three")])?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let conv = engine.conversation("555000100").ok_or("conversation missing")?;
    let message = &conv.messages[0];
    assert_eq!(message.content, "one three");
    assert!(!message.is_complete());
    assert_eq!(message.incomplete_label().as_deref(), Some("Incomplete (part 2/3)"));
    assert!(message
        .warnings
        .contains(&IntegrityWarning::MissingParts { missing: vec![2] }));
    Ok(())
}

#[test]
fn late_segment_completes_message() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive_segments("555000100", 1_000, 7, 2, &[(1, "first ")])?;
    let scope = modem.scope.clone();
    let mut engine = modem.into_engine()?;
    engine.refresh()?;
    assert!(!engine.conversations()[0].messages[0].is_complete());

    engine.transport_mut().insert_part(
        &scope,
        &RawPart::received(9, "555000100", 1_000, "second").with_segment(7, 2, 2),
    )?;
    assert!(matches!(engine.refresh()?, RefreshOutcome::Rebuilt { .. }));

    let list = engine.conversations();
    assert_eq!(list[0].messages.len(), 1);
    assert_eq!(list[0].messages[0].content, "first second");
    assert!(list[0].messages[0].is_complete());
    Ok(())
}

#[test]
fn same_reference_different_contacts_stay_apart() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive_multipart("555000100", 1_000, 5, &["a1 ", "a2"])?;
    modem.receive_multipart("555000200", 2_000, 5, &["b1 ", "b2"])?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    assert_eq!(engine.conversation("555000100").ok_or("a")?.messages[0].content, "a1 a2");
    assert_eq!(engine.conversation("555000200").ok_or("b")?.messages[0].content, "b1 b2");
    Ok(())
}

// ============================================================================
// Conversation index
// ============================================================================

#[test]
fn latest_conversation_listed_first() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive("555000100", 100, "older")?;
    modem.receive("555000200", 200, "newer")?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let list = engine.conversations();
    assert_eq!(list[0].contact, "555000200");
    assert_eq!(list[1].contact, "555000100");
    Ok(())
}

#[test]
fn both_directions_share_a_thread() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive("(555) 000-100", 100, "question")?;
    modem.record_sent("555000100", 200, "answer")?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let list = engine.conversations();
    assert_eq!(list.len(), 1);
    let directions: Vec<Direction> = list[0].messages.iter().map(|m| m.direction).collect();
    assert_eq!(directions, vec![Direction::Received, Direction::Sent]);
    assert_eq!(list[0].unread_count, 1);
    Ok(())
}

#[test]
fn unchanged_snapshot_keeps_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive("555000100", 100, "hi")?;
    let mut engine = modem.into_engine()?;
    assert!(matches!(engine.refresh()?, RefreshOutcome::Rebuilt { .. }));
    assert_eq!(engine.refresh()?, RefreshOutcome::Unchanged);
    Ok(())
}

// ============================================================================
// Timezone correction
// ============================================================================

#[test]
fn correction_reorders_within_conversation() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.record_sent("555000100", 10_000, "sent")?;
    modem.receive("555000100", 30_000, "received")?;
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let order = |engine: &modemsms_engine::Engine<SqliteModemStore, _>| -> Vec<String> {
        engine.conversations()[0]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect()
    };
    assert_eq!(order(&engine), vec!["sent", "received"]);

    engine.set_timezone_correction(TimezoneCorrection { received: true, sent: false })?;
    assert_eq!(order(&engine), vec!["received", "sent"]);
    assert_eq!(engine.conversations()[0].messages[0].timestamp, 30_000 - 28_800);
    assert_eq!(engine.conversations()[0].messages[0].raw_timestamp, 30_000);

    engine.set_timezone_correction(TimezoneCorrection::NONE)?;
    assert_eq!(order(&engine), vec!["sent", "received"]);
    Ok(())
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn raw_listing_labels_segments() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive("10086", 1, "balance")?;
    modem.receive_segments("555000100", 2, 3, 3, &[(2, "mid")])?;
    let engine = modem.into_engine()?;

    let labels: Vec<String> = engine.raw_parts()?.iter().map(|p| p.label()).collect();
    assert_eq!(labels, vec!["Single", "Part 2/3"]);
    Ok(())
}

#[test]
fn imported_file_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("modem.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;

    let records = serde_json::json!([
        { "index": 0, "type": "received", "sender": "10086", "timestamp": 1_700_000_000, "content": "Your balance is 5.00" },
        { "index": 1, "type": "received", "sender": "555000100", "timestamp": "1700000100", "content": "Hello ", "reference": 12, "part": 1, "total": 2 },
        { "index": 2, "type": "received", "sender": "555000100", "timestamp": 1_700_000_100, "content": "world", "reference": 12, "part": 2, "total": 2, "is_read": true },
        { "index": 0, "type": "sent", "recipient": "555000100", "timestamp": 1_700_000_200, "content": "Hi back" },
        { "type": "received", "sender": "555000300", "content": "no index" },
        "not an object"
    ]);

    {
        let mut store = SqliteModemStore::open(path)?;
        let report = store.import_json(&ModemScope::default(), &records.to_string())?;
        assert_eq!(report.imported, 4);
        assert_eq!(report.rejected.len(), 2);
    }

    let mut engine = TestModem::with_store(SqliteModemStore::open(path)?)?.into_engine()?;
    engine.refresh()?;
    let list = engine.conversations();
    assert_eq!(list.len(), 2);

    let thread = engine.conversation("555000100").ok_or("thread missing")?;
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.messages[0].content, "Hello world");
    assert_eq!(thread.messages[0].part_ids, vec![StorageId::new(1), StorageId::new(2)]);
    // One part still unread keeps the whole message unread.
    assert_eq!(thread.unread_count, 1);
    assert!(thread.messages[1].is_read);
    Ok(())
}
