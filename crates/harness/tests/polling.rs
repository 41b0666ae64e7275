use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use modemsms_core::RawPart;
use modemsms_engine::{ForwardError, ForwardSink, ForwardedSms, PollScope};
use modemsms_harness::{init_test_logging, TestModem};
use modemsms_storage::ModemSettings;

// ============================================================================
// Poll scheduling
// ============================================================================

#[test]
fn conversation_poll_leaves_other_threads_alone() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut modem = TestModem::new()?;
    modem.receive("555000100", 100, "a1")?;
    modem.receive("555000200", 200, "b1")?;
    let scope = modem.scope.clone();
    let mut engine = modem.into_engine()?;
    engine.refresh()?;

    let start = Instant::now();
    engine.open_conversation("555000100", start)?;

    engine
        .transport_mut()
        .insert_part(&scope, &RawPart::received(10, "555000100", 300, "a2"))?;
    engine
        .transport_mut()
        .insert_part(&scope, &RawPart::received(11, "555000200", 400, "b2"))?;

    let report = engine.poll(start + Duration::from_secs(5));
    assert_eq!(report.refreshed.len(), 1);
    assert!(matches!(report.refreshed[0], PollScope::Conversation(_)));

    let a = engine.conversation("555000100").ok_or("a missing")?;
    assert_eq!(a.messages.len(), 2);
    assert_eq!(a.unread_count, 1);
    let b = engine.conversation("555000200").ok_or("b missing")?;
    assert_eq!(b.messages.len(), 1);
    // a2 at 300 now outranks b1 at 200.
    assert_eq!(engine.conversations()[0].contact, "555000100");
    Ok(())
}

#[test]
fn closed_conversation_stops_polling() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.receive("555000100", 100, "a1")?;
    let mut engine = modem.into_flaky_engine()?;

    let start = Instant::now();
    engine.open_conversation("555000100", start)?;
    assert!(engine.close_conversation("555000100"));
    let fetches = engine.transport().fetch_calls();

    let report = engine.poll(start + Duration::from_secs(60));
    assert!(report.refreshed.is_empty());
    assert_eq!(engine.transport().fetch_calls(), fetches);
    Ok(())
}

#[test]
fn list_interval_comes_from_settings() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.configure(&ModemSettings {
        list_poll_secs: 30,
        ..ModemSettings::default()
    })?;
    modem.receive("555000100", 100, "hi")?;
    let mut engine = modem.into_engine()?;

    let start = Instant::now();
    engine.watch_conversations(start);
    assert!(engine.poll(start + Duration::from_secs(10)).refreshed.is_empty());
    assert_eq!(
        engine.poll(start + Duration::from_secs(30)).refreshed,
        vec![PollScope::Conversations]
    );
    assert_eq!(engine.conversations().len(), 1);

    assert!(engine.unwatch_conversations());
    assert!(engine.poll(start + Duration::from_secs(90)).refreshed.is_empty());
    Ok(())
}

#[test]
fn list_poll_picks_up_new_messages() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    let scope = modem.scope.clone();
    modem.receive("555000100", 100, "first")?;
    let mut engine = modem.into_engine()?;
    let start = Instant::now();
    engine.watch_conversations(start);

    engine.poll(start + Duration::from_secs(10));
    assert_eq!(engine.unread_total(), 1);

    engine
        .transport_mut()
        .insert_part(&scope, &RawPart::received(5, "10086", 200, "balance"))?;
    engine.poll(start + Duration::from_secs(20));
    assert_eq!(engine.unread_total(), 2);
    assert_eq!(engine.conversations()[0].contact, "10086");
    Ok(())
}

// ============================================================================
// Forwarding
// ============================================================================

#[derive(Default, Clone)]
struct Outbox {
    sent: Rc<RefCell<Vec<ForwardedSms>>>,
}

impl ForwardSink for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    fn forward(&mut self, sms: &ForwardedSms) -> Result<(), ForwardError> {
        self.sent.borrow_mut().push(sms.clone());
        Ok(())
    }
}

#[test]
fn multipart_forwarded_once_complete() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    let scope = modem.scope.clone();
    modem.receive_segments("555000100", 100, 21, 2, &[(1, "part one, ")])?;
    let mut engine = modem.into_engine()?;

    let outbox = Outbox::default();
    let mut sinks: Vec<Box<dyn ForwardSink>> = vec![Box::new(outbox.clone())];

    let report = engine.forward_pending(&mut sinks)?;
    assert_eq!(report.waiting, 1);
    assert!(outbox.sent.borrow().is_empty());

    engine.transport_mut().insert_part(
        &scope,
        &RawPart::received(7, "555000100", 100, "part two").with_segment(21, 2, 2),
    )?;
    let report = engine.forward_pending(&mut sinks)?;
    assert_eq!(report.forwarded, 1);

    let sent = outbox.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "part one, part two");
    assert_eq!(sent[0].sender, "555000100");
    Ok(())
}

#[test]
fn forwarded_then_deleted_when_configured() -> Result<(), Box<dyn std::error::Error>> {
    let mut modem = TestModem::new()?;
    modem.configure(&ModemSettings {
        delete_after_forward: true,
        ..ModemSettings::default()
    })?;
    let kept = modem.receive("555000100", 100, "stubborn")?;
    modem.receive("555000200", 200, "easy")?;
    let mut engine = modem.into_flaky_engine()?;
    engine.transport_mut().withhold_deletes.insert(kept);

    let outbox = Outbox::default();
    let mut sinks: Vec<Box<dyn ForwardSink>> = vec![Box::new(outbox.clone())];
    let report = engine.forward_pending(&mut sinks)?;
    assert_eq!(report.forwarded, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.delete_failures, 1);

    // The undeletable message is remembered and not forwarded again.
    let report = engine.forward_pending(&mut sinks)?;
    assert_eq!(report.forwarded, 0);
    assert_eq!(outbox.sent.borrow().len(), 2);
    assert_eq!(engine.conversations().len(), 1);
    Ok(())
}
