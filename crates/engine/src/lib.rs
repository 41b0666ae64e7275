pub mod codec;
pub mod deletion;
pub mod delivery;
pub mod error;
pub mod forward;
pub mod poll;

pub use codec::{CodecError, PduCodec};
pub use deletion::DeleteReport;
pub use delivery::{DeliveryStateTracker, MarkReadOutcome};
pub use error::EngineError;
pub use forward::{ForwardError, ForwardLedger, ForwardReport, ForwardSink, ForwardedSms};
pub use poll::{FetchTicket, PollScheduler, PollScope};

use std::sync::Arc;
use std::time::{Duration, Instant};

use modemsms_core::{
    conversation,
    reassembly::reassemble,
    segment::{self, Encoding, PlanLevel, SegmentPlan},
    timestamp::{self, TimezoneCorrection},
    ContactKey, Conversation, Direction, LogicalMessage, ModemScope, RawPart, SnapshotDigest,
    StorageId, ValidationError,
};
use modemsms_storage::{ConfigStore, ModemSettings, ModemTransport};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot and settings matched the last rebuild; the list was kept.
    Unchanged,
    Rebuilt { conversations: usize, messages: usize },
}

#[derive(Debug, Default)]
pub struct PollReport {
    pub refreshed: Vec<PollScope>,
    /// Due, but the previous fetch for the scope had not finished.
    pub skipped: Vec<PollScope>,
    /// Fetched after the registration was cancelled or replaced.
    pub discarded: Vec<PollScope>,
    pub failed: Vec<(PollScope, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub plan: SegmentPlan,
    pub stored_ids: Vec<StorageId>,
}

/// One modem's message lifecycle: snapshot, reassembly, conversation view,
/// read state, deletion, sending and polling.
pub struct Engine<T, C> {
    scope: ModemScope,
    transport: T,
    codec: C,
    settings: ModemSettings,
    conversations: Arc<Vec<Conversation>>,
    digest: Option<SnapshotDigest>,
    scheduler: PollScheduler,
    tracker: DeliveryStateTracker,
    ledger: ForwardLedger,
}

impl<T: ModemTransport + ConfigStore, C: PduCodec> Engine<T, C> {
    pub fn new(scope: ModemScope, transport: T, codec: C) -> Result<Self, EngineError> {
        let settings = transport.load_settings(&scope)?;
        Ok(Self {
            scope,
            transport,
            codec,
            settings,
            conversations: Arc::new(Vec::new()),
            digest: None,
            scheduler: PollScheduler::new(),
            tracker: DeliveryStateTracker::new(),
            ledger: ForwardLedger::default(),
        })
    }

    pub fn scope(&self) -> &ModemScope {
        &self.scope
    }

    pub fn settings(&self) -> &ModemSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    // =========================================================================
    // View
    // =========================================================================

    /// The current list. Holders keep a consistent view across rebuilds.
    pub fn conversations(&self) -> Arc<Vec<Conversation>> {
        Arc::clone(&self.conversations)
    }

    pub fn conversation(&self, contact: &str) -> Option<&Conversation> {
        conversation::find(&self.conversations, contact)
    }

    /// The message whose id, or any of whose part ids, is `id`.
    pub fn message(&self, direction: Direction, id: StorageId) -> Option<&LogicalMessage> {
        self.conversations
            .iter()
            .flat_map(|c| c.messages.iter())
            .find(|m| m.direction == direction && (m.id == id || m.contains_part(id)))
    }

    pub fn unread_total(&self) -> usize {
        conversation::total_unread(&self.conversations)
    }

    /// Raw SIM listing for diagnostics, in storage order.
    pub fn raw_parts(&self) -> Result<Vec<RawPart>, EngineError> {
        Ok(self.transport.list_parts(&self.scope)?)
    }

    pub fn plan(&self, text: &str, encoding: Option<Encoding>) -> SegmentPlan {
        segment::plan(text, encoding.unwrap_or(self.settings.default_encoding))
    }

    // =========================================================================
    // Rebuild
    // =========================================================================

    pub fn refresh(&mut self) -> Result<RefreshOutcome, EngineError> {
        self.settings = self.transport.load_settings(&self.scope)?;
        let parts = self.transport.list_parts(&self.scope)?;
        self.apply_snapshot(&parts)
    }

    fn apply_snapshot(&mut self, parts: &[RawPart]) -> Result<RefreshOutcome, EngineError> {
        let correction = self.settings.timezone;
        let digest = SnapshotDigest::compute(parts, correction)?;
        self.tracker.observe(parts);

        if self.digest == Some(digest) {
            debug!(scope = %self.scope, "snapshot unchanged, keeping conversation list");
            return Ok(RefreshOutcome::Unchanged);
        }

        let mut messages = reassemble(parts);
        timestamp::apply_correction(&mut messages, correction);

        let incomplete = messages.iter().filter(|m| !m.is_complete()).count();
        if incomplete > 0 {
            debug!(scope = %self.scope, incomplete, "snapshot holds incomplete multipart messages");
        }

        let list = conversation::build(&messages);
        let outcome = RefreshOutcome::Rebuilt {
            conversations: list.len(),
            messages: messages.len(),
        };
        info!(
            scope = %self.scope,
            parts = parts.len(),
            messages = messages.len(),
            conversations = list.len(),
            "rebuilt conversation list"
        );
        self.conversations = Arc::new(list);
        self.digest = Some(digest);
        Ok(outcome)
    }

    /// Replace one conversation from a partial fetch, leaving the others as
    /// they are.
    fn apply_conversation(&mut self, key: &ContactKey, parts: &[RawPart]) {
        self.tracker.note(parts);
        let mut messages = reassemble(parts);
        timestamp::apply_correction(&mut messages, self.settings.timezone);

        let mut list: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| &c.contact_key != key)
            .cloned()
            .collect();
        for message in messages.into_iter().filter(|m| &m.contact_key == key) {
            list = conversation::upsert(&list, message);
        }

        debug!(scope = %self.scope, contact = %key, parts = parts.len(), "refreshed conversation");
        self.conversations = Arc::new(list);
        // The list no longer matches any full snapshot digest.
        self.digest = None;
    }

    fn refresh_conversation(&mut self, key: &ContactKey) -> Result<(), EngineError> {
        let parts = self
            .transport
            .list_parts_for_contact(&self.scope, key.as_str())?;
        self.apply_conversation(key, &parts);
        Ok(())
    }

    /// Rebuild after a completed operation. The operation already succeeded,
    /// so a failed rebuild is logged and left to the next poll.
    fn rebuild_after(&mut self, operation: &'static str) {
        if let Err(e) = self.refresh() {
            warn!(scope = %self.scope, operation, error = %e, "rebuild after operation failed");
        }
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Start polling the conversation list.
    pub fn watch_conversations(&mut self, now: Instant) {
        let interval = Duration::from_secs(self.settings.list_poll_secs);
        self.scheduler
            .register(PollScope::Conversations, interval, now);
    }

    pub fn unwatch_conversations(&mut self) -> bool {
        self.scheduler.cancel(&PollScope::Conversations)
    }

    /// Open a conversation: fetch it, start polling it and mark every unread
    /// received message read. `None` when the contact has no messages yet.
    pub fn open_conversation(
        &mut self,
        contact: &str,
        now: Instant,
    ) -> Result<Option<Conversation>, EngineError> {
        let key = ContactKey::normalize(contact);
        let interval = Duration::from_secs(self.settings.conversation_poll_secs);
        self.scheduler
            .register(PollScope::Conversation(key.clone()), interval, now);

        self.refresh_conversation(&key)?;
        let Some(opened) = conversation::find(&self.conversations, key.as_str()).cloned() else {
            return Ok(None);
        };

        let outcome = self
            .tracker
            .mark_conversation_read(&mut self.transport, &self.scope, &opened)?;
        if let MarkReadOutcome::Marked(_) = outcome {
            self.refresh_conversation(&key)?;
        }
        Ok(conversation::find(&self.conversations, key.as_str()).cloned())
    }

    pub fn close_conversation(&mut self, contact: &str) -> bool {
        let key = ContactKey::normalize(contact);
        self.scheduler.cancel(&PollScope::Conversation(key))
    }

    /// Run every due registration once.
    pub fn poll(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport::default();

        for scope in self.scheduler.due(now) {
            let Some(ticket) = self.scheduler.begin(&scope, now) else {
                report.skipped.push(scope);
                continue;
            };

            let fetched = match &scope {
                PollScope::Conversations => self
                    .transport
                    .load_settings(&self.scope)
                    .and_then(|settings| {
                        self.settings = settings;
                        self.transport.list_parts(&self.scope)
                    }),
                PollScope::Conversation(key) => self
                    .transport
                    .list_parts_for_contact(&self.scope, key.as_str()),
            };
            let current = self.scheduler.finish(&ticket);

            let parts = match fetched {
                Ok(parts) => parts,
                Err(e) => {
                    warn!(scope = %self.scope, poll = ?scope, error = %e, "poll fetch failed");
                    report.failed.push((scope, e.to_string()));
                    continue;
                }
            };
            if !current {
                report.discarded.push(scope);
                continue;
            }

            match &scope {
                PollScope::Conversations => {
                    if let Err(e) = self.apply_snapshot(&parts) {
                        warn!(scope = %self.scope, error = %e, "poll rebuild failed");
                        report.failed.push((scope, e.to_string()));
                        continue;
                    }
                }
                PollScope::Conversation(key) => self.apply_conversation(key, &parts),
            }
            report.refreshed.push(scope);
        }

        report
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn send(
        &mut self,
        recipient: &str,
        text: &str,
        encoding: Option<Encoding>,
    ) -> Result<SendOutcome, EngineError> {
        let recipient = recipient.trim();
        let text = text.trim();
        if recipient.is_empty() {
            return Err(ValidationError::EmptyRecipient.into());
        }
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let encoding = encoding.unwrap_or(self.settings.default_encoding);
        let plan = segment::plan(text, encoding);
        if plan.level == PlanLevel::Excessive {
            warn!(
                scope = %self.scope,
                segments = plan.segment_count,
                encoding = encoding.as_str(),
                "sending an unusually long message"
            );
        }

        let pdus = self.codec.encode(recipient, text, encoding)?;
        if pdus.len() != plan.segment_count {
            debug!(pdus = pdus.len(), planned = plan.segment_count, "codec segment count differs from plan");
        }

        let receipt = self
            .transport
            .send(&self.scope, recipient, &pdus, text)?;
        info!(scope = %self.scope, segments = pdus.len(), "message sent");

        self.rebuild_after("send");
        Ok(SendOutcome {
            plan,
            stored_ids: receipt.stored_ids,
        })
    }

    pub fn delete_message(
        &mut self,
        direction: Direction,
        id: StorageId,
    ) -> Result<DeleteReport, EngineError> {
        let message = self
            .message(direction, id)
            .cloned()
            .ok_or(EngineError::MessageNotFound(id))?;
        let report = deletion::delete_message(&mut self.transport, &self.scope, &message)?;
        self.rebuild_after("delete");
        Ok(report)
    }

    pub fn delete_conversation(&mut self, contact: &str) -> Result<Vec<DeleteReport>, EngineError> {
        let target = self
            .conversation(contact)
            .cloned()
            .ok_or_else(|| EngineError::ConversationNotFound(contact.to_string()))?;
        let reports = deletion::delete_conversation(&mut self.transport, &self.scope, &target)?;
        self.rebuild_after("delete conversation");
        Ok(reports)
    }

    /// Mark received messages read. Any part id stands for its whole
    /// message, so a multi-part message is never left partially marked.
    pub fn mark_read(&mut self, ids: &[StorageId]) -> Result<MarkReadOutcome, EngineError> {
        let mut batch = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.message(Direction::Received, id) {
                Some(message) => batch.extend(message.part_ids.iter().copied()),
                None => batch.push(id),
            }
        }
        let outcome = self.tracker.mark_read(&mut self.transport, &self.scope, &batch)?;
        if let MarkReadOutcome::Marked(_) = outcome {
            self.rebuild_after("mark read");
        }
        Ok(outcome)
    }

    pub fn set_timezone_correction(
        &mut self,
        correction: TimezoneCorrection,
    ) -> Result<RefreshOutcome, EngineError> {
        let mut settings = self.transport.load_settings(&self.scope)?;
        settings.timezone = correction;
        self.transport.save_settings(&self.scope, &settings)?;
        info!(
            scope = %self.scope,
            received = correction.received,
            sent = correction.sent,
            "timezone correction updated"
        );
        self.refresh()
    }

    pub fn update_settings(&mut self, settings: ModemSettings) -> Result<RefreshOutcome, EngineError> {
        self.transport.save_settings(&self.scope, &settings)?;
        self.refresh()
    }
}
