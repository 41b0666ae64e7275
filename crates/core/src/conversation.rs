use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::contact::{truncate_preview, ContactKey};
use crate::message::LogicalMessage;

pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub contact_key: ContactKey,
    /// Contact as the first message in the conversation spelled it.
    pub contact: String,
    /// Ascending by corrected timestamp.
    pub messages: Vec<LogicalMessage>,
    pub unread_count: usize,
}

impl Conversation {
    fn new(contact_key: ContactKey, contact: String) -> Self {
        Self {
            contact_key,
            contact,
            messages: Vec::new(),
            unread_count: 0,
        }
    }

    pub fn latest(&self) -> Option<&LogicalMessage> {
        self.messages.last()
    }

    pub fn latest_timestamp(&self) -> i64 {
        self.latest().map_or(i64::MIN, |m| m.timestamp)
    }

    pub fn preview(&self, max_chars: usize) -> String {
        self.latest()
            .map(|m| truncate_preview(&m.content, max_chars))
            .unwrap_or_default()
    }

    pub fn unread(&self) -> impl Iterator<Item = &LogicalMessage> {
        self.messages.iter().filter(|m| m.is_unread())
    }

    fn settle(&mut self) {
        self.messages.sort_by_key(|m| m.timestamp);
        self.unread_count = self.messages.iter().filter(|m| m.is_unread()).count();
    }
}

fn sort_conversations(list: &mut [Conversation]) {
    list.sort_by(|a, b| {
        b.latest_timestamp()
            .cmp(&a.latest_timestamp())
            .then_with(|| a.contact_key.cmp(&b.contact_key))
    });
}

/// Group messages by contact key. Messages keep their relative input order
/// on equal timestamps.
pub fn build(messages: &[LogicalMessage]) -> Vec<Conversation> {
    let mut list: Vec<Conversation> = Vec::new();
    let mut slots: HashMap<ContactKey, usize> = HashMap::new();

    for message in messages {
        let slot = *slots.entry(message.contact_key.clone()).or_insert_with(|| {
            list.push(Conversation::new(message.contact_key.clone(), message.contact.clone()));
            list.len() - 1
        });
        list[slot].messages.push(message.clone());
    }

    for conversation in &mut list {
        conversation.settle();
    }
    sort_conversations(&mut list);
    list
}

/// Insert or replace one message, returning a new list. A message replaces
/// an existing one of the same direction with the same id, a shared part id
/// or the same concatenation reference, so a multi-part message that gained
/// or lost parts supersedes its earlier form. Conversations other than the
/// message's own are carried over unchanged.
///
/// A replaced message keeps its place among equal timestamps; a new one goes
/// after them. Upserting a conversation's messages in storage order therefore
/// reproduces the order `build` gives.
pub fn upsert(list: &[Conversation], message: LogicalMessage) -> Vec<Conversation> {
    let mut next = list.to_vec();
    let slot = match next.iter().position(|c| c.contact_key == message.contact_key) {
        Some(slot) => slot,
        None => {
            next.push(Conversation::new(message.contact_key.clone(), message.contact.clone()));
            next.len() - 1
        }
    };

    let conversation = &mut next[slot];
    let existing = conversation.messages.iter().position(|m| {
        m.direction == message.direction
            && (m.id == message.id
                || m.shares_parts_with(&message)
                || (m.reference.is_some() && m.reference == message.reference))
    });
    match existing {
        Some(at) => conversation.messages[at] = message,
        None => conversation.messages.push(message),
    }
    conversation.settle();

    sort_conversations(&mut next);
    next
}

/// Look a conversation up by any spelling of its contact.
pub fn find<'a>(list: &'a [Conversation], contact: &str) -> Option<&'a Conversation> {
    let key = ContactKey::normalize(contact);
    list.iter().find(|c| c.contact_key == key)
}

pub fn total_unread(list: &[Conversation]) -> usize {
    list.iter().map(|c| c.unread_count).sum()
}
