//! Append-only chat history scoped to one document.
//!
//! The log is seeded by a full fetch ordered by creation time, then
//! extended by insert notifications. Delivery from the store is
//! at-least-once, so arrivals are de-duplicated by message id; within
//! that, order of arrival is preserved and nothing is ever reordered.
//! A sent message is not shown locally until its insert notification
//! round-trips back (no local echo).

use crate::colors::identity_color;
use crate::ids::{DocumentId, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A chat message as stored. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub document_id: DocumentId,
    /// The author's stable identifier (account email).
    pub author: String,
    pub body: String,
    /// Display color, derived from the author identity at send time.
    pub color: String,
    /// Creation time in ms since the Unix epoch; the store breaks ties
    /// by insertion order.
    pub created_at: f64,
}

/// What a sender submits; the store assigns id and creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub document_id: DocumentId,
    pub author: String,
    pub body: String,
    pub color: String,
}

impl MessageDraft {
    pub fn new(document_id: DocumentId, author: &str, body: &str) -> Self {
        Self {
            document_id,
            author: author.to_string(),
            body: body.to_string(),
            color: identity_color(author),
        }
    }
}

/// Ordered, append-only view of one document's chat.
#[derive(Debug)]
pub struct ChatLog {
    document_id: DocumentId,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl ChatLog {
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Seed the log from the initial fetch (ascending `created_at`).
    pub fn seed(&mut self, messages: Vec<Message>) {
        self.seen = messages.iter().map(|m| m.id).collect();
        self.messages = messages;
    }

    /// Append a message delivered by an insert notification.
    ///
    /// Returns false if the message was already present (duplicate
    /// delivery) or belongs to a different document.
    pub fn apply_insert(&mut self, message: Message) -> bool {
        if message.document_id != self.document_id {
            debug!(
                "Ignoring insert for foreign document {}",
                message.document_id
            );
            return false;
        }
        if !self.seen.insert(message.id) {
            debug!("Ignoring duplicate delivery of message {}", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(doc: DocumentId, body: &str, created_at: f64) -> Message {
        Message {
            id: MessageId::generate(),
            document_id: doc,
            author: "a@x.com".into(),
            body: body.into(),
            color: identity_color("a@x.com"),
            created_at,
        }
    }

    #[test]
    fn test_seed_then_append_preserves_order() {
        let doc = DocumentId::generate();
        let mut log = ChatLog::new(doc);

        log.seed(vec![message(doc, "m1", 1.0), message(doc, "m2", 2.0)]);
        assert!(log.apply_insert(message(doc, "m3", 3.0)));

        let bodies: Vec<&str> = log.messages().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_duplicate_delivery_is_dropped() {
        let doc = DocumentId::generate();
        let mut log = ChatLog::new(doc);

        let msg = message(doc, "once", 1.0);
        assert!(log.apply_insert(msg.clone()));
        assert!(!log.apply_insert(msg));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_seeded_message_redelivered_is_dropped() {
        let doc = DocumentId::generate();
        let mut log = ChatLog::new(doc);

        let msg = message(doc, "fetched", 1.0);
        log.seed(vec![msg.clone()]);
        assert!(!log.apply_insert(msg));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_foreign_document_insert_is_ignored() {
        let doc = DocumentId::generate();
        let other = DocumentId::generate();
        let mut log = ChatLog::new(doc);

        assert!(!log.apply_insert(message(other, "stray", 1.0)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_draft_derives_color_from_author() {
        let draft = MessageDraft::new(DocumentId::generate(), "bob@x.com", "hi");
        assert_eq!(draft.color, identity_color("bob@x.com"));
    }
}
