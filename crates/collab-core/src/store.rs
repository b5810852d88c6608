//! RemoteStore trait: the seam to the shared durable store.
//!
//! The core consumes exactly this contract: document rows, an
//! append-only message table with insert notifications, and a
//! document-scoped ephemeral presence channel. Implementations:
//! - `InMemoryStore` - in-process reference implementation for tests
//!   and the demo binary
//! - a hosted row-store adapter in the embedding application

use crate::chat::{Message, MessageDraft};
use crate::document::{DocumentPatch, DocumentRecord};
use crate::ids::DocumentId;
use crate::presence::{Announcement, PresenceSnapshot};
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Stream of rows inserted into the message table, filtered to one
/// document. At-least-once delivery, best-effort commit order.
pub type InsertFeed = UnboundedReceiver<Message>;

/// A joined presence channel.
///
/// Announcing publishes our payload to every subscriber; the channel
/// layer responds to any membership or payload change by delivering a
/// fresh full-state snapshot to everyone. Leaving (explicitly or by
/// dropping the channel) removes us from subsequent snapshots.
#[async_trait]
pub trait PresenceChannel: Send {
    /// Broadcast our presence payload to the channel.
    async fn announce(&mut self, payload: Announcement) -> Result<()>;

    /// Wait for the next full-membership snapshot. `None` once the
    /// channel is gone.
    async fn next_snapshot(&mut self) -> Option<PresenceSnapshot>;

    /// Leave the channel, removing us from future snapshots.
    async fn leave(&mut self);
}

/// Schema-level operations on the shared remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a document row.
    async fn get_document(&self, id: &DocumentId) -> Result<DocumentRecord>;

    /// Apply a partial update to a document row. Whole-value writes;
    /// the store resolves racing writers by accepting the later write.
    async fn put_document(&self, id: &DocumentId, patch: DocumentPatch) -> Result<()>;

    /// All messages for a document, ascending `created_at`, ties
    /// broken by insertion order.
    async fn list_messages(&self, document_id: &DocumentId) -> Result<Vec<Message>>;

    /// Append a message; the store assigns id and creation time.
    async fn append_message(&self, draft: MessageDraft) -> Result<()>;

    /// Subscribe to message inserts scoped to one document.
    async fn subscribe_inserts(&self, document_id: &DocumentId) -> Result<InsertFeed>;

    /// Join the ephemeral presence channel for the given key.
    async fn join_presence(&self, channel_key: &str) -> Result<Box<dyn PresenceChannel>>;
}

// Implement RemoteStore for Arc<T> where T: RemoteStore.
// This allows sharing one store between multiple sessions in tests.
#[async_trait]
impl<T: RemoteStore> RemoteStore for std::sync::Arc<T> {
    async fn get_document(&self, id: &DocumentId) -> Result<DocumentRecord> {
        (**self).get_document(id).await
    }

    async fn put_document(&self, id: &DocumentId, patch: DocumentPatch) -> Result<()> {
        (**self).put_document(id, patch).await
    }

    async fn list_messages(&self, document_id: &DocumentId) -> Result<Vec<Message>> {
        (**self).list_messages(document_id).await
    }

    async fn append_message(&self, draft: MessageDraft) -> Result<()> {
        (**self).append_message(draft).await
    }

    async fn subscribe_inserts(&self, document_id: &DocumentId) -> Result<InsertFeed> {
        (**self).subscribe_inserts(document_id).await
    }

    async fn join_presence(&self, channel_key: &str) -> Result<Box<dyn PresenceChannel>> {
        (**self).join_presence(channel_key).await
    }
}
