//! In-memory RemoteStore for tests and the demo binary.
//!
//! Models the hosted row-store faithfully enough for the engine:
//! whole-value document writes where the later write wins, an
//! append-only message table with insert fan-out, and presence rooms
//! that rebroadcast a full-membership snapshot to every subscriber on
//! join, announce, and leave. Cheap to clone; clones share state.

use crate::chat::{Message, MessageDraft};
use crate::content::ContentTree;
use crate::document::{DocumentPatch, DocumentRecord};
use crate::ids::{DocumentId, MessageId};
use crate::presence::{Announcement, PresenceSnapshot};
use crate::store::{InsertFeed, PresenceChannel, RemoteStore, Result, StoreError};
use crate::time::now_ms;
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Shared in-process store. Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: RwLock<HashMap<DocumentId, DocumentRecord>>,
    messages: RwLock<HashMap<DocumentId, Vec<Message>>>,
    insert_subs: RwLock<HashMap<DocumentId, Vec<UnboundedSender<Message>>>>,
    rooms: RwLock<HashMap<String, Room>>,
    next_member_ref: AtomicU64,
}

/// One presence channel's membership.
#[derive(Default)]
struct Room {
    members: HashMap<u64, Member>,
}

struct Member {
    sender: UnboundedSender<PresenceSnapshot>,
    payload: Option<Announcement>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document row with an empty body. Document CRUD is
    /// outside the sync engine's contract, so this is an inherent
    /// helper for seeding rather than part of `RemoteStore`.
    pub fn create_document(&self, title: &str) -> DocumentId {
        let id = DocumentId::generate();
        let record = DocumentRecord {
            id,
            title: title.to_string(),
            content: ContentTree::empty(),
            updated_at: now_ms(),
        };
        self.inner
            .documents
            .write()
            .unwrap()
            .insert(id, record);
        id
    }
}

impl Inner {
    /// Rebroadcast the room's full-state snapshot to every member.
    ///
    /// A member whose receiver is gone counts as departed; pruning it
    /// is itself a membership change, so the snapshot is rebuilt and
    /// resent until delivery succeeds for everyone remaining.
    fn broadcast_room(&self, channel_key: &str) {
        let mut rooms = self.rooms.write().unwrap();
        let Some(room) = rooms.get_mut(channel_key) else {
            return;
        };

        loop {
            let snapshot = room_snapshot(room);
            let mut departed: Vec<u64> = Vec::new();
            for (member_ref, member) in room.members.iter() {
                if member.sender.unbounded_send(snapshot.clone()).is_err() {
                    departed.push(*member_ref);
                }
            }
            if departed.is_empty() {
                break;
            }
            debug!(
                "Pruning {} departed member(s) from {}",
                departed.len(),
                channel_key
            );
            for member_ref in departed {
                room.members.remove(&member_ref);
            }
        }

        if room.members.is_empty() {
            rooms.remove(channel_key);
        }
    }
}

fn room_snapshot(room: &Room) -> PresenceSnapshot {
    let mut entries = HashMap::new();
    for (member_ref, member) in room.members.iter() {
        if let Some(payload) = &member.payload {
            entries.insert(format!("ref-{}", member_ref), vec![payload.clone()]);
        }
    }
    PresenceSnapshot { entries }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get_document(&self, id: &DocumentId) -> Result<DocumentRecord> {
        let documents = self.inner.documents.read().unwrap();
        documents
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    async fn put_document(&self, id: &DocumentId, patch: DocumentPatch) -> Result<()> {
        let mut documents = self.inner.documents.write().unwrap();
        let record = documents.get_mut(id).ok_or(StoreError::NotFound(*id))?;

        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(updated_at) = patch.updated_at {
            record.updated_at = updated_at;
        }
        Ok(())
    }

    async fn list_messages(&self, document_id: &DocumentId) -> Result<Vec<Message>> {
        let messages = self.inner.messages.read().unwrap();
        let mut rows = messages.get(document_id).cloned().unwrap_or_default();
        // Rows are stored in insertion order; a stable sort on
        // created_at preserves it for ties.
        rows.sort_by(|a, b| a.created_at.total_cmp(&b.created_at));
        Ok(rows)
    }

    async fn append_message(&self, draft: MessageDraft) -> Result<()> {
        let message = Message {
            id: MessageId::generate(),
            document_id: draft.document_id,
            author: draft.author,
            body: draft.body,
            color: draft.color,
            created_at: now_ms(),
        };

        self.inner
            .messages
            .write()
            .unwrap()
            .entry(message.document_id)
            .or_default()
            .push(message.clone());

        // Fan out to insert subscribers, dropping dead ones.
        let mut subs = self.inner.insert_subs.write().unwrap();
        if let Some(senders) = subs.get_mut(&message.document_id) {
            senders.retain(|sender| sender.unbounded_send(message.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe_inserts(&self, document_id: &DocumentId) -> Result<InsertFeed> {
        let (tx, rx) = mpsc::unbounded();
        self.inner
            .insert_subs
            .write()
            .unwrap()
            .entry(*document_id)
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn join_presence(&self, channel_key: &str) -> Result<Box<dyn PresenceChannel>> {
        let member_ref = self.inner.next_member_ref.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded();

        self.inner
            .rooms
            .write()
            .unwrap()
            .entry(channel_key.to_string())
            .or_default()
            .members
            .insert(
                member_ref,
                Member {
                    sender: tx,
                    payload: None,
                },
            );

        // Joining is a membership change: everyone (including the new
        // member) gets a fresh snapshot.
        self.inner.broadcast_room(channel_key);

        Ok(Box::new(MemoryPresenceChannel {
            inner: Arc::clone(&self.inner),
            channel_key: channel_key.to_string(),
            member_ref,
            receiver: rx,
            left: false,
        }))
    }
}

struct MemoryPresenceChannel {
    inner: Arc<Inner>,
    channel_key: String,
    member_ref: u64,
    receiver: UnboundedReceiver<PresenceSnapshot>,
    left: bool,
}

impl MemoryPresenceChannel {
    fn remove_membership(&self) {
        let mut rooms = self.inner.rooms.write().unwrap();
        if let Some(room) = rooms.get_mut(&self.channel_key) {
            room.members.remove(&self.member_ref);
        }
        drop(rooms);
        self.inner.broadcast_room(&self.channel_key);
    }
}

#[async_trait]
impl PresenceChannel for MemoryPresenceChannel {
    async fn announce(&mut self, payload: Announcement) -> Result<()> {
        if self.left {
            return Err(StoreError::ChannelClosed);
        }
        {
            let mut rooms = self.inner.rooms.write().unwrap();
            let member = rooms
                .get_mut(&self.channel_key)
                .and_then(|room| room.members.get_mut(&self.member_ref))
                .ok_or(StoreError::ChannelClosed)?;
            member.payload = Some(payload);
        }
        self.inner.broadcast_room(&self.channel_key);
        Ok(())
    }

    async fn next_snapshot(&mut self) -> Option<PresenceSnapshot> {
        if self.left {
            return None;
        }
        self.receiver.next().await
    }

    async fn leave(&mut self) {
        if !self.left {
            self.left = true;
            self.remove_membership();
        }
    }
}

impl Drop for MemoryPresenceChannel {
    fn drop(&mut self) {
        if !self.left {
            self.remove_membership();
        }
    }
}
