//! collab-core: Client-side synchronization engine for shared
//! rich-text documents.
//!
//! This crate provides the core functionality for:
//! - Poll-driven reconciliation of a local editable document with a
//!   shared remote copy (whole-document, last-writer-wins, focus-gated)
//! - A presence roster rebuilt from ephemeral heartbeat snapshots
//! - An append-only, document-scoped chat stream
//! - The `RemoteStore` and `EditorSurface` trait seams to the store
//!   and the editing surface

pub mod chat;
pub mod colors;
pub mod content;
pub mod document;
pub mod editor;
pub mod events;
pub mod ids;
pub mod memory;
pub mod presence;
pub mod store;
pub mod sync;
pub mod time;

pub use chat::{ChatLog, Message, MessageDraft};
pub use content::ContentTree;
pub use document::{DocumentPatch, DocumentRecord};
pub use editor::{BufferEditor, EditorSurface, Selection};
pub use events::{EventBus, SessionEvent, Subscription};
pub use ids::{DocumentId, MessageId};
pub use memory::InMemoryStore;
pub use presence::{Announcement, Collaborator, PresenceRoster, PresenceSnapshot};
pub use store::{PresenceChannel, RemoteStore, StoreError};
pub use sync::{DocumentSync, SyncConfig, SyncStatus, TickOutcome};
