//! Presence roster built from ephemeral heartbeat broadcasts.
//!
//! Each client announces its identity on a document-scoped channel;
//! the channel layer delivers a full-membership snapshot on every
//! membership change. The roster is rebuilt wholesale from each
//! snapshot rather than patched incrementally, matching the channel's
//! full-state semantics: there is no leave message, departure is the
//! subscriber simply missing from the next snapshot.

use crate::colors::identity_color;
use crate::ids::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The per-document channel key presence traffic is scoped to.
pub fn presence_channel_key(document_id: &DocumentId) -> String {
    format!("presence-{}", document_id)
}

/// A single self-announcement broadcast by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// The announcing user's stable identifier (account email).
    pub identity: String,
    /// When the announcement was made, in ms since the Unix epoch.
    pub announced_at: f64,
}

/// Full channel membership: subscriber key to announced payloads.
///
/// Subscriber keys are connection-scoped and opaque; the same identity
/// connected twice appears under two keys.
#[derive(Debug, Clone, Default)]
pub struct PresenceSnapshot {
    pub entries: HashMap<String, Vec<Announcement>>,
}

impl PresenceSnapshot {
    /// All announcements across all subscribers, in no particular order.
    pub fn flatten(&self) -> impl Iterator<Item = &Announcement> {
        self.entries.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A collaborator currently viewing the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub identity: String,
    /// Timestamp of the most recent heartbeat seen for this identity.
    pub announced_at: f64,
    /// Deterministic display color derived from the identity.
    pub color: String,
}

/// The live set of collaborators, replaced on every snapshot.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    collaborators: Vec<Collaborator>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire roster with the snapshot's contents.
    ///
    /// Duplicate announcements for one identity collapse to the most
    /// recent heartbeat. An empty snapshot empties the roster. The
    /// result is sorted by identity for a stable display order.
    pub fn apply_snapshot(&mut self, snapshot: &PresenceSnapshot) {
        let mut latest: HashMap<&str, f64> = HashMap::new();
        for announcement in snapshot.flatten() {
            let entry = latest
                .entry(announcement.identity.as_str())
                .or_insert(announcement.announced_at);
            if announcement.announced_at > *entry {
                *entry = announcement.announced_at;
            }
        }

        let mut collaborators: Vec<Collaborator> = latest
            .into_iter()
            .map(|(identity, announced_at)| Collaborator {
                identity: identity.to_string(),
                announced_at,
                color: identity_color(identity),
            })
            .collect();
        collaborators.sort_by(|a, b| a.identity.cmp(&b.identity));

        self.collaborators = collaborators;
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.collaborators.iter().any(|c| c.identity == identity)
    }

    pub fn len(&self) -> usize {
        self.collaborators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collaborators.is_empty()
    }
}
