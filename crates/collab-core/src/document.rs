//! Document records and partial updates as stored remotely.

use crate::content::ContentTree;
use crate::ids::DocumentId;
use serde::{Deserialize, Serialize};

/// A document row as read from the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    /// Short display string, independently updatable from the body.
    pub title: String,
    /// The rich-text body; replaced atomically as a whole value.
    pub content: ContentTree,
    /// Last accepted content write, in milliseconds since the Unix
    /// epoch. Non-decreasing as observed by any single client, but not
    /// globally monotonic across clients racing on the store.
    pub updated_at: f64,
}

/// A partial document update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub content: Option<ContentTree>,
    pub title: Option<String>,
    pub updated_at: Option<f64>,
}

impl DocumentPatch {
    /// A content write with its timestamp.
    pub fn content(content: ContentTree, updated_at: f64) -> Self {
        Self {
            content: Some(content),
            title: None,
            updated_at: Some(updated_at),
        }
    }

    /// A title-only write. Does not touch the content timestamp,
    /// matching how title edits are pushed out-of-band.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            content: None,
            title: Some(title.into()),
            updated_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.title.is_none() && self.updated_at.is_none()
    }
}
