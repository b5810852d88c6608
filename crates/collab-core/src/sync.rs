//! The poll-driven reconciliation loop for one open document.
//!
//! Every tick either uploads local edits or downloads remote ones,
//! decided by a single pure transition function gated on editor focus:
//!
//! 1. Focused and content changed since the last sync: write the whole
//!    body to the store (upload). Never runs unfocused, so stale state
//!    collected while idle is never pushed.
//! 2. Unfocused: read the remote body and, if it differs from both the
//!    local content and the last synced form, replace the local content
//!    wholesale (download). Never runs focused, so the user's
//!    in-progress edits are never clobbered.
//!
//! Conflicts resolve at whole-document granularity by recency: two
//! focused writers overwrite each other's unseen changes, no merge is
//! attempted. A failed store call changes nothing locally and the next
//! tick simply tries again. Title edits bypass the tick entirely and
//! are pushed on blur.

use crate::document::{DocumentPatch, DocumentRecord};
use crate::editor::EditorSurface;
use crate::ids::DocumentId;
use crate::store::{RemoteStore, StoreError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Tunable timing for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed period between ticks.
    pub tick_interval: Duration,
    /// How long Saved/Synchronized linger before reverting to Idle.
    pub status_revert: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            status_revert: Duration::from_secs(1),
        }
    }
}

/// Direction a tick takes, decided before any store round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing to do: focused with no unsynced changes.
    Idle,
    /// Focused with local changes: push to the store.
    Uploading,
    /// Unfocused: poll the store for remote changes.
    Downloading,
}

/// Decide the direction of a tick.
///
/// Pure so the focus-gating invariant is testable on its own: uploads
/// require focus and a content change, downloads require the absence
/// of focus.
pub fn next_phase(current_serialized: &str, last_synced: &str, focused: bool) -> SyncPhase {
    if focused {
        if current_serialized != last_synced {
            SyncPhase::Uploading
        } else {
            SyncPhase::Idle
        }
    } else {
        SyncPhase::Downloading
    }
}

/// What a completed tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No remote write and no local replacement.
    Unchanged,
    /// Local content was written to the store.
    Uploaded,
    /// Remote content replaced the local content.
    Downloaded,
}

/// Client-visible sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    /// Online, nothing in flight.
    Idle,
    /// Upload in progress.
    Saving,
    /// Upload completed; reverts to Idle shortly.
    Saved,
    /// Remote content applied; reverts to Idle shortly.
    Synchronized,
}

/// Status with automatic reversion to Idle after a fixed delay.
#[derive(Debug)]
pub struct StatusIndicator {
    current: SyncStatus,
    revert_at: Option<f64>,
    revert_after_ms: f64,
}

impl StatusIndicator {
    pub fn new(revert_after: Duration) -> Self {
        Self {
            current: SyncStatus::Idle,
            revert_at: None,
            revert_after_ms: revert_after.as_secs_f64() * 1000.0,
        }
    }

    /// Enter a status that stays until explicitly changed (Saving).
    pub fn hold(&mut self, status: SyncStatus) {
        self.current = status;
        self.revert_at = None;
    }

    /// Enter a terminal status that reverts to Idle after the delay.
    pub fn flash(&mut self, status: SyncStatus, now: f64) {
        self.current = status;
        self.revert_at = Some(now + self.revert_after_ms);
    }

    /// Drop back to Idle immediately (e.g. after a failed write).
    pub fn reset(&mut self) {
        self.current = SyncStatus::Idle;
        self.revert_at = None;
    }

    /// Apply any due reversion and return the current status.
    pub fn poll(&mut self, now: f64) -> SyncStatus {
        if let Some(revert_at) = self.revert_at {
            if now >= revert_at {
                self.reset();
            }
        }
        self.current
    }

    pub fn current(&self) -> SyncStatus {
        self.current
    }
}

/// Reconciliation state for one open document on one client.
///
/// Created when the document is opened for editing, dropped when the
/// session ends. Never persisted.
pub struct DocumentSync<S> {
    store: S,
    document_id: DocumentId,
    /// Serialized content last known to match both the local editor
    /// and the remote store.
    last_synced: String,
    /// Timestamp of the last accepted content write we observed.
    last_modified: Option<f64>,
    status: StatusIndicator,
}

impl<S: RemoteStore> DocumentSync<S> {
    pub fn new(store: S, document_id: DocumentId, config: &SyncConfig) -> Self {
        Self {
            store,
            document_id,
            last_synced: String::new(),
            last_modified: None,
            status: StatusIndicator::new(config.status_revert),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Timestamp of the last accepted content write, if any.
    pub fn last_modified(&self) -> Option<f64> {
        self.last_modified
    }

    /// Apply any due status reversion and return the current status.
    pub fn poll_status(&mut self, now: f64) -> SyncStatus {
        self.status.poll(now)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    /// Initial load when the document is opened.
    ///
    /// Populates an empty editor with the stored body and primes the
    /// last-synced form so the first tick doesn't re-upload it.
    pub async fn load_initial<E: EditorSurface>(
        &mut self,
        editor: &mut E,
    ) -> Result<DocumentRecord> {
        let record = self.store.get_document(&self.document_id).await?;
        if editor.content().is_empty() {
            editor.set_content(record.content.clone());
        }
        self.last_synced = record.content.serialized();
        self.last_modified = Some(record.updated_at);
        Ok(record)
    }

    /// One timer-driven reconciliation step.
    ///
    /// The caller must await completion before re-arming the timer;
    /// ticks are never queued or overlapped.
    pub async fn tick<E: EditorSurface>(
        &mut self,
        editor: &mut E,
        now: f64,
    ) -> Result<TickOutcome> {
        self.status.poll(now);

        let current = editor.content().serialized();
        match next_phase(&current, &self.last_synced, editor.is_focused()) {
            SyncPhase::Idle => Ok(TickOutcome::Unchanged),
            SyncPhase::Uploading => self.upload(editor, current, now).await,
            SyncPhase::Downloading => self.download(editor, current, now).await,
        }
    }

    async fn upload<E: EditorSurface>(
        &mut self,
        editor: &mut E,
        current: String,
        now: f64,
    ) -> Result<TickOutcome> {
        self.status.hold(SyncStatus::Saving);

        let patch = DocumentPatch::content(editor.content().clone(), now);
        match self.store.put_document(&self.document_id, patch).await {
            Ok(()) => {
                debug!("Uploaded {} ({} bytes)", self.document_id, current.len());
                self.last_synced = current;
                self.last_modified = Some(now);
                self.status.flash(SyncStatus::Saved, now);
                Ok(TickOutcome::Uploaded)
            }
            Err(e) => {
                // Nothing was synced; the next tick retries.
                warn!("Upload failed for {}: {}", self.document_id, e);
                self.status.reset();
                Err(e.into())
            }
        }
    }

    async fn download<E: EditorSurface>(
        &mut self,
        editor: &mut E,
        current: String,
        now: f64,
    ) -> Result<TickOutcome> {
        let record = match self.store.get_document(&self.document_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Poll failed for {}: {}", self.document_id, e);
                return Err(e.into());
            }
        };

        let remote = record.content.serialized();
        // A genuine remote change differs from the editor AND from the
        // last synced form; anything else is already reflected locally.
        if remote == current || remote == self.last_synced {
            return Ok(TickOutcome::Unchanged);
        }

        let selection = editor.selection();
        editor.set_content(record.content);
        // Restore the cursor by character offset, clamped to the new
        // length. Offsets may land elsewhere if the remote edit touched
        // earlier text; accepted approximation.
        editor.set_selection(selection.clamp(editor.content().char_count()));

        debug!("Applied remote content for {}", self.document_id);
        self.last_synced = remote;
        self.last_modified = Some(record.updated_at);
        self.status.flash(SyncStatus::Synchronized, now);
        Ok(TickOutcome::Downloaded)
    }

    /// Push a title edit immediately, outside the tick cadence.
    ///
    /// Titles are not reconciled against concurrent remote title
    /// changes; the later write wins at the store.
    pub async fn push_title(&mut self, title: &str) -> Result<()> {
        self.store
            .put_document(&self.document_id, DocumentPatch::title(title))
            .await?;
        debug!("Pushed title for {}", self.document_id);
        Ok(())
    }

    /// Manual save: upload the current content regardless of focus.
    pub async fn save_now<E: EditorSurface>(&mut self, editor: &mut E, now: f64) -> Result<()> {
        let current = editor.content().serialized();
        let patch = DocumentPatch::content(editor.content().clone(), now);
        self.store.put_document(&self.document_id, patch).await?;
        self.last_synced = current;
        self.last_modified = Some(now);
        self.status.flash(SyncStatus::Saved, now);
        Ok(())
    }
}
