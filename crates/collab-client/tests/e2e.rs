//! End-to-end tests: two live sessions against one shared store.
//!
//! Exercises the full session behavior: focus-gated reconciliation,
//! last-writer-wins on the store, presence roster churn, and chat
//! delivery without local echo.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use collab_client::DocumentSession;
use collab_core::EditorSurface;
use collab_core::chat::MessageDraft;
use collab_core::editor::BufferEditor;
use collab_core::events::SessionEvent;
use collab_core::ids::DocumentId;
use collab_core::memory::InMemoryStore;
use collab_core::store::RemoteStore;
use collab_core::sync::SyncConfig;
use tokio::time::sleep;

/// Short intervals so tests settle quickly.
fn test_config() -> SyncConfig {
    SyncConfig {
        tick_interval: Duration::from_millis(25),
        status_revert: Duration::from_millis(50),
    }
}

async fn open_session(
    store: &InMemoryStore,
    identity: &str,
    document_id: DocumentId,
) -> DocumentSession<BufferEditor> {
    DocumentSession::open(
        store.clone(),
        BufferEditor::new(),
        identity,
        document_id,
        test_config(),
    )
    .await
    .expect("session should open")
}

/// Give the tick loops a few rounds to settle.
async fn settle() {
    sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_focused_edit_reaches_unfocused_peer() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Notes");

    let alice = open_session(&store, "alice@example.com", document_id).await;
    let bob = open_session(&store, "bob@example.com", document_id).await;

    {
        let editor = alice.editor();
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("hello from alice");
    }
    settle().await;

    // Bob never focused, so the remote content replaced his copy.
    {
        let editor = bob.editor();
        let guard = editor.lock().await;
        assert_eq!(guard.content().plain_text(), "hello from alice");
    }

    let record = store.get_document(&document_id).await.unwrap();
    assert_eq!(record.content.plain_text(), "hello from alice");

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_sequential_writers_converge_on_later_write() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Contested");

    let alice = open_session(&store, "alice@example.com", document_id).await;
    let bob = open_session(&store, "bob@example.com", document_id).await;

    // Alice writes first...
    {
        let editor = alice.editor();
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("alice's version");
    }
    settle().await;
    {
        let editor = alice.editor();
        editor.lock().await.set_focused(false);
    }

    // ...then Bob overwrites wholesale. No merge is attempted.
    {
        let editor = bob.editor();
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("bob's version");
    }
    settle().await;

    let record = store.get_document(&document_id).await.unwrap();
    assert_eq!(record.content.plain_text(), "bob's version");

    // Alice, now unfocused, converges on Bob's write.
    {
        let editor = alice.editor();
        let guard = editor.lock().await;
        assert_eq!(guard.content().plain_text(), "bob's version");
    }

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_roster_tracks_arrivals_and_departures() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Room");

    let alice = open_session(&store, "alice@example.com", document_id).await;
    let bob = open_session(&store, "bob@example.com", document_id).await;
    settle().await;

    let identities: Vec<String> = alice.roster().iter().map(|c| c.identity.clone()).collect();
    assert_eq!(identities, vec!["alice@example.com", "bob@example.com"]);

    // Closing Bob's session leaves the channel; Alice's next snapshot
    // no longer includes him.
    bob.close().await;
    settle().await;

    let identities: Vec<String> = alice.roster().iter().map(|c| c.identity.clone()).collect();
    assert_eq!(identities, vec!["alice@example.com"]);

    alice.close().await;
}

#[tokio::test]
async fn test_chat_seeds_history_and_delivers_live() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Chatty");

    // History exists before anyone opens the document.
    store
        .append_message(MessageDraft::new(
            document_id,
            "carol@example.com",
            "earlier message",
        ))
        .await
        .unwrap();

    let alice = open_session(&store, "alice@example.com", document_id).await;
    let bob = open_session(&store, "bob@example.com", document_id).await;
    settle().await;

    alice.send_chat("hi bob");
    settle().await;

    for session in [&alice, &bob] {
        let bodies: Vec<String> = session
            .messages()
            .iter()
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(bodies, vec!["earlier message", "hi bob"]);
    }

    // The sender's copy arrived through the insert notification, so
    // both sessions hold the same store-assigned message id.
    assert_eq!(alice.messages()[1].id, bob.messages()[1].id);
    assert_eq!(alice.messages()[1].author, "alice@example.com");

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_title_push_is_immediate() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Old title");

    let alice = open_session(&store, "alice@example.com", document_id).await;
    alice.push_title("New title");
    settle().await;

    let record = store.get_document(&document_id).await.unwrap();
    assert_eq!(record.title, "New title");

    alice.close().await;
}

#[tokio::test]
async fn test_subscribers_observe_session_events() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Watched");

    let bob = open_session(&store, "bob@example.com", document_id).await;

    let downloads = Arc::new(AtomicUsize::new(0));
    let arrivals = Arc::new(AtomicUsize::new(0));
    let roster_changes = Arc::new(AtomicUsize::new(0));
    let status_changes = Arc::new(AtomicUsize::new(0));

    let sub = {
        let downloads = Arc::clone(&downloads);
        let arrivals = Arc::clone(&arrivals);
        let roster_changes = Arc::clone(&roster_changes);
        let status_changes = Arc::clone(&status_changes);
        bob.subscribe(move |event| {
            match event {
                SessionEvent::RemoteApplied { .. } => downloads.fetch_add(1, Ordering::Relaxed),
                SessionEvent::MessageArrived { .. } => arrivals.fetch_add(1, Ordering::Relaxed),
                SessionEvent::RosterChanged { .. } => {
                    roster_changes.fetch_add(1, Ordering::Relaxed)
                }
                SessionEvent::StatusChanged { .. } => {
                    status_changes.fetch_add(1, Ordering::Relaxed)
                }
            };
        })
    };

    // Alice opens after the subscription, so her join, upload, and
    // chat message are all observed on Bob's side.
    let alice = open_session(&store, "alice@example.com", document_id).await;
    {
        let editor = alice.editor();
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("watch this arrive");
    }
    alice.send_chat("ping");
    settle().await;

    assert!(downloads.load(Ordering::Relaxed) >= 1);
    assert_eq!(arrivals.load(Ordering::Relaxed), 1);
    assert!(roster_changes.load(Ordering::Relaxed) >= 1);
    // The download flashed Synchronized, which is a status transition.
    assert!(status_changes.load(Ordering::Relaxed) >= 1);

    // Dropping the handle unsubscribes: later messages are no longer
    // counted.
    drop(sub);
    let counted = arrivals.load(Ordering::Relaxed);
    alice.send_chat("unheard");
    settle().await;
    assert_eq!(arrivals.load(Ordering::Relaxed), counted);

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_closed_session_stops_writing() {
    let store = InMemoryStore::new();
    let document_id = store.create_document("Quiet");

    let alice = open_session(&store, "alice@example.com", document_id).await;
    let editor = alice.editor();
    {
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("final words");
    }
    settle().await;
    alice.close().await;

    // Edits made after the session closed never reach the store: the
    // timer is stopped, not merely idle.
    editor.lock().await.replace_text("never uploaded");
    let before = store.get_document(&document_id).await.unwrap().updated_at;
    sleep(Duration::from_millis(200)).await;
    let record = store.get_document(&document_id).await.unwrap();
    assert_eq!(record.updated_at, before);
    assert_eq!(record.content.plain_text(), "final words");
}
