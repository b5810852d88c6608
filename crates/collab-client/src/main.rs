//! collab-client demo: two sessions reconciling one shared document.
//!
//! Runs a local editing session and a simulated collaborator against
//! the same in-memory store, showing the sync loop, presence roster,
//! and chat stream working together. Useful for eyeballing the engine
//! with `--verbose`.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use collab_client::DocumentSession;
use collab_core::EditorSurface;
use collab_core::editor::BufferEditor;
use collab_core::memory::InMemoryStore;
use collab_core::sync::SyncConfig;

#[derive(Parser, Debug)]
#[command(name = "collab-client")]
#[command(about = "Collaborative document sync demo")]
struct Args {
    /// Identity to edit as
    #[arg(short, long, default_value = "alice@example.com")]
    identity: String,

    /// Identity of the simulated collaborator
    #[arg(long, default_value = "bob@example.com")]
    peer: String,

    /// Title for the shared document
    #[arg(short, long, default_value = "Shared draft")]
    title: String,

    /// Sync tick interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info
    // (or debug with --verbose).
    let default_filter = if args.verbose {
        "debug,collab_client=debug,collab_core=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tick = Duration::from_millis(args.interval_ms);
    let config = SyncConfig {
        tick_interval: tick,
        ..Default::default()
    };

    let store = InMemoryStore::new();
    let document_id = store.create_document(&args.title);
    info!("Created document {} (\"{}\")", document_id, args.title);

    let ours = DocumentSession::open(
        store.clone(),
        BufferEditor::new(),
        &args.identity,
        document_id,
        config.clone(),
    )
    .await?;
    let theirs = DocumentSession::open(
        store.clone(),
        BufferEditor::new(),
        &args.peer,
        document_id,
        config,
    )
    .await?;

    // The collaborator grabs focus and types.
    {
        let editor = theirs.editor();
        let mut guard = editor.lock().await;
        guard.set_focused(true);
        guard.replace_text("Meeting notes\nDrafted while you watch.");
    }
    theirs.send_chat("started the draft, have a look");
    info!("{} is typing...", args.peer);

    sleep(tick * 2).await;

    // They stop editing; our unfocused session picks the content up.
    {
        let editor = theirs.editor();
        editor.lock().await.set_focused(false);
    }
    sleep(tick * 2).await;

    {
        let editor = ours.editor();
        let guard = editor.lock().await;
        info!("Local copy now reads:\n{}", guard.content().plain_text());
    }

    let names: Vec<String> = ours
        .roster()
        .iter()
        .map(|c| c.identity.clone())
        .collect();
    info!("Online: {}", names.join(", "));

    for message in ours.messages() {
        info!("[chat] {}: {}", message.author, message.body);
    }
    info!("Status: {:?}", ours.status());

    ours.close().await;
    theirs.close().await;
    Ok(())
}
