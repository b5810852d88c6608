//! A live editing session for one open document.
//!
//! `DocumentSession::open` spawns three independent tasks sharing no
//! locks with each other:
//! - sync: the timer-driven reconciliation tick, plus out-of-band
//!   commands (title push, manual save, chat send)
//! - presence: announce ourselves, rebuild the roster from snapshots
//! - chat: seed the log from the initial fetch, append live inserts
//!
//! Closing the session flips a watch flag; each task observes it
//! between awaits, so an in-flight store call completes and its result
//! is discarded, the presence channel is left, and the timer stops.
//! Ticks are never queued: the interval uses `MissedTickBehavior::Delay`
//! and each tick is awaited to completion before the timer re-arms.

use anyhow::Result;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use collab_core::chat::{ChatLog, Message, MessageDraft};
use collab_core::editor::EditorSurface;
use collab_core::events::{EventBus, SessionEvent, Subscription};
use collab_core::ids::DocumentId;
use collab_core::presence::{
    Announcement, Collaborator, PresenceRoster, presence_channel_key,
};
use collab_core::store::RemoteStore;
use collab_core::sync::{DocumentSync, SyncConfig, SyncStatus, TickOutcome};
use collab_core::time::now_ms;

/// Out-of-band requests serviced by the sync task between ticks.
enum SessionCommand {
    PushTitle(String),
    SaveNow,
    SendChat(String),
}

/// State the session exposes to its embedder.
struct SharedView {
    status: SyncStatus,
    last_modified: Option<f64>,
}

/// A live editing session for one open document.
pub struct DocumentSession<E: EditorSurface> {
    identity: String,
    document_id: DocumentId,
    editor: Arc<Mutex<E>>,
    events: Arc<EventBus>,
    roster: Arc<RwLock<PresenceRoster>>,
    chat: Arc<StdMutex<ChatLog>>,
    view: Arc<RwLock<SharedView>>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<E: EditorSurface + Send + 'static> DocumentSession<E> {
    /// Open a document for collaborative editing.
    ///
    /// Performs the initial content load, then starts the sync,
    /// presence, and chat loops.
    pub async fn open<S>(
        store: S,
        editor: E,
        identity: &str,
        document_id: DocumentId,
        config: SyncConfig,
    ) -> Result<Self>
    where
        S: RemoteStore + Clone + 'static,
    {
        let editor = Arc::new(Mutex::new(editor));
        let events = Arc::new(EventBus::new());
        let roster = Arc::new(RwLock::new(PresenceRoster::new()));
        let chat = Arc::new(StdMutex::new(ChatLog::new(document_id)));
        let view = Arc::new(RwLock::new(SharedView {
            status: SyncStatus::Idle,
            last_modified: None,
        }));

        let mut sync = DocumentSync::new(store.clone(), document_id, &config);
        {
            let mut guard = editor.lock().await;
            let record = sync.load_initial(&mut *guard).await?;
            view.write().unwrap().last_modified = Some(record.updated_at);
            debug!("Opened {} (\"{}\")", document_id, record.title);
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(run_sync(
                sync,
                store.clone(),
                Arc::clone(&editor),
                Arc::clone(&view),
                Arc::clone(&events),
                identity.to_string(),
                config.clone(),
                cmd_rx,
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_presence(
                store.clone(),
                document_id,
                identity.to_string(),
                Arc::clone(&roster),
                Arc::clone(&events),
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_chat(
                store,
                document_id,
                Arc::clone(&chat),
                Arc::clone(&events),
                shutdown_rx,
            )),
        ];

        Ok(Self {
            identity: identity.to_string(),
            document_id,
            editor,
            events,
            roster,
            chat,
            view,
            cmd_tx,
            shutdown_tx,
            tasks,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Handle to the editing surface. The user's input handling and
    /// the sync loop's download path are the only writers.
    pub fn editor(&self) -> Arc<Mutex<E>> {
        Arc::clone(&self.editor)
    }

    /// Current client-visible sync status.
    pub fn status(&self) -> SyncStatus {
        self.view.read().unwrap().status
    }

    /// Timestamp of the last accepted content write we observed.
    pub fn last_modified(&self) -> Option<f64> {
        self.view.read().unwrap().last_modified
    }

    /// Current collaborator roster (self included once announced).
    pub fn roster(&self) -> Vec<Collaborator> {
        self.roster.read().unwrap().collaborators().to_vec()
    }

    /// Chat history in display order.
    pub fn messages(&self) -> Vec<Message> {
        self.chat.lock().unwrap().messages().to_vec()
    }

    /// Subscribe to session events; dropping the handle unsubscribes.
    pub fn subscribe(
        &self,
        callback: impl Fn(SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.subscribe(callback)
    }

    /// Send a chat message. The local list is not updated here: the
    /// message appears once its insert notification round-trips back.
    pub fn send_chat(&self, body: &str) {
        self.command(SessionCommand::SendChat(body.to_string()));
    }

    /// Push a title edit immediately (on blur of the title input).
    pub fn push_title(&self, title: &str) {
        self.command(SessionCommand::PushTitle(title.to_string()));
    }

    /// Request an immediate upload regardless of focus.
    pub fn save_now(&self) {
        self.command(SessionCommand::SaveNow);
    }

    fn command(&self, cmd: SessionCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("Session for {} already closed", self.document_id);
        }
    }

    /// End the editing session: stop the timer, leave the presence
    /// channel, drop the subscriptions. In-flight store calls complete
    /// and their results are discarded.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Session task panicked: {}", e);
            }
        }
        debug!("Closed session for {}", self.document_id);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_sync<S, E>(
    mut sync: DocumentSync<S>,
    store: S,
    editor: Arc<Mutex<E>>,
    view: Arc<RwLock<SharedView>>,
    events: Arc<EventBus>,
    identity: String,
    config: SyncConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: RemoteStore + Clone + 'static,
    E: EditorSurface + Send + 'static,
{
    let document_id = sync.document_id();
    let mut interval = tokio::time::interval(config.tick_interval);
    // A tick still running when the timer fires is waited out, never
    // queued behind it.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::PushTitle(title)) => {
                    if let Err(e) = sync.push_title(&title).await {
                        warn!("Title push failed for {}: {}", document_id, e);
                    }
                }
                Some(SessionCommand::SaveNow) => {
                    let now = now_ms();
                    let mut guard = editor.lock().await;
                    if let Err(e) = sync.save_now(&mut *guard, now).await {
                        warn!("Manual save failed for {}: {}", document_id, e);
                    }
                    drop(guard);
                    publish_status(&mut sync, &view, &events, now);
                }
                Some(SessionCommand::SendChat(body)) => {
                    let draft = MessageDraft::new(document_id, &identity, &body);
                    if let Err(e) = store.append_message(draft).await {
                        warn!("Chat send failed for {}: {}", document_id, e);
                    }
                }
                None => break,
            },

            _ = interval.tick() => {
                let now = now_ms();
                let outcome = {
                    let mut guard = editor.lock().await;
                    sync.tick(&mut *guard, now).await
                };
                match outcome {
                    Ok(TickOutcome::Downloaded) => {
                        events.emit(SessionEvent::RemoteApplied {
                            document_id: document_id.to_string(),
                            updated_at: sync.last_modified().unwrap_or(now),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Transient; the next tick retries.
                        warn!("Sync tick failed for {}: {}", document_id, e);
                    }
                }
                publish_status(&mut sync, &view, &events, now);
            }
        }
    }
}

/// Mirror the engine's status into the shared view, emitting an event
/// on transitions.
fn publish_status<S: RemoteStore>(
    sync: &mut DocumentSync<S>,
    view: &Arc<RwLock<SharedView>>,
    events: &Arc<EventBus>,
    now: f64,
) {
    let status = sync.poll_status(now);
    let mut guard = view.write().unwrap();
    let changed = guard.status != status;
    guard.status = status;
    guard.last_modified = sync.last_modified();
    drop(guard);

    if changed {
        events.emit(SessionEvent::StatusChanged {
            status,
            timestamp: now,
        });
    }
}

async fn run_presence<S>(
    store: S,
    document_id: DocumentId,
    identity: String,
    roster: Arc<RwLock<PresenceRoster>>,
    events: Arc<EventBus>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: RemoteStore + 'static,
{
    let channel_key = presence_channel_key(&document_id);
    let mut channel = match store.join_presence(&channel_key).await {
        Ok(channel) => channel,
        Err(e) => {
            error!("Presence join failed for {}: {}", channel_key, e);
            return;
        }
    };

    if let Err(e) = channel
        .announce(Announcement {
            identity,
            announced_at: now_ms(),
        })
        .await
    {
        warn!("Presence announce failed for {}: {}", channel_key, e);
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            snapshot = channel.next_snapshot() => match snapshot {
                Some(snapshot) => {
                    let count = {
                        let mut guard = roster.write().unwrap();
                        guard.apply_snapshot(&snapshot);
                        guard.len()
                    };
                    events.emit(SessionEvent::RosterChanged {
                        count,
                        timestamp: now_ms(),
                    });
                }
                None => {
                    debug!("Presence channel {} ended", channel_key);
                    break;
                }
            }
        }
    }

    channel.leave().await;
}

async fn run_chat<S>(
    store: S,
    document_id: DocumentId,
    chat: Arc<StdMutex<ChatLog>>,
    events: Arc<EventBus>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: RemoteStore + 'static,
{
    use futures::StreamExt;

    // Seed from the full history, then go live. A message inserted
    // between the fetch and the subscription is covered by the store's
    // at-least-once delivery plus the log's id de-duplication.
    match store.list_messages(&document_id).await {
        Ok(seed) => chat.lock().unwrap().seed(seed),
        Err(e) => warn!("Initial chat fetch failed for {}: {}", document_id, e),
    }

    let mut feed = match store.subscribe_inserts(&document_id).await {
        Ok(feed) => feed,
        Err(e) => {
            error!("Insert subscription failed for {}: {}", document_id, e);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            message = feed.next() => match message {
                Some(message) => {
                    let applied = chat.lock().unwrap().apply_insert(message.clone());
                    if applied {
                        events.emit(SessionEvent::MessageArrived {
                            message_id: message.id.to_string(),
                            author: message.author,
                            timestamp: now_ms(),
                        });
                    }
                }
                None => {
                    debug!("Insert feed for {} ended", document_id);
                    break;
                }
            }
        }
    }
}
