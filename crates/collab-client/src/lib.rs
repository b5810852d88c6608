//! collab-client: Tokio runtime layer for collab-core.
//!
//! Drives the three per-document loops (sync tick, presence, chat) as
//! cooperative tasks over any `RemoteStore`, with clean cancellation
//! when the document view closes.

pub mod session;

pub use session::DocumentSession;
