//! The contract with the editing surface that owns the local document.
//!
//! The surface exclusively owns the content while the user is typing;
//! the sync loop is the only other writer, and only through
//! `set_content` on the download path while the user is not focused.
//! Implementations:
//! - `BufferEditor` - plain in-memory surface for tests and the demo
//! - a real UI editor in the embedding application

use crate::content::ContentTree;

/// A text selection as character offsets into the plain-text
/// projection of the content tree. `from == to` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub from: usize,
    pub to: usize,
}

impl Selection {
    /// A collapsed selection (caret) at the given offset.
    pub fn caret(at: usize) -> Self {
        Self { from: at, to: at }
    }

    /// Clamp both ends to `max`. Offsets can exceed the document after
    /// a remote replacement removed text; clamping keeps them valid.
    pub fn clamp(self, max: usize) -> Self {
        Self {
            from: self.from.min(max),
            to: self.to.min(max),
        }
    }
}

/// The editable document surface the sync loop reads from and writes to.
pub trait EditorSurface {
    /// Current local content.
    fn content(&self) -> &ContentTree;

    /// Replace the local content wholesale (download path only).
    fn set_content(&mut self, content: ContentTree);

    /// Whether the local user is actively editing. Gates the write
    /// direction: uploads only while focused, downloads only while not.
    fn is_focused(&self) -> bool;

    fn selection(&self) -> Selection;

    fn set_selection(&mut self, selection: Selection);
}

/// In-memory editing surface for tests and the demo binary.
#[derive(Debug, Default)]
pub struct BufferEditor {
    content: ContentTree,
    focused: bool,
    selection: Selection,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Simulate the user retyping the document as plain text, leaving
    /// the caret at the end.
    pub fn replace_text(&mut self, text: &str) {
        self.content = ContentTree::from_plain_text(text);
        self.selection = Selection::caret(self.content.char_count());
    }
}

impl EditorSurface for BufferEditor {
    fn content(&self) -> &ContentTree {
        &self.content
    }

    fn set_content(&mut self, content: ContentTree) {
        self.content = content;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }
}
