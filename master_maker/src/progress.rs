//! Progress reporting for combine sessions.

use std::path::PathBuf;

use common::SharedFn;

/// Event delivered to the progress callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Human-readable message at an indentation level (0 = session).
    Message { level: usize, text: String },
    /// An input frame was moved into its disposition subfolder.
    FileRelocated { path: PathBuf },
}

/// Callback type for progress reporting.
pub type ProgressCallback = SharedFn<dyn Fn(ProgressEvent) + Send + Sync>;

/// Leveled message channel over a [`ProgressCallback`].
///
/// Every message is also logged through `tracing`, with or without a callback.
#[derive(Debug, Default, Clone)]
pub struct Console {
    callback: ProgressCallback,
    level: usize,
}

impl Console {
    pub fn new(callback: ProgressCallback) -> Self {
        Self { callback, level: 0 }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn push_level(&mut self) {
        self.level += 1;
    }

    pub fn pop_level(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Return to a level saved earlier, e.g. after an early exit.
    pub fn reset_level(&mut self, level: usize) {
        self.level = level;
    }

    /// Emit `text` at the current level plus `indent`.
    pub fn message(&self, text: impl Into<String>, indent: usize) {
        let text = text.into();
        let level = self.level + indent;
        tracing::info!(indent = level, "{text}");
        self.emit(ProgressEvent::Message { level, text });
    }

    pub fn file_relocated(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(path = %path.display(), "Relocated input frame");
        self.emit(ProgressEvent::FileRelocated { path });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(f) = self.callback.as_ref() {
            f(event);
        }
    }
}
