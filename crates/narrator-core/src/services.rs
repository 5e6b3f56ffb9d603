//! Collaborators the controller narrates through.

use crate::error::SpeechError;
use crate::voice::{Voice, VoiceId};
use anyhow::Result;

/// Text access to the open document.
pub trait DocumentSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Extracted text of a zero-based page. Pages without a text layer return
    /// an empty string rather than an error.
    fn page_text(&self, page: usize) -> Result<String>;
}

/// A text-to-speech engine.
///
/// `speak` blocks the calling thread until the utterance finished or was cut
/// short by `stop`, which must be callable from any other thread meanwhile.
pub trait SpeechService: Send + Sync {
    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError>;

    fn select_voice(&self, id: &VoiceId) -> Result<(), SpeechError>;

    fn speak(&self, text: &str) -> Result<(), SpeechError>;

    fn stop(&self);
}
