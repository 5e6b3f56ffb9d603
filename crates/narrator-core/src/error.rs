/// Failures reported by a speech service.
///
/// The narration loop only needs to know whether the engine can keep going:
/// recoverable errors abandon the current page, fatal ones end the session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("failed to speak text: {0}")]
    Utterance(String),
    #[error("voice not available: {0}")]
    UnknownVoice(String),
    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl SpeechError {
    pub fn utterance(message: impl Into<String>) -> Self {
        Self::Utterance(message.into())
    }

    pub fn unknown_voice(id: impl Into<String>) -> Self {
        Self::UnknownVoice(id.into())
    }

    pub fn engine_unavailable(message: impl Into<String>) -> Self {
        Self::EngineUnavailable(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}
