use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Queue is full ({0} items)")]
    QueueFull(usize),
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),
    #[error("Engine not loaded: {0}")]
    EngineNotLoaded(String),
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Token stream is empty")]
    EmptyTokenStream,
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
}

impl Error {
    /// True for transient failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::QueueFull(_) | Error::EngineUnavailable(_) | Error::OutOfMemory(_)
        )
    }
}
