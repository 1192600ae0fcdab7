//! Pluggable synthesis engines and their shared types.
//!
//! An engine turns (voice path, text) into WAV bytes. Two strategies are
//! built in: zero-shot cloning conditioned on a reference clip, and
//! fine-tuned adapters served by a remote completion server. Both are
//! blocking; callers isolate them on blocking threads.

mod adapter;
mod cloning;

pub use adapter::{AdapterEngine, SampleDecoder};
pub use cloning::{BackendLoader, CloningBackend, CloningEngine, CloningParams, SampleStream};

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The synthesis strategy a voice declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Zero-shot cloning from a reference clip.
    Cloning,
    /// Fine-tuned adapter served by a completion server.
    Adapter,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Cloning => "cloning",
            EngineKind::Adapter => "adapter",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete synthesized clip.
#[derive(Debug, Clone)]
pub struct TtsResult {
    pub audio_bytes: Vec<u8>,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// One piece of a streamed clip.
#[derive(Debug, Clone)]
pub struct TtsChunk {
    pub audio_bytes: Vec<u8>,
    pub chunk_index: usize,
    pub is_final: bool,
}

impl TtsChunk {
    /// The empty terminal chunk that closes every delivered stream.
    pub fn final_marker(chunk_index: usize) -> Self {
        Self {
            audio_bytes: Vec::new(),
            chunk_index,
            is_final: true,
        }
    }
}

/// Per-request parameter overrides.
///
/// A field left unset falls back to the engine's configured default.
/// Engines ignore fields they have no use for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TtsOverrides {
    pub exaggeration: Option<f32>,
    pub cfg_weight: Option<f32>,
    pub temperature: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

/// Lazily produced, finite stream of synthesized chunks.
pub type TtsStream = Box<dyn Iterator<Item = Result<TtsChunk>> + Send>;

/// A loadable synthesis engine.
pub trait TtsEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Bring the engine into a state where it can synthesize.
    fn load(&self) -> Result<()>;

    /// Release the engine's resources. Idempotent.
    fn unload(&self);

    fn is_loaded(&self) -> bool;

    /// Device this engine runs on, for status reporting.
    fn device(&self) -> String {
        "cpu".to_string()
    }

    /// Synthesize a complete clip.
    fn generate(
        &self,
        voice_path: &Path,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsResult>;

    /// Synthesize a clip as a chunk stream. Engines without streaming
    /// support return an error.
    fn generate_stream(
        &self,
        voice_path: &Path,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsStream> {
        let _ = (voice_path, text, overrides);
        Err(Error::GenerationFailed(format!(
            "{} engine does not support streaming",
            self.kind()
        )))
    }
}

/// Status line for one registered engine.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineStatus {
    pub engine: String,
    pub loaded: bool,
    pub device: String,
}

/// Classify a backend's plain-text error.
///
/// Backends surface errors as text; an out-of-memory condition is spotted
/// by substring so it can be reported as retryable.
pub(crate) fn map_backend_error(message: String) -> Error {
    if message.to_lowercase().contains("out of memory") {
        Error::OutOfMemory(message)
    } else {
        Error::GenerationFailed(message)
    }
}
