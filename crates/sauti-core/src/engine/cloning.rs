//! Zero-shot voice cloning engine.
//!
//! Conditions a synthesis backend on a character's reference clip. The
//! neural model itself sits behind [`CloningBackend`] so the engine owns
//! lifecycle, parameter resolution and packaging without linking model
//! code.

use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{
    map_backend_error, EngineKind, TtsChunk, TtsEngine, TtsOverrides, TtsResult, TtsStream,
};
use crate::audio::encode_wav_pcm16;
use crate::config::CloningSettings;
use crate::error::{Error, Result};

/// Resolved sampling parameters for one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct CloningParams {
    pub exaggeration: f32,
    pub cfg_weight: f32,
    pub temperature: f32,
    /// Streaming chunk size in decoder frames.
    pub chunk_size: usize,
}

/// Iterator of sample chunks produced by a backend.
pub type SampleStream = Box<dyn Iterator<Item = std::result::Result<Vec<f32>, String>> + Send>;

/// Synthesis backend the cloning engine drives.
///
/// Errors are plain text so the engine can classify them. The iterator
/// returned by `synthesize_stream` must not borrow the backend.
pub trait CloningBackend: Send + Sync {
    /// Sample rate of synthesized audio, in Hz.
    fn sample_rate(&self) -> u32;

    /// Synthesize a complete clip conditioned on the reference audio.
    fn synthesize(
        &self,
        reference: &Path,
        text: &str,
        params: &CloningParams,
    ) -> std::result::Result<Vec<f32>, String>;

    /// Synthesize a clip in chunks of roughly `params.chunk_size` frames.
    fn synthesize_stream(
        &self,
        reference: &Path,
        text: &str,
        params: &CloningParams,
    ) -> std::result::Result<SampleStream, String>;
}

/// Builds a backend on the configured device when the engine loads.
pub type BackendLoader =
    Box<dyn Fn(&str) -> std::result::Result<Box<dyn CloningBackend>, String> + Send + Sync>;

/// Zero-shot cloning engine.
///
/// The backend sits behind a lock so loading and unloading work while the
/// engine is shared.
pub struct CloningEngine {
    settings: CloningSettings,
    loader: BackendLoader,
    backend: RwLock<Option<Box<dyn CloningBackend>>>,
}

impl CloningEngine {
    pub fn new(settings: CloningSettings, loader: BackendLoader) -> Self {
        Self {
            settings,
            loader,
            backend: RwLock::new(None),
        }
    }

    fn params(&self, overrides: Option<&TtsOverrides>) -> CloningParams {
        CloningParams {
            exaggeration: overrides
                .and_then(|o| o.exaggeration)
                .unwrap_or(self.settings.exaggeration),
            cfg_weight: overrides
                .and_then(|o| o.cfg_weight)
                .unwrap_or(self.settings.cfg_weight),
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(self.settings.temperature),
            chunk_size: self.settings.chunk_size,
        }
    }
}

impl TtsEngine for CloningEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cloning
    }

    fn load(&self) -> Result<()> {
        let mut backend = self.backend.write();
        if backend.is_some() {
            debug!("Cloning backend already loaded");
            return Ok(());
        }
        info!("Loading cloning backend on {}", self.settings.device);
        let loaded = (self.loader)(&self.settings.device).map_err(|e| {
            Error::EngineUnavailable(format!("Failed to load cloning backend: {}", e))
        })?;
        *backend = Some(loaded);
        info!("Cloning backend loaded");
        Ok(())
    }

    fn unload(&self) {
        if self.backend.write().take().is_some() {
            info!("Cloning backend unloaded");
        }
    }

    fn is_loaded(&self) -> bool {
        self.backend.read().is_some()
    }

    fn device(&self) -> String {
        self.settings.device.clone()
    }

    fn generate(
        &self,
        voice_path: &Path,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsResult> {
        let params = self.params(overrides);
        let guard = self.backend.read();
        let backend = guard
            .as_deref()
            .ok_or_else(|| Error::EngineNotLoaded(EngineKind::Cloning.to_string()))?;

        let samples = backend
            .synthesize(voice_path, text, &params)
            .map_err(map_backend_error)?;
        let sample_rate = backend.sample_rate();
        let duration_ms = samples.len() as u64 * 1000 / sample_rate.max(1) as u64;
        let audio_bytes = encode_wav_pcm16(&samples, sample_rate)?;

        Ok(TtsResult {
            audio_bytes,
            sample_rate,
            duration_ms,
        })
    }

    fn generate_stream(
        &self,
        voice_path: &Path,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsStream> {
        let params = self.params(overrides);
        let guard = self.backend.read();
        let backend = guard
            .as_deref()
            .ok_or_else(|| Error::EngineNotLoaded(EngineKind::Cloning.to_string()))?;

        let sample_rate = backend.sample_rate();
        let chunks = backend
            .synthesize_stream(voice_path, text, &params)
            .map_err(map_backend_error)?;

        let stream = chunks.enumerate().map(move |(chunk_index, chunk)| {
            let samples = chunk.map_err(map_backend_error)?;
            let audio_bytes = encode_wav_pcm16(&samples, sample_rate)?;
            Ok(TtsChunk {
                audio_bytes,
                chunk_index,
                is_final: false,
            })
        });
        Ok(Box::new(stream))
    }
}
