//! Voice-to-engine routing.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::engine::{EngineKind, EngineStatus, TtsEngine, TtsOverrides, TtsResult, TtsStream};
use crate::error::{Error, Result};
use crate::voice::VoiceRegistry;

/// Routes synthesis requests to the engine each voice declares.
///
/// Engines register once at startup. Registering a second engine of the
/// same kind replaces the first.
pub struct EngineRouter {
    registry: Arc<VoiceRegistry>,
    engines: Vec<Arc<dyn TtsEngine>>,
}

impl EngineRouter {
    pub fn new(registry: Arc<VoiceRegistry>) -> Self {
        Self {
            registry,
            engines: Vec::new(),
        }
    }

    /// Register an engine for its kind.
    pub fn register_engine(&mut self, engine: Arc<dyn TtsEngine>) {
        let kind = engine.kind();
        self.engines.retain(|existing| existing.kind() != kind);
        self.engines.push(engine);
        info!("Registered TTS engine: {}", kind);
    }

    fn engine_for(&self, kind: EngineKind) -> Option<&Arc<dyn TtsEngine>> {
        self.engines.iter().find(|engine| engine.kind() == kind)
    }

    /// Look up a voice and return the engine serving it together with the
    /// path that engine consumes.
    pub fn resolve(&self, character: &str) -> Result<(Arc<dyn TtsEngine>, PathBuf)> {
        let voice = self
            .registry
            .get_voice(character)
            .ok_or_else(|| Error::VoiceNotFound(character.to_string()))?;
        let engine = self
            .engine_for(voice.engine)
            .ok_or_else(|| Error::EngineNotLoaded(voice.engine.to_string()))?;
        Ok((Arc::clone(engine), voice.path))
    }

    /// Synthesize a complete clip for a character.
    pub fn generate(
        &self,
        character: &str,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsResult> {
        let (engine, voice_path) = self.resolve(character)?;
        info!(
            "Generating TTS: character={}, engine={}, text_len={}",
            character,
            engine.kind(),
            text.len()
        );
        let result = engine.generate(&voice_path, text, overrides)?;
        info!(
            "TTS complete: character={}, duration_ms={}, audio_size={}",
            character,
            result.duration_ms,
            result.audio_bytes.len()
        );
        Ok(result)
    }

    /// Synthesize a clip for a character as a chunk stream.
    pub fn generate_stream(
        &self,
        character: &str,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsStream> {
        let (engine, voice_path) = self.resolve(character)?;
        info!(
            "Streaming TTS: character={}, engine={}, text_len={}",
            character,
            engine.kind(),
            text.len()
        );
        engine.generate_stream(&voice_path, text, overrides)
    }

    /// Load every registered engine, stopping at the first failure.
    pub fn load_all(&self) -> Result<()> {
        for engine in &self.engines {
            engine.load()?;
        }
        Ok(())
    }

    /// Unload every registered engine.
    pub fn unload_all(&self) {
        for engine in &self.engines {
            engine.unload();
        }
    }

    /// True if any registered engine is loaded.
    pub fn is_loaded(&self) -> bool {
        self.engines.iter().any(|engine| engine.is_loaded())
    }

    /// One status line per engine, in registration order.
    pub fn engine_statuses(&self) -> Vec<EngineStatus> {
        self.engines
            .iter()
            .map(|engine| EngineStatus {
                engine: engine.kind().to_string(),
                loaded: engine.is_loaded(),
                device: engine.device(),
            })
            .collect()
    }

    /// Device of the first registered engine, or "cpu" with none.
    pub fn device(&self) -> String {
        self.engines
            .first()
            .map(|engine| engine.device())
            .unwrap_or_else(|| "cpu".to_string())
    }

    pub fn registry(&self) -> &Arc<VoiceRegistry> {
        &self.registry
    }
}
