//! Filesystem-backed voice registry.
//!
//! Voices live under one directory, one subdirectory per character:
//!
//! ```text
//! voices/
//!   marcus/reference.wav           zero-shot cloning voice
//!   vera/adapter_config.json       fine-tuned adapter voice
//! ```
//!
//! Names are registered lowercased and looked up case-insensitively. A
//! directory carrying both markers registers as a cloning voice.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::engine::EngineKind;

/// Marker file for a cloning voice inside its directory.
pub const REFERENCE_AUDIO_FILENAME: &str = "reference.wav";

/// Marker file for an adapter voice inside its directory.
pub const ADAPTER_CONFIG_FILENAME: &str = "adapter_config.json";

/// A registered voice and the path its engine consumes.
///
/// For cloning voices `path` is the reference WAV file; for adapter
/// voices it is the adapter directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEntry {
    pub name: String,
    pub path: PathBuf,
    pub engine: EngineKind,
}

/// Registry of available voices, rebuilt by scanning a directory.
pub struct VoiceRegistry {
    voices_dir: PathBuf,
    voices: RwLock<HashMap<String, VoiceEntry>>,
}

impl VoiceRegistry {
    pub fn new(voices_dir: impl Into<PathBuf>) -> Self {
        Self {
            voices_dir: voices_dir.into(),
            voices: RwLock::new(HashMap::new()),
        }
    }

    /// Walk the voices directory and register every valid voice.
    ///
    /// Replaces the previous registration wholesale, so voices deleted on
    /// disk disappear from the registry.
    pub fn scan(&self) {
        let mut voices = HashMap::new();

        let entries = match std::fs::read_dir(&self.voices_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "Voices directory not readable: {} ({})",
                    self.voices_dir.display(),
                    err
                );
                *self.voices.write() = voices;
                return;
            }
        };

        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        subdirs.sort();

        for subdir in subdirs {
            let Some(dir_name) = subdir.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let name = dir_name.to_lowercase();

            let reference = subdir.join(REFERENCE_AUDIO_FILENAME);
            let entry = if reference.is_file() {
                VoiceEntry {
                    name: name.clone(),
                    path: reference,
                    engine: EngineKind::Cloning,
                }
            } else if subdir.join(ADAPTER_CONFIG_FILENAME).is_file() {
                VoiceEntry {
                    name: name.clone(),
                    path: subdir.clone(),
                    engine: EngineKind::Adapter,
                }
            } else {
                debug!("Skipping {}: no reference audio or adapter config", dir_name);
                continue;
            };

            info!("Registered voice: {} ({})", name, entry.engine);
            voices.insert(name, entry);
        }

        info!("Voice registry loaded {} voice(s)", voices.len());
        *self.voices.write() = voices;
    }

    /// Clear and re-scan the voices directory.
    pub fn refresh(&self) {
        self.scan();
    }

    /// Look up a voice by name, case-insensitively.
    pub fn get_voice(&self, name: &str) -> Option<VoiceEntry> {
        self.voices.read().get(&name.to_lowercase()).cloned()
    }

    /// All registered voices, sorted by name.
    pub fn list_voices(&self) -> Vec<VoiceEntry> {
        let mut voices: Vec<VoiceEntry> = self.voices.read().values().cloned().collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices
    }

    pub fn len(&self) -> usize {
        self.voices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.read().is_empty()
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }
}
