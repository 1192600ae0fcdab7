//! Library configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::codec::TailTrimConfig;

/// Top-level configuration for the synthesis core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory scanned for voice subdirectories
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,

    /// Maximum accepted request text length (characters)
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub cloning: CloningSettings,

    #[serde(default)]
    pub adapter: AdapterSettings,
}

/// Request queue and per-caller rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum number of pending requests before submissions are rejected
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Per-caller submissions allowed in a 60 second window (0 disables)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

/// Synthesized-audio cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of cached clips
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    /// Whether the cache serves and accepts entries
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

/// Zero-shot voice cloning engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloningSettings {
    /// Device the synthesis backend is loaded on ("cpu", "cuda", ...)
    #[serde(default = "default_device")]
    pub device: String,

    /// Emotion exaggeration applied when a request has no override
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,

    /// Classifier-free guidance weight applied when a request has no override
    #[serde(default = "default_cfg_weight")]
    pub cfg_weight: f32,

    /// Sampling temperature applied when a request has no override
    #[serde(default = "default_cloning_temperature")]
    pub temperature: f32,

    /// Streaming chunk size in decoder frames
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Remote adapter engine configuration (OpenAI-style completion server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSettings {
    /// Base URL of the completion server, including the API prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token generation budget per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature applied when a request has no override
    #[serde(default = "default_adapter_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff applied when a request has no override
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Repetition penalty applied when a request has no override
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Sample rate of decoded audio (Hz)
    #[serde(default = "default_adapter_sample_rate")]
    pub sample_rate: u32,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Repetitive tail trimming applied to generated token streams
    #[serde(default)]
    pub tail_trim: TailTrimConfig,
}

fn default_voices_dir() -> PathBuf {
    PathBuf::from("voices")
}

fn default_max_text_length() -> usize {
    500
}
fn default_max_depth() -> usize {
    20
}
fn default_requests_per_minute() -> u32 {
    6
}
fn default_cache_max_size() -> usize {
    100
}
fn default_cache_enabled() -> bool {
    true
}
fn default_device() -> String {
    "cpu".to_string()
}
fn default_exaggeration() -> f32 {
    0.1
}
fn default_cfg_weight() -> f32 {
    3.0
}
fn default_cloning_temperature() -> f32 {
    0.5
}
fn default_chunk_size() -> usize {
    50
}
fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_adapter_temperature() -> f32 {
    0.25
}
fn default_top_p() -> f32 {
    0.9
}
fn default_repetition_penalty() -> f32 {
    1.2
}
fn default_adapter_sample_rate() -> u32 {
    24000
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voices_dir: default_voices_dir(),
            max_text_length: default_max_text_length(),
            queue: QueueSettings::default(),
            cache: CacheSettings::default(),
            cloning: CloningSettings::default(),
            adapter: AdapterSettings::default(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            enabled: default_cache_enabled(),
        }
    }
}

impl Default for CloningSettings {
    fn default() -> Self {
        Self {
            device: default_device(),
            exaggeration: default_exaggeration(),
            cfg_weight: default_cfg_weight(),
            temperature: default_cloning_temperature(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_adapter_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            sample_rate: default_adapter_sample_rate(),
            request_timeout_secs: default_request_timeout_secs(),
            tail_trim: TailTrimConfig::default(),
        }
    }
}
