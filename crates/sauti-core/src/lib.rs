#![forbid(unsafe_code)]

pub mod audio;
pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod router;
pub mod voice;
pub mod worker;

pub use audio::AudioInfo;
pub use cache::{AudioCache, CacheEntrySummary};
pub use codec::{
    decode_frames, encode_frames, filter_audio_tokens, trim_repetitive_tail, CodeLevels,
    TailTrimConfig,
};
pub use config::Settings;
pub use engine::{
    AdapterEngine, BackendLoader, CloningBackend, CloningEngine, CloningParams, EngineKind,
    EngineStatus, SampleDecoder, TtsChunk, TtsEngine, TtsOverrides, TtsResult, TtsStream,
};
pub use error::{Error, Result};
pub use queue::{QueueConsumer, QueueItem, QueueItemState, QueueState, RateLimiter, RequestQueue};
pub use router::EngineRouter;
pub use voice::{VoiceEntry, VoiceRegistry};
pub use worker::{spawn_stream, spawn_worker};
