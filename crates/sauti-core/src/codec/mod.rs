//! Audio token codec for the flattened 7-slot frame format.
//!
//! The language model emits audio as a flat stream of token ids. Each group
//! of seven consecutive tokens is one frame: one coarse code, two mid codes
//! and four fine codes, each shifted into its own id range so slots never
//! collide. This module repacks that stream into the per-level code
//! sequences the waveform decoder consumes, and back.

mod filter;
mod frames;

pub use filter::{filter_audio_tokens, trim_repetitive_tail, TailTrimConfig};
pub use frames::{decode_frames, encode_frames, CodeLevels};

/// Token slots per flattened frame.
pub const NUM_CODEBOOKS: usize = 7;

/// Additive id offset for each slot within a frame.
pub const CODEBOOK_OFFSETS: [u32; NUM_CODEBOOKS] = [0, 4096, 8192, 12288, 16384, 20480, 24576];

/// Largest valid code value in any slot.
pub const CODE_MAX: u32 = 4095;

/// First token id of the audio code vocabulary.
pub const AUDIO_VOCAB_OFFSET: u32 = 128_266;

/// Marks the start of an audio section in model output.
pub const AUDIO_START_TOKEN: u32 = 128_259;

/// Marks the end of an audio section in model output.
pub const AUDIO_END_TOKEN: u32 = 128_009;

/// Padding token interleaved by some model builds.
pub const AUDIO_PAD_TOKEN: u32 = 128_258;

/// Frames of audio produced per second.
pub const FRAMES_PER_SECOND: u64 = 86;

/// Estimated duration of a flat token stream, in milliseconds.
///
/// A trailing partial frame contributes nothing, matching the decoder.
pub fn estimate_duration_ms(token_count: usize) -> u64 {
    let frames = (token_count / NUM_CODEBOOKS) as u64;
    frames * 1000 / FRAMES_PER_SECOND
}
