use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::NUM_CODEBOOKS;

/// Tunables for repetitive tail detection.
///
/// Generation that collapses into a loop emits a long tail drawn from a
/// small set of codes, heard as a flat hum. When a stream longer than
/// `min_len` ends in a window of `window` codes with fewer than
/// `min_distinct` distinct values, that window is cut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailTrimConfig {
    #[serde(default = "default_min_len")]
    pub min_len: usize,

    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_min_distinct")]
    pub min_distinct: usize,
}

fn default_min_len() -> usize {
    100
}
fn default_window() -> usize {
    200
}
fn default_min_distinct() -> usize {
    20
}

impl Default for TailTrimConfig {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            window: default_window(),
            min_distinct: default_min_distinct(),
        }
    }
}

/// Keep the audio-code tokens of a raw model output.
///
/// Scans up to the first `end_token` (exclusive), keeps tokens at or above
/// `audio_token_min`, and truncates the result to whole frames. Start and
/// padding markers sit below the audio vocabulary, so the threshold drops
/// them without naming each one.
pub fn filter_audio_tokens(raw: &[u32], audio_token_min: u32, end_token: u32) -> Vec<u32> {
    let mut tokens: Vec<u32> = raw
        .iter()
        .copied()
        .take_while(|&t| t != end_token)
        .filter(|&t| t >= audio_token_min)
        .collect();
    tokens.truncate(tokens.len() / NUM_CODEBOOKS * NUM_CODEBOOKS);
    tokens
}

/// Cut a looping tail from a de-offset code stream.
///
/// Returns the stream truncated back to whole frames, with the tail window
/// removed when the detector triggers. A stream shorter than the window
/// that still triggers is emptied, matching a clip that was all hum.
pub fn trim_repetitive_tail(mut codes: Vec<u32>, config: &TailTrimConfig) -> Vec<u32> {
    if codes.len() > config.min_len {
        let tail_start = codes.len().saturating_sub(config.window);
        let distinct: HashSet<u32> = codes[tail_start..].iter().copied().collect();
        if distinct.len() < config.min_distinct {
            debug!(
                "Trimming repetitive tail: {} distinct codes in last {}",
                distinct.len(),
                codes.len() - tail_start
            );
            codes.truncate(tail_start);
        }
    }
    codes.truncate(codes.len() / NUM_CODEBOOKS * NUM_CODEBOOKS);
    codes
}
