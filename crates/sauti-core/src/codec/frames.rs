use tracing::debug;

use super::{CODEBOOK_OFFSETS, CODE_MAX, NUM_CODEBOOKS};
use crate::error::{Error, Result};

/// Per-level code sequences for the waveform decoder.
///
/// For `n` frames, `coarse` holds `n` codes, `mid` holds `2n` and `fine`
/// holds `4n`. That length relationship is structural: [`decode_frames`]
/// always produces it, and [`encode_frames`] assumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLevels {
    pub coarse: Vec<u32>,
    pub mid: Vec<u32>,
    pub fine: Vec<u32>,
}

impl CodeLevels {
    pub fn frames(&self) -> usize {
        self.coarse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coarse.is_empty()
    }
}

/// Unpack a flat token stream into per-level code sequences.
///
/// `tokens` carries slot-offset code values only; control tokens and the
/// vocabulary base offset have already been stripped. A trailing partial
/// frame is dropped. A code outside its slot's range is clamped to the
/// nearest valid value so one mispredicted token does not abort the clip.
pub fn decode_frames(tokens: &[u32]) -> Result<CodeLevels> {
    if tokens.is_empty() {
        return Err(Error::EmptyTokenStream);
    }

    let frames = tokens.len() / NUM_CODEBOOKS;
    let dropped = tokens.len() - frames * NUM_CODEBOOKS;
    if dropped > 0 {
        debug!("Dropping {} tokens of a partial trailing frame", dropped);
    }

    let mut levels = CodeLevels {
        coarse: Vec::with_capacity(frames),
        mid: Vec::with_capacity(frames * 2),
        fine: Vec::with_capacity(frames * 4),
    };
    for frame in tokens[..frames * NUM_CODEBOOKS].chunks_exact(NUM_CODEBOOKS) {
        levels.coarse.push(strip_offset(frame[0], CODEBOOK_OFFSETS[0]));
        levels.mid.push(strip_offset(frame[1], CODEBOOK_OFFSETS[1]));
        levels.fine.push(strip_offset(frame[2], CODEBOOK_OFFSETS[2]));
        levels.fine.push(strip_offset(frame[3], CODEBOOK_OFFSETS[3]));
        levels.mid.push(strip_offset(frame[4], CODEBOOK_OFFSETS[4]));
        levels.fine.push(strip_offset(frame[5], CODEBOOK_OFFSETS[5]));
        levels.fine.push(strip_offset(frame[6], CODEBOOK_OFFSETS[6]));
    }
    Ok(levels)
}

fn strip_offset(token: u32, offset: u32) -> u32 {
    token.saturating_sub(offset).min(CODE_MAX)
}

/// Pack per-level code sequences into a flat token stream.
///
/// Inverse of [`decode_frames`]. The frame count follows `coarse`; `mid`
/// and `fine` must hold two and four codes per frame.
pub fn encode_frames(levels: &CodeLevels) -> Vec<u32> {
    let frames = levels.coarse.len();
    let mut tokens = Vec::with_capacity(frames * NUM_CODEBOOKS);
    for i in 0..frames {
        tokens.push(levels.coarse[i] + CODEBOOK_OFFSETS[0]);
        tokens.push(levels.mid[2 * i] + CODEBOOK_OFFSETS[1]);
        tokens.push(levels.fine[4 * i] + CODEBOOK_OFFSETS[2]);
        tokens.push(levels.fine[4 * i + 1] + CODEBOOK_OFFSETS[3]);
        tokens.push(levels.mid[2 * i + 1] + CODEBOOK_OFFSETS[4]);
        tokens.push(levels.fine[4 * i + 2] + CODEBOOK_OFFSETS[5]);
        tokens.push(levels.fine[4 * i + 3] + CODEBOOK_OFFSETS[6]);
    }
    tokens
}
