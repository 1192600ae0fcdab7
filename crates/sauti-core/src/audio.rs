//! WAV encode, decode and reference-audio validation.
//!
//! All audio crosses the library boundary as WAV bytes. Engines package
//! synthesized samples with [`encode_wav_pcm16`]; uploaded reference clips
//! pass [`validate_reference_audio`] before a voice is accepted.

use std::io::Cursor;

use crate::error::{Error, Result};

/// Largest accepted reference clip, in bytes.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
/// Shortest reference clip that gives the cloning backend enough signal.
pub const MIN_DURATION_SECS: f64 = 5.0;
/// Longest accepted reference clip.
pub const MAX_DURATION_SECS: f64 = 30.0;
pub const MIN_SAMPLE_RATE: u32 = 16_000;
pub const MAX_SAMPLE_RATE: u32 = 48_000;

/// Metadata read from a WAV header.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
    pub file_size: usize,
}

/// Package mono samples as 16-bit PCM WAV bytes.
///
/// Samples are clamped to `[-1, 1]`; non-finite values become silence.
pub fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav_bytes = Vec::new();
    {
        let cursor = Cursor::new(&mut wav_bytes);
        let mut writer = hound::WavWriter::new(cursor, spec)
            .map_err(|e| Error::GenerationFailed(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in samples {
            let sample = if sample.is_finite() { sample } else { 0.0 };
            let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer
                .write_sample(value)
                .map_err(|e| Error::GenerationFailed(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::GenerationFailed(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(wav_bytes)
}

/// Decode WAV bytes into mono f32 samples and the source sample rate.
///
/// Integer formats are normalized by their bit depth, multi-channel audio
/// is downmixed by averaging each frame, and every sample ends up finite
/// and within `[-1, 1]`.
pub fn decode_wav_mono(wav_bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    if wav_bytes.is_empty() {
        return Err(Error::InvalidAudio("Empty audio input".to_string()));
    }

    let cursor = Cursor::new(wav_bytes);
    let mut reader = hound::WavReader::new(cursor)
        .map_err(|e| Error::InvalidAudio(format!("Failed to parse WAV: {}", e)))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels.max(1) as usize;

    let mut samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1) as u32;
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| (s as f32 / max_val).clamp(-1.0, 1.0))
                .collect()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    if channels > 1 {
        let mut mono = Vec::with_capacity(samples.len() / channels + 1);
        for frame in samples.chunks(channels) {
            if frame.is_empty() {
                continue;
            }
            let sum: f32 = frame.iter().copied().sum();
            mono.push(sum / frame.len() as f32);
        }
        samples = mono;
    }

    if sample_rate == 0 {
        return Err(Error::InvalidAudio(
            "Decoded audio has invalid sample rate 0".to_string(),
        ));
    }
    if samples.is_empty() {
        return Err(Error::InvalidAudio(
            "Decoded audio contains no samples".to_string(),
        ));
    }

    for sample in &mut samples {
        if !sample.is_finite() {
            *sample = 0.0;
        } else {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    Ok((samples, sample_rate))
}

/// Read WAV header metadata without decoding the sample data.
pub fn wav_info(wav_bytes: &[u8]) -> Result<AudioInfo> {
    let cursor = Cursor::new(wav_bytes);
    let reader = hound::WavReader::new(cursor)
        .map_err(|e| Error::InvalidAudio(format!("Failed to parse WAV: {}", e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1);
    let frames = reader.duration();
    if spec.sample_rate == 0 {
        return Err(Error::InvalidAudio(
            "Decoded audio has invalid sample rate 0".to_string(),
        ));
    }

    Ok(AudioInfo {
        sample_rate: spec.sample_rate,
        channels,
        duration_seconds: frames as f64 / spec.sample_rate as f64,
        file_size: wav_bytes.len(),
    })
}

/// Validate an uploaded reference clip and return its metadata.
///
/// Checks the size cap, that the bytes parse as WAV, and that sample rate
/// and duration fall inside the accepted bands.
pub fn validate_reference_audio(wav_bytes: &[u8]) -> Result<AudioInfo> {
    if wav_bytes.len() > MAX_FILE_SIZE {
        return Err(Error::InvalidAudio(format!(
            "File too large: {} bytes (max {})",
            wav_bytes.len(),
            MAX_FILE_SIZE
        )));
    }

    let info = wav_info(wav_bytes)?;

    if info.sample_rate < MIN_SAMPLE_RATE || info.sample_rate > MAX_SAMPLE_RATE {
        return Err(Error::InvalidAudio(format!(
            "Sample rate {} Hz outside allowed range ({}-{} Hz)",
            info.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
        )));
    }
    if info.duration_seconds < MIN_DURATION_SECS {
        return Err(Error::InvalidAudio(format!(
            "Audio too short: {:.1}s (minimum {}s)",
            info.duration_seconds, MIN_DURATION_SECS
        )));
    }
    if info.duration_seconds > MAX_DURATION_SECS {
        return Err(Error::InvalidAudio(format!(
            "Audio too long: {:.1}s (maximum {}s)",
            info.duration_seconds, MAX_DURATION_SECS
        )));
    }

    Ok(info)
}
