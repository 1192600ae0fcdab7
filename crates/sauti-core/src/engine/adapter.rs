//! Fine-tuned adapter engine backed by a remote completion server.
//!
//! The server hosts a base speech model with per-character adapters and
//! returns audio token ids through an OpenAI-style `/completions`
//! endpoint. This engine builds the prompt, extracts and repacks the token
//! stream, and hands the codes to a local [`SampleDecoder`] for waveform
//! reconstruction.

use std::path::Path;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{map_backend_error, EngineKind, TtsEngine, TtsOverrides, TtsResult};
use crate::audio::encode_wav_pcm16;
use crate::codec::{
    decode_frames, estimate_duration_ms, filter_audio_tokens, trim_repetitive_tail, CodeLevels,
    AUDIO_END_TOKEN, AUDIO_VOCAB_OFFSET,
};
use crate::config::AdapterSettings;
use crate::error::{Error, Result};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Turns per-level codes into waveform samples.
///
/// The neural waveform decoder sits behind this seam. It is loadable so
/// the engine can free its memory together with the HTTP client. Errors
/// are plain text so the engine can classify them.
pub trait SampleDecoder: Send + Sync {
    fn load(&self) -> std::result::Result<(), String>;
    fn unload(&self);
    fn is_loaded(&self) -> bool;
    fn decode(&self, levels: &CodeLevels) -> std::result::Result<Vec<f32>, String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    logprobs: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    logprobs: Option<LogprobsPayload>,
}

#[derive(Debug, Deserialize)]
struct LogprobsPayload {
    #[serde(default)]
    tokens: Vec<String>,
}

/// Adapter engine.
///
/// The adapter name sent to the server is the basename of the voice's
/// adapter directory.
pub struct AdapterEngine {
    settings: AdapterSettings,
    decoder: Box<dyn SampleDecoder>,
    client: RwLock<Option<reqwest::blocking::Client>>,
}

impl AdapterEngine {
    pub fn new(settings: AdapterSettings, decoder: Box<dyn SampleDecoder>) -> Self {
        Self {
            settings,
            decoder,
            client: RwLock::new(None),
        }
    }

    fn build_prompt(text: &str) -> String {
        format!("<custom_token_3>{}<custom_token_1>", text)
    }

    fn completions_url(&self) -> String {
        format!("{}/completions", self.settings.base_url)
    }
}

impl TtsEngine for AdapterEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Adapter
    }

    fn load(&self) -> Result<()> {
        if self.is_loaded() {
            debug!("Adapter engine already loaded");
            return Ok(());
        }

        self.decoder
            .load()
            .map_err(|e| Error::EngineUnavailable(format!("Failed to load sample decoder: {}", e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::EngineUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        let models_url = format!("{}/models", self.settings.base_url);
        match client.get(&models_url).timeout(HEALTH_CHECK_TIMEOUT).send() {
            Ok(response) if response.status().is_success() => {
                info!("Connected to completion server at {}", self.settings.base_url);
            }
            Ok(response) => {
                warn!(
                    "Completion server health check returned {} (engine will retry on requests)",
                    response.status()
                );
            }
            Err(err) => {
                warn!(
                    "Completion server health check failed (engine will retry on requests): {}",
                    err
                );
            }
        }

        *self.client.write() = Some(client);
        Ok(())
    }

    fn unload(&self) {
        self.decoder.unload();
        if self.client.write().take().is_some() {
            info!("Adapter engine unloaded");
        }
    }

    fn is_loaded(&self) -> bool {
        self.decoder.is_loaded() && self.client.read().is_some()
    }

    fn generate(
        &self,
        voice_path: &Path,
        text: &str,
        overrides: Option<&TtsOverrides>,
    ) -> Result<TtsResult> {
        let guard = self.client.read();
        let client = guard
            .as_ref()
            .filter(|_| self.decoder.is_loaded())
            .ok_or_else(|| Error::EngineNotLoaded(EngineKind::Adapter.to_string()))?;

        let Some(model) = voice_path.file_name().and_then(|name| name.to_str()) else {
            return Err(Error::GenerationFailed(format!(
                "Invalid adapter path: {}",
                voice_path.display()
            )));
        };

        let request = CompletionRequest {
            model,
            prompt: Self::build_prompt(text),
            max_tokens: self.settings.max_tokens,
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(self.settings.temperature),
            top_p: overrides
                .and_then(|o| o.top_p)
                .unwrap_or(self.settings.top_p),
            repetition_penalty: overrides
                .and_then(|o| o.repetition_penalty)
                .unwrap_or(self.settings.repetition_penalty),
            frequency_penalty: overrides.and_then(|o| o.frequency_penalty),
            logprobs: 1,
        };

        debug!(
            "Requesting completion: model={}, text_len={}",
            model,
            text.len()
        );
        let response = client
            .post(self.completions_url())
            .json(&request)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            if body.to_lowercase().contains("out of memory") {
                return Err(Error::OutOfMemory(
                    "Completion server out of memory during generation".to_string(),
                ));
            }
            return Err(Error::GenerationFailed(format!(
                "Completion request failed ({}): {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .map_err(|e| Error::GenerationFailed(format!("Malformed completion response: {}", e)))?;
        let raw_tokens = extract_token_ids(&completion)?;

        let audio_tokens = filter_audio_tokens(&raw_tokens, AUDIO_VOCAB_OFFSET, AUDIO_END_TOKEN);
        if audio_tokens.is_empty() {
            return Err(Error::GenerationFailed(
                "No audio tokens in completion response".to_string(),
            ));
        }

        let codes: Vec<u32> = audio_tokens
            .iter()
            .map(|&token| token - AUDIO_VOCAB_OFFSET)
            .collect();
        let codes = trim_repetitive_tail(codes, &self.settings.tail_trim);
        let token_count = codes.len();
        let levels = decode_frames(&codes)?;

        let samples = self.decoder.decode(&levels).map_err(map_backend_error)?;
        let audio_bytes = encode_wav_pcm16(&samples, self.settings.sample_rate)?;

        Ok(TtsResult {
            audio_bytes,
            sample_rate: self.settings.sample_rate,
            duration_ms: estimate_duration_ms(token_count),
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::EngineUnavailable(format!("Completion request timed out: {}", err))
    } else {
        Error::EngineUnavailable(format!("Completion server connection error: {}", err))
    }
}

fn extract_token_ids(completion: &CompletionResponse) -> Result<Vec<u32>> {
    let Some(choice) = completion.choices.first() else {
        return Err(Error::GenerationFailed(
            "Completion response has no choices".to_string(),
        ));
    };

    if let Some(logprobs) = &choice.logprobs {
        let tokens: Vec<u32> = logprobs
            .tokens
            .iter()
            .filter_map(|token| token.trim().parse().ok())
            .collect();
        if !tokens.is_empty() {
            return Ok(tokens);
        }
    }

    // Some server builds omit logprobs and echo token ids as text.
    Ok(choice
        .text
        .split_whitespace()
        .filter_map(|part| part.parse().ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NUM_CODEBOOKS;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeDecoder {
        loaded: Arc<AtomicBool>,
        fail_with: Option<String>,
    }

    impl SampleDecoder for FakeDecoder {
        fn load(&self) -> std::result::Result<(), String> {
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn unload(&self) {
            self.loaded.store(false, Ordering::SeqCst);
        }

        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn decode(&self, levels: &CodeLevels) -> std::result::Result<Vec<f32>, String> {
            if let Some(message) = &self.fail_with {
                return Err(message.clone());
            }
            Ok(vec![0.0; levels.frames() * 512])
        }
    }

    fn response_from(json: &str) -> CompletionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn token_ids_come_from_logprobs() {
        let completion = response_from(
            r#"{
                "choices": [{
                    "text": "",
                    "logprobs": { "tokens": ["128259", "128266", "132363", "not-a-number"] }
                }]
            }"#,
        );
        assert_eq!(
            extract_token_ids(&completion).unwrap(),
            vec![128_259, 128_266, 132_363]
        );
    }

    #[test]
    fn token_ids_fall_back_to_text() {
        let completion = response_from(
            r#"{
                "choices": [{ "text": "128266 128267 junk 128268" }]
            }"#,
        );
        assert_eq!(
            extract_token_ids(&completion).unwrap(),
            vec![128_266, 128_267, 128_268]
        );
    }

    #[test]
    fn missing_choices_is_a_generation_failure() {
        let completion = response_from(r#"{ "choices": [] }"#);
        assert!(matches!(
            extract_token_ids(&completion),
            Err(Error::GenerationFailed(_))
        ));
    }

    #[test]
    fn request_payload_has_expected_shape() {
        let request = CompletionRequest {
            model: "marcus",
            prompt: AdapterEngine::build_prompt("hello there"),
            max_tokens: 4000,
            temperature: 0.25,
            top_p: 0.9,
            repetition_penalty: 1.2,
            frequency_penalty: None,
            logprobs: 1,
        };
        let value: serde_json::Value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "marcus");
        assert_eq!(value["prompt"], "<custom_token_3>hello there<custom_token_1>");
        assert_eq!(value["max_tokens"], 4000);
        assert_eq!(value["logprobs"], 1);
        assert!(value.get("frequency_penalty").is_none());

        let with_penalty = CompletionRequest {
            frequency_penalty: Some(0.5),
            ..request
        };
        let value = serde_json::to_value(&with_penalty).unwrap();
        assert_eq!(value["frequency_penalty"], 0.5);
    }

    #[test]
    fn generate_requires_load() {
        let engine = AdapterEngine::new(
            AdapterSettings::default(),
            Box::new(FakeDecoder {
                loaded: Arc::new(AtomicBool::new(false)),
                fail_with: None,
            }),
        );
        assert!(!engine.is_loaded());
        assert!(matches!(
            engine.generate(Path::new("voices/marcus"), "hello", None),
            Err(Error::EngineNotLoaded(_))
        ));
    }

    #[test]
    fn unload_releases_decoder_and_client() {
        let loaded = Arc::new(AtomicBool::new(false));
        let engine = AdapterEngine::new(
            AdapterSettings {
                // Nothing listens on the discard port, so the health check
                // gets an immediate refusal instead of a timeout.
                base_url: "http://127.0.0.1:9/v1".to_string(),
                ..AdapterSettings::default()
            },
            Box::new(FakeDecoder {
                loaded: Arc::clone(&loaded),
                fail_with: None,
            }),
        );

        engine.load().unwrap();
        assert!(engine.is_loaded());
        assert!(loaded.load(Ordering::SeqCst));

        engine.unload();
        assert!(!engine.is_loaded());
        assert!(!loaded.load(Ordering::SeqCst));
    }

    #[test]
    fn decoder_output_scales_with_frames() {
        let decoder = FakeDecoder {
            loaded: Arc::new(AtomicBool::new(true)),
            fail_with: None,
        };
        let levels = decode_frames(&vec![0; 3 * NUM_CODEBOOKS]).unwrap();
        let samples = decoder.decode(&levels).unwrap();
        assert_eq!(samples.len(), 3 * 512);
    }
}
