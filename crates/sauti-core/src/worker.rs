//! The single queue worker and the streaming delivery bridge.
//!
//! One worker task drains the request queue, so at most one synthesis
//! runs at a time. Engine calls are blocking and run on the blocking
//! thread pool; the async runtime stays responsive for submissions and
//! state queries throughout.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::wav_info;
use crate::cache::AudioCache;
use crate::engine::{TtsChunk, TtsOverrides, TtsResult};
use crate::error::{Error, Result};
use crate::queue::{QueueConsumer, QueueItem};
use crate::router::EngineRouter;

/// Spawn the worker task draining the queue.
///
/// Each request is answered over its response channel, successful or not,
/// and the processing slot is always released afterwards. The worker runs
/// until the returned handle is aborted.
pub fn spawn_worker(
    consumer: QueueConsumer,
    router: Arc<EngineRouter>,
    cache: Arc<AudioCache>,
) -> JoinHandle<()> {
    tokio::spawn(run_worker(consumer, router, cache))
}

async fn run_worker(
    mut consumer: QueueConsumer,
    router: Arc<EngineRouter>,
    cache: Arc<AudioCache>,
) {
    info!("TTS worker started");
    loop {
        let item = consumer.dequeue().await;
        let QueueItem {
            request_id,
            character,
            text,
            overrides,
            respond_to,
            ..
        } = item;

        let result = process_request(&router, &cache, request_id, &character, &text, overrides).await;
        if let Err(err) = &result {
            warn!("Request {} failed: {}", request_id, err);
        }
        if respond_to.send(result).is_err() {
            debug!("Request {} submitter went away before delivery", request_id);
        }
        consumer.mark_done().await;
    }
}

async fn process_request(
    router: &Arc<EngineRouter>,
    cache: &Arc<AudioCache>,
    request_id: u64,
    character: &str,
    text: &str,
    overrides: Option<TtsOverrides>,
) -> Result<TtsResult> {
    if let Some(audio_bytes) = cache.get(character, text) {
        debug!("Request {} served from cache", request_id);
        return Ok(cached_result(audio_bytes));
    }

    let router = Arc::clone(router);
    let character_owned = character.to_string();
    let text_owned = text.to_string();
    let generated = tokio::task::spawn_blocking(move || {
        router.generate(&character_owned, &text_owned, overrides.as_ref())
    })
    .await
    .map_err(|e| Error::GenerationFailed(format!("Synthesis task failed: {}", e)))??;

    cache.put(character, text, generated.audio_bytes.clone());
    Ok(generated)
}

/// Rebuild a result from cached WAV bytes.
///
/// Rate and duration come from the WAV header; unparseable bytes fall
/// back to zeroes rather than failing a hit.
fn cached_result(audio_bytes: Vec<u8>) -> TtsResult {
    let (sample_rate, duration_ms) = match wav_info(&audio_bytes) {
        Ok(info) => (info.sample_rate, (info.duration_seconds * 1000.0) as u64),
        Err(_) => (0, 0),
    };
    TtsResult {
        audio_bytes,
        sample_rate,
        duration_ms,
    }
}

/// Run a streaming synthesis on a blocking thread, forwarding chunks to
/// the returned channel.
///
/// Every stream ends with an empty final-marker chunk no matter which
/// path it exits through, so consumers can read to the marker without a
/// timeout. An error is forwarded before the marker.
pub fn spawn_stream(
    router: Arc<EngineRouter>,
    character: String,
    text: String,
    overrides: Option<TtsOverrides>,
) -> mpsc::UnboundedReceiver<Result<TtsChunk>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        let mut next_index = 0;
        let outcome = forward_chunks(&router, &character, &text, overrides.as_ref(), &tx, &mut next_index);
        if let Err(err) = outcome {
            warn!("Streaming TTS for {} failed: {}", character, err);
            let _ = tx.send(Err(err));
        }
        let _ = tx.send(Ok(TtsChunk::final_marker(next_index)));
    });
    rx
}

fn forward_chunks(
    router: &EngineRouter,
    character: &str,
    text: &str,
    overrides: Option<&TtsOverrides>,
    tx: &mpsc::UnboundedSender<Result<TtsChunk>>,
    next_index: &mut usize,
) -> Result<()> {
    let stream = router.generate_stream(character, text, overrides)?;
    for chunk in stream {
        let chunk = chunk?;
        *next_index = chunk.chunk_index + 1;
        if tx.send(Ok(chunk)).is_err() {
            debug!("Stream consumer for {} went away", character);
            return Ok(());
        }
    }
    Ok(())
}
