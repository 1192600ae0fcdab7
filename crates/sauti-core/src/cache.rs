//! LRU cache for synthesized audio.
//!
//! Entries are keyed by a digest of character and text, so repeating a
//! request replays the stored clip instead of re-running an engine. The
//! cache holds complete WAV payloads in memory and evicts the least
//! recently used clip once full.

use std::num::NonZeroUsize;
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const TEXT_PREVIEW_CHARS: usize = 80;

/// A cached clip with its payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub character: String,
    pub text: String,
    pub audio_bytes: Vec<u8>,
    pub created_at: u64,
}

/// Metadata view of a cached clip, without the payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheEntrySummary {
    pub key: String,
    pub character: String,
    pub text: String,
    pub byte_size: usize,
    pub created_at: u64,
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    enabled: bool,
    total_bytes: usize,
}

/// Bounded LRU cache of synthesized clips.
///
/// `get` and `put` honor the enabled flag; the admin operations work
/// regardless so a disabled cache can still be inspected and drained.
pub struct AudioCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
}

impl AudioCache {
    pub fn new(max_size: usize, enabled: bool) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                enabled,
                total_bytes: 0,
            }),
            max_size: max_size.max(1),
        }
    }

    /// Stable lookup key for a character and text pair.
    pub fn make_key(character: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(character.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Fetch the cached clip for a request, promoting it to most recent.
    pub fn get(&self, character: &str, text: &str) -> Option<Vec<u8>> {
        let key = Self::make_key(character, text);
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return None;
        }
        inner.entries.get(&key).map(|entry| {
            debug!("Cache hit for character {}", entry.character);
            entry.audio_bytes.clone()
        })
    }

    /// Store a synthesized clip, replacing any entry with the same key.
    ///
    /// Replacement keeps the original creation time. Inserting into a full
    /// cache evicts the least recently used entry first.
    pub fn put(&self, character: &str, text: &str, audio_bytes: Vec<u8>) {
        let key = Self::make_key(character, text);
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return;
        }

        let created_at = inner
            .entries
            .peek(&key)
            .map(|existing| existing.created_at)
            .unwrap_or_else(now_unix_secs);
        let entry = CacheEntry {
            key: key.clone(),
            character: character.to_string(),
            text: truncate_string(text, TEXT_PREVIEW_CHARS),
            audio_bytes,
            created_at,
        };

        inner.total_bytes += entry.audio_bytes.len();
        if let Some((old_key, old)) = inner.entries.push(key.clone(), entry) {
            inner.total_bytes -= old.audio_bytes.len();
            if old_key != key {
                debug!("Evicted cache entry for character {}", old.character);
            }
        }
    }

    /// Remove one entry by key. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.pop(key) {
            Some(entry) => {
                inner.total_bytes -= entry.audio_bytes.len();
                true
            }
            None => false,
        }
    }

    /// Remove every entry for a character. Returns how many were dropped.
    pub fn remove_by_character(&self, character: &str) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.character == character)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            if let Some(entry) = inner.entries.pop(key) {
                inner.total_bytes -= entry.audio_bytes.len();
            }
        }
        if !keys.is_empty() {
            info!(
                "Removed {} cache entries for character {}",
                keys.len(),
                character
            );
        }
        keys.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.total_bytes = 0;
        info!("Cleared audio cache ({} entries)", dropped);
    }

    /// Metadata for every entry, most recently used first.
    pub fn list_entries(&self) -> Vec<CacheEntrySummary> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .map(|(_, entry)| CacheEntrySummary {
                key: entry.key.clone(),
                character: entry.character.clone(),
                text: entry.text.clone(),
                byte_size: entry.audio_bytes.len(),
                created_at: entry.created_at,
            })
            .collect()
    }

    /// Fetch one entry with its payload, without promoting it.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let inner = self.inner.lock();
        inner.entries.peek(key).cloned()
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.enabled = enabled;
        info!("Audio cache {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Total payload bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}

fn truncate_string(input: &str, max_chars: usize) -> String {
    let mut result = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max_chars {
            break;
        }
        result.push(ch);
    }

    if input.chars().count() > max_chars {
        result.push_str("...");
    }

    result
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_pair_sensitive() {
        let key = AudioCache::make_key("marcus", "hello there");
        assert_eq!(key, AudioCache::make_key("marcus", "hello there"));
        assert_eq!(key.len(), 64);
        assert_ne!(key, AudioCache::make_key("marcus", "hello"));
        assert_ne!(key, AudioCache::make_key("vera", "hello there"));
    }

    #[test]
    fn get_returns_stored_bytes() {
        let cache = AudioCache::new(4, true);
        cache.put("marcus", "hello", vec![1, 2, 3]);
        assert_eq!(cache.get("marcus", "hello"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("marcus", "other"), None);
    }

    #[test]
    fn lru_eviction_follows_access_recency() {
        let cache = AudioCache::new(2, true);
        cache.put("a", "t", vec![1]);
        cache.put("b", "t", vec![2]);

        // Touch A so B becomes least recently used.
        assert!(cache.get("a", "t").is_some());
        cache.put("c", "t", vec![3]);

        assert!(cache.get("b", "t").is_none());
        assert!(cache.get("a", "t").is_some());
        assert!(cache.get("c", "t").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn put_replaces_and_keeps_created_at() {
        let cache = AudioCache::new(2, true);
        cache.put("a", "t", vec![1, 1]);
        let before = cache.entry(&AudioCache::make_key("a", "t")).unwrap();
        cache.put("a", "t", vec![2, 2, 2]);
        let after = cache.entry(&AudioCache::make_key("a", "t")).unwrap();

        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.audio_bytes, vec![2, 2, 2]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 3);
    }

    #[test]
    fn disabled_cache_neither_serves_nor_stores() {
        let cache = AudioCache::new(2, true);
        cache.put("a", "t", vec![1]);
        cache.set_enabled(false);

        assert_eq!(cache.get("a", "t"), None);
        cache.put("b", "t", vec![2]);
        assert_eq!(cache.len(), 1);

        // Admin surface still works while disabled.
        assert_eq!(cache.list_entries().len(), 1);
        assert!(cache.remove(&AudioCache::make_key("a", "t")));
        assert!(cache.is_empty());

        cache.set_enabled(true);
        cache.put("b", "t", vec![2]);
        assert_eq!(cache.get("b", "t"), Some(vec![2]));
    }

    #[test]
    fn remove_by_character_drops_only_that_character() {
        let cache = AudioCache::new(8, true);
        cache.put("marcus", "one", vec![1]);
        cache.put("marcus", "two", vec![2]);
        cache.put("vera", "one", vec![3]);

        assert_eq!(cache.remove_by_character("marcus"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("vera", "one").is_some());
        assert_eq!(cache.remove_by_character("marcus"), 0);
    }

    #[test]
    fn list_entries_is_most_recent_first() {
        let cache = AudioCache::new(4, true);
        cache.put("a", "t", vec![1]);
        cache.put("b", "t", vec![2]);
        cache.put("c", "t", vec![3]);
        assert!(cache.get("a", "t").is_some());

        let characters: Vec<String> = cache
            .list_entries()
            .into_iter()
            .map(|entry| entry.character)
            .collect();
        assert_eq!(characters, vec!["a", "c", "b"]);
    }

    #[test]
    fn total_bytes_tracks_insert_evict_remove() {
        let cache = AudioCache::new(2, true);
        cache.put("a", "t", vec![0; 10]);
        cache.put("b", "t", vec![0; 20]);
        assert_eq!(cache.total_bytes(), 30);

        // Evicts A.
        cache.put("c", "t", vec![0; 5]);
        assert_eq!(cache.total_bytes(), 25);

        cache.remove(&AudioCache::make_key("b", "t"));
        assert_eq!(cache.total_bytes(), 5);

        cache.clear();
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn long_text_is_truncated_for_display() {
        let cache = AudioCache::new(2, true);
        let text = "x".repeat(200);
        cache.put("a", &text, vec![1]);

        let entries = cache.list_entries();
        assert!(entries[0].text.len() <= TEXT_PREVIEW_CHARS + 3);
        assert!(entries[0].text.ends_with("..."));
        // Lookup still uses the full text.
        assert!(cache.get("a", &text).is_some());
    }
}
