use std::{num::NonZeroUsize, sync::OnceLock};

use lru::LruCache;
use regex::Regex;
use tracing::debug;

const DEFAULT_CACHE_CAPACITY: usize = 16;

struct Patterns {
    non_lexical: Regex,
    spaces: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // digits, ascii latin letters and anything that is not a word character
        non_lexical: Regex::new(r"\d|[a-zA-Z]|\W").expect("Unable to compile cleanup regex"),
        spaces: Regex::new(r"\s+").expect("Unable to compile whitespace regex"),
    })
}

/// Strips digits, Latin letters and punctuation, then squeezes whitespace.
///
/// Characters of the target script (Hangul, Han, ...) and `_` survive.
/// Leading and trailing spaces are kept as a single space.
pub fn normalize(text: &str) -> String {
    let patterns = patterns();
    let cleaned = patterns.non_lexical.replace_all(text, " ");
    patterns.spaces.replace_all(&cleaned, " ").into_owned()
}

/// [`normalize`] with a small LRU memo so a repeated corpus is cleaned once.
/// A capacity of zero disables the memo.
pub struct Normalizer {
    cache: Option<LruCache<String, String>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl Normalizer {
    pub fn with_capacity(capacity: usize) -> Self {
        Normalizer {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn normalize(&mut self, text: &str) -> String {
        let Some(cache) = self.cache.as_mut() else {
            return normalize(text);
        };

        if let Some(hit) = cache.get(text) {
            debug!(chars = text.len(), "normalized text served from cache");
            return hit.clone();
        }

        let normalized = normalize(text);
        cache.put(text.to_owned(), normalized.clone());
        normalized
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_cached(&self, text: &str) -> bool {
        self.cache.as_ref().is_some_and(|cache| cache.contains(text))
    }
}
