//! Short-lived per-exercise cache for media reads.

use fitcms_core::{CompletenessCheck, ExerciseId, MediaAsset, MediaStats};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Default freshness window for cached reads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: Instant,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

type EntryMap<T> = HashMap<ExerciseId, CacheEntry<T>>;

#[derive(Debug, Default)]
struct CacheMaps {
    media: EntryMap<Vec<MediaAsset>>,
    stats: EntryMap<MediaStats>,
    completeness: EntryMap<CompletenessCheck>,
}

/// Returns a clone of a fresh entry; stale entries are evicted.
fn lookup<T: Clone>(map: &mut EntryMap<T>, exercise_id: &str, ttl: Duration) -> Option<T> {
    match map.get(exercise_id) {
        Some(entry) if entry.is_fresh(ttl) => Some(entry.data.clone()),
        Some(_) => {
            map.remove(exercise_id);
            None
        }
        None => None,
    }
}

/// Media list, stats and completeness caches keyed by exercise.
///
/// All three live under one lock so that [`ResponseCache::invalidate`] clears
/// an exercise's entries together. Only successful reads are stored.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    maps: Mutex<CacheMaps>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            maps: Mutex::new(CacheMaps::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn maps(&self) -> MutexGuard<'_, CacheMaps> {
        self.maps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_media(&self, exercise_id: &str) -> Option<Vec<MediaAsset>> {
        lookup(&mut self.maps().media, exercise_id, self.ttl)
    }

    pub fn set_media(&self, exercise_id: &str, media: Vec<MediaAsset>) {
        self.maps()
            .media
            .insert(exercise_id.to_string(), CacheEntry::new(media));
    }

    pub fn get_stats(&self, exercise_id: &str) -> Option<MediaStats> {
        lookup(&mut self.maps().stats, exercise_id, self.ttl)
    }

    pub fn set_stats(&self, exercise_id: &str, stats: MediaStats) {
        self.maps()
            .stats
            .insert(exercise_id.to_string(), CacheEntry::new(stats));
    }

    pub fn get_completeness(&self, exercise_id: &str) -> Option<CompletenessCheck> {
        lookup(&mut self.maps().completeness, exercise_id, self.ttl)
    }

    pub fn set_completeness(&self, exercise_id: &str, check: CompletenessCheck) {
        self.maps()
            .completeness
            .insert(exercise_id.to_string(), CacheEntry::new(check));
    }

    /// Drop the media, stats and completeness entries of one exercise.
    pub fn invalidate(&self, exercise_id: &str) {
        let mut maps = self.maps();
        maps.media.remove(exercise_id);
        maps.stats.remove(exercise_id);
        maps.completeness.remove(exercise_id);
        tracing::debug!(exercise_id = %exercise_id, "Invalidated media cache");
    }

    pub fn clear(&self) {
        *self.maps() = CacheMaps::default();
    }
}
