//! Temporary local preview URLs for files being uploaded.

use fitcms_core::LocalFile;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Creates and releases the object URL shown while an upload is in flight.
pub trait PreviewStore: Send + Sync {
    fn create(&self, file: &LocalFile) -> String;
    fn revoke(&self, url: &str);
}

/// Hands out `blob:` style URLs and tracks which are still live.
#[derive(Debug, Default)]
pub struct InMemoryPreviewStore {
    next: AtomicU64,
    live: Mutex<HashSet<String>>,
}

impl InMemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live_set().contains(url)
    }

    pub fn live_count(&self) -> usize {
        self.live_set().len()
    }
}

impl PreviewStore for InMemoryPreviewStore {
    fn create(&self, file: &LocalFile) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("blob:preview/{}/{}", n, file.file_name);
        self.live_set().insert(url.clone());
        url
    }

    fn revoke(&self, url: &str) {
        if !self.live_set().remove(url) {
            tracing::debug!(url = %url, "Preview URL was not live");
        }
    }
}
