//! Transport seam between the media client and the network.
//!
//! [`crate::ApiClient`] is the HTTP implementation. Tests substitute the
//! transports in `crate::testing`.

use async_trait::async_trait;
use fitcms_core::{MediaResult, UploadForm};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Request function per HTTP verb. Paths are relative to the API prefix.
///
/// Implementations return the parsed response body (`Value::Null` for empty
/// bodies) or a `MediaError` carrying the HTTP status and server message.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> MediaResult<Value>;

    async fn put_json(&self, path: &str, body: Value) -> MediaResult<Value>;

    async fn delete(&self, path: &str) -> MediaResult<Value>;

    /// Multipart POST of an upload form, reporting bytes-sent progress.
    async fn post_multipart(
        &self,
        path: &str,
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<Value>;
}

/// Publishes upload progress as an integer percentage.
///
/// Values are monotonic: a report lower than the current value is ignored.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressReporter {
    pub fn new() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Reporter nobody listens to.
    pub fn noop() -> Self {
        Self::new().0
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Report `sent` of `total` bytes.
    pub fn report(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        self.set_percent(percent);
    }

    pub fn set_percent(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.report(50, 100);
        reporter.report(10, 100);
        assert_eq!(*rx.borrow(), 50);
        reporter.report(500, 100);
        assert_eq!(*rx.borrow(), 100);
    }

    #[test]
    fn test_empty_payload_reports_complete() {
        let reporter = ProgressReporter::noop();
        reporter.report(0, 0);
        assert_eq!(reporter.current(), 100);
    }
}
