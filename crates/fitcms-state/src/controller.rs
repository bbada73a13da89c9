//! Media state of one exercise, kept in step with the admin API.
//!
//! Uploads appear immediately as [`PendingUpload`] projections and are
//! replaced by the server record on success. Primary and view-angle edits are
//! applied locally before the request and are not rolled back when it fails;
//! the error notice is the signal and the next refresh restores server truth.
//! Reordering is all-or-nothing.

use fitcms_api_client::MediaClient;
use fitcms_core::{
    completeness, ordering, validation, ClientConfig, CompletenessCheck, ErrorMetadata,
    ExerciseId, LogLevel, MediaAsset, MediaError, MediaId, MediaResult, MediaStats,
    PendingUpload, UploadForm, UploadLimits, UploadStatus, ViewAngle,
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::debounce::Debouncer;
use crate::notify::{Notifier, TracingNotifier};
use crate::preview::{InMemoryPreviewStore, PreviewStore};

const STATS_RELOAD_DELAY: Duration = Duration::from_millis(500);
const COMPLETENESS_RELOAD_DELAY: Duration = Duration::from_millis(1000);
const REFRESH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Timing and limits of a [`MediaStateController`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Quiet period before a coalesced list refresh runs.
    pub refresh_debounce: Duration,
    /// Delay after a successful upload before stats are reloaded.
    pub stats_reload_delay: Duration,
    /// Delay after a successful upload before completeness is reloaded.
    pub completeness_reload_delay: Duration,
    pub upload_limits: UploadLimits,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            refresh_debounce: REFRESH_DEBOUNCE,
            stats_reload_delay: STATS_RELOAD_DELAY,
            completeness_reload_delay: COMPLETENESS_RELOAD_DELAY,
            upload_limits: UploadLimits::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            refresh_debounce: config.refresh_debounce(),
            upload_limits: config.upload_limits.clone(),
            ..Self::default()
        }
    }
}

/// Everything an observer renders for one exercise.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSnapshot {
    pub exercise_id: ExerciseId,
    /// Server records, sorted by `order`.
    pub media: Vec<MediaAsset>,
    /// Uploads not yet replaced by a server record, including failed ones.
    pub pending: Vec<PendingUpload>,
    pub stats: Option<MediaStats>,
    pub completeness: Option<CompletenessCheck>,
    pub loading: bool,
}

impl MediaSnapshot {
    pub fn pending_upload(&self, temp_id: Uuid) -> Option<&PendingUpload> {
        self.pending.iter().find(|p| p.temp_id == temp_id)
    }

    fn pending_mut(&mut self, temp_id: Uuid) -> Option<&mut PendingUpload> {
        self.pending.iter_mut().find(|p| p.temp_id == temp_id)
    }

    pub fn asset(&self, media_id: &str) -> Option<&MediaAsset> {
        self.media.iter().find(|m| m.id == media_id)
    }

    pub fn primary(&self) -> Option<&MediaAsset> {
        self.media.iter().find(|m| m.is_primary)
    }

    /// Replace the local copy of `asset`, keeping the collection sorted.
    fn apply_record(&mut self, asset: MediaAsset) {
        match self.media.iter_mut().find(|m| m.id == asset.id) {
            Some(existing) => *existing = asset,
            None => self.media.push(asset),
        }
        ordering::sort_by_order(&mut self.media);
    }
}

struct Inner {
    client: MediaClient,
    exercise_id: ExerciseId,
    state: watch::Sender<MediaSnapshot>,
    notifier: Arc<dyn Notifier>,
    previews: Arc<dyn PreviewStore>,
    config: ControllerConfig,
    refresher: Debouncer,
    reloads: Mutex<Vec<JoinHandle<()>>>,
    /// Forms of uploads that failed, kept for a user-initiated retry.
    forms: Mutex<HashMap<Uuid, UploadForm>>,
    closed: AtomicBool,
}

impl Inner {
    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.refresher.cancel();
        let mut reloads = self.reloads.lock().unwrap_or_else(|e| e.into_inner());
        for handle in reloads.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Media collection of one exercise with optimistic edits and debounced refresh.
///
/// Clones share state. Background work (the debounced refresh and the
/// staggered reloads after an upload) holds only a weak reference, so
/// dropping the last clone cancels it just like [`MediaStateController::teardown`].
#[derive(Clone)]
pub struct MediaStateController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MediaStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStateController")
            .field("exercise_id", &self.inner.exercise_id)
            .field("closed", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

impl MediaStateController {
    pub fn new(
        client: MediaClient,
        exercise_id: impl Into<ExerciseId>,
        mut initial_media: Vec<MediaAsset>,
        notifier: Arc<dyn Notifier>,
        previews: Arc<dyn PreviewStore>,
        config: ControllerConfig,
    ) -> Self {
        let exercise_id = exercise_id.into();
        ordering::sort_by_order(&mut initial_media);
        let (state, _) = watch::channel(MediaSnapshot {
            exercise_id: exercise_id.clone(),
            media: initial_media,
            ..MediaSnapshot::default()
        });

        Self {
            inner: Arc::new(Inner {
                client,
                exercise_id,
                state,
                notifier,
                previews,
                refresher: Debouncer::new(config.refresh_debounce),
                config,
                reloads: Mutex::new(Vec::new()),
                forms: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Controller that logs its notices and keeps previews in memory.
    pub fn with_defaults(
        client: MediaClient,
        exercise_id: impl Into<ExerciseId>,
        initial_media: Vec<MediaAsset>,
    ) -> Self {
        Self::new(
            client,
            exercise_id,
            initial_media,
            Arc::new(TracingNotifier),
            Arc::new(InMemoryPreviewStore::new()),
            ControllerConfig::default(),
        )
    }

    pub fn exercise_id(&self) -> &str {
        &self.inner.exercise_id
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> MediaSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Cancel the pending refresh and reloads; later results no longer touch state.
    ///
    /// Requests already in flight are left to finish.
    pub fn teardown(&self) {
        if !self.is_torn_down() {
            tracing::debug!(exercise_id = %self.inner.exercise_id, "Tearing down media controller");
        }
        self.inner.shutdown();
    }

    fn update<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut MediaSnapshot),
    {
        if self.is_torn_down() {
            tracing::debug!(exercise_id = %self.inner.exercise_id, "Ignoring state update after teardown");
            return false;
        }
        self.inner.state.send_modify(modify);
        true
    }

    fn forms(&self) -> MutexGuard<'_, HashMap<Uuid, UploadForm>> {
        self.inner.forms.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify_success(&self, message: &str) {
        if !self.is_torn_down() {
            self.inner.notifier.success(message);
        }
    }

    fn report_error(&self, action: &str, err: &MediaError) {
        let exercise_id = &self.inner.exercise_id;
        let code = err.error_code();
        match err.log_level() {
            LogLevel::Debug => {
                tracing::debug!(exercise_id = %exercise_id, error = %err, code = code, "{}", action);
            }
            LogLevel::Warn => {
                tracing::warn!(exercise_id = %exercise_id, error = %err, code = code, "{}", action);
            }
            LogLevel::Error => {
                tracing::error!(exercise_id = %exercise_id, error = %err, code = code, "{}", action);
            }
        }
        if !self.is_torn_down() {
            self.inner.notifier.error(&err.client_message());
        }
    }

    fn invalidate(&self) {
        self.inner.client.cache().invalidate(&self.inner.exercise_id);
    }

    /// Read the media list now, replacing the local collection.
    pub async fn fetch_media(&self) -> MediaResult<Vec<MediaAsset>> {
        self.update(|s| s.loading = true);
        match self.inner.client.list(&self.inner.exercise_id).await {
            Ok(mut media) => {
                ordering::sort_by_order(&mut media);
                self.update(|s| {
                    s.media = media.clone();
                    s.loading = false;
                });
                Ok(media)
            }
            Err(err) => {
                self.update(|s| s.loading = false);
                self.report_error("Failed to load media", &err);
                Err(err)
            }
        }
    }

    /// Schedule a list read after the debounce interval; repeated calls coalesce.
    pub fn refresh(&self) {
        if self.is_torn_down() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.refresher.trigger(move || async move {
            if let Some(inner) = weak.upgrade() {
                let controller = MediaStateController { inner };
                controller.fetch_media().await.ok();
            }
        });
    }

    pub async fn load_stats(&self) -> MediaResult<MediaStats> {
        match self.inner.client.get_stats(&self.inner.exercise_id).await {
            Ok(stats) => {
                self.update(|s| s.stats = Some(stats.clone()));
                Ok(stats)
            }
            Err(err) => {
                self.report_error("Failed to load media stats", &err);
                Err(err)
            }
        }
    }

    pub async fn load_completeness(&self) -> MediaResult<CompletenessCheck> {
        match self
            .inner
            .client
            .check_completeness(&self.inner.exercise_id)
            .await
        {
            Ok(check) => {
                self.update(|s| s.completeness = Some(check.clone()));
                Ok(check)
            }
            Err(err) => {
                self.report_error("Failed to load media completeness", &err);
                Err(err)
            }
        }
    }

    /// Provisional completeness of the local collection; the server value wins on reload.
    pub fn local_completeness(&self) -> CompletenessCheck {
        completeness::evaluate(&self.inner.state.borrow().media)
    }

    pub fn local_stats(&self) -> MediaStats {
        MediaStats::from_assets(&self.inner.state.borrow().media)
    }

    fn spawn_delayed<F, Fut>(&self, delay: Duration, action: F)
    where
        F: FnOnce(MediaStateController) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                action(MediaStateController { inner }).await;
            }
        });

        let mut reloads = self.inner.reloads.lock().unwrap_or_else(|e| e.into_inner());
        reloads.retain(|h| !h.is_finished());
        reloads.push(handle);
    }

    fn schedule_reloads(&self) {
        if self.is_torn_down() {
            return;
        }
        self.spawn_delayed(self.inner.config.stats_reload_delay, |c| async move {
            c.load_stats().await.ok();
        });
        self.spawn_delayed(self.inner.config.completeness_reload_delay, |c| async move {
            c.load_completeness().await.ok();
        });
    }

    /// Validate and upload one file, projecting it as pending until it resolves.
    ///
    /// A failed upload stays visible with status `error`; see
    /// [`MediaStateController::retry_upload`] and
    /// [`MediaStateController::dismiss_upload`].
    pub async fn upload(&self, form: UploadForm) -> MediaResult<MediaAsset> {
        let checked = if form.exercise_id != self.inner.exercise_id {
            Err(MediaError::Validation(format!(
                "Upload targets exercise {} but this view manages {}",
                form.exercise_id, self.inner.exercise_id
            )))
        } else {
            validation::validate_upload(&form, &self.inner.config.upload_limits)
        };
        if let Err(err) = checked {
            self.report_error("Upload rejected", &err);
            return Err(err);
        }

        let pending = PendingUpload::new(&form, self.inner.previews.create(&form.file));
        let temp_id = pending.temp_id;
        let preview_url = pending.preview_url.clone();
        if !self.update(|s| s.pending.push(pending)) {
            self.inner.previews.revoke(&preview_url);
            return Err(MediaError::Validation(
                "Media view has been closed".to_string(),
            ));
        }

        self.forms().insert(temp_id, form.clone());
        self.run_upload(temp_id, form).await
    }

    /// Upload a failed projection again with the form it was created from.
    pub async fn retry_upload(&self, temp_id: Uuid) -> MediaResult<MediaAsset> {
        let failed = self
            .inner
            .state
            .borrow()
            .pending_upload(temp_id)
            .map(|p| p.status == UploadStatus::Error)
            .unwrap_or(false);
        let form = self.forms().get(&temp_id).cloned();

        let form = match form {
            Some(form) if failed => form,
            _ => {
                return Err(MediaError::Validation(format!(
                    "No failed upload {} to retry",
                    temp_id
                )))
            }
        };

        self.update(|s| {
            if let Some(p) = s.pending_mut(temp_id) {
                p.restart();
            }
        });
        self.run_upload(temp_id, form).await
    }

    /// Remove a failed projection and release its preview. Returns false if there was none.
    pub fn dismiss_upload(&self, temp_id: Uuid) -> bool {
        let preview_url = self
            .inner
            .state
            .borrow()
            .pending_upload(temp_id)
            .filter(|p| p.status == UploadStatus::Error)
            .map(|p| p.preview_url.clone());
        let Some(preview_url) = preview_url else {
            return false;
        };

        self.update(|s| s.pending.retain(|p| p.temp_id != temp_id));
        self.inner.previews.revoke(&preview_url);
        self.forms().remove(&temp_id);
        true
    }

    async fn run_upload(&self, temp_id: Uuid, form: UploadForm) -> MediaResult<MediaAsset> {
        let handle = self.inner.client.start_upload(form);
        let mut progress = handle.progress();
        let wait = handle.wait();
        tokio::pin!(wait);

        let outcome = loop {
            tokio::select! {
                result = &mut wait => break result,
                changed = progress.changed() => match changed {
                    Ok(()) => {
                        let percent = *progress.borrow_and_update();
                        self.update(|s| {
                            if let Some(p) = s.pending_mut(temp_id) {
                                p.set_progress(percent);
                            }
                        });
                    }
                    // The upload task has finished and dropped its reporter.
                    Err(_) => break (&mut wait).await,
                },
            }
        };

        match outcome {
            Ok(asset) => Ok(self.finish_upload(temp_id, asset)),
            Err(err) => {
                self.update(|s| {
                    if let Some(p) = s.pending_mut(temp_id) {
                        p.mark_error(err.client_message());
                    }
                });
                self.report_error("Upload failed", &err);
                Err(err)
            }
        }
    }

    fn finish_upload(&self, temp_id: Uuid, asset: MediaAsset) -> MediaAsset {
        let preview_url = self
            .inner
            .state
            .borrow()
            .pending_upload(temp_id)
            .map(|p| p.preview_url.clone());

        self.update(|s| {
            if let Some(p) = s.pending_mut(temp_id) {
                p.mark_success(asset.id.clone());
            }
        });
        if let Some(url) = preview_url {
            self.inner.previews.revoke(&url);
        }
        self.forms().remove(&temp_id);

        self.update(|s| {
            s.pending.retain(|p| p.temp_id != temp_id);
            s.apply_record(asset.clone());
        });
        tracing::info!(
            exercise_id = %self.inner.exercise_id,
            media_id = %asset.id,
            "Upload added to media"
        );

        self.invalidate();
        self.notify_success("Media uploaded");
        self.refresh();
        self.schedule_reloads();
        asset
    }

    pub async fn delete(&self, media_id: &str) -> MediaResult<()> {
        match self.inner.client.delete(media_id).await {
            Ok(()) => {
                self.invalidate();
                self.update(|s| s.media.retain(|m| m.id != media_id));
                self.notify_success("Media deleted");
                self.refresh();
                Ok(())
            }
            Err(err) => {
                self.report_error("Failed to delete media", &err);
                Err(err)
            }
        }
    }

    /// Mark `media_id` primary locally, then on the server. A failure is not rolled back.
    pub async fn set_primary(&self, media_id: &str) -> MediaResult<()> {
        self.update(|s| {
            if s.media.iter().any(|m| m.id == media_id) {
                for m in s.media.iter_mut() {
                    m.is_primary = m.id == media_id;
                }
            }
        });

        match self.inner.client.set_primary(media_id).await {
            Ok(record) => {
                if let Some(asset) = record {
                    self.update(|s| s.apply_record(asset));
                }
                self.invalidate();
                self.notify_success("Primary media updated");
                self.refresh();
                Ok(())
            }
            Err(err) => {
                self.report_error("Failed to set primary media", &err);
                Err(err)
            }
        }
    }

    /// Change the angle locally, then on the server. A failure is not rolled back.
    pub async fn update_view_angle(&self, media_id: &str, angle: ViewAngle) -> MediaResult<()> {
        self.update(|s| {
            if let Some(m) = s.media.iter_mut().find(|m| m.id == media_id) {
                m.view_angle = angle;
            }
        });

        match self.inner.client.update_view_angle(media_id, angle).await {
            Ok(record) => {
                if let Some(asset) = record {
                    self.update(|s| s.apply_record(asset));
                }
                self.invalidate();
                self.notify_success("View angle updated");
                self.refresh();
                Ok(())
            }
            Err(err) => {
                self.report_error("Failed to update view angle", &err);
                Err(err)
            }
        }
    }

    /// Apply a complete new sequence of media ids.
    ///
    /// Orders become 1..N in sequence position and the full mapping is
    /// submitted. If the request fails the previous order values are put back;
    /// records that arrived while the request was in flight are kept.
    pub async fn reorder(&self, sequence: &[MediaId]) -> MediaResult<()> {
        let current = self.snapshot().media;
        let mut reordered = match ordering::arrange(&current, sequence) {
            Ok(reordered) => reordered,
            Err(err) => {
                self.report_error("Reorder rejected", &err);
                return Err(err);
            }
        };
        let previous: HashMap<MediaId, i32> =
            current.into_iter().map(|m| (m.id, m.order)).collect();

        let order = ordering::assign_sequential_order(&mut reordered);
        self.update(|s| s.media = reordered);

        match self.inner.client.reorder(&self.inner.exercise_id, &order).await {
            Ok(()) => {
                self.notify_success("Media order saved");
                Ok(())
            }
            Err(err) => {
                self.update(|s| {
                    for m in s.media.iter_mut() {
                        if let Some(order) = previous.get(&m.id) {
                            m.order = *order;
                        }
                    }
                    ordering::sort_by_order(&mut s.media);
                });
                self.report_error("Failed to save media order", &err);
                Err(err)
            }
        }
    }

    /// Drag-and-drop helper: move the item at `from` to `to`, then [`reorder`](Self::reorder).
    pub async fn move_media(&self, from: usize, to: usize) -> MediaResult<()> {
        let mut ids: Vec<MediaId> = self.snapshot().media.into_iter().map(|m| m.id).collect();
        if !ordering::move_item(&mut ids, from, to) {
            return Err(MediaError::Validation(format!(
                "Cannot move media from position {} to {}",
                from, to
            )));
        }
        self.reorder(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use fitcms_api_client::testing::{FakeMediaServer, Method};
    use fitcms_api_client::{RequestGate, ResponseCache, RetryPolicy};
    use fitcms_core::{LocalFile, MediaType};

    struct Harness {
        server: Arc<FakeMediaServer>,
        notifier: Arc<RecordingNotifier>,
        previews: Arc<InMemoryPreviewStore>,
        controller: MediaStateController,
    }

    fn asset(id: &str, order: i32, angle: ViewAngle, is_primary: bool) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            exercise_id: "ex1".to_string(),
            media_type: MediaType::Image,
            view_angle: angle,
            url: format!("https://cdn.test/{}.png", id),
            urls: None,
            is_primary,
            order,
            duration: None,
            format: Some("png".to_string()),
            title: None,
            file_size: Some(1024),
        }
    }

    fn harness(seed: Vec<MediaAsset>) -> Harness {
        harness_on(FakeMediaServer::new(), seed)
    }

    fn harness_on(server: FakeMediaServer, seed: Vec<MediaAsset>) -> Harness {
        let server = Arc::new(server);
        for a in seed {
            server.seed(a);
        }
        let client = MediaClient::new(
            server.clone(),
            Arc::new(RequestGate::new(2)),
            Arc::new(ResponseCache::default()),
            RetryPolicy::default(),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let previews = Arc::new(InMemoryPreviewStore::new());
        let controller = MediaStateController::new(
            client,
            "ex1",
            server.media_of("ex1"),
            notifier.clone(),
            previews.clone(),
            ControllerConfig::default(),
        );
        Harness {
            server,
            notifier,
            previews,
            controller,
        }
    }

    fn image_form(name: &str, angle: ViewAngle) -> UploadForm {
        UploadForm::new(
            "ex1",
            angle,
            MediaType::Image,
            LocalFile::new(name, vec![1; 2048]),
        )
    }

    fn abc() -> Vec<MediaAsset> {
        vec![
            asset("a", 1, ViewAngle::Front, true),
            asset("b", 2, ViewAngle::Side, false),
            asset("c", 3, ViewAngle::Rear, false),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_success_replaces_projection() {
        let h = harness(Vec::new());

        let uploaded = h
            .controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap();

        let snapshot = h.controller.snapshot();
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.media, vec![uploaded.clone()]);
        assert!(uploaded.is_primary);
        assert_eq!(h.previews.live_count(), 0);
        assert_eq!(h.notifier.notices()[0].level, NoticeLevel::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_stays_visible_until_retried() {
        let h = harness(Vec::new());
        h.server.fail_next(
            Method::Post,
            MediaError::from_status(500, Some("Storage unavailable".to_string())),
        );

        let err = h
            .controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.pending.len(), 1);
        let failed = &snapshot.pending[0];
        assert_eq!(failed.status, UploadStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("Storage unavailable"));
        assert!(h.previews.is_live(&failed.preview_url));
        assert_eq!(h.notifier.errors(), vec!["Storage unavailable".to_string()]);

        let asset = h.controller.retry_upload(failed.temp_id).await.unwrap();
        let snapshot = h.controller.snapshot();
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.media[0].id, asset.id);
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_failed_upload_revokes_preview() {
        let h = harness(Vec::new());
        h.server
            .fail_next(Method::Post, MediaError::Network("connection reset".to_string()));

        h.controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap_err();
        let temp_id = h.controller.snapshot().pending[0].temp_id;

        assert!(h.controller.dismiss_upload(temp_id));
        assert!(h.controller.snapshot().pending.is_empty());
        assert_eq!(h.previews.live_count(), 0);
        assert!(!h.controller.dismiss_upload(temp_id));
        assert!(h.controller.retry_upload(temp_id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_upload_never_reaches_the_network() {
        let h = harness(Vec::new());
        let form = UploadForm::new(
            "ex1",
            ViewAngle::Front,
            MediaType::Video,
            LocalFile::new("front.png", vec![1; 16]),
        );

        let err = h.controller.upload(form).await.unwrap_err();

        assert!(matches!(err, MediaError::Validation(_)));
        assert!(h.controller.snapshot().pending.is_empty());
        assert_eq!(h.server.call_count(Method::Post, "/exercises/media"), 0);
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_schedules_staggered_reloads() {
        let h = harness(Vec::new());
        h.controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        let snapshot = h.controller.snapshot();
        assert_eq!(h.server.call_count(Method::Get, "/exercises/ex1/media"), 1);
        assert_eq!(snapshot.stats.as_ref().map(|s| s.total), Some(1));
        assert!(snapshot.completeness.is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let check = h.controller.snapshot().completeness.unwrap();
        assert_eq!(
            check.missing_angles,
            vec![ViewAngle::Side, ViewAngle::Rear, ViewAngle::Angle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_angle_edit_burst_refreshes_once() {
        let h = harness(abc());

        h.controller
            .update_view_angle("a", ViewAngle::Angle)
            .await
            .unwrap();
        h.controller
            .update_view_angle("b", ViewAngle::Front)
            .await
            .unwrap();
        h.controller
            .update_view_angle("c", ViewAngle::Side)
            .await
            .unwrap();
        assert_eq!(h.server.call_count(Method::Get, "/exercises/ex1/media"), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.server.call_count(Method::Get, "/exercises/ex1/media"), 1);
        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.asset("a").unwrap().view_angle, ViewAngle::Angle);
        assert_eq!(snapshot.asset("c").unwrap().view_angle, ViewAngle::Side);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_set_primary_keeps_optimistic_state() {
        let h = harness(abc());
        h.server
            .fail_next(Method::Put, MediaError::from_status(500, None));

        assert!(h.controller.set_primary("b").await.is_err());

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.primary().map(|m| m.id.as_str()), Some("b"));
        assert_eq!(
            h.notifier.errors(),
            vec![fitcms_core::GENERIC_ERROR_MESSAGE.to_string()]
        );

        h.controller.fetch_media().await.unwrap();
        assert_eq!(
            h.controller.snapshot().primary().map(|m| m.id.as_str()),
            Some("a")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_assigns_sequential_orders() {
        let h = harness(abc());
        let sequence = vec!["c".to_string(), "a".to_string(), "b".to_string()];

        h.controller.reorder(&sequence).await.unwrap();

        let orders: Vec<(String, i32)> = h
            .controller
            .snapshot()
            .media
            .into_iter()
            .map(|m| (m.id, m.order))
            .collect();
        assert_eq!(
            orders,
            vec![
                ("c".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 3)
            ]
        );
        let server_ids: Vec<String> = h.server.media_of("ex1").into_iter().map(|m| m.id).collect();
        assert_eq!(server_ids, sequence);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reorder_restores_previous_order() {
        let h = harness(abc());
        let before = h.controller.snapshot().media;
        h.server.fail_next(
            Method::Put,
            MediaError::from_status(400, Some("Invalid order".to_string())),
        );

        let err = h.controller.move_media(2, 0).await.unwrap_err();

        assert_eq!(err.server_message(), Some("Invalid order"));
        assert_eq!(h.controller.snapshot().media, before);
        assert_eq!(h.notifier.errors(), vec!["Invalid order".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_reorder_is_rejected_locally() {
        let h = harness(abc());

        let partial = vec!["c".to_string(), "a".to_string()];
        assert!(h.controller.reorder(&partial).await.is_err());
        let duplicated = vec!["c".to_string(), "c".to_string(), "a".to_string()];
        assert!(h.controller.reorder(&duplicated).await.is_err());

        assert_eq!(h.server.call_count(Method::Put, "/exercises/ex1/media/order"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_projection_starts_at_zero_and_only_moves_forward() {
        let h = harness_on(
            FakeMediaServer::new().with_latency(Duration::from_millis(50)),
            Vec::new(),
        );
        h.server
            .fail_next(Method::Post, MediaError::from_status(500, None));

        let mut rx = h.controller.subscribe();
        let recorder = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let pending = rx.borrow_and_update().pending.first().cloned();
                if let Some(p) = pending {
                    seen.push((p.status, p.progress));
                    if p.status == UploadStatus::Error {
                        break;
                    }
                }
            }
            seen
        });

        h.controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap_err();
        let seen = tokio::time::timeout(Duration::from_secs(1), recorder)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(seen.first(), Some(&(UploadStatus::Uploading, 0)));
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(seen
            .iter()
            .any(|(status, progress)| *status == UploadStatus::Uploading && *progress > 0));
        assert_eq!(seen.last().map(|(status, _)| *status), Some(UploadStatus::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reorder_keeps_upload_that_landed_meanwhile() {
        let h = harness_on(
            FakeMediaServer::new().with_latency(Duration::from_millis(50)),
            abc(),
        );
        let sequence = vec!["c".to_string(), "a".to_string(), "b".to_string()];

        let reorder = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.controller.reorder(&sequence).await
        };
        let upload = h.controller.upload(image_form("side.png", ViewAngle::Side));
        let (reordered, uploaded) = tokio::join!(reorder, upload);

        // The server saw the new asset before the order arrived, so the order is incomplete.
        assert_eq!(reordered.unwrap_err().status(), Some(400));
        let uploaded = uploaded.unwrap();

        let ids: Vec<String> = h.controller.snapshot().media.into_iter().map(|m| m.id).collect();
        assert_eq!(
            ids,
            vec!["a".to_string(), "b".to_string(), "c".to_string(), uploaded.id]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_without_exercise_still_refreshes_fresh_list() {
        let h = harness(abc());
        h.server.set_name_exercise_in_mutations(false);

        h.controller.fetch_media().await.unwrap();
        h.controller.delete("b").await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(h.server.call_count(Method::Get, "/exercises/ex1/media"), 2);
        let snapshot = h.controller.snapshot();
        assert!(snapshot.asset("b").is_none());
        let orders: Vec<i32> = snapshot.media.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_locally_then_refreshes() {
        let h = harness(abc());

        h.controller.delete("b").await.unwrap();
        assert!(h.controller.snapshot().asset("b").is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let orders: Vec<i32> = h.controller.snapshot().media.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_refresh() {
        let h = harness(abc());

        h.controller.refresh();
        h.controller.teardown();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.server.call_count(Method::Get, "/exercises/ex1/media"), 0);
        assert!(h.controller.is_torn_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_cancels_background_work() {
        let h = harness(Vec::new());
        h.controller
            .upload(image_form("front.png", ViewAngle::Front))
            .await
            .unwrap();

        let Harness { server, controller, .. } = h;
        drop(controller);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(server.call_count(Method::Get, "/exercises/ex1/media"), 0);
        assert_eq!(server.call_count(Method::Get, "/exercises/ex1/media/stats"), 0);
        assert_eq!(server.call_count(Method::Get, "/exercises/ex1/media/completeness"), 0);
    }

    #[test]
    fn test_local_derivations_follow_collection() {
        let h = harness(abc());

        let check = h.controller.local_completeness();
        assert_eq!(check.missing_angles, vec![ViewAngle::Angle]);
        assert_eq!(h.controller.local_stats().total, 3);
    }
}
