//! Exercise media operations.
//!
//! Every operation passes through the shared [`RequestGate`]. Reads (list,
//! stats, completeness) are cached per exercise and retried on rate limiting;
//! mutations are never retried and invalidate the cache of the exercise they
//! affect.

use fitcms_core::{
    ClientConfig, CompletenessCheck, ExerciseId, MediaAsset, MediaError, MediaResult,
    MediaStats, OrderUpdate, UploadForm, ViewAngle,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::ResponseCache;
use crate::gate::RequestGate;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{ProgressReporter, Transport};
use crate::ApiClient;

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

pub fn media_list_path(exercise_id: &str) -> String {
    format!("/exercises/{}/media", encode(exercise_id))
}

pub const UPLOAD_PATH: &str = "/exercises/media";

pub fn media_item_path(media_id: &str) -> String {
    format!("/exercises/media/{}", encode(media_id))
}

pub fn primary_path(media_id: &str) -> String {
    format!("{}/primary", media_item_path(media_id))
}

pub fn order_path(exercise_id: &str) -> String {
    format!("{}/order", media_list_path(exercise_id))
}

pub fn completeness_path(exercise_id: &str) -> String {
    format!("{}/completeness", media_list_path(exercise_id))
}

pub fn stats_path(exercise_id: &str) -> String {
    format!("{}/stats", media_list_path(exercise_id))
}

/// Strip the `{ "data": ... }` envelope; bodies without one are returned as-is.
fn unwrap_data(mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        if let Some(data) = map.remove("data") {
            return data;
        }
    }
    body
}

fn decode<T: DeserializeOwned>(value: Value) -> MediaResult<T> {
    serde_json::from_value(value).map_err(MediaError::from)
}

/// The list endpoint answers `{ data: { media: [...] } }`; a bare array is accepted too.
fn decode_media_list(body: Value) -> MediaResult<Vec<MediaAsset>> {
    match unwrap_data(body) {
        Value::Object(mut map) => match map.remove("media") {
            Some(media) => decode(media),
            None => Err(MediaError::Decode(
                "media list response has no `media` field".to_string(),
            )),
        },
        other => decode(other),
    }
}

/// Owning exercise named by a mutation response, if the server included it.
fn exercise_id_of(data: &Value) -> Option<ExerciseId> {
    match data.get("exerciseId")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Network operation surface for exercise media.
#[derive(Clone)]
pub struct MediaClient {
    transport: Arc<dyn Transport>,
    gate: Arc<RequestGate>,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for MediaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClient")
            .field("gate", &self.gate)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl MediaClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        gate: Arc<RequestGate>,
        cache: Arc<ResponseCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            gate,
            cache,
            retry,
        }
    }

    /// HTTP-backed client with a fresh gate and cache sized from `config`.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let api = ApiClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(api),
            Arc::new(RequestGate::new(config.max_concurrent_requests)),
            Arc::new(ResponseCache::new(config.cache_ttl())),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    async fn read(&self, path: &str) -> MediaResult<Value> {
        with_retry(&self.gate, &self.retry, || self.transport.get(path)).await
    }

    fn invalidate_from_response(&self, data: &Value, media_id: &str) {
        match exercise_id_of(data) {
            Some(exercise_id) => self.cache.invalidate(&exercise_id),
            None => tracing::debug!(
                media_id = %media_id,
                "Response does not name the owning exercise; cached reads expire with the TTL"
            ),
        }
    }

    /// Media of one exercise. Order is whatever the server returned.
    pub async fn list(&self, exercise_id: &str) -> MediaResult<Vec<MediaAsset>> {
        if let Some(media) = self.cache.get_media(exercise_id) {
            tracing::debug!(exercise_id = %exercise_id, "Media list served from cache");
            return Ok(media);
        }

        let body = self.read(&media_list_path(exercise_id)).await?;
        let media = decode_media_list(body)?;
        self.cache.set_media(exercise_id, media.clone());
        Ok(media)
    }

    /// Upload one file. Not retried: a repeated POST could create duplicates.
    pub async fn upload(
        &self,
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<MediaAsset> {
        self.cache.invalidate(&form.exercise_id);

        tracing::info!(
            exercise_id = %form.exercise_id,
            file_name = %form.file.file_name,
            size = form.file.len(),
            view_angle = %form.view_angle,
            media_type = %form.media_type,
            "Uploading exercise media"
        );

        let body = self
            .gate
            .submit(|| {
                self.transport
                    .post_multipart(UPLOAD_PATH, form, progress.clone())
            })
            .await?;
        progress.set_percent(100);

        let asset: MediaAsset = decode(unwrap_data(body))?;
        tracing::info!(media_id = %asset.id, exercise_id = %asset.exercise_id, "Upload complete");
        Ok(asset)
    }

    /// Run [`MediaClient::upload`] as a background task.
    pub fn start_upload(&self, form: UploadForm) -> UploadHandle {
        let (reporter, progress) = ProgressReporter::new();
        let client = self.clone();
        let task = tokio::spawn(async move { client.upload(&form, reporter).await });
        UploadHandle { progress, task }
    }

    pub async fn delete(&self, media_id: &str) -> MediaResult<()> {
        let path = media_item_path(media_id);
        let body = self.gate.submit(|| self.transport.delete(&path)).await?;
        self.invalidate_from_response(&unwrap_data(body), media_id);
        tracing::info!(media_id = %media_id, "Deleted exercise media");
        Ok(())
    }

    /// Make `media_id` the primary asset of its exercise. The server clears any previous primary.
    ///
    /// Returns the updated record when the response carries one.
    pub async fn set_primary(&self, media_id: &str) -> MediaResult<Option<MediaAsset>> {
        let path = primary_path(media_id);
        let body = self
            .gate
            .submit(|| self.transport.put_json(&path, json!({})))
            .await?;
        let data = unwrap_data(body);
        self.invalidate_from_response(&data, media_id);
        Ok(serde_json::from_value(data).ok())
    }

    pub async fn update_view_angle(
        &self,
        media_id: &str,
        angle: ViewAngle,
    ) -> MediaResult<Option<MediaAsset>> {
        let path = media_item_path(media_id);
        let body = self
            .gate
            .submit(|| {
                self.transport
                    .put_json(&path, json!({ "viewAngle": angle }))
            })
            .await?;
        let data = unwrap_data(body);
        self.invalidate_from_response(&data, media_id);
        Ok(serde_json::from_value(data).ok())
    }

    /// Submit the complete `{id, order}` mapping of an exercise.
    pub async fn reorder(&self, exercise_id: &str, order: &[OrderUpdate]) -> MediaResult<()> {
        self.cache.invalidate(exercise_id);

        let path = order_path(exercise_id);
        let body = serde_json::to_value(order)?;
        self.gate
            .submit(|| self.transport.put_json(&path, body))
            .await?;
        tracing::info!(exercise_id = %exercise_id, count = order.len(), "Reordered exercise media");
        Ok(())
    }

    /// Server-computed completeness; authoritative over the local evaluation.
    pub async fn check_completeness(&self, exercise_id: &str) -> MediaResult<CompletenessCheck> {
        if let Some(check) = self.cache.get_completeness(exercise_id) {
            return Ok(check);
        }

        let body = self.read(&completeness_path(exercise_id)).await?;
        let check: CompletenessCheck = decode(unwrap_data(body))?;
        self.cache.set_completeness(exercise_id, check.clone());
        Ok(check)
    }

    pub async fn get_stats(&self, exercise_id: &str) -> MediaResult<MediaStats> {
        if let Some(stats) = self.cache.get_stats(exercise_id) {
            return Ok(stats);
        }

        let body = self.read(&stats_path(exercise_id)).await?;
        let stats: MediaStats = decode(unwrap_data(body))?;
        self.cache.set_stats(exercise_id, stats.clone());
        Ok(stats)
    }
}

/// Upload running in the background.
///
/// `progress` moves monotonically from 0 to 100; `wait` yields the single
/// terminal outcome.
#[derive(Debug)]
pub struct UploadHandle {
    progress: watch::Receiver<u8>,
    task: JoinHandle<MediaResult<MediaAsset>>,
}

impl UploadHandle {
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    pub async fn wait(self) -> MediaResult<MediaAsset> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(MediaError::Network(format!("Upload task ended: {}", err))),
        }
    }
}
