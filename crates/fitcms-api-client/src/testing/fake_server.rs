use async_trait::async_trait;
use fitcms_core::{
    completeness, ordering, MediaAsset, MediaError, MediaResult, MediaStats, OrderUpdate,
    UploadForm, ViewAngle,
};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{form_fields, Method, RecordedCall};
use crate::transport::{ProgressReporter, Transport};

#[derive(Debug, Default)]
struct FakeState {
    media: Vec<MediaAsset>,
    next_id: u64,
    failures: VecDeque<(Method, MediaError)>,
    calls: Vec<RecordedCall>,
    in_flight: usize,
    peak_in_flight: usize,
}

/// In-memory admin API for exercise media.
///
/// Mutations keep the store consistent the way the real server does: one
/// primary per exercise (the first upload becomes primary) and contiguous
/// order values.
#[derive(Debug)]
pub struct FakeMediaServer {
    state: Mutex<FakeState>,
    latency: Duration,
    name_exercise_in_mutations: AtomicBool,
}

impl Default for FakeMediaServer {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: &str) -> MediaError {
    MediaError::from_status(404, Some(format!("{} not found", what)))
}

fn bad_request(message: &str) -> MediaError {
    MediaError::from_status(400, Some(message.to_string()))
}

fn decoded_segments(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

impl FakeMediaServer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            latency: Duration::ZERO,
            name_exercise_in_mutations: AtomicBool::new(true),
        }
    }

    /// Delay every response by `latency` (uses tokio time, so paused clocks apply).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// When false, delete/primary/angle responses omit the owning exercise.
    pub fn set_name_exercise_in_mutations(&self, enabled: bool) {
        self.name_exercise_in_mutations
            .store(enabled, Ordering::SeqCst);
    }

    /// Fail the next request with `method`.
    pub fn fail_next(&self, method: Method, error: MediaError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push_back((method, error));
    }

    pub fn seed(&self, asset: MediaAsset) {
        self.state.lock().unwrap().media.push(asset);
    }

    pub fn media_of(&self, exercise_id: &str) -> Vec<MediaAsset> {
        let mut media: Vec<MediaAsset> = self
            .state
            .lock()
            .unwrap()
            .media
            .iter()
            .filter(|m| m.exercise_id == exercise_id)
            .cloned()
            .collect();
        ordering::sort_by_order(&mut media);
        media
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().unwrap().peak_in_flight
    }

    async fn serve<F>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        handler: F,
    ) -> MediaResult<Value>
    where
        F: FnOnce(Option<Value>) -> MediaResult<Value> + Send,
    {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body: body.clone(),
            });
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            let index = state.failures.iter().position(|(m, _)| *m == method);
            index.and_then(|i| state.failures.remove(i)).map(|(_, e)| e)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = match failure {
            Some(err) => Err(err),
            None => handler(body),
        };
        self.state.lock().unwrap().in_flight -= 1;
        result
    }

    fn mutation_response(&self, asset: &MediaAsset) -> Value {
        if self.name_exercise_in_mutations.load(Ordering::SeqCst) {
            json!({ "data": asset })
        } else {
            json!({ "success": true })
        }
    }

    fn route(&self, method: Method, path: &str, body: Option<Value>) -> MediaResult<Value> {
        let segments = decoded_segments(path);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["exercises", exercise_id, "media"]) => {
                Ok(json!({ "data": { "media": self.media_of(exercise_id) } }))
            }
            (Method::Get, ["exercises", exercise_id, "media", "completeness"]) => {
                let check = completeness::evaluate(&self.media_of(exercise_id));
                Ok(json!({ "data": check }))
            }
            (Method::Get, ["exercises", exercise_id, "media", "stats"]) => {
                let stats = MediaStats::from_assets(&self.media_of(exercise_id));
                Ok(json!({ "data": stats }))
            }
            (Method::Put, ["exercises", exercise_id, "media", "order"]) => {
                let order: Vec<OrderUpdate> =
                    serde_json::from_value(body.unwrap_or(Value::Null))
                        .map_err(|_| bad_request("Order must be an array of {id, order}"))?;
                self.apply_order(exercise_id, &order)?;
                Ok(json!({ "data": { "exerciseId": exercise_id, "updated": order.len() } }))
            }
            (Method::Delete, ["exercises", "media", media_id]) => {
                let removed = self.remove(media_id)?;
                if self.name_exercise_in_mutations.load(Ordering::SeqCst) {
                    Ok(json!({ "data": { "exerciseId": removed.exercise_id } }))
                } else {
                    Ok(json!({ "success": true }))
                }
            }
            (Method::Put, ["exercises", "media", media_id, "primary"]) => {
                let asset = self.make_primary(media_id)?;
                Ok(self.mutation_response(&asset))
            }
            (Method::Put, ["exercises", "media", media_id]) => {
                let angle: ViewAngle = body
                    .as_ref()
                    .and_then(|b| b.get("viewAngle"))
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .ok_or_else(|| bad_request("viewAngle is required"))?;
                let asset = self.change_angle(media_id, angle)?;
                Ok(self.mutation_response(&asset))
            }
            _ => Err(not_found("Route")),
        }
    }

    fn create(&self, form: &UploadForm) -> MediaAsset {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("m{}", state.next_id);
        let siblings = state
            .media
            .iter()
            .filter(|m| m.exercise_id == form.exercise_id)
            .count();
        let extension = form.file.extension().unwrap_or_default();

        let asset = MediaAsset {
            id: id.clone(),
            exercise_id: form.exercise_id.clone(),
            media_type: form.media_type,
            view_angle: form.view_angle,
            url: format!("https://cdn.test/{}.{}", id, extension),
            urls: None,
            is_primary: siblings == 0,
            order: siblings as i32 + 1,
            duration: None,
            format: Some(extension),
            title: form.title.clone(),
            file_size: Some(form.file.len() as u64),
        };
        state.media.push(asset.clone());
        asset
    }

    fn remove(&self, media_id: &str) -> MediaResult<MediaAsset> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .media
            .iter()
            .position(|m| m.id == media_id)
            .ok_or_else(|| not_found("Media"))?;
        let removed = state.media.remove(index);

        let mut siblings: Vec<&mut MediaAsset> = state
            .media
            .iter_mut()
            .filter(|m| m.exercise_id == removed.exercise_id)
            .collect();
        siblings.sort_by_key(|m| m.order);
        for (i, m) in siblings.into_iter().enumerate() {
            m.order = i as i32 + 1;
        }
        Ok(removed)
    }

    fn make_primary(&self, media_id: &str) -> MediaResult<MediaAsset> {
        let mut state = self.state.lock().unwrap();
        let exercise_id = state
            .media
            .iter()
            .find(|m| m.id == media_id)
            .map(|m| m.exercise_id.clone())
            .ok_or_else(|| not_found("Media"))?;

        let mut updated = None;
        for m in state.media.iter_mut().filter(|m| m.exercise_id == exercise_id) {
            m.is_primary = m.id == media_id;
            if m.is_primary {
                updated = Some(m.clone());
            }
        }
        updated.ok_or_else(|| not_found("Media"))
    }

    fn change_angle(&self, media_id: &str, angle: ViewAngle) -> MediaResult<MediaAsset> {
        let mut state = self.state.lock().unwrap();
        let asset = state
            .media
            .iter_mut()
            .find(|m| m.id == media_id)
            .ok_or_else(|| not_found("Media"))?;
        asset.view_angle = angle;
        Ok(asset.clone())
    }

    fn apply_order(&self, exercise_id: &str, order: &[OrderUpdate]) -> MediaResult<()> {
        let mut state = self.state.lock().unwrap();
        let known: HashSet<&str> = state
            .media
            .iter()
            .filter(|m| m.exercise_id == exercise_id)
            .map(|m| m.id.as_str())
            .collect();
        let submitted: HashSet<&str> = order.iter().map(|o| o.id.as_str()).collect();
        if known != submitted || submitted.len() != order.len() {
            return Err(bad_request("Order must list every media item exactly once"));
        }

        for update in order {
            if let Some(m) = state.media.iter_mut().find(|m| m.id == update.id) {
                m.order = update.order;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeMediaServer {
    async fn get(&self, path: &str) -> MediaResult<Value> {
        self.serve(Method::Get, path, None, |body| {
            self.route(Method::Get, path, body)
        })
        .await
    }

    async fn put_json(&self, path: &str, body: Value) -> MediaResult<Value> {
        self.serve(Method::Put, path, Some(body), |body| {
            self.route(Method::Put, path, body)
        })
        .await
    }

    async fn delete(&self, path: &str) -> MediaResult<Value> {
        self.serve(Method::Delete, path, None, |body| {
            self.route(Method::Delete, path, body)
        })
        .await
    }

    async fn post_multipart(
        &self,
        path: &str,
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<Value> {
        let total = form.file.len() as u64;
        for quarter in 1..=3 {
            progress.report(total * quarter / 4, total);
        }

        let response = self
            .serve(Method::Post, path, Some(form_fields(form)), |_| {
                if decoded_segments(path) != ["exercises", "media"] {
                    return Err(not_found("Route"));
                }
                Ok(json!({ "data": self.create(form) }))
            })
            .await?;
        progress.report(total, total);
        Ok(response)
    }
}
