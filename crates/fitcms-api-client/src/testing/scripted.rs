use async_trait::async_trait;
use fitcms_core::{MediaError, MediaResult, UploadForm};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{form_fields, Method, RecordedCall};
use crate::transport::{ProgressReporter, Transport};

type Route = (Method, String);

/// Replays scripted responses in order; the last response of a route repeats.
///
/// Routes without a script answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<Route, VecDeque<MediaResult<Value>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, method: Method, path: &str, response: MediaResult<Value>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn respond(&self, method: Method, path: &str, body: Option<Value>) -> MediaResult<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(MediaError::from_status(404, None))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(MediaError::from_status(404, None))),
            None => Err(MediaError::from_status(
                404,
                Some(format!("No scripted response for {:?} {}", method, path)),
            )),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> MediaResult<Value> {
        self.respond(Method::Get, path, None)
    }

    async fn put_json(&self, path: &str, body: Value) -> MediaResult<Value> {
        self.respond(Method::Put, path, Some(body))
    }

    async fn delete(&self, path: &str) -> MediaResult<Value> {
        self.respond(Method::Delete, path, None)
    }

    async fn post_multipart(
        &self,
        path: &str,
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<Value> {
        let total = form.file.len() as u64;
        progress.report(total / 2, total);
        let response = self.respond(Method::Post, path, Some(form_fields(form)));
        if response.is_ok() {
            progress.report(total, total);
        }
        response
    }
}
