//! In-memory transports for tests.
//!
//! [`ScriptedTransport`] replays canned responses per route;
//! [`FakeMediaServer`] keeps a media store and answers like the admin API.

mod fake_server;
mod scripted;

pub use fake_server::FakeMediaServer;
pub use scripted::ScriptedTransport;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

/// A request seen by a test transport. Multipart bodies are recorded as their form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

pub(crate) fn form_fields(form: &fitcms_core::UploadForm) -> Value {
    serde_json::json!({
        "exerciseId": form.exercise_id,
        "viewAngle": form.view_angle,
        "mediaType": form.media_type,
        "title": form.title,
        "fileName": form.file.file_name,
    })
}
