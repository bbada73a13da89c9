use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::media::{ExerciseId, MediaId, MediaType, ViewAngle};

/// File selected locally for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Multipart payload of `POST /exercises/media`.
#[derive(Debug, Clone, Validate)]
pub struct UploadForm {
    #[validate(length(min = 1, message = "Exercise id is required"))]
    pub exercise_id: ExerciseId,
    pub view_angle: ViewAngle,
    pub media_type: MediaType,
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,
    pub file: LocalFile,
}

impl UploadForm {
    pub fn new(
        exercise_id: impl Into<ExerciseId>,
        view_angle: ViewAngle,
        media_type: MediaType,
        file: LocalFile,
    ) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            view_angle,
            media_type,
            title: None,
            file,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Lifecycle of an in-flight upload projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Success,
    Error,
}

/// Client-only projection of an upload that has not been replaced by a server record yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    pub temp_id: Uuid,
    pub file_name: String,
    /// Local object URL used for the preview until the upload resolves.
    pub preview_url: String,
    pub view_angle: ViewAngle,
    pub media_type: MediaType,
    /// 0-100
    pub progress: u8,
    pub status: UploadStatus,
    pub media_id: Option<MediaId>,
    pub error: Option<String>,
}

impl PendingUpload {
    pub fn new(form: &UploadForm, preview_url: String) -> Self {
        Self {
            temp_id: Uuid::new_v4(),
            file_name: form.file.file_name.clone(),
            preview_url,
            view_angle: form.view_angle,
            media_type: form.media_type,
            progress: 0,
            status: UploadStatus::Uploading,
            media_id: None,
            error: None,
        }
    }

    /// Record progress; never moves backwards and never exceeds 100.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    pub fn mark_success(&mut self, media_id: MediaId) {
        self.status = UploadStatus::Success;
        self.progress = 100;
        self.media_id = Some(media_id);
        self.error = None;
    }

    pub fn mark_error(&mut self, message: String) {
        self.status = UploadStatus::Error;
        self.error = Some(message);
    }

    /// Re-enter `uploading` for a user-initiated retry.
    pub fn restart(&mut self) {
        self.status = UploadStatus::Uploading;
        self.progress = 0;
        self.error = None;
    }
}
