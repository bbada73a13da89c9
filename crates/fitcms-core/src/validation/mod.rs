//! Local pre-submission checks for uploads.
//!
//! Failures here are reported as `MediaError::Validation` and never reach the network.

use validator::Validate;

use crate::config::UploadLimits;
use crate::error::{MediaError, MediaResult};
use crate::models::{MediaType, UploadForm};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];
pub const SVG_EXTENSIONS: &[&str] = &["svg"];

pub fn allowed_extensions(media_type: MediaType) -> &'static [&'static str] {
    match media_type {
        MediaType::Image => IMAGE_EXTENSIONS,
        MediaType::Video => VIDEO_EXTENSIONS,
        MediaType::Svg => SVG_EXTENSIONS,
    }
}

fn content_type_matches(media_type: MediaType, content_type: &str) -> bool {
    let content_type = content_type.to_lowercase();
    match media_type {
        MediaType::Svg => content_type == "image/svg+xml",
        MediaType::Image => content_type.starts_with("image/") && content_type != "image/svg+xml",
        MediaType::Video => content_type.starts_with("video/"),
    }
}

/// Validate an upload form against field rules, type consistency and size ceilings.
pub fn validate_upload(form: &UploadForm, limits: &UploadLimits) -> MediaResult<()> {
    form.validate()?;

    if form.file.is_empty() {
        return Err(MediaError::Validation(format!(
            "File {} is empty",
            form.file.file_name
        )));
    }

    let extension = form.file.extension().unwrap_or_default();
    if !allowed_extensions(form.media_type).contains(&extension.as_str()) {
        return Err(MediaError::Validation(format!(
            "File {} is not a valid {} (allowed: {})",
            form.file.file_name,
            form.media_type,
            allowed_extensions(form.media_type).join(", ")
        )));
    }

    if let Some(content_type) = form.file.content_type.as_deref() {
        if !content_type_matches(form.media_type, content_type) {
            return Err(MediaError::Validation(format!(
                "Content type {} does not match media type {}",
                content_type, form.media_type
            )));
        }
    }

    let max_bytes = limits.max_bytes(form.media_type);
    if form.file.len() > max_bytes {
        return Err(MediaError::Validation(format!(
            "File {} is too large: {} bytes exceeds the {} limit of {} bytes",
            form.file.file_name,
            form.file.len(),
            form.media_type,
            max_bytes
        )));
    }

    Ok(())
}
