//! Data models for exercise media
//!
//! Wire shapes follow the admin API: camelCase fields, upper-case enum values.

mod completeness;
mod media;
mod stats;
mod upload;

pub use completeness::CompletenessCheck;
pub use media::{ExerciseId, MediaAsset, MediaId, MediaType, MediaUrls, OrderUpdate, ViewAngle};
pub use stats::MediaStats;
pub use upload::{LocalFile, PendingUpload, UploadForm, UploadStatus};
