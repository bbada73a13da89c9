//! fitcms core library
//!
//! Domain models, error types, configuration and the pure rules (coverage,
//! stats, ordering, upload validation) shared by the media client, the state
//! controller and the CLI.

pub mod completeness;
pub mod config;
pub mod error;
pub mod models;
pub mod ordering;
pub mod validation;

// Re-export commonly used types
pub use config::{ClientConfig, UploadLimits};
pub use error::{ErrorMetadata, LogLevel, MediaError, MediaResult, GENERIC_ERROR_MESSAGE};
pub use models::{
    CompletenessCheck, ExerciseId, LocalFile, MediaAsset, MediaId, MediaStats, MediaType,
    MediaUrls, OrderUpdate, PendingUpload, UploadForm, UploadStatus, ViewAngle,
};
