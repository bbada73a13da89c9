//! State controller for the media of one exercise.
//!
//! [`MediaStateController`] sits between [`fitcms_api_client::MediaClient`] and
//! whatever renders the media: it owns the local collection, projects
//! in-flight uploads, applies optimistic edits and coalesces refreshes.
//! Observers follow changes through a `watch` channel of [`MediaSnapshot`].

pub mod controller;
pub mod debounce;
pub mod notify;
pub mod preview;

pub use controller::{ControllerConfig, MediaSnapshot, MediaStateController};
pub use debounce::Debouncer;
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use preview::{InMemoryPreviewStore, PreviewStore};
