use serde::{Deserialize, Serialize};

use super::media::{MediaType, ViewAngle};

/// Coverage judgment over a media set. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletenessCheck {
    pub is_complete: bool,
    pub missing_angles: Vec<ViewAngle>,
    pub missing_types: Vec<MediaType>,
    pub recommendations: Vec<String>,
}
