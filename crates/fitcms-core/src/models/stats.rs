use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::media::{MediaAsset, MediaType, ViewAngle};

/// Aggregate figures over one exercise's media set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaStats {
    #[serde(alias = "totalCount")]
    pub total: u32,
    pub by_type: BTreeMap<MediaType, u32>,
    #[serde(alias = "byAngle")]
    pub by_view_angle: BTreeMap<ViewAngle, u32>,
    /// Sum of video durations in seconds.
    pub total_duration: f64,
    /// Sum of known file sizes in bytes.
    pub total_size: u64,
}

impl MediaStats {
    /// Derive stats locally; the server figures replace these on the next fetch.
    pub fn from_assets(assets: &[MediaAsset]) -> Self {
        let mut stats = MediaStats {
            total: assets.len() as u32,
            ..Default::default()
        };

        for asset in assets {
            *stats.by_type.entry(asset.media_type).or_insert(0) += 1;
            *stats.by_view_angle.entry(asset.view_angle).or_insert(0) += 1;
            if asset.media_type == MediaType::Video {
                stats.total_duration += asset.duration.unwrap_or(0.0);
            }
            stats.total_size += asset.file_size.unwrap_or(0);
        }

        stats
    }

    pub fn count_for_type(&self, media_type: MediaType) -> u32 {
        self.by_type.get(&media_type).copied().unwrap_or(0)
    }

    pub fn count_for_angle(&self, angle: ViewAngle) -> u32 {
        self.by_view_angle.get(&angle).copied().unwrap_or(0)
    }
}
