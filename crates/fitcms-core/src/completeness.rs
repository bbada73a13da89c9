//! Client-side coverage evaluation.
//!
//! Gives instant feedback after an upload, delete or angle change. The server
//! value returned by the completeness endpoint is authoritative and replaces
//! this one on the next fetch.

use crate::models::{CompletenessCheck, MediaAsset, MediaType, ViewAngle};

/// Media types whose absence produces a recommendation. SVG is never required.
pub const ADVISORY_TYPES: [MediaType; 2] = [MediaType::Image, MediaType::Video];

pub fn angle_recommendation(angle: ViewAngle) -> &'static str {
    match angle {
        ViewAngle::Front => "Add a front view",
        ViewAngle::Side => "Add a side view",
        ViewAngle::Rear => "Add a rear view",
        ViewAngle::Angle => "Add an angled view",
    }
}

pub fn type_recommendation(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "Add at least one image",
        MediaType::Video => "Add a video demonstrating the movement",
        MediaType::Svg => "Add an SVG illustration",
    }
}

pub const EMPTY_SET_RECOMMENDATION: &str = "Upload media for this exercise";
pub const PRIMARY_RECOMMENDATION: &str = "Select a primary media asset";

/// Evaluate angle and type coverage of a media set.
pub fn evaluate(assets: &[MediaAsset]) -> CompletenessCheck {
    let missing_angles: Vec<ViewAngle> = ViewAngle::ALL
        .into_iter()
        .filter(|angle| !assets.iter().any(|a| a.view_angle == *angle))
        .collect();

    let missing_types: Vec<MediaType> = ADVISORY_TYPES
        .into_iter()
        .filter(|t| !assets.iter().any(|a| a.media_type == *t))
        .collect();

    let mut recommendations: Vec<String> = missing_angles
        .iter()
        .map(|a| angle_recommendation(*a).to_string())
        .chain(missing_types.iter().map(|t| type_recommendation(*t).to_string()))
        .collect();

    if assets.is_empty() {
        recommendations.push(EMPTY_SET_RECOMMENDATION.to_string());
    } else if !assets.iter().any(|a| a.is_primary) {
        recommendations.push(PRIMARY_RECOMMENDATION.to_string());
    }

    CompletenessCheck {
        is_complete: missing_angles.is_empty(),
        missing_angles,
        missing_types,
        recommendations,
    }
}
