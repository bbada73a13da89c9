use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Opaque identifier of an exercise, as issued by the admin API.
pub type ExerciseId = String;

/// Opaque identifier of a media asset, unique within its exercise.
pub type MediaId = String;

/// Media type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
    Svg,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Image, MediaType::Video, MediaType::Svg];

    /// Name used on the wire and in multipart forms.
    pub fn as_wire(&self) -> &'static str {
        match self {
            MediaType::Image => "IMAGE",
            MediaType::Video => "VIDEO",
            MediaType::Svg => "SVG",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Image => f.pad("image"),
            MediaType::Video => f.pad("video"),
            MediaType::Svg => f.pad("svg"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "svg" => Ok(MediaType::Svg),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Camera perspective an asset was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewAngle {
    Front,
    Side,
    Rear,
    Angle,
}

impl ViewAngle {
    /// Canonical order used for coverage reporting.
    pub const ALL: [ViewAngle; 4] = [
        ViewAngle::Front,
        ViewAngle::Side,
        ViewAngle::Rear,
        ViewAngle::Angle,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            ViewAngle::Front => "FRONT",
            ViewAngle::Side => "SIDE",
            ViewAngle::Rear => "REAR",
            ViewAngle::Angle => "ANGLE",
        }
    }
}

impl Display for ViewAngle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ViewAngle::Front => f.pad("front"),
            ViewAngle::Side => f.pad("side"),
            ViewAngle::Rear => f.pad("rear"),
            ViewAngle::Angle => f.pad("angle"),
        }
    }
}

impl FromStr for ViewAngle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" => Ok(ViewAngle::Front),
            "side" => Ok(ViewAngle::Side),
            "rear" => Ok(ViewAngle::Rear),
            "angle" => Ok(ViewAngle::Angle),
            _ => Err(anyhow::anyhow!("Invalid view angle: {}", s)),
        }
    }
}

/// Derived representations of an asset produced by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullsize: Option<String>,
}

/// Server-authoritative media record owned by one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: MediaId,
    pub exercise_id: ExerciseId,
    pub media_type: MediaType,
    pub view_angle: ViewAngle,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<MediaUrls>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub order: i32,
    /// Seconds; videos only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Bytes.
    #[serde(default, alias = "size", skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl MediaAsset {
    /// URL best suited for gallery display: thumbnail, then preview, then the canonical URL.
    pub fn display_url(&self) -> &str {
        self.urls
            .as_ref()
            .and_then(|u| u.thumbnail.as_deref().or(u.preview.as_deref()))
            .unwrap_or(&self.url)
    }
}

/// One entry of a bulk reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub id: MediaId,
    pub order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_asset_deserializes_api_payload() {
        let asset: MediaAsset = serde_json::from_value(json!({
            "id": "m1",
            "exerciseId": "ex1",
            "mediaType": "VIDEO",
            "viewAngle": "SIDE",
            "url": "https://cdn.example.com/m1.mp4",
            "urls": { "thumbnail": "https://cdn.example.com/m1-thumb.jpg" },
            "isPrimary": true,
            "order": 2,
            "duration": 12.5,
            "size": 2048
        }))
        .unwrap();

        assert_eq!(asset.media_type, MediaType::Video);
        assert_eq!(asset.view_angle, ViewAngle::Side);
        assert!(asset.is_primary);
        assert_eq!(asset.order, 2);
        assert_eq!(asset.file_size, Some(2048));
        assert_eq!(asset.display_url(), "https://cdn.example.com/m1-thumb.jpg");
    }

    #[test]
    fn test_display_url_falls_back_to_canonical_url() {
        let asset: MediaAsset = serde_json::from_value(json!({
            "id": "m2",
            "exerciseId": "ex1",
            "mediaType": "IMAGE",
            "viewAngle": "FRONT",
            "url": "https://cdn.example.com/m2.png"
        }))
        .unwrap();

        assert!(!asset.is_primary);
        assert_eq!(asset.display_url(), "https://cdn.example.com/m2.png");
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("Rear".parse::<ViewAngle>().unwrap(), ViewAngle::Rear);
        assert_eq!("SVG".parse::<MediaType>().unwrap(), MediaType::Svg);
        assert!("top".parse::<ViewAngle>().is_err());
        assert_eq!(ViewAngle::Angle.to_string(), "angle");
        assert_eq!(MediaType::Video.as_wire(), "VIDEO");
    }
}
