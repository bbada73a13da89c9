//! Helpers shared by the `fitcms` binary: output formatting and local file loading.

use anyhow::Context;
use fitcms_core::{CompletenessCheck, LocalFile, MediaAsset, MediaStats, MediaType, ViewAngle};
use std::path::Path;

/// Output format of every command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Content type for a local file, from its extension.
pub fn guess_content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Media type implied by a file extension, used when `--type` is omitted.
pub fn infer_media_type(extension: &str) -> Option<MediaType> {
    MediaType::ALL.into_iter().find(|t| {
        fitcms_core::validation::allowed_extensions(*t).contains(&extension)
    })
}

pub fn read_local_file(path: &Path) -> anyhow::Result<LocalFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .with_context(|| format!("{} has no usable file name", path.display()))?;

    let file = LocalFile::new(file_name, bytes);
    let content_type = file.extension().as_deref().and_then(guess_content_type);
    Ok(match content_type {
        Some(content_type) => file.with_content_type(content_type),
        None => file,
    })
}

pub fn format_media_table(exercise_id: &str, media: &[MediaAsset]) -> String {
    let mut out = format!("\n=== Media of exercise {} ===\n\n", exercise_id);
    if media.is_empty() {
        out.push_str("No media found.\n");
        return out;
    }

    out.push_str(&format!(
        "{:<5} {:<24} {:<6} {:<6} {:<7} {:>10}  {}\n",
        "Order", "ID", "Type", "Angle", "Primary", "Size (KB)", "URL"
    ));
    out.push_str(&format!("{}\n", "-".repeat(110)));
    for asset in media {
        let size = asset
            .file_size
            .map(|b| format!("{:.1}", b as f64 / 1024.0))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<5} {:<24} {:<6} {:<6} {:<7} {:>10}  {}\n",
            asset.order,
            truncate_string(&asset.id, 24),
            asset.media_type,
            asset.view_angle,
            if asset.is_primary { "yes" } else { "" },
            size,
            truncate_string(asset.display_url(), 50),
        ));
    }
    out
}

pub fn format_stats(stats: &MediaStats) -> String {
    let mut out = String::from("\n=== Media Statistics ===\n\n");
    out.push_str(&format!("Total Media: {}\n", stats.total));
    out.push_str(&format!(
        "Total Size: {:.2} MB\n",
        stats.total_size as f64 / (1024.0 * 1024.0)
    ));
    out.push_str(&format!("Total Video Duration: {:.1} s\n", stats.total_duration));

    out.push_str("\n--- By Type ---\n");
    for media_type in MediaType::ALL {
        out.push_str(&format!(
            "{:<8} {}\n",
            media_type,
            stats.count_for_type(media_type)
        ));
    }

    out.push_str("\n--- By View Angle ---\n");
    for angle in ViewAngle::ALL {
        out.push_str(&format!("{:<8} {}\n", angle, stats.count_for_angle(angle)));
    }
    out
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn format_completeness(check: &CompletenessCheck) -> String {
    let mut out = String::from("\n=== Completeness ===\n\n");
    out.push_str(&format!(
        "Complete: {}\n",
        if check.is_complete { "yes" } else { "no" }
    ));
    out.push_str(&format!(
        "Missing angles: {}\n",
        join_display(&check.missing_angles)
    ));
    out.push_str(&format!(
        "Missing types: {}\n",
        join_display(&check.missing_types)
    ));
    if !check.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for recommendation in &check.recommendations {
            out.push_str(&format!("  - {}\n", recommendation));
        }
    }
    out
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
