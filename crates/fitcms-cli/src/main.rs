//! fitcms CLI: command-line client for exercise media in the fitcms admin API.
//!
//! Set FITCMS_API_URL (or API_URL) and one of FITCMS_API_TOKEN (Bearer) or
//! FITCMS_API_KEY (X-API-Key). A `.env` file in the working directory is read.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fitcms_api_client::MediaClient;
use fitcms_cli::{
    format_completeness, format_media_table, format_stats, infer_media_type, init_tracing,
    read_local_file, OutputFormat,
};
use fitcms_core::{
    completeness, ordering, validation, ClientConfig, MediaStats, MediaType, UploadForm,
    ViewAngle,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fitcms", about = "Exercise media admin CLI")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the media of an exercise in display order
    List {
        exercise_id: String,
    },
    /// Upload an image, video or SVG for an exercise
    Upload {
        exercise_id: String,
        /// Path to the file to upload
        file: PathBuf,
        /// View angle: front, side, rear or angle
        #[arg(long)]
        angle: String,
        /// Media type: image, video or svg (inferred from the extension when omitted)
        #[arg(long = "type")]
        media_type: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a media item
    Delete {
        media_id: String,
    },
    /// Make a media item the primary asset of its exercise
    Primary {
        media_id: String,
    },
    /// Change the view angle of a media item
    Angle {
        media_id: String,
        /// front, side, rear or angle
        angle: String,
    },
    /// Reorder an exercise's media; list every media id in the new order
    Reorder {
        exercise_id: String,
        #[arg(required = true)]
        media_ids: Vec<String>,
    },
    /// Server-side completeness check
    Completeness {
        exercise_id: String,
    },
    /// Server-side media statistics
    Stats {
        exercise_id: String,
    },
    /// Evaluate completeness and stats locally from the listed media
    Audit {
        exercise_id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn print_done(format: OutputFormat, message: String) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "success": true, "message": message })),
        OutputFormat::Table => {
            println!("{}", message);
            Ok(())
        }
    }
}

async fn upload(
    client: &MediaClient,
    config: &ClientConfig,
    form: UploadForm,
) -> anyhow::Result<fitcms_core::MediaAsset> {
    validation::validate_upload(&form, &config.upload_limits)?;

    let file_name = form.file.file_name.clone();
    let handle = client.start_upload(form);
    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            eprint!("\rUploading {}: {:>3}%", file_name, percent);
        }
        eprintln!();
    });

    let result = handle.wait().await;
    reporter.await.ok();
    let asset = result?;
    tracing::info!(
        exercise_id = %asset.exercise_id,
        media_id = %asset.id,
        "Media uploaded"
    );
    Ok(asset)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = ClientConfig::from_env()?;
    config.validate()?;
    let client = MediaClient::from_config(&config).context(
        "Failed to create API client. Set FITCMS_API_URL and FITCMS_API_TOKEN or FITCMS_API_KEY",
    )?;
    let format = cli.format;

    match cli.command {
        Commands::List { exercise_id } => {
            let mut media = client.list(&exercise_id).await?;
            ordering::sort_by_order(&mut media);
            match format {
                OutputFormat::Json => print_json(&media)?,
                OutputFormat::Table => print!("{}", format_media_table(&exercise_id, &media)),
            }
        }
        Commands::Upload {
            exercise_id,
            file,
            angle,
            media_type,
            title,
        } => {
            let angle: ViewAngle = angle.parse()?;
            let local = read_local_file(&file)?;
            let media_type: MediaType = match media_type {
                Some(t) => t.parse()?,
                None => local
                    .extension()
                    .as_deref()
                    .and_then(infer_media_type)
                    .context("Cannot infer media type from the file name; pass --type")?,
            };

            let mut form = UploadForm::new(exercise_id, angle, media_type, local);
            if let Some(title) = title {
                form = form.with_title(title);
            }

            let asset = upload(&client, &config, form).await?;
            match format {
                OutputFormat::Json => print_json(&asset)?,
                OutputFormat::Table => {
                    print!("{}", format_media_table(&asset.exercise_id, &[asset.clone()]))
                }
            }
        }
        Commands::Delete { media_id } => {
            client.delete(&media_id).await?;
            print_done(format, format!("Media {} deleted", media_id))?;
        }
        Commands::Primary { media_id } => {
            match client.set_primary(&media_id).await? {
                Some(asset) if format == OutputFormat::Json => print_json(&asset)?,
                _ => print_done(format, format!("Media {} is now primary", media_id))?,
            }
        }
        Commands::Angle { media_id, angle } => {
            let angle: ViewAngle = angle.parse()?;
            match client.update_view_angle(&media_id, angle).await? {
                Some(asset) if format == OutputFormat::Json => print_json(&asset)?,
                _ => print_done(format, format!("Media {} view angle set to {}", media_id, angle))?,
            }
        }
        Commands::Reorder {
            exercise_id,
            media_ids,
        } => {
            let current = client.list(&exercise_id).await?;
            let mut sequence = ordering::arrange(&current, &media_ids)?;

            let order = ordering::assign_sequential_order(&mut sequence);
            tracing::debug!(exercise_id = %exercise_id, count = order.len(), "Submitting media order");
            client.reorder(&exercise_id, &order).await?;
            tracing::info!(exercise_id = %exercise_id, "Media order saved");
            match format {
                OutputFormat::Json => print_json(&order)?,
                OutputFormat::Table => print!("{}", format_media_table(&exercise_id, &sequence)),
            }
        }
        Commands::Completeness { exercise_id } => {
            let check = client.check_completeness(&exercise_id).await?;
            match format {
                OutputFormat::Json => print_json(&check)?,
                OutputFormat::Table => print!("{}", format_completeness(&check)),
            }
        }
        Commands::Stats { exercise_id } => {
            let stats = client.get_stats(&exercise_id).await?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Table => print!("{}", format_stats(&stats)),
            }
        }
        Commands::Audit { exercise_id } => {
            let media = client.list(&exercise_id).await?;
            let check = completeness::evaluate(&media);
            let stats = MediaStats::from_assets(&media);
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "exerciseId": exercise_id,
                    "completeness": check,
                    "stats": stats,
                }))?,
                OutputFormat::Table => {
                    print!("{}", format_completeness(&check));
                    print!("{}", format_stats(&stats));
                }
            }
        }
    }

    Ok(())
}
