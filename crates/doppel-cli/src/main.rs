use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use doppel_api::{ApiConfig, SwapClient};
use doppel_core::api::SwapApi;
use doppel_core::types::{FeatureKind, MediaType, UsageData};
use doppel_core::upload::FileCandidate;
use doppel_flow::{FlowState, Orchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "doppel", about = "Doppel face-swap CLI — match your face with history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match your selfie with the best-fitting historical figure
    Swap {
        /// Path to a selfie (JPG, PNG, or WebP, up to 10MB)
        image: PathBuf,
    },
    /// Swap with a random historical figure instead of the best fit
    Randomize {
        /// Path to a selfie (JPG, PNG, or WebP, up to 10MB)
        image: PathBuf,
    },
    /// Show remaining quota for the current session
    Usage,
    /// Look up an earlier transformation by id
    Status {
        id: u64,
    },
    /// Check whether the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = SwapClient::new(&ApiConfig::from_env())?;

    match cli.command {
        Commands::Swap { image } => run_flow(client, &image, FeatureKind::Match).await,
        Commands::Randomize { image } => run_flow(client, &image, FeatureKind::Randomize).await,
        Commands::Usage => {
            print_usage(&client.get_usage_status().await?);
            Ok(())
        }
        Commands::Status { id } => {
            let result = client.get_status(id).await?;
            println!("#{}: {} (score {:.2})", result.id, result.match_name, result.match_score);
            println!("  {}", result.output_image_url);
            Ok(())
        }
        Commands::Health => {
            if client.health().await {
                println!("backend reachable");
                Ok(())
            } else {
                bail!("backend unreachable");
            }
        }
    }
}

/// Drive one transformation end to end: select, submit, narrate, report.
async fn run_flow(client: SwapClient, path: &Path, mode: FeatureKind) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "selfie".to_string());
    let media_type = sniff_media_type(&bytes, path);

    let mut flow = Orchestrator::new(Arc::new(client));
    flow.bootstrap().await;
    flow.select_file(FileCandidate { name, media_type, bytes })?;

    let mut events = flow.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(update) = events.recv().await {
            println!("[{:>3}%] {}", update.progress, update.message);
        }
    });

    flow.submit(mode).await;

    let state = flow.state().clone();
    let gated = flow.gate().last_feature_attempted();
    drop(flow); // closes the progress channel
    let _ = printer.await;

    match state {
        FlowState::Result(result) => {
            println!();
            println!("{}", result.message);
            println!("  match:    {} (score {:.2})", result.match_name, result.match_score);
            println!("  output:   {}", result.output_image_url);
            println!("  original: {}", result.original_selfie_url);
            println!("  figure:   {}", result.historical_figure_url);
            Ok(())
        }
        FlowState::Error(message) => bail!(message),
        _ => {
            if let Some(feature) = gated {
                bail!(
                    "You have reached your free limit for {feature}. \
                     Sign up for unlimited transformations."
                );
            }
            bail!("transformation did not complete");
        }
    }
}

fn print_usage(usage: &UsageData) {
    if usage.unlimited {
        println!("unlimited session — no quota applies");
        return;
    }
    println!("matches:    {}/{}", usage.matches_used, usage.matches_limit);
    println!("randomizes: {}/{}", usage.randomizes_used, usage.randomizes_limit);
    if usage.exhausted() {
        println!("limit reached — sign up to continue");
    }
}

/// Sniff the MIME type from the file's magic bytes, falling back to the
/// extension. Unsupported formats pass through so the upload manager can
/// reject them with its own message.
fn sniff_media_type(bytes: &[u8], path: &Path) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    path.extension()
        .and_then(|ext| MediaType::from_extension(&ext.to_string_lossy()))
        .map(|t| t.mime().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_prefers_magic_bytes() {
        // PNG signature, misleading extension
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_media_type(&png, Path::new("selfie.jpg")), "image/png");
    }

    #[test]
    fn test_sniff_falls_back_to_extension() {
        assert_eq!(
            sniff_media_type(&[0u8; 4], Path::new("selfie.webp")),
            "image/webp"
        );
    }

    #[test]
    fn test_sniff_unknown_passes_through() {
        assert_eq!(
            sniff_media_type(&[0u8; 4], Path::new("notes.txt")),
            "application/octet-stream"
        );
    }
}
