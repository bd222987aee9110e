use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_analyzer::extractors::PlatformRegistry;
use video_analyzer::pipeline::Stage;
use video_analyzer::{output, server, utils};
use video_analyzer::{Cli, Commands, Config, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "video_analyzer=debug,tower_http=debug"
    } else {
        "video_analyzer=info,tower_http=info"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            warn_missing_dependencies(&config).await;

            let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
            server::serve(&config.server, orchestrator).await?;
        }
        Commands::Analyze {
            url,
            interval,
            format,
            output,
        } => {
            warn_missing_dependencies(&config).await;

            let orchestrator = Orchestrator::from_config(&config)?;
            let interval = interval.unwrap_or(config.media.frame_interval);

            tracing::info!("Starting analysis for URL: {}", url);

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            };
            progress.set_message("Downloading video...");

            let result = orchestrator
                .analyze_observed(&url, interval, |stage| {
                    if let Some(message) = progress_message(stage) {
                        progress.set_message(message);
                    }
                })
                .await;

            let report = match result {
                Ok(report) => {
                    progress.finish_with_message("Analysis complete");
                    report
                }
                Err(e) => {
                    progress.abandon_with_message("Analysis failed");
                    return Err(e.into());
                }
            };

            match output {
                Some(path) => {
                    output::save_to_file(&report, &path, &format).await?;
                    println!("Analysis saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&report, &format)?;
                }
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            }
            if show || !init {
                config.display();
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for profile in PlatformRegistry::new().profiles() {
                let domains = if profile.domains.is_empty() {
                    "any other site yt-dlp understands".to_string()
                } else {
                    profile.domains.join(", ")
                };
                let height = profile
                    .max_height
                    .map(|h| format!("{}p", h))
                    .unwrap_or_else(|| format!("{}p", config.media.max_height));
                let cookies = if profile.needs_cookies { ", cookies recommended" } else { "" };
                println!("  • {} ({}) - up to {}{}", profile.name, domains, height, cookies);
            }
        }
    }

    Ok(())
}

/// Spinner text for the work that follows `stage`
fn progress_message(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Fetched => Some("Extracting frames..."),
        Stage::Framed => Some("Extracting audio..."),
        Stage::Audioed => Some("Transcribing audio..."),
        Stage::Transcribed => Some("Analyzing frames..."),
        Stage::VisuallyAnalyzed => Some("Writing final analysis..."),
        Stage::Synthesized => Some("Cleaning up..."),
        Stage::Received | Stage::CleanedUp | Stage::Responded => None,
    }
}

/// Missing tools are reported but not fatal
async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.media).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
