// ReelGrab - Movie Source Browser and Download Core
// Copyright (C) 2025 ReelGrab contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use reelgrab::api::models::{downloadable_sources, group_by_dub};
use reelgrab::api::{ProviderClient, ProviderConfig};
use reelgrab::download::{
    download_subtitle, DiskSink, DownloadConfig, DownloadManager, ProgressSnapshot, TransferState,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "reelgrab-cli")]
#[command(about = "ReelGrab CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Base URL of the sources provider
    #[arg(long)]
    sources_url: String,

    /// Base URL of the subtitles provider
    #[arg(long, default_value = "")]
    subtitles_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List downloadable sources for a movie
    Sources {
        /// TMDB id of the movie
        tmdb_id: u64,
    },
    /// List available subtitles for a movie
    Subtitles {
        tmdb_id: u64,
    },
    /// Download a source
    Download {
        tmdb_id: u64,
        /// Vertical resolution to pick (e.g. 1080)
        #[arg(short, long, default_value_t = 1080)]
        quality: u32,
        /// Title used for the output file name
        #[arg(short, long)]
        title: Option<String>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Download a subtitle
    Subtitle {
        tmdb_id: u64,
        /// Language code to pick (e.g. "en")
        #[arg(short, long, default_value = "en")]
        language: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelgrab=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = ProviderClient::new(ProviderConfig {
        sources_base_url: cli.sources_url.clone(),
        subtitles_base_url: cli.subtitles_url.clone(),
        ..Default::default()
    })?;

    match cli.command {
        Commands::Sources { tmdb_id } => {
            let sources = client.movie_sources(tmdb_id).await?;
            let downloadable = downloadable_sources(sources);
            if downloadable.is_empty() {
                println!("No downloadable sources for {tmdb_id}");
                return Ok(());
            }
            for (dub, list) in group_by_dub(&downloadable) {
                println!("DUB: {dub}");
                for src in list {
                    println!(
                        "  {}P  {}  {}",
                        src.quality,
                        ProgressSnapshot::bytes_string(src.size_bytes),
                        src.url
                    );
                }
            }
        }

        Commands::Subtitles { tmdb_id } => {
            let subs = client.movie_subtitles(tmdb_id).await?;
            for sub in subs {
                println!(
                    "{} ({})  {:?}  {}",
                    sub.label(),
                    sub.language,
                    sub.format,
                    sub.url
                );
            }
        }

        Commands::Download {
            tmdb_id,
            quality,
            title,
            output,
        } => {
            let title = title.unwrap_or_else(|| format!("movie-{tmdb_id}"));

            let sources = downloadable_sources(client.movie_sources(tmdb_id).await?);
            let source = sources
                .iter()
                .find(|s| s.quality == quality)
                .or_else(|| sources.first())
                .ok_or_else(|| anyhow!("no downloadable source for {tmdb_id}"))?;
            println!(
                "Downloading {title} at {}P ({})",
                source.quality,
                ProgressSnapshot::bytes_string(source.size_bytes)
            );

            let manager = DownloadManager::new(DownloadConfig {
                output_directory: output,
                ..Default::default()
            })?;

            let session_id = manager.start_download(source, &title, None).await?;
            let mut progress = manager
                .subscribe(&session_id)
                .await
                .context("session vanished before it started")?;

            let mut last_print: Option<Instant> = None;
            loop {
                let snapshot = progress.borrow_and_update().clone();
                let terminal = snapshot.state.is_terminal();

                let due = last_print.map_or(true, |at| at.elapsed() >= Duration::from_secs(1));
                if terminal || due {
                    println!("{}", snapshot.display_string());
                    last_print = Some(Instant::now());
                }

                if terminal {
                    if snapshot.state == TransferState::Failed {
                        return Err(anyhow!(
                            "download failed: {}",
                            snapshot.error_message.unwrap_or_default()
                        ));
                    }
                    break;
                }

                if progress.changed().await.is_err() {
                    break;
                }
            }
        }

        Commands::Subtitle {
            tmdb_id,
            language,
            title,
            output,
        } => {
            let title = title.unwrap_or_else(|| format!("movie-{tmdb_id}"));

            let subs = client.movie_subtitles(tmdb_id).await?;
            let sub = subs
                .iter()
                .find(|s| s.language == language)
                .ok_or_else(|| anyhow!("no subtitle for language {language}"))?;

            let sink = DiskSink::new(output)?;
            let path = download_subtitle(&client, sub, &title, &sink).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}
