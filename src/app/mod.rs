mod config;
mod process;


use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::RotatingCache;
use crate::cli::Cli;
use crate::dispatch::{Dispatcher, MagnetSender, RemoteClient, TorrentFetcher, TransmissionRemote};
use crate::feed::fetch_feed;

use self::config::{Mode, Settings};
use self::process::{RunSummary, process_entries};

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(cli)?;
    info!("Using feed: {}", settings.feed_url);

    let mut cache = RotatingCache::load(&settings.cache_file)?;
    let result = run_with_cache(&settings, &mut cache);
    let flushed = cache.flush();

    let summary = result?;
    if flushed? {
        info!("Updated cache file {}", settings.cache_file.display());
    }
    info!("Done: {summary}");
    Ok(())
}

fn run_with_cache(settings: &Settings, cache: &mut RotatingCache) -> Result<RunSummary> {
    let mut dispatcher = build_dispatcher(settings)?;
    let entries = fetch_feed(&settings.feed_url, settings.timeout)?;
    info!("Feed lists {} entries", entries.len());

    let outcomes = process_entries(&entries, settings.key, dispatcher.as_mut(), cache);
    Ok(RunSummary::from_outcomes(&outcomes))
}

fn build_dispatcher(settings: &Settings) -> Result<Box<dyn Dispatcher>> {
    match &settings.mode {
        Mode::Magnet { destination } => {
            let client = TransmissionRemote::new(
                settings.host.clone(),
                settings.auth.clone(),
                settings.timeout,
            );
            let download_dir = resolve_destination(&client, destination.clone())?;
            if let Some(dir) = &download_dir {
                info!("Sending magnet links with download directory {}", dir.display());
            }
            Ok(Box::new(MagnetSender::new(client, download_dir)))
        }
        Mode::Torrent { watchdir } => {
            info!("Storing torrent files in {}", watchdir.display());
            Ok(Box::new(TorrentFetcher::new(watchdir.clone(), settings.timeout)))
        }
    }
}

/// Relative destinations live below the daemon's own download directory.
fn resolve_destination<C: RemoteClient>(
    client: &C,
    destination: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    let Some(dir) = destination else {
        return Ok(None);
    };
    if dir.is_absolute() {
        return Ok(Some(dir));
    }

    let session = client
        .session_info()
        .context("failed to query transmission session info")?;
    let base = session
        .download_dir
        .context("transmission session info does not list a download directory")?;
    Ok(Some(base.join(dir)))
}
