use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

use crate::cli::{CacheKey, Cli};
use crate::feed::{normalize_feed_url, wants_magnets};
use crate::paths::expand_home;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Magnet links go straight to the transmission daemon.
    Magnet { destination: Option<PathBuf> },
    /// `.torrent` files are stored in a watch directory.
    Torrent { watchdir: PathBuf },
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) feed_url: Url,
    pub(crate) cache_file: PathBuf,
    pub(crate) key: CacheKey,
    pub(crate) mode: Mode,
    pub(crate) host: Option<String>,
    pub(crate) auth: Option<String>,
    pub(crate) timeout: Duration,
}

impl Settings {
    pub(crate) fn from_cli(cli: Cli) -> Result<Self> {
        let feed_url = normalize_feed_url(&cli.feed)?;

        let cache_file = expand_home(&cli.cachefile)?;
        if cache_file.is_dir() {
            bail!(
                "Argument cachefile points to a directory (\"{}\")",
                cache_file.display()
            );
        }

        let remote_run = cli.host.is_some() || cli.destination.is_some();
        let mode = if wants_magnets(&feed_url) {
            Mode::Magnet {
                destination: cli.destination,
            }
        } else if remote_run {
            bail!(
                "Feed \"{feed_url}\" has no magnets=true flag, which --host and --destination require"
            );
        } else {
            let watchdir = match cli.watchdir {
                Some(dir) => dir,
                None => env::current_dir().context("unable to resolve current directory")?,
            };
            if !watchdir.is_dir() {
                bail!(
                    "Directory \"{}\" not found or file in place",
                    watchdir.display()
                );
            }
            Mode::Torrent { watchdir }
        };

        if cli.key == CacheKey::Hash && matches!(mode, Mode::Torrent { .. }) {
            bail!("--key hash needs a feed with magnets=true");
        }

        Ok(Self {
            feed_url,
            cache_file,
            key: cli.key,
            mode,
            host: cli.host,
            auth: cli.auth,
            timeout: Duration::from_secs(cli.timeout),
        })
    }
}
