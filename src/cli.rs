use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap::error::Error as ClapError;

#[derive(Debug, Parser)]
#[command(
    name = "showrss-dl",
    version,
    about = "Fetch new episodes from a showRSS feed and hand them to transmission"
)]
pub struct Cli {
    /// showRSS feed URL as generated on the website.
    pub feed: String,

    /// Directory to store torrent files. Defaults to the current directory.
    #[arg(long)]
    pub watchdir: Option<PathBuf>,

    /// Download directory passed to transmission. Relative paths are resolved
    /// against the daemon's own download directory.
    #[arg(long)]
    pub destination: Option<PathBuf>,

    /// Host (and port) of the transmission daemon.
    #[arg(long)]
    pub host: Option<String>,

    /// RPC authentication for transmission-remote as <user:passwd>.
    #[arg(long)]
    pub auth: Option<String>,

    /// File to store known episodes.
    #[arg(long, default_value = "~/.showrss_cache")]
    pub cachefile: String,

    /// What identifies an already downloaded entry.
    #[arg(long, value_enum, default_value_t = CacheKey::Episode)]
    pub key: CacheKey,

    /// Timeout in seconds for network requests and transmission-remote calls.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout: u64,

    /// Be more verbose.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheKey {
    /// The showRSS episode id.
    Episode,
    /// The info-hash of the magnet link.
    Hash,
}

/// Argument errors are fatal configuration errors; help and version output
/// are not errors at all.
pub fn usage_exit_status(err: &ClapError) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_feed_exits_with_failure() {
        let err = Cli::try_parse_from(["showrss-dl"]).expect_err("feed is required");
        assert_eq!(usage_exit_status(&err), 1);
    }

    #[test]
    fn unknown_flag_exits_with_failure() {
        let err = Cli::try_parse_from(["showrss-dl", "http://x.test/f.rss", "--bogus"])
            .expect_err("unknown flag");
        assert_eq!(usage_exit_status(&err), 1);
    }

    #[test]
    fn help_and_version_exit_successfully() {
        let help = Cli::try_parse_from(["showrss-dl", "--help"]).expect_err("help output");
        assert_eq!(usage_exit_status(&help), 0);
        let version = Cli::try_parse_from(["showrss-dl", "--version"]).expect_err("version");
        assert_eq!(usage_exit_status(&version), 0);
    }

    #[test]
    fn timeout_must_be_within_a_day() {
        let feed = "http://x.test/f.rss";
        for bad in ["0", "86401", "18446744073709551615"] {
            let err = Cli::try_parse_from(["showrss-dl", feed, "--timeout", bad])
                .expect_err("timeout out of range");
            assert_eq!(usage_exit_status(&err), 1, "timeout {bad}");
        }

        let cli = Cli::try_parse_from(["showrss-dl", feed, "--timeout", "86400"])
            .expect("a day is accepted");
        assert_eq!(cli.timeout, 86_400);
    }
}
