use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use super::{DispatchError, Dispatcher, RemoteClient};

static INFO_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"xt=urn:btih:([^&/]+)").expect("info-hash pattern is valid")
});

/// Extracts the `xt=urn:btih:` token from a magnet link.
fn parse_info_hash(link: &str) -> Option<&str> {
    INFO_HASH
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Checks the scheme and returns the info-hash of a magnet link.
pub(crate) fn validate_magnet(link: &str) -> Result<&str, DispatchError> {
    if !link.starts_with("magnet:") {
        return Err(DispatchError::MalformedLink(link.to_string()));
    }
    parse_info_hash(link).ok_or_else(|| DispatchError::MissingHash(link.to_string()))
}

/// Validates magnet links and forwards them to the remote client.
pub(crate) struct MagnetSender<C> {
    client: C,
    download_dir: Option<PathBuf>,
}

impl<C: RemoteClient> MagnetSender<C> {
    pub(crate) fn new(client: C, download_dir: Option<PathBuf>) -> Self {
        Self {
            client,
            download_dir,
        }
    }
}

impl<C: RemoteClient> Dispatcher for MagnetSender<C> {
    fn send(&mut self, link: &str) -> Result<(), DispatchError> {
        validate_magnet(link)?;
        self.client
            .add(link, self.download_dir.as_deref())
            .map_err(|err| DispatchError::DispatchFailed(err.to_string()))
    }
}
