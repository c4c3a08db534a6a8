mod magnet;
mod process;
mod remote;
mod torrent;

use thiserror::Error;

pub(crate) use magnet::{MagnetSender, validate_magnet};
pub(crate) use remote::{RemoteClient, TransmissionRemote};
pub(crate) use torrent::TorrentFetcher;

#[cfg(test)]
pub(crate) use remote::{RemoteError, SessionInfo};

/// Why a link could not be handed off. None of these abort the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum DispatchError {
    #[error("Malformed magnet link ({0})")]
    MalformedLink(String),
    #[error("No hash in magnet link ({0})")]
    MissingHash(String),
    #[error("Error sending to transmission ({0})")]
    DispatchFailed(String),
    #[error("Error fetching torrent ({0})")]
    DownloadFailed(String),
}

impl DispatchError {
    /// The link itself is unusable, as opposed to the hand-off failing.
    pub(crate) fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedLink(_) | Self::MissingHash(_))
    }
}

pub(crate) trait Dispatcher {
    fn send(&mut self, link: &str) -> Result<(), DispatchError>;
}
