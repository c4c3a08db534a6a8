use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::{DispatchError, Dispatcher};
use crate::http::HttpClient;

/// Stores linked `.torrent` files in a watch directory.
pub(crate) struct TorrentFetcher {
    dir: PathBuf,
    client: HttpClient,
}

impl TorrentFetcher {
    pub(crate) fn new(dir: PathBuf, timeout: Duration) -> Self {
        Self {
            dir,
            client: HttpClient::new(timeout, timeout),
        }
    }
}

impl Dispatcher for TorrentFetcher {
    fn send(&mut self, link: &str) -> Result<(), DispatchError> {
        let file_name = file_name_for(link).ok_or_else(|| {
            DispatchError::DownloadFailed(format!("cannot derive a file name from {link}"))
        })?;
        self.client
            .download(link, &self.dir.join(file_name))
            .map_err(|err| DispatchError::DownloadFailed(err.to_string()))
    }
}

/// Last non-empty path segment of `link`, as it appears in the URL.
fn file_name_for(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    Some(segment.to_string())
}
