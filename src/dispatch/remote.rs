use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::time::Duration;

use thiserror::Error;

use super::process::run_with_timeout;

#[derive(Debug, Error)]
pub(crate) enum RemoteError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{status}: {output}")]
    Exit { status: String, output: String },
    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SessionInfo {
    pub(crate) download_dir: Option<PathBuf>,
}

/// A running BitTorrent daemon that accepts links.
pub(crate) trait RemoteClient {
    fn session_info(&self) -> Result<SessionInfo, RemoteError>;
    fn add(&self, link: &str, download_dir: Option<&Path>) -> Result<(), RemoteError>;
}

/// Talks to transmission-daemon through the `transmission-remote` binary.
#[derive(Debug, Clone)]
pub(crate) struct TransmissionRemote {
    bin: PathBuf,
    host: Option<String>,
    auth: Option<String>,
    timeout: Duration,
}

impl TransmissionRemote {
    pub(crate) fn new(host: Option<String>, auth: Option<String>, timeout: Duration) -> Self {
        Self {
            bin: resolve_remote_bin(),
            host,
            auth,
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_bin(mut self, bin: PathBuf) -> Self {
        self.bin = bin;
        self
    }

    fn command(&self) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.bin);
        if let Some(host) = &self.host {
            cmd.arg(host);
        }
        if let Some(auth) = &self.auth {
            cmd.arg("--auth").arg(auth);
        }
        cmd
    }

    fn run(&self, cmd: ProcessCommand) -> Result<String, RemoteError> {
        let out = run_with_timeout(cmd, self.timeout)?;
        if !out.status.success() {
            return Err(RemoteError::Exit {
                status: out.status.to_string(),
                output: out.output.trim().to_string(),
            });
        }
        Ok(out.output)
    }
}

impl RemoteClient for TransmissionRemote {
    fn session_info(&self) -> Result<SessionInfo, RemoteError> {
        let mut cmd = self.command();
        cmd.arg("--session-info");
        let text = self.run(cmd)?;
        Ok(parse_session_info(&text))
    }

    fn add(&self, link: &str, download_dir: Option<&Path>) -> Result<(), RemoteError> {
        let mut cmd = self.command();
        cmd.arg("--add").arg(link);
        if let Some(dir) = download_dir {
            cmd.arg("--download-dir").arg(dir);
        }
        self.run(cmd).map(|_| ())
    }
}

/// Reads the `Download directory:` line of `transmission-remote -si` output.
pub(crate) fn parse_session_info(text: &str) -> SessionInfo {
    let download_dir = text
        .lines()
        .find_map(|line| line.trim().strip_prefix("Download directory:"))
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);
    SessionInfo { download_dir }
}

pub(crate) fn resolve_remote_bin() -> PathBuf {
    resolve_remote_bin_from_env(env::var_os("SHOWRSS_DL_REMOTE_BIN"))
}

pub(crate) fn resolve_remote_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("transmission-remote"),
    }
}
