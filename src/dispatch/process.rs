use std::io::Read;
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::remote::RemoteError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long output is still collected after the child exited. Background
/// grandchildren may keep the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub(super) struct CommandOutput {
    pub(super) status: ExitStatus,
    /// stdout followed by stderr.
    pub(super) output: String,
}

/// Runs `cmd` to completion, killing it once `timeout` has passed. A timeout
/// too large to express as a deadline means no deadline.
pub(super) fn run_with_timeout(
    mut cmd: ProcessCommand,
    timeout: Duration,
) -> Result<CommandOutput, RemoteError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| RemoteError::Spawn {
        program: program.clone(),
        source,
    })?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|deadline| Instant::now() >= deadline) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemoteError::Timeout { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemoteError::Spawn { program, source });
            }
        }
    };

    let grace_end = Instant::now() + DRAIN_GRACE;
    let mut output = collect(stdout, grace_end);
    output.push_str(&collect(stderr, grace_end));
    Ok(CommandOutput { status, output })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0_u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    if tx.send(buf[..read].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Gathers what the reader thread produced until EOF or `until`.
fn collect(chunks: Option<Receiver<Vec<u8>>>, until: Instant) -> String {
    let Some(chunks) = chunks else {
        return String::new();
    };
    let mut bytes = Vec::new();
    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
