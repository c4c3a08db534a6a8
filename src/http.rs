use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;
const BODY_SNIPPET_CHARS: usize = 240;

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("HTTP status {status}{}", body_snippet(.body))]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: Box<HttpError> },
    #[error("failed reading response body: {0}")]
    Body(io::Error),
    #[error("response larger than {MAX_DOWNLOAD_BYTES} bytes, refusing to store it")]
    TooLarge,
    #[error("failed storing {}: {err}", .path.display())]
    Store { path: PathBuf, err: io::Error },
}

impl HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            }
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

fn body_snippet(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        let truncated = body.chars().take(BODY_SNIPPET_CHARS).collect::<String>();
        format!(" ({truncated})")
    }
}

/// Blocking GET client. Without [`HttpClient::with_retries`] every request is
/// tried once.
#[derive(Debug)]
pub(crate) struct HttpClient {
    agent: ureq::Agent,
    attempts: usize,
    retry_delay: Duration,
}

impl HttpClient {
    pub(crate) fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            agent,
            attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    /// Retries 408, 429, 5xx and transport failures, `attempts` requests in
    /// total.
    pub(crate) fn with_retries(mut self, attempts: usize, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub(crate) fn get_text(&self, url: &str) -> Result<String, HttpError> {
        self.open(url)?.into_string().map_err(HttpError::Body)
    }

    /// Fetches `url` into `dest`. The body lands in a `.part` sibling first so
    /// an interrupted transfer never leaves a truncated file under the final
    /// name.
    pub(crate) fn download(&self, url: &str, dest: &Path) -> Result<(), HttpError> {
        let mut body = Vec::new();
        self.open(url)?
            .into_reader()
            .take(MAX_DOWNLOAD_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(HttpError::Body)?;
        if body.len() as u64 > MAX_DOWNLOAD_BYTES {
            return Err(HttpError::TooLarge);
        }

        let partial = partial_path(dest);
        fs::write(&partial, &body).map_err(|err| HttpError::Store {
            path: partial.clone(),
            err,
        })?;
        fs::rename(&partial, dest).map_err(|err| {
            let _ = fs::remove_file(&partial);
            HttpError::Store {
                path: dest.to_path_buf(),
                err,
            }
        })
    }

    fn open(&self, url: &str) -> Result<ureq::Response, HttpError> {
        let mut attempt = 1;
        loop {
            match self.call(url) {
                Ok(response) => return Ok(response),
                Err(err) if !err.is_retryable() || self.attempts == 1 => return Err(err),
                Err(err) if attempt >= self.attempts => {
                    return Err(HttpError::Exhausted {
                        attempts: self.attempts,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    debug!("GET {url} attempt {attempt} failed: {err}");
                    thread::sleep(self.retry_delay);
                    attempt += 1;
                }
            }
        }
    }

    fn call(&self, url: &str) -> Result<ureq::Response, HttpError> {
        self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(status, response) => HttpError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(err) => HttpError::Transport(err.to_string()),
        })
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) enum Behavior {
        Respond(u16, String),
        DelayRespond(Duration, u16, String),
    }

    #[derive(Debug)]
    pub(crate) struct TestServer {
        pub(crate) base_url: String,
        requests: Arc<AtomicUsize>,
        paths: Arc<Mutex<Vec<String>>>,
        behaviors: Arc<Mutex<VecDeque<Behavior>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        pub(crate) fn spawn(behaviors: Vec<Behavior>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(AtomicUsize::new(0));
            let requests_clone = Arc::clone(&requests);
            let paths = Arc::new(Mutex::new(Vec::new()));
            let paths_clone = Arc::clone(&paths);
            let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
            let behaviors_clone = Arc::clone(&shared_behaviors);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            requests_clone.fetch_add(1, Ordering::SeqCst);
                            let behavior = {
                                let mut queue = behaviors_clone.lock().expect("lock behaviors");
                                queue.pop_front().unwrap_or_else(|| {
                                    Behavior::Respond(200, "default-ok".to_string())
                                })
                            };
                            let paths = Arc::clone(&paths_clone);
                            std::thread::spawn(move || {
                                if let Ok(Some(path)) = consume_request(&mut stream) {
                                    paths.lock().expect("lock paths").push(path);
                                }
                                serve_behavior(&mut stream, behavior);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                paths,
                behaviors: shared_behaviors,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        pub(crate) fn request_paths(&self) -> Vec<String> {
            self.paths.lock().expect("lock paths").clone()
        }

        /// Queues responses that need the server's own URL in their body.
        pub(crate) fn enqueue(&self, behavior: Behavior) {
            self.behaviors.lock().expect("lock behaviors").push_back(behavior);
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if data.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        let head = String::from_utf8_lossy(&data);
        Ok(head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .map(str::to_string))
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            408 => "Request Timeout",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        }
    }

    fn serve_behavior(stream: &mut TcpStream, behavior: Behavior) {
        match behavior {
            Behavior::Respond(status, body) => {
                let _ = write_response(stream, status, &body);
            }
            Behavior::DelayRespond(delay, status, body) => {
                std::thread::sleep(delay);
                let _ = write_response(stream, status, &body);
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = reason_phrase(status);
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }
}
