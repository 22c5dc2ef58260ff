//! HTTP fetching with a fixed timeout and classified failures.
//!
//! The fetcher never retries. A failed request is reported as a [`FetchError`]
//! so the crawler can log it, count it and move on to the next item.

use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("archive_ingest/", env!("CARGO_PKG_VERSION"));

/// Why a single fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    fn classify(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// Thin wrapper around a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and return the response body as text.
    ///
    /// Any transport failure or non-2xx status is returned as a [`FetchError`].
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        match self.get_text(url).await {
            Ok(body) => {
                debug!(
                    bytes = body.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Fetched page"
                );
                Ok(body)
            }
            Err(e) => {
                let err = FetchError::classify(e);
                warn!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %err,
                    "Fetch failed"
                );
                Err(err)
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        response.text().await
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! A tiny HTTP server thread serving canned pages for crawler tests.

    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    pub struct TestServer {
        pub base_url: String,
        hits: Arc<Mutex<HashMap<String, usize>>>,
        shutdown_tx: mpsc::Sender<()>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl TestServer {
        /// Serve `pages` (path -> HTML). Unknown paths answer 404.
        pub fn spawn(pages: Vec<(String, String)>) -> Self {
            Self::spawn_with_delay(pages, Duration::ZERO)
        }

        /// Like [`TestServer::spawn`], but hold every response for `delay`
        /// after counting the hit.
        pub fn spawn_with_delay(pages: Vec<(String, String)>, delay: Duration) -> Self {
            let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
            let base_url = format!("http://{}", server.server_addr());
            let pages: HashMap<String, String> = pages.into_iter().collect();
            let hits = Arc::new(Mutex::new(HashMap::new()));
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let thread_hits = Arc::clone(&hits);
            let handle = thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    let request = match server.recv_timeout(Duration::from_millis(20)) {
                        Ok(Some(req)) => req,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let path = request.url().to_string();
                    *thread_hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }

                    let response = match pages.get(&path) {
                        Some(body) => {
                            let header = tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/html; charset=utf-8"[..],
                            )
                            .expect("build header");
                            tiny_http::Response::from_string(body.clone()).with_header(header)
                        }
                        None => tiny_http::Response::from_string("not found").with_status_code(404),
                    };
                    let _ = request.respond(response);
                }
            });

            Self {
                base_url,
                hits,
                shutdown_tx,
                handle: Some(handle),
            }
        }

        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }

        /// How many times `path` was requested.
        pub fn hits(&self, path: &str) -> usize {
            self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::TestServer;
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = TestServer::spawn(vec![("/ok".to_string(), "<p>hello</p>".to_string())]);
        let fetcher = Fetcher::new(DEFAULT_TIMEOUT).unwrap();

        let body = fetcher.fetch(&server.url("/ok")).await.unwrap();
        assert_eq!(body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_fetch_classifies_non_2xx_status() {
        let server = TestServer::spawn(vec![]);
        let fetcher = Fetcher::new(DEFAULT_TIMEOUT).unwrap();

        match fetcher.fetch(&server.url("/missing")).await {
            Err(FetchError::Status(404)) => {}
            other => panic!("expected 404 status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_an_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = Fetcher::new(Duration::from_secs(2)).unwrap();

        let result = fetcher.fetch(&format!("http://127.0.0.1:{port}/")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_silent_server_times_out() {
        // Accepts the connection and never writes a response.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let silent = std::thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        });
        let fetcher = Fetcher::new(Duration::from_millis(200)).unwrap();

        let t0 = Instant::now();
        let err = fetcher.fetch(&format!("http://{addr}/slow")).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout), "expected timeout, got {err:?}");
        assert!(t0.elapsed() < Duration::from_secs(2));
        release_tx.send(()).unwrap();
        silent.join().unwrap();
    }
}
