//! HTTP fetcher for downloading adlists into the local cache.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::sources::Source;
use crate::utils::format_bytes;

#[cfg(test)]
use mockall::automock;

/// Downloads one source into a destination file.
///
/// `Ok(true)` means the destination now holds fresh, non-empty content.
/// `Ok(false)` means the server answered with an empty body and the
/// destination was left alone. On `Err` the destination is also untouched.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_source(&self, source: &Source, dest: &Path) -> Result<bool, FetchError>;
}

/// HTTP client for fetching lists
pub struct Fetcher {
    client: Client,
    timeout_secs: u64,
    max_size: u64,
}

impl Fetcher {
    /// Create a new fetcher from the fetch settings
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_size: config.max_size,
        })
    }

    /// Download `url` to `dest` through a scratch file in the same directory.
    ///
    /// A non-empty `post` map sends a form-encoded POST instead of a GET.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        headers: &BTreeMap<String, String>,
        post: &BTreeMap<String, String>,
    ) -> Result<bool, FetchError> {
        let mut request = if post.is_empty() {
            self.client.get(url)
        } else {
            self.client.post(url).form(post)
        };
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_size {
                return Err(FetchError::TooLarge {
                    size: length,
                    max: self.max_size,
                });
            }
        }

        let dir = scratch_dir(dest);
        std::fs::create_dir_all(&dir)?;
        let mut temp = NamedTempFile::new_in(&dir)?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))?
        {
            written += chunk.len() as u64;
            if written > self.max_size {
                return Err(FetchError::TooLarge {
                    size: written,
                    max: self.max_size,
                });
            }
            temp.write_all(&chunk)?;
        }

        if written == 0 {
            debug!("{} returned an empty body, keeping {:?}", url, dest);
            return Ok(false);
        }

        temp.as_file().sync_all()?;
        temp.persist(dest).map_err(|e| FetchError::Io(e.error))?;
        debug!("Saved {} from {} to {:?}", format_bytes(written), url, dest);
        Ok(true)
    }
}

#[async_trait]
impl SourceFetcher for Fetcher {
    async fn fetch_source(&self, source: &Source, dest: &Path) -> Result<bool, FetchError> {
        self.fetch(&source.url, dest, &source.headers, &source.post)
            .await
    }
}

/// Turn a fetch outcome into one where an empty body is an error.
pub fn require_content(fetched: Result<bool, FetchError>) -> Result<(), FetchError> {
    match fetched {
        Ok(true) => Ok(()),
        Ok(false) => Err(FetchError::EmptyResponse),
        Err(e) => Err(e),
    }
}

fn scratch_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal one-shot HTTP server for exercising the real client.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve `response` to the first connection; the raw request is sent back on the channel.
    pub async fn serve_once(response: Vec<u8>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });

        (format!("http://{}/list.txt", addr), rx)
    }

    /// Accept one connection and never answer it.
    pub async fn serve_silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(socket);
        });
        format!("http://{}/slow.txt", addr)
    }

    pub fn ok(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    pub fn status(code: u16, reason: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code, reason
        )
        .into_bytes()
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            data.extend_from_slice(&buf[..n]);
            if let Some(end) = find(&data, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}
