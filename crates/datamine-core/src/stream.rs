//! HTTP streaming download with read timeout.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface: a fetch blocks the calling thread until the
//! body has been written out or the transfer failed.

use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::ProgressBar;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::StreamError;
use crate::progress::upgrade_to_bar;

/// Default read timeout for stall detection
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Copy block size (1 MiB)
const BLOCK_SIZE: usize = 1024 * 1024;

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Transport settings for [`HttpFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Max silence between two body chunks before the read fails.
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Something that can stream the bytes behind a URL into a writer.
///
/// The download orchestrator only talks to this trait, so tests can swap the
/// network out for an in-process source.
pub trait Fetch {
    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// `pb` is advanced as bytes arrive; pass `ProgressBar::hidden()` when
    /// no progress display is wanted.
    fn fetch(&self, url: &str, dest: &mut dyn Write, pb: &ProgressBar) -> Result<u64, StreamError>;
}

/// Blocking HTTP(S) fetcher over a pooled async reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| StreamError::from_reqwest(&e))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// HTTP GET → raw body reader (no content decoding) + Content-Length.
    pub fn open_reader(&self, url: &str) -> Result<(TimeoutReader, Option<u64>), StreamError> {
        let client = self.client.clone();
        let read_timeout = self.config.read_timeout;
        let url = url.to_string();

        SHARED_RUNTIME.handle().block_on(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;

            let total_bytes = response.content_length();

            let stream = response.bytes_stream();
            let async_reader = tokio_util::io::StreamReader::new(
                stream.map(|result| result.map_err(io::Error::other)),
            );

            Ok((
                TimeoutReader::new(Box::pin(async_reader), read_timeout),
                total_bytes,
            ))
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write, pb: &ProgressBar) -> Result<u64, StreamError> {
        let (mut reader, total_bytes) = self.open_reader(url)?;
        if let Some(total) = total_bytes {
            upgrade_to_bar(pb, total);
        }
        log::debug!("GET {url}: content-length {total_bytes:?}");

        let written = copy_blocks(&mut reader, dest, pb)?;
        dest.flush()?;
        pb.finish_and_clear();
        Ok(written)
    }
}

/// Copy `reader` into `writer` in fixed-size blocks, advancing `pb`.
pub fn copy_blocks<R: Read + ?Sized>(
    reader: &mut R,
    writer: &mut dyn Write,
    pb: &ProgressBar,
) -> io::Result<u64> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
        pb.inc(n as u64);
    }
}

/// Async-to-sync bridge with read timeout.
///
/// Wraps an async reader and provides sync Read interface.
/// Each read operation has a timeout - if no data arrives within
/// the configured window, returns a TimedOut error.
pub struct TimeoutReader {
    inner: Pin<Box<dyn AsyncRead + Send + Sync>>,
    timeout: Duration,
}

impl TimeoutReader {
    fn new(inner: Pin<Box<dyn AsyncRead + Send + Sync>>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", timeout.as_secs()),
                )),
            }
        })
    }
}
