use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use anyhow::{Result, bail};
use bytes::Bytes;
use reqwest::Client;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Source;

/// Body chunks queued between the download task and the reader.
const QUEUED_CHUNKS: usize = 16;

/// Shared count of bytes received from the network.
#[derive(Debug, Clone, Default)]
pub struct TransferCounter(Arc<AtomicU64>);

impl TransferCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Starts a plain GET for `url` and streams its body.
///
/// No Range requests are made, so any server works, but the body can only be
/// read once from front to back.
pub async fn open_http(url: &str) -> Result<Source> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        bail!("HTTP request failed with status: {}", response.status());
    }
    debug!(url, length = ?response.content_length(), "streaming HTTP body");

    let transferred = TransferCounter::default();
    let reader = BodyReader::spawn(response, transferred.clone());

    Ok(Source {
        reader: Box::new(reader),
        transferred: Some(transferred),
    })
}

/// [`AsyncRead`] over chunks delivered by a background download task.
///
/// Errors from the connection are handed to the reader instead of being
/// mistaken for the end of the body.
pub struct BodyReader {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl BodyReader {
    fn spawn(mut response: reqwest::Response, transferred: TransferCounter) -> Self {
        let (tx, rx) = mpsc::channel(QUEUED_CHUNKS);

        tokio::spawn(async move {
            loop {
                let item = match response.chunk().await {
                    Ok(Some(chunk)) => {
                        transferred.add(chunk.len());
                        Ok(chunk)
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("HTTP body failed: {e}");
                        Err(io::Error::other(e))
                    }
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("body reader dropped, stopping download");
                    break;
                }
                if failed {
                    break;
                }
            }
        });

        Self::from_channel(rx)
    }

    /// Reads whatever is sent on `chunks` until every sender is gone.
    pub fn from_channel(chunks: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            chunks,
            current: Bytes::new(),
        }
    }
}

impl AsyncRead for BodyReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        while self.current.is_empty() {
            match ready!(self.chunks.poll_recv(cx)) {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Poll::Ready(Err(e)),
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = buf.remaining().min(self.current.len());
        let part = self.current.split_to(n);
        buf.put_slice(&part);
        Poll::Ready(Ok(()))
    }
}
