//! HTTP client for a remote cluster directory.
//!
//! Lookups are plain JSON requests; the subscription is a long-lived
//! `text/event-stream` response decoded frame by frame.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::sse::{decode_event, SseBuffer};
use super::{DirectoryClient, DirectoryError, EventSource, EventSourceError};
use crate::config::DirectoryConfig;
use crate::models::{ActualInstanceRecord, DesiredRecord, DirectoryEvent};

#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    /// Client without a total-request timeout, for the event stream
    stream_client: reqwest::Client,
    base_url: String,
}

impl HttpDirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DirectoryError::Unavailable(format!("failed to build client: {e}")))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| DirectoryError::Unavailable(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn unavailable(err: reqwest::Error) -> DirectoryError {
    DirectoryError::Unavailable(err.to_string())
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn desired(&self, process_guid: &str) -> Result<DesiredRecord, DirectoryError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/desired_lrps/{process_guid}")))
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(process_guid.to_string())),
            status if status.is_success() => response
                .json::<DesiredRecord>()
                .await
                .map_err(|e| DirectoryError::Decode(e.to_string())),
            status => Err(DirectoryError::Unavailable(format!(
                "desired record lookup returned {status}"
            ))),
        }
    }

    async fn actual_instances(
        &self,
        process_guid: &str,
    ) -> Result<Vec<ActualInstanceRecord>, DirectoryError> {
        let response = self
            .client
            .get(self.url("/v1/actual_lrps"))
            .query(&[("process_guid", process_guid)])
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "actual record lookup returned {status}"
            )));
        }

        response
            .json::<Vec<ActualInstanceRecord>>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    async fn subscribe(&self) -> Result<Arc<dyn EventSource>, DirectoryError> {
        let response = self
            .stream_client
            .get(self.url("/v1/events"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "event subscription returned {status}"
            )));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        let (closed_tx, closed_rx) = watch::channel(false);

        Ok(Arc::new(HttpEventSource {
            reader: Mutex::new(SseReader {
                chunks,
                buffer: SseBuffer::default(),
            }),
            closed_tx,
            closed_rx,
        }))
    }
}

struct SseReader {
    chunks: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: SseBuffer,
}

impl SseReader {
    async fn next_event(&mut self) -> Result<DirectoryEvent, EventSourceError> {
        loop {
            while let Some(frame) = self.buffer.next_frame() {
                match decode_event(&frame) {
                    Ok(Some(event)) => return Ok(event),
                    Ok(None) => debug!(event = %frame.event, "Skipping unhandled directory event"),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable directory event");
                    }
                }
            }

            match self.chunks.next().await {
                Some(Ok(bytes)) => self.buffer.push(&bytes)?,
                Some(Err(e)) => return Err(EventSourceError::Stream(e.to_string())),
                None => {
                    return Err(EventSourceError::Stream(
                        "event stream ended".to_string(),
                    ))
                }
            }
        }
    }
}

struct HttpEventSource {
    reader: Mutex<SseReader>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn next(&self) -> Result<DirectoryEvent, EventSourceError> {
        let mut closed = self.closed_rx.clone();
        if *closed.borrow_and_update() {
            return Err(EventSourceError::Closed);
        }

        tokio::select! {
            _ = closed.changed() => Err(EventSourceError::Closed),
            result = async { self.reader.lock().await.next_event().await } => result,
        }
    }

    async fn close(&self) -> Result<(), EventSourceError> {
        self.closed_tx.send_replace(true);
        // An in-flight read is cancelled by the close signal; otherwise release the
        // connection now by dropping the body stream.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.chunks = futures::stream::empty().boxed();
        }
        Ok(())
    }
}
