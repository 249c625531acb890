//! Silence event delivery
//!
//! The detector hands events to an [`EventEmitter`], which queues them for a
//! background task that posts each one to the collector. Delivery is
//! best-effort: a failed post is logged and the event is dropped, and the
//! detector never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::event::{SilenceEvent, SilencePing};
use crate::{Error, Result};

/// Events waiting for delivery before new ones are dropped
pub const QUEUE_CAPACITY: usize = 64;

/// How long shutdown waits for queued events to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for silence pings
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one ping
    async fn deliver(&self, ping: &SilencePing) -> Result<()>;
}

/// Posts pings as JSON to the collector's ingestion URL
#[derive(Clone)]
pub struct HttpSink {
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    /// Create a sink posting to `url`, bounding each request by `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn deliver(&self, ping: &SilencePing) -> Result<()> {
        let response = self.client.post(&self.url).json(ping).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!("collector returned {status}: {body}")));
        }

        Ok(())
    }
}

/// Queues events and delivers them from a background task
pub struct EventEmitter {
    tx: mpsc::Sender<SilencePing>,
    worker: JoinHandle<()>,
}

impl EventEmitter {
    /// Start a delivery task for `sink`
    #[must_use]
    pub fn spawn(sink: Arc<dyn EventSink>) -> Self {
        Self::with_capacity(sink, QUEUE_CAPACITY)
    }

    /// Start a delivery task with a custom queue size
    #[must_use]
    pub fn with_capacity(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<SilencePing>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(ping) = rx.recv().await {
                match sink.deliver(&ping).await {
                    Ok(()) => {
                        tracing::info!(
                            status = ?ping.status,
                            start_time = %ping.start_time,
                            duration = ?ping.duration,
                            "silence event sent"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            status = ?ping.status,
                            start_time = %ping.start_time,
                            "failed to send silence event"
                        );
                    }
                }
            }
            tracing::debug!("event delivery task stopped");
        });

        Self { tx, worker }
    }

    /// Queue an event for delivery without waiting
    ///
    /// Returns `false` if the event was dropped because the queue is full
    /// or the delivery task has stopped.
    pub fn emit(&self, event: &SilenceEvent) -> bool {
        match self.tx.try_send(SilencePing::from(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(ping)) => {
                tracing::warn!(
                    start_time = %ping.start_time,
                    "event queue full, dropping silence event"
                );
                false
            }
            Err(TrySendError::Closed(ping)) => {
                tracing::warn!(
                    start_time = %ping.start_time,
                    "event delivery stopped, dropping silence event"
                );
                false
            }
        }
    }

    /// Stop accepting events and wait briefly for queued ones to be sent
    pub async fn shutdown(self) {
        let Self { tx, mut worker } = self;
        drop(tx);

        if tokio::time::timeout(DRAIN_TIMEOUT, &mut worker).await.is_err() {
            tracing::warn!("event delivery did not drain in time, abandoning queued events");
            worker.abort();
        }
    }
}
