//! # Status Stream Module
//!
//! This module maintains the live SSE subscriptions to the Pomelo
//! status-updates endpoint, one per scan id at most. Each subscription
//! decodes pushed frames into status strings and forwards them over a
//! channel until the connection ends, a terminal-failure status arrives, a
//! frame fails to decode, or an unsubscribe request is observed.
//!
//! Unsubscribing is cooperative: it sets a per-id stop flag that the read
//! loop checks before dispatching every event, so teardown latency is
//! bounded by one event interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{Stream, StreamExt};
use log::info;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::scan_errors::ScanError;
use crate::scan_model::is_terminal_failure;

/// Production endpoint of the Pomelo API
const DEFAULT_BASE_URL: &str = "https://pomelo.colorbit.ru/api";

/// One decoded event from a scan's status stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A status string pushed by the service
    Status(String),
    /// The connection failed or a frame could not be decoded; the
    /// subscription is over
    TransportError(String),
}

/// Source of per-scan status events, the seam between the tracker and the
/// network
pub trait StatusSource: Send + Sync {
    /// Open the status subscription for a scan id. Fails when the id
    /// already has a live subscription: one stream per scan, never two
    /// concurrent readers.
    fn subscribe(&self, scan_id: &str) -> Result<mpsc::UnboundedReceiver<StreamEvent>, ScanError>;

    /// Request teardown of a scan's subscription. Idempotent; a no-op for
    /// ids without a live subscription.
    fn unsubscribe(&self, scan_id: &str);
}

/// Wire shape of a single status-updates frame
#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

/// SSE subscription manager for the Pomelo status-updates endpoint
pub struct StatusStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    http: reqwest::Client,
    base_url: String,
    /// scan_id -> should_stop flag; an entry exists iff the subscription is live
    subscriptions: Mutex<HashMap<String, bool>>,
}

impl StatusStream {
    /// Create a manager against the production endpoint
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a manager against a custom endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                http: reqwest::Client::new(),
                base_url: base_url.into(),
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().unwrap().len()
    }
}

impl Default for StatusStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSource for StatusStream {
    fn subscribe(&self, scan_id: &str) -> Result<mpsc::UnboundedReceiver<StreamEvent>, ScanError> {
        if !self.inner.register(scan_id) {
            return Err(ScanError::Stream(format!(
                "scan {scan_id} already has a live subscription"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_subscription(
            Arc::clone(&self.inner),
            scan_id.to_string(),
            tx,
        ));
        Ok(rx)
    }

    fn unsubscribe(&self, scan_id: &str) {
        self.inner.request_stop(scan_id);
    }
}

/// Connect to the status-updates endpoint and pump events until the
/// subscription ends, then drop the registration
async fn run_subscription(
    inner: Arc<StreamInner>,
    scan_id: String,
    tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let url = format!("{}/scans/{}/status-updates", inner.base_url, scan_id);
    info!("Subscribing to status updates for scan {scan_id}");

    match inner.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            let byte_stream = response.bytes_stream();
            inner.pump_events(&scan_id, byte_stream, &tx).await;
        }
        Ok(response) => {
            let _ = tx.send(StreamEvent::TransportError(format!(
                "status stream refused with status {}",
                response.status()
            )));
        }
        Err(e) => {
            let _ = tx.send(StreamEvent::TransportError(format!(
                "status stream connect: {e}"
            )));
        }
    }

    inner.release(&scan_id);
    info!("Status stream for scan {scan_id} closed");
}

impl StreamInner {
    /// Register a subscription; `false` when the id already has one
    fn register(&self, scan_id: &str) -> bool {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions.contains_key(scan_id) {
            return false;
        }
        subscriptions.insert(scan_id.to_string(), false);
        true
    }

    fn request_stop(&self, scan_id: &str) {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if let Some(flag) = subscriptions.get_mut(scan_id) {
            *flag = true;
        }
    }

    fn should_stop(&self, scan_id: &str) -> bool {
        let subscriptions = self.subscriptions.lock().unwrap();
        subscriptions.get(scan_id).copied().unwrap_or(false)
    }

    fn release(&self, scan_id: &str) {
        self.subscriptions.lock().unwrap().remove(scan_id);
    }

    /// Decode and forward status events from the raw byte stream.
    ///
    /// The stop flag is checked before every dispatch, not only at loop
    /// entry. A terminal-failure status is dispatched and then ends the
    /// subscription; a decode failure ends it without recovery; a normal
    /// stream end just closes the channel.
    async fn pump_events<S, B, E>(
        &self,
        scan_id: &str,
        mut byte_stream: S,
        tx: &mpsc::UnboundedSender<StreamEvent>,
    ) where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let mut parser = SseParser::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx.send(StreamEvent::TransportError(format!(
                        "status stream read: {e}"
                    )));
                    return;
                }
            };

            for payload in parser.push(chunk.as_ref()) {
                if self.should_stop(scan_id) {
                    info!("Unsubscribed from scan {scan_id}");
                    return;
                }

                let status = match serde_json::from_str::<StatusUpdate>(&payload) {
                    Ok(update) => update.status,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::TransportError(format!(
                            "status frame decode: {e}"
                        )));
                        return;
                    }
                };

                info!("Scan {scan_id}: stream event '{status}'");
                let terminal = is_terminal_failure(&status);
                let _ = tx.send(StreamEvent::Status(status));
                if terminal {
                    return;
                }
            }
        }
    }
}

/// Incremental SSE frame parser
///
/// Buffers raw bytes until complete lines are available, accumulates `data:`
/// lines, and yields one payload per blank-line-terminated event. Complete
/// lines are extracted before UTF-8 conversion, so multi-byte characters
/// split across chunk boundaries survive intact.
struct SseParser {
    buffer: Vec<u8>,
    data: String,
}

impl SseParser {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            data: String::new(),
        }
    }

    /// Feed a chunk of bytes, returning the data payloads of all events
    /// completed by it
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let raw_line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw_line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                // Blank line terminates the event
                if !self.data.is_empty() {
                    payloads.push(std::mem::take(&mut self.data));
                }
                continue;
            }
            if line.starts_with(':') {
                // Comment / keep-alive line
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            // event/id/retry fields carry nothing for the status feed
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn test_inner() -> StreamInner {
        StreamInner {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn frame(status: &str) -> String {
        format!("data: {{\"status\": \"{status}\"}}\n\n")
    }

    fn byte_chunks(frames: &[String]) -> Vec<Result<Vec<u8>, std::io::Error>> {
        frames
            .iter()
            .map(|frame| Ok(frame.clone().into_bytes()))
            .collect()
    }

    #[test]
    fn parser_yields_payload_per_event() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"data: {\"status\": \"pending\"}\n\ndata: {\"status\": \"processing\"}\n\n");
        assert_eq!(
            payloads,
            vec![
                "{\"status\": \"pending\"}".to_string(),
                "{\"status\": \"processing\"}".to_string()
            ]
        );
    }

    #[test]
    fn parser_handles_chunk_split_mid_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"sta").is_empty());
        assert!(parser.push(b"tus\": \"pending\"}\n").is_empty());
        let payloads = parser.push(b"\n");
        assert_eq!(payloads, vec!["{\"status\": \"pending\"}".to_string()]);
    }

    #[test]
    fn parser_handles_crlf_and_comments() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b": keep-alive\r\ndata: {\"status\": \"pending\"}\r\n\r\n");
        assert_eq!(payloads, vec!["{\"status\": \"pending\"}".to_string()]);
    }

    #[test]
    fn parser_joins_multiline_data() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"data: first\ndata: second\n\n");
        assert_eq!(payloads, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn parser_ignores_event_and_id_fields() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"event: update\nid: 7\ndata: {\"status\": \"pending\"}\n\n");
        assert_eq!(payloads, vec!["{\"status\": \"pending\"}".to_string()]);
    }

    #[test]
    fn parser_survives_multibyte_split_across_chunks() {
        let mut parser = SseParser::new();
        let line = "data: {\"status\": \"готово\"}\n\n".as_bytes();
        // Split inside a Cyrillic character
        let split = line.len() - 9;
        assert!(parser.push(&line[..split]).is_empty());
        let payloads = parser.push(&line[split..]);
        assert_eq!(payloads, vec!["{\"status\": \"готово\"}".to_string()]);
    }

    #[test]
    fn new_stream_has_no_live_subscriptions() {
        let stream = StatusStream::new();
        assert_eq!(stream.subscription_count(), 0);
    }

    #[test]
    fn register_rejects_duplicate_subscription() {
        let inner = test_inner();
        assert!(inner.register("s1"));
        assert!(!inner.register("s1"));
        inner.release("s1");
        assert!(inner.register("s1"));
    }

    #[test]
    fn request_stop_is_idempotent_and_ignores_unknown_ids() {
        let inner = test_inner();
        inner.request_stop("missing");
        assert!(inner.register("s1"));
        inner.request_stop("s1");
        inner.request_stop("s1");
        assert!(inner.should_stop("s1"));
    }

    #[tokio::test]
    async fn pump_forwards_statuses_in_order() {
        let inner = test_inner();
        inner.register("s1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let chunks = byte_chunks(&[frame("pending"), frame("processing")]);
        inner
            .pump_events("s1", stream::iter(chunks), &tx)
            .await;
        drop(tx);

        assert!(matches!(rx.recv().await, Some(StreamEvent::Status(s)) if s == "pending"));
        assert!(matches!(rx.recv().await, Some(StreamEvent::Status(s)) if s == "processing"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_exits_without_dispatch_after_unsubscribe() {
        let inner = test_inner();
        inner.register("s1");
        inner.request_stop("s1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let chunks = byte_chunks(&[frame("pending")]);
        inner
            .pump_events("s1", stream::iter(chunks), &tx)
            .await;
        drop(tx);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_stops_after_terminal_failure_status() {
        let inner = test_inner();
        inner.register("s1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let chunks = byte_chunks(&[frame("recognition_failed"), frame("processing")]);
        inner
            .pump_events("s1", stream::iter(chunks), &tx)
            .await;
        drop(tx);

        assert!(
            matches!(rx.recv().await, Some(StreamEvent::Status(s)) if s == "recognition_failed")
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_fails_fast_on_undecodable_frame() {
        let inner = test_inner();
        inner.register("s1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let chunks = byte_chunks(&["data: not json\n\n".to_string(), frame("processing")]);
        inner
            .pump_events("s1", stream::iter(chunks), &tx)
            .await;
        drop(tx);

        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::TransportError(_))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_reports_read_errors() {
        let inner = test_inner();
        inner.register("s1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(frame("pending").into_bytes()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        ];
        inner
            .pump_events("s1", stream::iter(chunks), &tx)
            .await;
        drop(tx);

        assert!(matches!(rx.recv().await, Some(StreamEvent::Status(s)) if s == "pending"));
        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::TransportError(_))
        ));
        assert!(rx.recv().await.is_none());
    }
}
