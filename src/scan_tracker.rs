//! # Scan Tracker Module
//!
//! This module owns the scan lifecycle: per-user admission control, the
//! status-event state machine, the refetch that confirms true completion,
//! and the unconditional cleanup that frees the user and tears down the
//! status subscription on every exit path.
//!
//! ## State machine
//!
//! An active session consumes decoded stream events one at a time, in the
//! order received:
//!
//! - transient status -> forwarded as [`TrackEvent::Status`], session stays
//!   active
//! - terminal-failure status -> one [`TrackEvent::Failed`], session ends
//! - completion-candidate status (`completed` / `ai_analysis_completed`) ->
//!   refetch the snapshot; when it is not fully completed yet, emit nothing
//!   and keep waiting; when it is, one [`TrackEvent::Completed`] ends the
//!   session
//! - stream transport error -> one [`TrackEvent::Failed`], session ends
//!
//! The silent wait on an ambiguous completion status is deliberate: the push
//! event only carries a coarse status, and surfacing a snapshot without its
//! AI enrichment would show the user a half-finished result.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use log::{error, info};
use tokio::sync::mpsc;

use crate::scan_errors::ScanError;
use crate::scan_model::{is_completion_candidate, is_terminal_failure, ScanSnapshot};
use crate::status_stream::{StatusSource, StreamEvent};

/// Source of scan snapshots, the seam between the tracker and the remote API
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot of a scan
    fn fetch_snapshot<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<ScanSnapshot, ScanError>>;
}

/// Progress notification delivered to the caller of [`ScanTracker::track`]
#[derive(Debug, Clone)]
pub enum TrackEvent {
    /// A transient status update
    Status(String),
    /// The scan finished with its AI enrichment attached; final event
    Completed(ScanSnapshot),
    /// The scan or its status stream failed; final event
    Failed(String),
}

/// Manages scan sessions: one concurrent scan per user
pub struct ScanTracker {
    client: Arc<dyn SnapshotSource>,
    stream: Arc<dyn StatusSource>,
    active_users: Arc<Mutex<HashSet<String>>>,
}

impl ScanTracker {
    /// Create a tracker over the given snapshot and status-event sources
    pub fn new(client: Arc<dyn SnapshotSource>, stream: Arc<dyn StatusSource>) -> Self {
        Self {
            client,
            stream,
            active_users: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start tracking a scan for a user.
    ///
    /// Returns `None` without side effects when the user already has an
    /// active scan — the sole admission-control mechanism. Otherwise the
    /// status subscription is opened and a channel of [`TrackEvent`]s is
    /// returned; the channel closes once the session is over and the user
    /// is free again.
    pub fn track(
        &self,
        user_id: &str,
        scan_id: &str,
    ) -> Option<mpsc::UnboundedReceiver<TrackEvent>> {
        {
            let mut active = self.active_users.lock().unwrap();
            if active.contains(user_id) {
                return None;
            }
            active.insert(user_id.to_string());
        }

        let events = match self.stream.subscribe(scan_id) {
            Ok(events) => events,
            Err(e) => {
                error!("Could not subscribe to scan {scan_id}: {e}");
                self.active_users.lock().unwrap().remove(user_id);
                return None;
            }
        };

        info!("Started tracking scan {scan_id} for user {user_id}");

        let (tx, rx) = mpsc::unbounded_channel();
        let session = TrackingSession {
            client: Arc::clone(&self.client),
            stream: Arc::clone(&self.stream),
            active_users: Arc::clone(&self.active_users),
            user_id: user_id.to_string(),
            scan_id: scan_id.to_string(),
        };
        tokio::spawn(session.run(events, tx));

        Some(rx)
    }
}

/// Outcome of applying one stream event
enum Transition {
    Continue,
    Done,
}

/// One tracked (user, scan) pair; owns the cleanup for every exit path
struct TrackingSession {
    client: Arc<dyn SnapshotSource>,
    stream: Arc<dyn StatusSource>,
    active_users: Arc<Mutex<HashSet<String>>>,
    user_id: String,
    scan_id: String,
}

impl TrackingSession {
    /// Consume stream events until a terminal transition or stream end, then
    /// release the session. The release runs before the caller's channel
    /// closes, so a closed channel always means the user is free again.
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<StreamEvent>,
        tx: mpsc::UnboundedSender<TrackEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if let Transition::Done = self.apply(event, &tx).await {
                break;
            }
        }
        self.release();
    }

    async fn apply(&self, event: StreamEvent, tx: &mpsc::UnboundedSender<TrackEvent>) -> Transition {
        match event {
            StreamEvent::Status(status) => {
                info!("Scan {}: status '{status}'", self.scan_id);

                if is_terminal_failure(&status) {
                    let _ = tx.send(TrackEvent::Failed(format!("Scan failed: {status}")));
                    return Transition::Done;
                }
                if is_completion_candidate(&status) {
                    return self.confirm_completion(tx).await;
                }
                let _ = tx.send(TrackEvent::Status(status));
                Transition::Continue
            }
            StreamEvent::TransportError(reason) => {
                error!("Scan {}: stream transport error: {reason}", self.scan_id);
                let _ = tx.send(TrackEvent::Failed(format!("Connection error: {reason}")));
                Transition::Done
            }
        }
    }

    /// The push event only carries a coarse status; re-read the snapshot to
    /// check whether the AI enrichment is attached yet
    async fn confirm_completion(&self, tx: &mpsc::UnboundedSender<TrackEvent>) -> Transition {
        match self.client.fetch_snapshot(&self.scan_id).await {
            Ok(snapshot) if snapshot.is_fully_completed() => {
                info!("Scan {} fully completed", self.scan_id);
                let _ = tx.send(TrackEvent::Completed(snapshot));
                Transition::Done
            }
            Ok(_) => {
                info!(
                    "Scan {} almost done, waiting for AI analysis...",
                    self.scan_id
                );
                Transition::Continue
            }
            Err(e) => {
                error!("Scan {}: snapshot refetch failed: {e}", self.scan_id);
                let _ = tx.send(TrackEvent::Failed(format!("Scan failed: {e}")));
                Transition::Done
            }
        }
    }

    /// Free the user and tear down the subscription. Idempotent: removing an
    /// already-removed user and unsubscribing a closed stream are no-ops.
    fn release(&self) {
        if self.active_users.lock().unwrap().remove(&self.user_id) {
            info!("User {} removed from active scans", self.user_id);
        }
        self.stream.unsubscribe(&self.scan_id);
        info!("Unsubscribed from scan {} updates", self.scan_id);
    }
}
