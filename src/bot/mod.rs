//! Bot module containing message handling and presentation
//!
//! This module wires the Telegram side of the bot: command routing, scan
//! creation from text and photos, and the per-chat scan flow that mirrors
//! tracker events into messages.

use std::sync::Arc;

use crate::pomelo_client::PomeloClient;
use crate::scan_tracker::{ScanTracker, SnapshotSource};
use crate::status_stream::{StatusSource, StatusStream};

pub mod message_handler;
pub mod scan_flow;
pub mod ui_builder;

// Re-export the dispatcher entry point
pub use message_handler::message_handler;

/// Shared services available to every handler
pub struct BotContext {
    /// Remote scan API client
    pub client: Arc<PomeloClient>,
    /// Scan lifecycle tracker
    pub tracker: ScanTracker,
}

impl BotContext {
    /// Wire the tracker over the shared client and stream
    pub fn new(client: Arc<PomeloClient>, stream: Arc<StatusStream>) -> Self {
        let tracker = ScanTracker::new(
            Arc::clone(&client) as Arc<dyn SnapshotSource>,
            stream as Arc<dyn StatusSource>,
        );
        Self { client, tracker }
    }
}
