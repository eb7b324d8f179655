//! # Pomelo Telegram Bot
//!
//! A Telegram bot that forwards product ingredient lists (text or photos) to
//! the Pomelo analysis API, tracks the asynchronous scan until its AI
//! enrichment is attached, and renders the verdict back into the chat.

pub mod adi_chart;
pub mod bot;
pub mod localization;
pub mod pomelo_client;
pub mod scan_errors;
pub mod scan_model;
pub mod scan_tracker;
pub mod status_stream;
