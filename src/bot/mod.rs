//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Converts incoming messages and downloads image documents
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `ui_builder`: Builds keyboards and sends router replies
//! - `media`: Downloads and stores images
//! - `notifier`: Sends admin notifications

pub mod callback_handler;
pub mod media;
pub mod message_handler;
pub mod notifier;
pub mod ui_builder;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::router::Assistant;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
pub use notifier::TelegramNotifier;

/// Router wired to Telegram delivery
pub type ForumAssistant<S> = Assistant<S, TelegramNotifier>;

/// Shared state of the Telegram adapter
pub struct BotContext {
    /// Root directory for downloaded images
    pub media_dir: PathBuf,
    /// Notified when an admin asks the bot to stop
    pub shutdown: Arc<Notify>,
}

impl BotContext {
    pub fn new(media_dir: PathBuf) -> Self {
        Self {
            media_dir,
            shutdown: Arc::new(Notify::new()),
        }
    }
}
