use anyhow::Result;
use teloxide::prelude::*;

use crate::appeal::Notifier;
use crate::presentation::split_message;

/// Delivers admin notifications as private messages
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: UserId, text: &str) -> Result<()> {
        for chunk in split_message(text) {
            self.bot.send_message(ChatId::from(recipient), chunk).await?;
        }
        Ok(())
    }
}
