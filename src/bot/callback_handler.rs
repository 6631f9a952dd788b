//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::dialogue::ConversationDialogue;
use crate::router::{Inbound, InboundKind, Sender};
use crate::store::ContentStore;

use super::ui_builder::send_replies;
use super::{BotContext, ForumAssistant};

/// Handle callback queries from inline keyboards
pub async fn callback_handler<S: ContentStore + 'static>(
    bot: Bot,
    q: CallbackQuery,
    dialogue: ConversationDialogue,
    assistant: Arc<ForumAssistant<S>>,
    ctx: Arc<BotContext>,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Stop the button spinner before doing any work
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    let inbound = Inbound::new(Sender::from_user(&q.from), InboundKind::Callback(data));
    let replies = assistant.handle(inbound, &dialogue).await?;
    send_replies(&bot, chat_id, replies, &ctx).await
}
