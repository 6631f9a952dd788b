//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Document;
use tracing::{debug, error, info, warn};

use crate::content::PhotoRef;
use crate::dialogue::ConversationDialogue;
use crate::localization::t_lang;
use crate::presentation::Outbound;
use crate::router::{Inbound, InboundKind, Sender};
use crate::store::ContentStore;

use super::media::{download_file, store_image, MAX_DOCUMENT_BYTES};
use super::ui_builder::send_replies;
use super::{BotContext, ForumAssistant};

/// Outcome of looking at a document before routing
enum DocumentIntake {
    Routed(InboundKind),
    Replied(Vec<Outbound>),
}

pub async fn message_handler<S: ContentStore + 'static>(
    bot: Bot,
    msg: Message,
    dialogue: ConversationDialogue,
    assistant: Arc<ForumAssistant<S>>,
    ctx: Arc<BotContext>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let sender = Sender::from_user(user);
    let language_code = sender.language_code.clone();

    let kind = if let Some(text) = msg.text() {
        debug!(user_id = %sender.id, message_length = text.len(), "Received text message from user");
        InboundKind::Text(text.to_string())
    } else if let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) {
        debug!(user_id = %sender.id, "Received photo message from user");
        InboundKind::Photo(PhotoRef::Telegram(largest_photo.file.id.0.clone()))
    } else if let Some(doc) = msg.document() {
        match handle_document(&bot, doc, &sender, &dialogue, &ctx, language_code.as_deref()).await? {
            DocumentIntake::Routed(kind) => kind,
            DocumentIntake::Replied(replies) => {
                return send_replies(&bot, msg.chat.id, replies, &ctx).await;
            }
        }
    } else {
        InboundKind::Unsupported
    };

    let reply_to = msg
        .reply_to_message()
        .and_then(|replied| replied.from.as_ref())
        .map(Sender::from_user);

    let replies = assistant
        .handle(
            Inbound {
                sender,
                kind,
                reply_to,
            },
            &dialogue,
        )
        .await?;
    send_replies(&bot, msg.chat.id, replies, &ctx).await
}

/// Download an image document when the sender's upload can use it
async fn handle_document(
    bot: &Bot,
    doc: &Document,
    sender: &Sender,
    dialogue: &ConversationDialogue,
    ctx: &BotContext,
    language_code: Option<&str>,
) -> Result<DocumentIntake> {
    let is_image = doc
        .mime_type
        .as_ref()
        .map(|mime| mime.to_string().starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        debug!(user_id = %sender.id, "Received non-image document from user");
        return Ok(DocumentIntake::Routed(InboundKind::Document));
    }

    let state = dialogue.get().await?.unwrap_or_default();
    let Some(slot) = state.pending_slot().filter(|_| state.accepts_photos()) else {
        // Let the router explain what it expects instead
        return Ok(DocumentIntake::Routed(InboundKind::Document));
    };

    if doc.file.size > MAX_DOCUMENT_BYTES {
        warn!(user_id = %sender.id, size = doc.file.size, "Image document too large");
        return Ok(DocumentIntake::Replied(vec![Outbound::text(t_lang(
            "document-too-large",
            language_code,
        ))]));
    }

    let bytes = match download_file(bot, doc.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = %sender.id, error = %e, "Failed to download image document");
            return Ok(DocumentIntake::Replied(vec![Outbound::text(t_lang(
                "download-failed",
                language_code,
            ))]));
        }
    };

    match store_image(&bytes, &ctx.media_dir.join(slot.media_dir_name())) {
        Ok(path) => {
            info!(user_id = %sender.id, slot = %slot, path = %path.display(), "Stored image document");
            Ok(DocumentIntake::Routed(InboundKind::Photo(PhotoRef::Local(path))))
        }
        Err(e) => {
            warn!(user_id = %sender.id, error = %e, "Rejected image document");
            Ok(DocumentIntake::Replied(vec![Outbound::text(t_lang(
                "document-rejected",
                language_code,
            ))]))
        }
    }
}
