//! UI Builder module: turns router replies into Bot API calls

use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto,
    KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup,
};
use tracing::{debug, error};

use crate::content::PhotoRef;
use crate::presentation::{Keyboard, Outbound};

use super::BotContext;

/// Convert a keyboard description into Telegram markup
pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>()),
            )
            .resize_keyboard(),
        ),
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(
            rows.iter().map(|row| {
                row.iter()
                    .map(|button| {
                        InlineKeyboardButton::callback(button.label.clone(), button.data.clone())
                    })
                    .collect::<Vec<_>>()
            }),
        )),
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

fn input_file(photo: &PhotoRef) -> InputFile {
    match photo {
        PhotoRef::Telegram(file_id) => InputFile::file_id(FileId(file_id.clone())),
        PhotoRef::Local(path) => InputFile::file(path.clone()),
    }
}

/// Send every reply in order
///
/// A failed photo is logged and skipped so the remaining replies still go
/// out; text failures are returned to the dispatcher.
pub async fn send_replies(
    bot: &Bot,
    chat_id: ChatId,
    replies: Vec<Outbound>,
    ctx: &BotContext,
) -> anyhow::Result<()> {
    for reply in replies {
        match reply {
            Outbound::Text { text, keyboard } => {
                let request = bot.send_message(chat_id, text);
                match keyboard {
                    Some(keyboard) => request.reply_markup(reply_markup(&keyboard)).await?,
                    None => request.await?,
                };
            }
            Outbound::Photo { photo, caption } => {
                let mut request = bot.send_photo(chat_id, input_file(&photo));
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                if let Err(e) = request.await {
                    error!(user_id = %chat_id, photo = ?photo, error = %e, "Failed to send photo");
                }
            }
            Outbound::PhotoGroup { photos, caption } => {
                let mut caption = caption;
                let media: Vec<InputMedia> = photos
                    .iter()
                    .map(|photo| {
                        let item = InputMediaPhoto::new(input_file(photo));
                        let item = match caption.take() {
                            Some(caption) => item.caption(caption),
                            None => item,
                        };
                        InputMedia::Photo(item)
                    })
                    .collect();
                if let Err(e) = bot.send_media_group(chat_id, media).await {
                    error!(
                        user_id = %chat_id,
                        photos = photos.len(),
                        error = %e,
                        "Failed to send media group"
                    );
                }
            }
            Outbound::Shutdown => {
                debug!(user_id = %chat_id, "Signalling dispatcher shutdown");
                ctx.shutdown.notify_one();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::InlineButton;

    #[test]
    fn test_inline_keyboard_keeps_layout() {
        let keyboard = Keyboard::Inline(vec![
            vec![
                InlineButton {
                    label: "Press".to_string(),
                    data: "section:press".to_string(),
                },
                InlineButton {
                    label: "Food".to_string(),
                    data: "section:food".to_string(),
                },
            ],
            vec![InlineButton {
                label: "Edu".to_string(),
                data: "section:edu".to_string(),
            }],
        ]);
        match reply_markup(&keyboard) {
            ReplyMarkup::InlineKeyboard(markup) => {
                assert_eq!(markup.inline_keyboard.len(), 2);
                assert_eq!(markup.inline_keyboard[0].len(), 2);
                assert_eq!(markup.inline_keyboard[0][0].text, "Press");
            }
            other => panic!("unexpected markup {other:?}"),
        }
    }

    #[test]
    fn test_reply_keyboard_one_label_per_row() {
        let keyboard = Keyboard::Reply(vec![vec!["FAQ".to_string()], vec!["Map".to_string()]]);
        match reply_markup(&keyboard) {
            ReplyMarkup::Keyboard(markup) => {
                assert_eq!(markup.keyboard.len(), 2);
                assert_eq!(markup.keyboard[1][0].text, "Map");
            }
            other => panic!("unexpected markup {other:?}"),
        }
    }
}
