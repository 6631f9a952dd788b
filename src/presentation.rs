//! # Presentation Module
//!
//! Pure formatting of stored content into outbound replies. Nothing here
//! touches the store or Telegram; the adapter in [`crate::bot`] turns the
//! [`Outbound`] values into Bot API calls.

use std::sync::LazyLock;

use regex::Regex;
use teloxide::types::UserId;

use crate::admin::AdminRegistry;
use crate::commands::COMMAND_DESCRIPTIONS;
use crate::content::{telegram_len, Appeal, PhotoRef, SlotContent};
use crate::localization::{supported_languages, t_args_lang, t_lang};
use crate::sections::{Section, SectionRegistry};

/// Telegram accepts at most ten items per media group
pub const MEDIA_GROUP_LIMIT: usize = 10;

/// Longest text message Telegram delivers, in UTF-16 code units
pub const MESSAGE_LIMIT: usize = 4096;

/// Buttons per row of the section keyboards
const SECTION_BUTTONS_PER_ROW: usize = 2;

static CALLBACK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(section|admin_set):([A-Za-z0-9_-]+)$").expect("callback pattern is valid")
});

/// A button attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

/// Keyboard attached to a text reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard, one label per button
    Reply(Vec<Vec<String>>),
    /// Inline buttons carrying callback data
    Inline(Vec<Vec<InlineButton>>),
    /// Hide the reply keyboard
    Remove,
}

/// One outbound action produced for an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        photo: PhotoRef,
        caption: Option<String>,
    },
    /// Two to ten photos sent as one album
    PhotoGroup {
        photos: Vec<PhotoRef>,
        caption: Option<String>,
    },
    /// Stop polling after the replies are delivered
    Shutdown,
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn text_with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Outbound::Text {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Text body or caption of the reply
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Outbound::Text { text, .. } => Some(text),
            Outbound::Photo { caption, .. } | Outbound::PhotoGroup { caption, .. } => {
                caption.as_deref()
            }
            Outbound::Shutdown => None,
        }
    }

    /// Number of images carried by the reply
    pub fn photo_count(&self) -> usize {
        match self {
            Outbound::Photo { .. } => 1,
            Outbound::PhotoGroup { photos, .. } => photos.len(),
            _ => 0,
        }
    }
}

/// Decoded callback data of an inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `section:<id>`: show a section to anyone
    ShowSection(String),
    /// `admin_set:<id>`: pick the section to update in the wizard
    AdminSelect(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let captures = CALLBACK_PATTERN.captures(data)?;
        let id = captures[2].to_string();
        match &captures[1] {
            "section" => Some(CallbackAction::ShowSection(id)),
            "admin_set" => Some(CallbackAction::AdminSelect(id)),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::ShowSection(id) => format!("section:{id}"),
            CallbackAction::AdminSelect(id) => format!("admin_set:{id}"),
        }
    }
}

/// Entries of the main reply keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Faq,
    Comfort,
    Directorate,
    Map,
    Menu,
    Program,
}

impl MenuItem {
    pub const ALL: [MenuItem; 6] = [
        MenuItem::Faq,
        MenuItem::Comfort,
        MenuItem::Directorate,
        MenuItem::Map,
        MenuItem::Menu,
        MenuItem::Program,
    ];

    pub fn label_key(self) -> &'static str {
        match self {
            MenuItem::Faq => "menu-faq",
            MenuItem::Comfort => "menu-comfort",
            MenuItem::Directorate => "menu-directorate",
            MenuItem::Map => "menu-map",
            MenuItem::Menu => "menu-menu",
            MenuItem::Program => "menu-program",
        }
    }

    /// Match a button label in any supported language
    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        supported_languages().find_map(|language| {
            Self::ALL
                .into_iter()
                .find(|item| t_lang(item.label_key(), Some(language)) == text)
        })
    }
}

pub fn main_menu_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Reply(
        MenuItem::ALL
            .iter()
            .map(|item| vec![t_lang(item.label_key(), language_code)])
            .collect(),
    )
}

/// Inline keyboard listing every section, two per row
pub fn section_keyboard(
    sections: &SectionRegistry,
    action: impl Fn(String) -> CallbackAction,
) -> Keyboard {
    let buttons: Vec<InlineButton> = sections
        .iter()
        .map(|section| InlineButton {
            label: section.name.clone(),
            data: action(section.id.clone()).encode(),
        })
        .collect();
    Keyboard::Inline(
        buttons
            .chunks(SECTION_BUTTONS_PER_ROW)
            .map(<[InlineButton]>::to_vec)
            .collect(),
    )
}

/// Split `text` into messages of at most [`MESSAGE_LIMIT`], breaking
/// between lines where possible
pub fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = telegram_len(line);
        if current_len + line_len > MESSAGE_LIMIT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= MESSAGE_LIMIT {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        for ch in line.chars() {
            if current_len + ch.len_utf16() > MESSAGE_LIMIT {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += ch.len_utf16();
        }
    }
    chunks.push(current);

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end_matches('\n').to_string())
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

/// Plain text replies, split to fit Telegram's message limit
pub fn text_replies(text: &str) -> Vec<Outbound> {
    split_message(text).into_iter().map(Outbound::text).collect()
}

/// Photo replies for a sequence: one photo alone, more as albums of ten
///
/// Only the first photo carries the caption.
pub fn photo_replies(photos: &[PhotoRef], caption: Option<String>) -> Vec<Outbound> {
    match photos {
        [] => Vec::new(),
        [photo] => vec![Outbound::Photo {
            photo: photo.clone(),
            caption,
        }],
        _ => {
            let mut caption = caption;
            photos
                .chunks(MEDIA_GROUP_LIMIT)
                .map(|chunk| match chunk {
                    [photo] => Outbound::Photo {
                        photo: photo.clone(),
                        caption: caption.take(),
                    },
                    _ => Outbound::PhotoGroup {
                        photos: chunk.to_vec(),
                        caption: caption.take(),
                    },
                })
                .collect()
        }
    }
}

pub fn welcome(language_code: Option<&str>) -> Vec<Outbound> {
    let text = [
        t_lang("welcome-greeting", language_code),
        t_lang("welcome-features", language_code),
        t_lang("welcome-choose", language_code),
    ]
    .join("\n\n");
    vec![Outbound::text_with_keyboard(
        text,
        main_menu_keyboard(language_code),
    )]
}

pub fn render_faq(content: Option<&SlotContent>, language_code: Option<&str>) -> Vec<Outbound> {
    let body = content
        .and_then(SlotContent::display_text)
        .map(str::to_string)
        .unwrap_or_else(|| t_lang("faq-empty", language_code));
    let text = format!(
        "{}\n\n{}\n\n{}",
        t_lang("faq-header", language_code),
        body,
        t_lang("faq-footer", language_code)
    );
    text_replies(&text)
}

pub fn render_menu(content: Option<&SlotContent>, language_code: Option<&str>) -> Vec<Outbound> {
    let header = t_lang("menu-header", language_code);
    let text = content.and_then(SlotContent::display_text);
    let photos = content.map(|c| c.photos.as_slice()).unwrap_or_default();

    let mut replies = match text {
        Some(text) => text_replies(&format!("{header}\n\n{text}")),
        None if photos.is_empty() => vec![Outbound::text(format!(
            "{header}\n\n{}",
            t_lang("menu-missing", language_code)
        ))],
        None => vec![Outbound::text(header)],
    };
    replies.extend(photo_replies(photos, None));
    replies
}

pub fn render_map(content: Option<&SlotContent>, language_code: Option<&str>) -> Vec<Outbound> {
    let mut replies = vec![Outbound::text(t_lang("map-caption", language_code))];
    match content.map(|c| c.photos.as_slice()).unwrap_or_default() {
        [] => replies.push(Outbound::text(t_lang("map-missing", language_code))),
        photos => replies.extend(photo_replies(photos, None)),
    }
    replies
}

pub fn render_program(content: Option<&SlotContent>, language_code: Option<&str>) -> Vec<Outbound> {
    let header = t_lang("program-header", language_code);
    match content.map(|c| c.photos.as_slice()).unwrap_or_default() {
        [] => vec![Outbound::text(format!(
            "{header}\n\n{}",
            t_lang("program-missing", language_code)
        ))],
        photos => {
            let mut replies = vec![Outbound::text(header)];
            replies.extend(photo_replies(photos, None));
            replies
        }
    }
}

/// Directorate intro, group photos, then the section picker
pub fn render_directorate(
    content: Option<&SlotContent>,
    sections: &SectionRegistry,
    language_code: Option<&str>,
) -> Vec<Outbound> {
    let mut replies = vec![Outbound::text(t_lang("directorate-intro", language_code))];
    let photos = content.map(|c| c.photos.as_slice()).unwrap_or_default();
    replies.extend(photo_replies(photos, None));
    replies.push(Outbound::text_with_keyboard(
        t_lang("directorate-choose", language_code),
        section_keyboard(sections, CallbackAction::ShowSection),
    ));
    replies
}

/// Section name and description, then its photos or a notice
pub fn render_section(
    section: &Section,
    content: Option<&SlotContent>,
    language_code: Option<&str>,
) -> Vec<Outbound> {
    let description = content
        .and_then(SlotContent::display_text)
        .map(str::to_string)
        .unwrap_or_else(|| t_lang("section-no-description", language_code));
    let mut replies = text_replies(&format!("📌 {}\n\n{}", section.name, description));

    match content.map(|c| c.photos.as_slice()).unwrap_or_default() {
        [] => replies.push(Outbound::text(t_lang("section-no-photos", language_code))),
        photos => replies.extend(photo_replies(photos, Some(section.name.clone()))),
    }
    replies
}

pub fn render_help(is_admin: bool, language_code: Option<&str>) -> String {
    let mut lines = vec![t_lang("help-title", language_code)];
    lines.extend(
        COMMAND_DESCRIPTIONS
            .iter()
            .filter(|(_, _, admin_only)| !admin_only)
            .map(|(name, key, _)| format!("/{name} - {}", t_lang(key, language_code))),
    );
    lines.push(t_lang("help-buttons", language_code));

    if is_admin {
        lines.push(String::new());
        lines.push(t_lang("help-admin-title", language_code));
        lines.extend(
            COMMAND_DESCRIPTIONS
                .iter()
                .filter(|(_, _, admin_only)| *admin_only)
                .map(|(name, key, _)| format!("/{name} - {}", t_lang(key, language_code))),
        );
    }
    lines.join("\n")
}

pub fn render_admin_list(admins: &AdminRegistry, language_code: Option<&str>) -> String {
    let mut lines = vec![t_lang("admins-title", language_code)];
    for id in admins.list() {
        if admins.is_primary(id) {
            lines.push(format!("• {id} {}", t_lang("admins-primary", language_code)));
        } else {
            lines.push(format!("• {id}"));
        }
    }
    lines.join("\n")
}

pub fn render_appeals(appeals: &[Appeal], language_code: Option<&str>) -> String {
    if appeals.is_empty() {
        return t_lang("appeals-empty", language_code);
    }
    let count = appeals.len().to_string();
    let mut text = t_args_lang("appeals-title", &[("count", &count)], language_code);
    for appeal in appeals {
        text.push_str(&format!(
            "\n\n🕒 {} · {} ({})\n{}",
            appeal.timestamp.format("%d.%m %H:%M"),
            appeal.sender_display_name,
            appeal.sender_id,
            appeal.text
        ));
    }
    text
}

/// Message fanned out to admins for a new appeal
pub fn appeal_notification(appeal: &Appeal, language_code: Option<&str>) -> String {
    let sender_id = appeal.sender_id.to_string();
    t_args_lang(
        "appeal-notification",
        &[
            ("sender", &appeal.sender_display_name),
            ("sender_id", &sender_id),
            ("text", &appeal.text),
        ],
        language_code,
    )
}

/// Display name used in logs and appeal notifications
pub fn display_name(username: Option<&str>, full_name: &str, id: UserId) -> String {
    match username {
        Some(username) if !username.is_empty() => format!("@{username}"),
        _ if !full_name.trim().is_empty() => full_name.trim().to_string(),
        _ => id.to_string(),
    }
}
