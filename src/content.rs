//! # Content Model
//!
//! Slots are the named units of editable content the bot serves: the FAQ,
//! the daily menu, the territory map, the daily program, the directorate
//! photos and one slot per registered section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use teloxide::types::UserId;

/// Maximum number of photos accepted for the daily program
pub const PROGRAM_PHOTO_LIMIT: usize = 4;

/// Longest slot text or appeal accepted, in UTF-16 code units as Telegram
/// counts them. Leaves room for view headers inside one 4096 unit message.
pub const MAX_TEXT_LEN: usize = 3500;

/// Length of `text` as Telegram measures message limits
pub fn telegram_len(text: &str) -> usize {
    text.encode_utf16().count()
}

const SECTION_KEY_PREFIX: &str = "section:";

/// Identifier of a content slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    Faq,
    Menu,
    Map,
    Program,
    Directorate,
    Section(String),
}

/// Whether a slot carries text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPolicy {
    Required,
    Optional,
    None,
}

/// How many photos a slot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoPolicy {
    None,
    UpTo(usize),
    Unlimited,
}

/// What the upload wizard collects for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotShape {
    pub text: TextPolicy,
    pub photos: PhotoPolicy,
}

impl SlotShape {
    pub fn accepts_text(&self) -> bool {
        self.text != TextPolicy::None
    }

    pub fn accepts_photos(&self) -> bool {
        self.photos != PhotoPolicy::None
    }

    /// Returns `true` if `count` photos already fill the slot
    pub fn photo_limit_reached(&self, count: usize) -> bool {
        match self.photos {
            PhotoPolicy::None => true,
            PhotoPolicy::UpTo(limit) => count >= limit,
            PhotoPolicy::Unlimited => false,
        }
    }
}

impl SlotId {
    /// Content shape of the slot
    pub fn shape(&self) -> SlotShape {
        match self {
            SlotId::Faq => SlotShape {
                text: TextPolicy::Required,
                photos: PhotoPolicy::None,
            },
            SlotId::Menu => SlotShape {
                text: TextPolicy::Optional,
                photos: PhotoPolicy::UpTo(1),
            },
            SlotId::Map => SlotShape {
                text: TextPolicy::None,
                photos: PhotoPolicy::UpTo(1),
            },
            SlotId::Program => SlotShape {
                text: TextPolicy::None,
                photos: PhotoPolicy::UpTo(PROGRAM_PHOTO_LIMIT),
            },
            SlotId::Directorate => SlotShape {
                text: TextPolicy::None,
                photos: PhotoPolicy::Unlimited,
            },
            SlotId::Section(_) => SlotShape {
                text: TextPolicy::Required,
                photos: PhotoPolicy::Unlimited,
            },
        }
    }

    /// Storage key used by every backend
    pub fn storage_key(&self) -> String {
        match self {
            SlotId::Faq => "faq".to_string(),
            SlotId::Menu => "menu".to_string(),
            SlotId::Map => "map".to_string(),
            SlotId::Program => "program".to_string(),
            SlotId::Directorate => "directorate".to_string(),
            SlotId::Section(id) => format!("{SECTION_KEY_PREFIX}{id}"),
        }
    }

    /// Parse a storage key back into a slot id
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            "faq" => Some(SlotId::Faq),
            "menu" => Some(SlotId::Menu),
            "map" => Some(SlotId::Map),
            "program" => Some(SlotId::Program),
            "directorate" => Some(SlotId::Directorate),
            other => other
                .strip_prefix(SECTION_KEY_PREFIX)
                .filter(|id| !id.is_empty())
                .map(|id| SlotId::Section(id.to_string())),
        }
    }

    /// Directory name used for downloaded media of this slot
    pub fn media_dir_name(&self) -> String {
        match self {
            SlotId::Section(id) => format!("section-{id}"),
            other => other.storage_key(),
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Reference to an image the bot can send back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PhotoRef {
    /// A Telegram file id of a photo previously sent to the bot
    Telegram(String),
    /// An image file on local disk
    Local(PathBuf),
}

impl PhotoRef {
    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            PhotoRef::Local(path) => Some(path),
            PhotoRef::Telegram(_) => None,
        }
    }
}

/// Stored content of a slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

impl SlotContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            photos: Vec::new(),
        }
    }

    pub fn photos(photos: Vec<PhotoRef>) -> Self {
        Self { text: None, photos }
    }

    /// Text with surrounding whitespace removed, `None` when blank
    pub fn display_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// A household complaint submitted by a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub timestamp: DateTime<Utc>,
    pub sender_id: UserId,
    pub sender_display_name: String,
    pub text: String,
}

impl Appeal {
    pub fn new(sender_id: UserId, sender_display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            sender_id,
            sender_display_name: sender_display_name.into(),
            text: text.into(),
        }
    }
}
