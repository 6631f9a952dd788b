//! Conversation state for every sender, and the content upload wizard.
//!
//! The wizard is a small state machine driven by explicit transition
//! functions. They are pure: committing to the store and replying is left to
//! the router, which makes every step testable without Telegram.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::content::{telegram_len, PhotoRef, SlotContent, SlotId, TextPolicy, MAX_TEXT_LEN};

/// Where a sender currently is in a conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    /// The next text message is a household appeal
    AwaitingAppeal,
    /// An admin has to pick the section to update
    SelectingSection,
    /// An admin has to send the replacement text
    CollectingText { slot: SlotId },
    /// An admin is sending photos until `/done`
    CollectingPhotos {
        slot: SlotId,
        text: Option<String>,
        photos: Vec<PhotoRef>,
    },
}

/// Type alias for the per-chat dialogue handle
pub type ConversationDialogue = Dialogue<ConversationState, InMemStorage<ConversationState>>;

/// Why the wizard refused an input; the state is left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No upload is in progress
    NoSession,
    /// Waiting for a section choice
    SectionExpected,
    /// The chosen section is not registered
    UnknownSection,
    /// Waiting for text, not photos or `/done`
    TextExpected,
    /// Text was blank
    EmptyText,
    /// Text is longer than [`MAX_TEXT_LEN`]
    TextTooLong,
    /// Waiting for photos or `/done`, not text
    PhotoExpected,
    /// The slot cannot hold more photos
    PhotoLimitReached,
    /// `/skip` on a slot whose text is mandatory
    TextNotSkippable,
}

/// Result of feeding one input to the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    /// Move to the next state and prompt for its input
    Advance(ConversationState),
    /// A photo joined the pending list
    PhotoAccepted {
        state: ConversationState,
        count: usize,
    },
    /// Everything is collected, replace the slot
    Commit { slot: SlotId, content: SlotContent },
    Rejected(Rejection),
}

/// First wizard state for an upload into `slot`
pub fn start_upload(slot: SlotId) -> ConversationState {
    if slot.shape().accepts_text() {
        ConversationState::CollectingText { slot }
    } else {
        ConversationState::CollectingPhotos {
            slot,
            text: None,
            photos: Vec::new(),
        }
    }
}

impl ConversationState {
    /// Returns `true` while an admin upload is in progress
    pub fn is_wizard(&self) -> bool {
        matches!(
            self,
            ConversationState::SelectingSection
                | ConversationState::CollectingText { .. }
                | ConversationState::CollectingPhotos { .. }
        )
    }

    /// Returns `true` if a photo sent now would be used by the wizard
    pub fn accepts_photos(&self) -> bool {
        match self {
            ConversationState::CollectingPhotos { slot, photos, .. } => {
                !slot.shape().photo_limit_reached(photos.len())
            }
            ConversationState::CollectingText { slot } => {
                let shape = slot.shape();
                shape.text == TextPolicy::Optional && shape.accepts_photos()
            }
            _ => false,
        }
    }

    /// Slot targeted by the current upload
    pub fn pending_slot(&self) -> Option<&SlotId> {
        match self {
            ConversationState::CollectingText { slot }
            | ConversationState::CollectingPhotos { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Photos collected but not yet committed
    pub fn pending_photos(&self) -> &[PhotoRef] {
        match self {
            ConversationState::CollectingPhotos { photos, .. } => photos,
            _ => &[],
        }
    }

    /// Section chosen from the admin keyboard
    pub fn select_section(self, section_id: &str, known: bool) -> WizardStep {
        match self {
            ConversationState::SelectingSection if known => {
                WizardStep::Advance(start_upload(SlotId::Section(section_id.to_string())))
            }
            ConversationState::SelectingSection => WizardStep::Rejected(Rejection::UnknownSection),
            _ => WizardStep::Rejected(Rejection::NoSession),
        }
    }

    /// Replacement text sent by the admin
    pub fn submit_text(self, text: &str) -> WizardStep {
        match self {
            ConversationState::CollectingText { slot } => {
                let text = text.trim();
                if text.is_empty() {
                    return WizardStep::Rejected(Rejection::EmptyText);
                }
                if telegram_len(text) > MAX_TEXT_LEN {
                    return WizardStep::Rejected(Rejection::TextTooLong);
                }
                if slot.shape().accepts_photos() {
                    WizardStep::Advance(ConversationState::CollectingPhotos {
                        slot,
                        text: Some(text.to_string()),
                        photos: Vec::new(),
                    })
                } else {
                    WizardStep::Commit {
                        slot,
                        content: SlotContent::text(text),
                    }
                }
            }
            ConversationState::SelectingSection => WizardStep::Rejected(Rejection::SectionExpected),
            ConversationState::CollectingPhotos { .. } => {
                WizardStep::Rejected(Rejection::PhotoExpected)
            }
            ConversationState::Idle | ConversationState::AwaitingAppeal => {
                WizardStep::Rejected(Rejection::NoSession)
            }
        }
    }

    /// `/skip` while the wizard waits for optional text
    pub fn skip_text(self) -> WizardStep {
        match self {
            ConversationState::CollectingText { slot } => {
                if slot.shape().text == TextPolicy::Optional {
                    WizardStep::Advance(ConversationState::CollectingPhotos {
                        slot,
                        text: None,
                        photos: Vec::new(),
                    })
                } else {
                    WizardStep::Rejected(Rejection::TextNotSkippable)
                }
            }
            ConversationState::SelectingSection => WizardStep::Rejected(Rejection::SectionExpected),
            ConversationState::CollectingPhotos { .. } => {
                WizardStep::Rejected(Rejection::PhotoExpected)
            }
            ConversationState::Idle | ConversationState::AwaitingAppeal => {
                WizardStep::Rejected(Rejection::NoSession)
            }
        }
    }

    /// A photo sent by the admin
    pub fn submit_photo(self, photo: PhotoRef) -> WizardStep {
        match self {
            ConversationState::CollectingPhotos {
                slot,
                text,
                mut photos,
            } => {
                if slot.shape().photo_limit_reached(photos.len()) {
                    return WizardStep::Rejected(Rejection::PhotoLimitReached);
                }
                photos.push(photo);
                let count = photos.len();
                WizardStep::PhotoAccepted {
                    state: ConversationState::CollectingPhotos { slot, text, photos },
                    count,
                }
            }
            state @ ConversationState::CollectingText { .. } if state.accepts_photos() => {
                match state.skip_text() {
                    WizardStep::Advance(next) => next.submit_photo(photo),
                    other => other,
                }
            }
            ConversationState::CollectingText { .. } => {
                WizardStep::Rejected(Rejection::TextExpected)
            }
            ConversationState::SelectingSection => WizardStep::Rejected(Rejection::SectionExpected),
            ConversationState::Idle | ConversationState::AwaitingAppeal => {
                WizardStep::Rejected(Rejection::NoSession)
            }
        }
    }

    /// `/done`: flush pending text and photos as one replacement
    pub fn finish(self) -> WizardStep {
        match self {
            ConversationState::CollectingPhotos { slot, text, photos } => WizardStep::Commit {
                slot,
                content: SlotContent { text, photos },
            },
            ConversationState::CollectingText { .. } => {
                WizardStep::Rejected(Rejection::TextExpected)
            }
            ConversationState::SelectingSection => WizardStep::Rejected(Rejection::SectionExpected),
            ConversationState::Idle | ConversationState::AwaitingAppeal => {
                WizardStep::Rejected(Rejection::NoSession)
            }
        }
    }
}
