//! # Conversation Router
//!
//! Dispatches one inbound event to exactly one handler, based on the event
//! shape and the sender's conversation state, and returns the replies to
//! send. The router knows nothing about the Bot API: events come in as
//! [`Inbound`] values and leave as [`Outbound`] values, so every flow can be
//! exercised in tests with an in-memory dialogue storage.

use std::sync::Arc;

use anyhow::Result;
use teloxide::types::{User, UserId};
use tracing::{debug, error, info, warn};

use crate::admin::AdminRegistry;
use crate::appeal::{is_cancellation, relay_appeal, Notifier};
use crate::commands::Command;
use crate::content::{
    telegram_len, Appeal, PhotoPolicy, PhotoRef, SlotContent, SlotId, MAX_TEXT_LEN,
};
use crate::dialogue::{start_upload, ConversationDialogue, ConversationState, Rejection, WizardStep};
use crate::localization::{t_args_lang, t_lang};
use crate::presentation::{
    display_name, main_menu_keyboard, render_admin_list, render_appeals, render_directorate,
    render_faq, render_help, render_map, render_menu, render_program, render_section,
    section_keyboard, text_replies, welcome, CallbackAction, Keyboard, MenuItem, Outbound,
};
use crate::sections::SectionRegistry;
use crate::store::ContentStore;

/// Upper bound for `/appeals <n>`
const MAX_APPEALS_PAGE: usize = 100;

/// Who sent an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub display_name: String,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            language_code: None,
        }
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: display_name(user.username.as_deref(), &user.full_name(), user.id),
            language_code: user.language_code.clone(),
        }
    }
}

/// Shape of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Text message, including commands and keyboard labels
    Text(String),
    /// Inline button press with its callback data
    Callback(String),
    /// Photo, or an image document already downloaded
    Photo(PhotoRef),
    /// Document the bot will not use
    Document,
    /// Anything else (stickers, voice, ...)
    Unsupported,
}

/// An event to route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender: Sender,
    pub kind: InboundKind,
    /// Author of the message this one replies to
    pub reply_to: Option<Sender>,
}

impl Inbound {
    pub fn new(sender: Sender, kind: InboundKind) -> Self {
        Self {
            sender,
            kind,
            reply_to: None,
        }
    }

    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self::new(sender, InboundKind::Text(text.into()))
    }
}

/// Router settings taken from configuration
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Bot username, commands addressed to other bots are ignored
    pub bot_username: String,
    /// Default number of entries for `/appeals`
    pub appeals_page_size: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            bot_username: String::new(),
            appeals_page_size: 10,
        }
    }
}

/// The conversation router with its injected collaborators
pub struct Assistant<S, N> {
    store: Arc<S>,
    admins: Arc<AdminRegistry>,
    sections: Arc<SectionRegistry>,
    notifier: N,
    settings: RouterSettings,
}

impl<S: ContentStore, N: Notifier> Assistant<S, N> {
    pub fn new(
        store: Arc<S>,
        admins: Arc<AdminRegistry>,
        sections: Arc<SectionRegistry>,
        notifier: N,
        settings: RouterSettings,
    ) -> Self {
        Self {
            store,
            admins,
            sections,
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn admins(&self) -> &AdminRegistry {
        &self.admins
    }

    pub fn sections(&self) -> &SectionRegistry {
        &self.sections
    }

    /// Route one event and return the replies for the sender
    pub async fn handle(
        &self,
        inbound: Inbound,
        dialogue: &ConversationDialogue,
    ) -> Result<Vec<Outbound>> {
        let state = dialogue.get().await?.unwrap_or_default();
        let Inbound {
            sender,
            kind,
            reply_to,
        } = inbound;
        let lang = sender.language_code.clone();
        let lang = lang.as_deref();

        // Dialogue state is per chat; in a group only admins may feed an upload
        if state.is_wizard() && !self.admins.is_admin(sender.id) {
            warn!(user_id = %sender.id, "Ignored non-admin input during an upload");
            if let InboundKind::Photo(photo) = &kind {
                remove_local_file(photo);
            }
            return Ok(vec![Outbound::text(t_lang("upload-in-progress", lang))]);
        }

        match kind {
            InboundKind::Text(text) => {
                match Command::parse(&text, &self.settings.bot_username) {
                    Some(command) => {
                        self.handle_command(command, &sender, reply_to.as_ref(), state, dialogue, lang)
                            .await
                    }
                    None => self.handle_text(&text, &sender, state, dialogue, lang).await,
                }
            }
            InboundKind::Callback(data) => {
                self.handle_callback(&data, &sender, state, dialogue, lang).await
            }
            InboundKind::Photo(photo) => self.handle_photo(photo, &sender, state, dialogue, lang).await,
            InboundKind::Document | InboundKind::Unsupported
                if state == ConversationState::AwaitingAppeal =>
            {
                Ok(vec![Outbound::text(t_lang("appeal-text-expected", lang))])
            }
            InboundKind::Document => {
                debug!(user_id = %sender.id, "Received unusable document");
                Ok(vec![Outbound::text(t_lang("document-unsupported", lang))])
            }
            InboundKind::Unsupported => {
                debug!(user_id = %sender.id, "Received unsupported message type");
                Ok(vec![Outbound::text(t_lang("unsupported-message", lang))])
            }
        }
    }

    async fn handle_command(
        &self,
        command: Command,
        sender: &Sender,
        reply_to: Option<&Sender>,
        state: ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        if command.requires_admin() && !self.admins.is_admin(sender.id) {
            warn!(user_id = %sender.id, command = ?command, "Rejected admin command from non-admin");
            return Ok(vec![Outbound::text(t_lang("admin-only", lang))]);
        }
        debug!(user_id = %sender.id, command = ?command, "Handling command");

        match command {
            Command::Start => {
                self.end_conversation(&state, dialogue).await?;
                Ok(welcome(lang))
            }
            Command::Help => Ok(vec![Outbound::text(render_help(
                self.admins.is_admin(sender.id),
                lang,
            ))]),
            Command::Cancel => self.cancel(state, dialogue, lang).await,
            Command::SetFaq => self.begin_upload(SlotId::Faq, &state, dialogue, lang).await,
            Command::SetMap => self.begin_upload(SlotId::Map, &state, dialogue, lang).await,
            Command::SetMenu => self.begin_upload(SlotId::Menu, &state, dialogue, lang).await,
            Command::SetProgram => self.begin_upload(SlotId::Program, &state, dialogue, lang).await,
            Command::SetDirectorate => {
                self.begin_upload(SlotId::Directorate, &state, dialogue, lang).await
            }
            Command::AddInfo => {
                discard_pending_files(&state);
                let next = ConversationState::SelectingSection;
                let replies = self.prompt_for(&next, lang);
                dialogue.update(next).await?;
                Ok(replies)
            }
            Command::Done => {
                let step = state.finish();
                self.apply_step(step, dialogue, lang).await
            }
            Command::Skip => {
                let step = state.skip_text();
                self.apply_step(step, dialogue, lang).await
            }
            Command::AddAdmin(argument) => self.add_admin(argument, reply_to, lang).await,
            Command::Admins => Ok(text_replies(&render_admin_list(&self.admins, lang))),
            Command::Appeals(argument) => {
                let limit = argument
                    .and_then(|arg| arg.parse::<usize>().ok())
                    .unwrap_or(self.settings.appeals_page_size)
                    .clamp(1, MAX_APPEALS_PAGE);
                match self.store.recent_appeals(limit).await {
                    Ok(appeals) => Ok(text_replies(&render_appeals(&appeals, lang))),
                    Err(e) => {
                        error!(user_id = %sender.id, error = %e, "Failed to read appeal log");
                        Ok(vec![Outbound::text(t_lang("storage-error", lang))])
                    }
                }
            }
            Command::Shutdown => {
                info!(user_id = %sender.id, "Shutdown requested by admin");
                Ok(vec![
                    Outbound::text(t_lang("shutdown-ack", lang)),
                    Outbound::Shutdown,
                ])
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        sender: &Sender,
        state: ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        match state {
            ConversationState::AwaitingAppeal => match MenuItem::from_label(text) {
                Some(item) => {
                    dialogue.exit().await?;
                    self.show_menu_item(item, dialogue, lang).await
                }
                None => self.submit_appeal(text, sender, dialogue, lang).await,
            },
            state if state.is_wizard() => {
                let step = state.submit_text(text);
                self.apply_step(step, dialogue, lang).await
            }
            _ => match MenuItem::from_label(text) {
                Some(item) => self.show_menu_item(item, dialogue, lang).await,
                None => Ok(vec![Outbound::text_with_keyboard(
                    t_lang("unknown-text", lang),
                    main_menu_keyboard(lang),
                )]),
            },
        }
    }

    async fn handle_callback(
        &self,
        data: &str,
        sender: &Sender,
        state: ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        match CallbackAction::parse(data) {
            Some(CallbackAction::ShowSection(id)) => match self.sections.get(&id) {
                Some(section) => match self.store.get(&SlotId::Section(id.clone())).await {
                    Ok(content) => Ok(render_section(section, content.as_ref(), lang)),
                    Err(e) => {
                        error!(section = %id, error = %e, "Failed to read section content");
                        Ok(vec![Outbound::text(t_lang("storage-error", lang))])
                    }
                },
                None => Ok(vec![Outbound::text(t_lang("section-unknown", lang))]),
            },
            Some(CallbackAction::AdminSelect(id)) => {
                if !self.admins.is_admin(sender.id) {
                    warn!(user_id = %sender.id, "Rejected section selection from non-admin");
                    return Ok(vec![Outbound::text(t_lang("admin-only", lang))]);
                }
                let step = state.select_section(&id, self.sections.contains(&id));
                self.apply_step(step, dialogue, lang).await
            }
            None => {
                debug!(user_id = %sender.id, data = %data, "Ignoring unknown callback data");
                Ok(Vec::new())
            }
        }
    }

    async fn handle_photo(
        &self,
        photo: PhotoRef,
        sender: &Sender,
        state: ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        match state {
            ConversationState::AwaitingAppeal => {
                remove_local_file(&photo);
                Ok(vec![Outbound::text(t_lang("appeal-text-expected", lang))])
            }
            state if state.is_wizard() => {
                let limit_message = limit_message(&state, lang);
                let step = state.submit_photo(photo.clone());
                if let WizardStep::Rejected(rejection) = step {
                    remove_local_file(&photo);
                    if rejection == Rejection::PhotoLimitReached {
                        if let Some(message) = limit_message {
                            return Ok(vec![Outbound::text(message)]);
                        }
                    }
                }
                self.apply_step(step, dialogue, lang).await
            }
            _ => {
                debug!(user_id = %sender.id, "Received photo outside of an upload");
                remove_local_file(&photo);
                Ok(vec![Outbound::text(t_lang("photo-unexpected", lang))])
            }
        }
    }

    async fn show_menu_item(
        &self,
        item: MenuItem,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        let slot = match item {
            MenuItem::Comfort => {
                dialogue.update(ConversationState::AwaitingAppeal).await?;
                return Ok(vec![Outbound::text(t_lang("comfort-prompt", lang))]);
            }
            MenuItem::Faq => SlotId::Faq,
            MenuItem::Directorate => SlotId::Directorate,
            MenuItem::Map => SlotId::Map,
            MenuItem::Menu => SlotId::Menu,
            MenuItem::Program => SlotId::Program,
        };

        let content = match self.store.get(&slot).await {
            Ok(content) => content,
            Err(e) => {
                error!(slot = %slot, error = %e, "Failed to read slot content");
                return Ok(vec![Outbound::text(t_lang("storage-error", lang))]);
            }
        };
        let content = content.as_ref();

        Ok(match item {
            MenuItem::Faq => render_faq(content, lang),
            MenuItem::Directorate => render_directorate(content, &self.sections, lang),
            MenuItem::Map => render_map(content, lang),
            MenuItem::Menu => render_menu(content, lang),
            MenuItem::Program => render_program(content, lang),
            MenuItem::Comfort => Vec::new(),
        })
    }

    async fn submit_appeal(
        &self,
        text: &str,
        sender: &Sender,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        if text.trim().is_empty() {
            return Ok(vec![Outbound::text(t_lang("appeal-text-expected", lang))]);
        }
        if telegram_len(text.trim()) > MAX_TEXT_LEN {
            let limit = MAX_TEXT_LEN.to_string();
            return Ok(vec![Outbound::text(t_args_lang(
                "appeal-too-long",
                &[("limit", &limit)],
                lang,
            ))]);
        }
        dialogue.exit().await?;

        if is_cancellation(text) {
            return Ok(vec![Outbound::text_with_keyboard(
                t_lang("appeal-cancelled", lang),
                main_menu_keyboard(lang),
            )]);
        }

        let appeal = Appeal::new(sender.id, sender.display_name.clone(), text.trim());
        let recipients = self.admins.list();
        match relay_appeal(self.store.as_ref(), &self.notifier, &recipients, &appeal).await {
            Ok(_report) => Ok(vec![Outbound::text_with_keyboard(
                t_lang("appeal-sent", lang),
                main_menu_keyboard(lang),
            )]),
            Err(e) => {
                error!(user_id = %sender.id, error = %e, "Failed to log appeal");
                Ok(vec![Outbound::text_with_keyboard(
                    t_lang("appeal-failed", lang),
                    main_menu_keyboard(lang),
                )])
            }
        }
    }

    async fn begin_upload(
        &self,
        slot: SlotId,
        state: &ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        discard_pending_files(state);
        let next = start_upload(slot);
        let replies = self.prompt_for(&next, lang);
        dialogue.update(next).await?;
        Ok(replies)
    }

    async fn cancel(
        &self,
        state: ConversationState,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        let key = match &state {
            ConversationState::Idle => "nothing-to-cancel",
            ConversationState::AwaitingAppeal => "appeal-cancelled",
            _ => "wizard-cancelled",
        };
        self.end_conversation(&state, dialogue).await?;
        Ok(vec![Outbound::text_with_keyboard(
            t_lang(key, lang),
            main_menu_keyboard(lang),
        )])
    }

    /// Drop the conversation state and any pending uploads
    async fn end_conversation(
        &self,
        state: &ConversationState,
        dialogue: &ConversationDialogue,
    ) -> Result<()> {
        if *state != ConversationState::Idle {
            discard_pending_files(state);
            dialogue.exit().await?;
        }
        Ok(())
    }

    async fn apply_step(
        &self,
        step: WizardStep,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        match step {
            WizardStep::Advance(next) => {
                let replies = self.prompt_for(&next, lang);
                dialogue.update(next).await?;
                Ok(replies)
            }
            WizardStep::PhotoAccepted { state, count } => {
                dialogue.update(state).await?;
                let count = count.to_string();
                Ok(vec![Outbound::text(t_args_lang(
                    "wizard-photo-added",
                    &[("count", &count)],
                    lang,
                ))])
            }
            WizardStep::Commit { slot, content } => self.commit(slot, content, dialogue, lang).await,
            WizardStep::Rejected(Rejection::TextTooLong) => {
                let limit = MAX_TEXT_LEN.to_string();
                Ok(vec![Outbound::text(t_args_lang(
                    "wizard-text-too-long",
                    &[("limit", &limit)],
                    lang,
                ))])
            }
            WizardStep::Rejected(rejection) => {
                Ok(vec![Outbound::text(t_lang(rejection_key(rejection), lang))])
            }
        }
    }

    /// Replace the slot; on failure keep the session so `/done` can be resent
    async fn commit(
        &self,
        slot: SlotId,
        content: SlotContent,
        dialogue: &ConversationDialogue,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        let previous = match self.store.get(&slot).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Could not read previous content before commit");
                None
            }
        };

        if let Err(e) = self.store.set(&slot, content.clone()).await {
            error!(slot = %slot, error = %e, "Failed to commit slot content");
            return Ok(vec![Outbound::text(t_lang("wizard-save-failed", lang))]);
        }

        info!(
            slot = %slot,
            has_text = content.text.is_some(),
            photos = content.photos.len(),
            "Slot content replaced"
        );
        dialogue.exit().await?;

        if let Some(previous) = previous {
            previous
                .photos
                .iter()
                .filter(|photo| !content.photos.contains(photo))
                .for_each(remove_local_file);
        }

        Ok(vec![Outbound::text_with_keyboard(
            t_lang("wizard-saved", lang),
            main_menu_keyboard(lang),
        )])
    }

    async fn add_admin(
        &self,
        argument: Option<String>,
        reply_to: Option<&Sender>,
        lang: Option<&str>,
    ) -> Result<Vec<Outbound>> {
        let target = match (argument, reply_to) {
            (Some(argument), _) => match argument.parse::<u64>() {
                Ok(id) => UserId(id),
                Err(_) => return Ok(vec![Outbound::text(t_lang("admin-add-usage", lang))]),
            },
            (None, Some(replied)) => replied.id,
            (None, None) => return Ok(vec![Outbound::text(t_lang("admin-add-usage", lang))]),
        };
        let target_id = target.to_string();

        match self.admins.promote(self.store.as_ref(), target).await {
            Ok(true) => {
                info!(admin_id = %target, "Promoted user to admin");
                if let Err(e) = self
                    .notifier
                    .notify(target, &t_lang("admin-promoted-notice", None))
                    .await
                {
                    warn!(admin_id = %target, error = %e, "Failed to notify promoted admin");
                }
                Ok(vec![Outbound::text(t_args_lang(
                    "admin-added",
                    &[("user_id", &target_id)],
                    lang,
                ))])
            }
            Ok(false) => Ok(vec![Outbound::text(t_args_lang(
                "admin-already",
                &[("user_id", &target_id)],
                lang,
            ))]),
            Err(e) => {
                error!(admin_id = %target, error = %e, "Failed to persist admin promotion");
                Ok(vec![Outbound::text(t_lang("storage-error", lang))])
            }
        }
    }

    /// Prompt shown when the wizard enters `state`
    fn prompt_for(&self, state: &ConversationState, lang: Option<&str>) -> Vec<Outbound> {
        match state {
            ConversationState::SelectingSection => vec![Outbound::text_with_keyboard(
                t_lang("wizard-choose-section", lang),
                section_keyboard(&self.sections, CallbackAction::AdminSelect),
            )],
            ConversationState::CollectingText { slot } => {
                let text = match slot {
                    SlotId::Menu => t_lang("wizard-enter-menu", lang),
                    SlotId::Section(id) => {
                        let name = self
                            .sections
                            .get(id)
                            .map(|section| section.name.as_str())
                            .unwrap_or(id.as_str());
                        t_args_lang("wizard-enter-section", &[("section", name)], lang)
                    }
                    _ => t_lang("wizard-enter-faq", lang),
                };
                vec![Outbound::text_with_keyboard(text, Keyboard::Remove)]
            }
            ConversationState::CollectingPhotos { slot, .. } => {
                let text = match slot.shape().photos {
                    PhotoPolicy::UpTo(limit) => {
                        let limit = limit.to_string();
                        t_args_lang("wizard-send-photos-limited", &[("limit", &limit)], lang)
                    }
                    _ => t_lang("wizard-send-photos", lang),
                };
                vec![Outbound::text_with_keyboard(text, Keyboard::Remove)]
            }
            ConversationState::Idle | ConversationState::AwaitingAppeal => Vec::new(),
        }
    }
}

fn limit_message(state: &ConversationState, lang: Option<&str>) -> Option<String> {
    match state.pending_slot()?.shape().photos {
        PhotoPolicy::UpTo(limit) => {
            let limit = limit.to_string();
            Some(t_args_lang("wizard-photo-limit", &[("limit", &limit)], lang))
        }
        _ => None,
    }
}

fn rejection_key(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::NoSession => "wizard-no-session",
        Rejection::SectionExpected => "wizard-section-expected",
        Rejection::UnknownSection => "section-unknown",
        Rejection::TextExpected => "wizard-text-expected",
        Rejection::EmptyText => "wizard-empty-text",
        Rejection::TextTooLong => "wizard-text-too-long",
        Rejection::PhotoExpected => "wizard-photo-expected",
        Rejection::PhotoLimitReached => "wizard-photo-limit-reached",
        Rejection::TextNotSkippable => "wizard-text-required",
    }
}

/// Remove downloaded files of an upload that will not be committed
fn discard_pending_files(state: &ConversationState) {
    state.pending_photos().iter().for_each(remove_local_file);
}

fn remove_local_file(photo: &PhotoRef) {
    if let Some(path) = photo.local_path() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed unused media file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove media file"),
        }
    }
}
