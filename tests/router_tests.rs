//! # Conversation Router Tests
//!
//! End-to-end flows through the router with a JSON store in a temporary
//! directory, teloxide's in-memory dialogue storage and a recording notifier.

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::{ChatId, UserId};

use forum_bot::admin::AdminRegistry;
use forum_bot::appeal::Notifier;
use forum_bot::content::{Appeal, PhotoRef, SlotContent, SlotId};
use forum_bot::dialogue::{ConversationDialogue, ConversationState};
use forum_bot::errors::StoreError;
use forum_bot::localization::{t_args_lang, t_lang};
use forum_bot::presentation::{MenuItem, Outbound};
use forum_bot::router::{Assistant, Inbound, InboundKind, RouterSettings, Sender};
use forum_bot::sections::SectionRegistry;
use forum_bot::store::{ContentStore, JsonFileStore};

const ADMIN: UserId = UserId(1);
const SECOND_ADMIN: UserId = UserId(2);
const USER: UserId = UserId(100);
const LANG: Option<&str> = Some("en");

/// Notifier that records every message and fails for chosen recipients
#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(UserId, String)>>>,
    unreachable: Arc<Mutex<BTreeSet<UserId>>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn block(&self, user_id: UserId) {
        self.unreachable.lock().unwrap().insert(user_id);
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: UserId, text: &str) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&recipient) {
            return Err(anyhow!("Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        Ok(())
    }
}

/// JSON store whose writes can be switched off
struct FlakyStore {
    inner: JsonFileStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Io("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ContentStore for FlakyStore {
    async fn get(&self, slot: &SlotId) -> Result<Option<SlotContent>, StoreError> {
        self.inner.get(slot).await
    }

    async fn set(&self, slot: &SlotId, content: SlotContent) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(slot, content).await
    }

    async fn append_photo(&self, slot: &SlotId, photo: PhotoRef) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.append_photo(slot, photo).await
    }

    async fn append_appeal(&self, appeal: &Appeal) -> Result<(), StoreError> {
        self.check()?;
        self.inner.append_appeal(appeal).await
    }

    async fn recent_appeals(&self, limit: usize) -> Result<Vec<Appeal>, StoreError> {
        self.inner.recent_appeals(limit).await
    }

    async fn admins(&self) -> Result<BTreeSet<UserId>, StoreError> {
        self.inner.admins().await
    }

    async fn add_admin(&self, user_id: UserId) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.add_admin(user_id).await
    }
}

struct Harness<S> {
    assistant: Assistant<S, RecordingNotifier>,
    notifier: RecordingNotifier,
    storage: Arc<InMemStorage<ConversationState>>,
    dir: TempDir,
}

fn json_harness() -> Harness<JsonFileStore> {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path().join("data")).unwrap();
    harness_with(store, dir)
}

fn flaky_harness() -> Harness<FlakyStore> {
    let dir = TempDir::new().unwrap();
    let store = FlakyStore {
        inner: JsonFileStore::open(dir.path().join("data")).unwrap(),
        fail_writes: AtomicBool::new(false),
    };
    harness_with(store, dir)
}

fn harness_with<S: ContentStore>(store: S, dir: TempDir) -> Harness<S> {
    let notifier = RecordingNotifier::default();
    let assistant = Assistant::new(
        Arc::new(store),
        Arc::new(AdminRegistry::new([ADMIN, SECOND_ADMIN])),
        Arc::new(SectionRegistry::default()),
        notifier.clone(),
        RouterSettings::default(),
    );
    Harness {
        assistant,
        notifier,
        storage: InMemStorage::new(),
        dir,
    }
}

fn sender(id: UserId) -> Sender {
    Sender::new(id, format!("user{}", id.0)).with_language("en")
}

impl<S: ContentStore> Harness<S> {
    fn dialogue(&self, id: UserId) -> ConversationDialogue {
        Dialogue::new(self.storage.clone(), ChatId(id.0 as i64))
    }

    async fn state(&self, id: UserId) -> ConversationState {
        self.dialogue(id).get().await.unwrap().unwrap_or_default()
    }

    async fn send(&self, from: UserId, kind: InboundKind) -> Vec<Outbound> {
        self.assistant
            .handle(Inbound::new(sender(from), kind), &self.dialogue(from))
            .await
            .unwrap()
    }

    async fn text(&self, from: UserId, text: &str) -> Vec<Outbound> {
        self.send(from, InboundKind::Text(text.to_string())).await
    }

    async fn photo(&self, from: UserId, file_id: &str) -> Vec<Outbound> {
        self.send(from, InboundKind::Photo(PhotoRef::Telegram(file_id.to_string())))
            .await
    }

    /// Text sent in a chat shared with other users
    async fn text_in(&self, chat: &ConversationDialogue, from: UserId, text: &str) -> Vec<Outbound> {
        self.assistant
            .handle(Inbound::text(sender(from), text), chat)
            .await
            .unwrap()
    }

    async fn tap(&self, from: UserId, item: MenuItem) -> Vec<Outbound> {
        self.text(from, &t_lang(item.label_key(), LANG)).await
    }

    async fn slot(&self, slot: SlotId) -> Option<SlotContent> {
        self.assistant.store().get(&slot).await.unwrap()
    }
}

fn first_text(replies: &[Outbound]) -> &str {
    replies
        .iter()
        .find_map(Outbound::text_content)
        .expect("reply contains text")
}

fn telegram_photos(ids: &[&str]) -> Vec<PhotoRef> {
    ids.iter().map(|id| PhotoRef::Telegram(id.to_string())).collect()
}

#[tokio::test]
async fn test_non_admin_cannot_run_admin_commands() {
    let h = json_harness();
    let denied = t_lang("admin-only", LANG);

    for command in [
        "/setfaq",
        "/setmap",
        "/setmenu",
        "/setprogram",
        "/setdirectorate",
        "/addinfo",
        "/addadmin 5",
        "/admins",
        "/appeals",
        "/shutdown",
    ] {
        let replies = h.text(USER, command).await;
        assert_eq!(replies.len(), 1, "{command}");
        assert_eq!(first_text(&replies), denied, "{command}");
        assert_eq!(h.state(USER).await, ConversationState::Idle, "{command}");
    }

    assert!(!h.assistant.admins().is_admin(UserId(5)));
    assert!(h.assistant.store().admins().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_admin_setmap_leaves_map_unchanged() {
    let h = json_harness();
    h.assistant
        .store()
        .set(&SlotId::Map, SlotContent::photos(telegram_photos(&["old-map"])))
        .await
        .unwrap();

    h.text(USER, "/setmap").await;
    h.photo(USER, "new-map").await;
    let replies = h.text(USER, "/done").await;

    assert_eq!(first_text(&replies), t_lang("wizard-no-session", LANG));
    assert_eq!(
        h.slot(SlotId::Map).await.unwrap().photos,
        telegram_photos(&["old-map"])
    );
}

#[tokio::test]
async fn test_admin_sets_faq_and_users_see_it() {
    let h = json_harness();

    let replies = h.text(ADMIN, "/setfaq").await;
    assert_eq!(first_text(&replies), t_lang("wizard-enter-faq", LANG));

    let replies = h.text(ADMIN, "Bring a flashlight.").await;
    assert_eq!(first_text(&replies), t_lang("wizard-saved", LANG));
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);

    let replies = h.tap(USER, MenuItem::Faq).await;
    assert!(first_text(&replies).contains("Bring a flashlight."));
}

#[tokio::test]
async fn test_section_upload_with_three_photos() {
    let h = json_harness();

    let replies = h.text(ADMIN, "/addinfo").await;
    assert_eq!(first_text(&replies), t_lang("wizard-choose-section", LANG));
    assert_eq!(h.state(ADMIN).await, ConversationState::SelectingSection);

    let replies = h
        .send(ADMIN, InboundKind::Callback("admin_set:press".to_string()))
        .await;
    assert!(first_text(&replies).contains("Пресса"));

    h.text(ADMIN, "Our press team").await;
    for (index, id) in ["p1", "p2", "p3"].iter().enumerate() {
        let replies = h.photo(ADMIN, id).await;
        let count = (index + 1).to_string();
        assert_eq!(
            first_text(&replies),
            t_args_lang("wizard-photo-added", &[("count", &count)], LANG)
        );
    }
    h.text(ADMIN, "/done").await;

    let stored = h.slot(SlotId::Section("press".to_string())).await.unwrap();
    assert_eq!(stored.text.as_deref(), Some("Our press team"));
    assert_eq!(stored.photos, telegram_photos(&["p1", "p2", "p3"]));

    let replies = h
        .send(USER, InboundKind::Callback("section:press".to_string()))
        .await;
    assert!(first_text(&replies).contains("Our press team"));
    let groups: Vec<_> = replies
        .iter()
        .filter(|reply| matches!(reply, Outbound::PhotoGroup { .. }))
        .collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].photo_count(), 3);
}

#[tokio::test]
async fn test_cancel_leaves_slot_unchanged() {
    let h = json_harness();
    let original = SlotContent::photos(telegram_photos(&["day1"]));
    h.assistant
        .store()
        .set(&SlotId::Program, original.clone())
        .await
        .unwrap();

    h.text(ADMIN, "/setprogram").await;
    h.photo(ADMIN, "day2-a").await;
    h.photo(ADMIN, "day2-b").await;
    let replies = h.text(ADMIN, "/cancel").await;

    assert_eq!(first_text(&replies), t_lang("wizard-cancelled", LANG));
    assert_eq!(h.slot(SlotId::Program).await, Some(original));
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_done_without_session_is_a_noop() {
    let h = json_harness();

    let replies = h.text(ADMIN, "/done").await;
    assert_eq!(first_text(&replies), t_lang("wizard-no-session", LANG));
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);
    assert_eq!(h.slot(SlotId::Faq).await, None);
}

#[tokio::test]
async fn test_done_with_no_photos_clears_directorate() {
    let h = json_harness();
    h.assistant
        .store()
        .set(&SlotId::Directorate, SlotContent::photos(telegram_photos(&["team"])))
        .await
        .unwrap();

    h.text(ADMIN, "/setdirectorate").await;
    let replies = h.text(ADMIN, "/done").await;

    assert_eq!(first_text(&replies), t_lang("wizard-saved", LANG));
    assert!(h.slot(SlotId::Directorate).await.unwrap().photos.is_empty());
}

#[tokio::test]
async fn test_program_accepts_at_most_four_photos() {
    let h = json_harness();
    h.text(ADMIN, "/setprogram").await;

    for id in ["a", "b", "c", "d"] {
        h.photo(ADMIN, id).await;
    }
    let replies = h.photo(ADMIN, "e").await;
    assert_eq!(
        first_text(&replies),
        t_args_lang("wizard-photo-limit", &[("limit", "4")], LANG)
    );

    h.text(ADMIN, "/done").await;
    assert_eq!(
        h.slot(SlotId::Program).await.unwrap().photos,
        telegram_photos(&["a", "b", "c", "d"])
    );
}

#[tokio::test]
async fn test_menu_text_can_be_skipped_for_a_photo() {
    let h = json_harness();

    h.text(ADMIN, "/setmenu").await;
    let replies = h.text(ADMIN, "/skip").await;
    assert_eq!(
        first_text(&replies),
        t_args_lang("wizard-send-photos-limited", &[("limit", "1")], LANG)
    );
    h.photo(ADMIN, "menu-photo").await;
    h.text(ADMIN, "/done").await;

    let stored = h.slot(SlotId::Menu).await.unwrap();
    assert_eq!(stored.text, None);
    assert_eq!(stored.photos, telegram_photos(&["menu-photo"]));

    let replies = h.tap(USER, MenuItem::Menu).await;
    assert_eq!(replies.iter().map(Outbound::photo_count).sum::<usize>(), 1);
}

#[tokio::test]
async fn test_section_text_cannot_be_skipped() {
    let h = json_harness();
    h.text(ADMIN, "/addinfo").await;
    h.send(ADMIN, InboundKind::Callback("admin_set:edu".to_string()))
        .await;

    let replies = h.text(ADMIN, "/skip").await;
    assert_eq!(first_text(&replies), t_lang("wizard-text-required", LANG));
    assert!(matches!(
        h.state(ADMIN).await,
        ConversationState::CollectingText { .. }
    ));
}

#[tokio::test]
async fn test_unknown_section_selection_is_rejected() {
    let h = json_harness();
    h.text(ADMIN, "/addinfo").await;

    let replies = h
        .send(ADMIN, InboundKind::Callback("admin_set:nowhere".to_string()))
        .await;
    assert_eq!(first_text(&replies), t_lang("section-unknown", LANG));
    assert_eq!(h.state(ADMIN).await, ConversationState::SelectingSection);
}

#[tokio::test]
async fn test_non_admin_cannot_select_admin_section() {
    let h = json_harness();
    let replies = h
        .send(USER, InboundKind::Callback("admin_set:press".to_string()))
        .await;
    assert_eq!(first_text(&replies), t_lang("admin-only", LANG));
    assert_eq!(h.state(USER).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_appeal_is_logged_and_relayed() {
    let h = json_harness();

    let replies = h.tap(USER, MenuItem::Comfort).await;
    assert_eq!(first_text(&replies), t_lang("comfort-prompt", LANG));
    assert_eq!(h.state(USER).await, ConversationState::AwaitingAppeal);

    let replies = h.text(USER, "No hot water in tent 12").await;
    assert_eq!(first_text(&replies), t_lang("appeal-sent", LANG));
    assert_eq!(h.state(USER).await, ConversationState::Idle);

    let appeals = h.assistant.store().recent_appeals(10).await.unwrap();
    assert_eq!(appeals.len(), 1);
    assert_eq!(appeals[0].text, "No hot water in tent 12");
    assert_eq!(appeals[0].sender_id, USER);

    let sent = h.notifier.sent();
    let recipients: Vec<_> = sent.iter().map(|(to, _)| *to).collect();
    assert_eq!(recipients, vec![ADMIN, SECOND_ADMIN]);
    assert!(sent[0].1.contains("No hot water in tent 12"));
    assert!(sent[0].1.contains("100"));
}

#[tokio::test]
async fn test_appeal_logged_once_despite_fan_out_failure() {
    let h = json_harness();
    h.notifier.block(ADMIN);

    h.tap(USER, MenuItem::Comfort).await;
    let replies = h.text(USER, "Broken lamp").await;

    assert_eq!(first_text(&replies), t_lang("appeal-sent", LANG));
    let appeals = h.assistant.store().recent_appeals(10).await.unwrap();
    assert_eq!(appeals.len(), 1);
    assert_eq!(appeals[0].text, "Broken lamp");

    let recipients: Vec<_> = h.notifier.sent().iter().map(|(to, _)| *to).collect();
    assert_eq!(recipients, vec![SECOND_ADMIN]);
}

#[tokio::test]
async fn test_appeal_cancel_keyword() {
    let h = json_harness();
    h.tap(USER, MenuItem::Comfort).await;

    let replies = h.text(USER, "Отмена").await;
    assert_eq!(first_text(&replies), t_lang("appeal-cancelled", LANG));
    assert!(h.assistant.store().recent_appeals(10).await.unwrap().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_menu_button_during_appeal_is_not_an_appeal() {
    let h = json_harness();
    h.tap(USER, MenuItem::Comfort).await;

    let replies = h.tap(USER, MenuItem::Map).await;
    assert_eq!(first_text(&replies), t_lang("map-caption", LANG));
    assert_eq!(h.state(USER).await, ConversationState::Idle);
    assert!(h.assistant.store().recent_appeals(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_appeal_log_sends_nothing() {
    let h = flaky_harness();
    h.tap(USER, MenuItem::Comfort).await;
    h.assistant.store().fail_writes.store(true, Ordering::SeqCst);

    let replies = h.text(USER, "Leaking roof").await;
    assert_eq!(first_text(&replies), t_lang("appeal-failed", LANG));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_failed_commit_keeps_session_for_retry() {
    let h = flaky_harness();
    h.text(ADMIN, "/setmap").await;
    h.photo(ADMIN, "map-v2").await;

    h.assistant.store().fail_writes.store(true, Ordering::SeqCst);
    let replies = h.text(ADMIN, "/done").await;
    assert_eq!(first_text(&replies), t_lang("wizard-save-failed", LANG));
    assert!(matches!(
        h.state(ADMIN).await,
        ConversationState::CollectingPhotos { .. }
    ));
    assert_eq!(h.slot(SlotId::Map).await, None);

    h.assistant.store().fail_writes.store(false, Ordering::SeqCst);
    let replies = h.text(ADMIN, "/done").await;
    assert_eq!(first_text(&replies), t_lang("wizard-saved", LANG));
    assert_eq!(
        h.slot(SlotId::Map).await.unwrap().photos,
        telegram_photos(&["map-v2"])
    );
}

#[tokio::test]
async fn test_add_admin_by_reply() {
    let h = json_harness();
    let newcomer = UserId(200);

    let inbound = Inbound {
        sender: sender(ADMIN),
        kind: InboundKind::Text("/addadmin".to_string()),
        reply_to: Some(sender(newcomer)),
    };
    let replies = h
        .assistant
        .handle(inbound, &h.dialogue(ADMIN))
        .await
        .unwrap();
    assert_eq!(
        first_text(&replies),
        t_args_lang("admin-added", &[("user_id", "200")], LANG)
    );

    assert!(h.assistant.admins().is_admin(newcomer));
    assert!(h.assistant.store().admins().await.unwrap().contains(&newcomer));
    assert!(h.notifier.sent().iter().any(|(to, _)| *to == newcomer));

    let replies = h.text(newcomer, "/admins").await;
    assert!(first_text(&replies).contains("200"));
}

#[tokio::test]
async fn test_add_admin_by_id_and_twice() {
    let h = json_harness();

    h.text(ADMIN, "/addadmin 300").await;
    let replies = h.text(ADMIN, "/addadmin 300").await;
    assert_eq!(
        first_text(&replies),
        t_args_lang("admin-already", &[("user_id", "300")], LANG)
    );

    let replies = h.text(ADMIN, "/addadmin someone").await;
    assert_eq!(first_text(&replies), t_lang("admin-add-usage", LANG));
}

#[tokio::test]
async fn test_appeals_listing() {
    let h = json_harness();
    for text in ["first", "second", "third"] {
        h.tap(USER, MenuItem::Comfort).await;
        h.text(USER, text).await;
    }

    let replies = h.text(ADMIN, "/appeals 2").await;
    let listing = first_text(&replies);
    assert!(!listing.contains("first"));
    assert!(listing.contains("second"));
    assert!(listing.contains("third"));
}

#[tokio::test]
async fn test_shutdown_signals_after_ack() {
    let h = json_harness();
    let replies = h.text(ADMIN, "/shutdown").await;

    assert_eq!(first_text(&replies), t_lang("shutdown-ack", LANG));
    assert_eq!(replies.last(), Some(&Outbound::Shutdown));
}

#[tokio::test]
async fn test_empty_views_show_placeholders() {
    let h = json_harness();

    let replies = h.tap(USER, MenuItem::Map).await;
    assert_eq!(replies.len(), 2);
    assert_eq!(
        replies[1].text_content(),
        Some(t_lang("map-missing", LANG).as_str())
    );

    let replies = h.tap(USER, MenuItem::Faq).await;
    assert!(first_text(&replies).contains(&t_lang("faq-empty", LANG)));

    let replies = h.tap(USER, MenuItem::Program).await;
    assert!(first_text(&replies).contains(&t_lang("program-missing", LANG)));
}

#[tokio::test]
async fn test_unknown_text_gets_menu_hint() {
    let h = json_harness();
    let replies = h.text(USER, "hello there").await;
    assert_eq!(first_text(&replies), t_lang("unknown-text", LANG));
}

#[tokio::test]
async fn test_unexpected_local_photo_is_removed() {
    let h = json_harness();
    let path = h.dir.path().join("stray.png");
    std::fs::write(&path, b"png").unwrap();

    let replies = h
        .send(USER, InboundKind::Photo(PhotoRef::Local(path.clone())))
        .await;
    assert_eq!(first_text(&replies), t_lang("photo-unexpected", LANG));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_replaced_local_photos_are_cleaned_up() {
    let h = json_harness();
    let old = h.dir.path().join("old-map.png");
    std::fs::write(&old, b"old").unwrap();
    h.assistant
        .store()
        .set(&SlotId::Map, SlotContent::photos(vec![PhotoRef::Local(old.clone())]))
        .await
        .unwrap();

    h.text(ADMIN, "/setmap").await;
    h.photo(ADMIN, "new-map").await;
    h.text(ADMIN, "/done").await;

    assert!(!old.exists());
    assert_eq!(
        h.slot(SlotId::Map).await.unwrap().photos,
        telegram_photos(&["new-map"])
    );
}

#[tokio::test]
async fn test_start_resets_conversation() {
    let h = json_harness();
    h.text(ADMIN, "/setfaq").await;

    let replies = h.text(ADMIN, "/start").await;
    assert!(first_text(&replies).contains(&t_lang("welcome-greeting", LANG)));
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_help_lists_admin_commands_for_admins_only() {
    let h = json_harness();

    let user_help = h.text(USER, "/help").await;
    assert!(!first_text(&user_help).contains("/setfaq"));

    let admin_help = h.text(ADMIN, "/help").await;
    assert!(first_text(&admin_help).contains("/setfaq"));
}

#[tokio::test]
async fn test_group_members_cannot_feed_an_admin_upload() {
    let h = json_harness();
    let group = Dialogue::new(h.storage.clone(), ChatId(-1001));

    h.text_in(&group, ADMIN, "/setfaq").await;
    let replies = h.text_in(&group, USER, "hacked by non-admin").await;
    assert_eq!(first_text(&replies), t_lang("upload-in-progress", LANG));
    for command in ["/done", "/skip", "/cancel"] {
        h.text_in(&group, USER, command).await;
    }
    assert_eq!(h.slot(SlotId::Faq).await, None);

    // The admin's upload is still waiting for its text
    let replies = h.text_in(&group, ADMIN, "Bring a flashlight.").await;
    assert_eq!(first_text(&replies), t_lang("wizard-saved", LANG));
    assert_eq!(
        h.slot(SlotId::Faq).await.unwrap().text.as_deref(),
        Some("Bring a flashlight.")
    );
}

#[tokio::test]
async fn test_group_member_photo_is_not_added_to_upload() {
    let h = json_harness();
    let group = Dialogue::new(h.storage.clone(), ChatId(-1002));
    let path = h.dir.path().join("member.png");
    std::fs::write(&path, b"png").unwrap();

    h.text_in(&group, ADMIN, "/setmap").await;
    h.assistant
        .handle(
            Inbound::new(sender(USER), InboundKind::Photo(PhotoRef::Local(path.clone()))),
            &group,
        )
        .await
        .unwrap();

    assert!(!path.exists());
    assert!(group.get().await.unwrap().unwrap().pending_photos().is_empty());
}

#[tokio::test]
async fn test_overlong_slot_text_is_rejected() {
    let h = json_harness();
    h.text(ADMIN, "/setfaq").await;

    let replies = h.text(ADMIN, &"a".repeat(5000)).await;
    assert_eq!(
        first_text(&replies),
        t_args_lang("wizard-text-too-long", &[("limit", "3500")], LANG)
    );
    assert_eq!(
        h.state(ADMIN).await,
        ConversationState::CollectingText { slot: SlotId::Faq }
    );
    assert_eq!(h.slot(SlotId::Faq).await, None);
}

#[tokio::test]
async fn test_long_views_fit_telegram_messages() {
    let h = json_harness();
    let faq = "Where is breakfast?\n".repeat(170);
    h.text(ADMIN, "/setfaq").await;
    h.text(ADMIN, &faq).await;

    let replies = h.tap(USER, MenuItem::Faq).await;
    let shown: String = replies.iter().filter_map(Outbound::text_content).collect();
    assert_eq!(shown.matches("Where is breakfast?").count(), 170);
    assert!(replies
        .iter()
        .filter_map(Outbound::text_content)
        .all(|text| text.encode_utf16().count() <= 4096));

    for _ in 0..10 {
        h.tap(USER, MenuItem::Comfort).await;
        h.text(USER, &"leaking tap ".repeat(50)).await;
    }
    let replies = h.text(ADMIN, "/appeals").await;
    assert!(replies.len() > 1);
    assert!(replies
        .iter()
        .filter_map(Outbound::text_content)
        .all(|text| text.encode_utf16().count() <= 4096));
}

#[tokio::test]
async fn test_overlong_appeal_is_not_logged() {
    let h = json_harness();
    h.tap(USER, MenuItem::Comfort).await;

    let replies = h.text(USER, &"x".repeat(3501)).await;
    assert_eq!(
        first_text(&replies),
        t_args_lang("appeal-too-long", &[("limit", "3500")], LANG)
    );
    assert_eq!(h.state(USER).await, ConversationState::AwaitingAppeal);
    assert!(h.assistant.store().recent_appeals(10).await.unwrap().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_non_text_during_appeal_asks_for_text() {
    let h = json_harness();
    h.tap(USER, MenuItem::Comfort).await;

    for kind in [InboundKind::Document, InboundKind::Unsupported] {
        let replies = h.send(USER, kind).await;
        assert_eq!(first_text(&replies), t_lang("appeal-text-expected", LANG));
        assert_eq!(h.state(USER).await, ConversationState::AwaitingAppeal);
    }
}
