use anyhow::Result;
use tempfile::TempDir;
use teloxide::types::UserId;

use forum_bot::admin::AdminRegistry;
use forum_bot::content::{Appeal, PhotoRef, SlotContent, SlotId};
use forum_bot::store::{ContentStore, JsonFileStore, APPEALS_FILE};

/// Slot content survives reopening the store
#[tokio::test]
async fn test_content_persists_across_restarts() -> Result<()> {
    let dir = TempDir::new()?;
    let press = SlotId::Section("press".to_string());

    {
        let store = JsonFileStore::open(dir.path())?;
        store.set(&SlotId::Faq, SlotContent::text("Bring a flashlight.")).await?;
        store
            .set(
                &press,
                SlotContent {
                    text: Some("Press team".to_string()),
                    photos: vec![PhotoRef::Telegram("a".to_string())],
                },
            )
            .await?;
    }

    let store = JsonFileStore::open(dir.path())?;
    assert_eq!(
        store.get(&SlotId::Faq).await?,
        Some(SlotContent::text("Bring a flashlight."))
    );
    let section = store.get(&press).await?.expect("section stored");
    assert_eq!(section.text.as_deref(), Some("Press team"));
    assert_eq!(section.photos.len(), 1);
    assert_eq!(store.get(&SlotId::Map).await?, None);

    Ok(())
}

/// Set replaces the whole slot, append_photo extends it in order
#[tokio::test]
async fn test_set_replaces_and_append_extends() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonFileStore::open(dir.path())?;

    assert_eq!(
        store
            .append_photo(&SlotId::Directorate, PhotoRef::Telegram("1".to_string()))
            .await?,
        1
    );
    assert_eq!(
        store
            .append_photo(&SlotId::Directorate, PhotoRef::Telegram("2".to_string()))
            .await?,
        2
    );

    store
        .set(
            &SlotId::Directorate,
            SlotContent::photos(vec![PhotoRef::Telegram("3".to_string())]),
        )
        .await?;
    let content = store.get(&SlotId::Directorate).await?.unwrap();
    assert_eq!(content.photos, vec![PhotoRef::Telegram("3".to_string())]);

    Ok(())
}

/// The appeal log is append-only and returns the newest entries oldest first
#[tokio::test]
async fn test_appeal_log_order_and_limit() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonFileStore::open(dir.path())?;

    for index in 1..=5 {
        store
            .append_appeal(&Appeal::new(UserId(index), format!("user{index}"), format!("appeal {index}")))
            .await?;
    }

    let recent = store.recent_appeals(3).await?;
    let texts: Vec<_> = recent.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, ["appeal 3", "appeal 4", "appeal 5"]);

    let raw = std::fs::read_to_string(dir.path().join(APPEALS_FILE))?;
    assert_eq!(raw.lines().count(), 5);

    assert_eq!(store.recent_appeals(100).await?.len(), 5);
    Ok(())
}

/// Promoted admins are persisted and reloaded at startup
#[tokio::test]
async fn test_promoted_admins_reload() -> Result<()> {
    let dir = TempDir::new()?;

    {
        let store = JsonFileStore::open(dir.path())?;
        let admins = AdminRegistry::new([UserId(1)]);
        assert!(admins.promote(&store, UserId(42)).await?);
        assert!(!admins.promote(&store, UserId(42)).await?);
        assert!(!admins.promote(&store, UserId(1)).await?);
    }

    let store = JsonFileStore::open(dir.path())?;
    let admins = AdminRegistry::load([UserId(1)], &store).await?;
    assert!(admins.is_admin(UserId(42)));
    assert_eq!(admins.list(), vec![UserId(1), UserId(42)]);
    assert!(!admins.is_primary(UserId(42)));

    Ok(())
}
