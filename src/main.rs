use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forum_bot::admin::AdminRegistry;
use forum_bot::bot::{self, BotContext, TelegramNotifier};
use forum_bot::commands::COMMAND_DESCRIPTIONS;
use forum_bot::config::{BotConfig, LogFormat};
use forum_bot::db::PgContentStore;
use forum_bot::dialogue::ConversationState;
use forum_bot::legacy::import_legacy;
use forum_bot::localization::{init_localization, t_lang, DEFAULT_LANGUAGE};
use forum_bot::router::{Assistant, RouterSettings};
use forum_bot::sections::SectionRegistry;
use forum_bot::store::{ContentStore, JsonFileStore};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env();
    init_tracing(config.as_ref().map(|c| c.log_format).unwrap_or_default());
    let config = config.context("Failed to load configuration")?;

    info!("Starting Forum Telegram Bot");
    init_localization()?;

    let sections = match &config.sections_file {
        Some(path) => SectionRegistry::from_json_file(path)?,
        None => SectionRegistry::default(),
    };
    info!(sections = sections.len(), "Section registry loaded");

    match config.database_url.clone() {
        Some(database_url) => {
            info!("Using PostgreSQL content store");
            let store = PgContentStore::connect(&database_url).await?;
            serve(config, store, sections).await
        }
        None => {
            info!(data_dir = %config.data_dir.display(), "Using JSON file content store");
            let store = JsonFileStore::open(&config.data_dir)
                .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?;
            serve(config, store, sections).await
        }
    }
}

async fn serve<S: ContentStore + 'static>(
    config: BotConfig,
    store: S,
    sections: SectionRegistry,
) -> Result<()> {
    if let Some(legacy_dir) = &config.legacy_dir {
        import_legacy(&store, &sections, legacy_dir, &config.media_dir)
            .await
            .context("Legacy import failed")?;
    }

    let admins = AdminRegistry::load(config.admin_ids.iter().copied(), &store).await?;

    let bot = Bot::new(&config.bot_token);
    let me = bot.get_me().await.context("Failed to reach the Bot API")?;
    let bot_username = me.user.username.clone().unwrap_or_default();
    info!(username = %bot_username, "Bot initialized");

    if let Err(e) = register_commands(&bot).await {
        warn!(error = %e, "Failed to register the command list");
    }

    let assistant = Arc::new(Assistant::new(
        Arc::new(store),
        Arc::new(admins),
        Arc::new(sections),
        TelegramNotifier::new(bot.clone()),
        RouterSettings {
            bot_username,
            appeals_page_size: config.appeals_page_size,
        },
    ));
    let ctx = Arc::new(BotContext::new(config.media_dir.clone()));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<ConversationState>, ConversationState>()
                .endpoint(bot::message_handler::<S>),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<ConversationState>, ConversationState>()
                .endpoint(bot::callback_handler::<S>),
        );

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            InMemStorage::<ConversationState>::new(),
            assistant,
            Arc::clone(&ctx)
        ])
        .enable_ctrlc_handler()
        .build();

    // `/shutdown` only signals; stopping from inside a handler would wait on itself
    let shutdown_token = dispatcher.shutdown_token();
    let shutdown = Arc::clone(&ctx.shutdown);
    tokio::spawn(async move {
        shutdown.notified().await;
        info!("Shutdown requested, stopping dispatcher");
        match shutdown_token.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => warn!(error = %e, "Dispatcher was not running"),
        }
    });

    info!("Starting dispatcher");
    dispatcher.dispatch().await;
    info!("Bot stopped");

    Ok(())
}

async fn register_commands(bot: &Bot) -> Result<()> {
    let commands: Vec<BotCommand> = COMMAND_DESCRIPTIONS
        .iter()
        .map(|(name, key, _)| BotCommand::new(*name, t_lang(key, Some(DEFAULT_LANGUAGE))))
        .collect();
    bot.set_my_commands(commands).await?;
    Ok(())
}
