// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (JSON files, SQLite, HTTP APIs)
// - `discord/` = Discord-specific adapters (commands, events, background tasks)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and start the background loops

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::sync::Arc;

use anyhow::Context as _;

use crate::config::BotConfig;
use crate::core::colors::ColorService;
use crate::core::down::DownService;
use crate::core::moderation::{BlockService, WarningService};
use crate::core::notifications::NotificationService;
use crate::core::points::PointsService;
use crate::core::prayer::PrayerService;
use crate::core::promotion::PromotionService;
use crate::core::responsibility::ResponsibilityService;
use crate::core::rooms::RoomService;
use crate::core::settings::SettingsService;
use crate::core::streak::StreakService;
use crate::core::vacation::VacationService;
use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use crate::infra::colors::JsonColorStore;
use crate::infra::down::JsonDownStore;
use crate::infra::moderation::{JsonBlockStore, SqliteWarningStore};
use crate::infra::notifications::JsonNotificationStore;
use crate::infra::points::SqlitePointsStore;
use crate::infra::prayer::{AladhanClient, JsonPrayerConfigStore};
use crate::infra::promotion::JsonPromotionStore;
use crate::infra::responsibility::JsonResponsibilityStore;
use crate::infra::rooms::JsonRoomStore;
use crate::infra::settings::JsonSettingsStore;
use crate::infra::streak::SqliteStreakStore;
use crate::infra::vacation::JsonVacationStore;
use poise::serenity_prelude as serenity;

/// Blocked members can't run any command.
async fn command_check(ctx: discord::Context<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(true);
    };
    if ctx
        .data()
        .blocks
        .is_blocked(guild_id.get(), ctx.author().id.get())
        .await?
    {
        return Err("You are blocked from using this bot.".into());
    }
    Ok(true)
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::warn!(command = %ctx.command().qualified_name, user_id = ctx.author().id.get(), "Command failed: {}", error);
            let reply = poise::CreateReply::default()
                .content(format!("❌ {}", error))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                tracing::error!("Failed to report command error: {}", e);
            }
        }
        poise::FrameworkError::CommandCheckFailed {
            error: Some(error),
            ctx,
            ..
        } => {
            let reply = poise::CreateReply::default()
                .content(format!("⛔ {}", error))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                tracing::error!("Failed to report check failure: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    let config = BotConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let sqlite_path = |name: &str| config.data_file(name).to_string_lossy().into_owned();

    let settings = SettingsService::new(
        JsonSettingsStore::new(config.data_file("settings.json"))?,
        config.default_timezone.name(),
    );
    let responsibilities = ResponsibilityService::new(JsonResponsibilityStore::new(
        config.data_file("responsibilities.json"),
    )?);
    let points = PointsService::new(
        SqlitePointsStore::new(&sqlite_path("points.db"))
            .await
            .context("Failed to open points database")?,
    );
    let downs = DownService::new(JsonDownStore::new(config.data_file("downs.json"))?);
    let vacations = VacationService::new(JsonVacationStore::new(config.data_file("vacations.json"))?);
    let promotions =
        PromotionService::new(JsonPromotionStore::new(config.data_file("promotions.json"))?);
    let streaks = StreakService::new(
        SqliteStreakStore::new(&sqlite_path("streak.db"))
            .await
            .context("Failed to open streak database")?,
    );
    let prayer = PrayerService::new(
        JsonPrayerConfigStore::new(config.data_file("prayer.json"))?,
        AladhanClient::new(config.prayer_api_base.clone())?,
    );
    let blocks = BlockService::new(JsonBlockStore::new(config.data_file("blocks.json"))?);
    let warnings = WarningService::new(
        SqliteWarningStore::new(&sqlite_path("moderation.db"))
            .await
            .context("Failed to open moderation database")?,
    );
    let notifications =
        NotificationService::new(JsonNotificationStore::new(config.data_file("notifications.json"))?);
    let colors = ColorService::new(JsonColorStore::new(config.data_file("colors.json"))?);
    let rooms = RoomService::new(JsonRoomStore::new(config.data_file("rooms.json"))?);

    // Shared across all commands, events and background tasks
    let data = Data {
        settings: Arc::new(settings),
        responsibilities: Arc::new(responsibilities),
        points: Arc::new(points),
        downs: Arc::new(downs),
        vacations: Arc::new(vacations),
        promotions: Arc::new(promotions),
        streaks: Arc::new(streaks),
        prayer: Arc::new(prayer),
        blocks: Arc::new(blocks),
        warnings: Arc::new(warnings),
        notifications: Arc::new(notifications),
        colors: Arc::new(colors),
        rooms: Arc::new(rooms),
        default_timezone: config.default_timezone,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to see streak attachments
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let dev_guild_id = config.dev_guild_id;
    let sweep_interval = config.sweep_interval;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(discord::events::event_handler(ctx, event, framework, data))
            },
            command_check: Some(|ctx| Box::pin(command_check(ctx))),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, guilds = ready.guilds.len(), "Bot is starting up");

                match dev_guild_id {
                    // Guild commands update instantly, global ones can take an hour
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        tracing::info!(guild_id, "Commands registered in dev guild");
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                        tracing::info!("Commands registered globally");
                    }
                }

                presence::on_ready(ctx, ready);
                discord::tasks::spawn_all(ctx, &data, sweep_interval);

                tracing::info!("Bot is ready");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
