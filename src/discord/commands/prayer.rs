// /prayer - daily prayer time reminders for a city.

use chrono::Utc;

use crate::core::prayer::{next_prayer, PrayerConfig, PrayerTimes, DEFAULT_METHOD};
use crate::discord::audit::COLOR_INFO;
use crate::discord::data::require_guild;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Prayer time reminders.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("setup", "enable", "disable", "remove", "times"),
    subcommand_required
)]
pub async fn prayer(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

pub fn times_embed(city: &str, times: &PrayerTimes, now: chrono::NaiveTime) -> serenity::CreateEmbed {
    let next = next_prayer(times, now);
    let lines = times
        .iter()
        .map(|(prayer, time)| {
            let marker = match next {
                Some((p, _)) if p == prayer => " ⬅️ next",
                _ => "",
            };
            format!("**{}** · {}{}", prayer.name(), time.format("%H:%M"), marker)
        })
        .collect::<Vec<_>>()
        .join("\n");

    serenity::CreateEmbed::new()
        .title(format!("🕌 Prayer times · {}", city))
        .description(lines)
        .footer(serenity::CreateEmbedFooter::new(
            times.date.format("%A, %d %B %Y").to_string(),
        ))
        .color(COLOR_INFO)
}

/// Configure reminders for this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Channel for reminders"]
    #[channel_types("Text")]
    channel: serenity::GuildChannel,
    #[description = "City, e.g. Cairo"] city: String,
    #[description = "Country, e.g. Egypt"] country: String,
    #[description = "Calculation method (Aladhan id, default 4)"]
    #[min = 0]
    #[max = 23]
    method: Option<u8>,
    #[description = "Role to mention"] mention_role: Option<serenity::Role>,
    #[description = "Minutes before the prayer to remind (default 0)"]
    #[min = 0]
    #[max = 60]
    lead_minutes: Option<u32>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.defer().await?;

    let config = ctx
        .data()
        .prayer
        .setup(PrayerConfig {
            guild_id,
            channel_id: channel.id.get(),
            city,
            country,
            method: method.unwrap_or(DEFAULT_METHOD),
            mention_role_id: mention_role.map(|r| r.id.get()),
            lead_minutes: lead_minutes.unwrap_or(0),
            enabled: true,
        })
        .await?;

    // Fetch once so a misspelled city shows up now, not at the next prayer
    let fallback = ctx.data().guild_tz(guild_id).await;
    let (local, times) = ctx.data().prayer.today(guild_id, Utc::now(), fallback).await?;

    tracing::info!(guild_id, city = %config.city, country = %config.country, method = config.method, "Prayer reminders configured");
    ctx.send(
        poise::CreateReply::default()
            .content(format!("✅ Reminders will be posted in <#{}>.", config.channel_id))
            .embed(times_embed(&config.city, &times, local.time())),
    )
    .await?;
    Ok(())
}

/// Turn reminders back on.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().prayer.set_enabled(guild_id, true).await?;
    ctx.say("🔔 Prayer reminders enabled.").await?;
    Ok(())
}

/// Pause reminders without losing the configuration.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().prayer.set_enabled(guild_id, false).await?;
    ctx.say("🔕 Prayer reminders paused.").await?;
    Ok(())
}

/// Delete the configuration.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn remove(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().prayer.remove(guild_id).await?;
    ctx.say("🗑️ Prayer reminders removed.").await?;
    Ok(())
}

/// Today's prayer times.
#[poise::command(slash_command, guild_only)]
pub async fn times(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let config = ctx
        .data()
        .prayer
        .config(guild_id)
        .await?
        .ok_or("Prayer times are not set up here. Ask an admin to run `/prayer setup`.")?;
    ctx.defer().await?;

    let fallback = ctx.data().guild_tz(guild_id).await;
    let (local, times) = ctx.data().prayer.today(guild_id, Utc::now(), fallback).await?;
    ctx.send(poise::CreateReply::default().embed(times_embed(&config.city, &times, local.time())))
        .await?;
    Ok(())
}
