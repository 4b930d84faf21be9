// /settings - per-guild configuration for every other feature.

use crate::core::settings::{GuildSettings, Knob};
use crate::discord::audit::COLOR_INFO;
use crate::discord::data::require_guild;
use crate::discord::roles::mention_roles;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum KnobChoice {
    #[name = "Points per claimed call"]
    PointsPerClaim,
    #[name = "Call cooldown (seconds)"]
    CallCooldownSecs,
    #[name = "Max vacation days"]
    MaxVacationDays,
    #[name = "Warnings before alert (0 = off)"]
    WarningsBeforeAlert,
    #[name = "Streak restore window (days)"]
    RestoreWindowDays,
    #[name = "Streak restores per month"]
    MaxRestoresPerMonth,
}

impl From<KnobChoice> for Knob {
    fn from(choice: KnobChoice) -> Self {
        match choice {
            KnobChoice::PointsPerClaim => Knob::PointsPerClaim,
            KnobChoice::CallCooldownSecs => Knob::CallCooldownSecs,
            KnobChoice::MaxVacationDays => Knob::MaxVacationDays,
            KnobChoice::WarningsBeforeAlert => Knob::WarningsBeforeAlert,
            KnobChoice::RestoreWindowDays => Knob::RestoreWindowDays,
            KnobChoice::MaxRestoresPerMonth => Knob::MaxRestoresPerMonth,
        }
    }
}

/// Server configuration (administrators only).
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR",
    subcommands(
        "show",
        "admin_role_add",
        "admin_role_remove",
        "log_channel",
        "approvals_channel",
        "streak_channel",
        "timezone",
        "reminder_hour",
        "rooms_category",
        "tune"
    ),
    subcommand_required
)]
pub async fn settings(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn channel_or_none(id: Option<u64>) -> String {
    id.map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "not set".to_string())
}

fn settings_embed(s: &GuildSettings) -> serenity::CreateEmbed {
    let reminder = s
        .streak_reminder_hour
        .map(|h| format!("{:02}:00", h))
        .unwrap_or_else(|| "off".to_string());

    serenity::CreateEmbed::new()
        .title("⚙️ Server Settings")
        .color(COLOR_INFO)
        .field("Admin roles", mention_roles(&s.admin_role_ids), false)
        .field("Log channel", channel_or_none(s.log_channel_id), true)
        .field("Approvals channel", channel_or_none(s.approvals_channel_id), true)
        .field("Rooms category", channel_or_none(s.rooms_category_id), true)
        .field(
            "Streak channel",
            format!(
                "{}{}",
                channel_or_none(s.streak_channel_id),
                if s.streak_require_media {
                    " (media required)"
                } else {
                    ""
                }
            ),
            true,
        )
        .field("Timezone", &s.timezone, true)
        .field("Streak reminder", reminder, true)
        .field(
            "Limits",
            format!(
                "Points per claim: **{}**\nCall cooldown: **{}s**\nMax vacation: **{} days**\n\
                 Warning alert at: **{}**\nRestore window: **{} days**\nRestores per month: **{}**",
                s.points_per_claim,
                s.call_cooldown_secs,
                s.max_vacation_days,
                s.warnings_before_alert,
                s.restore_window_days,
                s.max_restores_per_month
            ),
            false,
        )
}

/// Show the current configuration.
#[poise::command(slash_command, guild_only)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let settings = ctx.data().settings.get(guild_id).await?;
    ctx.send(
        poise::CreateReply::default()
            .embed(settings_embed(&settings))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Mark a role as administrative (stripped by /down and vacations).
#[poise::command(slash_command, guild_only)]
pub async fn admin_role_add(
    ctx: Context<'_>,
    #[description = "Role to mark as administrative"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if ctx.data().settings.add_admin_role(guild_id, role.id.get()).await? {
        tracing::info!(guild_id, role_id = role.id.get(), "Admin role added");
        ctx.say(format!("✅ <@&{}> is now an admin role.", role.id)).await?;
    } else {
        ctx.say(format!("<@&{}> is already an admin role.", role.id)).await?;
    }
    Ok(())
}

/// Stop treating a role as administrative.
#[poise::command(slash_command, guild_only)]
pub async fn admin_role_remove(
    ctx: Context<'_>,
    #[description = "Role to unmark"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if ctx
        .data()
        .settings
        .remove_admin_role(guild_id, role.id.get())
        .await?
    {
        ctx.say(format!("✅ <@&{}> is no longer an admin role.", role.id)).await?;
    } else {
        ctx.say(format!("<@&{}> was not an admin role.", role.id)).await?;
    }
    Ok(())
}

/// Set (or clear) the audit log channel.
#[poise::command(slash_command, guild_only)]
pub async fn log_channel(
    ctx: Context<'_>,
    #[description = "Channel for audit logs (leave empty to disable)"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let id = channel.map(|c| c.id.get());
    ctx.data().settings.set_log_channel(guild_id, id).await?;
    ctx.say(format!("✅ Log channel: {}", channel_or_none(id))).await?;
    Ok(())
}

/// Set (or clear) the channel where approval requests are posted.
#[poise::command(slash_command, guild_only)]
pub async fn approvals_channel(
    ctx: Context<'_>,
    #[description = "Channel for vacation and streak approvals"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let id = channel.map(|c| c.id.get());
    ctx.data().settings.set_approvals_channel(guild_id, id).await?;
    ctx.say(format!("✅ Approvals channel: {}", channel_or_none(id)))
        .await?;
    Ok(())
}

/// Set (or clear) the daily streak channel.
#[poise::command(slash_command, guild_only)]
pub async fn streak_channel(
    ctx: Context<'_>,
    #[description = "Channel where daily posts count"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Only count posts with an attachment"] require_media: Option<bool>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let id = channel.map(|c| c.id.get());
    let require_media = require_media.unwrap_or(false);
    ctx.data()
        .settings
        .set_streak_channel(guild_id, id, require_media)
        .await?;
    ctx.say(format!(
        "✅ Streak channel: {}{}",
        channel_or_none(id),
        if require_media { " (media required)" } else { "" }
    ))
    .await?;
    Ok(())
}

/// Set the server's timezone (used for streak days and prayer times).
#[poise::command(slash_command, guild_only)]
pub async fn timezone(
    ctx: Context<'_>,
    #[description = "IANA timezone, e.g. Asia/Riyadh"] name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let settings = ctx.data().settings.set_timezone(guild_id, &name).await?;
    ctx.say(format!("✅ Timezone set to **{}**.", settings.timezone))
        .await?;
    Ok(())
}

/// Set the local hour for streak reminder DMs (leave empty to turn off).
#[poise::command(slash_command, guild_only)]
pub async fn reminder_hour(
    ctx: Context<'_>,
    #[description = "Hour (0-23)"]
    #[min = 0]
    #[max = 23]
    hour: Option<u32>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data()
        .settings
        .set_streak_reminder_hour(guild_id, hour)
        .await?;
    match hour {
        Some(h) => ctx.say(format!("✅ Streak reminders at {:02}:00.", h)).await?,
        None => ctx.say("✅ Streak reminders turned off.").await?,
    };
    Ok(())
}

/// Set (or clear) the category temporary rooms are created in.
#[poise::command(slash_command, guild_only)]
pub async fn rooms_category(
    ctx: Context<'_>,
    #[description = "Category for temporary voice rooms"]
    #[channel_types("Category")]
    category: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let id = category.map(|c| c.id.get());
    ctx.data().settings.set_rooms_category(guild_id, id).await?;
    ctx.say(format!("✅ Rooms category: {}", channel_or_none(id)))
        .await?;
    Ok(())
}

/// Adjust a numeric limit.
#[poise::command(slash_command, guild_only)]
pub async fn tune(
    ctx: Context<'_>,
    #[description = "Setting to change"] setting: KnobChoice,
    #[description = "New value"] value: u64,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data()
        .settings
        .set_knob(guild_id, setting.into(), value)
        .await?;
    tracing::info!(guild_id, setting = ?setting, value, "Setting tuned");
    ctx.say(format!("✅ **{}** set to {}.", setting.name(), value))
        .await?;
    Ok(())
}
