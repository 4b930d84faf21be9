// /block and /warn(ings) - bot-level moderation.
//
// Blocked members can't use any command and their posts don't count
// toward streaks. Warnings alert the log channel once a member reaches
// the server's threshold.

use chrono::Utc;

use crate::discord::audit::{self, COLOR_BAD, COLOR_INFO, COLOR_WARN};
use crate::discord::data::require_guild;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Keep members from using the bot.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS",
    subcommands("block_add", "block_remove", "block_list"),
    subcommand_required
)]
pub async fn block(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Block a member from using the bot.
#[poise::command(slash_command, guild_only, rename = "add")]
pub async fn block_add(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "Why"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if user.bot {
        return Err("Bots can't be blocked.".into());
    }
    let entry = ctx
        .data()
        .blocks
        .block(
            guild_id,
            user.id.get(),
            ctx.author().id.get(),
            reason.as_deref().unwrap_or(""),
            Utc::now(),
        )
        .await?;

    ctx.say(format!("⛔ <@{}> can no longer use the bot.", user.id))
        .await?;
    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Member blocked")
            .color(COLOR_BAD)
            .field("Member", format!("<@{}>", entry.user_id), true)
            .field("By", format!("<@{}>", entry.blocked_by), true)
            .field(
                "Reason",
                if entry.reason.is_empty() { "No reason given" } else { entry.reason.as_str() },
                false,
            ),
    )
    .await;
    Ok(())
}

/// Lift a block.
#[poise::command(slash_command, guild_only, rename = "remove")]
pub async fn block_remove(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().blocks.unblock(guild_id, user.id.get()).await?;
    ctx.say(format!("✅ <@{}> can use the bot again.", user.id))
        .await?;
    Ok(())
}

/// Everyone on the block list.
#[poise::command(slash_command, guild_only, rename = "list")]
pub async fn block_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let entries = ctx.data().blocks.list(guild_id).await?;

    let description = if entries.is_empty() {
        "Nobody is blocked.".to_string()
    } else {
        entries
            .iter()
            .map(|e| {
                let reason = if e.reason.is_empty() { "no reason" } else { e.reason.as_str() };
                format!(
                    "<@{}> · <t:{}:d> by <@{}> · {}",
                    e.user_id,
                    e.created_at.timestamp(),
                    e.blocked_by,
                    reason
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("⛔ Block list")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Warn a member.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "Why"] reason: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let settings = ctx.data().settings.get(guild_id).await?;
    let outcome = ctx
        .data()
        .warnings
        .warn(
            guild_id,
            user.id.get(),
            ctx.author().id.get(),
            &reason,
            settings.warnings_before_alert,
            Utc::now(),
        )
        .await?;

    ctx.say(format!(
        "⚠️ Warned <@{}> (warning #{}, {} total).",
        user.id, outcome.warning.id, outcome.total
    ))
    .await?;

    audit::send_dm(
        ctx.http(),
        user.id.get(),
        serenity::CreateMessage::new().content(format!(
            "⚠️ You received a warning: {}",
            outcome.warning.reason
        )),
    )
    .await;

    let mut embed = serenity::CreateEmbed::new()
        .title("Warning issued")
        .color(COLOR_WARN)
        .field("Member", format!("<@{}>", user.id), true)
        .field("By", format!("<@{}>", ctx.author().id), true)
        .field("Total", outcome.total.to_string(), true)
        .field("Reason", &outcome.warning.reason, false);
    if outcome.threshold_reached {
        embed = embed
            .color(COLOR_BAD)
            .description(format!(
                "🚨 <@{}> has reached {} warnings.",
                user.id, outcome.total
            ));
    }
    audit::post_log(ctx.http(), ctx.data(), guild_id, embed).await;
    Ok(())
}

/// Review and manage warnings.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS",
    subcommands("warnings_list", "warnings_remove", "warnings_clear"),
    subcommand_required
)]
pub async fn warnings(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// A member's warnings.
#[poise::command(slash_command, guild_only, rename = "list")]
pub async fn warnings_list(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let list = ctx.data().warnings.list(guild_id, user.id.get()).await?;

    let description = if list.is_empty() {
        "No warnings.".to_string()
    } else {
        list.iter()
            .map(|w| {
                format!(
                    "`#{}` <t:{}:d> by <@{}> · {}",
                    w.id,
                    w.created_at.timestamp(),
                    w.moderator_id,
                    w.reason
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("⚠️ Warnings · {} ({})", user.name, list.len()))
        .description(description)
        .color(COLOR_WARN);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Delete one warning by its number.
#[poise::command(slash_command, guild_only, rename = "remove")]
pub async fn warnings_remove(
    ctx: Context<'_>,
    #[description = "Warning number"]
    #[min = 1]
    id: i64,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().warnings.remove(guild_id, id).await?;
    ctx.say(format!("🗑️ Warning #{} removed.", id)).await?;
    Ok(())
}

/// Delete all of a member's warnings.
#[poise::command(slash_command, guild_only, rename = "clear")]
pub async fn warnings_clear(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let removed = ctx.data().warnings.clear(guild_id, user.id.get()).await?;
    ctx.say(format!("🧹 Cleared {} warning(s) for <@{}>.", removed, user.id))
        .await?;
    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Warnings cleared")
            .color(COLOR_INFO)
            .description(format!(
                "{} warning(s) for <@{}> by <@{}>",
                removed,
                user.id,
                ctx.author().id
            )),
    )
    .await;
    Ok(())
}
