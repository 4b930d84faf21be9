// /promote and /promotion - grant roles, optionally time-limited, and keep
// members who shouldn't be promoted off the list.

use chrono::Utc;

use crate::core::durations::{describe_expiry, parse_length};
use crate::core::notifications::NotificationKind;
use crate::core::promotion::{Promotion, PromotionRequest, PromotionStatus};
use crate::discord::audit::{self, COLOR_BAD, COLOR_INFO, COLOR_OK};
use crate::discord::data::require_guild;
use crate::discord::roles;
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;

fn status_label(status: PromotionStatus) -> &'static str {
    match status {
        PromotionStatus::Active => "Active",
        PromotionStatus::Expired => "Expired",
        PromotionStatus::Revoked => "Revoked",
    }
}

fn promotion_embed(title: &str, p: &Promotion, color: u32) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .color(color)
        .field("Member", format!("<@{}>", p.user_id), true)
        .field("Role", format!("<@&{}>", p.role_id), true)
        .field("Until", describe_expiry(p.expires_at), true)
        .field("By", format!("<@{}>", p.promoted_by), true);
    if let Some(replaced) = p.replaced_role_id {
        embed = embed.field("Replaces", format!("<@&{}>", replaced), true);
    }
    if !p.reason.is_empty() {
        embed = embed.field("Reason", &p.reason, false);
    }
    embed
}

/// Give a member a role, optionally replacing one and optionally expiring.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    default_member_permissions = "MANAGE_ROLES"
)]
pub async fn promote(
    ctx: Context<'_>,
    #[description = "Member to promote"] member: serenity::Member,
    #[description = "Role to grant"] role: serenity::Role,
    #[description = "Why"] reason: String,
    #[description = "Role the new one replaces"] replaces: Option<serenity::Role>,
    #[description = "How long, e.g. 7d (default permanent)"] duration: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let length = parse_length(duration.as_deref())
        .ok_or("Invalid duration. Try `30m`, `2h`, `3d` or `permanent`.")?;
    let mut touched = vec![role.id.get()];
    touched.extend(replaces.as_ref().map(|r| r.id.get()));
    roles::ensure_outranks(ctx, &member, &touched).await?;

    let now = Utc::now();
    let user_id = member.user.id.get();
    let held: Vec<u64> = member.roles.iter().map(|r| r.get()).collect();

    let promotion = ctx
        .data()
        .promotions
        .promote(
            PromotionRequest {
                guild_id,
                user_id,
                role_id: role.id.get(),
                replaced_role_id: replaces.as_ref().map(|r| r.id.get()),
                held_role_ids: &held,
                promoted_by: ctx.author().id.get(),
                reason: &reason,
                expires_at: length.expires_at(now),
            },
            now,
        )
        .await?;

    let audit_reason = format!("Promoted by {}: {}", ctx.author().name, reason);
    let failed = roles::add_roles(ctx.http(), guild_id, user_id, &[promotion.role_id], &audit_reason).await;
    if !failed.is_empty() {
        // The role never landed, so the record must not outlive this command
        ctx.data()
            .promotions
            .revoke(guild_id, user_id, promotion.role_id)
            .await?;
        return Err("Could not add the role. Check the bot's role position.".into());
    }
    if let Some(replaced) = promotion.replaced_role_id {
        roles::remove_roles(ctx.http(), guild_id, user_id, &[replaced], &audit_reason).await;
    }

    tracing::info!(
        guild_id,
        user_id,
        role_id = promotion.role_id,
        promotion_id = promotion.id,
        "Member promoted"
    );
    ctx.send(
        poise::CreateReply::default().embed(promotion_embed("⬆️ Promotion", &promotion, COLOR_OK)),
    )
    .await?;

    audit::notify(
        ctx.http(),
        ctx.data(),
        user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().embed(promotion_embed("🎉 You were promoted", &promotion, COLOR_OK)),
    )
    .await;
    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        promotion_embed("Promotion", &promotion, COLOR_OK),
    )
    .await;
    Ok(())
}

/// Undo a promotion's role changes. Shared with the sweeper.
pub async fn revert(http: &serenity::Http, data: &Data, p: &Promotion, reason: &str) {
    let removed = roles::remove_roles(http, p.guild_id, p.user_id, &[p.role_id], reason).await;
    let restored = match p.replaced_role_id {
        Some(replaced) => roles::add_roles(http, p.guild_id, p.user_id, &[replaced], reason).await,
        None => Vec::new(),
    };
    if !removed.is_empty() || !restored.is_empty() {
        tracing::warn!(
            guild_id = p.guild_id,
            user_id = p.user_id,
            promotion_id = p.id,
            "Promotion roles could not be fully reverted"
        );
    }

    audit::notify(
        http,
        data,
        p.user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().content(format!(
            "Your promotion to <@&{}> has ended ({}).",
            p.role_id, reason
        )),
    )
    .await;
    audit::post_log(
        http,
        data,
        p.guild_id,
        promotion_embed("Promotion ended", p, COLOR_BAD).description(reason),
    )
    .await;
}

/// Manage promotions and promotion bans.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    default_member_permissions = "MANAGE_ROLES",
    subcommands("revoke", "history", "ban", "unban"),
    subcommand_required
)]
pub async fn promotion(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Take back an active promotion.
#[poise::command(slash_command, guild_only)]
pub async fn revoke(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "The granted role"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let promotion = ctx
        .data()
        .promotions
        .revoke(guild_id, user.id.get(), role.id.get())
        .await?;
    revert(
        ctx.http(),
        ctx.data(),
        &promotion,
        &format!("revoked by {}", ctx.author().name),
    )
    .await;
    ctx.say(format!("⬇️ Revoked <@{}>'s promotion to <@&{}>.", user.id, role.id))
        .await?;
    Ok(())
}

/// A member's promotions, newest first.
#[poise::command(slash_command, guild_only)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let list = ctx.data().promotions.history(guild_id, user.id.get()).await?;
    let ban = ctx
        .data()
        .promotions
        .active_ban(guild_id, user.id.get(), Utc::now())
        .await?;

    let description = if list.is_empty() {
        "No promotions on record.".to_string()
    } else {
        list.iter()
            .take(15)
            .map(|p| {
                format!(
                    "#{} <@&{}> · {} · <t:{}:d> · until {}",
                    p.id,
                    p.role_id,
                    status_label(p.status),
                    p.created_at.timestamp(),
                    describe_expiry(p.expires_at)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("📜 Promotions · {}", user.name))
        .description(description)
        .color(COLOR_INFO);
    if let Some(ban) = ban {
        embed = embed.field(
            "🚫 Banned from promotion",
            format!("until {} · {}", describe_expiry(ban.expires_at), ban.reason),
            false,
        );
    }
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Stop a member from being promoted.
#[poise::command(slash_command, guild_only)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "Why"] reason: String,
    #[description = "How long, e.g. 30d (default permanent)"] duration: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let length = parse_length(duration.as_deref())
        .ok_or("Invalid duration. Try `30m`, `2h`, `3d` or `permanent`.")?;
    let now = Utc::now();
    let ban = ctx
        .data()
        .promotions
        .ban(
            guild_id,
            user.id.get(),
            &reason,
            ctx.author().id.get(),
            length.expires_at(now),
            now,
        )
        .await?;

    ctx.say(format!(
        "🚫 <@{}> can't be promoted until {}.",
        user.id,
        describe_expiry(ban.expires_at)
    ))
    .await?;
    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Promotion ban")
            .color(COLOR_BAD)
            .field("Member", format!("<@{}>", user.id), true)
            .field("By", format!("<@{}>", ban.banned_by), true)
            .field("Until", describe_expiry(ban.expires_at), true)
            .field("Reason", ban.reason, false),
    )
    .await;
    Ok(())
}

/// Lift a promotion ban.
#[poise::command(slash_command, guild_only)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().promotions.unban(guild_id, user.id.get()).await?;
    ctx.say(format!("✅ <@{}> can be promoted again.", user.id))
        .await?;
    Ok(())
}
