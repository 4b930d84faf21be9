// /down - temporarily take administrative roles away from a member.

use chrono::Utc;

use crate::core::down::{DownRecord, DownRequest};
use crate::core::durations::{describe_expiry, parse_length};
use crate::core::notifications::NotificationKind;
use crate::discord::audit::{self, COLOR_BAD, COLOR_INFO, COLOR_OK};
use crate::discord::data::require_guild;
use crate::discord::roles::{self, mention_roles};
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Suspend a member's admin roles.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    default_member_permissions = "MANAGE_ROLES",
    subcommands("apply", "end", "extend", "list", "info"),
    subcommand_required
)]
pub async fn down(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn down_embed(title: &str, record: &DownRecord, color: u32) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .color(color)
        .field("Member", format!("<@{}>", record.user_id), true)
        .field("By", format!("<@{}>", record.moderator_id), true)
        .field("Ends", describe_expiry(record.expires_at), true)
        .field("Roles", mention_roles(&record.removed_role_ids), false)
        .field(
            "Reason",
            if record.reason.is_empty() {
                "No reason given".to_string()
            } else {
                record.reason.clone()
            },
            false,
        )
}

/// Take a member's admin roles (or one specific role) away.
#[poise::command(slash_command, guild_only)]
pub async fn apply(
    ctx: Context<'_>,
    #[description = "Member to put down"] member: serenity::Member,
    #[description = "Why"] reason: String,
    #[description = "How long, e.g. 30m, 2h, 3d (default permanent)"] duration: Option<String>,
    #[description = "Only remove this role"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let length = parse_length(duration.as_deref())
        .ok_or("Invalid duration. Try `30m`, `2h`, `3d` or `permanent`.")?;
    let explicit: Vec<u64> = role.iter().map(|r| r.id.get()).collect();
    roles::ensure_outranks(ctx, &member, &explicit).await?;
    let now = Utc::now();

    let settings = ctx.data().settings.get(guild_id).await?;
    let held: Vec<u64> = member.roles.iter().map(|r| r.get()).collect();
    let user_id = member.user.id.get();

    let record = ctx
        .data()
        .downs
        .apply(
            DownRequest {
                guild_id,
                user_id,
                moderator_id: ctx.author().id.get(),
                held_role_ids: &held,
                admin_role_ids: &settings.admin_role_ids,
                target_role_id: role.map(|r| r.id.get()),
                reason: &reason,
                expires_at: length.expires_at(now),
            },
            now,
        )
        .await?;

    let audit_reason = format!("Down by {}: {}", ctx.author().name, reason);
    let failed = roles::remove_roles(
        ctx.http(),
        guild_id,
        user_id,
        &record.removed_role_ids,
        &audit_reason,
    )
    .await;

    if failed.len() == record.removed_role_ids.len() {
        // Nothing changed on Discord, so don't leave a record behind
        ctx.data().downs.end(guild_id, user_id).await?;
        return Err("Could not remove any roles. Check the bot's role position.".into());
    }

    tracing::info!(
        guild_id,
        user_id,
        moderator_id = record.moderator_id,
        roles = record.removed_role_ids.len(),
        "Member put down"
    );

    let mut reply = format!(
        "⬇️ <@{}> is down until {}. Removed: {}",
        user_id,
        describe_expiry(record.expires_at),
        mention_roles(&record.removed_role_ids)
    );
    if !failed.is_empty() {
        reply.push_str(&format!("\n⚠️ Could not remove: {}", mention_roles(&failed)));
    }
    ctx.say(reply).await?;

    audit::notify(
        ctx.http(),
        ctx.data(),
        user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().embed(down_embed("⬇️ Your admin roles were suspended", &record, COLOR_BAD)),
    )
    .await;
    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        down_embed("Member down", &record, COLOR_BAD),
    )
    .await;
    Ok(())
}

/// Give the roles back and close the down record. Shared with the sweeper.
pub async fn restore(
    http: &serenity::Http,
    data: &Data,
    record: &DownRecord,
    reason: &str,
) {
    let failed = roles::add_roles(
        http,
        record.guild_id,
        record.user_id,
        &record.removed_role_ids,
        reason,
    )
    .await;
    if !failed.is_empty() {
        tracing::warn!(
            guild_id = record.guild_id,
            user_id = record.user_id,
            failed = ?failed,
            "Some roles could not be restored after down"
        );
    }

    audit::notify(
        http,
        data,
        record.user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().embed(
            serenity::CreateEmbed::new()
                .title("⬆️ Your admin roles are back")
                .color(COLOR_OK)
                .description(format!("Restored: {}", mention_roles(&record.removed_role_ids))),
        ),
    )
    .await;
    audit::post_log(
        http,
        data,
        record.guild_id,
        serenity::CreateEmbed::new()
            .title("Down ended")
            .color(COLOR_OK)
            .description(format!("<@{}>: {}", record.user_id, reason)),
    )
    .await;
}

/// End a down early and restore the roles.
#[poise::command(slash_command, guild_only)]
pub async fn end(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let record = ctx.data().downs.end(guild_id, user.id.get()).await?;
    restore(
        ctx.http(),
        ctx.data(),
        &record,
        &format!("Down ended by {}", ctx.author().name),
    )
    .await;
    ctx.say(format!("⬆️ <@{}> is no longer down.", user.id)).await?;
    Ok(())
}

/// Change when a down ends.
#[poise::command(slash_command, guild_only)]
pub async fn extend(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "New length from now, e.g. 1d (or permanent)"] duration: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let length = parse_length(Some(&duration))
        .ok_or("Invalid duration. Try `30m`, `2h`, `3d` or `permanent`.")?;
    let now = Utc::now();
    let record = ctx
        .data()
        .downs
        .extend(guild_id, user.id.get(), length.expires_at(now), now)
        .await?;

    ctx.say(format!(
        "⏱️ <@{}> now stays down until {}.",
        user.id,
        describe_expiry(record.expires_at)
    ))
    .await?;
    Ok(())
}

/// Everyone currently down.
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let records = ctx.data().downs.list(guild_id).await?;

    let description = if records.is_empty() {
        "Nobody is down.".to_string()
    } else {
        records
            .iter()
            .map(|r| {
                format!(
                    "<@{}> · until {} · {}",
                    r.user_id,
                    describe_expiry(r.expires_at),
                    mention_roles(&r.removed_role_ids)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("⬇️ Members down")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Details of one member's down.
#[poise::command(slash_command, guild_only)]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    match ctx.data().downs.get(guild_id, user.id.get()).await? {
        Some(record) => {
            let embed = down_embed("⬇️ Down", &record, COLOR_INFO).field(
                "Since",
                format!("<t:{}:f>", record.started_at.timestamp()),
                true,
            );
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
        }
        None => {
            ctx.say(format!("<@{}> is not down.", user.id)).await?;
        }
    }
    Ok(())
}
