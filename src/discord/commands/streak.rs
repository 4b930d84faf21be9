// /streak - daily posting streaks and restore requests.

use chrono::Utc;
use rand::seq::SliceRandom;

use crate::core::notifications::NotificationKind;
use crate::core::streak::{local_today, RestorePolicy, StreakRecord, StreakStatus};
use crate::discord::audit::{self, COLOR_BAD, COLOR_INFO, COLOR_OK, COLOR_WARN};
use crate::discord::data::require_guild;
use crate::discord::interactions::{
    can_manage_roles, decision_row, reply_ephemeral, resolve_message, ComponentAction,
};
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Daily posting streaks.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("show", "top", "restore", "reset"),
    subcommand_required
)]
pub async fn streak(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn status_text(record: &StreakRecord) -> &'static str {
    match record.status {
        StreakStatus::Active if record.current > 0 => "🔥 Active",
        StreakStatus::Active => "Not started",
        StreakStatus::Expired => "💤 Expired",
        StreakStatus::PendingRestore => "⏳ Restore pending",
    }
}

/// Celebration line for hitting a milestone.
pub fn milestone_message(user_id: u64, milestone: u32) -> String {
    const FLAVOR_LINES: [&str; 4] = [
        "Unstoppable.",
        "Consistency is a superpower.",
        "The fire keeps burning.",
        "Showing up every single day.",
    ];
    let flavor = FLAVOR_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FLAVOR_LINES[0]);
    format!(
        "🎉 <@{}> just hit a **{}-day** streak! {}",
        user_id, milestone, flavor
    )
}

/// A member's streak.
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let record = ctx
        .data()
        .streaks
        .get(guild_id, user.id.get())
        .await?
        .unwrap_or_else(|| StreakRecord::new(guild_id, user.id.get()));

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🔥 Streak · {}", user.name))
        .color(COLOR_INFO)
        .field("Current", format!("{} day(s)", record.current), true)
        .field("Longest", format!("{} day(s)", record.longest), true)
        .field("Status", status_text(&record), true)
        .field("Posts", record.total_posts.to_string(), true);
    if let Some(last) = record.last_post_date {
        embed = embed.field("Last post", last.format("%Y-%m-%d").to_string(), true);
    }
    if record.lost_streak > 0 {
        embed = embed.field(
            "Lost streak",
            format!("{} day(s), use `/streak restore` to ask for it back", record.lost_streak),
            false,
        );
    }
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Longest running streaks in this server.
#[poise::command(slash_command, guild_only)]
pub async fn top(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let records = ctx.data().streaks.leaderboard(guild_id, 10).await?;

    let description = if records.is_empty() {
        "Nobody has a streak going yet.".to_string()
    } else {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let medal = match i {
                    0 => "🥇".to_string(),
                    1 => "🥈".to_string(),
                    2 => "🥉".to_string(),
                    _ => format!("#{}", i + 1),
                };
                format!(
                    "{} <@{}> · **{}** day(s) (best {})",
                    medal, r.user_id, r.current, r.longest
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("🔥 Streak leaderboard")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Ask a moderator to give back your lost streak.
#[poise::command(slash_command, guild_only)]
pub async fn restore(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let data = ctx.data();
    let settings = data.settings.get(guild_id).await?;
    let approvals = settings
        .approvals_target()
        .ok_or("This server has no approvals channel. Ask an admin to run `/settings approvals_channel`.")?;
    let user_id = ctx.author().id.get();
    let today = local_today(Utc::now(), settings.tz());

    let record = data
        .streaks
        .request_restore(
            guild_id,
            user_id,
            today,
            RestorePolicy {
                window_days: settings.restore_window_days,
                max_per_month: settings.max_restores_per_month,
            },
        )
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("⏳ Streak restore request")
        .color(COLOR_WARN)
        .field("Member", format!("<@{}>", user_id), true)
        .field("Lost streak", format!("{} day(s)", record.lost_streak), true)
        .field("Current", format!("{} day(s)", record.current), true);
    let request = serenity::CreateMessage::new()
        .embed(embed)
        .components(vec![decision_row(
            ComponentAction::StreakApprove { guild_id, user_id },
            ComponentAction::StreakReject { guild_id, user_id },
        )]);
    if let Err(e) = serenity::ChannelId::new(approvals)
        .send_message(ctx.http(), request)
        .await
    {
        // Nobody could decide it; the lost streak itself is kept
        data.streaks.withdraw_restore(guild_id, user_id).await?;
        return Err(e.into());
    }

    tracing::info!(guild_id, user_id, lost = record.lost_streak, "Streak restore requested");
    ctx.send(
        poise::CreateReply::default()
            .content("📨 Restore request sent to the moderators.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Wipe a member's streak.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn reset(
    ctx: Context<'_>,
    #[description = "Member"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if ctx.data().streaks.reset(guild_id, member.id.get()).await? {
        ctx.say(format!("🧹 Reset <@{}>'s streak.", member.id)).await?;
        audit::post_log(
            ctx.http(),
            ctx.data(),
            guild_id,
            serenity::CreateEmbed::new()
                .title("Streak reset")
                .color(COLOR_BAD)
                .description(format!("<@{}> by <@{}>", member.id, ctx.author().id)),
        )
        .await;
    } else {
        ctx.say(format!("<@{}> has no streak to reset.", member.id))
            .await?;
    }
    Ok(())
}

/// Approve or reject a pending restore from its approvals message.
pub async fn decide_restore(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
    guild_id: u64,
    user_id: u64,
    approve: bool,
) -> Result<(), Error> {
    if !can_manage_roles(component) {
        return reply_ephemeral(ctx, component, "You need Manage Roles to decide restores.").await;
    }

    let moderator = component.user.id.get();
    let result = if approve {
        let today = local_today(Utc::now(), data.guild_tz(guild_id).await);
        data.streaks
            .approve_restore(guild_id, user_id, moderator, today)
            .await
    } else {
        data.streaks.reject_restore(guild_id, user_id, moderator).await
    };
    let record = match result {
        Ok(record) => record,
        Err(e) => return reply_ephemeral(ctx, component, format!("❌ {}", e)).await,
    };

    let (title, color, dm) = if approve {
        (
            "✅ Streak restored",
            COLOR_OK,
            format!("🔥 Your streak was restored to **{}** day(s)!", record.current),
        )
    } else {
        (
            "❌ Restore rejected",
            COLOR_BAD,
            "Your streak restore request was rejected.".to_string(),
        )
    };

    let embed = serenity::CreateEmbed::new()
        .title(title)
        .color(color)
        .field("Member", format!("<@{}>", user_id), true)
        .field("Current", format!("{} day(s)", record.current), true)
        .field("Decided by", format!("<@{}>", moderator), true);
    resolve_message(ctx, component, embed).await?;

    audit::notify(
        &ctx.http,
        data,
        user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().content(dm),
    )
    .await;
    tracing::info!(guild_id, user_id, moderator, approve, "Streak restore decided");
    Ok(())
}
