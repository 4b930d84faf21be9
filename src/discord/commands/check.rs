// /check - everything the bot knows about a member, in one embed.

use chrono::Utc;

use crate::core::durations::describe_expiry;
use crate::core::streak::StreakStatus;
use crate::discord::audit::COLOR_INFO;
use crate::discord::data::require_guild;
use crate::discord::roles::mention_roles;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Summary of a member's standing.
#[poise::command(slash_command, guild_only)]
pub async fn check(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let user_id = user.id.get();
    let data = ctx.data();
    let now = Utc::now();

    let down = match data.downs.get(guild_id, user_id).await? {
        Some(record) => format!(
            "⬇️ until {} ({})",
            describe_expiry(record.expires_at),
            mention_roles(&record.removed_role_ids)
        ),
        None => "No".to_string(),
    };

    let vacation = match data.vacations.current(guild_id, user_id).await? {
        Some(v) => match v.ends_at {
            Some(end) => format!("🌴 {} · back <t:{}:R>", v.status.label(), end.timestamp()),
            None => format!("🌴 {} · {} day(s)", v.status.label(), v.days),
        },
        None => "No".to_string(),
    };

    let points = data.points.get(user_id, guild_id).await?;
    let rank = data
        .points
        .rank(user_id, guild_id)
        .await?
        .map(|r| format!("#{}", r))
        .unwrap_or_else(|| "unranked".to_string());

    let streak = match data.streaks.get(guild_id, user_id).await? {
        Some(r) if r.status == StreakStatus::PendingRestore => {
            format!("⏳ {} day(s), restore of {} pending", r.current, r.lost_streak)
        }
        Some(r) if r.current > 0 => format!("🔥 {} day(s) (best {})", r.current, r.longest),
        Some(r) => format!("None (best {})", r.longest),
        None => "None".to_string(),
    };

    let warnings = data.warnings.count(guild_id, user_id).await?;
    let blocked = if data.blocks.is_blocked(guild_id, user_id).await? {
        "⛔ Yes"
    } else {
        "No"
    };

    let responsibilities = data
        .responsibilities
        .responsibilities_of(guild_id, user_id)
        .await?;
    let responsibilities = if responsibilities.is_empty() {
        "None".to_string()
    } else {
        responsibilities.join(", ")
    };

    let promotion_ban = match data.promotions.active_ban(guild_id, user_id, now).await? {
        Some(ban) => format!("🚫 until {}", describe_expiry(ban.expires_at)),
        None => "No".to_string(),
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("🔎 {}", user.name))
        .thumbnail(user.face())
        .color(COLOR_INFO)
        .field("Down", down, false)
        .field("Vacation", vacation, false)
        .field("Points", format!("{} ({})", points, rank), true)
        .field("Streak", streak, true)
        .field("Warnings", warnings.to_string(), true)
        .field("Blocked", blocked, true)
        .field("Promotion ban", promotion_ban, true)
        .field("Responsibilities", responsibilities, false);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
