// Counts posts in the streak channel and lets moderators void them.

use chrono::{DateTime, Utc};

use crate::core::streak::{local_today, PostOutcome};
use crate::discord::commands::streak::milestone_message;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

const COUNTED: char = '🔥';
const REVOKE: &str = "❌";

const MEDIA_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".mp4", ".mov", ".webm",
];

fn is_media(content_type: Option<&str>, filename: &str) -> bool {
    if let Some(kind) = content_type {
        if kind.starts_with("image/") || kind.starts_with("video/") {
            return true;
        }
    }
    let name = filename.to_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn has_media(msg: &serenity::Message) -> bool {
    msg.attachments
        .iter()
        .any(|a| is_media(a.content_type.as_deref(), &a.filename))
        || msg
            .embeds
            .iter()
            .any(|e| e.image.is_some() || e.video.is_some())
}

fn posted_at(msg: &serenity::Message) -> DateTime<Utc> {
    DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<(), Error> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id.map(|id| id.get()) else {
        return Ok(());
    };

    let settings = data.settings_or_default(guild_id).await;
    if settings.streak_channel_id != Some(msg.channel_id.get()) {
        return Ok(());
    }
    let user_id = msg.author.id.get();
    if data.blocks.is_blocked(guild_id, user_id).await? {
        return Ok(());
    }
    if settings.streak_require_media && !has_media(msg) {
        return Ok(());
    }

    let today = local_today(posted_at(msg), settings.tz());
    match data.streaks.record_post(guild_id, user_id, today).await? {
        PostOutcome::AlreadyCounted => {}
        PostOutcome::Started { current } => {
            tracing::debug!(guild_id, user_id, current, "Streak started");
            msg.react(&ctx.http, COUNTED).await?;
        }
        PostOutcome::Extended { current, milestone } => {
            tracing::debug!(guild_id, user_id, current, "Streak extended");
            msg.react(&ctx.http, COUNTED).await?;
            if let Some(days) = milestone {
                tracing::info!(guild_id, user_id, days, "Streak milestone");
                msg.channel_id
                    .say(&ctx.http, milestone_message(user_id, days))
                    .await?;
            }
        }
    }
    Ok(())
}

/// A moderator reacting ❌ to today's post in the streak channel voids it.
pub async fn handle_reaction(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
) -> Result<(), Error> {
    if !matches!(&reaction.emoji, serenity::ReactionType::Unicode(s) if s == REVOKE) {
        return Ok(());
    }
    let Some(guild_id) = reaction.guild_id.map(|id| id.get()) else {
        return Ok(());
    };
    let settings = data.settings_or_default(guild_id).await;
    if settings.streak_channel_id != Some(reaction.channel_id.get()) {
        return Ok(());
    }

    let Some(member) = reaction.member.as_ref() else {
        return Ok(());
    };
    if member.user.bot {
        return Ok(());
    }
    let can_moderate = ctx
        .cache
        .guild(serenity::GuildId::new(guild_id))
        .map(|guild| guild.member_permissions(member).manage_messages())
        .unwrap_or(false);
    if !can_moderate {
        return Ok(());
    }

    let message = reaction.message(&ctx.http).await?;
    let author_id = message.author.id.get();
    let tz = settings.tz();
    let today = local_today(Utc::now(), tz);
    if local_today(posted_at(&message), tz) != today {
        return Ok(());
    }

    match data.streaks.revoke_post(guild_id, author_id, today).await {
        Ok(record) => {
            tracing::info!(
                guild_id,
                user_id = author_id,
                moderator_id = member.user.id.get(),
                current = record.current,
                "Streak post revoked"
            );
            let bot_id = ctx.cache.current_user().id;
            if let Err(e) = message
                .delete_reaction(&ctx.http, Some(bot_id), COUNTED)
                .await
            {
                tracing::debug!(error = %e, "Could not remove streak reaction");
            }
        }
        Err(e) => tracing::debug!(guild_id, user_id = author_id, error = %e, "Nothing to revoke"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_wins_over_extension() {
        assert!(is_media(Some("image/png"), "blob"));
        assert!(is_media(Some("video/mp4"), "clip"));
        assert!(!is_media(Some("text/plain"), "notes.txt"));
    }

    #[test]
    fn extension_fallback_is_case_insensitive() {
        assert!(is_media(None, "Sunset.JPG"));
        assert!(is_media(None, "clip.webm"));
        assert!(!is_media(None, "archive.zip"));
    }
}
