// Deletes a temporary room as soon as the last person leaves it.

use crate::discord::commands::rooms::delete_channel;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// People (bots excluded) currently in `channel_id`, from the cache.
/// `None` when the guild isn't cached.
pub fn occupants(ctx: &serenity::Context, guild_id: u64, channel_id: u64) -> Option<usize> {
    let guild = ctx.cache.guild(serenity::GuildId::new(guild_id))?;
    Some(
        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id.map(|id| id.get()) == Some(channel_id))
            .filter(|vs| {
                guild
                    .members
                    .get(&vs.user_id)
                    .map(|m| !m.user.bot)
                    .unwrap_or(true)
            })
            .count(),
    )
}

pub async fn handle_voice_state_update(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) -> Result<(), Error> {
    let Some(guild_id) = new.guild_id.map(|id| id.get()) else {
        return Ok(());
    };
    let Some(left) = old.and_then(|s| s.channel_id).map(|id| id.get()) else {
        return Ok(());
    };
    if new.channel_id.map(|id| id.get()) == Some(left) {
        return Ok(());
    }

    let Some(room) = data.rooms.get(left).await? else {
        return Ok(());
    };
    // An uncached guild is left to the sweeper
    if occupants(ctx, guild_id, left) != Some(0) {
        return Ok(());
    }

    data.rooms.forget(room.channel_id).await?;
    delete_channel(&ctx.http, &room).await;
    Ok(())
}
