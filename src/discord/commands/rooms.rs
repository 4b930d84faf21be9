// /rooms - temporary voice channels owned by a member.
//
// Rooms are created in the configured category and deleted when the last
// person leaves (see events::room_reaper) or, if nobody ever joined, by the
// sweeper after a short grace period.

use chrono::Utc;

use crate::core::rooms::{validate_name, TempRoom, MAX_USER_LIMIT};
use crate::discord::audit::COLOR_INFO;
use crate::discord::data::require_guild;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Your own temporary voice room.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("create", "rename", "limit", "lock", "unlock", "close", "info"),
    subcommand_required
)]
pub async fn rooms(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn owner_overwrite(owner_id: u64) -> serenity::PermissionOverwrite {
    serenity::PermissionOverwrite {
        allow: serenity::Permissions::CONNECT
            | serenity::Permissions::MOVE_MEMBERS
            | serenity::Permissions::MANAGE_CHANNELS,
        deny: serenity::Permissions::empty(),
        kind: serenity::PermissionOverwriteType::Member(serenity::UserId::new(owner_id)),
    }
}

/// Delete a room's channel. A channel that's already gone counts as done.
pub async fn delete_channel(http: &serenity::Http, room: &TempRoom) {
    if let Err(e) = serenity::ChannelId::new(room.channel_id).delete(http).await {
        tracing::warn!(
            guild_id = room.guild_id,
            channel_id = room.channel_id,
            error = %e,
            "Failed to delete room channel"
        );
    } else {
        tracing::info!(guild_id = room.guild_id, channel_id = room.channel_id, "Room deleted");
    }
}

/// Open a voice room.
#[poise::command(slash_command, guild_only)]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Room name"] name: Option<String>,
    #[description = "Max members (0 = unlimited)"]
    #[min = 0]
    #[max = 99]
    limit: Option<u32>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let owner_id = ctx.author().id.get();
    let settings = ctx.data().settings.get(guild_id).await?;
    let category = settings
        .rooms_category_id
        .ok_or("Rooms aren't set up here. Ask an admin to run `/settings rooms_category`.")?;

    let name = validate_name(
        &name.unwrap_or_else(|| format!("{}'s room", ctx.author().display_name())),
    )?;
    let user_limit = limit.unwrap_or(0).min(MAX_USER_LIMIT);
    ctx.data().rooms.ensure_can_create(guild_id, owner_id).await?;

    let channel = serenity::GuildId::new(guild_id)
        .create_channel(
            ctx.http(),
            serenity::CreateChannel::new(name.clone())
                .kind(serenity::ChannelType::Voice)
                .category(serenity::ChannelId::new(category))
                .user_limit(user_limit)
                .permissions(vec![owner_overwrite(owner_id)]),
        )
        .await?;

    let registered = ctx
        .data()
        .rooms
        .register(TempRoom {
            guild_id,
            channel_id: channel.id.get(),
            owner_id,
            name,
            user_limit,
            locked: false,
            created_at: Utc::now(),
        })
        .await;
    let room = match registered {
        Ok(room) => room,
        Err(e) => {
            // Lost a race with another create; don't leave an orphan channel
            if let Err(delete_err) = channel.id.delete(ctx.http()).await {
                tracing::warn!(channel_id = channel.id.get(), error = %delete_err, "Failed to delete unregistered room");
            }
            return Err(e.into());
        }
    };

    tracing::info!(guild_id, owner_id, channel_id = room.channel_id, "Room created");
    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "🔊 Created <#{}>. It disappears once everyone leaves.",
                room.channel_id
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Rename your room.
#[poise::command(slash_command, guild_only)]
pub async fn rename(
    ctx: Context<'_>,
    #[description = "New name"] name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .rename(guild_id, ctx.author().id.get(), &name)
        .await?;
    serenity::ChannelId::new(room.channel_id)
        .edit(ctx.http(), serenity::EditChannel::new().name(room.name.clone()))
        .await?;
    ctx.send(
        poise::CreateReply::default()
            .content(format!("✏️ Renamed to **{}**.", room.name))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Change how many people fit in your room.
#[poise::command(slash_command, guild_only)]
pub async fn limit(
    ctx: Context<'_>,
    #[description = "Max members (0 = unlimited)"]
    #[min = 0]
    #[max = 99]
    limit: u32,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .set_limit(guild_id, ctx.author().id.get(), limit)
        .await?;
    serenity::ChannelId::new(room.channel_id)
        .edit(ctx.http(), serenity::EditChannel::new().user_limit(room.user_limit))
        .await?;
    let text = if room.user_limit == 0 {
        "👥 No member limit.".to_string()
    } else {
        format!("👥 Limit set to {}.", room.user_limit)
    };
    ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
        .await?;
    Ok(())
}

/// Stop new people from joining.
#[poise::command(slash_command, guild_only)]
pub async fn lock(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .set_locked(guild_id, ctx.author().id.get(), true)
        .await?;

    // @everyone shares the guild's id
    serenity::ChannelId::new(room.channel_id)
        .create_permission(
            ctx.http(),
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::empty(),
                deny: serenity::Permissions::CONNECT,
                kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id)),
            },
        )
        .await?;
    ctx.send(poise::CreateReply::default().content("🔒 Room locked.").ephemeral(true))
        .await?;
    Ok(())
}

/// Let anyone join again.
#[poise::command(slash_command, guild_only)]
pub async fn unlock(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .set_locked(guild_id, ctx.author().id.get(), false)
        .await?;
    serenity::ChannelId::new(room.channel_id)
        .delete_permission(
            ctx.http(),
            serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id)),
        )
        .await?;
    ctx.send(poise::CreateReply::default().content("🔓 Room unlocked.").ephemeral(true))
        .await?;
    Ok(())
}

/// Delete your room now.
#[poise::command(slash_command, guild_only)]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .close(guild_id, ctx.author().id.get())
        .await?;
    delete_channel(ctx.http(), &room).await;
    ctx.send(poise::CreateReply::default().content("🗑️ Room closed.").ephemeral(true))
        .await?;
    Ok(())
}

/// Details of your room.
#[poise::command(slash_command, guild_only)]
pub async fn info(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let room = ctx
        .data()
        .rooms
        .owned_by(guild_id, ctx.author().id.get())
        .await?
        .ok_or("You don't own a room. Create one with `/rooms create`.")?;

    let embed = serenity::CreateEmbed::new()
        .title(format!("🔊 {}", room.name))
        .color(COLOR_INFO)
        .field("Channel", format!("<#{}>", room.channel_id), true)
        .field(
            "Limit",
            if room.user_limit == 0 {
                "Unlimited".to_string()
            } else {
                room.user_limit.to_string()
            },
            true,
        )
        .field("Locked", if room.locked { "Yes" } else { "No" }, true)
        .field("Created", format!("<t:{}:R>", room.created_at.timestamp()), true);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_manage_their_room() {
        let overwrite = owner_overwrite(42);
        assert!(overwrite.allow.contains(serenity::Permissions::CONNECT));
        assert!(overwrite.allow.contains(serenity::Permissions::MOVE_MEMBERS));
        assert!(overwrite.deny.is_empty());
        assert_eq!(
            overwrite.kind,
            serenity::PermissionOverwriteType::Member(serenity::UserId::new(42))
        );
    }
}
