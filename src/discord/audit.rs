// Outbound notices: audit embeds in the guild's log channel and DMs that
// respect each member's notification preferences.

use crate::core::notifications::NotificationKind;
use crate::discord::Data;
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateMessage};

pub const COLOR_INFO: u32 = 0x5865F2;
pub const COLOR_OK: u32 = 0x57F287;
pub const COLOR_WARN: u32 = 0xFEE75C;
pub const COLOR_BAD: u32 = 0xED4245;

/// Post an embed to the guild's log channel. Silently does nothing when no
/// log channel is configured; send failures are logged.
pub async fn post_log(http: &serenity::Http, data: &Data, guild_id: u64, embed: CreateEmbed) {
    let Some(channel_id) = data.settings_or_default(guild_id).await.log_channel_id else {
        return;
    };

    if let Err(e) = serenity::ChannelId::new(channel_id)
        .send_message(http, CreateMessage::new().embed(embed.timestamp(serenity::Timestamp::now())))
        .await
    {
        tracing::warn!(guild_id, channel_id, error = %e, "Failed to post audit log");
    }
}

/// DM a member if they allow this kind of notification. Returns whether a
/// DM was delivered.
pub async fn notify(
    http: &serenity::Http,
    data: &Data,
    user_id: u64,
    kind: NotificationKind,
    message: CreateMessage,
) -> bool {
    if !data.notifications.allows(user_id, kind).await {
        tracing::debug!(user_id, kind = kind.label(), "DM suppressed by preferences");
        return false;
    }
    send_dm(http, user_id, message).await
}

/// DM a member regardless of preferences. Closed DMs are common, so
/// failures are logged at debug level only.
pub async fn send_dm(http: &serenity::Http, user_id: u64, message: CreateMessage) -> bool {
    let user = serenity::UserId::new(user_id);
    let channel = match user.create_dm_channel(http).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::debug!(user_id, error = %e, "Could not open DM channel");
            return false;
        }
    };

    match channel.send_message(http, message).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(user_id, error = %e, "Could not deliver DM");
            false
        }
    }
}
