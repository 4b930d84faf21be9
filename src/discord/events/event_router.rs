// Non-command Discord events. Each arm hands off to a small handler and
// logs failures; one bad event never takes the bot down.

pub mod role_guard;
pub mod room_reaper;
pub mod streak_watch;

use crate::discord::interactions::{handle_component, handle_modal};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = streak_watch::handle_message(ctx, data, new_message).await {
                tracing::error!(message_id = new_message.id.get(), "Error counting streak post: {}", e);
            }
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Err(e) = streak_watch::handle_reaction(ctx, data, add_reaction).await {
                tracing::error!("Error handling streak reaction: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberUpdate { event, .. } => {
            if let Err(e) = role_guard::enforce(
                &ctx.http,
                data,
                event.guild_id.get(),
                event.user.id.get(),
                &event.roles,
            )
            .await
            {
                tracing::error!("Error enforcing suspended roles: {}", e);
            }
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            if let Err(e) = room_reaper::handle_voice_state_update(ctx, data, old.as_ref(), new).await {
                tracing::error!("Error handling voice state update: {}", e);
            }
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            let result = match interaction {
                serenity::Interaction::Component(component) => {
                    handle_component(ctx, data, component).await
                }
                serenity::Interaction::Modal(modal) => handle_modal(ctx, data, modal).await,
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::error!("Error handling interaction: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}
