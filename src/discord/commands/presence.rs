// Bot presence. Discord-layer glue only: Context, ActivityData and
// OnlineStatus never reach the core.

use poise::serenity_prelude as serenity;

/// Show how many servers the bot is looking after.
pub fn show_guild_count(ctx: &serenity::Context, guilds: usize) {
    let activity = serenity::ActivityData::watching(format!(
        "{} server{}",
        guilds,
        if guilds == 1 { "" } else { "s" }
    ));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Resets the bot's status to the default message.
pub fn reset_status(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::playing("/help for commands");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Called once the bot is ready.
pub fn on_ready(ctx: &serenity::Context, ready: &serenity::Ready) {
    if ready.guilds.is_empty() {
        reset_status(ctx);
    } else {
        show_guild_count(ctx, ready.guilds.len());
    }
}
