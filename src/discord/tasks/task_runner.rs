// Background loops started once the bot is ready.

pub mod prayer_clock;
pub mod streak_clock;
pub mod sweeper;

use std::time::Duration;

use crate::discord::Data;
use poise::serenity_prelude as serenity;

pub fn spawn_all(ctx: &serenity::Context, data: &Data, sweep_interval: Duration) {
    tokio::spawn(sweeper::run(ctx.clone(), data.clone(), sweep_interval));
    tokio::spawn(streak_clock::run(ctx.http.clone(), data.clone()));
    tokio::spawn(prayer_clock::run(ctx.http.clone(), data.clone()));
    tracing::info!(sweep_secs = sweep_interval.as_secs(), "Background tasks started");
}
