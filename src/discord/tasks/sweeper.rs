// Periodic cleanup: ends lapsed downs, vacations and promotions, forgets
// old calls, and deletes rooms nobody used.

use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::core::rooms::empty_grace;
use crate::discord::commands::{down, promotion, rooms, vacation};
use crate::discord::events::room_reaper::occupants;
use crate::discord::Data;
use poise::serenity_prelude as serenity;

/// Calls older than this can no longer be claimed.
const CALL_RETENTION_HOURS: i64 = 24;

pub async fn run(ctx: serenity::Context, data: Data, interval: Duration) {
    loop {
        sweep_once(&ctx, &data).await;
        sleep(interval).await;
    }
}

async fn sweep_once(ctx: &serenity::Context, data: &Data) {
    let now = Utc::now();
    let http = &ctx.http;

    match data.downs.due(now).await {
        Ok(records) => {
            for record in records {
                // Complete first so a failing restore isn't retried forever
                if let Err(e) = data.downs.complete(record.guild_id, record.user_id).await {
                    tracing::error!(guild_id = record.guild_id, user_id = record.user_id, "Failed to complete down: {}", e);
                    continue;
                }
                down::restore(http, data, &record, "Down expired").await;
            }
        }
        Err(e) => tracing::error!("Failed to load due downs: {}", e),
    }

    match data.vacations.due(now).await {
        Ok(list) => {
            for due in list {
                match data.vacations.complete(due.id, now).await {
                    Ok(done) => vacation::return_roles(http, data, &done, "Vacation ended").await,
                    Err(e) => tracing::error!(vacation_id = due.id, "Failed to complete vacation: {}", e),
                }
            }
        }
        Err(e) => tracing::error!("Failed to load due vacations: {}", e),
    }

    match data.promotions.due(now).await {
        Ok(list) => {
            for due in list {
                match data.promotions.expire(due.id).await {
                    Ok(expired) => promotion::revert(http, data, &expired, "expired").await,
                    Err(e) => tracing::error!(promotion_id = due.id, "Failed to expire promotion: {}", e),
                }
            }
        }
        Err(e) => tracing::error!("Failed to load due promotions: {}", e),
    }

    let pruned = data
        .responsibilities
        .prune_calls(now - chrono::Duration::hours(CALL_RETENTION_HOURS));
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned old calls");
    }

    match data.rooms.all().await {
        Ok(all) => {
            for room in all {
                let Some(count) = occupants(ctx, room.guild_id, room.channel_id) else {
                    continue;
                };
                if !room.is_stale(count, now, empty_grace()) {
                    continue;
                }
                if let Err(e) = data.rooms.forget(room.channel_id).await {
                    tracing::error!(channel_id = room.channel_id, "Failed to forget room: {}", e);
                    continue;
                }
                rooms::delete_channel(http, &room).await;
            }
        }
        Err(e) => tracing::error!("Failed to load rooms: {}", e),
    }
}
