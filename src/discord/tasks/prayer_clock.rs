// Posts prayer reminders. Runs every minute; the prayer service decides
// what is due and makes sure each reminder goes out once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::core::prayer::DueReminder;
use crate::discord::audit::COLOR_INFO;
use crate::discord::Data;
use poise::serenity_prelude as serenity;

const TICK: Duration = Duration::from_secs(60);

fn reminder_message(reminder: &DueReminder) -> serenity::CreateMessage {
    let embed = serenity::CreateEmbed::new()
        .title(format!("🕌 {} · {}", reminder.prayer.name(), reminder.time.format("%H:%M")))
        .description(format!("It's time for {} prayer in {}.", reminder.prayer.name(), reminder.city))
        .color(COLOR_INFO);

    let mut message = serenity::CreateMessage::new().embed(embed);
    if let Some(role_id) = reminder.mention_role_id {
        message = message
            .content(format!("<@&{}>", role_id))
            .allowed_mentions(
                serenity::CreateAllowedMentions::new().roles(vec![serenity::RoleId::new(role_id)]),
            );
    }
    message
}

pub async fn run(http: Arc<serenity::Http>, data: Data) {
    loop {
        tick(&http, &data).await;
        sleep(TICK).await;
    }
}

async fn tick(http: &serenity::Http, data: &Data) {
    let configs = match data.prayer.enabled_configs().await {
        Ok(configs) => configs,
        Err(e) => {
            tracing::error!("Failed to load prayer configs: {}", e);
            return;
        }
    };

    for config in configs {
        let fallback = data.guild_tz(config.guild_id).await;
        let now_local = match data.prayer.city_now(config.guild_id, Utc::now(), fallback).await {
            Ok(now) => now,
            Err(e) => {
                tracing::warn!(guild_id = config.guild_id, "Failed to resolve prayer city time: {}", e);
                continue;
            }
        };

        let due = match data.prayer.due_reminders(&config, now_local).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(guild_id = config.guild_id, "Failed to compute prayer reminders: {}", e);
                continue;
            }
        };

        for reminder in due {
            if let Err(e) = serenity::ChannelId::new(reminder.channel_id)
                .send_message(http, reminder_message(&reminder))
                .await
            {
                tracing::warn!(
                    guild_id = reminder.guild_id,
                    channel_id = reminder.channel_id,
                    prayer = reminder.prayer.name(),
                    "Failed to post prayer reminder: {}",
                    e
                );
            } else {
                tracing::info!(guild_id = reminder.guild_id, prayer = reminder.prayer.name(), "Prayer reminder posted");
            }
        }
    }
}
