// /notifications - which DMs the bot may send you.

use poise::ChoiceParameter;

use crate::core::notifications::NotificationKind;
use crate::discord::audit::COLOR_INFO;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum NotificationChoice {
    #[name = "Responsibility calls"]
    CallDms,
    #[name = "Streak reminders"]
    StreakReminders,
    #[name = "Status updates"]
    StatusDms,
}

impl From<NotificationChoice> for NotificationKind {
    fn from(choice: NotificationChoice) -> Self {
        match choice {
            NotificationChoice::CallDms => NotificationKind::CallDms,
            NotificationChoice::StreakReminders => NotificationKind::StreakReminders,
            NotificationChoice::StatusDms => NotificationKind::StatusDms,
        }
    }
}

/// Your DM preferences.
#[poise::command(slash_command, subcommands("show", "toggle"), subcommand_required)]
pub async fn notifications(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show what the bot may DM you about.
#[poise::command(slash_command)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let prefs = ctx
        .data()
        .notifications
        .prefs(ctx.author().id.get())
        .await?;

    let lines = NotificationKind::ALL
        .iter()
        .map(|kind| {
            let icon = if prefs.allows(*kind) { "🔔" } else { "🔕" };
            format!("{} {}", icon, kind.label())
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("Notification preferences")
        .description(lines)
        .footer(serenity::CreateEmbedFooter::new(
            "Use /notifications toggle to change one.",
        ))
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Turn one kind of DM on or off.
#[poise::command(slash_command)]
pub async fn toggle(
    ctx: Context<'_>,
    #[description = "Which notifications"] kind: NotificationChoice,
) -> Result<(), Error> {
    let enabled = ctx
        .data()
        .notifications
        .toggle(ctx.author().id.get(), kind.into())
        .await?;

    let state = if enabled { "🔔 on" } else { "🔕 off" };
    ctx.send(
        poise::CreateReply::default()
            .content(format!("{} are now {}.", kind.name(), state))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
