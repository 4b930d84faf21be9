use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;

// Category definitions with emojis and order
const CATEGORY_ORDER: &[&str] = &[
    "Quick Start",
    "Team",
    "Community",
    "Moderation",
    "Settings",
];

fn get_category_emoji(category: &str) -> &'static str {
    match category {
        "Quick Start" => "🚀",
        "Team" => "🛡️",
        "Community" => "🔥",
        "Moderation" => "⚖️",
        "Settings" => "🧰",
        _ => "•",
    }
}

struct CommandMetadata {
    category: &'static str,
    priority: i32,
    description: Option<&'static str>,
    note: Option<&'static str>,
}

fn get_command_metadata(name: &str) -> CommandMetadata {
    match name {
        "check" => CommandMetadata {
            category: "Quick Start",
            priority: 120,
            description: Some("See a member's points, streak, vacation and down status at a glance."),
            note: None,
        },
        "call" => CommandMetadata {
            category: "Quick Start",
            priority: 110,
            description: Some("Page everyone on a responsibility. The first to claim earns points."),
            note: None,
        },
        "notifications" => CommandMetadata {
            category: "Quick Start",
            priority: 100,
            description: Some("Choose which DMs the bot may send you."),
            note: Some("Subcommands: show, toggle"),
        },
        "responsibility" => CommandMetadata {
            category: "Team",
            priority: 90,
            description: Some("Create responsibilities and manage who belongs to them."),
            note: Some("Subcommands: create, delete, add_member, remove_member, add_role, remove_role, list, show"),
        },
        "points" => CommandMetadata {
            category: "Team",
            priority: 85,
            description: Some("Check, award or deduct points."),
            note: Some("Subcommands: show, add, remove, history, reset"),
        },
        "leaderboard" => CommandMetadata {
            category: "Team",
            priority: 80,
            description: Some("Browse the points leaderboard."),
            note: None,
        },
        "vacation" => CommandMetadata {
            category: "Team",
            priority: 75,
            description: Some("Request time off. Admin roles are suspended while you're away."),
            note: Some("Subcommands: request, cancel, end, status, list"),
        },
        "down" => CommandMetadata {
            category: "Team",
            priority: 70,
            description: Some("Temporarily take a member's admin roles away."),
            note: Some("Subcommands: apply, end, extend, list, info"),
        },
        "promote" => CommandMetadata {
            category: "Team",
            priority: 65,
            description: Some("Grant a role, optionally replacing one or with an expiry."),
            note: None,
        },
        "promotion" => CommandMetadata {
            category: "Team",
            priority: 60,
            description: Some("Revoke promotions and manage promotion bans."),
            note: Some("Subcommands: revoke, history, ban, unban"),
        },
        "streak" => CommandMetadata {
            category: "Community",
            priority: 90,
            description: Some("Post in the streak channel every day to keep your streak alive."),
            note: Some("Subcommands: show, top, restore, reset"),
        },
        "prayer" => CommandMetadata {
            category: "Community",
            priority: 80,
            description: Some("Daily prayer times and reminders."),
            note: Some("Subcommands: setup, enable, disable, remove, times"),
        },
        "color" => CommandMetadata {
            category: "Community",
            priority: 70,
            description: Some("Pick a name color."),
            note: Some("Subcommands: pick, clear, list, add, remove"),
        },
        "rooms" => CommandMetadata {
            category: "Community",
            priority: 60,
            description: Some("Open a temporary voice room that disappears when empty."),
            note: Some("Subcommands: create, rename, limit, lock, unlock, close, info"),
        },
        "warn" => CommandMetadata {
            category: "Moderation",
            priority: 80,
            description: Some("Warn a member. The log channel is alerted at the threshold."),
            note: None,
        },
        "warnings" => CommandMetadata {
            category: "Moderation",
            priority: 70,
            description: Some("Review, remove or clear warnings."),
            note: None,
        },
        "block" => CommandMetadata {
            category: "Moderation",
            priority: 60,
            description: Some("Keep a member from using the bot."),
            note: Some("Subcommands: add, remove, list"),
        },
        "settings" => CommandMetadata {
            category: "Settings",
            priority: 50,
            description: Some("Configure channels, admin roles, timezone and limits (Admin only)."),
            note: None,
        },
        _ => CommandMetadata {
            category: "Settings",
            priority: 0,
            description: None,
            note: None,
        },
    }
}

/// Show a categorized list of commands.
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let mut categories: HashMap<&str, Vec<(i32, String)>> = HashMap::new();

    for command in &ctx.framework().options().commands {
        if command.hide_in_help || command.name == "help" {
            continue;
        }

        let metadata = get_command_metadata(&command.name);
        let description = metadata
            .description
            .or(command.description.as_deref())
            .or(command.help_text.as_deref())
            .unwrap_or("No description provided.");

        let mut entry = format!("• **/{0}** · {1}", command.name, description);
        if let Some(note) = metadata.note {
            entry.push_str(&format!("\n  ⤷ {}", note));
        }

        categories
            .entry(metadata.category)
            .or_default()
            .push((metadata.priority, entry));
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Command Guide")
        .description(
            "Use slash commands with `/`. \
            Commands are grouped by what you want to do, most useful first.",
        )
        .color(serenity::Colour::from_rgb(88, 101, 242))
        .timestamp(serenity::Timestamp::now());

    if let Ok(user) = ctx.framework().bot_id.to_user(&ctx).await {
        embed = embed.thumbnail(user.face());
    }

    // Defined order first, then alphabetical
    let mut sorted_categories: Vec<_> = categories.keys().cloned().collect();
    sorted_categories.sort_by(|a, b| {
        let pos_a = CATEGORY_ORDER.iter().position(|&x| x == *a).unwrap_or(999);
        let pos_b = CATEGORY_ORDER.iter().position(|&x| x == *b).unwrap_or(999);
        pos_a.cmp(&pos_b).then(a.cmp(b))
    });

    for category in sorted_categories {
        if let Some(entries) = categories.get_mut(category) {
            // Priority descending, then name
            entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

            let title = format!("{} {}", get_category_emoji(category), category);
            let formatted_entries: Vec<String> = entries.iter().map(|(_, s)| s.clone()).collect();

            for (i, chunk) in chunk_entries(&formatted_entries).iter().enumerate() {
                let field_name = if i == 0 {
                    title.clone()
                } else {
                    format!("{} (cont.)", title)
                };
                embed = embed.field(field_name, chunk.join("\n"), false);
            }
        }
    }

    embed = embed.footer(serenity::CreateEmbedFooter::new(
        "Need a hand? Ping a moderator.",
    ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

fn chunk_entries(entries: &[String]) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current_chunk = Vec::new();
    let mut current_length = 0;

    for entry in entries {
        let entry_len = entry.len();
        // Discord field value limit is 1024
        if current_length + entry_len + 1 > 1000 && !current_chunk.is_empty() {
            chunks.push(current_chunk);
            current_chunk = Vec::new();
            current_length = 0;
        }

        current_chunk.push(entry.clone());
        current_length += entry_len + 1;
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_stay_under_field_limit() {
        let entries: Vec<String> = (0..40).map(|i| format!("{:0>60}", i)).collect();
        let chunks = chunk_entries(&entries);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.join("\n").len() <= 1024);
        }
        assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), 40);
    }

    #[test]
    fn every_category_has_an_emoji() {
        for category in CATEGORY_ORDER {
            assert_ne!(get_category_emoji(category), "•");
        }
    }

    #[test]
    fn unknown_commands_fall_back_to_settings() {
        let metadata = get_command_metadata("does_not_exist");
        assert_eq!(metadata.category, "Settings");
        assert!(metadata.description.is_none());
    }
}
