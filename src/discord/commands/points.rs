// /points and /leaderboard.

use crate::core::points::PointsEntry;
use crate::discord::audit::{self, COLOR_INFO};
use crate::discord::data::require_guild;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

const PER_PAGE: usize = 10;
const LEADERBOARD_LIMIT: usize = 500;
const HISTORY_LIMIT: usize = 10;

/// Points earned by helping out.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("show", "add", "remove", "history", "reset"),
    subcommand_required
)]
pub async fn points(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show a member's points and rank.
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let user_id = user.id.get();

    let total = ctx.data().points.get(user_id, guild_id).await?;
    let rank = ctx.data().points.rank(user_id, guild_id).await?;

    let embed = serenity::CreateEmbed::new()
        .title(format!("⭐ {}", user.name))
        .thumbnail(user.face())
        .color(COLOR_INFO)
        .field("Points", total.to_string(), true)
        .field(
            "Rank",
            rank.map(|r| format!("#{}", r))
                .unwrap_or_else(|| "Unranked".to_string()),
            true,
        );
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Award points to a member.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "Points to add"]
    #[min = 1]
    amount: i64,
    #[description = "Why"] reason: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let change = ctx
        .data()
        .points
        .award(
            user.id.get(),
            guild_id,
            amount,
            &reason,
            Some(ctx.author().id.get()),
        )
        .await?;

    tracing::info!(
        guild_id,
        user_id = user.id.get(),
        moderator_id = ctx.author().id.get(),
        amount,
        "Points awarded"
    );
    ctx.say(format!(
        "✅ Gave **{}** point(s) to <@{}> (total {}).",
        change.applied, user.id, change.total
    ))
    .await?;

    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Points awarded")
            .color(COLOR_INFO)
            .description(format!(
                "<@{}> gave **{}** to <@{}>: {}",
                ctx.author().id,
                change.applied,
                user.id,
                reason
            )),
    )
    .await;
    Ok(())
}

/// Take points from a member (never below zero).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "Points to remove"]
    #[min = 1]
    amount: i64,
    #[description = "Why"] reason: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let change = ctx
        .data()
        .points
        .deduct(
            user.id.get(),
            guild_id,
            amount,
            &reason,
            Some(ctx.author().id.get()),
        )
        .await?;

    ctx.say(format!(
        "✅ Removed **{}** point(s) from <@{}> (total {}).",
        -change.applied,
        user.id,
        change.total
    ))
    .await?;

    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Points removed")
            .color(audit::COLOR_WARN)
            .description(format!(
                "<@{}> removed **{}** from <@{}>: {}",
                ctx.author().id,
                -change.applied,
                user.id,
                reason
            )),
    )
    .await;
    Ok(())
}

/// Recent point changes for a member.
#[poise::command(slash_command, guild_only)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let events = ctx
        .data()
        .points
        .history(user.id.get(), guild_id, HISTORY_LIMIT)
        .await?;

    let description = if events.is_empty() {
        "No point changes yet.".to_string()
    } else {
        events
            .iter()
            .map(|e| {
                format!(
                    "`{:+}` {} · <t:{}:R>{}",
                    e.delta,
                    e.reason,
                    e.created_at.timestamp(),
                    e.actor_id
                        .map(|id| format!(" by <@{}>", id))
                        .unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("📜 Point history: {}", user.name))
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Wipe every member's points in this server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn reset(
    ctx: Context<'_>,
    #[description = "Type RESET to confirm"] confirm: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if confirm != "RESET" {
        ctx.say("Nothing changed. Pass `RESET` to confirm.").await?;
        return Ok(());
    }

    let cleared = ctx.data().points.reset_guild(guild_id).await?;
    tracing::warn!(guild_id, cleared, moderator_id = ctx.author().id.get(), "Points reset");
    ctx.say(format!("🧹 Points reset for {} member(s).", cleared))
        .await?;

    audit::post_log(
        ctx.http(),
        ctx.data(),
        guild_id,
        serenity::CreateEmbed::new()
            .title("Points reset")
            .color(audit::COLOR_BAD)
            .description(format!("<@{}> reset all points", ctx.author().id)),
    )
    .await;
    Ok(())
}

// ============================================================================
// LEADERBOARD
// ============================================================================

fn total_pages(entries: usize) -> usize {
    entries.div_ceil(PER_PAGE).max(1)
}

fn page_of(entries: &[PointsEntry], user_id: u64) -> Option<usize> {
    entries
        .iter()
        .position(|e| e.user_id == user_id)
        .map(|idx| idx / PER_PAGE + 1)
}

fn render_page(
    entries: &[PointsEntry],
    page: usize,
    viewer_id: u64,
    name_of: impl Fn(u64) -> String,
) -> String {
    let offset = (page - 1) * PER_PAGE;
    let mut description = String::new();

    match entries.iter().position(|e| e.user_id == viewer_id) {
        Some(idx) => description.push_str(&format!("Your rank: **#{}**\n\n", idx + 1)),
        None => description.push_str("You are not ranked yet.\n\n"),
    }

    for (index, entry) in entries.iter().skip(offset).take(PER_PAGE).enumerate() {
        let rank = offset + index + 1;
        let medal = match rank {
            1 => "🥇",
            2 => "🥈",
            3 => "🥉",
            _ => "▫️",
        };

        let name = name_of(entry.user_id);
        let name_display = if entry.user_id == viewer_id {
            format!("**{}** (You)", name)
        } else {
            name
        };

        description.push_str(&format!(
            "{} **#{}** {} · {} pts\n",
            medal, rank, name_display, entry.points
        ));
    }

    description
}

fn leaderboard_components(page: usize, pages: usize) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("prev")
            .label("◀ Previous")
            .style(serenity::ButtonStyle::Primary)
            .disabled(page == 1),
        serenity::CreateButton::new("next")
            .label("Next ▶")
            .style(serenity::ButtonStyle::Primary)
            .disabled(page == pages),
        serenity::CreateButton::new("find_me")
            .label("🔍 Find Me")
            .style(serenity::ButtonStyle::Secondary),
    ])]
}

fn leaderboard_embed(description: String, page: usize, pages: usize) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("🏆 Points Leaderboard")
        .description(description)
        .color(0xffd700)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Page {}/{}",
            page, pages
        )))
}

/// Cache-only display name. HTTP lookups would make paging sluggish.
fn resolve_display_name_cached(ctx: &Context<'_>, guild_id: u64, user_id: u64) -> String {
    let guild_id_s = serenity::GuildId::new(guild_id);
    let user_id_s = serenity::UserId::new(user_id);

    if let Some(guild) = ctx.serenity_context().cache.guild(guild_id_s) {
        if let Some(member) = guild.members.get(&user_id_s) {
            return member.display_name().to_string();
        }
    }

    if let Some(user) = ctx.serenity_context().cache.user(user_id_s) {
        return user.name.clone();
    }

    format!("<@{}>", user_id)
}

/// Show the points leaderboard.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Page to open"]
    #[min = 1]
    page: Option<usize>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let entries = ctx
        .data()
        .points
        .leaderboard(guild_id, LEADERBOARD_LIMIT)
        .await?;

    if entries.is_empty() {
        ctx.say("Nobody has earned points yet.").await?;
        return Ok(());
    }

    let viewer_id = ctx.author().id.get();
    let pages = total_pages(entries.len());
    let mut current_page = page.unwrap_or(1).clamp(1, pages);

    let description = render_page(&entries, current_page, viewer_id, |id| {
        resolve_display_name_cached(&ctx, guild_id, id)
    });
    let msg = ctx
        .send(
            poise::CreateReply::default()
                .embed(leaderboard_embed(description, current_page, pages))
                .components(leaderboard_components(current_page, pages)),
        )
        .await?;
    let msg_id = msg.message().await?.id;

    while let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .timeout(std::time::Duration::from_secs(60 * 2))
        .filter(move |mci| mci.message.id == msg_id)
        .await
    {
        match mci.data.custom_id.as_str() {
            "prev" => current_page = current_page.saturating_sub(1).max(1),
            "next" => current_page = (current_page + 1).min(pages),
            "find_me" => match page_of(&entries, viewer_id) {
                Some(p) => current_page = p,
                None => {
                    if let Err(e) = mci
                        .create_response(
                            &ctx,
                            serenity::CreateInteractionResponse::Message(
                                serenity::CreateInteractionResponseMessage::new()
                                    .content("You are not on the leaderboard yet!")
                                    .ephemeral(true),
                            ),
                        )
                        .await
                    {
                        tracing::warn!("Error sending ephemeral response: {:?}", e);
                    }
                    continue;
                }
            },
            _ => {}
        }

        if let Err(e) = mci.defer(ctx.http()).await {
            tracing::warn!("Error deferring leaderboard interaction: {:?}", e);
            continue;
        }

        let description = render_page(&entries, current_page, viewer_id, |id| {
            resolve_display_name_cached(&ctx, guild_id, id)
        });
        if let Err(e) = msg
            .edit(
                ctx,
                poise::CreateReply::default()
                    .embed(leaderboard_embed(description, current_page, pages))
                    .components(leaderboard_components(current_page, pages)),
            )
            .await
        {
            tracing::warn!("Error updating leaderboard: {:?}", e);
        }
    }

    let _ = msg
        .edit(ctx, poise::CreateReply::default().components(vec![]))
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(n: u64) -> Vec<PointsEntry> {
        (1..=n)
            .map(|i| PointsEntry {
                user_id: i,
                guild_id: 1,
                points: (1000 - i) as i64,
                updated_at: None,
            })
            .collect()
    }

    #[test]
    fn page_math() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(10), 1);
        assert_eq!(total_pages(11), 2);

        let entries = board(25);
        assert_eq!(page_of(&entries, 1), Some(1));
        assert_eq!(page_of(&entries, 11), Some(2));
        assert_eq!(page_of(&entries, 25), Some(3));
        assert_eq!(page_of(&entries, 99), None);
    }

    #[test]
    fn renders_medals_and_viewer() {
        let entries = board(12);
        let page = render_page(&entries, 1, 2, |id| format!("user{}", id));
        assert!(page.starts_with("Your rank: **#2**"));
        assert!(page.contains("🥇 **#1** user1 · 999 pts"));
        assert!(page.contains("🥈 **#2** **user2** (You)"));
        assert!(!page.contains("user11"));

        let second = render_page(&entries, 2, 50, |id| format!("user{}", id));
        assert!(second.starts_with("You are not ranked yet."));
        assert!(second.contains("**#11** user11"));
    }
}
