// /color - self-assignable name colors. A member holds at most one.

use crate::core::colors::ColorChange;
use crate::discord::audit::COLOR_INFO;
use crate::discord::data::require_guild;
use crate::discord::roles;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Pick a name color.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("pick", "clear", "list", "add", "remove"),
    subcommand_required
)]
pub async fn color(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn autocomplete_color<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let labels = match ctx.guild_id() {
        Some(guild_id) => ctx
            .data()
            .colors
            .list(guild_id.get())
            .await
            .map(|roles| roles.into_iter().map(|r| r.label).collect::<Vec<_>>())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    let partial = partial.to_lowercase();
    labels
        .into_iter()
        .filter(move |label| label.to_lowercase().contains(&partial))
        .take(25)
}

async fn apply_change(
    ctx: Context<'_>,
    guild_id: u64,
    change: &ColorChange,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let failed_remove =
        roles::remove_roles(ctx.http(), guild_id, user_id, &change.remove, "Color change").await;
    let failed_add = match change.add {
        Some(role_id) => roles::add_roles(ctx.http(), guild_id, user_id, &[role_id], "Color change").await,
        None => Vec::new(),
    };
    if !failed_add.is_empty() || !failed_remove.is_empty() {
        return Err("Could not update your color roles. Check the bot's role position.".into());
    }
    Ok(())
}

/// Switch to a color.
#[poise::command(slash_command, guild_only)]
pub async fn pick(
    ctx: Context<'_>,
    #[description = "Color"]
    #[autocomplete = "autocomplete_color"]
    name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let chosen = ctx
        .data()
        .colors
        .list(guild_id)
        .await?
        .into_iter()
        .find(|r| r.label.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| format!("No color called '{}'. See `/color list`.", name.trim()))?;

    let held = roles::member_role_ids(ctx.http(), guild_id, ctx.author().id.get()).await?;
    let change = ctx
        .data()
        .colors
        .plan_change(guild_id, &held, Some(chosen.role_id))
        .await?;
    if change.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("You're already wearing {}.", chosen.label))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    apply_change(ctx, guild_id, &change).await?;
    ctx.send(
        poise::CreateReply::default()
            .content(format!("🎨 You're now <@&{}>.", chosen.role_id))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Drop your color.
#[poise::command(slash_command, guild_only)]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let held = roles::member_role_ids(ctx.http(), guild_id, ctx.author().id.get()).await?;
    let change = ctx.data().colors.plan_change(guild_id, &held, None).await?;
    apply_change(ctx, guild_id, &change).await?;
    ctx.send(
        poise::CreateReply::default()
            .content("🎨 Color cleared.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Available colors.
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let roles = ctx.data().colors.list(guild_id).await?;

    let description = if roles.is_empty() {
        "No colors yet. Admins can add some with `/color add`.".to_string()
    } else {
        roles
            .iter()
            .map(|r| format!("<@&{}> · {}", r.role_id, r.label))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let embed = serenity::CreateEmbed::new()
        .title("🎨 Colors")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Offer a role as a color.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Role"] role: serenity::Role,
    #[description = "Name shown to members"] label: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let added = ctx
        .data()
        .colors
        .add_role(guild_id, role.id.get(), &label)
        .await?;
    ctx.say(format!("🎨 Added <@&{}> as **{}**.", added.role_id, added.label))
        .await?;
    Ok(())
}

/// Stop offering a role as a color.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Role"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let removed = ctx.data().colors.remove_role(guild_id, role.id.get()).await?;
    ctx.say(format!("Removed **{}** from the colors.", removed.label))
        .await?;
    Ok(())
}
