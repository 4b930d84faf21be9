// /responsibility and /call - named groups of members (and roles) that
// requests can be routed to.

use chrono::Utc;

use crate::core::notifications::NotificationKind;
use crate::core::responsibility::{Responsibility, ResponsibilityCall};
use crate::discord::audit::{self, COLOR_INFO, COLOR_OK};
use crate::discord::data::require_guild;
use crate::discord::interactions::{reply_ephemeral, ComponentAction};
use crate::discord::roles::{self, mention_roles};
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Manage responsibilities.
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "create",
        "delete",
        "add_member",
        "remove_member",
        "add_role",
        "remove_role",
        "list",
        "show"
    ),
    subcommand_required
)]
pub async fn responsibility(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn autocomplete_responsibility<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let names = match ctx.guild_id() {
        Some(guild_id) => ctx
            .data()
            .responsibilities
            .list(guild_id.get())
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };
    names
        .into_iter()
        .filter(move |name| name.to_lowercase().contains(&partial.to_lowercase()))
        .take(25)
}

/// Create a responsibility.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Name (1-50 characters)"] name: String,
    #[description = "What this group handles"] description: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let created = ctx
        .data()
        .responsibilities
        .create(guild_id, &name, description, Utc::now())
        .await?;
    tracing::info!(guild_id, name = %created.name, "Responsibility created");
    ctx.say(format!("✅ Created responsibility **{}**.", created.name))
        .await?;
    Ok(())
}

/// Delete a responsibility and take its roles from its members.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.defer().await?;

    let deleted = ctx.data().responsibilities.delete(guild_id, &name).await?;
    let reason = format!("Responsibility '{}' deleted", deleted.name);
    for member_id in &deleted.member_ids {
        roles::remove_roles(ctx.http(), guild_id, *member_id, &deleted.role_ids, &reason).await;
    }

    ctx.say(format!(
        "🗑️ Deleted **{}** ({} member(s) updated).",
        deleted.name,
        deleted.member_ids.len()
    ))
    .await?;
    Ok(())
}

/// Add a member to a responsibility.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add_member(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
    #[description = "Member to add"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user_id = member.user.id.get();
    let grant = ctx
        .data()
        .responsibilities
        .add_member(guild_id, &name, user_id)
        .await?;

    let failed = roles::add_roles(
        ctx.http(),
        guild_id,
        user_id,
        &grant,
        &format!("Joined responsibility '{}'", name.trim()),
    )
    .await;

    let mut reply = format!("✅ <@{}> added to **{}**.", user_id, name.trim());
    if !failed.is_empty() {
        reply.push_str(&format!(
            "\n⚠️ Could not grant: {}",
            mention_roles(&failed)
        ));
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Remove a member from a responsibility.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn remove_member(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
    #[description = "Member to remove"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let revoke = ctx
        .data()
        .responsibilities
        .remove_member(guild_id, &name, user.id.get())
        .await?;

    roles::remove_roles(
        ctx.http(),
        guild_id,
        user.id.get(),
        &revoke,
        &format!("Left responsibility '{}'", name.trim()),
    )
    .await;

    ctx.say(format!("✅ <@{}> removed from **{}**.", user.id, name.trim()))
        .await?;
    Ok(())
}

/// Attach a role that every member of the responsibility receives.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add_role(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
    #[description = "Role to attach"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.defer().await?;

    let members = ctx
        .data()
        .responsibilities
        .add_role(guild_id, &name, role.id.get())
        .await?;
    let reason = format!("Role attached to responsibility '{}'", name.trim());
    for member_id in &members {
        roles::add_roles(ctx.http(), guild_id, *member_id, &[role.id.get()], &reason).await;
    }

    ctx.say(format!(
        "✅ <@&{}> attached to **{}** and granted to {} member(s).",
        role.id,
        name.trim(),
        members.len()
    ))
    .await?;
    Ok(())
}

/// Detach a role from a responsibility.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn remove_role(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
    #[description = "Role to detach"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.defer().await?;

    let members = ctx
        .data()
        .responsibilities
        .remove_role(guild_id, &name, role.id.get())
        .await?;
    let reason = format!("Role detached from responsibility '{}'", name.trim());
    for member_id in &members {
        roles::remove_roles(ctx.http(), guild_id, *member_id, &[role.id.get()], &reason).await;
    }

    ctx.say(format!(
        "✅ <@&{}> detached from **{}**.",
        role.id,
        name.trim()
    ))
    .await?;
    Ok(())
}

/// List every responsibility in this server.
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let all = ctx.data().responsibilities.list(guild_id).await?;

    if all.is_empty() {
        ctx.say("No responsibilities yet. Create one with `/responsibility create`.")
            .await?;
        return Ok(());
    }

    let description = all
        .iter()
        .map(|r| {
            format!(
                "**{}** · {} member(s){}",
                r.name,
                r.member_ids.len(),
                r.description
                    .as_deref()
                    .map(|d| format!("\n{}", d))
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let embed = serenity::CreateEmbed::new()
        .title("📋 Responsibilities")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn responsibility_embed(r: &Responsibility) -> serenity::CreateEmbed {
    let members = if r.member_ids.is_empty() {
        "none".to_string()
    } else {
        r.member_ids
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    serenity::CreateEmbed::new()
        .title(format!("📋 {}", r.name))
        .description(r.description.clone().unwrap_or_default())
        .color(COLOR_INFO)
        .field("Members", members, false)
        .field("Roles", mention_roles(&r.role_ids), false)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Created {}",
            r.created_at.format("%Y-%m-%d")
        )))
}

/// Show one responsibility.
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Responsibility"]
    #[autocomplete = "autocomplete_responsibility"]
    name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let found = ctx.data().responsibilities.get(guild_id, &name).await?;
    ctx.send(poise::CreateReply::default().embed(responsibility_embed(&found)))
        .await?;
    Ok(())
}

// ============================================================================
// CALLS
// ============================================================================

fn call_embed(call: &ResponsibilityCall, guild_name: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(format!("📣 {} needed", call.responsibility))
        .description(&call.reason)
        .color(COLOR_INFO)
        .field("Requested by", format!("<@{}>", call.requester_id), true)
        .field("Server", guild_name, true)
        .footer(serenity::CreateEmbedFooter::new(format!("Call #{}", call.id)))
        .timestamp(serenity::Timestamp::now())
}

/// Ask the members of a responsibility for help.
#[poise::command(slash_command, guild_only)]
pub async fn call(
    ctx: Context<'_>,
    #[description = "Who you need"]
    #[autocomplete = "autocomplete_responsibility"]
    responsibility: String,
    #[description = "What you need help with"] reason: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let settings = ctx.data().settings.get(guild_id).await?;

    let call = ctx
        .data()
        .responsibilities
        .open_call(
            guild_id,
            &responsibility,
            ctx.author().id.get(),
            &reason,
            settings.call_cooldown_secs,
            Utc::now(),
        )
        .await?;

    ctx.defer_ephemeral().await?;

    let guild_name = ctx
        .guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| "this server".to_string());
    let claim = serenity::CreateActionRow::Buttons(vec![serenity::CreateButton::new(
        ComponentAction::ClaimCall(call.id).custom_id(),
    )
    .label("Claim")
    .emoji('🙋')
    .style(serenity::ButtonStyle::Success)]);

    let mut delivered = 0;
    for recipient in &call.recipients {
        let message = serenity::CreateMessage::new()
            .embed(call_embed(&call, &guild_name))
            .components(vec![claim.clone()]);
        if audit::notify(ctx.http(), ctx.data(), *recipient, NotificationKind::CallDms, message)
            .await
        {
            delivered += 1;
        }
    }

    tracing::info!(
        guild_id,
        call_id = call.id,
        responsibility = %call.responsibility,
        recipients = call.recipients.len(),
        delivered,
        "Responsibility call opened"
    );

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "📣 Call #{} sent to **{}**: {}/{} member(s) reached by DM.",
                call.id,
                call.responsibility,
                delivered,
                call.recipients.len()
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Claim button pressed in a call DM.
pub async fn claim_from_button(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
    call_id: u64,
) -> Result<(), Error> {
    let claimer_id = component.user.id.get();
    let call = match data.responsibilities.claim_call(call_id, claimer_id) {
        Ok(call) => call,
        Err(e) => return reply_ephemeral(ctx, component, format!("❌ {}", e)).await,
    };

    let settings = data.settings_or_default(call.guild_id).await;
    let mut awarded = 0;
    if settings.points_per_claim > 0 {
        match data
            .points
            .award(
                claimer_id,
                call.guild_id,
                settings.points_per_claim,
                &format!("Claimed call #{} ({})", call.id, call.responsibility),
                None,
            )
            .await
        {
            Ok(change) => awarded = change.applied,
            Err(e) => tracing::warn!(call_id, claimer_id, error = %e, "Failed to award claim points"),
        }
    }

    let embed = serenity::CreateEmbed::new()
        .title(format!("✅ Call #{} claimed", call.id))
        .description(&call.reason)
        .color(COLOR_OK)
        .field("Claimed by", format!("<@{}>", claimer_id), true)
        .field("Points", format!("+{}", awarded), true);
    crate::discord::interactions::resolve_message(ctx, component, embed).await?;

    audit::notify(
        &ctx.http,
        data,
        call.requester_id,
        NotificationKind::CallDms,
        serenity::CreateMessage::new().content(format!(
            "🙋 <@{}> claimed your **{}** call: {}",
            claimer_id, call.responsibility, call.reason
        )),
    )
    .await;

    audit::post_log(
        &ctx.http,
        data,
        call.guild_id,
        serenity::CreateEmbed::new()
            .title("Call claimed")
            .color(COLOR_OK)
            .description(format!(
                "<@{}> claimed call #{} (**{}**) from <@{}>",
                claimer_id, call.id, call.responsibility, call.requester_id
            )),
    )
    .await;

    tracing::info!(call_id, claimer_id, guild_id = call.guild_id, "Call claimed");
    Ok(())
}
