// /vacation - leave requests that suspend admin roles until the end date.
//
// Requests are posted to the approvals channel with Approve/Reject buttons
// (see interactions::ComponentAction). Approval strips the member's admin
// roles; the sweeper gives them back when the vacation ends.

use chrono::Utc;

use crate::core::notifications::NotificationKind;
use crate::core::vacation::{Vacation, VacationStatus};
use crate::discord::audit::{self, COLOR_BAD, COLOR_INFO, COLOR_OK, COLOR_WARN};
use crate::discord::data::{require_guild, ApplicationContext};
use crate::discord::interactions::{
    can_manage_roles, decision_row, reply_ephemeral, resolve_message, ComponentAction,
};
use crate::discord::roles::{self, mention_roles};
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;
use poise::Modal;

#[derive(Debug, poise::Modal)]
#[name = "Vacation request"]
struct VacationModal {
    #[name = "Reason"]
    #[placeholder = "Where are you off to?"]
    #[paragraph]
    #[max_length = 500]
    reason: String,
    #[name = "Days"]
    #[placeholder = "e.g. 7"]
    #[max_length = 3]
    days: String,
}

#[derive(Debug, poise::Modal)]
#[name = "Reject vacation"]
struct RejectModal {
    #[name = "Note for the member (optional)"]
    #[paragraph]
    #[max_length = 300]
    note: Option<String>,
}

/// Request and manage vacations.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("request", "cancel", "end", "status", "list"),
    subcommand_required
)]
pub async fn vacation(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn vacation_embed(v: &Vacation, color: u32) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🌴 Vacation #{} · {}", v.id, v.status.label()))
        .color(color)
        .field("Member", format!("<@{}>", v.user_id), true)
        .field("Days", v.days.to_string(), true)
        .field("Reason", &v.reason, false);

    if let (Some(start), Some(end)) = (v.starts_at, v.ends_at) {
        embed = embed.field(
            "Period",
            format!("<t:{}:d> → <t:{}:d>", start.timestamp(), end.timestamp()),
            false,
        );
    }
    if let Some(by) = v.decided_by {
        embed = embed.field("Decided by", format!("<@{}>", by), true);
    }
    if let Some(note) = &v.decision_note {
        embed = embed.field("Note", note, false);
    }
    if !v.held_role_ids.is_empty() {
        embed = embed.field("Suspended roles", mention_roles(&v.held_role_ids), false);
    }
    embed
}

/// Ask for time off.
#[poise::command(slash_command, guild_only)]
pub async fn request(app_ctx: ApplicationContext<'_>) -> Result<(), Error> {
    let ctx: Context<'_> = app_ctx.into();
    let guild_id = require_guild(ctx)?;
    let data = ctx.data();
    let settings = data.settings.get(guild_id).await?;
    let approvals = settings
        .approvals_target()
        .ok_or("This server has no approvals channel. Ask an admin to run `/settings approvals_channel`.")?;

    let Some(form) = VacationModal::execute(app_ctx).await? else {
        return Ok(());
    };

    let days: u32 = form
        .days
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of days", form.days.trim()))?;

    let created = data
        .vacations
        .request(
            guild_id,
            ctx.author().id.get(),
            &form.reason,
            days,
            settings.max_vacation_days,
            Utc::now(),
        )
        .await?;

    serenity::ChannelId::new(approvals)
        .send_message(
            ctx.http(),
            serenity::CreateMessage::new()
                .embed(vacation_embed(&created, COLOR_WARN))
                .components(vec![decision_row(
                    ComponentAction::VacationApprove(created.id),
                    ComponentAction::VacationReject(created.id),
                )]),
        )
        .await?;

    tracing::info!(guild_id, user_id = created.user_id, vacation_id = created.id, days, "Vacation requested");
    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "📨 Vacation #{} ({} day(s)) sent for approval.",
                created.id, created.days
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Withdraw a pending request.
#[poise::command(slash_command, guild_only)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let cancelled = ctx
        .data()
        .vacations
        .cancel(guild_id, ctx.author().id.get())
        .await?;
    ctx.send(
        poise::CreateReply::default()
            .content(format!("Vacation #{} cancelled.", cancelled.id))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Come back early from an active vacation.
#[poise::command(slash_command, guild_only)]
pub async fn end(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let ended = ctx
        .data()
        .vacations
        .end_early(guild_id, ctx.author().id.get(), Utc::now())
        .await?;
    return_roles(ctx.http(), ctx.data(), &ended, "Vacation ended early").await;
    ctx.say(format!("👋 Welcome back, <@{}>!", ended.user_id))
        .await?;
    Ok(())
}

/// Show a member's current vacation and recent history.
#[poise::command(slash_command, guild_only)]
pub async fn status(
    ctx: Context<'_>,
    #[description = "Member to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let user_id = user.as_ref().unwrap_or_else(|| ctx.author()).id.get();
    let history = ctx.data().vacations.history(guild_id, user_id).await?;

    let Some(latest) = history.first() else {
        ctx.say(format!("<@{}> has no vacations on record.", user_id))
            .await?;
        return Ok(());
    };

    let earlier = history
        .iter()
        .skip(1)
        .take(5)
        .map(|v| format!("#{} · {} day(s) · {}", v.id, v.days, v.status.label()))
        .collect::<Vec<_>>();
    let mut embed = vacation_embed(latest, COLOR_INFO);
    if !earlier.is_empty() {
        embed = embed.field("Earlier", earlier.join("\n"), false);
    }
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Pending and active vacations in this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let open = ctx.data().vacations.list_open(guild_id).await?;

    let description = if open.is_empty() {
        "No open vacations.".to_string()
    } else {
        open.iter()
            .map(|v| {
                let when = match (v.status, v.ends_at) {
                    (VacationStatus::Active, Some(end)) => format!("back <t:{}:R>", end.timestamp()),
                    _ => format!("{} day(s), awaiting approval", v.days),
                };
                format!("#{} <@{}> · {} · {}", v.id, v.user_id, v.status.label(), when)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("🌴 Open vacations")
        .description(description)
        .color(COLOR_INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Restore suspended roles and tell the member. Shared with the sweeper.
pub async fn return_roles(http: &serenity::Http, data: &Data, v: &Vacation, reason: &str) {
    let failed = roles::add_roles(http, v.guild_id, v.user_id, &v.held_role_ids, reason).await;
    if !failed.is_empty() {
        tracing::warn!(
            guild_id = v.guild_id,
            user_id = v.user_id,
            failed = ?failed,
            "Some roles could not be restored after vacation"
        );
    }

    audit::notify(
        http,
        data,
        v.user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().content(format!(
            "👋 Your vacation has ended. Restored roles: {}",
            mention_roles(&v.held_role_ids)
        )),
    )
    .await;
    audit::post_log(http, data, v.guild_id, vacation_embed(v, COLOR_OK).description(reason)).await;
}

// ============================================================================
// APPROVAL BUTTONS
// ============================================================================

pub async fn approve_from_button(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
    id: u64,
) -> Result<(), Error> {
    if !can_manage_roles(component) {
        return reply_ephemeral(ctx, component, "You need Manage Roles to decide vacations.").await;
    }
    let Some(pending) = data.vacations.get(id).await? else {
        return reply_ephemeral(ctx, component, format!("Vacation #{} no longer exists.", id)).await;
    };

    let settings = data.settings_or_default(pending.guild_id).await;
    let held = match roles::member_role_ids(&ctx.http, pending.guild_id, pending.user_id).await {
        Ok(roles) => roles,
        Err(e) => {
            tracing::warn!(vacation_id = id, error = %e, "Could not load member for vacation");
            return reply_ephemeral(ctx, component, "That member is no longer in the server.").await;
        }
    };
    let suspended: Vec<u64> = held
        .into_iter()
        .filter(|r| settings.is_admin_role(*r))
        .collect();

    let approved = match data
        .vacations
        .approve(id, component.user.id.get(), suspended, Utc::now())
        .await
    {
        Ok(v) => v,
        Err(e) => return reply_ephemeral(ctx, component, format!("❌ {}", e)).await,
    };

    roles::remove_roles(
        &ctx.http,
        approved.guild_id,
        approved.user_id,
        &approved.held_role_ids,
        &format!("Vacation #{} approved", approved.id),
    )
    .await;

    resolve_message(ctx, component, vacation_embed(&approved, COLOR_OK)).await?;

    audit::notify(
        &ctx.http,
        data,
        approved.user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().embed(vacation_embed(&approved, COLOR_OK)),
    )
    .await;
    audit::post_log(&ctx.http, data, approved.guild_id, vacation_embed(&approved, COLOR_OK)).await;
    tracing::info!(
        vacation_id = approved.id,
        guild_id = approved.guild_id,
        user_id = approved.user_id,
        approver_id = component.user.id.get(),
        "Vacation approved"
    );
    Ok(())
}

pub async fn reject_from_button(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
    id: u64,
) -> Result<(), Error> {
    if !can_manage_roles(component) {
        return reply_ephemeral(ctx, component, "You need Manage Roles to decide vacations.").await;
    }
    if data.vacations.get(id).await?.is_none() {
        return reply_ephemeral(ctx, component, format!("Vacation #{} no longer exists.", id)).await;
    }

    // The submit comes back through the router as VacationRejectNote
    component
        .create_response(
            &ctx.http,
            RejectModal::create(None, ComponentAction::VacationRejectNote(id).custom_id()),
        )
        .await?;
    Ok(())
}

pub async fn reject_with_note(
    ctx: &serenity::Context,
    data: &Data,
    modal: &serenity::ModalInteraction,
    id: u64,
) -> Result<(), Error> {
    let allowed = modal
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.manage_roles())
        .unwrap_or(false);
    if !allowed {
        return Ok(());
    }
    let form = RejectModal::parse(modal.data.clone())?;
    let approver_id = modal.user.id.get();

    let rejected = match data.vacations.reject(id, approver_id, form.note).await {
        Ok(v) => v,
        Err(e) => {
            modal
                .create_response(
                    &ctx.http,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content(format!("❌ {}", e))
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
    };

    // A modal opened from a button may update the button's message
    modal
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .embed(vacation_embed(&rejected, COLOR_BAD))
                    .components(vec![]),
            ),
        )
        .await?;

    audit::notify(
        &ctx.http,
        data,
        rejected.user_id,
        NotificationKind::StatusDms,
        serenity::CreateMessage::new().embed(vacation_embed(&rejected, COLOR_BAD)),
    )
    .await;
    audit::post_log(&ctx.http, data, rejected.guild_id, vacation_embed(&rejected, COLOR_BAD)).await;
    tracing::info!(vacation_id = id, approver_id, "Vacation rejected");
    Ok(())
}
