// Button interactions that outlive the command that created them.
//
// Approval and claim buttons are posted into channels and DMs and may be
// pressed hours later (or after a restart), so their state is encoded in
// the `custom_id` instead of being held by a collector.

use crate::discord::commands::{responsibility, streak, vacation};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    VacationApprove(u64),
    VacationReject(u64),
    /// Submit of the rejection-note modal opened by `VacationReject`.
    VacationRejectNote(u64),
    StreakApprove { guild_id: u64, user_id: u64 },
    StreakReject { guild_id: u64, user_id: u64 },
    ClaimCall(u64),
}

impl ComponentAction {
    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::VacationApprove(id) => format!("vacation:approve:{}", id),
            ComponentAction::VacationReject(id) => format!("vacation:reject:{}", id),
            ComponentAction::VacationRejectNote(id) => format!("vacation:reject_note:{}", id),
            ComponentAction::StreakApprove { guild_id, user_id } => {
                format!("streak:approve:{}:{}", guild_id, user_id)
            }
            ComponentAction::StreakReject { guild_id, user_id } => {
                format!("streak:reject:{}:{}", guild_id, user_id)
            }
            ComponentAction::ClaimCall(id) => format!("call:claim:{}", id),
        }
    }

    /// Ids that don't belong to us (collector buttons like "prev"/"next")
    /// parse to `None`.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let parts: Vec<&str> = custom_id.split(':').collect();
        let id = |raw: &str| raw.parse::<u64>().ok().filter(|id| *id != 0);

        match parts.as_slice() {
            ["vacation", "approve", raw] => id(raw).map(ComponentAction::VacationApprove),
            ["vacation", "reject", raw] => id(raw).map(ComponentAction::VacationReject),
            ["vacation", "reject_note", raw] => id(raw).map(ComponentAction::VacationRejectNote),
            ["streak", "approve", guild, user] => Some(ComponentAction::StreakApprove {
                guild_id: id(guild)?,
                user_id: id(user)?,
            }),
            ["streak", "reject", guild, user] => Some(ComponentAction::StreakReject {
                guild_id: id(guild)?,
                user_id: id(user)?,
            }),
            ["call", "claim", raw] => id(raw).map(ComponentAction::ClaimCall),
            _ => None,
        }
    }
}

pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let Some(action) = ComponentAction::parse(&component.data.custom_id) else {
        return Ok(());
    };

    tracing::debug!(
        user_id = component.user.id.get(),
        custom_id = %component.data.custom_id,
        "Handling component action"
    );

    match action {
        ComponentAction::VacationApprove(id) => {
            vacation::approve_from_button(ctx, data, component, id).await
        }
        ComponentAction::VacationReject(id) => {
            vacation::reject_from_button(ctx, data, component, id).await
        }
        // Only ever arrives as a modal submit
        ComponentAction::VacationRejectNote(_) => Ok(()),
        ComponentAction::StreakApprove { guild_id, user_id } => {
            streak::decide_restore(ctx, data, component, guild_id, user_id, true).await
        }
        ComponentAction::StreakReject { guild_id, user_id } => {
            streak::decide_restore(ctx, data, component, guild_id, user_id, false).await
        }
        ComponentAction::ClaimCall(id) => {
            responsibility::claim_from_button(ctx, data, component, id).await
        }
    }
}

pub async fn handle_modal(
    ctx: &serenity::Context,
    data: &Data,
    modal: &serenity::ModalInteraction,
) -> Result<(), Error> {
    match ComponentAction::parse(&modal.data.custom_id) {
        Some(ComponentAction::VacationRejectNote(id)) => {
            vacation::reject_with_note(ctx, data, modal, id).await
        }
        _ => Ok(()),
    }
}

/// Approve/Reject buttons for an approvals-channel message.
pub fn decision_row(approve: ComponentAction, reject: ComponentAction) -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(approve.custom_id())
            .label("Approve")
            .emoji('✅')
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new(reject.custom_id())
            .label("Reject")
            .emoji('❌')
            .style(serenity::ButtonStyle::Danger),
    ])
}

/// Whether the member pressing a guild button may decide approvals.
pub fn can_manage_roles(component: &serenity::ComponentInteraction) -> bool {
    component
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.manage_roles())
        .unwrap_or(false)
}

pub async fn reply_ephemeral(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    content: impl Into<String>,
) -> Result<(), Error> {
    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Replace the pressed message's embed and drop its buttons.
pub async fn resolve_message(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    embed: serenity::CreateEmbed,
) -> Result<(), Error> {
    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .components(vec![]),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_round_trip() {
        let actions = [
            ComponentAction::VacationApprove(12),
            ComponentAction::VacationReject(12),
            ComponentAction::VacationRejectNote(12),
            ComponentAction::StreakApprove {
                guild_id: 111,
                user_id: 222,
            },
            ComponentAction::StreakReject {
                guild_id: 111,
                user_id: 222,
            },
            ComponentAction::ClaimCall(7),
        ];
        for action in actions {
            assert_eq!(ComponentAction::parse(&action.custom_id()), Some(action));
        }
    }

    #[test]
    fn wire_format_is_stable() {
        assert_eq!(
            ComponentAction::VacationApprove(5).custom_id(),
            "vacation:approve:5"
        );
        assert_eq!(
            ComponentAction::StreakReject {
                guild_id: 1,
                user_id: 2
            }
            .custom_id(),
            "streak:reject:1:2"
        );
        assert_eq!(ComponentAction::ClaimCall(9).custom_id(), "call:claim:9");
    }

    #[test]
    fn foreign_and_malformed_ids_are_ignored() {
        for raw in [
            "prev",
            "next",
            "find_me",
            "vacation:approve",
            "vacation:approve:abc",
            "vacation:approve:0",
            "vacation:archive:3",
            "streak:approve:1",
            "streak:approve:1:2:3",
            "call:claim:-4",
            "",
        ] {
            assert_eq!(ComponentAction::parse(raw), None, "{raw}");
        }
    }
}
