// Role edits shared by down, vacation, promotion, responsibility and colors.
//
// Each helper applies as many changes as it can and reports the ids that
// failed, so callers can decide whether to roll back or just log.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Highest role positions of the command author and the member they act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranks {
    pub author_top: u16,
    pub target_top: u16,
    pub author_is_owner: bool,
    pub target_is_owner: bool,
}

impl Ranks {
    /// Staff may only act on members below them and only grant or remove
    /// roles below their own highest role. The server owner is exempt.
    pub fn check(&self, roles: &[(u64, u16)]) -> Result<(), String> {
        if self.author_is_owner {
            return Ok(());
        }
        if self.target_is_owner || self.target_top >= self.author_top {
            return Err("That member's highest role is at or above yours.".to_string());
        }
        if let Some((role_id, _)) = roles.iter().find(|(_, pos)| *pos >= self.author_top) {
            return Err(format!("<@&{}> is at or above your highest role.", role_id));
        }
        Ok(())
    }
}

/// Refuse unless the author outranks `target` and every role in `role_ids`.
pub async fn ensure_outranks(
    ctx: Context<'_>,
    target: &serenity::Member,
    role_ids: &[u64],
) -> Result<(), Error> {
    let author = ctx
        .author_member()
        .await
        .ok_or("Could not load your server membership")?
        .into_owned();

    let (ranks, roles) = {
        let guild = ctx
            .guild()
            .ok_or("This server isn't cached yet, try again in a moment")?;
        let position = |id: serenity::RoleId| guild.roles.get(&id).map(|r| r.position).unwrap_or(0);
        let top = |member: &serenity::Member| {
            member.roles.iter().map(|r| position(*r)).max().unwrap_or(0)
        };

        let ranks = Ranks {
            author_top: top(&author),
            target_top: top(target),
            author_is_owner: guild.owner_id == author.user.id,
            target_is_owner: guild.owner_id == target.user.id,
        };
        let roles: Vec<(u64, u16)> = role_ids
            .iter()
            .map(|&id| (id, position(serenity::RoleId::new(id))))
            .collect();
        (ranks, roles)
    };

    ranks.check(&roles).map_err(|reason| {
        tracing::info!(
            author_id = author.user.id.get(),
            target_id = target.user.id.get(),
            "Refused role change above the author's rank"
        );
        reason.into()
    })
}

/// Role ids the member currently holds, fetched over HTTP so the result is
/// fresh even when the member isn't cached.
pub async fn member_role_ids(
    http: &serenity::Http,
    guild_id: u64,
    user_id: u64,
) -> Result<Vec<u64>, serenity::Error> {
    let member = http
        .get_member(serenity::GuildId::new(guild_id), serenity::UserId::new(user_id))
        .await?;
    Ok(member.roles.iter().map(|r| r.get()).collect())
}

pub async fn add_roles(
    http: &serenity::Http,
    guild_id: u64,
    user_id: u64,
    role_ids: &[u64],
    reason: &str,
) -> Vec<u64> {
    let mut failed = Vec::new();
    for &role_id in role_ids {
        if let Err(e) = http
            .add_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some(reason),
            )
            .await
        {
            tracing::warn!(guild_id, user_id, role_id, error = %e, "Failed to add role");
            failed.push(role_id);
        }
    }
    failed
}

pub async fn remove_roles(
    http: &serenity::Http,
    guild_id: u64,
    user_id: u64,
    role_ids: &[u64],
    reason: &str,
) -> Vec<u64> {
    let mut failed = Vec::new();
    for &role_id in role_ids {
        if let Err(e) = http
            .remove_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some(reason),
            )
            .await
        {
            tracing::warn!(guild_id, user_id, role_id, error = %e, "Failed to remove role");
            failed.push(role_id);
        }
    }
    failed
}

pub fn mention_roles(role_ids: &[u64]) -> String {
    if role_ids.is_empty() {
        return "none".to_string();
    }
    role_ids
        .iter()
        .map(|id| format!("<@&{}>", id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranks(author_top: u16, target_top: u16) -> Ranks {
        Ranks {
            author_top,
            target_top,
            author_is_owner: false,
            target_is_owner: false,
        }
    }

    #[test]
    fn staff_cannot_act_on_equal_or_higher_members() {
        assert!(ranks(5, 5).check(&[]).is_err());
        assert!(ranks(5, 9).check(&[]).is_err());
        assert!(ranks(5, 4).check(&[]).is_ok());

        let mut owner_target = ranks(5, 0);
        owner_target.target_is_owner = true;
        assert!(owner_target.check(&[]).is_err());
    }

    #[test]
    fn staff_cannot_grant_roles_at_or_above_their_own() {
        let r = ranks(5, 1);
        assert_eq!(
            r.check(&[(10, 2), (11, 5)]),
            Err("<@&11> is at or above your highest role.".to_string())
        );
        assert!(r.check(&[(12, 9)]).is_err());
        assert!(r.check(&[(10, 2), (13, 4)]).is_ok());
    }

    #[test]
    fn owner_is_exempt() {
        let mut r = ranks(0, 9);
        r.author_is_owner = true;
        assert!(r.check(&[(1, 50)]).is_ok());
    }

    #[test]
    fn mentions_roles_in_order() {
        assert_eq!(mention_roles(&[]), "none");
        assert_eq!(mention_roles(&[1, 22]), "<@&1>, <@&22>");
    }
}
