// Strips suspended roles that come back while a member is down or on
// vacation (someone re-added them by hand, or a role bot did).

use crate::discord::roles;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Roles in `current` that the member must not hold right now.
fn reappeared(current: &[u64], suspended: &[u64]) -> Vec<u64> {
    let mut found: Vec<u64> = current
        .iter()
        .copied()
        .filter(|r| suspended.contains(r))
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

pub async fn enforce(
    http: &serenity::Http,
    data: &Data,
    guild_id: u64,
    user_id: u64,
    current_roles: &[serenity::RoleId],
) -> Result<(), Error> {
    let mut suspended = data.downs.blocked_roles(guild_id, user_id).await?;
    suspended.extend(data.vacations.held_roles(guild_id, user_id).await?);
    if suspended.is_empty() {
        return Ok(());
    }

    let current: Vec<u64> = current_roles.iter().map(|r| r.get()).collect();
    let strip = reappeared(&current, &suspended);
    if strip.is_empty() {
        return Ok(());
    }

    tracing::info!(guild_id, user_id, roles = ?strip, "Removing re-added suspended roles");
    let failed = roles::remove_roles(http, guild_id, user_id, &strip, "Role is suspended").await;
    if !failed.is_empty() {
        tracing::warn!(guild_id, user_id, failed = ?failed, "Could not strip suspended roles");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_suspended_roles_are_stripped() {
        assert_eq!(reappeared(&[1, 2, 3], &[2, 9]), vec![2]);
        assert!(reappeared(&[1, 3], &[2, 9]).is_empty());
    }

    #[test]
    fn overlapping_down_and_vacation_roles_are_stripped_once() {
        assert_eq!(reappeared(&[5, 4], &[4, 5, 4]), vec![4, 5]);
    }
}
