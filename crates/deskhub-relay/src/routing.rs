//! Automatic ticket assignment strategies.
//!
//! Pure selection logic over a team's member list; the intake service
//! supplies the inputs and persists the outcome. Bot agents and
//! soft-deleted users are never assignable.

use deskhub_core::types::id::UserId;
use deskhub_entity::user::User;

/// Pick the member with the fewest open assigned tickets.
///
/// Only members that already hold at least one open ticket are
/// candidates; ties break toward the lower agent id so repeated runs
/// over the same inputs agree. Returns `None` when no member qualifies,
/// leaving the ticket unassigned.
pub fn pick_load_balanced(members: &[User], open_counts: &[(UserId, i64)]) -> Option<UserId> {
    members
        .iter()
        .filter(|m| m.is_routable_agent())
        .filter_map(|m| {
            let id = UserId::from_uuid(m.id);
            open_counts
                .iter()
                .find(|(agent, _)| *agent == id)
                .map(|(_, count)| (*count, id))
        })
        .min_by_key(|(count, id)| (*count, *id.as_uuid()))
        .map(|(_, id)| id)
}

/// Pick the member one position past the previously assigned agent.
///
/// Members are ordered by id and the cursor wraps. When the previous
/// agent has left the team (or nothing was ever assigned), assignment
/// restarts at the first member. Returns `None` for a team with no
/// assignable members.
pub fn pick_round_robin(members: &[User], last_assigned: Option<UserId>) -> Option<UserId> {
    let mut eligible: Vec<UserId> = members
        .iter()
        .filter(|m| m.is_routable_agent())
        .map(|m| UserId::from_uuid(m.id))
        .collect();
    if eligible.is_empty() {
        return None;
    }
    eligible.sort_by_key(|id| *id.as_uuid());

    let next = match last_assigned.and_then(|last| eligible.iter().position(|id| *id == last)) {
        Some(pos) => (pos + 1) % eligible.len(),
        None => 0,
    };
    Some(eligible[next])
}
