//! Roll-call by role: who is confirmed for the next event, and who has
//! not answered at all.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::HubResult;
use crate::member::{Member, RolePatternCache};
use crate::participation::{Participation, Participations};

#[derive(Debug, Clone, Serialize)]
pub struct FinalCallReport {
    /// Role pattern -> confirmed answers of members whose role title matches.
    pub by_role: BTreeMap<String, Vec<Participation>>,
    /// Active members without an answer, each listed once.
    pub unanswered: Vec<Member>,
}

/// Build the roll-call.
///
/// A member whose role title matches several patterns is counted under
/// every one of them. Only active members take part. Every pattern gets
/// a bucket, even if nobody matches it.
pub fn aggregate(
    participations: &Participations,
    members: &[Member],
    roles: &[String],
    patterns: &RolePatternCache,
) -> HubResult<FinalCallReport> {
    let mut compiled = patterns.get_all(roles)?;
    compiled.sort_by(|a, b| a.0.cmp(&b.0));
    compiled.dedup_by(|a, b| a.0 == b.0);

    let mut by_role: BTreeMap<String, Vec<Participation>> = roles
        .iter()
        .map(|r| (r.clone(), Vec::new()))
        .collect();
    let mut unanswered = Vec::new();

    for member in members.iter().filter(|m| m.is_expected_to_rsvp()) {
        let answer = participations.get(&member.id);

        if answer.is_none_or(|p| p.kind.is_unanswered()) {
            unanswered.push(member.clone());
        }

        let Some(answer) = answer.filter(|p| p.kind.join_anyhow()) else {
            continue;
        };
        for (role, exp) in &compiled {
            if exp.is_match(&member.role_title)
                && let Some(bucket) = by_role.get_mut(role)
            {
                bucket.push(answer.clone());
            }
        }
    }

    Ok(FinalCallReport {
        by_role,
        unanswered,
    })
}
