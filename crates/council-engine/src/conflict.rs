//! Conflict detection
//!
//! A set of proposals is in conflict when its non-neutral producers
//! recommend at least two different directional actions. HOLD never takes
//! part in a conflict.

use council_core::{Action, ProposalSet, Role};
use serde::Serialize;
use std::fmt;

/// Opposing camps found in a proposal set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    camps: Vec<(Action, Vec<Role>)>,
}

impl Conflict {
    /// Camps in action priority order, each listing roles in declaration order
    pub fn camps(&self) -> &[(Action, Vec<Role>)] {
        &self.camps
    }

    /// Roles in the camp for an action
    pub fn camp(&self, action: Action) -> &[Role] {
        self.camps
            .iter()
            .find(|(a, _)| *a == action)
            .map_or(&[], |(_, roles)| roles.as_slice())
    }

    /// Whether a role belongs to any camp
    pub fn involves(&self, role: Role) -> bool {
        self.camps.iter().any(|(_, roles)| roles.contains(&role))
    }

    /// Every role in any camp, in declaration order of the source set
    pub fn participants<'a>(&'a self, proposals: &'a ProposalSet) -> impl Iterator<Item = Role> + 'a {
        proposals.roles().filter(|role| self.involves(*role))
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let camps: Vec<String> = self
            .camps
            .iter()
            .map(|(action, roles)| {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                format!("{action}: [{}]", names.join(", "))
            })
            .collect();
        f.write_str(&camps.join(" vs "))
    }
}

/// Detect a conflict in a proposal set
///
/// Returns `None` when fewer than two distinct directional actions are held
/// by non-neutral producers.
pub fn detect(proposals: &ProposalSet) -> Option<Conflict> {
    let camps: Vec<(Action, Vec<Role>)> = Action::PRIORITY
        .into_iter()
        .filter(Action::is_directional)
        .map(|action| {
            let roles = proposals
                .iter()
                .filter(|(_, p)| !p.is_neutral() && p.action() == action)
                .map(|(role, _)| role)
                .collect::<Vec<_>>();
            (action, roles)
        })
        .filter(|(_, roles)| !roles.is_empty())
        .collect();

    if camps.len() >= 2 {
        Some(Conflict { camps })
    } else {
        None
    }
}
