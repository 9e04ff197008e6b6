//! Debate bookkeeping: position changes and transcripts

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{Action, Proposal, Role};

// Float noise in conviction deltas must not push a change over the threshold.
const DELTA_EPSILON: f64 = 1e-9;

/// What moved between two proposals from the same producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The action changed; conviction did not move materially
    #[serde(rename = "action-only")]
    ActionOnly,
    /// The conviction moved materially; the action is the same
    #[serde(rename = "conviction-only")]
    ConvictionOnly,
    /// Both the action and the conviction changed
    #[serde(rename = "both")]
    Both,
}

impl ChangeKind {
    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionOnly => "action-only",
            Self::ConvictionOnly => "conviction-only",
            Self::Both => "both",
        }
    }

    /// Whether the action changed
    pub fn changed_action(&self) -> bool {
        matches!(self, Self::ActionOnly | Self::Both)
    }

    /// Whether the conviction moved materially
    pub fn changed_conviction(&self) -> bool {
        matches!(self, Self::ConvictionOnly | Self::Both)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one producer's position moved across a debate round
///
/// Derived by diffing two proposals; never produced by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChange {
    /// Producer whose position moved
    pub role: Role,
    /// Which parts of the position moved
    pub kind: ChangeKind,
    /// Action before the round
    pub action_before: Action,
    /// Action after the round
    pub action_after: Action,
    /// Conviction before the round
    pub conviction_before: f64,
    /// Conviction after the round
    pub conviction_after: f64,
    /// Signed conviction delta (after - before)
    pub conviction_delta: f64,
}

impl PositionChange {
    /// Diff two proposals from the same producer
    ///
    /// A conviction move counts only when its magnitude exceeds `threshold`
    /// and the two convictions back comparable claims: the same action, or
    /// two directional actions. A move into or out of HOLD is an action change.
    ///
    /// Returns `None` when nothing moved.
    pub fn between(prior: &Proposal, revised: &Proposal, threshold: f64) -> Option<Self> {
        let delta = revised.conviction() - prior.conviction();
        let action_changed = prior.action() != revised.action();
        let comparable = !action_changed
            || (prior.action().is_directional() && revised.action().is_directional());
        let conviction_changed = comparable && delta.abs() > threshold + DELTA_EPSILON;

        let kind = match (action_changed, conviction_changed) {
            (true, true) => ChangeKind::Both,
            (true, false) => ChangeKind::ActionOnly,
            (false, true) => ChangeKind::ConvictionOnly,
            (false, false) => return None,
        };

        Some(Self {
            role: prior.role(),
            kind,
            action_before: prior.action(),
            action_after: revised.action(),
            conviction_before: prior.conviction(),
            conviction_after: revised.conviction(),
            conviction_delta: delta,
        })
    }
}

impl fmt::Display for PositionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {:.2}→{} {:.2}",
            self.role,
            self.action_before,
            self.conviction_before,
            self.action_after,
            self.conviction_after
        )
    }
}

/// Record of a debate across all of its rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTranscript {
    /// Human-readable list of every change, "producer: before→after"
    pub summary: String,
    /// Every position change, in round order then role order
    pub position_changes: Vec<PositionChange>,
    /// Distinct producers that changed action
    pub producers_changed_action: usize,
    /// Distinct producers whose conviction moved materially
    pub producers_changed_conviction: usize,
    /// Sum of absolute conviction deltas
    pub total_conviction_shift: f64,
    /// True iff the final proposals no longer conflict
    pub converged: bool,
    /// Number of rounds run
    pub rounds: u32,
}

impl DebateTranscript {
    /// Aggregate position changes from all rounds
    pub fn new(position_changes: Vec<PositionChange>, rounds: u32, converged: bool) -> Self {
        let changed_action: BTreeSet<Role> = position_changes
            .iter()
            .filter(|c| c.kind.changed_action())
            .map(|c| c.role)
            .collect();
        let changed_conviction: BTreeSet<Role> = position_changes
            .iter()
            .filter(|c| c.kind.changed_conviction())
            .map(|c| c.role)
            .collect();
        let total_conviction_shift = position_changes
            .iter()
            .map(|c| c.conviction_delta.abs())
            .sum();

        let summary = if position_changes.is_empty() {
            format!("No position changes after {rounds} debate round(s)")
        } else {
            position_changes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };

        Self {
            summary,
            producers_changed_action: changed_action.len(),
            producers_changed_conviction: changed_conviction.len(),
            total_conviction_shift,
            position_changes,
            converged,
            rounds,
        }
    }
}
