//! Debate coordinator
//!
//! Conflicting producers are shown each other's full positions and asked to
//! revise. Rounds repeat until the conflict is gone or the round limit is
//! hit:
//!
//! ```text
//! Idle -> Round(1) -> ... -> Round(n) -> Converged | RoundLimitReached
//! ```
//!
//! Conflict is re-detected on the whole proposal set after every round, so
//! a producer that leaves neutrality mid-debate keeps the debate going.

use council_core::{
    DebateTranscript, PeerPosition, PositionChange, Producer, ProposalSet, Request,
    RevisionTask, Role,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CouncilConfig, ParticipantPolicy};
use crate::conflict::{self, Conflict};
use crate::fanout::FanOutCoordinator;

/// Debate progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "round")]
pub enum DebateState {
    /// Not started
    Idle,
    /// Running the given 1-based round
    Round(u32),
    /// The last round left no conflict
    Converged,
    /// The round limit was reached with the conflict still open
    RoundLimitReached,
}

impl DebateState {
    /// Move to the next state
    ///
    /// `conflict_remains` is the conflict check on the proposals produced by
    /// the round that just ended; it is ignored when leaving `Idle`.
    pub fn advance(self, conflict_remains: bool, max_rounds: u32) -> Self {
        match self {
            Self::Idle if max_rounds == 0 => Self::RoundLimitReached,
            Self::Idle => Self::Round(1),
            Self::Round(_) if !conflict_remains => Self::Converged,
            Self::Round(n) if n >= max_rounds => Self::RoundLimitReached,
            Self::Round(n) => Self::Round(n + 1),
            terminal => terminal,
        }
    }

    /// Whether no further rounds will run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::RoundLimitReached)
    }
}

/// One completed debate round
#[derive(Debug, Clone, Serialize)]
pub struct DebateRound {
    pub round: u32,
    /// Roles asked to revise, in declaration order
    pub participants: Vec<Role>,
    /// Full proposal set after the round
    pub proposals: ProposalSet,
    pub changes: Vec<PositionChange>,
    /// Conflict remaining after the round
    pub conflict: Option<Conflict>,
}

/// Result of a debate
#[derive(Debug, Clone)]
pub struct DebateOutcome {
    /// Proposals after the last round
    pub proposals: ProposalSet,
    pub transcript: DebateTranscript,
    pub rounds: Vec<DebateRound>,
    /// Terminal state
    pub state: DebateState,
}

impl DebateOutcome {
    /// True iff the final proposals no longer conflict
    pub fn converged(&self) -> bool {
        self.state == DebateState::Converged
    }
}

/// Runs bounded debate rounds between conflicting producers
#[derive(Debug, Clone, Copy)]
pub struct DebateCoordinator<'a> {
    config: &'a CouncilConfig,
    fanout: FanOutCoordinator<'a>,
}

impl<'a> DebateCoordinator<'a> {
    /// Create a coordinator bound to a configuration
    pub fn new(config: &'a CouncilConfig) -> Self {
        Self {
            config,
            fanout: FanOutCoordinator::new(config),
        }
    }

    /// Debate until convergence or the round limit
    ///
    /// `initial` is the proposal set that raised `conflict`. Producers are
    /// looked up by role; roles without a producer keep their proposal.
    pub async fn run(
        &self,
        request: &Request,
        producers: &[(Role, Arc<dyn Producer>)],
        initial: ProposalSet,
        conflict: Conflict,
    ) -> DebateOutcome {
        let max_rounds = self.config.max_debate_rounds;
        let threshold = self.config.material_change_threshold;

        let mut state = DebateState::Idle.advance(true, max_rounds);
        let mut current = initial;
        let mut conflict = conflict;
        let mut rounds = Vec::new();
        let mut position_changes = Vec::new();

        info!("Debate opened: {conflict}");

        while let DebateState::Round(round) = state {
            let participants = self.participants(&current, &conflict, producers);
            info!("Debate round {round}/{max_rounds} with {} participants", participants.len());

            let tasks = participants
                .iter()
                .filter_map(|role| {
                    let producer = lookup(producers, *role)?;
                    let prior = current.get(*role)?.clone();
                    let peers = participants
                        .iter()
                        .filter(|other| *other != role)
                        .filter_map(|other| current.get(*other))
                        .map(PeerPosition::from)
                        .collect();
                    Some((
                        producer,
                        RevisionTask {
                            request: request.clone(),
                            role: *role,
                            round,
                            prior,
                            peers,
                        },
                    ))
                })
                .collect();

            let mut next = current.clone();
            for (role, result) in self.fanout.revise_all(tasks).await {
                match result {
                    Ok(revised) => {
                        next.insert(role, revised);
                    }
                    Err(e) => warn!("{role} could not revise in round {round}, keeping prior position: {e}"),
                }
            }

            let changes: Vec<PositionChange> = participants
                .iter()
                .filter_map(|role| {
                    PositionChange::between(current.get(*role)?, next.get(*role)?, threshold)
                })
                .collect();
            for change in &changes {
                debug!("Position change: {change} ({})", change.kind);
            }

            let remaining = conflict::detect(&next);
            state = state.advance(remaining.is_some(), max_rounds);

            position_changes.extend(changes.iter().cloned());
            rounds.push(DebateRound {
                round,
                participants,
                proposals: next.clone(),
                changes,
                conflict: remaining.clone(),
            });

            current = next;
            if let Some(remaining) = remaining {
                conflict = remaining;
            }
        }

        let converged = state == DebateState::Converged;
        let transcript = DebateTranscript::new(position_changes, round_count(&rounds), converged);
        info!(
            "Debate finished after {} round(s): {:?}",
            transcript.rounds, state
        );

        DebateOutcome {
            proposals: current,
            transcript,
            rounds,
            state,
        }
    }

    fn participants(
        &self,
        proposals: &ProposalSet,
        conflict: &Conflict,
        producers: &[(Role, Arc<dyn Producer>)],
    ) -> Vec<Role> {
        proposals
            .roles()
            .filter(|role| match self.config.participant_policy {
                ParticipantPolicy::OpposingCamps => conflict.involves(*role),
                ParticipantPolicy::All => true,
            })
            .filter(|role| lookup(producers, *role).is_some())
            .collect()
    }
}

fn lookup(producers: &[(Role, Arc<dyn Producer>)], role: Role) -> Option<Arc<dyn Producer>> {
    producers
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, producer)| producer.clone())
}

fn round_count(rounds: &[DebateRound]) -> u32 {
    rounds.last().map_or(0, |r| r.round)
}
