//! Decision synthesizer
//!
//! Weighted aggregation of the final proposals into one [`Decision`]. This
//! is a pure function of the configuration, the request and the proposals:
//! the same inputs always produce an identical decision, including its
//! timestamp, which is taken from the request.

use council_core::{Action, Decision, DecisionParts, ProposalSet, Request, RoleMap};
use tracing::debug;

use crate::config::CouncilConfig;
use crate::conflict;
use crate::debate::DebateOutcome;

/// Rationale used when every producer abstained
pub const NO_ACTIONABLE_EVIDENCE: &str = "no actionable evidence";

/// Proposals gathered during a run, before synthesis
#[derive(Debug, Clone)]
pub struct Deliberation {
    /// Fan-out result
    pub initial: ProposalSet,
    /// Present iff the initial proposals conflicted
    pub debate: Option<DebateOutcome>,
}

impl Deliberation {
    /// Proposals without a debate
    pub fn undisputed(initial: ProposalSet) -> Self {
        Self {
            initial,
            debate: None,
        }
    }

    /// The proposals the decision is built from
    pub fn final_proposals(&self) -> &ProposalSet {
        self.debate
            .as_ref()
            .map_or(&self.initial, |debate| &debate.proposals)
    }

    /// Every proposal set in chronological order
    fn stages(&self) -> impl Iterator<Item = &ProposalSet> {
        let rounds = self
            .debate
            .iter()
            .flat_map(|debate| debate.rounds.iter().map(|r| &r.proposals));
        std::iter::once(&self.initial).chain(rounds)
    }
}

/// Weighted score per action
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scores {
    pub buy: f64,
    pub sell: f64,
    pub hold: f64,
    /// Total weight of non-neutral producers
    pub active_weight: f64,
}

impl Scores {
    /// Score an action
    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Buy => self.buy,
            Action::Sell => self.sell,
            Action::Hold => self.hold,
        }
    }

    fn add(&mut self, action: Action, score: f64) {
        match action {
            Action::Buy => self.buy += score,
            Action::Sell => self.sell += score,
            Action::Hold => self.hold += score,
        }
    }

    /// Highest-scoring action; ties go to the earlier action in
    /// [`Action::PRIORITY`]. `None` when nothing scored.
    pub fn winner(&self) -> Option<(Action, f64)> {
        let mut best: Option<(Action, f64)> = None;
        for action in Action::PRIORITY {
            let score = self.get(action);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((action, score));
            }
        }
        best.filter(|(_, score)| *score > 0.0)
    }
}

/// Builds decisions from proposals and a weight table
#[derive(Debug, Clone, Copy)]
pub struct DecisionSynthesizer<'a> {
    config: &'a CouncilConfig,
}

impl<'a> DecisionSynthesizer<'a> {
    /// Create a synthesizer bound to a configuration
    pub fn new(config: &'a CouncilConfig) -> Self {
        Self { config }
    }

    /// Weighted scores of a proposal set
    pub fn score(&self, proposals: &ProposalSet) -> Scores {
        let mut scores = Scores::default();
        for (role, proposal) in proposals.iter().filter(|(_, p)| !p.is_neutral()) {
            let weight = self.config.weight(role);
            scores.add(proposal.action(), weight * proposal.conviction());
            scores.active_weight += weight;
        }
        scores
    }

    /// Synthesize the decision for a request
    pub fn synthesize(&self, request: &Request, deliberation: &Deliberation) -> Decision {
        let proposals = deliberation.final_proposals();
        let scores = self.score(proposals);

        // No positive score (every producer neutral, or zero conviction).
        let (action, confidence, rationale) = match scores.winner() {
            Some((action, score)) if scores.active_weight > 0.0 => (
                action,
                (score / scores.active_weight).clamp(0.0, 1.0),
                rationale(proposals),
            ),
            _ => (Action::Hold, 0.0, NO_ACTIONABLE_EVIDENCE.to_string()),
        };

        let confidence = match self.config.conflict_confidence_cap {
            Some(cap) if conflict::detect(&deliberation.initial).is_some() => confidence.min(cap),
            _ => confidence,
        };

        debug!(
            "Scores BUY={:.3} SELL={:.3} HOLD={:.3} over weight {:.3}: {} at {:.3}",
            scores.buy, scores.sell, scores.hold, scores.active_weight, action, confidence
        );

        Decision::from_parts(DecisionParts {
            subject: request.subject().to_string(),
            horizon: request.horizon(),
            action,
            confidence,
            rationale,
            evidence: evidence(deliberation),
            proposals: proposals.clone(),
            debate: deliberation
                .debate
                .as_ref()
                .map(|debate| debate.transcript.clone()),
            generated_at: request.as_of(),
        })
    }
}

fn rationale(proposals: &ProposalSet) -> String {
    proposals
        .iter()
        .filter(|(_, p)| !p.is_neutral())
        .map(|(role, p)| match p.thesis_line() {
            "" => format!("{role}: {} ({:.2})", p.action(), p.conviction()),
            line => format!("{role}: {line}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Evidence for every role that was non-neutral at any stage
///
/// The final proposal's evidence wins when it is non-neutral; otherwise the
/// most recent non-neutral proposal supplies it.
fn evidence(deliberation: &Deliberation) -> RoleMap<Vec<String>> {
    let final_set = deliberation.final_proposals();
    final_set
        .roles()
        .filter_map(|role| {
            let source = deliberation
                .stages()
                .filter_map(|stage| stage.get(role))
                .filter(|p| !p.is_neutral())
                .last()?;
            let source = final_set
                .get(role)
                .filter(|p| !p.is_neutral())
                .unwrap_or(source);
            Some((role, source.evidence().to_vec()))
        })
        .collect::<RoleMap<_>>()
}
