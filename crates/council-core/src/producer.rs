//! The producer seam
//!
//! A [`Producer`] is one analyst worker. The coordination engine only needs
//! two async operations from it: an initial proposal and a revision given
//! peer positions. How the producer reaches its answer is its own business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Action, Proposal, ProducerError, Request, Role};

/// Loosely-typed output of a producer call
///
/// `payload` is whatever key/value structure the producer returned. It is
/// normalized into a [`Proposal`] by the engine's validator.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    /// Structured payload (expected to be a JSON object)
    pub payload: serde_json::Value,
    /// Original text the payload was decoded from, if any
    pub text: Option<String>,
}

impl RawOutput {
    /// Wrap an already-structured payload
    pub fn structured(payload: serde_json::Value) -> Self {
        Self {
            payload,
            text: None,
        }
    }

    /// Attach the text the payload came from
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Input to [`Producer::propose`]
#[derive(Debug, Clone)]
pub struct ProposalTask {
    pub request: Request,
    pub role: Role,
    /// Optional task-specific guidance (from a planner)
    pub hint: Option<String>,
}

/// A peer's full position as shown to a debate participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    pub role: Role,
    pub action: Action,
    pub conviction: f64,
    pub thesis: String,
    pub evidence: Vec<String>,
    pub neutral: bool,
}

impl From<&Proposal> for PeerPosition {
    fn from(proposal: &Proposal) -> Self {
        Self {
            role: proposal.role(),
            action: proposal.action(),
            conviction: proposal.conviction(),
            thesis: proposal.thesis().to_string(),
            evidence: proposal.evidence().to_vec(),
            neutral: proposal.is_neutral(),
        }
    }
}

/// Input to [`Producer::revise`]
#[derive(Debug, Clone)]
pub struct RevisionTask {
    pub request: Request,
    pub role: Role,
    /// 1-based debate round
    pub round: u32,
    /// The producer's own position from the previous round
    pub prior: Proposal,
    /// Every other participant's position from the previous round
    pub peers: Vec<PeerPosition>,
}

impl RevisionTask {
    /// Peers taking the opposite side of a directional position
    pub fn opposing(&self) -> impl Iterator<Item = &PeerPosition> {
        let own = self.prior.action();
        self.peers
            .iter()
            .filter(move |p| is_opposed(own, p))
    }

    /// Every peer that does not oppose the producer
    pub fn supporting(&self) -> impl Iterator<Item = &PeerPosition> {
        let own = self.prior.action();
        self.peers
            .iter()
            .filter(move |p| !is_opposed(own, p))
    }
}

fn is_opposed(own: Action, peer: &PeerPosition) -> bool {
    !peer.neutral && own.is_directional() && peer.action.is_directional() && peer.action != own
}

/// An analyst worker that produces and revises proposals
///
/// Both operations must be safe to retry.
#[async_trait]
pub trait Producer: Send + Sync {
    /// The role this producer fills
    fn role(&self) -> Role;

    /// Produce an initial opinion about the request
    async fn propose(&self, task: &ProposalTask) -> Result<RawOutput, ProducerError>;

    /// Revise a prior opinion in light of peer positions
    async fn revise(&self, task: &RevisionTask) -> Result<RawOutput, ProducerError>;
}
