//! The synthesized decision and its persisted signal form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Action, DebateTranscript, Horizon, ProposalSet, Result, RoleMap};

/// Everything needed to build a [`Decision`]
#[derive(Debug, Clone)]
pub struct DecisionParts {
    pub subject: String,
    pub horizon: Horizon,
    pub action: Action,
    pub confidence: f64,
    pub rationale: String,
    pub evidence: RoleMap<Vec<String>>,
    pub proposals: ProposalSet,
    pub debate: Option<DebateTranscript>,
    pub generated_at: DateTime<Utc>,
}

/// The single output of a decision run
///
/// Immutable once built: all fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    subject: String,
    horizon: Horizon,
    action: Action,
    confidence: f64,
    rationale: String,
    evidence: RoleMap<Vec<String>>,
    proposals: ProposalSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debate: Option<DebateTranscript>,
    generated_at: DateTime<Utc>,
}

impl Decision {
    /// Assemble a decision; confidence is clamped into `[0, 1]`
    pub fn from_parts(parts: DecisionParts) -> Self {
        let confidence = if parts.confidence.is_nan() {
            0.0
        } else {
            parts.confidence.clamp(0.0, 1.0)
        };

        Self {
            subject: parts.subject,
            horizon: parts.horizon,
            action: parts.action,
            confidence,
            rationale: parts.rationale,
            evidence: parts.evidence,
            proposals: parts.proposals,
            debate: parts.debate,
            generated_at: parts.generated_at,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Evidence grouped by the producers that contributed a non-neutral opinion
    pub fn evidence(&self) -> &RoleMap<Vec<String>> {
        &self.evidence
    }

    /// Final proposal of every producer
    pub fn proposals(&self) -> &ProposalSet {
        &self.proposals
    }

    /// Debate transcript, present only when a debate ran
    pub fn debate(&self) -> Option<&DebateTranscript> {
        self.debate.as_ref()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// The subset of the decision handed to signal emitters
    pub fn to_signal(&self) -> Signal {
        Signal {
            subject: self.subject.clone(),
            horizon: self.horizon,
            action: self.action,
            confidence: self.confidence,
            rationale: self.rationale.clone(),
            evidence: self.evidence.clone(),
            generated_at: self.generated_at,
        }
    }

    /// Full audit form of the decision, including proposals and transcript
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Wire form of a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub subject: String,
    pub horizon: Horizon,
    pub action: Action,
    pub confidence: f64,
    pub rationale: String,
    pub evidence: RoleMap<Vec<String>>,
    pub generated_at: DateTime<Utc>,
}
