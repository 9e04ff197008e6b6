//! Producer proposals

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{FailureKind, Role, RoleMap};

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Open or add to a long position
    Buy,
    /// Reduce or exit a position
    Sell,
    /// Do nothing
    Hold,
}

impl Action {
    /// All actions in tie-break priority order (BUY > SELL > HOLD)
    pub const PRIORITY: [Action; 3] = [Action::Buy, Action::Sell, Action::Hold];

    /// Uppercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    /// Whether this action takes a side (BUY or SELL)
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an action string is not BUY, SELL or HOLD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action '{}'", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "HOLD" => Ok(Self::Hold),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// One producer's opinion about a request
///
/// Conviction is always within `[0, 1]`. A neutral proposal is an abstention:
/// it is excluded from conflict detection and from weighting.
///
/// Proposals are never edited in place. A debate round produces a new
/// proposal for each participant, and the difference is recorded as a
/// [`PositionChange`](crate::PositionChange).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    role: Role,
    action: Action,
    #[serde(deserialize_with = "deserialize_conviction")]
    conviction: f64,
    thesis: String,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    caveats: Vec<String>,
    #[serde(default)]
    neutral: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_response: Option<String>,
}

impl Proposal {
    /// Create a non-neutral proposal; conviction is clamped into `[0, 1]`
    pub fn new(role: Role, action: Action, conviction: f64, thesis: impl Into<String>) -> Self {
        Self {
            role,
            action,
            conviction: clamp_conviction(conviction),
            thesis: thesis.into(),
            evidence: Vec::new(),
            caveats: Vec::new(),
            neutral: false,
            raw_response: None,
        }
    }

    /// Create a neutral HOLD abstention with zero conviction
    pub fn abstain(role: Role, thesis: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self::new(role, Action::Hold, 0.0, thesis)
            .with_evidence(vec![evidence.into()])
            .with_caveats(vec![
                "Failure converted to neutral recommendation".to_string(),
            ])
            .into_neutral()
    }

    /// Abstention recording why a producer could not contribute
    pub fn failed(role: Role, kind: FailureKind, detail: impl fmt::Display) -> Self {
        Self::abstain(
            role,
            format!("Unable to produce proposal: {detail}"),
            format!("producer failure ({kind}): {detail}"),
        )
    }

    /// Replace the evidence list
    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Replace the caveat list
    pub fn with_caveats(mut self, caveats: Vec<String>) -> Self {
        self.caveats = caveats;
        self
    }

    /// Attach the producer's raw response for diagnostics
    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    /// Mark the proposal as an abstention
    pub fn into_neutral(mut self) -> Self {
        self.neutral = true;
        self
    }

    /// Producer identity
    pub fn role(&self) -> Role {
        self.role
    }

    /// Recommended action
    pub fn action(&self) -> Action {
        self.action
    }

    /// Self-reported confidence in `[0, 1]`
    pub fn conviction(&self) -> f64 {
        self.conviction
    }

    /// Free-text thesis
    pub fn thesis(&self) -> &str {
        &self.thesis
    }

    /// First non-empty line of the thesis
    pub fn thesis_line(&self) -> &str {
        self.thesis
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    /// Supporting evidence, in producer order
    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    /// Risk caveats, in producer order
    pub fn caveats(&self) -> &[String] {
        &self.caveats
    }

    /// Whether this proposal is an abstention
    pub fn is_neutral(&self) -> bool {
        self.neutral
    }

    /// Raw producer output, if retained
    pub fn raw_response(&self) -> Option<&str> {
        self.raw_response.as_deref()
    }
}

/// Final or intermediate proposals, one per role, in role declaration order
pub type ProposalSet = RoleMap<Proposal>;

fn deserialize_conviction<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(clamp_conviction)
}

fn clamp_conviction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
