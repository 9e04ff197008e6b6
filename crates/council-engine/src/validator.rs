//! Proposal validator
//!
//! Turns a producer's loosely-typed payload into a well-formed [`Proposal`].
//! Validation is total: every input yields a proposal, and whenever a field
//! had to be guessed the proposal becomes a neutral HOLD with zero
//! conviction.

use council_core::{Action, Proposal, ProducerError, RawOutput, Role};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Conviction ceiling for proposals downgraded by the evidence policy
pub const UNSUPPORTED_CONVICTION_CAP: f64 = 0.3;

/// Normalizes raw producer output into proposals
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalValidator {
    require_evidence: bool,
}

impl ProposalValidator {
    /// Create a validator
    pub fn new(require_evidence: bool) -> Self {
        Self { require_evidence }
    }

    /// Reject output that is not a key/value payload at all
    ///
    /// Used by callers that want to retry instead of abstaining straight
    /// away. [`validate`](Self::validate) accepts the same input and
    /// downgrades it.
    pub fn check_shape(output: &RawOutput) -> Result<(), ProducerError> {
        match &output.payload {
            Value::Object(_) => Ok(()),
            other => Err(ProducerError::Malformed(format!(
                "expected a key/value object, got {}",
                describe(other)
            ))),
        }
    }

    /// Normalize a producer payload
    pub fn validate(&self, role: Role, output: &RawOutput) -> Proposal {
        let proposal = match &output.payload {
            Value::Object(fields) => self.from_fields(role, fields),
            other => {
                warn!("{role} returned {} instead of an object", describe(other));
                let detail = format!("expected a key/value object, got {}", describe(other));
                Proposal::abstain(
                    role,
                    format!("Unable to parse {} response", role.title()),
                    format!("parse failure: {detail}"),
                )
            }
        };

        match raw_text(output) {
            Some(text) => proposal.with_raw_response(text),
            None => proposal,
        }
    }

    fn from_fields(&self, role: Role, fields: &Map<String, Value>) -> Proposal {
        let mut guessed = Vec::new();

        let action = match fields.get("action") {
            Some(Value::String(s)) => s.parse::<Action>().unwrap_or_else(|e| {
                guessed.push(e.to_string());
                Action::Hold
            }),
            Some(other) => {
                guessed.push(format!("action must be a string, got {}", describe(other)));
                Action::Hold
            }
            None => {
                guessed.push("missing action".to_string());
                Action::Hold
            }
        };

        let conviction = match fields.get("conviction").map(conviction_value) {
            Some(Ok(value)) if (0.0..=1.0).contains(&value) => value,
            Some(Ok(value)) => {
                guessed.push(format!("conviction {value} outside [0, 1]"));
                0.0
            }
            Some(Err(detail)) => {
                guessed.push(detail);
                0.0
            }
            None => {
                guessed.push("missing conviction".to_string());
                0.0
            }
        };

        let thesis = match fields.get("thesis") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let evidence = string_list(fields.get("evidence"));
        let caveats = string_list(fields.get("caveats"));
        let declared_neutral = matches!(fields.get("neutral"), Some(Value::Bool(true)));

        let mut proposal = Proposal::new(role, action, conviction, thesis).with_caveats(caveats);

        if !guessed.is_empty() {
            debug!("{role} proposal normalized: {}", guessed.join("; "));
            let mut evidence = evidence;
            evidence.push(format!("parse failure: {}", guessed.join("; ")));
            return Proposal::new(role, Action::Hold, 0.0, proposal.thesis())
                .with_evidence(evidence)
                .with_caveats(proposal.caveats().to_vec())
                .into_neutral();
        }

        if self.require_evidence && evidence.is_empty() {
            debug!("{role} proposal has no evidence, downgrading to neutral");
            return Proposal::new(
                role,
                Action::Hold,
                conviction.min(UNSUPPORTED_CONVICTION_CAP),
                proposal.thesis(),
            )
            .with_caveats(proposal.caveats().to_vec())
            .into_neutral();
        }

        proposal = proposal.with_evidence(evidence);
        if declared_neutral {
            proposal = proposal.into_neutral();
        }
        proposal
    }
}

fn conviction_value(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(format!("unparsable conviction {value}")),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn raw_text(output: &RawOutput) -> Option<String> {
    match &output.text {
        Some(text) => Some(text.clone()),
        None if output.payload.is_object() => None,
        None => Some(output.payload.to_string()),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
