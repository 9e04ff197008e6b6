//! Decision requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Investment horizon of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    /// Days to a few weeks
    #[default]
    Short,
    /// Weeks to a few months
    Medium,
    /// Months and beyond
    Long,
}

impl Horizon {
    /// Lowercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(Error::InvalidRequest(format!(
                "unknown horizon '{other}' (expected short, medium or long)"
            ))),
        }
    }
}

/// A request for a decision about one subject
///
/// Requests are immutable once built; the pipeline only ever reads them.
///
/// # Example
///
/// ```
/// use council_core::{Horizon, Request};
///
/// let request = Request::new("AAPL", Horizon::Medium)
///     .unwrap()
///     .with_context("earnings next week");
///
/// assert_eq!(request.subject(), "AAPL");
/// assert_eq!(request.context(), Some("earnings next week"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    subject: String,
    horizon: Horizon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    as_of: DateTime<Utc>,
}

impl Request {
    /// Create a request stamped with the current time
    pub fn new(subject: impl Into<String>, horizon: Horizon) -> Result<Self> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(Error::InvalidRequest("subject must not be empty".to_string()));
        }

        Ok(Self {
            subject,
            horizon,
            context: None,
            as_of: Utc::now(),
        })
    }

    /// Attach free-text context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = (!context.trim().is_empty()).then_some(context);
        self
    }

    /// Override the as-of timestamp
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }

    /// Subject identifier (e.g. a ticker)
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Investment horizon
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Optional free-text context
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Timestamp the request refers to
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }
}
