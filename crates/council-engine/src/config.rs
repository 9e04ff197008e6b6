//! Council configuration
//!
//! A [`CouncilConfig`] is built once, validated, and then shared read-only by
//! every stage of every run.

use council_core::{Error, Result, Role, RoleMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::retry::CallPolicy;

/// Which producers take part in a debate round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantPolicy {
    /// Only producers in one of the opposing camps
    #[default]
    OpposingCamps,
    /// Every configured producer
    All,
}

/// Configuration for a council of producers
#[derive(Debug, Clone, PartialEq)]
pub struct CouncilConfig {
    /// Producer roles in declaration order
    pub roles: Vec<Role>,

    /// Nonnegative weight per role; normalized at aggregation time
    pub weights: RoleMap<f64>,

    /// Wall-clock budget for a single producer call
    pub call_timeout: Duration,

    /// Per-role overrides of `call_timeout`
    pub role_timeouts: RoleMap<Duration>,

    /// Attempts per producer call, including the first
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub retry_backoff: Duration,

    /// Upper bound on debate rounds; 0 disables debate
    pub max_debate_rounds: u32,

    /// Debate participant selection
    pub participant_policy: ParticipantPolicy,

    /// Conviction delta a producer must exceed to count as having moved
    pub material_change_threshold: f64,

    /// Treat proposals without evidence as abstentions
    pub require_evidence: bool,

    /// Cap on final confidence when the initial proposals conflicted
    pub conflict_confidence_cap: Option<f64>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            roles: Role::ALL.to_vec(),
            weights: Role::ALL.iter().map(|r| (*r, 1.0)).collect(),
            call_timeout: Duration::from_secs(60),
            role_timeouts: RoleMap::new(),
            max_attempts: 2,
            retry_backoff: Duration::from_millis(500),
            max_debate_rounds: 1,
            participant_policy: ParticipantPolicy::OpposingCamps,
            material_change_threshold: 0.05,
            require_evidence: false,
            conflict_confidence_cap: None,
        }
    }
}

impl CouncilConfig {
    /// Create a new configuration builder
    pub fn builder() -> CouncilConfigBuilder {
        CouncilConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file
    ///
    /// Missing keys fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let file: CouncilConfigFile = serde_json::from_str(&content)?;
        file.into_builder()?.build()
    }

    /// Apply `COUNCIL_*` environment overrides and re-validate
    ///
    /// Recognized: `COUNCIL_MAX_ROUNDS`, `COUNCIL_TIMEOUT_SECS`, `COUNCIL_MAX_ATTEMPTS`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(rounds) = env_number::<u32>("COUNCIL_MAX_ROUNDS")? {
            self.max_debate_rounds = rounds;
        }
        if let Some(secs) = env_number::<u64>("COUNCIL_TIMEOUT_SECS")? {
            self.call_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = env_number::<u32>("COUNCIL_MAX_ATTEMPTS")? {
            self.max_attempts = attempts;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            return Err(Error::Configuration("role set must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for role in &self.roles {
            if !seen.insert(*role) {
                return Err(Error::Configuration(format!("role '{role}' declared twice")));
            }
            if self.weights.get(*role).is_none() {
                return Err(Error::Configuration(format!("no weight configured for role '{role}'")));
            }
        }

        for (role, weight) in self.weights.iter() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Configuration(format!(
                    "weight for role '{role}' must be a nonnegative number, got {weight}"
                )));
            }
        }

        let total: f64 = self.roles.iter().map(|r| self.weight(*r)).sum();
        if total <= 0.0 {
            return Err(Error::Configuration(
                "at least one role must carry a positive weight".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::Configuration(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout.is_zero() || self.role_timeouts.values().any(Duration::is_zero) {
            return Err(Error::Configuration(
                "call timeouts must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.material_change_threshold) {
            return Err(Error::Configuration(format!(
                "material_change_threshold must be within [0, 1], got {}",
                self.material_change_threshold
            )));
        }

        if let Some(cap) = self.conflict_confidence_cap {
            if !(0.0..=1.0).contains(&cap) {
                return Err(Error::Configuration(format!(
                    "conflict_confidence_cap must be within [0, 1], got {cap}"
                )));
            }
        }

        Ok(())
    }

    /// Weight of a role (0 when unconfigured)
    pub fn weight(&self, role: Role) -> f64 {
        self.weights.get(role).copied().unwrap_or(0.0)
    }

    /// Timeout for a single call to the given role
    pub fn call_timeout_for(&self, role: Role) -> Duration {
        self.role_timeouts
            .get(role)
            .copied()
            .unwrap_or(self.call_timeout)
    }

    /// Timeout and retry policy for calls to the given role
    pub fn call_policy(&self, role: Role) -> CallPolicy {
        CallPolicy::new(
            self.call_timeout_for(role),
            self.max_attempts,
            self.retry_backoff,
        )
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{key} must be a number, got '{value}'"))),
        Err(_) => Ok(None),
    }
}

/// Builder for CouncilConfig
#[derive(Debug, Default)]
pub struct CouncilConfigBuilder {
    roles: Option<Vec<Role>>,
    weights: Option<RoleMap<f64>>,
    call_timeout: Option<Duration>,
    role_timeouts: RoleMap<Duration>,
    max_attempts: Option<u32>,
    retry_backoff: Option<Duration>,
    max_debate_rounds: Option<u32>,
    participant_policy: Option<ParticipantPolicy>,
    material_change_threshold: Option<f64>,
    require_evidence: Option<bool>,
    conflict_confidence_cap: Option<f64>,
}

impl CouncilConfigBuilder {
    /// Set the roles, in declaration order
    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = Some(roles.into_iter().collect());
        self
    }

    /// Set the full weight table
    pub fn weights(mut self, weights: impl IntoIterator<Item = (Role, f64)>) -> Self {
        self.weights = Some(weights.into_iter().collect());
        self
    }

    /// Set a single role's weight
    pub fn weight(mut self, role: Role, weight: f64) -> Self {
        self.weights
            .get_or_insert_with(RoleMap::new)
            .insert(role, weight);
        self
    }

    /// Set the default call timeout
    pub fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = Some(duration);
        self
    }

    /// Override the call timeout of one role
    pub fn role_timeout(mut self, role: Role, duration: Duration) -> Self {
        self.role_timeouts.insert(role, duration);
        self
    }

    /// Set attempts per call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the delay between attempts
    pub fn retry_backoff(mut self, duration: Duration) -> Self {
        self.retry_backoff = Some(duration);
        self
    }

    /// Set the debate round limit
    pub fn max_debate_rounds(mut self, rounds: u32) -> Self {
        self.max_debate_rounds = Some(rounds);
        self
    }

    /// Set the debate participant policy
    pub fn participant_policy(mut self, policy: ParticipantPolicy) -> Self {
        self.participant_policy = Some(policy);
        self
    }

    /// Set the material conviction change threshold
    pub fn material_change_threshold(mut self, threshold: f64) -> Self {
        self.material_change_threshold = Some(threshold);
        self
    }

    /// Require evidence for non-neutral proposals
    pub fn require_evidence(mut self, required: bool) -> Self {
        self.require_evidence = Some(required);
        self
    }

    /// Cap final confidence when the initial proposals conflicted
    pub fn conflict_confidence_cap(mut self, cap: f64) -> Self {
        self.conflict_confidence_cap = Some(cap);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CouncilConfig> {
        let defaults = CouncilConfig::default();

        let roles = self.roles.unwrap_or(defaults.roles);
        // Roles without an explicit weight get the equal default weight.
        let mut weights = self.weights.unwrap_or_default();
        for role in &roles {
            if !weights.contains(*role) {
                weights.insert(*role, 1.0);
            }
        }

        let config = CouncilConfig {
            roles,
            weights,
            call_timeout: self.call_timeout.unwrap_or(defaults.call_timeout),
            role_timeouts: self.role_timeouts,
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
            max_debate_rounds: self.max_debate_rounds.unwrap_or(defaults.max_debate_rounds),
            participant_policy: self.participant_policy.unwrap_or(defaults.participant_policy),
            material_change_threshold: self
                .material_change_threshold
                .unwrap_or(defaults.material_change_threshold),
            require_evidence: self.require_evidence.unwrap_or(defaults.require_evidence),
            conflict_confidence_cap: self.conflict_confidence_cap,
        };

        config.validate()?;
        Ok(config)
    }
}

/// On-disk form of [`CouncilConfig`]
///
/// Durations are plain numbers (seconds for timeouts, milliseconds for the
/// retry backoff). Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CouncilConfigFile {
    pub roles: Option<Vec<Role>>,
    pub weights: Option<RoleMap<f64>>,
    pub call_timeout_secs: Option<f64>,
    pub role_timeout_secs: Option<RoleMap<f64>>,
    pub max_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub max_debate_rounds: Option<u32>,
    pub participant_policy: Option<ParticipantPolicy>,
    pub material_change_threshold: Option<f64>,
    pub require_evidence: Option<bool>,
    pub conflict_confidence_cap: Option<f64>,
}

impl CouncilConfigFile {
    /// Convert into a builder, rejecting unusable durations
    pub fn into_builder(self) -> Result<CouncilConfigBuilder> {
        let mut builder = CouncilConfig::builder();

        if let Some(roles) = self.roles {
            builder = builder.roles(roles);
        }
        if let Some(weights) = self.weights {
            builder = builder.weights(weights);
        }
        if let Some(secs) = self.call_timeout_secs {
            builder = builder.call_timeout(seconds(secs)?);
        }
        for (role, secs) in self.role_timeout_secs.unwrap_or_default() {
            builder = builder.role_timeout(role, seconds(secs)?);
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(ms) = self.retry_backoff_ms {
            builder = builder.retry_backoff(Duration::from_millis(ms));
        }
        if let Some(rounds) = self.max_debate_rounds {
            builder = builder.max_debate_rounds(rounds);
        }
        if let Some(policy) = self.participant_policy {
            builder = builder.participant_policy(policy);
        }
        if let Some(threshold) = self.material_change_threshold {
            builder = builder.material_change_threshold(threshold);
        }
        if let Some(required) = self.require_evidence {
            builder = builder.require_evidence(required);
        }
        if let Some(cap) = self.conflict_confidence_cap {
            builder = builder.conflict_confidence_cap(cap);
        }

        Ok(builder)
    }
}

fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Configuration(format!("invalid timeout {secs}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CouncilConfig::default();
        assert_eq!(config.roles, Role::ALL.to_vec());
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.max_debate_rounds, 1);
        assert_eq!(config.participant_policy, ParticipantPolicy::OpposingCamps);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CouncilConfig::builder()
            .weight(Role::Technical, 0.4)
            .weight(Role::News, 0.3)
            .weight(Role::Fundamental, 0.3)
            .role_timeout(Role::News, Duration::from_secs(5))
            .max_debate_rounds(2)
            .build()
            .unwrap();

        assert_eq!(config.weight(Role::Technical), 0.4);
        assert_eq!(config.call_timeout_for(Role::News), Duration::from_secs(5));
        assert_eq!(config.call_timeout_for(Role::Technical), Duration::from_secs(60));
        assert_eq!(config.max_debate_rounds, 2);
    }

    #[test]
    fn test_validation_empty_roles() {
        let result = CouncilConfig::builder().roles(Vec::new()).build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validation_negative_weight() {
        let result = CouncilConfig::builder().weight(Role::News, -0.1).build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validation_duplicate_role() {
        let result = CouncilConfig::builder()
            .roles([Role::News, Role::News])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_zero_attempts() {
        assert!(CouncilConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn test_validation_all_zero_weights() {
        let result = CouncilConfig::builder()
            .roles([Role::News])
            .weight(Role::News, 0.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "roles": ["technical", "fundamental"],
                "weights": {{"technical": 0.6, "fundamental": 0.4}},
                "call_timeout_secs": 2.5,
                "max_debate_rounds": 3,
                "participant_policy": "all"
            }}"#
        )
        .unwrap();

        let config = CouncilConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.roles, vec![Role::Technical, Role::Fundamental]);
        assert_eq!(config.call_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_debate_rounds, 3);
        assert_eq!(config.participant_policy, ParticipantPolicy::All);
    }

    #[test]
    fn test_from_json_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_rounds": 3}}"#).unwrap();
        assert!(CouncilConfig::from_json_file(file.path()).is_err());
    }
}
