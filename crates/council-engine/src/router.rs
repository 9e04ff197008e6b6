//! Strategy routing between pipelines

use council_core::{Decision, Error, Request, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::config::CouncilConfig;
use crate::pipeline::{DecisionPipeline, PlannedPipeline, Planner, WorkflowPipeline};
use crate::roster::Roster;

/// How producers are selected for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Every configured role
    #[default]
    Fixed,
    /// Roles chosen by a planner
    Planned,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Planned => "planned",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "workflow" => Ok(Self::Fixed),
            "planned" | "adaptive" => Ok(Self::Planned),
            other => Err(Error::Configuration(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Selects a pipeline per strategy
pub struct PipelineRouter {
    fixed: Arc<dyn DecisionPipeline>,
    planned: Option<Arc<dyn DecisionPipeline>>,
}

impl PipelineRouter {
    /// Build both pipelines from one configuration and roster
    ///
    /// Without a planner, the planned strategy routes to the fixed pipeline.
    pub fn new(
        config: CouncilConfig,
        roster: &Roster,
        planner: Option<Arc<dyn Planner>>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let fixed: Arc<dyn DecisionPipeline> =
            Arc::new(WorkflowPipeline::new(config.clone(), roster)?);
        let planned = match planner {
            Some(planner) => Some(
                Arc::new(PlannedPipeline::new(config, roster, planner)?) as Arc<dyn DecisionPipeline>,
            ),
            None => None,
        };
        Ok(Self { fixed, planned })
    }

    /// Route from explicit pipelines
    pub fn from_pipelines(
        fixed: Arc<dyn DecisionPipeline>,
        planned: Option<Arc<dyn DecisionPipeline>>,
    ) -> Self {
        Self { fixed, planned }
    }

    /// Pipeline serving a strategy
    pub fn route(&self, strategy: Strategy) -> Arc<dyn DecisionPipeline> {
        match (strategy, &self.planned) {
            (Strategy::Planned, Some(planned)) => planned.clone(),
            (Strategy::Planned, None) => {
                warn!("No planner configured, using the fixed pipeline");
                self.fixed.clone()
            }
            (Strategy::Fixed, _) => self.fixed.clone(),
        }
    }

    /// Decide a request with the pipeline serving `strategy`
    pub async fn decide(&self, strategy: Strategy, request: &Request) -> Decision {
        self.route(strategy).decide(request).await
    }
}
