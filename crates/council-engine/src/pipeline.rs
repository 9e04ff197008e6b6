//! Decision pipelines
//!
//! A [`DecisionPipeline`] turns a request into a decision. Two
//! implementations share the same stages (fan-out, conflict check, debate,
//! synthesis) and differ only in which producers they consult:
//!
//! - [`WorkflowPipeline`] always consults every configured role.
//! - [`PlannedPipeline`] lets a [`Planner`] pick the roles and give each a
//!   task hint first.

use async_trait::async_trait;
use council_core::{
    Decision, Producer, ProducerError, Request, Result, Role, RoleMap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::CouncilConfig;
use crate::conflict;
use crate::debate::DebateCoordinator;
use crate::fanout::FanOutCoordinator;
use crate::retry::CallPolicy;
use crate::roster::Roster;
use crate::synthesizer::{DecisionSynthesizer, Deliberation};

/// Turns requests into decisions
///
/// Running a pipeline never fails: producer trouble degrades into
/// abstentions and, at worst, a HOLD decision with zero confidence.
/// Misconfiguration is rejected when the pipeline is built.
#[async_trait]
pub trait DecisionPipeline: Send + Sync {
    /// Pipeline name
    fn name(&self) -> &str;

    /// Decide a request
    async fn decide(&self, request: &Request) -> Decision;

    /// Run a request and return every intermediate stage
    async fn deliberate(&self, request: &Request) -> (Deliberation, Decision);
}

/// Consults every configured role
pub struct WorkflowPipeline {
    config: Arc<CouncilConfig>,
    producers: Vec<(Role, Arc<dyn Producer>)>,
}

impl WorkflowPipeline {
    /// Build a pipeline; fails if the configuration is invalid or a role has
    /// no producer
    pub fn new(config: impl Into<Arc<CouncilConfig>>, roster: &Roster) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        let producers = roster.resolve(&config.roles)?;
        Ok(Self { config, producers })
    }

    /// Pipeline configuration
    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }
}

#[async_trait]
impl DecisionPipeline for WorkflowPipeline {
    fn name(&self) -> &str {
        "workflow"
    }

    async fn decide(&self, request: &Request) -> Decision {
        self.deliberate(request).await.1
    }

    async fn deliberate(&self, request: &Request) -> (Deliberation, Decision) {
        run(
            self.name(),
            &self.config,
            request,
            &self.producers,
            &RoleMap::new(),
        )
        .await
    }
}

/// Roles and task hints chosen for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Roles to consult
    pub roles: Vec<Role>,
    /// Optional task hint per role
    #[serde(default)]
    pub hints: RoleMap<String>,
    /// Why these roles were chosen
    #[serde(default)]
    pub reasoning: String,
}

impl Plan {
    /// Plan consulting the given roles without hints
    pub fn all(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
            hints: RoleMap::new(),
            reasoning: "all roles".to_string(),
        }
    }

    /// Restrict the plan to the available roles, keeping their order
    ///
    /// An empty result falls back to every available role.
    pub fn resolve(mut self, available: &[Role]) -> Self {
        let selected: Vec<Role> = available
            .iter()
            .copied()
            .filter(|role| self.roles.contains(role))
            .collect();

        if selected.is_empty() {
            warn!("Plan selected no available role, consulting all roles");
            return Self {
                reasoning: format!("fallback to all roles ({})", self.reasoning),
                ..Self::all(available)
            };
        }

        self.hints = self
            .hints
            .into_iter()
            .filter(|(role, hint)| selected.contains(role) && !hint.trim().is_empty())
            .collect();
        self.roles = selected;
        self
    }
}

/// Chooses which roles to consult for a request
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan a request given the roles that can be consulted
    async fn plan(&self, request: &Request, available: &[Role]) -> std::result::Result<Plan, ProducerError>;
}

/// Consults the roles a planner selects
pub struct PlannedPipeline {
    config: Arc<CouncilConfig>,
    producers: Vec<(Role, Arc<dyn Producer>)>,
    planner: Arc<dyn Planner>,
}

impl PlannedPipeline {
    /// Build a pipeline; fails if the configuration is invalid or a role has
    /// no producer
    pub fn new(
        config: impl Into<Arc<CouncilConfig>>,
        roster: &Roster,
        planner: Arc<dyn Planner>,
    ) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        let producers = roster.resolve(&config.roles)?;
        Ok(Self {
            config,
            producers,
            planner,
        })
    }

    /// Ask the planner for a plan, falling back to every role on failure
    pub async fn plan(&self, request: &Request) -> Plan {
        let policy = CallPolicy::new(
            self.config.call_timeout,
            self.config.max_attempts,
            self.config.retry_backoff,
        );
        let roles = &self.config.roles;
        let planner = self.planner.as_ref();

        match policy
            .execute("planner.plan", || planner.plan(request, roles))
            .await
        {
            Ok(plan) => plan.resolve(roles),
            Err(e) => {
                warn!("Planner failed, consulting all roles: {e}");
                Plan {
                    reasoning: format!("planner failed: {e}"),
                    ..Plan::all(roles)
                }
            }
        }
    }
}

#[async_trait]
impl DecisionPipeline for PlannedPipeline {
    fn name(&self) -> &str {
        "planned"
    }

    async fn decide(&self, request: &Request) -> Decision {
        self.deliberate(request).await.1
    }

    async fn deliberate(&self, request: &Request) -> (Deliberation, Decision) {
        let plan = self.plan(request).await;
        info!(
            "Plan selected {:?}: {}",
            plan.roles.iter().map(Role::as_str).collect::<Vec<_>>(),
            plan.reasoning
        );

        let producers: Vec<(Role, Arc<dyn Producer>)> = self
            .producers
            .iter()
            .filter(|(role, _)| plan.roles.contains(role))
            .cloned()
            .collect();

        run(self.name(), &self.config, request, &producers, &plan.hints).await
    }
}

async fn run(
    pipeline: &str,
    config: &CouncilConfig,
    request: &Request,
    producers: &[(Role, Arc<dyn Producer>)],
    hints: &RoleMap<String>,
) -> (Deliberation, Decision) {
    let run_id = Uuid::new_v4();
    let span = info_span!(
        "decision_run",
        %run_id,
        pipeline,
        subject = request.subject(),
        horizon = %request.horizon()
    );

    async move {
        info!("Starting decision run");

        let initial = FanOutCoordinator::new(config)
            .propose_all(request, producers, hints)
            .await;

        let debate = match conflict::detect(&initial) {
            Some(conflict) => {
                info!("Conflict detected, opening debate");
                Some(
                    DebateCoordinator::new(config)
                        .run(request, producers, initial.clone(), conflict)
                        .await,
                )
            }
            None => {
                info!("No conflict, skipping debate");
                None
            }
        };

        let deliberation = Deliberation { initial, debate };
        let decision = DecisionSynthesizer::new(config).synthesize(request, &deliberation);
        info!(
            "Decision: {} with confidence {:.2}",
            decision.action(),
            decision.confidence()
        );
        (deliberation, decision)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesizer::NO_ACTIONABLE_EVIDENCE;
    use crate::testing::{ScriptedProducer, position};
    use council_core::{Action, ChangeKind, Error, Horizon};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn request() -> Request {
        Request::new("NVDA", Horizon::Short).unwrap()
    }

    fn roster(producers: Vec<Arc<ScriptedProducer>>) -> Roster {
        producers
            .into_iter()
            .fold(Roster::new(), |roster, p| roster.with(p))
    }

    fn weighted() -> CouncilConfig {
        CouncilConfig::builder()
            .weight(Role::Technical, 0.4)
            .weight(Role::News, 0.3)
            .weight(Role::Fundamental, 0.3)
            .retry_backoff(Duration::ZERO)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_agreement_without_debate() {
        let roster = roster(vec![
            Arc::new(ScriptedProducer::buy(Role::Technical, 0.8)),
            Arc::new(ScriptedProducer::buy(Role::News, 0.7)),
            Arc::new(ScriptedProducer::hold(Role::Fundamental, 0.5)),
        ]);
        let pipeline = WorkflowPipeline::new(weighted(), &roster).unwrap();

        let decision = pipeline.decide(&request()).await;

        assert_eq!(decision.action(), Action::Buy);
        assert!((decision.confidence() - 0.53).abs() < 1e-9);
        assert!(decision.debate().is_none());
        assert_eq!(decision.proposals().len(), 3);
    }

    #[tokio::test]
    async fn test_conflict_resolved_by_debate() {
        let fundamental = Arc::new(
            ScriptedProducer::sell(Role::Fundamental, 0.75)
                .revising(vec![position(Action::Hold, 0.6, "priced in")]),
        );
        let roster = roster(vec![
            Arc::new(ScriptedProducer::buy(Role::Technical, 0.75)),
            Arc::new(ScriptedProducer::hold(Role::News, 0.5)),
            fundamental.clone(),
        ]);
        let pipeline = WorkflowPipeline::new(weighted(), &roster).unwrap();

        let (deliberation, decision) = pipeline.deliberate(&request()).await;

        let debate = deliberation.debate.as_ref().unwrap();
        assert_eq!(debate.rounds[0].participants, vec![Role::Technical, Role::Fundamental]);

        let transcript = decision.debate().unwrap();
        assert!(transcript.converged);
        assert_eq!(transcript.position_changes.len(), 1);
        assert_eq!(transcript.position_changes[0].kind, ChangeKind::ActionOnly);
        assert_eq!(fundamental.revise_calls(), 1);

        // 0.4 × 0.75 for BUY against 0.3 × 0.6 + 0.3 × 0.5 for HOLD
        assert_eq!(decision.action(), Action::Hold);
        assert!((decision.confidence() - 0.33).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_everyone_times_out() {
        let config = CouncilConfig::builder()
            .call_timeout(Duration::from_secs(20))
            .build()
            .unwrap();
        let roster = roster(Role::ALL.map(|r| Arc::new(ScriptedProducer::hanging(r))).into());
        let pipeline = WorkflowPipeline::new(config, &roster).unwrap();

        let decision = pipeline.decide(&request()).await;

        assert_eq!(decision.action(), Action::Hold);
        assert_eq!(decision.confidence(), 0.0);
        assert_eq!(decision.rationale(), NO_ACTIONABLE_EVIDENCE);
        assert!(decision.debate().is_none());
        assert_eq!(decision.proposals().len(), 3);
    }

    #[test]
    fn test_missing_producer_is_a_construction_error() {
        let roster = roster(vec![Arc::new(ScriptedProducer::buy(Role::Technical, 0.8))]);
        let result = WorkflowPipeline::new(CouncilConfig::default(), &roster);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    struct FixedPlanner {
        plan: Option<Plan>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn plan(
            &self,
            _request: &Request,
            _available: &[Role],
        ) -> std::result::Result<Plan, ProducerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.plan
                .clone()
                .ok_or_else(|| ProducerError::Failed("planner offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_planned_pipeline_consults_selected_roles() {
        let news = Arc::new(ScriptedProducer::sell(Role::News, 0.6));
        let technical = Arc::new(ScriptedProducer::buy(Role::Technical, 0.9));
        let roster = roster(vec![
            technical.clone(),
            news.clone(),
            Arc::new(ScriptedProducer::buy(Role::Fundamental, 0.5)),
        ]);
        let planner = Arc::new(FixedPlanner {
            plan: Some(Plan {
                roles: vec![Role::News],
                hints: [(Role::News, "check the downgrade".to_string())]
                    .into_iter()
                    .collect(),
                reasoning: "headline driven".to_string(),
            }),
            calls: AtomicU32::new(0),
        });
        let pipeline = PlannedPipeline::new(weighted(), &roster, planner.clone()).unwrap();

        let decision = pipeline.decide(&request()).await;

        assert_eq!(technical.propose_calls(), 0);
        assert_eq!(news.propose_calls(), 1);
        assert_eq!(decision.proposals().len(), 1);
        assert_eq!(decision.action(), Action::Sell);
        assert!((decision.confidence() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_planner_falls_back_to_all_roles() {
        let roster = roster(vec![
            Arc::new(ScriptedProducer::buy(Role::Technical, 0.8)),
            Arc::new(ScriptedProducer::buy(Role::News, 0.7)),
            Arc::new(ScriptedProducer::hold(Role::Fundamental, 0.5)),
        ]);
        let planner = Arc::new(FixedPlanner {
            plan: None,
            calls: AtomicU32::new(0),
        });
        let pipeline = PlannedPipeline::new(weighted(), &roster, planner.clone()).unwrap();

        let decision = pipeline.decide(&request()).await;

        assert_eq!(planner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(decision.proposals().len(), 3);
        assert_eq!(decision.action(), Action::Buy);
    }

    #[test]
    fn test_plan_resolve() {
        let available = [Role::Technical, Role::Fundamental];
        let plan = Plan {
            roles: vec![Role::Fundamental, Role::News, Role::Technical],
            hints: [
                (Role::News, "ignored".to_string()),
                (Role::Technical, "  ".to_string()),
                (Role::Fundamental, "look at margins".to_string()),
            ]
            .into_iter()
            .collect(),
            reasoning: String::new(),
        }
        .resolve(&available);

        assert_eq!(plan.roles, vec![Role::Technical, Role::Fundamental]);
        assert_eq!(plan.hints.len(), 1);
        assert_eq!(plan.hints.get(Role::Fundamental).unwrap(), "look at margins");

        let empty = Plan::default().resolve(&available);
        assert_eq!(empty.roles, available.to_vec());
    }
}
