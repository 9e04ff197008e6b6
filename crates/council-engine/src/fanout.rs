//! Fan-out coordinator
//!
//! Runs every producer of a stage concurrently and waits for all of them.
//! Each call is bounded by the role's [`CallPolicy`](crate::CallPolicy);
//! a producer that never answers usably is recorded as an abstention, so
//! a stage always yields one proposal per role.

use council_core::{
    Producer, ProducerError, Proposal, ProposalSet, ProposalTask, RawOutput, Request,
    RevisionTask, Role, RoleMap,
};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::CouncilConfig;
use crate::validator::ProposalValidator;

/// Concurrent producer invocation for one pipeline run
#[derive(Debug, Clone, Copy)]
pub struct FanOutCoordinator<'a> {
    config: &'a CouncilConfig,
    validator: ProposalValidator,
}

impl<'a> FanOutCoordinator<'a> {
    /// Create a coordinator bound to a configuration
    pub fn new(config: &'a CouncilConfig) -> Self {
        Self {
            config,
            validator: ProposalValidator::new(config.require_evidence),
        }
    }

    /// Collect an initial proposal from every producer
    ///
    /// The result holds exactly one proposal per producer, in the order the
    /// producers were given.
    pub async fn propose_all(
        &self,
        request: &Request,
        producers: &[(Role, Arc<dyn Producer>)],
        hints: &RoleMap<String>,
    ) -> ProposalSet {
        info!("Collecting proposals from {} producers", producers.len());

        let calls = producers.iter().map(|(role, producer)| {
            let role = *role;
            let task = ProposalTask {
                request: request.clone(),
                role,
                hint: hints.get(role).cloned(),
            };
            async move {
                let producer = producer.as_ref();
                let task = &task;
                let result = self
                    .call(role, "propose", || async move { producer.propose(task).await })
                    .await;
                let proposal = result.unwrap_or_else(|e| {
                    warn!("{role} converted to abstention: {e}");
                    Proposal::failed(role, e.kind(), &e)
                });
                (role, proposal)
            }
            .instrument(info_span!("producer", role = %role))
        });

        let proposals: ProposalSet = join_all(calls).await.into_iter().collect();
        debug!(
            "Collected proposals: {}",
            proposals
                .iter()
                .map(|(role, p)| format!("{role}={} {:.2}", p.action(), p.conviction()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        proposals
    }

    /// Ask each participant to revise its position
    ///
    /// Failures are returned rather than converted, so the caller decides
    /// what a participant that could not revise should keep.
    pub async fn revise_all(
        &self,
        tasks: Vec<(Arc<dyn Producer>, RevisionTask)>,
    ) -> Vec<(Role, Result<Proposal, ProducerError>)> {
        let calls = tasks.into_iter().map(|(producer, task)| {
            let role = task.role;
            let round = task.round;
            async move {
                let producer = producer.as_ref();
                let task = &task;
                let result = self
                    .call(role, "revise", || async move { producer.revise(task).await })
                    .await;
                (role, result)
            }
            .instrument(info_span!("producer", role = %role, round))
        });

        join_all(calls).await
    }

    async fn call<F, Fut>(
        &self,
        role: Role,
        operation: &str,
        mut attempt: F,
    ) -> Result<Proposal, ProducerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawOutput, ProducerError>>,
    {
        let policy = self.config.call_policy(role);
        let name = format!("{role}.{operation}");

        let output = policy
            .execute(&name, || {
                let pending = attempt();
                async move {
                    let output = pending.await?;
                    ProposalValidator::check_shape(&output)?;
                    Ok(output)
                }
            })
            .await?;

        Ok(self.validator.validate(role, &output))
    }
}
