//! Scripted producers for tests

use async_trait::async_trait;
use council_core::{
    Action, Producer, ProducerError, ProposalTask, RawOutput, RevisionTask, Role,
};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Value),
    Fail(String),
    Hang,
}

pub fn position(action: Action, conviction: f64, thesis: &str) -> Step {
    Step::Reply(json!({
        "action": action.as_str(),
        "conviction": conviction,
        "thesis": thesis,
        "evidence": [format!("{thesis} (evidence)")],
    }))
}

/// A producer replaying scripted steps; the last step repeats forever
#[derive(Debug)]
pub struct ScriptedProducer {
    role: Role,
    proposals: Vec<Step>,
    revisions: Mutex<Vec<Step>>,
    propose_calls: AtomicU32,
    revise_calls: AtomicU32,
    seen_peers: Mutex<Vec<Vec<Role>>>,
}

impl ScriptedProducer {
    pub fn new(role: Role, proposals: Vec<Step>) -> Self {
        Self {
            role,
            proposals,
            revisions: Mutex::new(Vec::new()),
            propose_calls: AtomicU32::new(0),
            revise_calls: AtomicU32::new(0),
            seen_peers: Mutex::new(Vec::new()),
        }
    }

    pub fn buy(role: Role, conviction: f64) -> Self {
        Self::new(role, vec![position(Action::Buy, conviction, &format!("{role} bullish"))])
    }

    pub fn sell(role: Role, conviction: f64) -> Self {
        Self::new(role, vec![position(Action::Sell, conviction, &format!("{role} bearish"))])
    }

    pub fn hold(role: Role, conviction: f64) -> Self {
        Self::new(role, vec![position(Action::Hold, conviction, &format!("{role} flat"))])
    }

    pub fn failing(role: Role) -> Self {
        Self::new(role, vec![Step::Fail(format!("{role} unavailable"))])
    }

    pub fn hanging(role: Role) -> Self {
        Self::new(role, vec![Step::Hang])
    }

    /// Revision replies, one per round
    pub fn revising(self, steps: Vec<Step>) -> Self {
        *self.revisions.lock().unwrap() = steps;
        self
    }

    pub fn propose_calls(&self) -> u32 {
        self.propose_calls.load(Ordering::SeqCst)
    }

    pub fn revise_calls(&self) -> u32 {
        self.revise_calls.load(Ordering::SeqCst)
    }

    /// Peer roles shown on each revision call
    pub fn seen_peers(&self) -> Vec<Vec<Role>> {
        self.seen_peers.lock().unwrap().clone()
    }

    async fn play(step: Option<Step>) -> Result<RawOutput, ProducerError> {
        match step {
            Some(Step::Reply(payload)) => Ok(RawOutput::structured(payload)),
            Some(Step::Fail(message)) => Err(ProducerError::Failed(message)),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Err(ProducerError::Failed("hung".to_string()))
            }
            None => Err(ProducerError::Failed("no scripted reply".to_string())),
        }
    }
}

fn pick(steps: &[Step], index: u32) -> Option<Step> {
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    steps.get(index).or_else(|| steps.last()).cloned()
}

#[async_trait]
impl Producer for ScriptedProducer {
    fn role(&self) -> Role {
        self.role
    }

    async fn propose(&self, _task: &ProposalTask) -> Result<RawOutput, ProducerError> {
        let call = self.propose_calls.fetch_add(1, Ordering::SeqCst);
        Self::play(pick(&self.proposals, call)).await
    }

    async fn revise(&self, task: &RevisionTask) -> Result<RawOutput, ProducerError> {
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_peers
            .lock()
            .unwrap()
            .push(task.peers.iter().map(|p| p.role).collect());
        let step = {
            let revisions = self.revisions.lock().unwrap();
            pick(&revisions, task.round - 1)
        };
        match step {
            Some(step) => Self::play(Some(step)).await,
            // No script: stand by the prior position.
            None => Ok(RawOutput::structured(json!({
                "action": task.prior.action().as_str(),
                "conviction": task.prior.conviction(),
                "thesis": task.prior.thesis(),
                "evidence": task.prior.evidence(),
            }))),
        }
    }
}
