//! Decision-coordination engine
//!
//! Collects proposals from a council of producers, detects conflicts between
//! them, runs bounded debate rounds, and synthesizes a single weighted
//! decision.
//!
//! # Example
//!
//! ```no_run
//! use council_core::{Horizon, Request};
//! use council_engine::{CouncilConfig, DecisionPipeline, Roster, WorkflowPipeline};
//!
//! # async fn example(roster: Roster) -> council_core::Result<()> {
//! let config = CouncilConfig::builder().max_debate_rounds(2).build()?;
//! let pipeline = WorkflowPipeline::new(config, &roster)?;
//!
//! let request = Request::new("AAPL", Horizon::Short)?;
//! let decision = pipeline.decide(&request).await;
//! println!("{} ({:.2})", decision.action(), decision.confidence());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conflict;
pub mod debate;
pub mod emitter;
pub mod fanout;
pub mod pipeline;
pub mod retry;
pub mod roster;
pub mod router;
pub mod synthesizer;
pub mod validator;

#[cfg(test)]
mod testing;

pub use config::{CouncilConfig, CouncilConfigBuilder, CouncilConfigFile, ParticipantPolicy};
pub use conflict::{Conflict, detect};
pub use debate::{DebateCoordinator, DebateOutcome, DebateRound, DebateState};
pub use emitter::{JsonFileEmitter, SignalEmitter};
pub use fanout::FanOutCoordinator;
pub use pipeline::{DecisionPipeline, Plan, PlannedPipeline, Planner, WorkflowPipeline};
pub use retry::CallPolicy;
pub use roster::Roster;
pub use router::{PipelineRouter, Strategy};
pub use synthesizer::{DecisionSynthesizer, Deliberation, Scores};
pub use validator::ProposalValidator;
