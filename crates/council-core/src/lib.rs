//! Core data model for council-rs
//!
//! This crate defines the types that flow through a decision run:
//!
//! - [`Request`]: what is being decided (subject, horizon, context)
//! - [`Proposal`]: one producer's opinion about the request
//! - [`PositionChange`] and [`DebateTranscript`]: how opinions moved during debate
//! - [`Decision`]: the single synthesized output of a run
//! - [`Producer`]: the async seam behind which analyst workers live

pub mod decision;
pub mod error;
pub mod producer;
pub mod proposal;
pub mod request;
pub mod role;
pub mod transcript;

pub use decision::{Decision, DecisionParts, Signal};
pub use error::{Error, FailureKind, ProducerError, Result};
pub use producer::{PeerPosition, Producer, ProposalTask, RawOutput, RevisionTask};
pub use proposal::{Action, Proposal, ProposalSet};
pub use request::{Horizon, Request};
pub use role::{Role, RoleMap};
pub use transcript::{ChangeKind, DebateTranscript, PositionChange};
