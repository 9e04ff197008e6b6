//! LLM-backed analysts for council-rs
//!
//! This crate connects the coordination engine to a text-completion model:
//!
//! - Message and completion types, and the [`LLMProvider`] trait
//! - An OpenAI-compatible HTTP provider (feature `openai`)
//! - Role prompts and debate prompts as MiniJinja templates
//! - Decoding of model text into the key/value payload the engine validates
//! - [`LlmProducer`], a [`Producer`](council_core::Producer) backed by a provider
//! - [`LlmPlanner`], a [`Planner`](council_engine::Planner) backed by a provider

pub mod completion;
pub mod decode;
pub mod error;
pub mod messages;
pub mod planner;
pub mod producer;
pub mod prompts;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use decode::decode_payload;
pub use error::{LLMError, Result};
pub use messages::{ChatRole, Message};
pub use planner::LlmPlanner;
pub use producer::{LlmProducer, ProducerSettings};
pub use prompts::PromptBook;
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
