//! Shared utilities for council-rs

pub mod logging;

pub use logging::{LogFormat, init_tracing};
