//! Signal emission
//!
//! The engine hands finished decisions to a [`SignalEmitter`]; where they
//! go is up to the emitter.

use async_trait::async_trait;
use council_core::{Decision, Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Timestamp format used in signal file names
pub const SIGNAL_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Destination for synthesized decisions
#[async_trait]
pub trait SignalEmitter: Send + Sync {
    /// Emitter name, for logs
    fn name(&self) -> &str;

    /// Persist the decision's signal and describe where it went
    async fn emit(&self, decision: &Decision) -> Result<String>;
}

/// Writes each signal as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileEmitter {
    dir: PathBuf,
}

impl JsonFileEmitter {
    /// Create an emitter writing into `dir` (created on first use)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File the decision's signal is written to
    ///
    /// `<dir>/<subject in lowercase>_<generated_at as YYYYmmddTHHMMSSZ>.json`
    pub fn path_for(&self, decision: &Decision) -> PathBuf {
        let subject: String = decision
            .subject()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        let stamp = decision.generated_at().format(SIGNAL_TIMESTAMP_FORMAT);
        self.dir.join(format!("{subject}_{stamp}.json"))
    }

    /// Write the signal file and return its path
    pub async fn write(&self, decision: &Decision) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(decision);
        let body = serde_json::to_string_pretty(&decision.to_signal())?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::Emit(format!("failed to write {}: {e}", path.display())))?;

        info!("Signal written to {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl SignalEmitter for JsonFileEmitter {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn emit(&self, decision: &Decision) -> Result<String> {
        let path = self.write(decision).await?;
        Ok(path.display().to_string())
    }
}
