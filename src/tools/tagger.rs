use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Configuration for the TreeTagger subprocess
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    /// Tagger binary (from TREETAGGER_BIN, default "tree-tagger" on PATH)
    pub binary: PathBuf,
    /// Parameter file of the language model (from TREETAGGER_PARAMS)
    pub parameters: PathBuf,
    /// Upper bound for one batch run
    pub timeout_secs: u64,
}

impl TaggerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let parameters = std::env::var("TREETAGGER_PARAMS")
            .context("TREETAGGER_PARAMS environment variable not set")?;
        let binary = std::env::var("TREETAGGER_BIN").unwrap_or_else(|_| "tree-tagger".to_string());

        Ok(Self::new(binary, parameters))
    }

    pub fn new(binary: impl Into<PathBuf>, parameters: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            parameters: parameters.into(),
            timeout_secs: 600,
        }
    }
}

/// Batch tagger contract.
///
/// `job` holds one token per line with `<s_UID>` marker lines between
/// utterances. Implementations write `form\ttag\tlemma` lines to `output`
/// and echo every marker line unchanged.
#[async_trait]
pub trait TaggerBackend: Send + Sync {
    async fn tag(&self, job: &Path, output: &Path) -> Result<()>;

    /// Human-readable backend name
    fn name(&self) -> &str;
}

/// TreeTagger invoked as `<bin> <params> -token -lemma -sgml`
pub struct TreeTagger {
    config: TaggerConfig,
}

impl TreeTagger {
    pub fn new(config: TaggerConfig) -> Self {
        Self { config }
    }

    fn check_files(&self) -> Result<()> {
        if !self.config.parameters.exists() {
            anyhow::bail!(
                "TreeTagger parameter file not found: {:?}",
                self.config.parameters
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TaggerBackend for TreeTagger {
    async fn tag(&self, job: &Path, output: &Path) -> Result<()> {
        self.check_files()?;

        let stdin = std::fs::File::open(job)
            .with_context(|| format!("Failed to open tagger job: {:?}", job))?;
        let stdout = std::fs::File::create(output)
            .with_context(|| format!("Failed to create tagger output: {:?}", output))?;

        debug!(
            "Running {:?} {:?} -token -lemma -sgml",
            self.config.binary, self.config.parameters
        );
        let run = Command::new(&self.config.binary)
            .arg(&self.config.parameters)
            .args(["-token", "-lemma", "-sgml"])
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), run)
            .await
            .with_context(|| {
                format!("TreeTagger timed out after {}s", self.config.timeout_secs)
            })?
            .with_context(|| format!("Failed to spawn {:?}", self.config.binary))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!(
                "TreeTagger exited with {}: {}",
                result.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "treetagger"
    }
}
