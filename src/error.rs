use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal pipeline failures. Recoverable alignment gaps are reported through
/// the stage results instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "missing header before utterance at line {line}: {text}{}",
        artifact_note(.artifact.as_deref())
    )]
    MissingHeader {
        line: usize,
        text: String,
        /// Block content written for inspection, when an artifact location is configured
        artifact: Option<PathBuf>,
    },
    #[error("tagger failed: {0}")]
    Tagger(String),
    #[error(
        "parser rejected utterances {first_uid}..{last_uid} ({utterances} utterances); content written to {}: {reason}",
        .artifact.display()
    )]
    UnparsableChunk {
        artifact: PathBuf,
        first_uid: String,
        last_uid: String,
        utterances: usize,
        reason: String,
    },
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn artifact_note(artifact: Option<&Path>) -> String {
    artifact
        .map(|p| format!("; content written to {}", p.display()))
        .unwrap_or_default()
}

pub type PipelineResult<T> = Result<T, PipelineError>;
