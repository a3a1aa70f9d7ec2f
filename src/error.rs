// Error types for the upload pipeline and the final submission.
//
// Every pipeline step returns a `StepError`. The orchestrator wraps it in a
// `FileUploadError` that records which file and which stage failed, so the
// caller can report something more useful than a bare HTTP message.

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a per-file failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    RequestBucket,
    UploadToStorage,
    ConfirmUpload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::RequestBucket => "request upload bucket",
            Stage::UploadToStorage => "upload to storage",
            Stage::ConfirmUpload => "confirm upload",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a `StepError`, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAFile,
    Io,
    Transport,
    Protocol,
}

/// Failure of a single pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::NotFound(_) => ErrorKind::NotFound,
            StepError::NotAFile(_) => ErrorKind::NotAFile,
            StepError::Io(_) => ErrorKind::Io,
            StepError::Transport(_) | StepError::Status { .. } => ErrorKind::Transport,
            StepError::Protocol(_) => ErrorKind::Protocol,
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        StepError::Protocol(msg.into())
    }
}

/// A per-file pipeline failure: which file, at which stage, and why.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed for {}: {source}", .path.display())]
pub struct FileUploadError {
    pub path: PathBuf,
    pub stage: Stage,
    pub source: StepError,
}

impl FileUploadError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Failure of the single finalizing submission request.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("no files to submit")]
    Empty,

    #[error("submission request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("submission rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Terminal failure of an upload-and-submit run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Upload(#[from] FileUploadError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}
