//! Common error types used throughout m3u8dl.
//!
//! Errors fall in two groups: failures local to a single job (the queue
//! logs them and moves on) and failures that end the whole run. See
//! [`Error::is_job_local`].

use std::path::PathBuf;

use crate::report::FailureReport;

/// Common error type for m3u8dl.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The queue file could not be read.
    #[error("failed to read queue file {}: {source}", path.display())]
    QueueRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The queue file could not be rewritten after a completed job.
    #[error("failed to rewrite queue file {}: {source}", path.display())]
    QueueWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transcoder binary could not be launched.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The transcoder exited with a nonzero status.
    #[error("transcode failed with exit code {}", .0.code)]
    Transcode(FailureReport),

    /// Reading the transcoder's diagnostic stream failed.
    #[error("failed to read transcoder output: {source}")]
    Stream {
        #[source]
        source: std::io::Error,
    },

    /// The host program is shutting down; the running job was killed.
    #[error("interrupted")]
    Interrupted,

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new QueueRead error.
    pub fn queue_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::QueueRead {
            path: path.into(),
            source,
        }
    }

    /// Create a new QueueWrite error.
    pub fn queue_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::QueueWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a new Spawn error.
    pub fn spawn<S: Into<String>>(program: S, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Whether this failure only concerns the job that produced it.
    ///
    /// Job-local failures leave the URL queued and the run continues with
    /// the next entry. Anything else aborts the run.
    pub fn is_job_local(&self) -> bool {
        matches!(
            self,
            Error::Spawn { .. } | Error::Transcode(_) | Error::Stream { .. }
        )
    }

    /// The text printed to the user when a job fails.
    ///
    /// Transcoder failures render the full [`FailureReport`]; everything else
    /// falls back to the `Display` message.
    pub fn report(&self) -> String {
        match self {
            Error::Transcode(report) => report.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
