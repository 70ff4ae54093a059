//! Error types for trajectory loading and playback sessions.

use std::path::PathBuf;

use thiserror::Error;

use crate::limb::LimbGroup;

/// Errors that abort a playback session.
///
/// Safety-bound violations are not errors: they are clamped and counted
/// by [`SafetyEnvelope`](crate::safety::SafetyEnvelope).
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The trajectory file could not be opened or read.
    #[error("cannot read trajectory file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A field was missing or was not a floating-point number.
    #[error("{}:{line}: column {column}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// 1-based whitespace-separated field number.
        column: usize,
        reason: String,
    },

    /// The trajectory file has no lines.
    #[error("trajectory file {} is empty", path.display())]
    EmptyFile { path: PathBuf },

    /// A composition was asked for with a zero-tick trajectory.
    #[error("cannot compose from an empty trajectory")]
    EmptyTrajectory,

    /// The requested starting tick is outside `[0, tick_count)`.
    #[error("starting tick {start} is past the end of the trajectory (must be smaller than {tick_count})")]
    Range { start: usize, tick_count: usize },

    /// A driver for a limb group failed fatally.
    #[error("{group}: {source}")]
    Driver {
        group: LimbGroup,
        #[source]
        source: DriverError,
    },

    /// Encoder reads kept failing until the retry budget ran out.
    #[error("{group}: encoders unreadable after {attempts} attempts: {last}")]
    EncoderTimeout {
        group: LimbGroup,
        attempts: u32,
        last: EncoderReadError,
    },

    /// A driver reported a joint count that does not match the limb group.
    #[error("{group}: driver reports {found} joints, expected {expected}")]
    JointCount {
        group: LimbGroup,
        expected: usize,
        found: usize,
    },
}

impl PlayerError {
    /// Create a Parse error.
    pub fn parse(
        path: impl Into<PathBuf>,
        line: usize,
        column: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            column,
            reason: reason.into(),
        }
    }

    /// Create a Driver error for `group`.
    pub fn driver(group: LimbGroup, source: DriverError) -> Self {
        Self::Driver { group, source }
    }
}

/// Fatal errors reported by a [`MotionDriver`](crate::driver::MotionDriver).
#[derive(Debug, Error)]
pub enum DriverError {
    /// Connecting to the remote part failed.
    #[error("cannot connect to remote part {0}")]
    Connect(String),

    /// The device opened but its control interfaces are unavailable.
    #[error("cannot acquire control interfaces: {0}")]
    Interface(String),

    /// A position command was rejected.
    #[error("position command rejected: {0}")]
    Rejected(String),

    /// The handle was used after it was closed.
    #[error("handle already closed")]
    Closed,
}

/// A failed encoder read. Retried by the controller up to its budget.
#[derive(Debug, Clone, Error)]
#[error("encoder read failed: {0}")]
pub struct EncoderReadError(pub String);
