//! The closed set of error kinds a stage can raise. `OverflowDrain` is
//! deliberately absent — it is the queue's policy, not a fault, and is
//! counted via `BoundedQueue::overflow_count` instead.

use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    /// Audio source could not be opened, or the requested sample rate /
    /// device is unsupported. Unrecoverable: the caller should flip
    /// `proceed` and shut the pipeline down.
    DeviceInitFailure(String),
    /// An FFT result and the selector's expected bin count diverge.
    /// Indicates a programming error; unrecoverable.
    FrameSizeMismatch { expected: usize, actual: usize },
    /// `SampleSource::poll` returned fewer samples than requested.
    /// Recoverable: the caller logs and skips the tick.
    TransientInputUnderflow { expected: usize, actual: usize },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceInitFailure(reason) => {
                write!(f, "audio device initialization failed: {reason}")
            }
            PipelineError::FrameSizeMismatch { expected, actual } => write!(
                f,
                "frame size mismatch: expected {expected} samples, got {actual}"
            ),
            PipelineError::TransientInputUnderflow { expected, actual } => write!(
                f,
                "input underflow: expected {expected} samples, got {actual}"
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_expected_and_actual() {
        let err = PipelineError::FrameSizeMismatch {
            expected: 4096,
            actual: 2048,
        };
        let message = err.to_string();
        assert!(message.contains("4096"));
        assert!(message.contains("2048"));
    }
}
