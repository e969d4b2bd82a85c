// src/error.rs
use thiserror::Error;

/// Errors surfaced by the submit-side APIs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// The requested move is below the minimum plannable length, or its
    /// duration is too short to resolve.
    #[error("zero length move rejected ({length:.4} mm over {minutes:.6} min)")]
    ZeroLengthMove { length: f64, minutes: f64 },

    /// The buffer pool could not supply the slots a submit needs. Callers
    /// are expected to gate submissions on `MotionContext::can_accept`;
    /// hitting this mid-submit is a protocol violation, not backpressure.
    #[error("motion buffer pool exhausted")]
    BufferFull,

    /// Arc plane or linear axis index outside the machine's axis range.
    #[error("arc axis selection out of range")]
    InvalidArc,
}

/// Outcome of one cooperative dispatcher step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Nothing queued to run.
    Idle,
    /// The current move made progress (or is waiting on the motor queue)
    /// and needs further `step` calls.
    Again,
    /// The current move finished and its buffer was released.
    Done,
}

/// Internal status returned by the per-move-type run functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStatus {
    Again,
    Done,
}
