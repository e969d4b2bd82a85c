// src/motion/queue.rs - Downstream interfaces
//
// The planner never talks to hardware directly. It emits into a MotorQueue
// (typically backed by an ISR-driven stepper queue) and converts Cartesian
// travel through a Kinematics implementation. Both are traits so hosts,
// simulators and tests can supply their own.

use super::buffer::MoveType;
use super::MOTORS;

/// Downstream step queue. `ready` is the planner's only backpressure
/// signal: every run function checks it before emitting and suspends with
/// EAGAIN when the queue is full.
pub trait MotorQueue {
    fn ready(&self) -> bool;

    /// Emit one constant-time segment: per-motor step counts over
    /// `microseconds`. Fractional steps are the downstream DDA's problem.
    fn queue_line(&mut self, steps: [f64; MOTORS], microseconds: u32);

    fn queue_dwell(&mut self, microseconds: u32);

    /// Emit a start/stop/end marker in-band with the step stream.
    fn queue_stops(&mut self, marker: MoveType);
}

/// Low-level stepper control for the ISR-safe asynchronous commands. These
/// bypass the planner queue entirely.
pub trait StepperControl {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_busy(&self) -> bool;
}

/// Immediately halt step generation. Safe to call from interrupt context;
/// does not touch the buffer pool.
pub fn async_stop<S: StepperControl>(stepper: &mut S) {
    stepper.stop();
}

/// Immediately resume step generation from where it was halted.
pub fn async_start<S: StepperControl>(stepper: &mut S) {
    stepper.start();
}

/// Halt step generation for good; queued work is abandoned until the
/// owning context is cleared.
pub fn async_end<S: StepperControl>(stepper: &mut S) {
    stepper.stop();
}

/// One entry recorded by [`RecordingQueue`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueueEntry {
    Line {
        steps: [f64; MOTORS],
        microseconds: u32,
    },
    Dwell {
        microseconds: u32,
    },
    Stops(MoveType),
}

/// In-memory motor queue for tests and the simulation harness. Records
/// every emission; `ready` can be toggled to exercise backpressure.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pub entries: Vec<QueueEntry>,
    pub blocked: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total microseconds across all recorded segments and dwells.
    pub fn total_microseconds(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e {
                QueueEntry::Line { microseconds, .. } => *microseconds as u64,
                QueueEntry::Dwell { microseconds } => *microseconds as u64,
                QueueEntry::Stops(_) => 0,
            })
            .sum()
    }

    /// Summed per-motor steps across all recorded line segments.
    pub fn total_steps(&self) -> [f64; MOTORS] {
        let mut total = [0.0; MOTORS];
        for entry in &self.entries {
            if let QueueEntry::Line { steps, .. } = entry {
                for i in 0..MOTORS {
                    total[i] += steps[i];
                }
            }
        }
        total
    }
}

impl MotorQueue for RecordingQueue {
    fn ready(&self) -> bool {
        !self.blocked
    }

    fn queue_line(&mut self, steps: [f64; MOTORS], microseconds: u32) {
        self.entries.push(QueueEntry::Line {
            steps,
            microseconds,
        });
    }

    fn queue_dwell(&mut self, microseconds: u32) {
        self.entries.push(QueueEntry::Dwell { microseconds });
    }

    fn queue_stops(&mut self, marker: MoveType) {
        self.entries.push(QueueEntry::Stops(marker));
    }
}
