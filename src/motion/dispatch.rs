// src/motion/dispatch.rs - Cooperative move dispatcher
//
// `step` is the single runtime entry point, called repeatedly from the
// host's main loop. It picks the oldest committed buffer, routes it to the
// run function for its move type, and releases the buffer once the run
// function reports completion. Run functions suspend with `Again` whenever
// the motor queue is full or more segments remain, so no call ever blocks.

use crate::error::{RunStatus, StepStatus};

use super::buffer::{ArcGeometry, MoveState, MoveType};
use super::queue::MotorQueue;
use super::{MotionContext, AXES};

/// Runtime-side scratch state, exclusive to the dispatcher. Run functions
/// copy what they need out of the buffer on first entry and work from here
/// between polls.
#[derive(Debug, Default)]
pub(crate) struct RuntimeState {
    /// Position of the emitted segment stream.
    pub position: [f64; AXES],
    pub target: [f64; AXES],
    pub unit_vec: [f64; AXES],
    pub length: f64,
    /// Total region time in minutes.
    pub time: f64,
    /// Time into the current S-curve half, sampled mid-segment.
    pub elapsed_time: f64,

    pub start_velocity: f64,
    pub end_velocity: f64,
    pub midpoint_velocity: f64,
    pub midpoint_acceleration: f64,

    /// Segments per S-curve half (also the arc's total chord count).
    pub segments: f64,
    pub segment_count: u32,
    pub segment_time: f64,
    pub segment_velocity: f64,
    /// Helix travel per arc chord.
    pub segment_length: f64,
    pub segment_theta: f64,
    /// Current arc angle.
    pub theta: f64,
    pub center_1: f64,
    pub center_2: f64,
    pub arc: ArcGeometry,

    pub run_flag: bool,
}

impl<Q: MotorQueue> MotionContext<Q> {
    /// Run one cooperative slice of the oldest queued move.
    ///
    /// Returns [`StepStatus::Idle`] when nothing is queued,
    /// [`StepStatus::Again`] while the current move needs further polls,
    /// and [`StepStatus::Done`] when a move completed and its buffer was
    /// released.
    pub fn step(&mut self) -> StepStatus {
        let Some(idx) = self.pool.run_head() else {
            return StepStatus::Idle;
        };
        if self.pool.get(idx).move_state == MoveState::New {
            self.rt.run_flag = true;
        }

        let move_type = self.pool.get(idx).move_type;
        let status = match move_type {
            MoveType::Null => self.run_null(idx),
            MoveType::Accel => self.run_accel(idx),
            MoveType::Cruise => self.run_cruise(idx),
            MoveType::Decel => self.run_decel(idx),
            MoveType::Line => self.run_line(idx),
            MoveType::Arc => self.run_arc(idx),
            MoveType::Dwell => self.run_dwell(idx),
            MoveType::Start | MoveType::Stop | MoveType::End => self.run_stops(idx),
        };

        match status {
            RunStatus::Again => StepStatus::Again,
            RunStatus::Done => {
                self.rt.run_flag = false;
                self.pool.finalize_run();
                StepStatus::Done
            }
        }
    }

    /// Drive the queue until it drains. Convenience for hosts without
    /// their own loop (simulation, tests); real hosts interleave `step`
    /// with submissions.
    pub fn run_to_idle(&mut self) -> usize {
        let mut completed = 0;
        loop {
            match self.step() {
                StepStatus::Idle => return completed,
                StepStatus::Again => {
                    if !self.queue.ready() {
                        // Nothing will progress until the caller drains the
                        // motor queue.
                        return completed;
                    }
                }
                StepStatus::Done => completed += 1,
            }
        }
    }
}
