// src/motion/arc_run.rs - Arc, dwell and stop-marker runtimes
//
// Arcs are chord-approximated: the runtime walks the circle in fixed
// angular increments, accumulating helix travel, and emits each chord as
// one constant-time line segment. Dwells and stop markers forward a single
// entry to the motor queue. These move types bypass region planning
// entirely.

use crate::error::RunStatus;

use super::buffer::MoveState;
use super::math;
use super::queue::MotorQueue;
use super::{MotionContext, AXES, EPSILON};

impl<Q: MotorQueue> MotionContext<Q> {
    pub(crate) fn run_arc(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }

        if self.pool.get(idx).move_state == MoveState::New {
            self.pool.get_mut(idx).replannable = false;
            let bf = *self.pool.get(idx);
            if bf.length < self.cfg.min_segment_len || bf.time < EPSILON {
                self.rt.position = bf.target;
                return RunStatus::Done;
            }
            let segments = (bf.length / self.cfg.min_segment_len).ceil().max(1.0);
            self.rt.segments = segments;
            self.rt.segment_count = segments as u32;
            self.rt.segment_time = bf.time / segments;
            self.rt.segment_theta = bf.arc.angular_travel / segments;
            self.rt.segment_length = bf.arc.linear_travel / segments;
            self.rt.theta = bf.arc.theta;
            // Circle centre, reconstructed from the start point and angle.
            self.rt.center_1 =
                self.rt.position[bf.arc.axis_1] - bf.arc.theta.sin() * bf.arc.radius;
            self.rt.center_2 =
                self.rt.position[bf.arc.axis_2] - bf.arc.theta.cos() * bf.arc.radius;
            self.rt.target = bf.target;
            self.rt.arc = bf.arc;
            self.pool.get_mut(idx).move_state = MoveState::RunningHalf1;
        }

        // One chord per poll.
        let arc = self.rt.arc;
        self.rt.theta += self.rt.segment_theta;
        let mut target = self.rt.position;
        target[arc.axis_1] = self.rt.center_1 + self.rt.theta.sin() * arc.radius;
        target[arc.axis_2] = self.rt.center_2 + self.rt.theta.cos() * arc.radius;
        target[arc.axis_linear] = self.rt.position[arc.axis_linear] + self.rt.segment_length;
        if self.rt.segment_count == 1 {
            // Land the final chord exactly on the queued target.
            target = self.rt.target;
        }

        let mut travel = [0.0; AXES];
        for i in 0..AXES {
            travel[i] = target[i] - self.rt.position[i];
        }
        let microseconds = math::usec(self.rt.segment_time);
        let steps = self.kin.to_steps(&travel, microseconds);
        self.queue.queue_line(steps, microseconds);
        self.rt.position = target;
        self.rt.segment_count -= 1;

        if self.rt.segment_count == 0 {
            RunStatus::Done
        } else {
            RunStatus::Again
        }
    }

    pub(crate) fn run_dwell(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        let minutes = self.pool.get(idx).time;
        self.queue.queue_dwell(math::usec(minutes));
        RunStatus::Done
    }

    /// Start/stop/end markers travel the queue in-band so the stepper
    /// observes them in stream order.
    pub(crate) fn run_stops(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        let marker = self.pool.get(idx).move_type;
        self.queue.queue_stops(marker);
        RunStatus::Done
    }

    /// Zero-length region placeholder: nothing to emit.
    pub(crate) fn run_null(&mut self, idx: usize) -> RunStatus {
        self.pool.get_mut(idx).replannable = false;
        RunStatus::Done
    }
}
