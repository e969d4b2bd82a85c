// src/motion/line_run.rs - Straight-move runtimes
//
// Cruise and plain-line moves emit a single constant-velocity segment.
// Accel and decel regions are emitted as two runs of constant-time
// segments, one per S-curve half, with the velocity sampled at each
// segment's midpoint:
//
//   accel half 1 (concave):  v = Vs + (J/2)·t²
//   accel half 2 (convex):   v = Vm + Am·t − (J/2)·t²
//   decel half 1 (convex):   v = Vs − (J/2)·t²
//   decel half 2 (concave):  v = Vm − Am·t + (J/2)·t²
//
// where Vm is the region's midpoint velocity and Am = T·J/2 the peak
// acceleration. The last segment of every region is replaced by a
// finalizing segment that lands exactly on the queued target, so floating
// point error cannot accumulate across a long program.

use crate::error::RunStatus;

use super::buffer::MoveState;
use super::math;
use super::queue::MotorQueue;
use super::{MotionContext, AXES, EPSILON, MIN_LINE_LENGTH};

impl<Q: MotorQueue> MotionContext<Q> {
    /// Acceleration region: concave then convex S-curve half.
    pub(crate) fn run_accel(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        if self.pool.get(idx).move_state == MoveState::New {
            self.pool.get_mut(idx).replannable = false;
            if !self.setup_scurve(idx) {
                return RunStatus::Done;
            }
            self.pool.get_mut(idx).move_state = MoveState::RunningHalf1;
        }

        let state = self.pool.get(idx).move_state;
        match state {
            MoveState::RunningHalf1 => {
                let t = self.rt.elapsed_time;
                let v = self.rt.start_velocity + self.mm.jerk_div2 * t * t;
                self.emit_segment(v);
                if self.rt.segment_count == 0 {
                    self.begin_second_half(idx);
                }
                RunStatus::Again
            }
            MoveState::RunningHalf2 => {
                if self.rt.segment_count <= 1 {
                    return self.finalize_region(idx);
                }
                let t = self.rt.elapsed_time;
                let v = self.rt.midpoint_velocity + t * self.rt.midpoint_acceleration
                    - self.mm.jerk_div2 * t * t;
                self.emit_segment(v);
                RunStatus::Again
            }
            _ => RunStatus::Done,
        }
    }

    /// Deceleration region: same structure as accel with the curvature
    /// signs inverted.
    pub(crate) fn run_decel(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        if self.pool.get(idx).move_state == MoveState::New {
            self.pool.get_mut(idx).replannable = false;
            if !self.setup_scurve(idx) {
                return RunStatus::Done;
            }
            self.pool.get_mut(idx).move_state = MoveState::RunningHalf1;
        }

        let state = self.pool.get(idx).move_state;
        match state {
            MoveState::RunningHalf1 => {
                let t = self.rt.elapsed_time;
                let v = self.rt.start_velocity - self.mm.jerk_div2 * t * t;
                self.emit_segment(v);
                if self.rt.segment_count == 0 {
                    self.begin_second_half(idx);
                }
                RunStatus::Again
            }
            MoveState::RunningHalf2 => {
                if self.rt.segment_count <= 1 {
                    return self.finalize_region(idx);
                }
                let t = self.rt.elapsed_time;
                let v = self.rt.midpoint_velocity - t * self.rt.midpoint_acceleration
                    + self.mm.jerk_div2 * t * t;
                self.emit_segment(v);
                RunStatus::Again
            }
            _ => RunStatus::Done,
        }
    }

    /// Cruise region: one segment at the region velocity.
    pub(crate) fn run_cruise(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        self.pool.get_mut(idx).replannable = false;
        let bf = *self.pool.get(idx);
        if bf.length < MIN_LINE_LENGTH || bf.end_velocity < EPSILON {
            self.rt.position = bf.target;
            return RunStatus::Done;
        }
        let minutes = bf.length / bf.end_velocity;
        self.emit_to_target(bf.target, minutes);
        RunStatus::Done
    }

    /// Plain line move: one segment over the submitted duration.
    pub(crate) fn run_line(&mut self, idx: usize) -> RunStatus {
        if self.pool.get(idx).move_state == MoveState::End {
            return RunStatus::Done;
        }
        if !self.queue.ready() {
            return RunStatus::Again;
        }
        self.pool.get_mut(idx).replannable = false;
        let bf = *self.pool.get(idx);
        if bf.length < MIN_LINE_LENGTH || bf.time < EPSILON {
            self.rt.position = bf.target;
            return RunStatus::Done;
        }
        self.emit_to_target(bf.target, bf.time);
        RunStatus::Done
    }

    /// Compute segmenting for an S-curve region. Returns false when the
    /// region is too short or slow to emit anything; the caller completes
    /// the region and the position snaps to its target.
    fn setup_scurve(&mut self, idx: usize) -> bool {
        let bf = *self.pool.get(idx);
        let midpoint_velocity = (bf.start_velocity + bf.end_velocity) / 2.0;
        if bf.length < MIN_LINE_LENGTH || midpoint_velocity < EPSILON {
            self.rt.position = bf.target;
            return false;
        }
        let time = bf.length / midpoint_velocity;
        let total_segments = (time / self.cfg.min_segment_time).round();
        let halves = (total_segments / 2.0).round();
        if halves < 1.0 {
            // Shorter than one emittable segment: drop it.
            self.rt.position = bf.target;
            return false;
        }

        self.rt.length = bf.length;
        self.rt.target = bf.target;
        self.rt.unit_vec = bf.unit_vec;
        self.rt.start_velocity = bf.start_velocity;
        self.rt.end_velocity = bf.end_velocity;
        self.rt.midpoint_velocity = midpoint_velocity;
        self.rt.midpoint_acceleration = time * self.mm.jerk_div2;
        self.rt.time = time;
        self.rt.segments = halves;
        self.rt.segment_count = halves as u32;
        self.rt.segment_time = time / (2.0 * halves);
        self.rt.elapsed_time = self.rt.segment_time / 2.0;
        tracing::trace!(
            length = self.rt.length,
            time = self.rt.time,
            halves,
            "s-curve region segmented"
        );
        true
    }

    fn begin_second_half(&mut self, idx: usize) {
        self.rt.segment_count = self.rt.segments as u32;
        self.rt.elapsed_time = self.rt.segment_time / 2.0;
        self.pool.get_mut(idx).move_state = MoveState::RunningHalf2;
    }

    /// Emit one constant-time segment at `velocity` along the region's
    /// unit vector and advance the runtime position.
    pub(crate) fn emit_segment(&mut self, velocity: f64) {
        let dt = self.rt.segment_time;
        let mut travel = [0.0; AXES];
        let mut new_position = [0.0; AXES];
        for i in 0..AXES {
            travel[i] = self.rt.unit_vec[i] * velocity * dt;
            new_position[i] = self.rt.position[i] + travel[i];
        }
        let microseconds = math::usec(dt);
        let steps = self.kin.to_steps(&travel, microseconds);
        self.queue.queue_line(steps, microseconds);
        self.rt.position = new_position;
        self.rt.elapsed_time += dt;
        self.rt.segment_count -= 1;
        self.rt.segment_velocity = velocity;
        tracing::trace!(velocity, microseconds, "segment emitted");
    }

    /// Replace the region's last segment with one that lands exactly on
    /// the queued target.
    fn finalize_region(&mut self, idx: usize) -> RunStatus {
        let bf = *self.pool.get(idx);
        let residual = math::vector_length(&bf.target, &self.rt.position);
        tracing::trace!(
            residual,
            last_velocity = self.rt.segment_velocity,
            "finalizing region"
        );
        if residual > EPSILON && bf.end_velocity > EPSILON {
            self.emit_to_target(bf.target, residual / bf.end_velocity);
        } else {
            // Too slow or short to time a segment; snap and move on.
            self.rt.position = bf.target;
        }
        RunStatus::Done
    }

    /// Emit a single segment from the runtime position to `target` over
    /// `minutes` and land there.
    fn emit_to_target(&mut self, target: [f64; AXES], minutes: f64) {
        let mut travel = [0.0; AXES];
        for i in 0..AXES {
            travel[i] = target[i] - self.rt.position[i];
        }
        let microseconds = math::usec(minutes);
        let steps = self.kin.to_steps(&travel, microseconds);
        self.queue.queue_line(steps, microseconds);
        self.rt.position = target;
    }
}
