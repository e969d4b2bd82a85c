// src/motion/planner.rs - Submit front-ends and the region solver
//
// Submissions land here in absolute millimetres. Plain lines, arcs, dwells
// and stop markers occupy a single buffer and run as queued. A jerk-limited
// line (`submit_feed`) is split into up to three velocity regions --
// head (velocity transition in), body (cruise), tail (velocity transition
// out) -- each its own buffer, so the backplanner can rewrite the regions
// of earlier moves as later ones arrive.

use crate::error::MotionError;

use super::backplan;
use super::buffer::{BufferState, MoveType};
use super::math;
use super::queue::MotorQueue;
use super::{MotionContext, PathMode, AXES, EPSILON, MIN_LINE_LENGTH};

/// Iteration bound for the head/tail split solver.
const MAX_SOLVER_ITERATIONS: usize = 100;

/// Hard ceiling on how far the planned regions may overshoot the move
/// length before we force a rescale (mm).
const REGION_SUM_TOLERANCE: f64 = 0.01;

/// Planning-side shared state: where the last planned move ends, and the
/// jerk terms every solver call needs.
#[derive(Debug)]
pub(crate) struct PlannerMaster {
    /// End position of the last planned move. Runs ahead of the tool.
    pub position: [f64; AXES],
    /// Direction of the move currently being planned.
    pub unit_vec: [f64; AXES],
    pub jerk: f64,
    pub jerk_div2: f64,
    pub jerk_cbrt: f64,
}

impl PlannerMaster {
    pub fn new(jerk: f64) -> Self {
        Self {
            position: [0.0; AXES],
            unit_vec: [0.0; AXES],
            jerk,
            jerk_div2: jerk / 2.0,
            jerk_cbrt: jerk.cbrt(),
        }
    }
}

/// Scratch plan for one jerk-limited move: requested inputs, achieved
/// velocities and the three region lengths the solver produced.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MovePlan {
    pub length: f64,
    pub initial_velocity_req: f64,
    pub target_velocity: f64,
    pub final_velocity_req: f64,

    pub initial_velocity: f64,
    pub cruise_velocity: f64,
    pub final_velocity: f64,

    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,
    pub regions: u8,
}

/// Split `plan.length` into head/body/tail regions under the jerk law,
/// degrading the requested velocities where the distance cannot support
/// them. Returns the number of non-degenerate regions (0..=3).
pub(crate) fn compute_regions(plan: &mut MovePlan, jerk: f64, jerk_cbrt: f64) -> u8 {
    plan.initial_velocity = plan.initial_velocity_req;
    plan.cruise_velocity = plan.target_velocity;
    plan.final_velocity = plan.final_velocity_req;
    plan.head_length = 0.0;
    plan.body_length = 0.0;
    plan.tail_length = 0.0;
    plan.regions = 0;

    if plan.length < MIN_LINE_LENGTH {
        return 0;
    }

    // Trial split at full requested velocities.
    let head_trial = math::transition_length(plan.initial_velocity, plan.cruise_velocity, jerk);
    let tail_trial = math::transition_length(plan.cruise_velocity, plan.final_velocity, jerk);
    let body_trial = plan.length - head_trial - tail_trial;

    if body_trial > 0.0 {
        let mut head = head_trial;
        let mut body = body_trial;
        let mut tail = tail_trial;
        // Fold sub-minimum transitions into the body.
        if head < MIN_LINE_LENGTH {
            body += head;
            head = 0.0;
        }
        if tail < MIN_LINE_LENGTH {
            body += tail;
            tail = 0.0;
        }
        plan.head_length = head;
        plan.body_length = body;
        plan.tail_length = tail;
        plan.regions = 3;
        return 3;
    }

    // Single-region cases.
    if plan.final_velocity < plan.initial_velocity && plan.length < tail_trial {
        // Not even room to brake: the whole move is tail, entered at the
        // highest velocity the length can bleed off.
        plan.tail_length = plan.length;
        plan.initial_velocity =
            math::attainable_velocity(plan.final_velocity, plan.length, jerk_cbrt);
        plan.cruise_velocity = plan.initial_velocity;
        plan.regions = 1;
        return 1;
    }
    if plan.final_velocity > plan.initial_velocity && plan.length < head_trial {
        // All head: exit at whatever the length lets us reach.
        plan.head_length = plan.length;
        plan.cruise_velocity =
            math::attainable_velocity(plan.initial_velocity, plan.length, jerk_cbrt);
        plan.final_velocity = plan.cruise_velocity;
        plan.regions = 1;
        return 1;
    }
    if (plan.final_velocity - plan.initial_velocity).abs() < EPSILON
        && (plan.final_velocity - plan.cruise_velocity).abs() < EPSILON
    {
        plan.body_length = plan.length;
        plan.regions = 1;
        return 1;
    }

    // Head and tail with no body: split the length between the two
    // transitions, lowering the cruise until both fit. The split ratio is
    // re-derived from the velocity deltas each pass.
    let mut head = head_trial;
    let mut tail = tail_trial;
    let mut previous_body = f64::MAX;
    let mut converged = false;
    for _ in 0..MAX_SOLVER_ITERATIONS {
        let delta_head = (plan.initial_velocity - plan.cruise_velocity).abs();
        let delta_tail = (plan.cruise_velocity - plan.final_velocity).abs();
        if delta_head + delta_tail < EPSILON {
            converged = true;
            break;
        }
        head = plan.length * delta_head / (delta_head + delta_tail);
        plan.cruise_velocity =
            math::attainable_velocity(plan.initial_velocity, head, jerk_cbrt)
                .min(plan.target_velocity);
        head = math::transition_length(plan.cruise_velocity, plan.initial_velocity, jerk);
        tail = math::transition_length(plan.cruise_velocity, plan.final_velocity, jerk);
        let body = plan.length - head - tail;
        if (previous_body - body).abs() < EPSILON {
            converged = true;
            break;
        }
        previous_body = body;
    }

    if !head.is_finite() || !tail.is_finite() || head < -REGION_SUM_TOLERANCE {
        tracing::warn!(
            head,
            tail,
            length = plan.length,
            "region solver produced degenerate lengths"
        );
        plan.regions = 0;
        return 0;
    }

    head = head.max(0.0);
    let overshoot = head + tail - plan.length;
    if !converged || overshoot > REGION_SUM_TOLERANCE {
        // Best effort: rescale the split to fit the move and re-derive the
        // cruise from the head side.
        tracing::warn!(
            residual = overshoot,
            length = plan.length,
            "region solver did not converge; clamping body to zero"
        );
        let scale = plan.length / (head + tail);
        head *= scale;
        plan.cruise_velocity = math::attainable_velocity(plan.initial_velocity, head, jerk_cbrt)
            .min(plan.target_velocity);
    }

    if head < MIN_LINE_LENGTH {
        head = 0.0;
    }
    let mut tail = plan.length - head;
    if tail < MIN_LINE_LENGTH {
        head = plan.length;
        tail = 0.0;
    }
    plan.head_length = head;
    plan.tail_length = tail;
    plan.regions = 2;
    2
}

/// How a freshly submitted jerk-limited move joins its predecessor.
enum JoinMode {
    /// Predecessor is an arc: enter at its exit velocity, no backplanning
    /// across it.
    AfterArc,
    /// No usable predecessor (or one the backplanner may no longer touch):
    /// enter from standstill.
    Standstill,
    /// Exact-stop path control: enter from standstill and pin the
    /// predecessor's exit to zero for good.
    ExactStop,
    /// Normal case: enter at the cornering-limited velocity and backplan.
    Corner,
}

impl<Q: MotorQueue> MotionContext<Q> {
    /// Queue a straight feed at a fixed velocity (no acceleration
    /// management). One buffer; runs as a single segment.
    pub fn submit_line(&mut self, target: [f64; AXES], minutes: f64) -> Result<(), MotionError> {
        let length = math::vector_length(&target, &self.mm.position);
        if minutes < EPSILON || length < MIN_LINE_LENGTH {
            return Err(MotionError::ZeroLengthMove { length, minutes });
        }

        let unit_vec = math::unit_vector(&target, &self.mm.position);
        let velocity = length / minutes;
        let idx = self.pool.reserve().ok_or(MotionError::BufferFull)?;
        let bf = self.pool.get_mut(idx);
        bf.target = target;
        bf.unit_vec = unit_vec;
        bf.length = length;
        bf.time = minutes;
        bf.request_velocity = velocity;
        bf.start_velocity = velocity;
        bf.end_velocity = velocity;
        self.pool.commit(MoveType::Line);
        self.mm.position = target;
        tracing::debug!(length, minutes, velocity, "queued line");
        Ok(())
    }

    /// Queue a helical arc. The caller supplies the derived geometry
    /// (start angle, radius, sweep, helix travel and plane axes); the
    /// runtime chords it into line segments.
    pub fn submit_arc(&mut self, arc: super::ArcSpec, minutes: f64) -> Result<(), MotionError> {
        if arc.axis_1 >= AXES || arc.axis_2 >= AXES || arc.axis_linear >= AXES {
            return Err(MotionError::InvalidArc);
        }
        let length = (arc.angular_travel * arc.radius).hypot(arc.linear_travel);
        if minutes < EPSILON || length < self.cfg.min_segment_len {
            return Err(MotionError::ZeroLengthMove { length, minutes });
        }

        let velocity = length / minutes;
        let idx = self.pool.reserve().ok_or(MotionError::BufferFull)?;
        let bf = self.pool.get_mut(idx);
        bf.target = arc.target;
        bf.length = length;
        bf.time = minutes;
        bf.start_velocity = velocity;
        bf.end_velocity = velocity;
        bf.request_velocity = velocity;
        bf.arc = super::buffer::ArcGeometry {
            theta: arc.theta,
            radius: arc.radius,
            angular_travel: arc.angular_travel,
            linear_travel: arc.linear_travel,
            axis_1: arc.axis_1,
            axis_2: arc.axis_2,
            axis_linear: arc.axis_linear,
        };
        self.pool.commit(MoveType::Arc);
        self.mm.position = arc.target;
        tracing::debug!(length, minutes, velocity, "queued arc");
        Ok(())
    }

    /// Queue a dwell of `seconds`.
    pub fn submit_dwell(&mut self, seconds: f64) -> Result<(), MotionError> {
        let minutes = seconds / 60.0;
        if minutes < 0.0 {
            return Err(MotionError::ZeroLengthMove {
                length: 0.0,
                minutes,
            });
        }
        let idx = self.pool.reserve().ok_or(MotionError::BufferFull)?;
        self.pool.get_mut(idx).time = minutes;
        self.pool.commit(MoveType::Dwell);
        Ok(())
    }

    /// Queue a program-start marker.
    pub fn submit_start(&mut self) -> Result<(), MotionError> {
        self.submit_marker(MoveType::Start)
    }

    /// Queue a program-stop marker.
    pub fn submit_stop(&mut self) -> Result<(), MotionError> {
        self.submit_marker(MoveType::Stop)
    }

    /// Queue a program-end marker. The marker is emitted in-band; resetting
    /// machine modes on end is the caller's job.
    pub fn submit_end(&mut self) -> Result<(), MotionError> {
        self.submit_marker(MoveType::End)
    }

    fn submit_marker(&mut self, marker: MoveType) -> Result<(), MotionError> {
        self.pool.reserve().ok_or(MotionError::BufferFull)?;
        self.pool.commit(marker);
        Ok(())
    }

    /// Queue a straight feed with full jerk-limited velocity planning.
    ///
    /// The move is solved into head/body/tail regions against a zero final
    /// velocity, then the backplanner revises earlier queued moves so the
    /// chain still brakes to zero at its end while cruising as fast as the
    /// accumulated distance allows.
    pub fn submit_feed(&mut self, target: [f64; AXES], minutes: f64) -> Result<(), MotionError> {
        let length = math::vector_length(&target, &self.mm.position);
        if minutes < EPSILON || length < MIN_LINE_LENGTH {
            return Err(MotionError::ZeroLengthMove { length, minutes });
        }
        // A planned feed needs head, body and tail slots up front.
        if !self.pool.have_free(3) {
            return Err(MotionError::BufferFull);
        }

        let target_velocity = length / minutes;
        let unit_vec = math::unit_vector(&target, &self.mm.position);

        let prev_idx = self.pool.prev_implicit();
        let prev = *self.pool.get(prev_idx);
        let prev_committed = matches!(
            prev.state,
            BufferState::Queued | BufferState::Pending | BufferState::Running
        );

        let (initial_velocity_req, join) = if prev_committed && prev.move_type == MoveType::Arc {
            // Arcs carry no unit vector, so no cornering: enter at the
            // arc's exit velocity.
            (prev.end_velocity.min(target_velocity), JoinMode::AfterArc)
        } else if !prev_committed || !prev.move_type.is_region() || !prev.replannable {
            (0.0, JoinMode::Standstill)
        } else if self.path_mode == PathMode::ExactStop {
            (0.0, JoinMode::ExactStop)
        } else {
            let factor = math::cornering_factor(&prev.unit_vec, &unit_vec);
            (
                (prev.request_velocity * factor).min(target_velocity),
                JoinMode::Corner,
            )
        };

        let mut plan = MovePlan {
            length,
            initial_velocity_req,
            target_velocity,
            final_velocity_req: 0.0,
            ..MovePlan::default()
        };
        let regions = compute_regions(&mut plan, self.mm.jerk, self.mm.jerk_cbrt);
        if regions == 0 {
            return Err(MotionError::ZeroLengthMove { length, minutes });
        }

        self.mm.unit_vec = unit_vec;
        let head_idx = self.queue_regions(&plan, target, unit_vec)?;
        self.mm.position = target;

        tracing::debug!(
            length,
            target_velocity,
            initial_velocity_req,
            cruise = plan.cruise_velocity,
            regions,
            "queued feed"
        );

        match join {
            JoinMode::AfterArc | JoinMode::Standstill => {}
            JoinMode::ExactStop => self.retire_previous_move(head_idx),
            JoinMode::Corner => backplan::backplan(self, head_idx, &plan),
        }
        Ok(())
    }

    /// Commit the three region buffers of a planned feed. Zero-length
    /// regions are queued as null placeholders so every feed occupies
    /// exactly three slots and the backplanner can walk in triples.
    fn queue_regions(
        &mut self,
        plan: &MovePlan,
        target: [f64; AXES],
        unit_vec: [f64; AXES],
    ) -> Result<usize, MotionError> {
        let start = self.mm.position;
        let mut head_target = [0.0; AXES];
        let mut body_target = [0.0; AXES];
        for i in 0..AXES {
            head_target[i] = start[i] + unit_vec[i] * plan.head_length;
            body_target[i] = head_target[i] + unit_vec[i] * plan.body_length;
        }

        let regions = [
            (
                plan.head_length,
                plan.initial_velocity,
                plan.cruise_velocity,
                plan.initial_velocity_req,
                head_target,
            ),
            (
                plan.body_length,
                plan.cruise_velocity,
                plan.cruise_velocity,
                plan.target_velocity,
                body_target,
            ),
            (
                plan.tail_length,
                plan.cruise_velocity,
                plan.final_velocity,
                // Unconstrained exit request; rewritten by the backplanner
                // once a successor pins the join velocity.
                plan.target_velocity,
                target,
            ),
        ];

        let mut head_idx = 0;
        for (i, (length, start_velocity, end_velocity, request_velocity, region_target)) in
            regions.into_iter().enumerate()
        {
            let idx = self.pool.reserve().ok_or(MotionError::BufferFull)?;
            if i == 0 {
                head_idx = idx;
            }
            let bf = self.pool.get_mut(idx);
            bf.length = length;
            bf.start_velocity = start_velocity;
            bf.end_velocity = end_velocity;
            bf.request_velocity = request_velocity;
            bf.target = region_target;
            bf.unit_vec = unit_vec;
            bf.replannable = true;
            self.pool
                .commit(MoveType::region_for(length, start_velocity, end_velocity));
        }
        Ok(head_idx)
    }

    /// Pin the previous move's exit to zero and withdraw it from
    /// replanning (exact-stop path control).
    fn retire_previous_move(&mut self, head_idx: usize) {
        let tail = self.pool.prev_of(head_idx);
        let body = self.pool.prev_of(tail);
        let head = self.pool.prev_of(body);
        for idx in [head, body, tail] {
            self.pool.get_mut(idx).replannable = false;
        }
    }

    /// Overwrite both the planning and runtime positions (coordinate
    /// offsets, homing). Only meaningful while nothing is queued.
    pub fn set_position(&mut self, position: [f64; AXES]) {
        self.mm.position = position;
        self.rt.position = position;
    }
}
