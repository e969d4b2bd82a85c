// src/motion/backplan.rs - Multi-move lookback replanning
//
// Each newly planned feed ends at zero velocity because nothing follows it
// yet. When the next feed arrives, the chain of queued moves can afford
// higher join velocities: pass 1 walks backwards capping every entry
// velocity at the speed a full jerk-limited brake over the remaining chain
// allows, pass 2 re-solves each predecessor against its successor's entry
// and rewrites its region buffers. A move whose achieved velocities match
// its requests is planned as well as it ever will be and retires from
// further replanning.

use super::buffer::{BufferPool, BufferState, MoveType};
use super::math;
use super::planner::{compute_regions, MovePlan};
use super::queue::MotorQueue;
use super::{MotionContext, AXES, EPSILON};

/// The predecessor move's (head, body, tail) buffer indices, if that move
/// is still fully open to replanning.
fn prev_replannable_triple(pool: &BufferPool, head_idx: usize) -> Option<(usize, usize, usize)> {
    let tail = pool.prev_of(head_idx);
    let body = pool.prev_of(tail);
    let head = pool.prev_of(body);
    for idx in [head, body, tail] {
        let bf = pool.get(idx);
        let committed = matches!(bf.state, BufferState::Queued | BufferState::Pending);
        if !committed || !bf.move_type.is_region() || !bf.replannable {
            return None;
        }
    }
    Some((head, body, tail))
}

/// Revise queued moves behind the just-planned feed whose head sits at
/// `head_idx`. `plan` is that feed's solved plan.
pub(crate) fn backplan<Q: MotorQueue>(
    ctx: &mut MotionContext<Q>,
    head_idx: usize,
    plan: &MovePlan,
) {
    let max_depth = ctx.cfg.max_lookback_depth;

    // Pass 1: braking-velocity caps. Walking back from the new move, the
    // entry of each predecessor may not exceed the velocity from which the
    // whole downstream chain can still brake to zero.
    let mut chain_length = plan.length;
    let mut at = head_idx;
    let mut depth = 0;
    while let Some((p_head, p_body, p_tail)) = prev_replannable_triple(&ctx.pool, at) {
        if depth >= max_depth {
            tracing::warn!(depth, "lookback depth exceeded; leaving chain replannable");
            break;
        }
        chain_length += ctx.pool.get(p_head).length
            + ctx.pool.get(p_body).length
            + ctx.pool.get(p_tail).length;
        let cap = math::attainable_velocity(0.0, chain_length, ctx.mm.jerk_cbrt);
        let head_buffer = ctx.pool.get_mut(p_head);
        if cap < head_buffer.request_velocity {
            head_buffer.request_velocity = cap;
        }
        at = p_head;
        depth += 1;
    }

    // Pass 2: re-solve each predecessor against the entry velocity its
    // successor just settled on, rewriting the three region buffers.
    let mut downstream_entry_req = plan.initial_velocity_req;
    let mut downstream_entry = plan.initial_velocity;
    let mut at = head_idx;
    let mut depth = 0;
    while let Some((p_head, p_body, p_tail)) = prev_replannable_triple(&ctx.pool, at) {
        if depth >= max_depth {
            tracing::warn!(depth, "lookback depth exceeded during recompute");
            break;
        }

        let head_buffer = *ctx.pool.get(p_head);
        let body_buffer = *ctx.pool.get(p_body);
        let tail_buffer = *ctx.pool.get(p_tail);
        let length = head_buffer.length + body_buffer.length + tail_buffer.length;

        let mut p = MovePlan {
            length,
            initial_velocity_req: head_buffer.request_velocity,
            target_velocity: body_buffer.request_velocity,
            final_velocity_req: downstream_entry,
            ..MovePlan::default()
        };
        if compute_regions(&mut p, ctx.mm.jerk, ctx.mm.jerk_cbrt) == 0 {
            tracing::warn!(length, "replanned move degenerated; stopping lookback");
            break;
        }

        // Region geometry is re-derived from the move's fixed endpoint.
        let unit_vec = tail_buffer.unit_vec;
        let end = tail_buffer.target;
        let mut start = [0.0; AXES];
        let mut head_target = [0.0; AXES];
        let mut body_target = [0.0; AXES];
        for i in 0..AXES {
            start[i] = end[i] - unit_vec[i] * length;
            head_target[i] = start[i] + unit_vec[i] * p.head_length;
            body_target[i] = head_target[i] + unit_vec[i] * p.body_length;
        }

        let bf = ctx.pool.get_mut(p_head);
        bf.length = p.head_length;
        bf.start_velocity = p.initial_velocity;
        bf.end_velocity = p.cruise_velocity;
        bf.target = head_target;
        bf.move_type = MoveType::region_for(p.head_length, p.initial_velocity, p.cruise_velocity);

        let bf = ctx.pool.get_mut(p_body);
        bf.length = p.body_length;
        bf.start_velocity = p.cruise_velocity;
        bf.end_velocity = p.cruise_velocity;
        bf.target = body_target;
        bf.move_type = MoveType::region_for(p.body_length, p.cruise_velocity, p.cruise_velocity);

        let bf = ctx.pool.get_mut(p_tail);
        bf.length = p.tail_length;
        bf.start_velocity = p.cruise_velocity;
        bf.end_velocity = p.final_velocity;
        bf.request_velocity = downstream_entry_req;
        bf.move_type = MoveType::region_for(p.tail_length, p.cruise_velocity, p.final_velocity);

        // Everything this move asked for, it got: no future submit can
        // improve it, so retire it from replanning.
        let optimal = (p.initial_velocity - p.initial_velocity_req).abs() < EPSILON
            && (p.cruise_velocity - p.target_velocity).abs() < EPSILON
            && (p.final_velocity - downstream_entry_req).abs() < EPSILON;
        if optimal {
            for idx in [p_head, p_body, p_tail] {
                ctx.pool.get_mut(idx).replannable = false;
            }
            tracing::trace!(
                cruise = p.cruise_velocity,
                exit = p.final_velocity,
                "move optimally planned; retired"
            );
            return;
        }

        downstream_entry_req = p.initial_velocity_req;
        downstream_entry = p.initial_velocity;
        at = p_head;
        depth += 1;
    }
}
