// Planning-side behaviour: region splitting, cornering, backplanning and
// path-mode handling, observed through committed buffer snapshots.

use ferromill::motion::math::{attainable_velocity, transition_length};
use ferromill::motion::{
    MotionContext, MoveBuffer, MoveType, RecordingQueue, AXES, EPSILON, MIN_LINE_LENGTH,
};
use ferromill::{ArcSpec, Config, MotionError, PathMode};

fn context_with_jerk(jerk: f64) -> MotionContext<RecordingQueue> {
    let mut config = Config::default();
    config.planner.linear_jerk_max = jerk;
    MotionContext::new(&config, RecordingQueue::new())
}

/// Committed buffers grouped into (head, body, tail) triples.
fn triples(buffers: &[MoveBuffer]) -> Vec<&[MoveBuffer]> {
    assert_eq!(buffers.len() % 3, 0, "feeds occupy exactly three buffers");
    buffers.chunks(3).collect()
}

fn assert_move_invariants(triple: &[MoveBuffer], move_length: f64) {
    let [head, body, tail] = triple else {
        panic!("expected a three-buffer move");
    };
    let sum = head.length + body.length + tail.length;
    assert!(
        (sum - move_length).abs() < 0.01,
        "regions sum {sum}, move length {move_length}"
    );
    for bf in triple {
        assert!(bf.length >= MIN_LINE_LENGTH || bf.move_type == MoveType::Null);
        assert!(bf.start_velocity >= 0.0 && bf.end_velocity >= 0.0);
        match bf.move_type {
            MoveType::Cruise => {
                assert!((bf.start_velocity - bf.end_velocity).abs() < EPSILON)
            }
            MoveType::Accel => assert!(bf.start_velocity < bf.end_velocity),
            MoveType::Decel => assert!(bf.start_velocity > bf.end_velocity),
            _ => {}
        }
    }
    // Adjacent regions of one move join at the same velocity.
    assert!((head.end_velocity - body.start_velocity).abs() < EPSILON);
    assert!((body.end_velocity - tail.start_velocity).abs() < EPSILON);
}

#[test]
fn feed_splits_into_symmetric_ramps_when_length_is_twice_the_ramp() {
    // Jerk chosen so the 0 -> 100 mm/min transition takes exactly 5 mm.
    let jerk = 40_000.0;
    assert!((transition_length(0.0, 100.0, jerk) - 5.0).abs() < 1e-9);

    let mut ctx = context_with_jerk(jerk);
    ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.1).unwrap();

    let buffers = ctx.committed_buffers();
    assert_eq!(buffers.len(), 3);
    let [head, body, tail] = buffers.as_slice() else {
        unreachable!()
    };

    assert_eq!(head.move_type, MoveType::Accel);
    assert!((head.length - 5.0).abs() < 1e-6);
    assert!(head.start_velocity.abs() < EPSILON);
    assert!((head.end_velocity - 100.0).abs() < EPSILON);

    assert_eq!(body.move_type, MoveType::Null);
    assert!(body.length.abs() < EPSILON);

    assert_eq!(tail.move_type, MoveType::Decel);
    assert!((tail.length - 5.0).abs() < 1e-6);
    assert!(tail.end_velocity.abs() < EPSILON);

    assert_move_invariants(&buffers, 10.0);
}

#[test]
fn colinear_feeds_blend_to_full_speed_at_the_join() {
    let mut ctx = context_with_jerk(50_000_000.0);
    // Both moves request 200 mm/min.
    ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.05).unwrap();
    ctx.submit_feed([20.0, 0.0, 0.0, 0.0], 0.05).unwrap();

    let buffers = ctx.committed_buffers();
    let moves = triples(&buffers);
    assert_eq!(moves.len(), 2);

    let first_tail = &moves[0][2];
    let second_head = &moves[1][0];

    // Straight join: the second move enters at its full request and the
    // first no longer brakes to zero.
    assert!((second_head.request_velocity - 200.0).abs() < EPSILON);
    assert!((first_tail.end_velocity - 200.0).abs() < EPSILON);
    // The first move got everything it asked for and is retired.
    assert!(moves[0].iter().all(|bf| !bf.replannable));
    assert!(moves[1].iter().all(|bf| bf.replannable));

    assert_move_invariants(moves[0], 10.0);
    assert_move_invariants(moves[1], 10.0);
}

#[test]
fn right_angle_corner_scales_entry_velocity() {
    let mut ctx = context_with_jerk(50_000_000.0);
    ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.05).unwrap();
    ctx.submit_feed([10.0, 10.0, 0.0, 0.0], 0.05).unwrap();

    let buffers = ctx.committed_buffers();
    let moves = triples(&buffers);

    let expected = 200.0 * std::f64::consts::FRAC_1_SQRT_2;
    let second_head = &moves[1][0];
    assert!(
        (second_head.request_velocity - expected).abs() < 0.01,
        "corner entry {} expected {expected}",
        second_head.request_velocity
    );
    // The first move's tail was rewritten to exit at the corner velocity.
    let first_tail = &moves[0][2];
    assert!((first_tail.end_velocity - expected).abs() < 0.01);

    assert_move_invariants(moves[0], 10.0);
    assert_move_invariants(moves[1], 10.0);
}

#[test]
fn full_reversal_enters_at_zero() {
    let mut ctx = context_with_jerk(50_000_000.0);
    ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.05).unwrap();
    ctx.submit_feed([0.0, 0.0, 0.0, 0.0], 0.05).unwrap();

    let buffers = ctx.committed_buffers();
    let moves = triples(&buffers);

    let second_head = &moves[1][0];
    assert!(second_head.request_velocity.abs() < EPSILON);
    let first_tail = &moves[0][2];
    assert!(first_tail.end_velocity.abs() < EPSILON);

    assert_move_invariants(moves[0], 10.0);
    assert_move_invariants(moves[1], 10.0);
}

#[test]
fn exact_stop_mode_pins_the_join_to_zero() {
    let mut ctx = context_with_jerk(50_000_000.0);
    ctx.set_path_mode(PathMode::ExactStop);
    ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.05).unwrap();
    ctx.submit_feed([20.0, 0.0, 0.0, 0.0], 0.05).unwrap();

    let buffers = ctx.committed_buffers();
    let moves = triples(&buffers);

    // Despite the straight join, the first move keeps its zero exit and
    // is immediately withdrawn from replanning.
    let first_tail = &moves[0][2];
    assert!(first_tail.end_velocity.abs() < EPSILON);
    assert!(moves[0].iter().all(|bf| !bf.replannable));

    let second_head = &moves[1][0];
    assert!(second_head.request_velocity.abs() < EPSILON);
}

#[test]
fn feed_after_arc_enters_at_arc_exit_velocity() {
    let mut ctx = context_with_jerk(50_000_000.0);
    // Half circle of radius 5 in XY: length = pi * 5, at 600 mm/min.
    let radius = 5.0;
    let length = std::f64::consts::PI * radius;
    ctx.submit_arc(
        ArcSpec {
            target: [10.0, 0.0, 0.0, 0.0],
            theta: -std::f64::consts::FRAC_PI_2,
            radius,
            angular_travel: std::f64::consts::PI,
            linear_travel: 0.0,
            axis_1: 0,
            axis_2: 1,
            axis_linear: 2,
        },
        length / 600.0,
    )
    .unwrap();
    // Feed requesting 1000 mm/min; entry is pinned to the arc's 600.
    ctx.submit_feed([30.0, 0.0, 0.0, 0.0], 20.0 / 1000.0).unwrap();

    let buffers = ctx.committed_buffers();
    assert_eq!(buffers.len(), 4);
    let arc = &buffers[0];
    assert_eq!(arc.move_type, MoveType::Arc);
    assert!((arc.end_velocity - 600.0).abs() < EPSILON);

    let feed_head = &buffers[1];
    assert!((feed_head.request_velocity - 600.0).abs() < EPSILON);
    assert!((feed_head.start_velocity - 600.0).abs() < EPSILON);
    // No backplanning across the arc: its buffer is untouched.
    assert!(!arc.replannable);
}

#[test]
fn feed_after_plain_line_enters_from_standstill() {
    let mut ctx = context_with_jerk(50_000_000.0);
    ctx.submit_line([10.0, 0.0, 0.0, 0.0], 0.05).unwrap();
    ctx.submit_feed([20.0, 0.0, 0.0, 0.0], 0.05).unwrap();

    let buffers = ctx.committed_buffers();
    let feed_head = &buffers[1];
    assert!(feed_head.request_velocity.abs() < EPSILON);
    assert!(feed_head.start_velocity.abs() < EPSILON);
}

#[test]
fn minimum_length_boundary() {
    let mut ctx = context_with_jerk(50_000_000.0);

    // Exactly the minimum: accepted.
    ctx.submit_line([MIN_LINE_LENGTH, 0.0, 0.0, 0.0], 0.01).unwrap();

    // Below the minimum: rejected without touching the pool.
    let before = ctx.committed_buffers().len();
    let err = ctx
        .submit_line([MIN_LINE_LENGTH - 0.001, 0.0, 0.0, 0.0], 0.01)
        .unwrap_err();
    assert!(matches!(err, MotionError::ZeroLengthMove { .. }));
    assert_eq!(ctx.committed_buffers().len(), before);

    let here = ctx.planner_position();
    let err = ctx.submit_feed(here, 0.01).unwrap_err();
    assert!(matches!(err, MotionError::ZeroLengthMove { .. }));

    // Zero duration is as degenerate as zero length.
    let err = ctx.submit_feed([50.0, 0.0, 0.0, 0.0], 0.0).unwrap_err();
    assert!(matches!(err, MotionError::ZeroLengthMove { .. }));
}

#[test]
fn pool_exhaustion_is_reported() {
    let mut ctx = context_with_jerk(50_000_000.0);
    // Fill every slot with dwells.
    while ctx.submit_dwell(0.1).is_ok() {}
    assert!(matches!(
        ctx.submit_dwell(0.1).unwrap_err(),
        MotionError::BufferFull
    ));
    // A feed needs three slots and must refuse cleanly too.
    assert!(!ctx.can_accept());
    assert!(matches!(
        ctx.submit_feed([10.0, 0.0, 0.0, 0.0], 0.05).unwrap_err(),
        MotionError::BufferFull
    ));
}

#[test]
fn planner_position_tracks_submissions() {
    let mut ctx = context_with_jerk(50_000_000.0);
    let target = [3.0, 4.0, 0.0, 0.0];
    ctx.submit_feed(target, 0.05).unwrap();
    assert_eq!(ctx.planner_position(), target);
    // The runtime has not moved yet.
    assert_eq!(ctx.runtime_position(), [0.0; AXES]);
}

#[test]
fn chain_entry_velocities_respect_braking_distance() {
    // Six short colinear moves at an absurd requested velocity: every join
    // is capped by the jerk-limited braking distance that remains.
    let jerk = 50_000_000.0;
    let mut ctx = context_with_jerk(jerk);
    let step = 1.0;
    let count = 6;
    for i in 1..=count {
        // 1 mm at a nominal 5000 mm/min: far beyond what any of these
        // lengths can brake from.
        ctx.submit_feed([i as f64 * step, 0.0, 0.0, 0.0], step / 5_000.0)
            .unwrap();
    }

    let buffers = ctx.committed_buffers();
    let moves = triples(&buffers);
    assert_eq!(moves.len(), count);

    for (i, m) in moves.iter().enumerate() {
        // Every predecessor's entry request was capped at the velocity a
        // full brake over the remaining chain allows. (The newest move was
        // never a predecessor, so its request is still the raw corner
        // value.)
        if i < count - 1 {
            let remaining = (count - i) as f64 * step;
            let cap = attainable_velocity(0.0, remaining, jerk.cbrt());
            let head = &m[0];
            assert!(
                head.request_velocity <= cap + EPSILON,
                "move {i} entry {} exceeds braking cap {cap}",
                head.request_velocity
            );
        }
        assert_move_invariants(m, step);
    }

    // The first move still starts from standstill.
    assert!(moves[0][0].start_velocity.abs() < EPSILON);
    // The chain end still brakes to zero.
    assert!(moves[count - 1][2].end_velocity.abs() < EPSILON);
}
