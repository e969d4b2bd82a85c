// src/motion/mod.rs

// --- Submodules ---
pub mod buffer;
pub mod kinematics;
pub mod math;
pub mod queue;

mod arc_run;
mod backplan;
mod dispatch;
mod line_run;
mod planner;

// --- Re-exports for external use ---
pub use buffer::{ArcGeometry, BufferState, MoveBuffer, MoveState, MoveType, MP_BUFFER_SIZE};
pub use kinematics::{create_kinematics, Kinematics, KinematicsType};
pub use queue::{async_end, async_start, async_stop};
pub use queue::{MotorQueue, QueueEntry, RecordingQueue, StepperControl};

use crate::config::Config;
use buffer::BufferPool;
use dispatch::RuntimeState;
use planner::PlannerMaster;

/// Number of Cartesian axes (X, Y, Z, A).
pub const AXES: usize = 4;
/// Number of motors driven by the downstream queue.
pub const MOTORS: usize = 4;
/// Shortest plannable move or region (mm).
pub const MIN_LINE_LENGTH: f64 = 0.01;
/// Comparison tolerance for velocities and lengths.
pub const EPSILON: f64 = 1e-4;
pub const ONE_MINUTE_OF_MICROSECONDS: f64 = 60_000_000.0;

/// How joins between successive moves are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    /// Maximise velocity through joins (cornering-limited).
    #[default]
    Continuous,
    /// Hold the path exactly; joins are still cornering-limited.
    ExactPath,
    /// Come to a complete stop at every join.
    ExactStop,
}

/// Geometry of a helical arc, as derived by the caller's arc front-end.
#[derive(Debug, Clone, Copy)]
pub struct ArcSpec {
    /// Absolute end position.
    pub target: [f64; AXES],
    /// Angle (radians) from circle centre to the arc start.
    pub theta: f64,
    pub radius: f64,
    /// Signed sweep in radians.
    pub angular_travel: f64,
    /// Travel along the helix axis in mm.
    pub linear_travel: f64,
    /// Axis indices of the circle plane.
    pub axis_1: usize,
    pub axis_2: usize,
    /// Axis index of the helix travel.
    pub axis_linear: usize,
}

/// Owning context for one machine: the buffer pool, the planning-side and
/// runtime-side singletons, and the downstream collaborators. All access
/// is single-threaded and cooperative; submit on one side, poll
/// [`MotionContext::step`] on the other.
pub struct MotionContext<Q: MotorQueue> {
    pub(crate) cfg: crate::config::PlannerConfig,
    pub(crate) pool: BufferPool,
    pub(crate) mm: PlannerMaster,
    pub(crate) rt: RuntimeState,
    pub(crate) kin: Box<dyn Kinematics>,
    pub(crate) queue: Q,
    pub(crate) path_mode: PathMode,
}

impl<Q: MotorQueue> MotionContext<Q> {
    pub fn new(config: &Config, queue: Q) -> Self {
        Self {
            cfg: config.planner.clone(),
            pool: BufferPool::new(),
            mm: PlannerMaster::new(config.planner.linear_jerk_max),
            rt: RuntimeState::default(),
            kin: create_kinematics(&config.machine),
            queue,
            path_mode: PathMode::default(),
        }
    }

    /// Replace the kinematics handler (hosts with exotic geometries).
    pub fn with_kinematics(mut self, kin: Box<dyn Kinematics>) -> Self {
        self.kin = kin;
        self
    }

    pub fn set_path_mode(&mut self, mode: PathMode) {
        self.path_mode = mode;
    }

    pub fn path_mode(&self) -> PathMode {
        self.path_mode
    }

    /// End position of the last planned move (runs ahead of the tool).
    pub fn planner_position(&self) -> [f64; AXES] {
        self.mm.position
    }

    /// Position of the emitted segment stream.
    pub fn runtime_position(&self) -> [f64; AXES] {
        self.rt.position
    }

    /// True while a submit of a planned feed would find its three slots.
    pub fn can_accept(&self) -> bool {
        self.pool.have_free(3)
    }

    /// True while a move is mid-run or committed work is waiting.
    pub fn is_busy(&self) -> bool {
        self.rt.run_flag || self.pool.has_committed()
    }

    /// Force the running move to wind down; the next [`Self::step`] call
    /// finalises it. Queued moves behind it are untouched.
    pub fn cancel_running(&mut self) {
        if let Some(idx) = self.pool.running() {
            self.pool.get_mut(idx).move_state = MoveState::End;
            self.rt.run_flag = false;
        }
    }

    /// Drop all queued work and reset the runtime to idle. The planning
    /// position rejoins the runtime position: dropped moves never happen.
    pub fn clear(&mut self) {
        let position = self.rt.position;
        self.pool = BufferPool::new();
        self.rt = RuntimeState::default();
        self.rt.position = position;
        self.mm.position = position;
    }

    /// Access to the motor queue (inspection, draining in simulators).
    pub fn motor_queue(&self) -> &Q {
        &self.queue
    }

    pub fn motor_queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    /// Snapshot of all committed buffers, oldest first. Diagnostic aid for
    /// tests and tooling; the copies are detached from the pool.
    pub fn committed_buffers(&self) -> Vec<MoveBuffer> {
        self.pool
            .committed()
            .into_iter()
            .map(|idx| *self.pool.get(idx))
            .collect()
    }
}
