// src/lib.rs
//! Motion planning core for Cartesian CNC and robotic controllers.
//!
//! The crate accepts absolute-millimetre motion commands (feeds, arcs,
//! dwells, program stops) and emits constant-time step segments to a
//! downstream motor queue, honouring a configured maximum linear jerk.
//! Everything hangs off [`motion::MotionContext`]: submit commands on one
//! side, poll [`motion::MotionContext::step`] on the other.

pub mod config;
pub mod error;
pub mod motion;

pub use config::Config;
pub use error::{MotionError, StepStatus};
pub use motion::{ArcSpec, MotionContext, PathMode};
