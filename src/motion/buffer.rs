// src/motion/buffer.rs - Motion buffer pool
//
// Fixed-capacity ring of move buffers shared by the submit side and the
// dispatcher. Slots cycle through empty -> loading -> queued -> pending ->
// running and back to empty; three cursors track where each side is:
// `w` (next slot a submit may claim), `q` (next slot to commit) and `r`
// (oldest committed slot, the one the dispatcher runs).

use super::{AXES, EPSILON, MIN_LINE_LENGTH};

/// Number of slots in the pool. Each jerk-limited line occupies three.
pub const MP_BUFFER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    #[default]
    Empty,
    Loading,
    Queued,
    Pending,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveType {
    /// Placeholder for a zero-length region; runs as a no-op.
    #[default]
    Null,
    Accel,
    Cruise,
    Decel,
    Line,
    Arc,
    Dwell,
    Start,
    Stop,
    End,
}

impl MoveType {
    /// True for the head/body/tail region types of a jerk-limited line.
    pub fn is_region(self) -> bool {
        matches!(
            self,
            MoveType::Null | MoveType::Accel | MoveType::Cruise | MoveType::Decel
        )
    }

    /// Derive the region type from its length and endpoint velocities.
    pub fn region_for(length: f64, start_velocity: f64, end_velocity: f64) -> Self {
        if length < MIN_LINE_LENGTH {
            MoveType::Null
        } else if (start_velocity - end_velocity).abs() < EPSILON {
            MoveType::Cruise
        } else if start_velocity < end_velocity {
            MoveType::Accel
        } else {
            MoveType::Decel
        }
    }
}

/// Runtime sub-phase of a running buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveState {
    #[default]
    New,
    RunningHalf1,
    RunningHalf2,
    /// Forced by `cancel_running`; the run function completes immediately.
    End,
}

/// Arc geometry carried by arc buffers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcGeometry {
    /// Angle (radians) from the circle centre to the arc's start point.
    pub theta: f64,
    pub radius: f64,
    /// Signed sweep in radians.
    pub angular_travel: f64,
    /// Travel along the linear (helix) axis in mm.
    pub linear_travel: f64,
    pub axis_1: usize,
    pub axis_2: usize,
    pub axis_linear: usize,
}

/// One slot of the pool: the atomic planning and runtime unit. A plain line
/// or arc is one buffer; a jerk-limited line is three (head/body/tail).
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveBuffer {
    /// Ring links; survive `clear` so walks across freed slots stay valid.
    pub nx: usize,
    pub pv: usize,

    pub state: BufferState,
    pub move_type: MoveType,
    pub move_state: MoveState,
    /// True while the backplanner may still rewrite this buffer.
    pub replannable: bool,

    /// Absolute end position of this sub-move.
    pub target: [f64; AXES],
    /// Direction of travel, unit length. Shared by all regions of a move.
    pub unit_vec: [f64; AXES],
    /// Path length in mm.
    pub length: f64,
    /// Duration in minutes (lines, dwells; regions derive time at runtime).
    pub time: f64,

    pub start_velocity: f64,
    pub end_velocity: f64,
    /// What this region was asked for: heads carry the requested entry
    /// velocity, bodies the requested cruise, tails the requested exit.
    /// The backplanner compares achieved against requested to decide when
    /// a move is planned as well as it can be.
    pub request_velocity: f64,

    pub arc: ArcGeometry,
}

impl MoveBuffer {
    /// Reset everything except the ring links.
    fn clear(&mut self) {
        *self = MoveBuffer {
            nx: self.nx,
            pv: self.pv,
            ..MoveBuffer::default()
        };
    }
}

/// The pool itself. Single-threaded; the submit side and the dispatcher
/// interleave through the state machine above, never aliasing a slot.
#[derive(Debug)]
pub struct BufferPool {
    slots: [MoveBuffer; MP_BUFFER_SIZE],
    w: usize,
    q: usize,
    r: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let mut slots = [MoveBuffer::default(); MP_BUFFER_SIZE];
        for (i, slot) in slots.iter_mut().enumerate() {
            slot.nx = (i + 1) % MP_BUFFER_SIZE;
            slot.pv = (i + MP_BUFFER_SIZE - 1) % MP_BUFFER_SIZE;
        }
        Self {
            slots,
            w: 0,
            q: 0,
            r: 0,
        }
    }

    pub fn get(&self, idx: usize) -> &MoveBuffer {
        &self.slots[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut MoveBuffer {
        &mut self.slots[idx]
    }

    pub fn next_of(&self, idx: usize) -> usize {
        self.slots[idx].nx
    }

    pub fn prev_of(&self, idx: usize) -> usize {
        self.slots[idx].pv
    }

    /// Claim the slot at the write head for loading. Returns the slot index,
    /// or `None` when the pool is full. Up to `MP_BUFFER_SIZE` reservations
    /// may be outstanding before any commit.
    pub fn reserve(&mut self) -> Option<usize> {
        if self.slots[self.w].state != BufferState::Empty {
            return None;
        }
        let idx = self.w;
        self.slots[idx].clear();
        self.slots[idx].state = BufferState::Loading;
        self.w = self.slots[idx].nx;
        Some(idx)
    }

    /// Undo the most recent `reserve`. Only valid immediately after a
    /// reservation that will not be committed.
    pub fn release(&mut self) {
        let idx = self.slots[self.w].pv;
        self.slots[idx].clear();
        self.w = idx;
    }

    /// Publish the oldest loading slot as `move_type`, making it visible to
    /// the dispatcher. Commits happen in reservation order.
    pub fn commit(&mut self, move_type: MoveType) {
        let idx = self.q;
        debug_assert_eq!(self.slots[idx].state, BufferState::Loading);
        self.slots[idx].move_type = move_type;
        self.slots[idx].move_state = MoveState::New;
        self.slots[idx].state = BufferState::Queued;
        self.q = self.slots[idx].nx;
    }

    /// The slot the dispatcher should run: promotes a queued/pending slot to
    /// running, hands back an already-running slot, `None` otherwise.
    pub fn run_head(&mut self) -> Option<usize> {
        match self.slots[self.r].state {
            BufferState::Queued | BufferState::Pending => {
                self.slots[self.r].state = BufferState::Running;
                Some(self.r)
            }
            BufferState::Running => Some(self.r),
            _ => None,
        }
    }

    /// Release the finished run slot and stage the next one.
    pub fn finalize_run(&mut self) {
        let idx = self.r;
        self.slots[idx].clear();
        self.r = self.slots[idx].nx;
        if self.slots[self.r].state == BufferState::Queued {
            self.slots[self.r].state = BufferState::Pending;
        }
    }

    /// True iff the `n` slots starting at the write head are all empty.
    pub fn have_free(&self, n: usize) -> bool {
        let mut idx = self.w;
        for _ in 0..n.min(MP_BUFFER_SIZE) {
            if self.slots[idx].state != BufferState::Empty {
                return false;
            }
            idx = self.slots[idx].nx;
        }
        true
    }

    /// The most recently loaded-or-committed slot: the tail of the previous
    /// move, consulted for cornering when the next move is submitted.
    pub fn prev_implicit(&self) -> usize {
        self.slots[self.w].pv
    }

    /// Indices of committed, not-yet-released slots, oldest first.
    pub fn committed(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut idx = self.r;
        for _ in 0..MP_BUFFER_SIZE {
            match self.slots[idx].state {
                BufferState::Queued | BufferState::Pending | BufferState::Running => {
                    out.push(idx)
                }
                _ => break,
            }
            idx = self.slots[idx].nx;
        }
        out
    }

    /// The slot currently mid-run, if any. Unlike `run_head` this never
    /// promotes a queued slot.
    pub fn running(&self) -> Option<usize> {
        (self.slots[self.r].state == BufferState::Running).then_some(self.r)
    }

    pub fn has_committed(&self) -> bool {
        matches!(
            self.slots[self.r].state,
            BufferState::Queued | BufferState::Pending | BufferState::Running
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_commit_run_finalize_cycle() {
        let mut pool = BufferPool::new();

        let idx = pool.reserve().unwrap();
        assert_eq!(pool.get(idx).state, BufferState::Loading);
        pool.commit(MoveType::Line);
        assert_eq!(pool.get(idx).state, BufferState::Queued);
        assert_eq!(pool.get(idx).move_state, MoveState::New);

        let run = pool.run_head().unwrap();
        assert_eq!(run, idx);
        assert_eq!(pool.get(run).state, BufferState::Running);
        // Re-entrant pick returns the same slot.
        assert_eq!(pool.run_head().unwrap(), run);

        pool.finalize_run();
        assert_eq!(pool.get(idx).state, BufferState::Empty);
        assert!(pool.run_head().is_none());
    }

    #[test]
    fn release_undoes_reservation() {
        let mut pool = BufferPool::new();
        let idx = pool.reserve().unwrap();
        pool.release();
        assert_eq!(pool.get(idx).state, BufferState::Empty);
        // The slot is claimable again.
        assert_eq!(pool.reserve().unwrap(), idx);
    }

    #[test]
    fn pool_exhaustion_and_have_free() {
        let mut pool = BufferPool::new();
        assert!(pool.have_free(MP_BUFFER_SIZE));
        for _ in 0..MP_BUFFER_SIZE {
            assert!(pool.reserve().is_some());
        }
        assert!(pool.reserve().is_none());
        assert!(!pool.have_free(1));
    }

    #[test]
    fn next_queued_slot_becomes_pending_on_finalize() {
        let mut pool = BufferPool::new();
        pool.reserve().unwrap();
        pool.commit(MoveType::Line);
        pool.reserve().unwrap();
        pool.commit(MoveType::Line);

        let first = pool.run_head().unwrap();
        pool.finalize_run();
        let second = pool.next_of(first);
        assert_eq!(pool.get(second).state, BufferState::Pending);
        assert_eq!(pool.run_head().unwrap(), second);
    }

    #[test]
    fn ring_links_survive_clearing() {
        let mut pool = BufferPool::new();
        let idx = pool.reserve().unwrap();
        let (nx, pv) = (pool.get(idx).nx, pool.get(idx).pv);
        pool.commit(MoveType::Dwell);
        pool.run_head().unwrap();
        pool.finalize_run();
        assert_eq!(pool.get(idx).nx, nx);
        assert_eq!(pool.get(idx).pv, pv);
    }

    #[test]
    fn committed_tracks_cursor_window() {
        let mut pool = BufferPool::new();
        for _ in 0..3 {
            pool.reserve().unwrap();
            pool.commit(MoveType::Line);
        }
        assert_eq!(pool.committed().len(), 3);
        pool.run_head().unwrap();
        pool.finalize_run();
        assert_eq!(pool.committed().len(), 2);
    }

    #[test]
    fn region_type_derivation() {
        assert_eq!(MoveType::region_for(0.001, 0.0, 100.0), MoveType::Null);
        assert_eq!(MoveType::region_for(5.0, 0.0, 100.0), MoveType::Accel);
        assert_eq!(MoveType::region_for(5.0, 100.0, 0.0), MoveType::Decel);
        assert_eq!(MoveType::region_for(5.0, 100.0, 100.0), MoveType::Cruise);
    }
}
