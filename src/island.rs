//! Awake-set bookkeeping and the sleep pass.
//!
//! Island *construction* (which bodies are connected by which joints or
//! contacts) is owned by the host's graph/union-find structures; this
//! module only consumes the result: per-body awake/asleep bits, per-island
//! sleep timers, and the decision of whether an island's bodies should be
//! put to sleep this step. A body newly marked as a "split candidate" is a
//! signal to the host that its island may have disconnected and needs
//! re-flooding before the next step's sleep check is meaningful.

use bit_vec::BitVec;
use rustc_hash::FxHashMap;

use crate::body::{BodyRecord, BodyState};
use crate::config::SolverConfig;
use crate::math::Real;

/// Tracks which bodies are currently awake and which islands are flagged
/// as possibly split, by body/island index.
#[derive(Default)]
pub struct AwakeSet {
    awake: BitVec,
    split_candidates: BitVec,
}

impl AwakeSet {
    pub fn with_capacity(body_count: usize) -> Self {
        AwakeSet { awake: BitVec::from_elem(body_count, true), split_candidates: BitVec::new() }
    }

    pub fn is_awake(&self, body_index: usize) -> bool {
        self.awake.get(body_index).unwrap_or(false)
    }

    pub fn wake(&mut self, body_index: usize) {
        ensure_len(&mut self.awake, body_index + 1);
        self.awake.set(body_index, true);
    }

    pub fn sleep(&mut self, body_index: usize) {
        if body_index < self.awake.len() {
            self.awake.set(body_index, false);
        }
    }

    /// Marks `island_id` as needing a re-flood before its next sleep check:
    /// a joint or contact bridging two halves of it was just removed, and
    /// whether it is still one connected island is now unknown.
    pub fn mark_split_candidate(&mut self, island_id: u32) {
        ensure_len(&mut self.split_candidates, island_id as usize + 1);
        self.split_candidates.set(island_id as usize, true);
    }

    pub fn is_split_candidate(&self, island_id: u32) -> bool {
        self.split_candidates.get(island_id as usize).unwrap_or(false)
    }

    pub fn clear_split_candidate(&mut self, island_id: u32) {
        if (island_id as usize) < self.split_candidates.len() {
            self.split_candidates.set(island_id as usize, false);
        }
    }
}

fn ensure_len(bits: &mut BitVec, len: usize) {
    while bits.len() < len {
        bits.push(false);
    }
}

/// Per-island accumulated quiescent time. Keyed by island id rather than a
/// dense array since most worlds have far fewer islands than bodies.
#[derive(Default)]
pub struct SleepTimers {
    by_island: FxHashMap<u32, Real>,
}

impl SleepTimers {
    pub fn new() -> Self {
        SleepTimers { by_island: FxHashMap::default() }
    }

    pub fn reset(&mut self, island_id: u32) {
        self.by_island.insert(island_id, 0.0);
    }

    pub fn get(&self, island_id: u32) -> Real {
        self.by_island.get(&island_id).copied().unwrap_or(0.0)
    }
}

/// Advances each body's contribution to its island's sleep timer: if a
/// body's finalizer-computed sleep velocity (speed, folding in both true
/// velocity and this step's position correction) exceeds its
/// `sleep_threshold`, its whole island's timer resets to zero for this
/// step; otherwise the island accumulates `dt` (clamped by the
/// slowest-resetting body, i.e. a `min` fold).
pub fn accumulate_sleep_timers(
    records: &[BodyRecord],
    sleep_velocities: &[Real],
    timers: &mut SleepTimers,
    dt: Real,
) {
    let mut island_quiescent: FxHashMap<u32, bool> = FxHashMap::default();

    for (record, &sleep_velocity) in records.iter().zip(sleep_velocities.iter()) {
        if !record.enable_sleep {
            island_quiescent.insert(record.island_id, false);
            continue;
        }
        let quiescent = sleep_velocity <= record.sleep_threshold;
        let entry = island_quiescent.entry(record.island_id).or_insert(true);
        *entry &= quiescent;
    }

    for (island_id, quiescent) in island_quiescent {
        if quiescent {
            let acc = timers.by_island.entry(island_id).or_insert(0.0);
            *acc += dt;
        } else {
            timers.reset(island_id);
        }
    }
}

/// Puts every body in `island_id` to sleep: zeroes its velocity state and
/// clears its awake bit. Called once an island's timer has crossed
/// `config.time_to_sleep` and `config.enable_sleep` is set.
pub fn sleep_island(
    island_id: u32,
    records: &[BodyRecord],
    states: &mut [BodyState],
    awake: &mut AwakeSet,
) {
    for (index, record) in records.iter().enumerate() {
        if record.island_id == island_id {
            states[index] = BodyState::identity();
            awake.sleep(index);
        }
    }
}

/// Decides which islands should sleep this step given their accumulated
/// timers, without mutating anything — callers apply `sleep_island` for
/// each id returned.
pub fn islands_ready_to_sleep(
    island_ids: impl Iterator<Item = u32>,
    timers: &SleepTimers,
    config: &SolverConfig,
) -> Vec<u32> {
    if !config.enable_sleep {
        return Vec::new();
    }
    island_ids.filter(|&id| timers.get(id) >= config.time_to_sleep).collect()
}
