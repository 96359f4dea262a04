//! Solver tunables: a plain struct of knobs threaded through the step,
//! not a file/env-based configuration layer — a physics core has no
//! business reading files; the host owns that.

use crate::math::Real;

/// Number of biased solve passes per substep. Hard-coded: a known tuning
/// knob, not a per-call parameter.
pub const ITERATIONS: u32 = 1;

/// Number of unbiased relax passes per substep. Same status as
/// `ITERATIONS`.
pub const RELAX_ITERATIONS: u32 = 1;

/// Maximum recorded sensor hits per fast body per step.
pub const MAX_CONTINUOUS_SENSOR_HITS: usize = 8;

/// SIMD contact-lane width supported by the block scheduler's block sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneWidth {
    Four = 4,
    Eight = 8,
}

impl LaneWidth {
    pub fn as_usize(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Number of substeps per call to `Step::run`.
    pub sub_step_count: u32,
    /// Global gravity acceleration.
    pub gravity: crate::math::Vector,
    /// Maximum linear speed, in units/second, before the speed cap engages.
    pub max_linear_velocity: Real,
    /// Whether continuous collision is globally enabled.
    pub enable_continuous: bool,
    /// Whether bodies are allowed to fall asleep at all.
    pub enable_sleep: bool,
    /// Accumulated quiescent time, in seconds, before an island may sleep.
    pub time_to_sleep: Real,
    /// SIMD lane width used to pad contact/joint blocks.
    pub lane_width: LaneWidth,
    /// Target block count divisor: `max_block_count = blocks_per_worker *
    /// worker_count`.
    pub blocks_per_worker: usize,
    /// Minimum number of bodies per integration block.
    pub min_body_block_size: usize,
    /// World hit-event threshold: minimum `-normal_velocity` across a
    /// contact manifold to emit a `ContactHitEvent`.
    pub contact_hit_threshold: Real,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            sub_step_count: 4,
            gravity: crate::math::Vector::new(0.0, -10.0),
            max_linear_velocity: 400.0 * LENGTH_UNITS_PER_METER,
            enable_continuous: true,
            enable_sleep: true,
            time_to_sleep: 0.5,
            lane_width: LaneWidth::Four,
            blocks_per_worker: 4,
            min_body_block_size: 32,
            contact_hit_threshold: 1.0 * LENGTH_UNITS_PER_METER,
        }
    }
}

/// Scale knob kept at `1.0` unless a host rescales the simulation.
pub const LENGTH_UNITS_PER_METER: Real = 1.0;

impl SolverConfig {
    #[inline]
    pub fn h(&self, dt: Real) -> Real {
        dt / self.sub_step_count.max(1) as Real
    }
}
