//! Body data model and the body integrator.
//!
//! `BodySim` (cold, finalizer-touched) and `BodyState` (hot, solver-touched)
//! are kept as separate parallel arrays indexed by the same awake-body
//! position: the inner solver loop only ever touches `BodyState`, keeping
//! its working set small.

use std::num::NonZeroU32;

use crate::config::SolverConfig;
use crate::flags::BodyFlags;
use crate::math::{self, Point, Real, Rotation, Transform, Vector};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// The durable, per-world body record. World/body creation and storage
/// (insertion, removal, builders) live outside this crate; this struct only
/// carries the fields the body finalizer and the event/sleep pass read or
/// write once per step.
#[derive(Clone, Debug)]
pub struct BodyRecord {
    pub body_type: BodyType,
    pub flags: BodyFlags,
    pub sleep_time: Real,
    pub sleep_threshold: Real,
    pub enable_sleep: bool,
    pub island_id: u32,
    pub generation: NonZeroU32,
    pub user_data: u64,
    pub head_shape_id: Option<u32>,
    /// Index of this body's `BodyMoveEvent` in the current step's array,
    /// set by the finalizer so later stages (e.g. CCD) can update it.
    pub body_move_index: u32,
}

/// Cold, finalizer-touched half of a body's simulation state.
#[derive(Clone, Debug)]
pub struct BodySim {
    /// Index into the world's durable `BodyRecord` storage.
    pub body_id: u32,
    pub center: Point,
    pub transform: Transform,
    /// Offset from the body's origin to its center of mass, in local space.
    pub local_center: Vector,
    /// Transform snapshot taken at the end of the previous step; CCD
    /// sweeps interpolate from here to the current `center`/`transform`.
    pub center0: Point,
    pub rotation0: Rotation,
    pub inv_mass: Real,
    pub inv_inertia: Real,
    pub linear_damping: Real,
    pub angular_damping: Real,
    pub gravity_scale: Real,
    pub force: Vector,
    pub torque: Real,
    pub min_extent: Real,
    pub max_extent: Real,
    pub flags: BodyFlags,
}

impl BodySim {
    /// Recomputes `transform.position` from `center` and the current
    /// rotation. Called by the finalizer after `center`/`rotation` change.
    pub fn sync_transform_position(&mut self) {
        self.transform.position =
            self.center - self.transform.rotation.transform_vector(&self.local_center);
    }

    pub fn sweep_transforms(&self) -> (Transform, Transform) {
        let xf1 = Transform::new(
            self.center0 - self.rotation0.transform_vector(&self.local_center),
            self.rotation0,
        );
        let xf2 = Transform::new(
            self.center - self.transform.rotation.transform_vector(&self.local_center),
            self.transform.rotation,
        );
        (xf1, xf2)
    }
}

/// Hot, solver-touched half of a body's simulation state. This is the only
/// data the parallel constraint solver's inner loop mutates.
#[derive(Clone, Copy, Debug)]
pub struct BodyState {
    pub linear_velocity: Vector,
    pub angular_velocity: Real,
    pub delta_position: Vector,
    pub delta_rotation: Rotation,
    /// Only the `LOCK_*` bits are meaningful here; the integrator and
    /// finalizer both consult them every substep.
    pub flags: BodyFlags,
}

impl BodyState {
    pub fn identity() -> Self {
        BodyState {
            linear_velocity: Vector::zeros(),
            angular_velocity: 0.0,
            delta_position: Vector::zeros(),
            delta_rotation: Rotation::identity(),
            flags: BodyFlags::empty(),
        }
    }
}

/// Body integrator, velocity half.
///
/// Applies gravity, accumulated force/torque, Padé damping, and the
/// linear/angular speed caps. Runs once per substep, before warm-starting.
pub fn integrate_velocities(
    sims: &mut [BodySim],
    states: &mut [BodyState],
    start: usize,
    end: usize,
    config: &SolverConfig,
    h: Real,
) {
    let max_linear_speed = config.max_linear_velocity;
    let max_linear_speed_sq = max_linear_speed * max_linear_speed;
    let max_angular_speed = math::MAX_ROTATION / h.max(Real::EPSILON);
    let max_angular_speed_sq = max_angular_speed * max_angular_speed;

    for i in start..end {
        let sim = &mut sims[i];
        let state = &mut states[i];

        let mut v = state.linear_velocity;
        let mut w = state.angular_velocity;

        let linear_damping = 1.0 / (1.0 + h * sim.linear_damping);
        let angular_damping = 1.0 / (1.0 + h * sim.angular_damping);
        let gravity_scale = if sim.inv_mass > 0.0 { sim.gravity_scale } else { 0.0 };

        let linear_velocity_delta = (sim.force * sim.inv_mass + config.gravity * gravity_scale) * h;
        let angular_velocity_delta = h * sim.inv_inertia * sim.torque;

        v = linear_velocity_delta + v * linear_damping;
        w = angular_velocity_delta + angular_damping * w;

        if v.norm_squared() > max_linear_speed_sq {
            let ratio = max_linear_speed / v.norm();
            v *= ratio;
            sim.flags |= BodyFlags::IS_SPEED_CAPPED;
        }

        if w * w > max_angular_speed_sq && !sim.flags.contains(BodyFlags::ALLOW_FAST_ROTATION) {
            let ratio = max_angular_speed / w.abs();
            w *= ratio;
            sim.flags |= BodyFlags::IS_SPEED_CAPPED;
        }

        if state.flags.contains(BodyFlags::LOCK_LINEAR_X) {
            v.x = 0.0;
        }
        if state.flags.contains(BodyFlags::LOCK_LINEAR_Y) {
            v.y = 0.0;
        }
        if state.flags.contains(BodyFlags::LOCK_ANGULAR_Z) {
            w = 0.0;
        }

        state.linear_velocity = v;
        state.angular_velocity = w;
    }
}

/// Body integrator, position half. Runs once per substep, after the
/// constraint graph's relax pass.
pub fn integrate_positions(states: &mut [BodyState], start: usize, end: usize, h: Real) {
    for state in &mut states[start..end] {
        if state.flags.contains(BodyFlags::LOCK_LINEAR_X) {
            state.linear_velocity.x = 0.0;
        }
        if state.flags.contains(BodyFlags::LOCK_LINEAR_Y) {
            state.linear_velocity.y = 0.0;
        }
        if state.flags.contains(BodyFlags::LOCK_ANGULAR_Z) {
            state.angular_velocity = 0.0;
        }

        state.delta_position += state.linear_velocity * h;
        state.delta_rotation = math::integrate_rotation(state.delta_rotation, h * state.angular_velocity);
    }
}
