//! Body finalizer.
//!
//! Runs once per step after the constraint graph's last substep: folds
//! each awake body's accumulated `delta_position`/`delta_rotation` into its
//! permanent `center`/`transform`, classifies the body as fast (flagging it
//! for continuous collision), re-derives the transient flag subset,
//! enlarges fat AABBs for shapes that escaped their cached bounds, and
//! buffers broad-phase moves. Body creation/removal and shape AABB
//! recomputation are the host's concern; this only consumes what they
//! produce.

use crate::body::{BodyRecord, BodySim, BodyState, BodyType};
use crate::broadphase::{BroadPhase, ProxyKey};
use crate::config::SolverConfig;
use crate::flags::BodyFlags;
use crate::math::{AABB_MARGIN, Real, Rotation, Vector};
use crate::shape::Shape;

/// One body's finalize result, consumed by the event/sleep pass to decide
/// whether to emit a `BodyMoveEvent` and to feed the island sleep timers.
#[derive(Clone, Copy, Debug)]
pub struct FinalizeOutcome {
    pub moved: bool,
    /// `max(|v| + |w|*maxExtent, 0.5*invDt*(|deltaPos| + |deltaRotation.sin|*maxExtent))`
    /// — the combined velocity/position-correction metric the sleep pass
    /// compares against `record.sleep_threshold`.
    pub sleep_velocity: Real,
}

/// Finalizes one awake-body slot: applies its substep deltas to `sim`,
/// resets them to zero, classifies the body as fast or safe-to-advance,
/// updates `record`'s durable flag copy, and enlarges/moves every shape on
/// its linked list whose tight AABB (recomputed by `recompute_aabb`, the
/// host's shape math) has escaped its cached fat AABB.
#[allow(clippy::too_many_arguments)]
pub fn finalize_body(
    sim: &mut BodySim,
    state: &mut BodyState,
    record: &mut BodyRecord,
    shapes: &mut [Shape],
    broad_phase: &dyn BroadPhase,
    recompute_aabb: &dyn Fn(&Shape, &BodySim) -> parry2d::bounding_volume::Aabb,
    config: &SolverConfig,
    dt: Real,
) -> FinalizeOutcome {
    let moved = state.delta_position != Vector::zeros() || state.delta_rotation != Rotation::identity();

    sim.center += state.delta_position;
    sim.transform.rotation = state.delta_rotation * sim.transform.rotation;

    // Use the velocity of the farthest point on the body to account for
    // rotation, and the same measure for the position correction the
    // solver applied this step: sleep must observe both.
    let max_velocity = state.linear_velocity.norm() + state.angular_velocity.abs() * sim.max_extent;
    let max_delta_position =
        state.delta_position.norm() + state.delta_rotation.into_inner().im.abs() * sim.max_extent;
    let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
    let sleep_velocity = max_velocity.max(0.5 * inv_dt * max_delta_position);

    state.delta_position = Vector::zeros();
    state.delta_rotation = Rotation::identity();

    sim.sync_transform_position();

    // Copy this step's speed-capped/TOI outcome onto the durable record
    // before clearing it on `sim`: both flags are re-derived from scratch
    // every step, never accumulated.
    record.flags = (record.flags - BodyFlags::DURABLE_COPY) | (sim.flags & BodyFlags::DURABLE_COPY);
    sim.flags -= BodyFlags::TRANSIENT;

    let is_dynamic = record.body_type == BodyType::Dynamic;
    let is_fast = is_dynamic && config.enable_continuous && max_velocity * dt > 0.5 * sim.min_extent;
    if is_fast {
        // Continuous collision commits `center0`/`rotation0` once it has
        // resolved (or ruled out) a sweep hit for this body.
        sim.flags |= BodyFlags::IS_FAST;
    } else {
        sim.center0 = sim.center;
        sim.rotation0 = sim.transform.rotation;
    }

    let mut shape_id = record.head_shape_id;
    while let Some(id) = shape_id {
        let shape = &mut shapes[id as usize];
        let tight = recompute_aabb(shape, sim);
        if !aabb_contains(&shape.fat_aabb, &tight) {
            let fattened = fatten(&tight, AABB_MARGIN);
            shape.fat_aabb = fattened;
            shape.enlarged_aabb = true;
            broad_phase.enlarge_proxy(ProxyKey(shape.broad_phase_proxy), fattened);
        }
        shape.aabb = tight;
        broad_phase.buffer_move(ProxyKey(shape.broad_phase_proxy));
        shape_id = shape.next_shape_id;
    }

    FinalizeOutcome { moved, sleep_velocity }
}

fn aabb_contains(outer: &parry2d::bounding_volume::Aabb, inner: &parry2d::bounding_volume::Aabb) -> bool {
    outer.mins.x <= inner.mins.x
        && outer.mins.y <= inner.mins.y
        && outer.maxs.x >= inner.maxs.x
        && outer.maxs.y >= inner.maxs.y
}

fn fatten(aabb: &parry2d::bounding_volume::Aabb, margin: crate::math::Real) -> parry2d::bounding_volume::Aabb {
    let m = nalgebra::Vector2::new(margin, margin);
    parry2d::bounding_volume::Aabb::new(aabb.mins - m, aabb.maxs + m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point, Rotation, Transform, Vector};
    use parry2d::bounding_volume::Aabb;

    struct NullBroadPhase;
    impl BroadPhase for NullBroadPhase {
        fn query(&self, _tree: crate::broadphase::TreeIndex, _aabb: &Aabb, _mask_bits: u64, _callback: &mut dyn FnMut(u32, u64) -> bool) {}
        fn enlarge_proxy(&self, _proxy: ProxyKey, _fat_aabb: Aabb) {}
        fn buffer_move(&self, _proxy: ProxyKey) {}
    }

    fn make_sim() -> BodySim {
        BodySim {
            body_id: 0,
            center: Point::origin(),
            transform: Transform::identity(),
            local_center: Vector::zeros(),
            center0: Point::origin(),
            rotation0: Rotation::identity(),
            inv_mass: 1.0,
            inv_inertia: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            force: Vector::zeros(),
            torque: 0.0,
            min_extent: 0.5,
            max_extent: 0.5,
            flags: BodyFlags::empty(),
        }
    }

    fn make_record() -> BodyRecord {
        BodyRecord {
            body_type: crate::body::BodyType::Dynamic,
            flags: BodyFlags::empty(),
            sleep_time: 0.0,
            sleep_threshold: 0.05,
            enable_sleep: true,
            island_id: 0,
            generation: std::num::NonZeroU32::new(1).unwrap(),
            user_data: 0,
            head_shape_id: None,
            body_move_index: 0,
        }
    }

    #[test]
    fn stationary_body_is_not_marked_moved() {
        let mut sim = make_sim();
        let mut state = BodyState::identity();
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        let outcome = finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert!(!outcome.moved);
        assert_eq!(outcome.sleep_velocity, 0.0);
    }

    #[test]
    fn moving_body_is_marked_moved() {
        let mut sim = make_sim();
        let mut state = BodyState::identity();
        state.delta_position = Vector::new(1.0, 0.0);
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        let outcome = finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert!(outcome.moved);
        assert_eq!(sim.center, Point::new(1.0, 0.0));
        assert_eq!(state.delta_position, Vector::zeros(), "substep delta must be reset after being folded in");
    }

    #[test]
    fn substep_deltas_do_not_accumulate_across_finalize_calls() {
        let mut sim = make_sim();
        let mut state = BodyState::identity();
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        state.delta_position = Vector::new(1.0, 0.0);
        finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        // Nothing accumulated this step: without a reset, the next call
        // would re-fold the same delta and double the position.
        finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert_eq!(sim.center, Point::new(1.0, 0.0));
    }

    #[test]
    fn fast_body_is_flagged_and_keeps_its_sweep_start_stale() {
        let mut sim = make_sim();
        sim.min_extent = 0.01;
        let mut state = BodyState::identity();
        state.linear_velocity = Vector::new(100.0, 0.0);
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert!(sim.flags.contains(BodyFlags::IS_FAST));
        // A fast body's center0/rotation0 commit is CCD's job, not the
        // finalizer's.
        assert_eq!(sim.center0, Point::origin());
    }

    #[test]
    fn slow_body_commits_its_sweep_start_immediately() {
        let mut sim = make_sim();
        let mut state = BodyState::identity();
        state.delta_position = Vector::new(1.0, 0.0);
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert!(!sim.flags.contains(BodyFlags::IS_FAST));
        assert_eq!(sim.center0, sim.center);
    }

    #[test]
    fn speed_capped_flag_survives_the_durable_copy_but_not_is_fast() {
        let mut sim = make_sim();
        sim.flags |= BodyFlags::IS_SPEED_CAPPED | BodyFlags::IS_FAST;
        let mut state = BodyState::identity();
        let mut record = make_record();
        let mut shapes: Vec<Shape> = Vec::new();
        let broad_phase = NullBroadPhase;
        let recompute = |_s: &Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());
        let config = SolverConfig::default();

        finalize_body(&mut sim, &mut state, &mut record, &mut shapes, &broad_phase, &recompute, &config, 1.0 / 60.0);
        assert!(record.flags.contains(BodyFlags::IS_SPEED_CAPPED));
        assert!(!record.flags.contains(BodyFlags::IS_FAST), "IS_FAST must never reach the durable record");
    }
}
