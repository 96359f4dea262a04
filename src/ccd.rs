//! Continuous collision for fast and bullet bodies.
//!
//! Runs once per fast body, after the finalizer has committed its step
//! displacement. Builds a sweep from the body's pre- and post-step
//! transforms, asks the broad-phase for candidates along that sweep, and
//! queries `GeometryKernel::time_of_impact` against each one, keeping the
//! smallest fraction found. A fraction of exactly zero is re-checked
//! against a shrunk "core" shape before being trusted, so that two bodies
//! merely resting in contact at the start of a step don't get treated as
//! an unresolved collision every step thereafter.

use crate::body::BodySim;
use crate::broadphase::{BroadPhase, TreeIndex};
use crate::flags::BodyFlags;
use crate::handle::Visitor;
use crate::kernel::{GeometryKernel, PreSolveFn, Sweep, ToiInput};
use crate::math::{Point, Real};
use crate::shape::{Filter, Shape, ShapeGeometry};

pub struct ContinuousResult {
    pub fraction: Real,
    pub hit_shape_id: u32,
    pub point: Point,
    pub normal: crate::math::Vector,
}

/// Cross-product early-out for one-sided chain segments: a sweep is only
/// eligible to hit the segment's solid side, which is the side the ghost
/// points bend away from. Returns `true` when the sweep should be skipped
/// (approaching from the non-solid side).
pub fn chain_segment_early_out(ghost1: Point, p1: Point, p2: Point, ghost2: Point, sweep_c1: Point, sweep_c2: Point) -> bool {
    let _ = (ghost1, ghost2);
    let edge = p2 - p1;
    let approach = sweep_c2 - sweep_c1;
    let cross = edge.x * approach.y - edge.y * approach.x;
    cross <= 0.0
}

/// Sweeps `body` against candidates returned by `broad_phase`, returning
/// the earliest real time-of-impact found, if any. Sensor shapes are never
/// treated as a collision: a hit against one is pushed into that sensor's
/// `hits` buffer (via `on_sensor_hit`) instead and the sweep continues.
#[allow(clippy::too_many_arguments)]
pub fn solve_continuous<K: GeometryKernel>(
    body_id: u32,
    body_sim: &BodySim,
    body_shapes: &[(u32, &Shape)],
    kernel: &K,
    broad_phase: &dyn BroadPhase,
    all_shapes: &[Shape],
    core_fraction: Real,
    custom_filter: Option<&crate::kernel::CustomFilterFn>,
    pre_solve: Option<&PreSolveFn>,
    mut on_sensor_hit: impl FnMut(u32, Visitor),
) -> Option<ContinuousResult> {
    let (xf1, xf2) = body_sim.sweep_transforms();
    let displacement = xf2.position - xf1.position;
    if displacement.norm_squared() < crate::math::LINEAR_SLOP * crate::math::LINEAR_SLOP {
        return None;
    }

    let sweep = Sweep {
        c1: body_sim.center0,
        q1: body_sim.rotation0,
        c2: body_sim.center,
        q2: body_sim.transform.rotation,
        local_center: body_sim.local_center,
    };

    let is_bullet = body_sim.flags.contains(BodyFlags::IS_BULLET);
    let trees: &[TreeIndex] = if is_bullet {
        &[TreeIndex::Static, TreeIndex::Kinematic, TreeIndex::Dynamic]
    } else {
        &[TreeIndex::Static, TreeIndex::Kinematic]
    };

    let sweep_aabb = sweep_aabb(xf1.position, xf2.position, body_sim.max_extent);

    let mut best: Option<ContinuousResult> = None;

    for (own_shape_id, own_shape) in body_shapes {
        for &tree in trees {
            broad_phase.query(tree, &sweep_aabb, u64::MAX, &mut |shape_id, _user_data| {
                let other = &all_shapes[shape_id as usize];
                if other.body_id == body_id {
                    return true;
                }
                if !Filter::should_collide(&own_shape.filter, &other.filter) {
                    return true;
                }
                if let Some(filter) = custom_filter {
                    if !filter(*own_shape_id, shape_id) {
                        return true;
                    }
                }
                if other.is_sensor() {
                    on_sensor_hit(other.sensor_index, Visitor::new(shape_id, other.generation.get()));
                    return true;
                }

                if let ShapeGeometry::ChainSegment { ghost1, segment, ghost2 } = &other.geometry {
                    if chain_segment_early_out(*ghost1, segment.a, segment.b, *ghost2, xf1.position, xf2.position) {
                        return true;
                    }
                }

                let other_sweep = Sweep {
                    c1: other.local_centroid,
                    q1: crate::math::Rotation::identity(),
                    c2: other.local_centroid,
                    q2: crate::math::Rotation::identity(),
                    local_center: crate::math::Vector::zeros(),
                };
                let input = ToiInput {
                    shape_a: &own_shape.geometry,
                    shape_b: &other.geometry,
                    sweep_a: sweep,
                    sweep_b: other_sweep,
                    max_fraction: best.as_ref().map_or(1.0, |b| b.fraction),
                };
                let output = kernel.time_of_impact(&input);
                if output.fraction >= input.max_fraction {
                    return true;
                }

                let accepted = if output.fraction == 0.0 {
                    accept_zero_toi(kernel, own_shape, other, sweep, core_fraction, body_sim.min_extent)
                } else {
                    true
                };

                if accepted && pre_solve.map_or(true, |f| f(*own_shape_id, shape_id, output.point, output.normal)) {
                    best = Some(ContinuousResult {
                        fraction: output.fraction,
                        hit_shape_id: shape_id,
                        point: output.point,
                        normal: output.normal,
                    });
                }
                true
            });
        }
    }

    best
}

/// Re-checks a zero-fraction time-of-impact against a shrunk "core" circle
/// at the body's centroid: if the shapes are still overlapping at `t=0`
/// once shrunk by `core_fraction * min_extent`, the contact is genuinely
/// already interpenetrating and the hit is accepted; otherwise the
/// zero-fraction result was a speculative-margin artifact and is rejected.
fn accept_zero_toi<K: GeometryKernel>(
    kernel: &K,
    own_shape: &Shape,
    other: &Shape,
    sweep: Sweep,
    core_fraction: Real,
    min_extent: Real,
) -> bool {
    let core_radius = (core_fraction * min_extent).max(crate::math::LINEAR_SLOP);
    let core = ShapeGeometry::Circle(parry2d::shape::Ball::new(core_radius));
    let xf_a = crate::math::Transform::new(sweep.c1, sweep.q1);
    let xf_b = crate::math::Transform::identity();
    let distance_input = crate::kernel::DistanceInput {
        shape_a: &core,
        shape_b: &other.geometry,
        transform_a: xf_a,
        transform_b: xf_b,
        use_radii: true,
    };
    let _ = own_shape;
    kernel.shape_distance(&distance_input).distance <= crate::math::LINEAR_SLOP
}

fn sweep_aabb(c1: Point, c2: Point, extent: Real) -> parry2d::bounding_volume::Aabb {
    let mins = Point::new(c1.x.min(c2.x) - extent, c1.y.min(c2.y) - extent);
    let maxs = Point::new(c1.x.max(c2.x) + extent, c1.y.max(c2.y) + extent);
    parry2d::bounding_volume::Aabb::new(mins, maxs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_segment_early_out_rejects_approach_from_ghost_side() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(1.0, 0.0);
        let ghost1 = Point::new(-1.0, 0.0);
        let ghost2 = Point::new(2.0, 0.0);

        let approaching_from_below = chain_segment_early_out(ghost1, p1, p2, ghost2, Point::new(0.5, -1.0), Point::new(0.5, -0.1));
        let approaching_from_above = chain_segment_early_out(ghost1, p1, p2, ghost2, Point::new(0.5, 1.0), Point::new(0.5, 0.1));
        assert_ne!(approaching_from_below, approaching_from_above);
    }

    #[test]
    fn sweep_aabb_contains_both_endpoints() {
        let aabb = sweep_aabb(Point::new(0.0, 0.0), Point::new(5.0, -3.0), 0.5);
        assert!(aabb.mins.x <= 0.0 && aabb.mins.x <= 5.0);
        assert!(aabb.maxs.x >= 0.0 && aabb.maxs.x >= 5.0);
        assert!(aabb.mins.y <= -3.0);
        assert!(aabb.maxs.y >= 0.0);
    }
}
