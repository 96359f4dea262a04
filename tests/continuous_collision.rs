//! Black-box: a fast body sweeping through a static wall is reported with
//! the earliest real time-of-impact fraction, a zero-fraction result is
//! only trusted once the shrunk core circle confirms genuine overlap, and a
//! sensor encountered mid-sweep is captured as a hit rather than a
//! collision.

use std::num::NonZeroU32;

use parry2d::bounding_volume::Aabb;
use parry2d::shape::{Ball, Segment};
use solver2d::body::BodySim;
use solver2d::broadphase::{BroadPhase, ProxyKey, TreeIndex};
use solver2d::ccd::solve_continuous;
use solver2d::kernel::{DistanceInput, DistanceOutput, GeometryKernel, ToiInput, ToiOutput};
use solver2d::shape::{Filter, Shape, ShapeEventFlags, ShapeGeometry, NO_SENSOR};
use solver2d::{BodyFlags, Point, Real, Rotation, Transform, Vector};

/// A static candidate lives only in the `Static` tree, mirroring how a real
/// broad-phase partitions shapes by body type rather than duplicating one
/// shape across every tree.
struct OneCandidateBroadPhase {
    candidate_shape_id: u32,
}
impl BroadPhase for OneCandidateBroadPhase {
    fn query(&self, tree: TreeIndex, _aabb: &Aabb, _mask_bits: u64, callback: &mut dyn FnMut(u32, u64) -> bool) {
        if tree == TreeIndex::Static {
            callback(self.candidate_shape_id, 0);
        }
    }
    fn enlarge_proxy(&self, _proxy: ProxyKey, _fat_aabb: Aabb) {}
    fn buffer_move(&self, _proxy: ProxyKey) {}
}

struct FixedToiKernel {
    fraction: Real,
    distance: Real,
}
impl GeometryKernel for FixedToiKernel {
    fn shape_distance(&self, _input: &DistanceInput) -> DistanceOutput {
        DistanceOutput { distance: self.distance, point_a: Point::origin(), point_b: Point::origin() }
    }
    fn time_of_impact(&self, _input: &ToiInput) -> ToiOutput {
        ToiOutput { fraction: self.fraction, point: Point::new(5.0, 0.0), normal: Vector::new(-1.0, 0.0) }
    }
}

fn bullet_sim(center0: Point, center: Point) -> BodySim {
    BodySim {
        body_id: 0,
        center,
        transform: Transform::new(center, Rotation::identity()),
        local_center: Vector::zeros(),
        center0,
        rotation0: Rotation::identity(),
        inv_mass: 1.0,
        inv_inertia: 1.0,
        linear_damping: 0.0,
        angular_damping: 0.0,
        gravity_scale: 1.0,
        force: Vector::zeros(),
        torque: 0.0,
        min_extent: 0.1,
        max_extent: 0.1,
        flags: BodyFlags::IS_BULLET,
    }
}

fn circle_shape(body_id: u32) -> Shape {
    Shape {
        geometry: ShapeGeometry::Circle(Ball::new(0.1)),
        filter: Filter::default(),
        events: ShapeEventFlags::empty(),
        aabb: Aabb::new(Point::origin(), Point::origin()),
        fat_aabb: Aabb::new(Point::origin(), Point::origin()),
        enlarged_aabb: false,
        broad_phase_proxy: 0,
        body_id,
        generation: NonZeroU32::new(1).unwrap(),
        sensor_index: NO_SENSOR,
        next_shape_id: None,
        local_centroid: Point::origin(),
    }
}

fn wall_shape() -> Shape {
    Shape {
        geometry: ShapeGeometry::Segment(Segment::new(Point::new(5.0, -1.0), Point::new(5.0, 1.0))),
        filter: Filter::default(),
        events: ShapeEventFlags::empty(),
        aabb: Aabb::new(Point::origin(), Point::origin()),
        fat_aabb: Aabb::new(Point::origin(), Point::origin()),
        enlarged_aabb: false,
        broad_phase_proxy: 1,
        body_id: 1,
        generation: NonZeroU32::new(1).unwrap(),
        sensor_index: NO_SENSOR,
        next_shape_id: None,
        local_centroid: Point::new(5.0, 0.0),
    }
}

#[test]
fn bullet_through_thin_wall_reports_a_single_real_time_of_impact() {
    let sim = bullet_sim(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let own_shape = circle_shape(0);
    let wall = wall_shape();
    let all_shapes = vec![own_shape.clone(), wall];
    let body_shapes: Vec<(u32, &Shape)> = vec![(0, &all_shapes[0])];

    let broad_phase = OneCandidateBroadPhase { candidate_shape_id: 1 };
    let kernel = FixedToiKernel { fraction: 0.5, distance: 10.0 };

    let result = solve_continuous(0, &sim, &body_shapes, &kernel, &broad_phase, &all_shapes, 0.25, None, None, |_, _| {});

    let hit = result.expect("a fast body crossing a wall must report a time-of-impact hit");
    assert_eq!(hit.hit_shape_id, 1);
    assert!(hit.fraction > 0.0 && hit.fraction <= 1.0);
}

#[test]
fn zero_fraction_toi_is_rejected_without_core_overlap() {
    let sim = bullet_sim(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let own_shape = circle_shape(0);
    let wall = wall_shape();
    let all_shapes = vec![own_shape.clone(), wall];
    let body_shapes: Vec<(u32, &Shape)> = vec![(0, &all_shapes[0])];

    let broad_phase = OneCandidateBroadPhase { candidate_shape_id: 1 };
    // fraction == 0 but the core circle re-check reports the shapes are not
    // actually touching: the speculative-margin zero must be discarded.
    let kernel = FixedToiKernel { fraction: 0.0, distance: 10.0 };

    let result = solve_continuous(0, &sim, &body_shapes, &kernel, &broad_phase, &all_shapes, 0.25, None, None, |_, _| {});
    assert!(result.is_none());
}

#[test]
fn zero_fraction_toi_is_accepted_with_genuine_core_overlap() {
    let sim = bullet_sim(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let own_shape = circle_shape(0);
    let wall = wall_shape();
    let all_shapes = vec![own_shape.clone(), wall];
    let body_shapes: Vec<(u32, &Shape)> = vec![(0, &all_shapes[0])];

    let broad_phase = OneCandidateBroadPhase { candidate_shape_id: 1 };
    let kernel = FixedToiKernel { fraction: 0.0, distance: 0.0 };

    let result = solve_continuous(0, &sim, &body_shapes, &kernel, &broad_phase, &all_shapes, 0.25, None, None, |_, _| {});
    let hit = result.expect("genuine starting overlap must be accepted at fraction 0");
    assert_eq!(hit.fraction, 0.0);
}

#[test]
fn sensor_encountered_mid_sweep_is_captured_not_collided_with() {
    let sim = bullet_sim(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let own_shape = circle_shape(0);
    let mut sensor_shape = wall_shape();
    sensor_shape.sensor_index = 7;
    let all_shapes = vec![own_shape.clone(), sensor_shape];
    let body_shapes: Vec<(u32, &Shape)> = vec![(0, &all_shapes[0])];

    let broad_phase = OneCandidateBroadPhase { candidate_shape_id: 1 };
    let kernel = FixedToiKernel { fraction: 0.5, distance: 10.0 };

    let mut captured: Vec<(u32, u32)> = Vec::new();
    let result = solve_continuous(0, &sim, &body_shapes, &kernel, &broad_phase, &all_shapes, 0.25, None, None, |sensor_index, visitor| {
        captured.push((sensor_index, visitor.shape_id));
    });

    assert!(result.is_none(), "a sensor must never be reported as a solid time-of-impact hit");
    assert_eq!(captured, vec![(7, 1)]);
}
