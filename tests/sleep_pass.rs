//! Black-box: a world with one quiescent dynamic body falls asleep after
//! its island's timer crosses `time_to_sleep`, emitting exactly one
//! `fellAsleep` body move event, and repeated runs of the same world setup
//! produce an identical event stream.

use std::num::NonZeroU32;

use parry2d::bounding_volume::Aabb;
use solver2d::body::{BodyRecord, BodySim, BodyType};
use solver2d::kernel::{ContactSolverKernel, JointReaction, JointSolverKernel};
use solver2d::task::SequentialTaskRunner;
use solver2d::{BodyFlags, BodyMoveEvent, BodyState, Point, Real, Rotation, SolverConfig, Transform, Vector, World};

struct NullBroadPhase;
impl solver2d::broadphase::BroadPhase for NullBroadPhase {
    fn query(
        &self,
        _tree: solver2d::broadphase::TreeIndex,
        _aabb: &Aabb,
        _mask_bits: u64,
        _callback: &mut dyn FnMut(u32, u64) -> bool,
    ) {
    }
    fn enlarge_proxy(&self, _proxy: solver2d::broadphase::ProxyKey, _fat_aabb: Aabb) {}
    fn buffer_move(&self, _proxy: solver2d::broadphase::ProxyKey) {}
}

struct NoContacts;
impl ContactSolverKernel for NoContacts {
    fn prepare(&mut self, _index: usize, _h: Real) {}
    fn warm_start(&mut self, _color_index: usize, _index: usize) {}
    fn solve(&mut self, _color_index: usize, _index: usize, _use_bias: bool) {}
    fn apply_restitution(&mut self, _color_index: usize, _index: usize) {}
    fn store_impulses(&mut self, _index: usize) {}
    fn contact_hit_candidate(&self, _index: usize) -> Option<solver2d::kernel::ContactHitCandidate> {
        None
    }
}

struct NoJoints;
impl JointSolverKernel for NoJoints {
    fn prepare(&mut self, _index: usize, _h: Real) {}
    fn warm_start(&mut self, _color_index: usize, _index: usize) {}
    fn solve(&mut self, _color_index: usize, _index: usize, _use_bias: bool) -> JointReaction {
        JointReaction::default()
    }
    fn store_impulses(&mut self, _index: usize) {}
    fn joint_event_candidate(&self, _index: usize) -> Option<(u32, JointReaction)> {
        None
    }
}

struct NoGeometry;
impl solver2d::kernel::GeometryKernel for NoGeometry {
    fn shape_distance(&self, _input: &solver2d::kernel::DistanceInput) -> solver2d::kernel::DistanceOutput {
        solver2d::kernel::DistanceOutput { distance: 0.0, point_a: Point::origin(), point_b: Point::origin() }
    }
    fn time_of_impact(&self, _input: &solver2d::kernel::ToiInput) -> solver2d::kernel::ToiOutput {
        solver2d::kernel::ToiOutput { fraction: 1.0, point: Point::origin(), normal: Vector::zeros() }
    }
}

fn new_resting_world() -> World {
    let mut config = SolverConfig::default();
    config.gravity = Vector::zeros();
    config.enable_continuous = false;
    config.sub_step_count = 4;

    let mut world = World::new(config, 0);
    world.records.push(BodyRecord {
        body_type: BodyType::Dynamic,
        flags: BodyFlags::empty(),
        sleep_time: 0.0,
        sleep_threshold: 0.05,
        enable_sleep: true,
        island_id: 0,
        generation: NonZeroU32::new(1).unwrap(),
        user_data: 0,
        head_shape_id: None,
        body_move_index: 0,
    });
    world.sims.push(BodySim {
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
    });
    world.states.push(BodyState::identity());
    world.awake = solver2d::island::AwakeSet::with_capacity(1);
    world
}

fn run_steps(world: &mut World, steps: usize) -> Vec<(u32, bool)> {
    let runner = SequentialTaskRunner;
    let mut contacts = NoContacts;
    let mut joints = NoJoints;
    let geometry = NoGeometry;
    let broad_phase = NullBroadPhase;
    let recompute = |_s: &solver2d::Shape, _b: &BodySim| Aabb::new(Point::origin(), Point::origin());

    let mut moves: Vec<(u32, bool)> = Vec::new();
    for _ in 0..steps {
        world.step(1.0 / 60.0, &runner, &mut contacts, &mut joints, &geometry, &broad_phase, &recompute, None, None);
        moves.extend(world.events.body_moves.iter().map(|e: &BodyMoveEvent| (e.body_id, e.fell_asleep)));
    }
    moves
}

#[test]
fn quiescent_body_sleeps_after_time_to_sleep_and_emits_one_event() {
    let mut world = new_resting_world();
    // time_to_sleep = 0.5s at dt = 1/60s -> ready on the 30th step.
    let moves = run_steps(&mut world, 40);

    let asleep_events: Vec<_> = moves.iter().filter(|(_, fell_asleep)| *fell_asleep).collect();
    assert_eq!(asleep_events.len(), 1, "body must fall asleep exactly once: {moves:?}");
    assert_eq!(asleep_events[0].0, 0);
    assert!(!world.awake.is_awake(0));
}

#[test]
fn identical_world_setup_produces_identical_event_stream() {
    let mut world_a = new_resting_world();
    let mut world_b = new_resting_world();

    let moves_a = run_steps(&mut world_a, 40);
    let moves_b = run_steps(&mut world_b, 40);

    assert_eq!(moves_a, moves_b);
}
