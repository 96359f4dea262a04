//! External numeric/user-callback collaborators.
//!
//! Manifold generation, shape distance, and time-of-impact all live outside
//! this crate: it orchestrates *when* they run and *what happens* with
//! their results, but never implements the geometric kernels themselves.
//! The constraint driver likewise delegates the inner per-contact/per-joint
//! math to a solver kernel supplied by the host.

use crate::math::{Point, Real, Transform, Vector};
use crate::shape::ShapeGeometry;

/// A shape-distance query input/output pair.
pub struct DistanceInput<'a> {
    pub shape_a: &'a ShapeGeometry,
    pub shape_b: &'a ShapeGeometry,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

pub struct DistanceOutput {
    pub distance: Real,
    pub point_a: Point,
    pub point_b: Point,
}

/// A sweep over `[t=0, t=1]`: start/end center + rotation, plus the local
/// center of mass offset needed to recover the body origin at either end.
#[derive(Clone, Copy, Debug)]
pub struct Sweep {
    pub c1: Point,
    pub q1: crate::math::Rotation,
    pub c2: Point,
    pub q2: crate::math::Rotation,
    pub local_center: Vector,
}

pub struct ToiInput<'a> {
    pub shape_a: &'a ShapeGeometry,
    pub shape_b: &'a ShapeGeometry,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    pub max_fraction: Real,
}

#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    pub fraction: Real,
    pub point: Point,
    pub normal: Vector,
}

/// Shape-distance and time-of-impact kernels. A host typically backs these
/// with `parry2d`'s GJK/conservative-advancement routines; this crate
/// treats them as opaque.
pub trait GeometryKernel {
    fn shape_distance(&self, input: &DistanceInput) -> DistanceOutput;
    fn time_of_impact(&self, input: &ToiInput) -> ToiOutput;
}

/// A user-supplied custom filter: `(shape_a, shape_b) -> should_collide`.
pub type CustomFilterFn<'a> = dyn Fn(u32, u32) -> bool + Sync + 'a;

/// A user-supplied pre-solve hook: `(shape_a, shape_b, point, normal) ->
/// keep_going`. Returning `false` vetoes the TOI hit; this is a normal
/// outcome, not an error.
pub type PreSolveFn<'a> = dyn Fn(u32, u32, Point, Vector) -> bool + Sync + 'a;

/// Per-substep hooks a host's contact solver implements. The constraint
/// driver calls these at fixed points in its stage sequence; the manifold
/// math behind each call is entirely the host's concern.
pub trait ContactSolverKernel {
    fn prepare(&mut self, index: usize, h: Real);
    fn warm_start(&mut self, color_index: usize, index: usize);
    /// `use_bias = true` during the biased solve stage, `false` during
    /// relax.
    fn solve(&mut self, color_index: usize, index: usize, use_bias: bool);
    fn apply_restitution(&mut self, color_index: usize, index: usize);
    fn store_impulses(&mut self, index: usize);

    /// Queried once per contact after `store_impulses`, over the same flat
    /// `0..total_contact_count` index space: data needed to decide whether
    /// this contact crossed `SolverConfig::contact_hit_threshold` this
    /// step. `None` if the contact never actually touched (no manifold
    /// points, or the pair was never close enough to produce one).
    fn contact_hit_candidate(&self, index: usize) -> Option<ContactHitCandidate>;
}

/// Per-substep hooks a host's joint solver implements, mirroring
/// `ContactSolverKernel`.
pub trait JointSolverKernel {
    fn prepare(&mut self, index: usize, h: Real);
    fn warm_start(&mut self, color_index: usize, index: usize);
    fn solve(&mut self, color_index: usize, index: usize, use_bias: bool) -> JointReaction;
    fn store_impulses(&mut self, index: usize);

    /// Queried once per joint after `store_impulses`, over the same flat
    /// `0..total_joint_count` index space: `Some((joint_id, reaction))`
    /// when this joint's final reaction force/torque crossed its own
    /// break threshold this step, `None` otherwise. The threshold itself
    /// is a per-joint host property, not something this crate tracks.
    fn joint_event_candidate(&self, index: usize) -> Option<(u32, JointReaction)>;
}

/// The reaction force/torque a joint solve produced, used to decide
/// whether to emit a `JointEvent` this step.
#[derive(Clone, Copy, Debug, Default)]
pub struct JointReaction {
    pub force: Real,
    pub torque: Real,
}

/// Per-contact data needed to decide whether to emit a `ContactHitEvent`
/// this step.
#[derive(Clone, Copy, Debug)]
pub struct ContactHitCandidate {
    pub shape_id_a: u32,
    pub shape_id_b: u32,
    pub point: Point,
    pub normal: Vector,
    /// The largest `-normalVelocity` observed across the manifold's points.
    pub max_normal_velocity: Real,
    pub total_normal_impulse: Real,
}
