//! Scalar, vector, and rotation aliases shared by every module.
//!
//! Wraps `nalgebra`/`parry2d` types behind a small `math` module rather
//! than spelling out the generic types at every call site.

use nalgebra::{Complex, Point2, Translation2, Unit, UnitComplex, Vector2};

#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(not(feature = "f32"))]
pub type Real = f64;

pub type Vector = Vector2<Real>;
pub type Point = Point2<Real>;
pub type Rotation = UnitComplex<Real>;

/// A rigid transform: an origin point plus a unit-complex rotation.
///
/// Kept distinct from `nalgebra::Isometry2` so that `position` reads as
/// "the body's origin" rather than "a translation" — bodies track center of
/// mass separately, and this origin is derived from it by
/// `position = center - rotate(rotation, local_center)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Point,
    pub rotation: Rotation,
}

impl Transform {
    pub fn identity() -> Self {
        Transform { position: Point::origin(), rotation: Rotation::identity() }
    }

    pub fn new(position: Point, rotation: Rotation) -> Self {
        Transform { position, rotation }
    }

    #[inline]
    pub fn transform_point(&self, p: &Point) -> Point {
        self.position + (self.rotation * p.coords)
    }

    #[inline]
    pub fn transform_vector(&self, v: &Vector) -> Vector {
        self.rotation * v
    }

    #[inline]
    pub fn as_isometry(&self) -> nalgebra::Isometry2<Real> {
        nalgebra::Isometry2::from_parts(Translation2::from(self.position), self.rotation)
    }
}

/// Incremental rotation integration: advances a unit complex number by
/// `delta_angle` radians using a first-order update followed by
/// renormalization, avoiding a `sin`/`cos` call on the hot path. Called once
/// per awake body, per substep.
#[inline]
pub fn integrate_rotation(q: Rotation, delta_angle: Real) -> Rotation {
    let q = q.into_inner();
    let c = q.re - delta_angle * q.im;
    let s = q.im + delta_angle * q.re;
    normalize_complex(c, s)
}

/// Normalized linear interpolation between two rotations, used by CCD to
/// advance a fast body to its time-of-impact fraction without a slerp.
#[inline]
pub fn nlerp(q1: Rotation, q2: Rotation, t: Real) -> Rotation {
    let c1 = q1.into_inner();
    let c2 = q2.into_inner();
    let c = c1 * (1.0 - t) + c2 * t;
    normalize_complex(c.re, c.im)
}

#[inline]
pub fn lerp(p1: Point, p2: Point, t: Real) -> Point {
    p1 + (p2 - p1) * t
}

#[inline]
fn normalize_complex(re: Real, im: Real) -> Rotation {
    let mag_sq = re * re + im * im;
    let inv_mag = if mag_sq > 0.0 { 1.0 / mag_sq.sqrt() } else { 1.0 };
    Unit::new_unchecked(Complex::new(re * inv_mag, im * inv_mag))
}

/// Maximum angle, in radians, a body may rotate in one full step before the
/// angular speed cap kicks in (unless `allow_fast_rotation` is set). A
/// quarter of a half-turn; large enough for legitimately fast spinners,
/// small enough that the no-trig rotation update stays accurate.
pub const MAX_ROTATION: Real = 0.25 * std::f64::consts::PI as Real;

/// The smallest meaningful linear distance, used to avoid degenerate
/// chain-segment tangents.
pub const LINEAR_SLOP: Real = 0.005;

/// AABBs are inflated by this much beyond the shape's true bounds so that
/// near-touching shapes are still picked up by the broad-phase one step
/// before the manifold generator needs them.
pub const SPECULATIVE_DISTANCE: Real = 4.0 * LINEAR_SLOP;

/// The fat-AABB margin applied when a shape's tight AABB escapes its cached
/// fat AABB, amortizing broad-phase re-insertions.
pub const AABB_MARGIN: Real = 0.1;

/// Scalar used to derive a fast body's "core" radius from its minimum
/// extent, for the zero-fraction time-of-impact fallback check.
pub const CORE_FRACTION: Real = 0.25;
