//! Shape data model.
//!
//! Manifold generation and broad-phase tree internals live outside this
//! crate; this module only carries the data a shape needs to participate
//! in CCD and sensor queries: its geometry, filter, cached AABBs, and (for
//! sensors) the double-buffered overlap sets.

use std::num::NonZeroU32;

use parry2d::bounding_volume::Aabb;
use parry2d::shape::{Ball, Capsule, ConvexPolygon, Segment};

use crate::handle::Visitor;
use crate::math::Point;

/// Geometric primitive carried by a shape. `ChainSegment` is a segment with
/// the two neighboring chain vertices attached as "ghost" points, used for
/// seamless terrain: the ghost points let a sweeping body tell whether it
/// is crossing into or out of the segment's solid side, which is what
/// `ccd::chain_segment_early_out` uses them for.
#[derive(Clone, Debug)]
pub enum ShapeGeometry {
    Circle(Ball),
    Capsule(Capsule),
    Polygon(ConvexPolygon),
    Segment(Segment),
    ChainSegment { ghost1: Point, segment: Segment, ghost2: Point },
}

/// Collision filter: `category` is this shape's membership bits, `mask` is
/// the set of categories it is willing to collide with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u64,
    pub mask_bits: u64,
    pub group_index: i32,
}

impl Default for Filter {
    fn default() -> Self {
        Filter { category_bits: 1, mask_bits: u64::MAX, group_index: 0 }
    }
}

impl Filter {
    /// Standard category/mask/group test: a nonzero matching group index
    /// overrides the category/mask test (positive = always collide,
    /// negative = never).
    pub fn should_collide(a: &Filter, b: &Filter) -> bool {
        if a.group_index == b.group_index && a.group_index != 0 {
            return a.group_index > 0;
        }
        (a.category_bits & b.mask_bits) != 0 && (b.category_bits & a.mask_bits) != 0
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ShapeEventFlags: u8 {
        const ENABLE_SENSOR_EVENTS    = 1 << 0;
        const ENABLE_CONTACT_EVENTS   = 1 << 1;
        const ENABLE_PRE_SOLVE_EVENTS = 1 << 2;
        const ENABLE_CUSTOM_FILTERING = 1 << 3;
    }
}

/// Sentinel stored in `Shape::sensor_index` for shapes that are not sensors.
pub const NO_SENSOR: u32 = u32::MAX;

#[derive(Clone, Debug)]
pub struct Shape {
    pub geometry: ShapeGeometry,
    pub filter: Filter,
    pub events: ShapeEventFlags,
    pub aabb: Aabb,
    pub fat_aabb: Aabb,
    pub enlarged_aabb: bool,
    pub broad_phase_proxy: u32,
    pub body_id: u32,
    pub generation: NonZeroU32,
    /// Index into the world's sensor array, or `NO_SENSOR`.
    pub sensor_index: u32,
    /// Intrusive singly-linked list of shapes owned by the same body.
    pub next_shape_id: Option<u32>,
    pub local_centroid: Point,
}

impl Shape {
    pub fn is_sensor(&self) -> bool {
        self.sensor_index != NO_SENSOR
    }
}

/// A sensor's double-buffered overlap state plus CCD-injected hits.
///
/// Invariant: after the sensor task runs for this sensor, `overlaps2` is
/// strictly ascending by `shape_id` with no duplicates.
#[derive(Clone, Debug, Default)]
pub struct Sensor {
    pub shape_id: u32,
    /// Previous step's unique, sorted overlaps.
    pub overlaps1: Vec<Visitor>,
    /// This step's overlaps, built fresh then sorted/deduplicated.
    pub overlaps2: Vec<Visitor>,
    /// Hits injected asynchronously by CCD, merged into `overlaps2` at the
    /// start of the next sensor task and then cleared.
    pub hits: Vec<Visitor>,
}

impl Sensor {
    pub fn new(shape_id: u32) -> Self {
        Sensor { shape_id, overlaps1: Vec::new(), overlaps2: Vec::new(), hits: Vec::new() }
    }
}
