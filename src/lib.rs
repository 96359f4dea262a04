//! A 2D rigid-body solver core: parallel graph-colored constraint solving,
//! continuous collision for fast/bullet bodies, and a deterministic sensor
//! overlap engine.
//!
//! This crate owns the numerical and scheduling machinery; it does not
//! generate collision manifolds, build broad-phase trees, or implement
//! per-contact/per-joint math itself — those are supplied by the host
//! through the traits in [`kernel`], [`broadphase`], and [`task`].

pub mod body;
pub mod broadphase;
pub mod ccd;
pub mod config;
pub mod constraint;
pub mod events;
pub mod finalize;
pub mod flags;
pub mod handle;
pub mod island;
pub mod kernel;
pub mod math;
pub mod scheduler;
pub mod sensor;
pub mod shape;
pub mod task;
pub mod world;

pub use body::{BodyRecord, BodySim, BodyState, BodyType};
pub use config::SolverConfig;
pub use constraint::{ConstraintDriver, ConstraintGraph, GraphColor};
pub use events::{BodyMoveEvent, ContactHitEvent, JointEvent, SensorBeginTouchEvent, SensorEndTouchEvent, StepEvents};
pub use flags::BodyFlags;
pub use handle::{GenerationalArena, Handle, Visitor};
pub use math::{Point, Real, Rotation, Transform, Vector};
pub use shape::{Filter, Sensor, Shape, ShapeEventFlags, ShapeGeometry};
pub use world::World;
