//! Per-step event buffers.
//!
//! Every event type here is produced once per step and handed to the host
//! as a plain slice; nothing is retained across steps except the
//! double-buffered sensor overlap sets in `shape::Sensor` and the
//! double-buffered end-touch arrays below (needed so a reader draining last
//! step's end events can't race the sensor task writing this step's).

use crate::handle::Visitor;
use crate::math::{Point, Vector};

/// Emitted for every awake, non-static body each step, whether or not it
/// actually moved — a host can cheaply filter on `BodyFinalizeOutcome` if
/// it only wants bodies that moved.
#[derive(Clone, Copy, Debug)]
pub struct BodyMoveEvent {
    pub body_id: u32,
    pub transform: crate::math::Transform,
    pub fell_asleep: bool,
}

/// Emitted when a joint's reaction force/torque crosses its configured
/// break threshold.
#[derive(Clone, Copy, Debug)]
pub struct JointEvent {
    pub joint_id: u32,
    pub force: crate::math::Real,
    pub torque: crate::math::Real,
}

/// Emitted when a contact's peak approach speed exceeds
/// `SolverConfig::contact_hit_threshold`.
#[derive(Clone, Copy, Debug)]
pub struct ContactHitEvent {
    pub shape_id_a: u32,
    pub shape_id_b: u32,
    pub point: Point,
    pub normal: Vector,
    pub approach_speed: crate::math::Real,
}

#[derive(Clone, Copy, Debug)]
pub struct SensorBeginTouchEvent {
    pub sensor_shape_id: u32,
    pub visitor: Visitor,
}

#[derive(Clone, Copy, Debug)]
pub struct SensorEndTouchEvent {
    pub sensor_shape_id: u32,
    pub visitor_shape_id: u32,
}

/// Double-buffered end-touch storage. The sensor task writes into
/// `current` while a host reads `previous` (last step's events) without
/// synchronization; `swap` is called once per step after the host has
/// finished reading.
#[derive(Default)]
pub struct DoubleBufferedEndEvents {
    buffers: [Vec<SensorEndTouchEvent>; 2],
    write_index: usize,
}

impl DoubleBufferedEndEvents {
    pub fn new() -> Self {
        DoubleBufferedEndEvents { buffers: [Vec::new(), Vec::new()], write_index: 0 }
    }

    pub fn push(&mut self, event: SensorEndTouchEvent) {
        self.buffers[self.write_index].push(event);
    }

    pub fn current(&self) -> &[SensorEndTouchEvent] {
        &self.buffers[self.write_index]
    }

    pub fn previous(&self) -> &[SensorEndTouchEvent] {
        &self.buffers[1 - self.write_index]
    }

    /// Clears what is about to become the new write buffer and flips.
    pub fn swap(&mut self) {
        self.write_index = 1 - self.write_index;
        self.buffers[self.write_index].clear();
    }
}

#[derive(Default)]
pub struct StepEvents {
    pub body_moves: Vec<BodyMoveEvent>,
    pub joint_events: Vec<JointEvent>,
    pub contact_hits: Vec<ContactHitEvent>,
    pub sensor_begin_touches: Vec<SensorBeginTouchEvent>,
    pub sensor_end_touches: DoubleBufferedEndEvents,
}

impl StepEvents {
    pub fn new() -> Self {
        StepEvents {
            body_moves: Vec::new(),
            joint_events: Vec::new(),
            contact_hits: Vec::new(),
            sensor_begin_touches: Vec::new(),
            sensor_end_touches: DoubleBufferedEndEvents::new(),
        }
    }

    pub fn clear_per_step(&mut self) {
        self.body_moves.clear();
        self.joint_events.clear();
        self.contact_hits.clear();
        self.sensor_begin_touches.clear();
        self.sensor_end_touches.swap();
    }
}
