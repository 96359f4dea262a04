//! Sensor overlap engine.
//!
//! Each step, every sensor rebuilds its current overlap set from scratch by
//! querying the broad-phase, merges in any hits CCD captured mid-step,
//! sorts and deduplicates by shape id, then diffs the fresh set against
//! last step's to produce begin/end touch events. No per-pair state is
//! kept between steps beyond the two sorted `Visitor` arrays themselves.

use crate::broadphase::{BroadPhase, ALL_TREES};
use crate::events::{DoubleBufferedEndEvents, SensorBeginTouchEvent, SensorEndTouchEvent};
use crate::handle::Visitor;
use crate::kernel::{CustomFilterFn, DistanceInput, GeometryKernel};
use crate::math::{Real, Transform};
use crate::shape::{Filter, Sensor, Shape, ShapeEventFlags};

/// Rebuilds `sensor.overlaps2` for one sensor: queries every broad-phase
/// tree for shapes overlapping the sensor's fat AABB, rejects self, same
/// body, filter mismatches and custom-filter vetoes, confirms the survivors
/// with a precise shape-distance test (an AABB overlap alone is only a
/// broad-phase candidate), merges in `sensor.hits` (cleared afterward),
/// then sorts and deduplicates by shape id.
#[allow(clippy::too_many_arguments)]
pub fn query_sensor<K: GeometryKernel>(
    sensor: &mut Sensor,
    sensor_shape_id: u32,
    sensor_shape: &Shape,
    sensor_transform: Transform,
    broad_phase: &dyn BroadPhase,
    shapes: &[Shape],
    transform_of: &dyn Fn(u32) -> Transform,
    geometry: &K,
    custom_filter: Option<&CustomFilterFn>,
) {
    sensor.overlaps2.clear();
    let aabb = sensor_shape.fat_aabb;

    for &tree in &ALL_TREES {
        broad_phase.query(tree, &aabb, u64::MAX, &mut |shape_id, _user_data| {
            if shape_id == sensor_shape_id {
                return true;
            }
            let other = &shapes[shape_id as usize];
            if other.is_sensor() {
                return true;
            }
            if other.body_id == sensor_shape.body_id {
                return true;
            }
            if !Filter::should_collide(&sensor_shape.filter, &other.filter) {
                return true;
            }
            if sensor_shape.events.contains(ShapeEventFlags::ENABLE_CUSTOM_FILTERING)
                || other.events.contains(ShapeEventFlags::ENABLE_CUSTOM_FILTERING)
            {
                if let Some(filter) = custom_filter {
                    if !filter(sensor_shape_id, shape_id) {
                        return true;
                    }
                }
            }

            let output = geometry.shape_distance(&DistanceInput {
                shape_a: &sensor_shape.geometry,
                shape_b: &other.geometry,
                transform_a: sensor_transform,
                transform_b: transform_of(other.body_id),
                use_radii: true,
            });
            if output.distance >= 10.0 * Real::EPSILON {
                return true;
            }

            sensor.overlaps2.push(Visitor::new(shape_id, other.generation.get()));
            true
        });
    }

    sensor.overlaps2.append(&mut sensor.hits);
    dedupe_sorted(&mut sensor.overlaps2);
}

fn dedupe_sorted(visitors: &mut Vec<Visitor>) {
    visitors.sort_unstable_by_key(|v| v.shape_id);
    visitors.dedup_by_key(|v| v.shape_id);
}

/// Diffs `sensor.overlaps1` (previous step) against `sensor.overlaps2`
/// (this step, already sorted/deduplicated) and emits begin/end events.
/// Both arrays are sorted ascending by `shape_id`; the walk advances both
/// indices together except when a shape id matches across generations, in
/// which case only one index advances so the next iteration naturally
/// produces the paired event on its own.
pub fn diff_and_emit(
    sensor_shape_id: u32,
    prev: &[Visitor],
    curr: &[Visitor],
    begin: &mut Vec<SensorBeginTouchEvent>,
    end: &mut DoubleBufferedEndEvents,
) {
    let mut i = 0;
    let mut j = 0;
    while i < prev.len() && j < curr.len() {
        let p = prev[i];
        let c = curr[j];
        if p.shape_id == c.shape_id {
            if p.generation == c.generation {
                i += 1;
                j += 1;
            } else if p.generation < c.generation {
                end.push(SensorEndTouchEvent { sensor_shape_id, visitor_shape_id: p.shape_id });
                i += 1;
            } else {
                begin.push(SensorBeginTouchEvent { sensor_shape_id, visitor: c });
                j += 1;
            }
        } else if p.shape_id < c.shape_id {
            end.push(SensorEndTouchEvent { sensor_shape_id, visitor_shape_id: p.shape_id });
            i += 1;
        } else {
            begin.push(SensorBeginTouchEvent { sensor_shape_id, visitor: c });
            j += 1;
        }
    }
    while i < prev.len() {
        end.push(SensorEndTouchEvent { sensor_shape_id, visitor_shape_id: prev[i].shape_id });
        i += 1;
    }
    while j < curr.len() {
        begin.push(SensorBeginTouchEvent { sensor_shape_id, visitor: curr[j] });
        j += 1;
    }
}

/// Finishes a sensor's step: runs the diff against the state from last
/// step, then rotates `overlaps2` into `overlaps1` for next step.
pub fn finish_sensor_step(
    sensor: &mut Sensor,
    begin: &mut Vec<SensorBeginTouchEvent>,
    end: &mut DoubleBufferedEndEvents,
) {
    diff_and_emit(sensor.shape_id, &sensor.overlaps1, &sensor.overlaps2, begin, end);
    std::mem::swap(&mut sensor.overlaps1, &mut sensor.overlaps2);
}

/// Emits an end-touch event for every shape a sensor was overlapping at
/// the moment it (or its owning body) is destroyed. Reads `overlaps2`
/// rather than `overlaps1`, since that is always the most recently
/// computed set — a sensor destroyed mid-step, before its own query runs
/// again, still has an up-to-date `overlaps1` at that point, but once
/// `finish_sensor_step` has rotated the buffers `overlaps2` is the correct
/// "currently touching" set to drain.
pub fn destroy_sensor(sensor: &Sensor, end: &mut DoubleBufferedEndEvents) {
    for visitor in &sensor.overlaps2 {
        end.push(SensorEndTouchEvent { sensor_shape_id: sensor.shape_id, visitor_shape_id: visitor.shape_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u32, gen: u32) -> Visitor {
        Visitor::new(id, gen)
    }

    #[test]
    fn unchanged_overlap_emits_nothing() {
        let prev = [v(1, 1), v(2, 1)];
        let curr = [v(1, 1), v(2, 1)];
        let mut begin = Vec::new();
        let mut end = DoubleBufferedEndEvents::new();
        diff_and_emit(99, &prev, &curr, &mut begin, &mut end);
        assert!(begin.is_empty());
        assert_eq!(end.current().len(), 0);
    }

    #[test]
    fn new_and_gone_overlaps_pair_correctly() {
        let prev = [v(1, 1), v(2, 1)];
        let curr = [v(2, 1), v(3, 1)];
        let mut begin = Vec::new();
        let mut end = DoubleBufferedEndEvents::new();
        diff_and_emit(99, &prev, &curr, &mut begin, &mut end);
        assert_eq!(end.current().iter().map(|e| e.visitor_shape_id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(begin.iter().map(|e| e.visitor.shape_id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn regenerated_shape_id_emits_end_then_begin() {
        // shape 5 left and a different shape got reassigned slot/id 5 with a
        // new generation in the same step.
        let prev = [v(5, 1)];
        let curr = [v(5, 2)];
        let mut begin = Vec::new();
        let mut end = DoubleBufferedEndEvents::new();
        diff_and_emit(99, &prev, &curr, &mut begin, &mut end);
        assert_eq!(end.current().len(), 1);
        assert_eq!(end.current()[0].visitor_shape_id, 5);
        assert_eq!(begin.len(), 1);
        assert_eq!(begin[0].visitor, v(5, 2));
    }

    #[test]
    fn dedupe_keeps_one_entry_per_shape_id() {
        let mut visitors = vec![v(3, 1), v(1, 1), v(3, 1), v(2, 1)];
        dedupe_sorted(&mut visitors);
        assert_eq!(visitors.iter().map(|v| v.shape_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
