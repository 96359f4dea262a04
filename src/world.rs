//! Top-level step orchestration.
//!
//! `World` owns the per-step data this crate is responsible for — body
//! records/sims/states, shapes, sensors, the constraint graph, and event
//! buffers — and `World::step` runs them through the fixed pipeline: solve
//! substeps, finalize bodies, sweep fast bodies through CCD, refresh
//! sensor overlaps, then run the sleep pass. Collision manifolds, the
//! broad-phase trees, and per-constraint math are supplied by the host
//! through the trait objects in `kernel`/`broadphase`/`task`.

use crate::body::{BodyRecord, BodySim, BodyState};
use crate::broadphase::BroadPhase;
use crate::ccd;
use crate::config::SolverConfig;
use crate::constraint::{ConstraintDriver, ConstraintGraph};
use crate::events::{ContactHitEvent, JointEvent, StepEvents};
use crate::finalize;
use crate::island::{self, AwakeSet, SleepTimers};
use crate::kernel::{ContactSolverKernel, CustomFilterFn, GeometryKernel, JointSolverKernel, PreSolveFn};
use crate::math::Real;
use crate::shape::{Sensor, Shape};
use crate::task::TaskRunner;

pub struct World {
    pub records: Vec<BodyRecord>,
    pub sims: Vec<BodySim>,
    pub states: Vec<BodyState>,
    pub shapes: Vec<Shape>,
    pub sensors: Vec<Sensor>,
    pub graph: ConstraintGraph,
    pub config: SolverConfig,
    pub events: StepEvents,
    pub awake: AwakeSet,
    pub sleep_timers: SleepTimers,
}

impl World {
    pub fn new(config: SolverConfig, color_count: usize) -> Self {
        World {
            records: Vec::new(),
            sims: Vec::new(),
            states: Vec::new(),
            shapes: Vec::new(),
            sensors: Vec::new(),
            graph: ConstraintGraph::new(color_count),
            config,
            events: StepEvents::new(),
            awake: AwakeSet::with_capacity(0),
            sleep_timers: SleepTimers::new(),
        }
    }

    /// Runs one step: the full substep sequence, body finalization,
    /// continuous collision for fast/bullet bodies, sensor overlap
    /// refresh, and the sleep pass, in that order.
    #[allow(clippy::too_many_arguments)]
    pub fn step<TR, C, J, G>(
        &mut self,
        dt: Real,
        runner: &TR,
        contacts: &mut C,
        joints: &mut J,
        geometry: &G,
        broad_phase: &dyn BroadPhase,
        recompute_aabb: &dyn Fn(&Shape, &BodySim) -> parry2d::bounding_volume::Aabb,
        custom_filter: Option<&CustomFilterFn>,
        pre_solve: Option<&PreSolveFn>,
    ) where
        TR: TaskRunner,
        C: ContactSolverKernel,
        J: JointSolverKernel,
        G: GeometryKernel,
    {
        self.events.clear_per_step();

        ConstraintDriver::solve(
            &self.graph,
            contacts,
            joints,
            &mut self.sims,
            &mut self.states,
            &self.config,
            dt,
            runner,
        );

        self.emit_contact_and_joint_events(contacts, joints);

        let mut sleep_velocities = vec![0.0 as Real; self.sims.len()];
        for index in 0..self.sims.len() {
            if !self.awake.is_awake(index) {
                continue;
            }
            let (sim, state, record) = (&mut self.sims[index], &mut self.states[index], &mut self.records[index]);
            let outcome =
                finalize::finalize_body(sim, state, record, &mut self.shapes, broad_phase, recompute_aabb, &self.config, dt);
            sleep_velocities[index] = outcome.sleep_velocity;

            if outcome.moved {
                self.events.body_moves.push(crate::events::BodyMoveEvent {
                    body_id: sim.body_id,
                    transform: sim.transform,
                    fell_asleep: false,
                });
            }
        }

        if self.config.enable_continuous {
            self.run_continuous_collision(geometry, broad_phase, custom_filter, pre_solve);
        }

        self.refresh_sensors(broad_phase, geometry, custom_filter);
        self.run_sleep_pass(dt, &sleep_velocities);
    }

    /// Walks every contact/joint in the same flat index space
    /// `store_impulses` used and pushes a `ContactHitEvent`/`JointEvent` for
    /// whichever ones crossed their threshold this step.
    fn emit_contact_and_joint_events<C, J>(&mut self, contacts: &C, joints: &J)
    where
        C: ContactSolverKernel,
        J: JointSolverKernel,
    {
        for index in 0..self.graph.total_contact_count() {
            let Some(hit) = contacts.contact_hit_candidate(index) else { continue };
            if hit.max_normal_velocity > self.config.contact_hit_threshold && hit.total_normal_impulse > 0.0 {
                self.events.contact_hits.push(ContactHitEvent {
                    shape_id_a: hit.shape_id_a,
                    shape_id_b: hit.shape_id_b,
                    point: hit.point,
                    normal: hit.normal,
                    approach_speed: hit.max_normal_velocity,
                });
            }
        }

        for index in 0..self.graph.total_joint_count() {
            let Some((joint_id, reaction)) = joints.joint_event_candidate(index) else { continue };
            self.events.joint_events.push(JointEvent { joint_id, force: reaction.force, torque: reaction.torque });
        }
    }

    fn run_continuous_collision<G: GeometryKernel>(
        &mut self,
        geometry: &G,
        broad_phase: &dyn BroadPhase,
        custom_filter: Option<&CustomFilterFn>,
        pre_solve: Option<&PreSolveFn>,
    ) {
        for index in 0..self.sims.len() {
            let sim = &self.sims[index];
            let is_fast = sim.flags.contains(crate::flags::BodyFlags::IS_FAST)
                || sim.flags.contains(crate::flags::BodyFlags::IS_BULLET);
            if !is_fast || !self.awake.is_awake(index) {
                continue;
            }

            let body_id = sim.body_id;
            let body_shapes: Vec<(u32, &Shape)> = self
                .shapes
                .iter()
                .enumerate()
                .filter(|(_, s)| s.body_id == body_id)
                .map(|(i, s)| (i as u32, s))
                .collect();

            // Bounded: a fast body sweeping through a dense curtain of
            // sensors only needs to know it crossed them, not an unbounded
            // log of every one.
            let mut sensor_hits: arrayvec::ArrayVec<(u32, crate::handle::Visitor), { crate::config::MAX_CONTINUOUS_SENSOR_HITS }> =
                arrayvec::ArrayVec::new();
            let result = ccd::solve_continuous(
                body_id,
                sim,
                &body_shapes,
                geometry,
                broad_phase,
                &self.shapes,
                crate::math::CORE_FRACTION,
                custom_filter,
                pre_solve,
                |sensor_index, visitor| {
                    let _ = sensor_hits.try_push((sensor_index, visitor));
                },
            );

            for (sensor_index, visitor) in sensor_hits {
                if let Some(sensor) = self.sensors.get_mut(sensor_index as usize) {
                    sensor.hits.push(visitor);
                }
            }

            if let Some(hit) = result {
                let sim = &mut self.sims[index];
                sim.flags |= crate::flags::BodyFlags::HAD_TIME_OF_IMPACT;
                let (xf1, xf2) = sim.sweep_transforms();
                let position = crate::math::lerp(xf1.position, xf2.position, hit.fraction);
                let rotation = crate::math::nlerp(sim.rotation0, sim.transform.rotation, hit.fraction);
                sim.center = position + rotation.transform_vector(&sim.local_center);
                sim.transform.rotation = rotation;
                sim.sync_transform_position();
            }

            // Whether or not a sweep hit was found, the body has been
            // advanced as far as it will go this step: the next step's
            // sweep starts from here.
            let sim = &mut self.sims[index];
            sim.center0 = sim.center;
            sim.rotation0 = sim.transform.rotation;
        }
    }

    fn refresh_sensors<G: GeometryKernel>(&mut self, broad_phase: &dyn BroadPhase, geometry: &G, custom_filter: Option<&CustomFilterFn>) {
        for sensor_index in 0..self.sensors.len() {
            let sensor_shape_id = self.sensors[sensor_index].shape_id;
            let sensor_shape = self.shapes[sensor_shape_id as usize].clone();
            let sensor_transform = self.sims[sensor_shape.body_id as usize].transform;
            {
                let sensor = &mut self.sensors[sensor_index];
                let sims = &self.sims;
                crate::sensor::query_sensor(
                    sensor,
                    sensor_shape_id,
                    &sensor_shape,
                    sensor_transform,
                    broad_phase,
                    &self.shapes,
                    &|body_id: u32| sims[body_id as usize].transform,
                    geometry,
                    custom_filter,
                );
            }
            let sensor = &mut self.sensors[sensor_index];
            crate::sensor::finish_sensor_step(sensor, &mut self.events.sensor_begin_touches, &mut self.events.sensor_end_touches);
        }
    }

    fn run_sleep_pass(&mut self, dt: Real, sleep_velocities: &[Real]) {
        island::accumulate_sleep_timers(&self.records, sleep_velocities, &mut self.sleep_timers, dt);

        // Only islands with at least one currently awake body are candidates:
        // an island that already went to sleep has no awake body left to flag
        // it, so it is never re-selected and re-emitted every subsequent step.
        let island_ids: std::collections::BTreeSet<u32> = self
            .records
            .iter()
            .enumerate()
            .filter(|(index, _)| self.awake.is_awake(*index))
            .map(|(_, r)| r.island_id)
            .collect();
        let ready = island::islands_ready_to_sleep(island_ids.into_iter(), &self.sleep_timers, &self.config);

        for island_id in ready {
            island::sleep_island(island_id, &self.records, &mut self.states, &mut self.awake);
            for (index, record) in self.records.iter().enumerate() {
                if record.island_id == island_id {
                    self.events.body_moves.push(crate::events::BodyMoveEvent {
                        body_id: self.sims[index].body_id,
                        transform: self.sims[index].transform,
                        fell_asleep: true,
                    });
                }
            }
        }
    }
}
