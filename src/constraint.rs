//! Constraint graph and the driver that steps it.
//!
//! Owns the fixed per-substep stage sequence: prepare, warm-start, solve,
//! integrate, relax, restitution, store. The actual contact/joint math is
//! never implemented here; it's delegated to whatever `ContactSolverKernel`
//! / `JointSolverKernel` the host supplies, and manifold generation happens
//! entirely upstream of this module.
//!
//! Stage/block claiming reuses the scheduler wholesale; this module's job
//! is building the right stage list and running it through one `enqueue`
//! call with worker 0 as the driving thread, the other workers spinning.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::body::{BodySim, BodyState};
use crate::config::SolverConfig;
use crate::kernel::{ContactSolverKernel, JointSolverKernel};
use crate::math::Real;
use crate::scheduler::{self, pack_sync_bits, plan_blocks, SolverStage};
use crate::task::TaskRunner;

/// Per-color constraint counts. The contacts/joints themselves live inside
/// the host's kernel; a color here is just "how many of each, in this
/// color" so blocks can be sized. Within one color no two constraints
/// share a body, which is what makes every block in a color-stage safe to
/// run concurrently.
#[derive(Clone, Copy, Debug, Default)]
pub struct GraphColor {
    pub contact_count: usize,
    pub joint_count: usize,
}

impl GraphColor {
    fn is_active(&self) -> bool {
        self.contact_count > 0 || self.joint_count > 0
    }
}

/// Sentinel color index passed to kernel calls for the overflow bucket —
/// constraints that didn't fit any color and are solved single-threaded.
pub const OVERFLOW_COLOR: usize = usize::MAX;

pub struct ConstraintGraph {
    pub colors: Vec<GraphColor>,
    pub overflow_contact_count: usize,
    pub overflow_joint_count: usize,
}

impl ConstraintGraph {
    pub fn new(color_count: usize) -> Self {
        ConstraintGraph {
            colors: vec![GraphColor::default(); color_count],
            overflow_contact_count: 0,
            overflow_joint_count: 0,
        }
    }

    pub fn active_colors(&self) -> impl Iterator<Item = (usize, GraphColor)> + '_ {
        self.colors.iter().enumerate().filter(|(_, c)| c.is_active()).map(|(i, c)| (i, *c))
    }

    pub fn total_contact_count(&self) -> usize {
        self.colors.iter().map(|c| c.contact_count).sum::<usize>() + self.overflow_contact_count
    }

    pub fn total_joint_count(&self) -> usize {
        self.colors.iter().map(|c| c.joint_count).sum::<usize>() + self.overflow_joint_count
    }

    fn has_overflow(&self) -> bool {
        self.overflow_contact_count > 0 || self.overflow_joint_count > 0
    }
}

/// Wraps a raw pointer to data that several solver-block closures touch
/// concurrently on disjoint index ranges — graph coloring and block
/// partitioning both guarantee disjointness, but the borrow checker can't
/// see across a `dyn Fn` boundary, so this asserts `Sync`/`Send` by hand.
///
/// # Safety
/// Every caller in this module only ever indexes a given pointer's target
/// within the `[start, end)` range its own block was assigned, and no two
/// concurrently-running blocks in the same stage are assigned overlapping
/// ranges.
struct UnsafeParallelPtr<T: ?Sized>(*mut T);
unsafe impl<T: ?Sized> Sync for UnsafeParallelPtr<T> {}
unsafe impl<T: ?Sized> Send for UnsafeParallelPtr<T> {}
impl<T: ?Sized> UnsafeParallelPtr<T> {
    fn new(value: &mut T) -> Self {
        UnsafeParallelPtr(value as *mut T)
    }
    #[allow(clippy::mut_from_ref)]
    unsafe fn get(&self) -> &mut T {
        &mut *self.0
    }
}

pub struct ConstraintDriver;

impl ConstraintDriver {
    /// Runs one full step's substeps over `graph`, mutating `sims`/`states`
    /// in place and calling into `contacts`/`joints` for the per-constraint
    /// math. `runner.worker_count()` determines how many workers the stage
    /// graph is planned for.
    pub fn solve<TR, C, J>(
        graph: &ConstraintGraph,
        contacts: &mut C,
        joints: &mut J,
        sims: &mut [BodySim],
        states: &mut [BodyState],
        config: &SolverConfig,
        dt: Real,
        runner: &TR,
    ) where
        TR: TaskRunner,
        C: ContactSolverKernel,
        J: JointSolverKernel,
    {
        let worker_count = runner.worker_count().max(1);
        let h = config.h(dt);
        let body_count = sims.len();
        debug_assert_eq!(sims.len(), states.len());

        let active_colors: Vec<(usize, GraphColor)> = graph.active_colors().collect();
        let has_overflow = graph.has_overflow();
        let total_contacts = graph.total_contact_count();
        let total_joints = graph.total_joint_count();

        let contacts_ptr = UnsafeParallelPtr::new(contacts);
        let joints_ptr = UnsafeParallelPtr::new(joints);
        let sims_ptr = UnsafeParallelPtr::new(sims);
        let states_ptr = UnsafeParallelPtr::new(states);

        let body_blocks = || {
            plan_blocks(body_count, worker_count, config.blocks_per_worker, config.min_body_block_size, 0)
        };
        // Overflow work is always one block: it is claimed by worker 0 with
        // no CAS contention, which is exactly "solved serially".
        let overflow_block = || plan_blocks(1, 1, 1, 1, 0);

        let mut stages: Vec<SolverStage> = Vec::new();

        stages.push(SolverStage::new(
            plan_blocks(total_joints, worker_count, config.blocks_per_worker, 1, 0),
            move |start, end, _w| {
                let joints = unsafe { joints_ptr.get() };
                for i in start..end {
                    joints.prepare(i, h);
                }
            },
        ));

        stages.push(SolverStage::new(
            plan_blocks(total_contacts, worker_count, config.blocks_per_worker, 1, 0),
            move |start, end, _w| {
                let contacts = unsafe { contacts_ptr.get() };
                for i in start..end {
                    contacts.prepare(i, h);
                }
            },
        ));

        for _ in 0..config.sub_step_count {
            stages.push(SolverStage::new(body_blocks(), move |start, end, _w| {
                let sims = unsafe { sims_ptr.get() };
                let states = unsafe { states_ptr.get() };
                crate::body::integrate_velocities(sims, states, start, end, config, h);
            }));

            for (color_index, color) in active_colors.clone() {
                stages.push(SolverStage::new(
                    plan_blocks(color.contact_count.max(color.joint_count), worker_count, config.blocks_per_worker, 1, 0),
                    move |start, end, _w| {
                        let contacts = unsafe { contacts_ptr.get() };
                        let joints = unsafe { joints_ptr.get() };
                        for i in start..end.min(color.contact_count) {
                            contacts.warm_start(color_index, i);
                        }
                        for i in start..end.min(color.joint_count) {
                            joints.warm_start(color_index, i);
                        }
                    },
                ));
            }
            if has_overflow {
                stages.push(SolverStage::new(overflow_block(), move |_s, _e, _w| {
                    let contacts = unsafe { contacts_ptr.get() };
                    let joints = unsafe { joints_ptr.get() };
                    for i in 0..graph.overflow_contact_count {
                        contacts.warm_start(OVERFLOW_COLOR, i);
                    }
                    for i in 0..graph.overflow_joint_count {
                        joints.warm_start(OVERFLOW_COLOR, i);
                    }
                }));
            }

            for _ in 0..crate::config::ITERATIONS {
                for (color_index, color) in active_colors.clone() {
                    stages.push(SolverStage::new(
                        plan_blocks(color.contact_count.max(color.joint_count), worker_count, config.blocks_per_worker, 1, 0),
                        move |start, end, _w| {
                            let contacts = unsafe { contacts_ptr.get() };
                            let joints = unsafe { joints_ptr.get() };
                            for i in start..end.min(color.contact_count) {
                                contacts.solve(color_index, i, true);
                            }
                            for i in start..end.min(color.joint_count) {
                                joints.solve(color_index, i, true);
                            }
                        },
                    ));
                }
                if has_overflow {
                    stages.push(SolverStage::new(overflow_block(), move |_s, _e, _w| {
                        let contacts = unsafe { contacts_ptr.get() };
                        let joints = unsafe { joints_ptr.get() };
                        for i in 0..graph.overflow_contact_count {
                            contacts.solve(OVERFLOW_COLOR, i, true);
                        }
                        for i in 0..graph.overflow_joint_count {
                            joints.solve(OVERFLOW_COLOR, i, true);
                        }
                    }));
                }
            }

            stages.push(SolverStage::new(body_blocks(), move |start, end, _w| {
                let states = unsafe { states_ptr.get() };
                crate::body::integrate_positions(states, start, end, h);
            }));

            for _ in 0..crate::config::RELAX_ITERATIONS {
                for (color_index, color) in active_colors.clone() {
                    stages.push(SolverStage::new(
                        plan_blocks(color.contact_count.max(color.joint_count), worker_count, config.blocks_per_worker, 1, 0),
                        move |start, end, _w| {
                            let contacts = unsafe { contacts_ptr.get() };
                            let joints = unsafe { joints_ptr.get() };
                            for i in start..end.min(color.contact_count) {
                                contacts.solve(color_index, i, false);
                            }
                            for i in start..end.min(color.joint_count) {
                                joints.solve(color_index, i, false);
                            }
                        },
                    ));
                }
                if has_overflow {
                    stages.push(SolverStage::new(overflow_block(), move |_s, _e, _w| {
                        let contacts = unsafe { contacts_ptr.get() };
                        let joints = unsafe { joints_ptr.get() };
                        for i in 0..graph.overflow_contact_count {
                            contacts.solve(OVERFLOW_COLOR, i, false);
                        }
                        for i in 0..graph.overflow_joint_count {
                            joints.solve(OVERFLOW_COLOR, i, false);
                        }
                    }));
                }
            }

            for (color_index, color) in active_colors.clone() {
                stages.push(SolverStage::new(
                    plan_blocks(color.contact_count, worker_count, config.blocks_per_worker, 1, 0),
                    move |start, end, _w| {
                        let contacts = unsafe { contacts_ptr.get() };
                        for i in start..end {
                            contacts.apply_restitution(color_index, i);
                        }
                    },
                ));
            }
            if has_overflow {
                stages.push(SolverStage::new(overflow_block(), move |_s, _e, _w| {
                    let contacts = unsafe { contacts_ptr.get() };
                    for i in 0..graph.overflow_contact_count {
                        contacts.apply_restitution(OVERFLOW_COLOR, i);
                    }
                }));
            }
        }

        stages.push(SolverStage::new(
            plan_blocks(total_contacts, worker_count, config.blocks_per_worker, 1, 0),
            move |start, end, _w| {
                let contacts = unsafe { contacts_ptr.get() };
                for i in start..end {
                    contacts.store_impulses(i);
                }
            },
        ));

        stages.push(SolverStage::new(
            plan_blocks(total_joints, worker_count, config.blocks_per_worker, 1, 0),
            move |start, end, _w| {
                let joints = unsafe { joints_ptr.get() };
                for i in start..end {
                    joints.store_impulses(i);
                }
            },
        ));

        run_stages(&stages, worker_count, runner);
    }
}

/// Drives `stages` across `worker_count` workers with a single
/// `runner.enqueue` call: worker 0 advances through the stage list and
/// publishes sync bits after each one; every other worker spins on those
/// bits and executes whichever stage/block it is told to.
///
/// `start` rather than `thread_index` is used as the worker id on purpose:
/// some task-system backends can reuse a single thread for more than one
/// logical worker slot, so the slot implied by the enqueued range is the
/// only index that's actually stable.
fn run_stages(stages: &[SolverStage], worker_count: usize, runner: &impl TaskRunner) {
    let atomic_sync_bits = AtomicU32::new(0);

    let task = |start: usize, end: usize, _thread_index: usize| {
        let worker_index = start;
        debug_assert_eq!(end, start + 1);

        if worker_index == 0 {
            for (stage_index, stage) in stages.iter().enumerate() {
                let bits = pack_sync_bits(stage_index, 1);
                scheduler::execute_main_stage(stage, &atomic_sync_bits, bits, worker_count);
            }
            atomic_sync_bits.store(scheduler::DONE_SENTINEL, Ordering::Release);
        } else {
            scheduler::run_worker(&atomic_sync_bits, worker_index, |stage_index, sync_index, previous_sync, w| {
                scheduler::execute_stage(&stages[stage_index], previous_sync, sync_index, w, worker_count);
            });
        }
    };

    let handle = runner.enqueue(worker_count, 1, &task);
    runner.finish(handle);
}
