//! Block scheduler: lock-free, CAS-based work claiming over a pre-built
//! stage/block graph.
//!
//! A stage's blocks can be claimed by any worker in any order; a single
//! `dyn Fn` block body lets the constraint driver reuse the same scheduler
//! for joint, contact, and body-integration stages alike, rather than
//! hard-coding one claiming loop per stage type.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};

/// One unit of claimable work within a stage: a contiguous `[start, start +
/// count)` range plus the atomic sync index that gates claiming it.
pub struct SolverBlock {
    pub start_index: usize,
    pub count: usize,
    sync_index: AtomicI64,
}

impl SolverBlock {
    pub fn new(start_index: usize, count: usize, initial_sync: i64) -> Self {
        SolverBlock { start_index, count, sync_index: AtomicI64::new(initial_sync) }
    }

    /// Attempts to claim this block for the transition
    /// `expected_prev -> sync_index`. Exactly one worker observes success
    /// for a given `(block, sync_index)` pair.
    fn try_claim(&self, expected_prev: i64, sync_index: i64) -> bool {
        self.sync_index
            .compare_exchange(expected_prev, sync_index, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// A stage groups a flat array of blocks that may be claimed in any order,
/// plus a completion counter the main thread spins on before moving to the
/// next stage. `body`/`color_index` identify *what* the blocks of this
/// stage do; the scheduler itself is agnostic to it.
pub struct SolverStage<'a> {
    pub blocks: Vec<SolverBlock>,
    completion_count: AtomicUsize,
    /// Executes one block. Takes `(start_index, end_index, worker_index)`.
    body: Box<dyn Fn(usize, usize, usize) + Sync + 'a>,
}

impl<'a> SolverStage<'a> {
    pub fn new(
        blocks: Vec<SolverBlock>,
        body: impl Fn(usize, usize, usize) + Sync + 'a,
    ) -> Self {
        SolverStage { blocks, completion_count: AtomicUsize::new(0), body: Box::new(body) }
    }

    fn execute_block(&self, block: &SolverBlock, worker_index: usize) {
        (self.body)(block.start_index, block.start_index + block.count, worker_index);
    }
}

/// Worker-start index formula: distributes `block_count` blocks evenly
/// across `worker_count` workers, remainder-first. Returns `None` when this
/// worker has no blocks to claim (more workers than blocks).
///
/// Pure function: work distribution must not depend on timing, which is
/// what keeps the result deterministic across worker-count changes.
pub fn worker_start_index(worker_index: usize, block_count: usize, worker_count: usize) -> Option<usize> {
    if block_count <= worker_count {
        return if worker_index < block_count { Some(worker_index) } else { None };
    }
    let blocks_per_worker = block_count / worker_count;
    let remainder = block_count - blocks_per_worker * worker_count;
    Some(blocks_per_worker * worker_index + remainder.min(worker_index))
}

/// Runs one stage for one worker: claims blocks forward from its start
/// index (wrapping around), then scans backward from `start - 1` until a
/// claim fails. The "forward wrap then backward scan" claim order is what
/// lets a slow worker's neighbors pick up its unclaimed blocks without
/// contention on a shared cursor.
pub fn execute_stage(stage: &SolverStage, previous_sync: i64, sync_index: i64, worker_index: usize, worker_count: usize) {
    let block_count = stage.blocks.len();
    let Some(start_index) = worker_start_index(worker_index, block_count, worker_count) else {
        return;
    };
    debug_assert!(start_index < block_count);

    let mut completed = 0usize;
    let mut block_index = start_index;
    while stage.blocks[block_index].try_claim(previous_sync, sync_index) {
        stage.execute_block(&stage.blocks[block_index], worker_index);
        completed += 1;
        debug_assert!(completed <= block_count);
        block_index += 1;
        if block_index >= block_count {
            block_index = 0;
        }
    }

    let mut block_index = if start_index == 0 { block_count } else { start_index } - 1;
    loop {
        if !stage.blocks[block_index].try_claim(previous_sync, sync_index) {
            break;
        }
        stage.execute_block(&stage.blocks[block_index], worker_index);
        completed += 1;
        block_index = if block_index == 0 { block_count } else { block_index } - 1;
    }

    stage.completion_count.fetch_add(completed, Ordering::AcqRel);
}

/// Runs a stage from the main thread: publishes `sync_bits`, participates
/// in block-claiming itself as worker 0, then spins until every block has
/// been claimed exactly once.
pub fn execute_main_stage(
    stage: &SolverStage,
    atomic_sync_bits: &AtomicU32,
    sync_bits: u32,
    worker_count: usize,
) {
    let block_count = stage.blocks.len();
    if block_count == 0 {
        return;
    }

    if block_count == 1 {
        stage.execute_block(&stage.blocks[0], 0);
        return;
    }

    atomic_sync_bits.store(sync_bits, Ordering::Release);

    let sync_index = (sync_bits >> 16) as i64;
    debug_assert!(sync_index > 0);
    let previous_sync = sync_index - 1;

    execute_stage(stage, previous_sync, sync_index, 0, worker_count);

    spin_until(|| stage.completion_count.load(Ordering::Acquire) == block_count);
    stage.completion_count.store(0, Ordering::Release);
}

/// Sentinel `atomic_sync_bits` value that tells spinning workers the solve
/// has finished and they should return from their task.
pub const DONE_SENTINEL: u32 = u32::MAX;

/// Packs a stage index and sync index into one word: sync index in the
/// upper 16 bits, stage index in the lower 16 bits.
#[inline]
pub fn pack_sync_bits(stage_index: usize, sync_index: i64) -> u32 {
    debug_assert!(stage_index < (1 << 16));
    debug_assert!((0..(1 << 16)).contains(&sync_index));
    ((sync_index as u32) << 16) | stage_index as u32
}

#[inline]
pub fn unpack_sync_bits(bits: u32) -> (usize, i64) {
    ((bits & 0xFFFF) as usize, (bits >> 16) as i64)
}

/// Worker-side spin loop: spins on `atomic_sync_bits` with a short backoff,
/// yielding to the OS scheduler after a handful of spins, until the word
/// changes or the `DONE_SENTINEL` is observed. Runs
/// `on_stage_change(stage_index, sync_index, previous_sync_index)` for
/// every observed transition.
pub fn run_worker(
    atomic_sync_bits: &AtomicU32,
    worker_index: usize,
    mut on_stage_change: impl FnMut(usize, i64, i64, usize),
) {
    let mut last_sync_bits = 0u32;
    loop {
        let mut spin_count = 0u32;
        let mut sync_bits = atomic_sync_bits.load(Ordering::Acquire);
        while sync_bits == last_sync_bits {
            if spin_count > 5 {
                std::thread::yield_now();
                spin_count = 0;
            } else {
                std::hint::spin_loop();
                std::hint::spin_loop();
                spin_count += 1;
            }
            sync_bits = atomic_sync_bits.load(Ordering::Acquire);
        }

        if sync_bits == DONE_SENTINEL {
            break;
        }

        let (stage_index, sync_index) = unpack_sync_bits(sync_bits);
        debug_assert!(sync_index > 0);
        on_stage_change(stage_index, sync_index, sync_index - 1, worker_index);
        last_sync_bits = sync_bits;
    }
}

#[inline]
fn spin_until(mut done: impl FnMut() -> bool) {
    let mut spin_count = 0u32;
    while !done() {
        if spin_count > 5 {
            std::thread::yield_now();
            spin_count = 0;
        } else {
            std::hint::spin_loop();
            spin_count += 1;
        }
    }
}

/// Computes the number of blocks and per-block sizes for a flat range of
/// `item_count` items: up to `blocks_per_worker * worker_count` blocks,
/// never smaller than `min_block_size` items each.
pub fn plan_blocks(item_count: usize, worker_count: usize, blocks_per_worker: usize, min_block_size: usize, initial_sync: i64) -> Vec<SolverBlock> {
    if item_count == 0 {
        return Vec::new();
    }
    let max_block_count = (blocks_per_worker * worker_count.max(1)).max(1);
    let mut block_size = (item_count + max_block_count - 1) / max_block_count;
    block_size = block_size.max(min_block_size);

    let mut blocks = Vec::new();
    let mut start = 0;
    while start < item_count {
        let count = block_size.min(item_count - start);
        blocks.push(SolverBlock::new(start, count, initial_sync));
        start += count;
    }
    blocks
}
