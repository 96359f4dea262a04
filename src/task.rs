//! Task runner abstraction.
//!
//! The core never hard-codes a threading backend; it is handed one through
//! this trait's `enqueue`/`finish` pair. A `rayon`-backed implementation is
//! provided behind the `parallel` feature as the reference backend; without
//! it, everything runs single-threaded through `SequentialTaskRunner`.

/// A unit of parallel work: call `task(start, end, thread_index)` for
/// disjoint sub-ranges of `0..count`, each at least `min_range` long
/// (except possibly the last).
pub trait TaskRunner {
    /// Opaque handle returned by `enqueue`, joined by `finish`.
    type Handle;

    fn worker_count(&self) -> usize;

    fn enqueue<'a>(
        &'a self,
        count: usize,
        min_range: usize,
        task: &'a (dyn Fn(usize, usize, usize) + Sync + 'a),
    ) -> Self::Handle;

    fn finish(&self, handle: Self::Handle);
}

/// Splits `0..count` into `worker_count` near-equal chunks, each at least
/// `min_range` long (except possibly the last chunk). Shared by every
/// `TaskRunner` implementation in this crate.
pub fn split_ranges(count: usize, worker_count: usize, min_range: usize) -> Vec<(usize, usize)> {
    if count == 0 {
        return Vec::new();
    }
    let chunk_count = (count / min_range.max(1)).clamp(1, worker_count.max(1));
    let chunk_size = (count + chunk_count - 1) / chunk_count;

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < count {
        let end = (start + chunk_size).min(count);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Runs every range inline on the calling thread. Used by single-threaded
/// callers and by tests that need deterministic, trivially-reproducible
/// ordering without spinning up a thread pool.
pub struct SequentialTaskRunner;

impl TaskRunner for SequentialTaskRunner {
    type Handle = ();

    fn worker_count(&self) -> usize {
        1
    }

    fn enqueue<'a>(
        &'a self,
        count: usize,
        min_range: usize,
        task: &'a (dyn Fn(usize, usize, usize) + Sync + 'a),
    ) -> Self::Handle {
        for (start, end) in split_ranges(count, 1, min_range) {
            task(start, end, 0);
        }
    }

    fn finish(&self, _handle: Self::Handle) {}
}

#[cfg(feature = "parallel")]
pub use rayon_backend::RayonTaskRunner;

#[cfg(feature = "parallel")]
mod rayon_backend {
    use super::*;

    /// Reference parallel backend: a fixed-size `rayon::ThreadPool`, built
    /// once and reused across every step rather than rebuilt per call.
    pub struct RayonTaskRunner {
        pool: rayon::ThreadPool,
        worker_count: usize,
    }

    impl RayonTaskRunner {
        pub fn new(worker_count: usize) -> Self {
            let worker_count = worker_count.max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .build()
                .expect("failed to build rayon thread pool");
            RayonTaskRunner { pool, worker_count }
        }

        pub fn new_physical() -> Self {
            Self::new(num_cpus::get_physical())
        }
    }

    impl TaskRunner for RayonTaskRunner {
        type Handle = ();

        fn worker_count(&self) -> usize {
            self.worker_count
        }

        fn enqueue<'a>(
            &'a self,
            count: usize,
            min_range: usize,
            task: &'a (dyn Fn(usize, usize, usize) + Sync + 'a),
        ) -> Self::Handle {
            let ranges = split_ranges(count, self.worker_count, min_range);
            self.pool.scope(|scope| {
                for (thread_index, (start, end)) in ranges.into_iter().enumerate() {
                    scope.spawn(move |_| task(start, end, thread_index));
                }
            });
        }

        fn finish(&self, _handle: Self::Handle) {}
    }
}
