use std::{
    num::NonZeroUsize,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Splits row-oriented work across a bounded pool of worker threads.
///
/// Parallelism is an explicit per-partitioner setting rather than process-wide
/// state, so serial and parallel paths can be exercised side by side.
#[derive(Clone, Copy, Debug)]
pub struct Partitioner {
    enabled: bool,
    workers: Option<NonZeroUsize>,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: None,
        }
    }
}

impl Partitioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A partitioner that always runs work on the calling thread.
    pub fn serial() -> Self {
        Self {
            enabled: false,
            workers: None,
        }
    }

    /// Caps the worker pool instead of using every logical processor.
    pub fn with_workers(workers: NonZeroUsize) -> Self {
        Self {
            enabled: true,
            workers: Some(workers),
        }
    }

    fn worker_count(&self) -> usize {
        if !self.enabled {
            return 1;
        }
        match self.workers {
            Some(n) => n.get(),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    // Over-partition ~10x relative to the pool so uneven per-row costs
    // (palette lookups vs straight copies) still balance out.
    fn chunk_size(total_units: usize, workers: usize) -> usize {
        (total_units / (workers * 10)).max(1)
    }

    /// Executes `work` over `[0, total_units)` split into contiguous half-open
    /// ranges and returns once every unit has been processed exactly once.
    ///
    /// Ranges may run on multiple threads in unspecified order; `work` must be
    /// order-independent.
    pub fn run(&self, total_units: usize, work: impl Fn(usize, usize) + Sync) {
        let workers = self.worker_count();
        if workers <= 1 || total_units <= 1 {
            work(0, total_units);
            return;
        }

        let chunk = Self::chunk_size(total_units, workers);
        let cursor = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            let cursor = &cursor;
            let work = &work;
            for _ in 0..workers {
                scope.spawn(move || {
                    loop {
                        let start = cursor.fetch_add(chunk, Ordering::Relaxed);
                        if start >= total_units {
                            break;
                        }
                        work(start, (start + chunk).min(total_units));
                    }
                });
            }
        });
    }

    /// Row-buffer variant of [`run`](Self::run): splits `dst` into row chunks
    /// and hands each claimed chunk to `work` as `(start_row, rows)`.
    ///
    /// `dst.len()` must be a whole number of `row_len` rows.
    pub fn run_rows(
        &self,
        dst: &mut [u8],
        row_len: usize,
        work: impl Fn(usize, &mut [u8]) + Sync,
    ) {
        if row_len == 0 || dst.is_empty() {
            return;
        }
        let rows = dst.len() / row_len;
        let workers = self.worker_count();
        if workers <= 1 || rows <= 1 {
            work(0, dst);
            return;
        }

        let chunk_rows = Self::chunk_size(rows, workers);
        // Chunks are pre-split and claimed dynamically from a shared cursor,
        // so each worker holds exclusive access to the rows it processes.
        let queue = Mutex::new(dst.chunks_mut(chunk_rows * row_len).enumerate());
        std::thread::scope(|scope| {
            let queue = &queue;
            let work = &work;
            for _ in 0..workers {
                scope.spawn(move || {
                    loop {
                        let next = queue.lock().ok().and_then(|mut chunks| chunks.next());
                        let Some((i, chunk)) = next else { break };
                        work(i * chunk_rows, chunk);
                    }
                });
            }
        });
    }
}
