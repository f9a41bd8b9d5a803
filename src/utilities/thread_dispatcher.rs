use crossbeam_utils::thread;
use std::num::NonZeroUsize;

/// Provides worker dispatch for the data-parallel stages of the pipeline.
///
/// Every dispatch is a barrier: it returns only after all workers have finished, so a stage can
/// rely on the complete output of the previous one. Workers are scoped threads; they may borrow
/// from the caller's stack.
///
/// The stages do their own load balancing (strided claims, atomic cursors), so all that is needed
/// here is a way to jumpstart some threads.
#[derive(Debug, Clone)]
pub struct ThreadDispatcher {
    thread_count: usize,
}

impl Default for ThreadDispatcher {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ThreadDispatcher {
    /// Creates a dispatcher with `thread_count` workers. Zero selects the available parallelism.
    pub fn new(thread_count: usize) -> Self {
        let thread_count = if thread_count == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            thread_count
        };
        Self { thread_count }
    }

    /// Gets the number of workers available in the dispatcher.
    #[inline(always)]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Runs `worker_body(worker_index)` on up to `maximum_worker_count` workers and waits for all
    /// of them. The calling thread acts as worker 0.
    pub fn dispatch_workers<F>(&self, maximum_worker_count: usize, worker_body: F)
    where
        F: Fn(usize) + Sync,
    {
        let worker_count = self.thread_count.min(maximum_worker_count);
        if worker_count == 0 {
            return;
        }
        if worker_count == 1 {
            worker_body(0);
            return;
        }
        let worker_body = &worker_body;
        let result = thread::scope(|scope| {
            for worker_index in 1..worker_count {
                scope.spawn(move |_| worker_body(worker_index));
            }
            worker_body(0);
        });
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    /// Invokes `body(index, item)` for every item. Items are split into contiguous blocks, one per
    /// worker, so each worker owns a disjoint region.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], body: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync,
    {
        if items.is_empty() {
            return;
        }
        let worker_count = self.thread_count.min(items.len());
        if worker_count <= 1 {
            for (index, item) in items.iter_mut().enumerate() {
                body(index, item);
            }
            return;
        }
        let block_len = items.len().div_ceil(worker_count);
        let body = &body;
        let result = thread::scope(|scope| {
            for (block_index, block) in items.chunks_mut(block_len).enumerate() {
                let base = block_index * block_len;
                scope.spawn(move |_| {
                    for (offset, item) in block.iter_mut().enumerate() {
                        body(base + offset, item);
                    }
                });
            }
        });
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    /// Invokes `body(chunk_index, chunk)` for every `chunk_len` sized chunk of `data`.
    /// Typically used with `chunk_len` equal to a per-world element count.
    pub fn for_each_chunk_mut<T, F>(&self, data: &mut [T], chunk_len: usize, body: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if chunk_len == 0 {
            return;
        }
        let mut chunks: Vec<&mut [T]> = data.chunks_mut(chunk_len).collect();
        self.for_each_mut(&mut chunks, |index, chunk| body(index, &mut **chunk));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_worker_runs_once() {
        let dispatcher = ThreadDispatcher::new(4);
        let hits: Vec<AtomicUsize> = (0..4).map(|_| AtomicUsize::new(0)).collect();
        dispatcher.dispatch_workers(16, |worker| {
            hits[worker].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|hit| hit.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn worker_count_is_capped() {
        let dispatcher = ThreadDispatcher::new(8);
        let count = AtomicUsize::new(0);
        dispatcher.dispatch_workers(3, |_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn chunks_see_their_own_index() {
        let dispatcher = ThreadDispatcher::new(3);
        let mut data = vec![0usize; 5 * 7];
        dispatcher.for_each_chunk_mut(&mut data, 5, |world, chunk| {
            for value in chunk.iter_mut() {
                *value = world;
            }
        });
        for (index, value) in data.iter().enumerate() {
            assert_eq!(*value, index / 5);
        }
    }
}
