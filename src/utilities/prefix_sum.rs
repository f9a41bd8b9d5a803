//! Prefix sums and the binary searches that run against them.
//!
//! The broad phase uses an inclusive scan over per-geom candidate counts to lay out its work
//! packages. A worker holding a package id recovers the `(i, j)` candidate pair by searching for
//! the right-most scan entry not exceeding that id.

use super::thread_dispatcher::ThreadDispatcher;

/// Replaces every element with the sum of itself and all preceding elements. Returns the total.
pub fn inclusive_scan(values: &mut [usize]) -> usize {
    let mut sum = 0;
    for value in values.iter_mut() {
        sum += *value;
        *value = sum;
    }
    sum
}

/// Inclusive scan split across workers.
///
/// Each worker scans one block, block totals are scanned serially, then each block is offset by
/// the total of the blocks before it. Produces the same result as [`inclusive_scan`].
pub fn inclusive_scan_parallel(dispatcher: &ThreadDispatcher, values: &mut [usize]) -> usize {
    let worker_count = dispatcher.thread_count();
    // Small inputs are not worth the two extra passes.
    if worker_count <= 1 || values.len() < worker_count * 1024 {
        return inclusive_scan(values);
    }
    let block_len = values.len().div_ceil(worker_count);
    let mut blocks: Vec<&mut [usize]> = values.chunks_mut(block_len).collect();
    let mut block_sums = vec![0usize; blocks.len()];
    {
        let mut jobs: Vec<(&mut &mut [usize], &mut usize)> =
            blocks.iter_mut().zip(block_sums.iter_mut()).collect();
        dispatcher.for_each_mut(&mut jobs, |_, (block, sum)| {
            **sum = inclusive_scan(&mut ***block);
        });
    }
    let mut offset = 0;
    for sum in block_sums.iter_mut() {
        let block_total = *sum;
        *sum = offset;
        offset += block_total;
    }
    let mut jobs: Vec<(&mut &mut [usize], usize)> =
        blocks.iter_mut().zip(block_sums.iter().copied()).collect();
    dispatcher.for_each_mut(&mut jobs, |_, (block, block_offset)| {
        if *block_offset != 0 {
            for value in block.iter_mut() {
                *value += *block_offset;
            }
        }
    });
    offset
}

/// Index of the first element of a sorted slice that is strictly greater than `value`,
/// or `values.len()` when there is none.
#[inline(always)]
pub fn find_first_greater_than<T: PartialOrd>(values: &[T], value: &T) -> usize {
    values.partition_point(|candidate| candidate <= value)
}

/// Maps a work package id to the flattened `(i, j)` candidate pair it stands for.
///
/// `cumulative` is the inclusive scan of per-box candidate counts. Box `i` owns the packages
/// `cumulative[i - 1]..cumulative[i]`, and the package at offset `k` within that range compares
/// box `i` against box `i + 1 + k`.
#[inline(always)]
pub fn find_indices(package: usize, cumulative: &[usize]) -> (usize, usize) {
    let i = find_first_greater_than(cumulative, &package);
    let base = if i > 0 { cumulative[i - 1] } else { 0 };
    (i, i + (package - base) + 1)
}
