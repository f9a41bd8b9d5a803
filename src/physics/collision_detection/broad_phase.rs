//! Sort-based sweep-and-prune broad phase, batched across worlds.
//!
//! Each world is processed independently through the same sequence of stages, every stage a
//! barrier for the next:
//!
//! 1. [`BroadPhase::project`] projects each world-space geom box onto the sweep direction.
//! 2. [`BroadPhase::sort`] sorts each world's boxes by interval start.
//! 3. [`BroadPhase::reorder`] gathers the boxes into sorted order.
//! 4. [`BroadPhase::prepare`] counts, for every sorted box, the later boxes whose interval
//!    starts before its interval ends.
//! 5. [`BroadPhase::scan`] turns those counts into an inclusive prefix sum over all worlds; its
//!    total is the number of work packages.
//! 6. [`BroadPhase::sweep`] runs an oversubscribed pool of logical workers over the packages,
//!    each package being one candidate pair that gets a full box test.
//!
//! Accepted pairs go to a fixed-capacity per-world [`FixedArena`]; pairs past its capacity are
//! dropped and counted.

use crate::physics::data::Data;
use crate::utilities::collections::fixed_arena::FixedArena;
use crate::utilities::collections::lsb_radix_sort::{sort_u32, sortable_key};
use crate::utilities::prefix_sum::{find_first_greater_than, find_indices, inclusive_scan_parallel};
use crate::utilities::thread_dispatcher::ThreadDispatcher;
use crate::utilities::BoundingBox;
use glam::Vec3;
use tracing::{debug, instrument, warn};

/// Unordered pair of geoms of one world whose boxes overlap, stored as `(min, max)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlapPair {
    pub a: usize,
    pub b: usize,
}

impl OverlapPair {
    /// Creates the canonical pair of two geom indices.
    #[inline(always)]
    pub fn new(i: usize, j: usize) -> Self {
        Self {
            a: i.min(j),
            b: i.max(j),
        }
    }
}

/// Outcome of one broad phase pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadPhaseSummary {
    /// Candidate pairs that received a full box test.
    pub work_packages: usize,
    /// Pairs stored per world.
    pub overlaps: Vec<usize>,
    /// Pairs dropped per world because the world's buffer was full.
    pub dropped: Vec<usize>,
}

/// Stages of the sweep-and-prune broad phase. All of them operate on [`Data`] scratch.
pub struct BroadPhase;

impl BroadPhase {
    /// Widens a projected interval so that rounding in the projection can never separate two
    /// boxes that overlap.
    #[inline(always)]
    fn pad(center: f32, radius: f32) -> f32 {
        4.0 * f32::EPSILON * (center.abs() + radius)
    }

    /// Projects every world box onto `direction`, recording sortable start keys, end values and
    /// the identity permutation. Also clears the overlap buffers.
    pub fn project(dispatcher: &ThreadDispatcher, direction: Vec3, data: &mut Data) {
        let ngeom = data.ngeom();
        let buffers = &mut data.broad_phase;
        for arena in buffers.overlaps.iter_mut() {
            arena.reset();
        }
        if ngeom == 0 {
            return;
        }
        let abs_direction = direction.abs();
        let boxes = &data.geom_world_aabb;
        let mut worlds: Vec<_> = buffers
            .sort_keys
            .chunks_mut(ngeom)
            .zip(buffers.box_ends.chunks_mut(ngeom))
            .zip(buffers.sort_indices.chunks_mut(ngeom))
            .collect();
        dispatcher.for_each_mut(&mut worlds, |world, ((keys, ends), indices)| {
            let world_boxes = &boxes[world * ngeom..(world + 1) * ngeom];
            for (geom, geom_box) in world_boxes.iter().enumerate() {
                let (center, radius) = geom_box.project(direction, abs_direction);
                let pad = Self::pad(center, radius);
                keys[geom] = sortable_key(center - radius - pad);
                ends[geom] = center + radius + pad;
                indices[geom] = geom as u32;
            }
        });
    }

    /// Sorts each world's keys and permutation by interval start. Worlds never mix.
    pub fn sort(dispatcher: &ThreadDispatcher, data: &mut Data) {
        let ngeom = data.ngeom();
        if ngeom == 0 {
            return;
        }
        let buffers = &mut data.broad_phase;
        let mut worlds: Vec<_> = buffers
            .sort_keys
            .chunks_mut(ngeom)
            .zip(buffers.sort_indices.chunks_mut(ngeom))
            .zip(buffers.keys_scratch.chunks_mut(ngeom))
            .zip(buffers.indices_scratch.chunks_mut(ngeom))
            .collect();
        dispatcher.for_each_mut(
            &mut worlds,
            |_, (((keys, indices), keys_scratch), indices_scratch)| {
                sort_u32(&mut **keys, &mut **indices, &mut **keys_scratch, &mut **indices_scratch);
            },
        );
    }

    /// Gathers world boxes into sorted order.
    pub fn reorder(dispatcher: &ThreadDispatcher, data: &mut Data) {
        let ngeom = data.ngeom();
        if ngeom == 0 {
            return;
        }
        let boxes = &data.geom_world_aabb;
        let buffers = &mut data.broad_phase;
        let indices = &buffers.sort_indices;
        dispatcher.for_each_chunk_mut(&mut buffers.sorted_boxes, ngeom, |world, sorted| {
            let base = world * ngeom;
            for (i, sorted_box) in sorted.iter_mut().enumerate() {
                *sorted_box = boxes[base + indices[base + i] as usize];
            }
        });
    }

    /// Counts the candidate partners of each sorted box.
    ///
    /// The partners of sorted box `i` are the boxes `i + 1..limit`, where `limit` is the first
    /// sorted position whose start lies beyond the end of box `i`.
    pub fn prepare(dispatcher: &ThreadDispatcher, data: &mut Data) {
        let ngeom = data.ngeom();
        if ngeom == 0 {
            return;
        }
        let buffers = &mut data.broad_phase;
        let keys = &buffers.sort_keys;
        let ends = &buffers.box_ends;
        let indices = &buffers.sort_indices;
        dispatcher.for_each_chunk_mut(&mut buffers.cumulative, ngeom, |world, counts| {
            let base = world * ngeom;
            let world_keys = &keys[base..base + ngeom];
            for (i, count) in counts.iter_mut().enumerate() {
                let end_key = sortable_key(ends[base + indices[base + i] as usize]);
                *count = find_first_greater_than(&world_keys[i + 1..], &end_key);
            }
        });
    }

    /// Inclusive prefix sum of the candidate counts over all worlds. Returns the package count.
    pub fn scan(dispatcher: &ThreadDispatcher, data: &mut Data) -> usize {
        inclusive_scan_parallel(dispatcher, &mut data.broad_phase.cumulative)
    }

    /// Tests every work package and stores accepted pairs.
    ///
    /// `oversubscription * nworld * ngeom` logical workers claim packages by stride; the threads
    /// of the dispatcher in turn claim logical workers by stride.
    pub fn sweep(
        dispatcher: &ThreadDispatcher,
        data: &mut Data,
        work_packages: usize,
        oversubscription: usize,
    ) {
        let ngeom = data.ngeom();
        let logical_workers = oversubscription * data.nworld() * ngeom;
        if work_packages == 0 || logical_workers == 0 {
            return;
        }
        let buffers = &data.broad_phase;
        let cumulative = &buffers.cumulative;
        let indices = &buffers.sort_indices;
        let sorted = &buffers.sorted_boxes;
        let overlaps: &[FixedArena<OverlapPair>] = &buffers.overlaps;

        let thread_count = dispatcher.thread_count().min(logical_workers);
        dispatcher.dispatch_workers(thread_count, |thread| {
            for worker in (thread..logical_workers).step_by(thread_count) {
                for package in (worker..work_packages).step_by(logical_workers) {
                    let (i, j) = find_indices(package, cumulative);
                    let world = i / ngeom;
                    debug_assert_eq!(world, j / ngeom, "candidate ranges never cross worlds");
                    let geom_a = indices[i] as usize;
                    let geom_b = indices[j] as usize;
                    if geom_a != geom_b && BoundingBox::intersects(&sorted[i], &sorted[j]) {
                        overlaps[world].push(OverlapPair::new(geom_a, geom_b));
                    }
                }
            }
        });
    }

    /// Runs every stage on the world boxes already stored in `data.geom_world_aabb`.
    #[instrument(level = "debug", skip_all, fields(nworld = data.nworld(), ngeom = data.ngeom()))]
    pub fn run(
        dispatcher: &ThreadDispatcher,
        direction: Vec3,
        oversubscription: usize,
        data: &mut Data,
    ) -> BroadPhaseSummary {
        Self::project(dispatcher, direction, data);
        Self::sort(dispatcher, data);
        Self::reorder(dispatcher, data);
        Self::prepare(dispatcher, data);
        let work_packages = Self::scan(dispatcher, data);
        Self::sweep(dispatcher, data, work_packages, oversubscription);

        let overlaps = &data.broad_phase.overlaps;
        let summary = BroadPhaseSummary {
            work_packages,
            overlaps: overlaps.iter().map(FixedArena::len).collect(),
            dropped: overlaps.iter().map(FixedArena::dropped).collect(),
        };
        for (world, &dropped) in summary.dropped.iter().enumerate() {
            if dropped > 0 {
                warn!(
                    world,
                    dropped,
                    capacity = overlaps[world].capacity(),
                    "overlap buffer exhausted, pairs dropped"
                );
            }
        }
        debug!(
            work_packages,
            accepted = summary.overlaps.iter().sum::<usize>(),
            "broad phase finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::model::{GeomDescription, ModelBuilder};
    use crate::physics::simulation_allocation_sizes::CollisionSettings;
    use std::collections::BTreeSet;

    fn boxes_data(worlds: &[Vec<BoundingBox>], capacity: usize) -> Data {
        let ngeom = worlds[0].len();
        let mut builder = ModelBuilder::new();
        let body = builder.add_body();
        for _ in 0..ngeom {
            builder.add_geom(GeomDescription::cuboid(body, Vec3::ONE));
        }
        let model = builder.build().unwrap();
        let settings = CollisionSettings {
            max_overlaps_per_world: capacity,
            worker_threads: 3,
            ..Default::default()
        };
        let mut data = Data::new(&model, worlds.len(), &settings).unwrap();
        for (world, boxes) in worlds.iter().enumerate() {
            data.geom_world_aabb[world * ngeom..(world + 1) * ngeom].copy_from_slice(boxes);
        }
        data
    }

    fn run(data: &mut Data) -> BroadPhaseSummary {
        let direction = CollisionSettings::default().normalized_sweep_direction();
        BroadPhase::run(&ThreadDispatcher::new(3), direction, 5, data)
    }

    fn pairs(data: &mut Data, world: usize) -> BTreeSet<OverlapPair> {
        data.overlap_pairs(world).iter().copied().collect()
    }

    #[test]
    fn finds_chain_of_overlaps() {
        let row: Vec<BoundingBox> = (0..6)
            .map(|i| BoundingBox::new(Vec3::new(i as f32 * 1.5, 0.0, 0.0), Vec3::ONE))
            .collect();
        let mut data = boxes_data(&[row], 64);
        let summary = run(&mut data);
        let expected: BTreeSet<_> = (0..5).map(|i| OverlapPair::new(i, i + 1)).collect();
        assert_eq!(pairs(&mut data, 0), expected);
        assert_eq!(summary.overlaps, vec![5]);
        assert!(summary.work_packages >= 5);
    }

    #[test]
    fn worlds_are_isolated() {
        let stacked = vec![BoundingBox::new(Vec3::ZERO, Vec3::ONE); 3];
        let spread: Vec<_> = (0..3)
            .map(|i| BoundingBox::new(Vec3::new(0.0, 10.0 * i as f32, 0.0), Vec3::ONE))
            .collect();
        let mut data = boxes_data(&[stacked, spread], 64);
        let summary = run(&mut data);
        assert_eq!(summary.overlaps, vec![3, 0]);
        assert_eq!(
            pairs(&mut data, 0),
            [(0, 1), (0, 2), (1, 2)].iter().map(|&(a, b)| OverlapPair::new(a, b)).collect()
        );
    }

    #[test]
    fn overflow_is_counted() {
        let stacked = vec![BoundingBox::new(Vec3::ZERO, Vec3::ONE); 5];
        let mut data = boxes_data(&[stacked], 4);
        let summary = run(&mut data);
        assert_eq!(summary.overlaps, vec![4]);
        assert_eq!(summary.dropped, vec![6]);
        assert_eq!(data.dropped_overlaps(0), 6);

        // A second pass starts from empty buffers.
        let summary = run(&mut data);
        assert_eq!(summary.dropped, vec![6]);
        assert_eq!(data.overlap_pairs(0).len(), 4);
    }
}
