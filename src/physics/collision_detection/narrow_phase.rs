//! Candidate filtering, bucket grouping and routine dispatch.
//!
//! The broad phase hands over unordered geom pairs per world. [`NarrowPhase::collect`] drops the
//! pairs that can never produce a contact and orders each survivor so that its first geom has
//! the lower type, [`NarrowPhase::group`] lays the survivors out bucket by bucket and
//! [`NarrowPhase::dispatch`] hands contiguous runs of one bucket to that bucket's routine.
//! Buckets without pairs never reach their routine.

use super::collision_task_registry::CollisionTaskRegistry;
use super::contact_manifold::ContactRecord;
use crate::physics::collidables::geom_type::GeomType;
use crate::physics::data::{Data, NarrowPhaseBuffers};
use crate::physics::model::Model;
use crate::physics::simulation_allocation_sizes::CollisionSettings;
use crate::utilities::collections::fixed_arena::FixedArena;
use crate::utilities::thread_dispatcher::ThreadDispatcher;
use crate::utilities::Aamm;
use glam::{Mat3, Vec3};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, instrument, trace};

/// Pairs handed to a routine in one call.
pub const DISPATCH_CHUNK: usize = 32;

/// Below this solmix both weights count as zero.
const MIX_MINVAL: f32 = 1.0e-15;

/// Geom pair of one world routed to a narrow-phase routine. `geom_a` has the lower geometry type;
/// for equal types it has the lower index.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub world: usize,
    pub geom_a: usize,
    pub geom_b: usize,
}

/// Geometric part of a contact as computed by a routine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactGeometry {
    /// Signed surface distance, negative when penetrating.
    pub dist: f32,
    /// Midpoint between the two surfaces.
    pub pos: Vec3,
    /// Unit normal pointing from `geom_a` toward `geom_b`.
    pub normal: Vec3,
}

/// Read-only view of the step state that routines compute against, plus the contact writer.
pub struct NarrowPhaseContext<'a> {
    pub model: &'a Model,
    geom_xpos: &'a [Vec3],
    geom_xmat: &'a [Mat3],
    contacts: &'a [FixedArena<ContactRecord>],
    ngeom: usize,
    pub mpr_tolerance: f32,
    pub mpr_iterations: usize,
}

impl<'a> NarrowPhaseContext<'a> {
    pub fn new(model: &'a Model, data: &'a Data, settings: &CollisionSettings) -> Self {
        Self {
            model,
            geom_xpos: &data.geom_xpos,
            geom_xmat: &data.geom_xmat,
            contacts: &data.contact_arenas,
            ngeom: data.ngeom(),
            mpr_tolerance: settings.mpr_tolerance,
            mpr_iterations: settings.mpr_iterations,
        }
    }

    /// World-space position and rotation of a geom.
    #[inline(always)]
    pub fn pose(&self, world: usize, geom: usize) -> (Vec3, Mat3) {
        let index = world * self.ngeom + geom;
        (self.geom_xpos[index], self.geom_xmat[index])
    }

    /// Distance up to which a pair reports contacts.
    #[inline(always)]
    pub fn margin(&self, pair: &CandidatePair) -> f32 {
        self.model.geom_margin[pair.geom_a].max(self.model.geom_margin[pair.geom_b])
    }

    /// Completes `geometry` with the pair's mixed contact parameters and reserves a slot for it in
    /// the pair's world. Returns false if the contact lies beyond the margin or the world has no
    /// free slot left.
    pub fn emit(&self, pair: &CandidatePair, geometry: ContactGeometry) -> bool {
        let margin = self.margin(pair);
        if !(geometry.dist <= margin) {
            return false;
        }
        let record = self.mix(pair, geometry, margin);
        self.contacts[pair.world].push(record).is_some()
    }

    fn mix(&self, pair: &CandidatePair, geometry: ContactGeometry, margin: f32) -> ContactRecord {
        let model = self.model;
        let (a, b) = (pair.geom_a, pair.geom_b);

        let friction = model.geom_friction[a].max(model.geom_friction[b]);
        let (solmix_a, solmix_b) = (model.geom_solmix[a], model.geom_solmix[b]);
        let mix = match (solmix_a >= MIX_MINVAL, solmix_b >= MIX_MINVAL) {
            (true, true) => solmix_a / (solmix_a + solmix_b),
            (false, false) => 0.5,
            (false, true) => 0.0,
            (true, false) => 1.0,
        };
        let blend = |x: f32, y: f32| mix * x + (1.0 - mix) * y;

        let (solref_a, solref_b) = (model.geom_solref[a], model.geom_solref[b]);
        let solref = if solref_a[0] > 0.0 && solref_b[0] > 0.0 {
            [blend(solref_a[0], solref_b[0]), blend(solref_a[1], solref_b[1])]
        } else {
            // Direct stiffness and damping take the stiffer of the two.
            [solref_a[0].min(solref_b[0]), solref_a[1].min(solref_b[1])]
        };
        let (solimp_a, solimp_b) = (model.geom_solimp[a], model.geom_solimp[b]);
        let solimp = std::array::from_fn(|i| blend(solimp_a[i], solimp_b[i]));

        let gap = model.geom_gap[a].max(model.geom_gap[b]);
        ContactRecord {
            dist: geometry.dist,
            pos: geometry.pos,
            normal: geometry.normal,
            g1: a as i32,
            g2: b as i32,
            includemargin: margin - gap,
            friction: [friction.x, friction.x, friction.y, friction.z, friction.z],
            solref,
            solimp,
            ..ContactRecord::SENTINEL
        }
    }
}

/// Outcome of one narrow phase pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NarrowPhaseSummary {
    /// Overlap pairs that survived filtering.
    pub candidates: usize,
    /// Buckets whose routine ran.
    pub active_buckets: usize,
}

/// Stages of the narrow phase. All of them operate on [`Data`] scratch.
pub struct NarrowPhase;

impl NarrowPhase {
    /// Filters the overlap pairs of every world into candidates and records their buckets.
    ///
    /// A pair is dropped if both geoms sit on the same body, if their contype/conaffinity masks do
    /// not match, if their bodies' envelopes are disjoint or if the table has no routine for
    /// their types.
    pub fn collect(registry: &CollisionTaskRegistry, model: &Model, data: &mut Data) {
        let nbody = data.nbody();
        let buffers = &mut data.narrow_phase;
        buffers.candidates.clear();
        buffers.candidate_buckets.clear();
        for (world, arena) in data.broad_phase.overlaps.iter_mut().enumerate() {
            let envelopes = &data.body_aamm[world * nbody..(world + 1) * nbody];
            for pair in arena.as_slice() {
                let (a, b) = (pair.a, pair.b);
                let (body_a, body_b) = (model.geom_bodyid[a], model.geom_bodyid[b]);
                if body_a == body_b
                    || !model.can_collide(a, b)
                    || !Aamm::intersects(&envelopes[body_a], &envelopes[body_b])
                {
                    continue;
                }
                let Some(bucket) = registry.bucket(model.geom_type[a], model.geom_type[b]) else {
                    continue;
                };
                let (_, swapped) = GeomType::canonical_pair(model.geom_type[a], model.geom_type[b]);
                let (geom_a, geom_b) = if swapped { (b, a) } else { (a, b) };
                buffers.candidates.push(CandidatePair {
                    world,
                    geom_a,
                    geom_b,
                });
                buffers.candidate_buckets.push(bucket);
            }
        }
    }

    /// Counting sort of the candidates by bucket. The order within a bucket is the collection
    /// order.
    pub(crate) fn group(registry: &CollisionTaskRegistry, buffers: &mut NarrowPhaseBuffers) {
        let bucket_count = registry.len();
        buffers.bucket_counts.clear();
        buffers.bucket_counts.resize(bucket_count, 0);
        for &bucket in buffers.candidate_buckets.iter() {
            buffers.bucket_counts[bucket] += 1;
        }

        buffers.bucket_starts.clear();
        buffers.active_buckets.clear();
        let mut start = 0;
        for (bucket, &count) in buffers.bucket_counts.iter().enumerate() {
            buffers.bucket_starts.push(start);
            if count > 0 {
                buffers.active_buckets.push(bucket);
            }
            start += count;
        }

        buffers.grouped.clear();
        buffers
            .grouped
            .resize(buffers.candidates.len(), CandidatePair::default());
        let mut cursors = buffers.bucket_starts.clone();
        for (pair, &bucket) in buffers
            .candidates
            .iter()
            .zip(buffers.candidate_buckets.iter())
        {
            buffers.grouped[cursors[bucket]] = *pair;
            cursors[bucket] += 1;
        }
    }

    /// Runs each active bucket's routine over its grouped pairs.
    ///
    /// Every bucket is split into runs of at most [`DISPATCH_CHUNK`] pairs; workers claim runs
    /// from a shared cursor until none are left.
    pub(crate) fn dispatch(
        dispatcher: &ThreadDispatcher,
        registry: &CollisionTaskRegistry,
        context: &NarrowPhaseContext<'_>,
        buffers: &NarrowPhaseBuffers,
    ) {
        let mut jobs: Vec<(usize, Range<usize>)> = Vec::new();
        for &bucket in buffers.active_buckets.iter() {
            let start = buffers.bucket_starts[bucket];
            let end = start + buffers.bucket_counts[bucket];
            trace!(
                bucket,
                routine = registry.task(bucket).name,
                pairs = end - start,
                "dispatching bucket"
            );
            jobs.extend(
                (start..end)
                    .step_by(DISPATCH_CHUNK)
                    .map(|chunk| (bucket, chunk..(chunk + DISPATCH_CHUNK).min(end))),
            );
        }
        if jobs.is_empty() {
            return;
        }

        let next_job = AtomicUsize::new(0);
        let grouped = &buffers.grouped;
        dispatcher.dispatch_workers(jobs.len(), |_| loop {
            let job = next_job.fetch_add(1, Ordering::Relaxed);
            let Some((bucket, range)) = jobs.get(job) else {
                break;
            };
            (registry.task(*bucket).routine)(context, &grouped[range.clone()]);
        });
    }

    /// Runs every stage on the overlap pairs left in `data` by the broad phase. Contacts end up in
    /// the per-world contact arenas.
    #[instrument(level = "debug", skip_all, fields(nworld = data.nworld(), ngeom = data.ngeom()))]
    pub fn run(
        dispatcher: &ThreadDispatcher,
        registry: &CollisionTaskRegistry,
        settings: &CollisionSettings,
        model: &Model,
        data: &mut Data,
    ) -> NarrowPhaseSummary {
        Self::collect(registry, model, data);
        Self::group(registry, &mut data.narrow_phase);

        let data = &*data;
        let context = NarrowPhaseContext::new(model, data, settings);
        Self::dispatch(dispatcher, registry, &context, &data.narrow_phase);

        let summary = NarrowPhaseSummary {
            candidates: data.narrow_phase.candidates.len(),
            active_buckets: data.narrow_phase.active_buckets.len(),
        };
        debug!(
            candidates = summary.candidates,
            active_buckets = summary.active_buckets,
            "narrow phase finished"
        );
        summary
    }
}
