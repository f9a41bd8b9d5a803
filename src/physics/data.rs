use super::collision_detection::broad_phase::OverlapPair;
use super::collision_detection::contact_manifold::{Contact, ContactRecord};
use super::collision_detection::narrow_phase::CandidatePair;
use super::model::Model;
use super::simulation_allocation_sizes::CollisionSettings;
use crate::error::{CollisionError, Result};
use crate::utilities::collections::fixed_arena::FixedArena;
use crate::utilities::{Aamm, BoundingBox};
use glam::{Mat3, Vec3};

/// Scratch of the sweep-and-prune broad phase. Every flat array is indexed by
/// `world * ngeom + i` and is overwritten each step.
#[derive(Debug)]
pub(crate) struct BroadPhaseBuffers {
    /// Sortable keys of the projected interval starts. Sorted in place per world.
    pub sort_keys: Vec<u32>,
    /// Projected interval ends, indexed by geom.
    pub box_ends: Vec<f32>,
    /// Permutation from sorted position to geom index.
    pub sort_indices: Vec<u32>,
    pub keys_scratch: Vec<u32>,
    pub indices_scratch: Vec<u32>,
    /// World boxes in sorted order.
    pub sorted_boxes: Vec<BoundingBox>,
    /// Candidate counts per sorted box, then their inclusive prefix sum across all worlds.
    pub cumulative: Vec<usize>,
    /// Accepted overlap pairs of each world.
    pub overlaps: Vec<FixedArena<OverlapPair>>,
}

/// Scratch of the narrow phase dispatch.
#[derive(Debug, Default)]
pub(crate) struct NarrowPhaseBuffers {
    /// Pairs that survived filtering, in broad phase order.
    pub candidates: Vec<CandidatePair>,
    /// Bucket of each entry of `candidates`.
    pub candidate_buckets: Vec<usize>,
    /// Candidates grouped so that each bucket's pairs are contiguous.
    pub grouped: Vec<CandidatePair>,
    /// Start of each bucket's run in `grouped`.
    pub bucket_starts: Vec<usize>,
    pub bucket_counts: Vec<usize>,
    /// Buckets with at least one pair, in bucket order.
    pub active_buckets: Vec<usize>,
}

/// Mutable state of every world of a batch.
///
/// World-space geom poses are written by the upstream kinematics stage through
/// [`Data::set_geom_pose`]; everything else is produced by the collision pipeline. Scratch is
/// allocated once here and never grows during a step.
#[derive(Debug)]
pub struct Data {
    nworld: usize,
    ngeom: usize,
    nbody: usize,
    /// World-space geom positions, `world * ngeom + geom`.
    pub geom_xpos: Vec<Vec3>,
    /// World-space geom rotation matrices, `world * ngeom + geom`.
    pub geom_xmat: Vec<Mat3>,
    /// Body envelopes, `world * nbody + body`.
    pub body_aamm: Vec<Aamm>,
    /// World-space geom boxes inflated by the geom margin, `world * ngeom + geom`.
    pub geom_world_aabb: Vec<BoundingBox>,
    pub(crate) broad_phase: BroadPhaseBuffers,
    pub(crate) narrow_phase: NarrowPhaseBuffers,
    pub(crate) contact_arenas: Vec<FixedArena<ContactRecord>>,
    /// Contact output of the last step.
    pub contact: Contact,
}

impl Data {
    /// Allocates state for `nworld` copies of `model` with buffer sizes taken from `settings`.
    /// Every geom starts at the origin with identity rotation.
    pub fn new(model: &Model, nworld: usize, settings: &CollisionSettings) -> Result<Self> {
        settings.validate()?;
        if nworld == 0 {
            return Err(CollisionError::NoWorlds);
        }
        let ngeom = model.ngeom;
        let nbody = model.nbody;
        if ngeom > i32::MAX as usize {
            return Err(CollisionError::CapacityTooSmall {
                what: "geom index",
                required: ngeom,
                available: i32::MAX as usize,
            });
        }
        let total = nworld
            .checked_mul(ngeom)
            .ok_or(CollisionError::CapacityTooSmall {
                what: "batched geom",
                required: usize::MAX,
                available: usize::MAX / ngeom.max(1),
            })?;

        let broad_phase = BroadPhaseBuffers {
            sort_keys: vec![0; total],
            box_ends: vec![0.0; total],
            sort_indices: vec![0; total],
            keys_scratch: vec![0; total],
            indices_scratch: vec![0; total],
            sorted_boxes: vec![BoundingBox::default(); total],
            cumulative: vec![0; total],
            overlaps: (0..nworld)
                .map(|_| FixedArena::with_capacity(settings.max_overlaps_per_world))
                .collect(),
        };
        let narrow_phase = NarrowPhaseBuffers {
            candidates: Vec::with_capacity(nworld * settings.max_overlaps_per_world),
            ..Default::default()
        };

        Ok(Self {
            nworld,
            ngeom,
            nbody,
            geom_xpos: vec![Vec3::ZERO; total],
            geom_xmat: vec![Mat3::IDENTITY; total],
            body_aamm: vec![Aamm::EMPTY; nworld * nbody],
            geom_world_aabb: vec![BoundingBox::default(); total],
            broad_phase,
            narrow_phase,
            contact_arenas: (0..nworld)
                .map(|_| FixedArena::with_capacity(settings.max_contacts_per_world))
                .collect(),
            contact: Contact::new(nworld, settings.max_contacts_per_world),
        })
    }

    #[inline(always)]
    pub fn nworld(&self) -> usize {
        self.nworld
    }

    /// Geoms per world.
    #[inline(always)]
    pub fn ngeom(&self) -> usize {
        self.ngeom
    }

    /// Bodies per world.
    #[inline(always)]
    pub fn nbody(&self) -> usize {
        self.nbody
    }

    /// Checks that this state was allocated for `model`.
    pub fn check_model(&self, model: &Model) -> Result<()> {
        if model.ngeom != self.ngeom || model.nbody != self.nbody {
            return Err(CollisionError::ModelMismatch {
                expected: model.ngeom,
                found: self.ngeom,
                expected_bodies: model.nbody,
                found_bodies: self.nbody,
            });
        }
        Ok(())
    }

    fn geom_index(&self, world: usize, geom: usize) -> Result<usize> {
        if world >= self.nworld {
            return Err(CollisionError::IndexOutOfRange {
                what: "world",
                index: world,
                len: self.nworld,
            });
        }
        if geom >= self.ngeom {
            return Err(CollisionError::IndexOutOfRange {
                what: "geom",
                index: geom,
                len: self.ngeom,
            });
        }
        Ok(world * self.ngeom + geom)
    }

    /// Sets the world-space pose of one geom in one world.
    pub fn set_geom_pose(
        &mut self,
        world: usize,
        geom: usize,
        position: Vec3,
        rotation: Mat3,
    ) -> Result<()> {
        let index = self.geom_index(world, geom)?;
        self.geom_xpos[index] = position;
        self.geom_xmat[index] = rotation;
        Ok(())
    }

    /// World-space pose of one geom in one world.
    pub fn geom_pose(&self, world: usize, geom: usize) -> Result<(Vec3, Mat3)> {
        let index = self.geom_index(world, geom)?;
        Ok((self.geom_xpos[index], self.geom_xmat[index]))
    }

    /// Envelope of one body in one world, as computed by the last step.
    #[inline]
    pub fn body_aamm(&self, world: usize, body: usize) -> Aamm {
        self.body_aamm[world * self.nbody + body]
    }

    /// Overlap pairs the broad phase accepted for a world in the last step, in slot order.
    pub fn overlap_pairs(&mut self, world: usize) -> &[OverlapPair] {
        self.broad_phase.overlaps[world].as_slice()
    }

    /// Overlap pairs of a world that were dropped because its buffer was full.
    #[inline]
    pub fn dropped_overlaps(&self, world: usize) -> usize {
        self.broad_phase.overlaps[world].dropped()
    }
}
