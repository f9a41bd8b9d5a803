use crate::utilities::collections::fixed_arena::FixedArena;
use glam::Vec3;
use tracing::warn;

/// Distance stored in unused contact slots.
pub const SENTINEL_DIST: f32 = 1.0e12;
/// Default reference time constant and damping ratio.
pub const DEFAULT_SOLREF: [f32; 2] = [0.02, 1.0];
/// Default impedance curve: dmin, dmax, width, midpoint, power.
pub const DEFAULT_SOLIMP: [f32; 5] = [0.9, 0.95, 0.001, 0.5, 2.0];
/// Default friction: two sliding, one torsional and two rolling coefficients.
pub const DEFAULT_FRICTION: [f32; 5] = [1.0, 1.0, 0.005, 0.0001, 0.0001];
/// Default reference parameters of frictional constraints. Zero means "same as solref".
pub const DEFAULT_SOLREFFRICTION: [f32; 2] = [0.0, 0.0];

/// One contact, gathered from or scattered into a [`Contact`] slot.
///
/// The normal points from `g1` toward `g2`; a negative `dist` is a penetration depth.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRecord {
    pub dist: f32,
    /// Midpoint between the two surfaces.
    pub pos: Vec3,
    pub normal: Vec3,
    pub g1: i32,
    pub g2: i32,
    pub includemargin: f32,
    pub friction: [f32; 5],
    pub solref: [f32; 2],
    pub solimp: [f32; 5],
    pub solreffriction: [f32; 2],
}

impl ContactRecord {
    /// State of a slot that holds no contact.
    pub const SENTINEL: Self = Self {
        dist: SENTINEL_DIST,
        pos: Vec3::ZERO,
        normal: Vec3::ZERO,
        g1: -1,
        g2: -1,
        includemargin: 0.0,
        friction: DEFAULT_FRICTION,
        solref: DEFAULT_SOLREF,
        solimp: DEFAULT_SOLIMP,
        solreffriction: DEFAULT_SOLREFFRICTION,
    };

    #[inline(always)]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

impl Default for ContactRecord {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// Per-world occupancy of the contact buffer after a step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactCounts {
    /// Contacts stored per world.
    pub per_world: Vec<usize>,
    /// Exclusive prefix sum of `per_world`; the flattened index of each world's first contact.
    pub offsets: Vec<usize>,
    /// Contacts emitted but dropped because the world's slots were full.
    pub dropped: Vec<usize>,
    pub total: usize,
}

impl ContactCounts {
    pub fn from_counts(per_world: Vec<usize>, dropped: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(per_world.len());
        let mut total = 0;
        for &count in per_world.iter() {
            offsets.push(total);
            total += count;
        }
        Self {
            per_world,
            offsets,
            dropped,
            total,
        }
    }

    /// Whether any world dropped contacts.
    pub fn overflowed(&self) -> bool {
        self.dropped.iter().any(|&d| d > 0)
    }
}

/// Contact buffer of every world, stored as a structure of arrays indexed by
/// `world * capacity + slot`.
///
/// Every slot is either a fully written contact or the [`ContactRecord::SENTINEL`] state.
#[derive(Debug, Clone)]
pub struct Contact {
    nworld: usize,
    capacity: usize,
    pub dist: Vec<f32>,
    pub pos: Vec<Vec3>,
    pub normal: Vec<Vec3>,
    pub g1: Vec<i32>,
    pub g2: Vec<i32>,
    pub includemargin: Vec<f32>,
    pub friction: Vec<[f32; 5]>,
    pub solref: Vec<[f32; 2]>,
    pub solimp: Vec<[f32; 5]>,
    pub solreffriction: Vec<[f32; 2]>,
}

impl Contact {
    /// Allocates `capacity` slots for each of `nworld` worlds, all in the sentinel state.
    pub fn new(nworld: usize, capacity: usize) -> Self {
        let len = nworld * capacity;
        let s = ContactRecord::SENTINEL;
        Self {
            nworld,
            capacity,
            dist: vec![s.dist; len],
            pos: vec![s.pos; len],
            normal: vec![s.normal; len],
            g1: vec![s.g1; len],
            g2: vec![s.g2; len],
            includemargin: vec![s.includemargin; len],
            friction: vec![s.friction; len],
            solref: vec![s.solref; len],
            solimp: vec![s.solimp; len],
            solreffriction: vec![s.solreffriction; len],
        }
    }

    #[inline(always)]
    pub fn nworld(&self) -> usize {
        self.nworld
    }

    /// Slots per world.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    fn index(&self, world: usize, slot: usize) -> usize {
        debug_assert!(world < self.nworld && slot < self.capacity);
        world * self.capacity + slot
    }

    /// Writes the sentinel state into every slot of every world.
    pub fn reset(&mut self) {
        let s = ContactRecord::SENTINEL;
        self.dist.fill(s.dist);
        self.pos.fill(s.pos);
        self.normal.fill(s.normal);
        self.g1.fill(s.g1);
        self.g2.fill(s.g2);
        self.includemargin.fill(s.includemargin);
        self.friction.fill(s.friction);
        self.solref.fill(s.solref);
        self.solimp.fill(s.solimp);
        self.solreffriction.fill(s.solreffriction);
    }

    /// Gathers a slot into a record.
    pub fn get(&self, world: usize, slot: usize) -> ContactRecord {
        let i = self.index(world, slot);
        ContactRecord {
            dist: self.dist[i],
            pos: self.pos[i],
            normal: self.normal[i],
            g1: self.g1[i],
            g2: self.g2[i],
            includemargin: self.includemargin[i],
            friction: self.friction[i],
            solref: self.solref[i],
            solimp: self.solimp[i],
            solreffriction: self.solreffriction[i],
        }
    }

    /// Scatters a record into a slot.
    pub fn set(&mut self, world: usize, slot: usize, record: &ContactRecord) {
        let i = self.index(world, slot);
        self.dist[i] = record.dist;
        self.pos[i] = record.pos;
        self.normal[i] = record.normal;
        self.g1[i] = record.g1;
        self.g2[i] = record.g2;
        self.includemargin[i] = record.includemargin;
        self.friction[i] = record.friction;
        self.solref[i] = record.solref;
        self.solimp[i] = record.solimp;
        self.solreffriction[i] = record.solreffriction;
    }

    /// Copies the contacts reserved in each world's arena into the slots they reserved and
    /// summarizes per-world occupancy for the constraint stage.
    ///
    /// The arena slot index is the contact slot index, so no contact moves and none is reordered.
    pub fn finalize(&mut self, arenas: &mut [FixedArena<ContactRecord>]) -> ContactCounts {
        debug_assert_eq!(arenas.len(), self.nworld);
        let mut per_world = Vec::with_capacity(arenas.len());
        let mut dropped = Vec::with_capacity(arenas.len());
        for (world, arena) in arenas.iter_mut().enumerate() {
            let world_dropped = arena.dropped();
            if world_dropped > 0 {
                warn!(
                    world,
                    dropped = world_dropped,
                    capacity = self.capacity,
                    "contact slots exhausted, contacts dropped"
                );
            }
            let records = arena.as_slice();
            for (slot, record) in records.iter().enumerate() {
                self.set(world, slot, record);
            }
            per_world.push(records.len());
            dropped.push(world_dropped);
        }
        ContactCounts::from_counts(per_world, dropped)
    }

    /// Contacts of all worlds packed back to back in world order, matching `counts.offsets`.
    pub fn compacted(&self, counts: &ContactCounts) -> Vec<ContactRecord> {
        let mut records = Vec::with_capacity(counts.total);
        for (world, &count) in counts.per_world.iter().enumerate() {
            records.extend((0..count).map(|slot| self.get(world, slot)));
        }
        records
    }
}
