//! Per-step driver of the collision stage.
//!
//! Runs, in order and with a barrier between each: contact reset, bounding volumes, broad phase,
//! narrow phase and contact finalization.

use super::bounding_box_helpers::BoundingBoxHelpers;
use super::collision_detection::broad_phase::BroadPhase;
use super::collision_detection::collision_task_registry::CollisionTaskRegistry;
use super::collision_detection::contact_manifold::ContactCounts;
use super::collision_detection::narrow_phase::NarrowPhase;
use super::data::Data;
use super::model::Model;
use super::simulation_allocation_sizes::CollisionSettings;
use crate::error::Result;
use crate::utilities::thread_dispatcher::ThreadDispatcher;
use tracing::{debug, instrument};

/// Summary of one collision step. Capacity overflows are reported here rather than as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Broad phase pairs stored per world.
    pub overlaps: Vec<usize>,
    /// Broad phase pairs dropped per world because its overlap buffer was full.
    pub dropped_overlaps: Vec<usize>,
    /// Candidate pairs tested by the broad phase sweep.
    pub work_packages: usize,
    /// Pairs that reached a narrow-phase routine.
    pub candidates: usize,
    /// Buckets whose routine ran.
    pub active_buckets: usize,
    /// Contact occupancy per world.
    pub contacts: ContactCounts,
}

impl StepReport {
    /// Whether any world dropped overlap pairs.
    pub fn overlap_overflowed(&self) -> bool {
        self.dropped_overlaps.iter().any(|&d| d > 0)
    }

    /// Whether any world dropped contacts.
    pub fn contact_overflowed(&self) -> bool {
        self.contacts.overflowed()
    }

    #[inline]
    pub fn total_contacts(&self) -> usize {
        self.contacts.total
    }
}

/// Owns the settings, dispatch table and worker pool shared by every step.
#[derive(Debug, Clone)]
pub struct CollisionPipeline {
    settings: CollisionSettings,
    registry: CollisionTaskRegistry,
    dispatcher: ThreadDispatcher,
}

impl CollisionPipeline {
    pub fn new(settings: CollisionSettings) -> Result<Self> {
        Self::with_registry(settings, CollisionTaskRegistry::new())
    }

    /// Creates a pipeline with a custom dispatch table.
    pub fn with_registry(settings: CollisionSettings, registry: CollisionTaskRegistry) -> Result<Self> {
        settings.validate()?;
        let dispatcher = ThreadDispatcher::new(settings.worker_threads);
        Ok(Self {
            settings,
            registry,
            dispatcher,
        })
    }

    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CollisionTaskRegistry {
        &self.registry
    }

    /// Dispatch table, for swapping in other narrow-phase routines.
    pub fn registry_mut(&mut self) -> &mut CollisionTaskRegistry {
        &mut self.registry
    }

    pub fn dispatcher(&self) -> &ThreadDispatcher {
        &self.dispatcher
    }

    /// Allocates per-world state sized by this pipeline's settings.
    pub fn create_data(&self, model: &Model, nworld: usize) -> Result<Data> {
        Data::new(model, nworld, &self.settings)
    }

    /// Runs one collision step on the geom poses currently stored in `data`.
    ///
    /// On return `data.contact` holds every contact of the step, each world's contacts in slots
    /// `0..report.contacts.per_world[world]` and the sentinel state in every other slot.
    #[instrument(level = "debug", skip_all, fields(nworld = data.nworld(), ngeom = model.ngeom))]
    pub fn step(&self, model: &Model, data: &mut Data) -> Result<StepReport> {
        data.check_model(model)?;

        data.contact.reset();
        for arena in data.contact_arenas.iter_mut() {
            arena.reset();
        }

        BoundingBoxHelpers::update(&self.dispatcher, model, data);

        let broad_phase = BroadPhase::run(
            &self.dispatcher,
            self.settings.normalized_sweep_direction(),
            self.settings.sweep_oversubscription,
            data,
        );

        let narrow_phase = NarrowPhase::run(
            &self.dispatcher,
            &self.registry,
            &self.settings,
            model,
            data,
        );

        let contacts = data.contact.finalize(&mut data.contact_arenas);
        debug!(
            work_packages = broad_phase.work_packages,
            overlaps = broad_phase.overlaps.iter().sum::<usize>(),
            active_buckets = narrow_phase.active_buckets,
            total_contacts = contacts.total,
            "collision step finished"
        );

        Ok(StepReport {
            overlaps: broad_phase.overlaps,
            dropped_overlaps: broad_phase.dropped,
            work_packages: broad_phase.work_packages,
            candidates: narrow_phase.candidates,
            active_buckets: narrow_phase.active_buckets,
            contacts,
        })
    }
}
