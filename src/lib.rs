//! Collision detection stage for batched rigid-body simulation.
//!
//! A single [`Data`] instance holds many independent copies ("worlds") of one scene described
//! by a shared [`Model`]. Every step, [`CollisionPipeline::step`] resets the contact buffer,
//! builds bounding volumes, runs a sort-based sweep-and-prune broad phase batched across all
//! worlds, groups the surviving geom pairs by geometry-type bucket and hands each bucket to its
//! narrow-phase routine. The result is a [`Contact`] structure-of-arrays plus per-world counts
//! for the constraint solver.

mod error;
mod physics;
pub mod utilities;

pub use self::error::{CollisionError, Result};
pub use self::physics::bounding_box_helpers::BoundingBoxHelpers;
pub use self::physics::collidables::convex_hull::ConvexMesh;
pub use self::physics::collidables::geom_type::GeomType;
pub use self::physics::collidables::height_field::HeightField;
pub use self::physics::collision_detection::broad_phase::{
    BroadPhase, BroadPhaseSummary, OverlapPair,
};
pub use self::physics::collision_detection::collision_task_registry::{
    CollisionRoutine, CollisionTask, CollisionTaskRegistry, COLLISION_TASKS,
};
pub use self::physics::collision_detection::collision_tasks;
pub use self::physics::collision_detection::contact_manifold::{
    Contact, ContactCounts, ContactRecord, DEFAULT_FRICTION, DEFAULT_SOLIMP, DEFAULT_SOLREF,
    DEFAULT_SOLREFFRICTION, SENTINEL_DIST,
};
pub use self::physics::collision_detection::depth_refiner::{DepthRefiner, Penetration};
pub use self::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhase, NarrowPhaseContext, NarrowPhaseSummary,
    DISPATCH_CHUNK,
};
pub use self::physics::collision_detection::support_finder::{
    ConvexShape, ConvexSupport, SupportFinder,
};
pub use self::physics::collision_pipeline::{CollisionPipeline, StepReport};
pub use self::physics::data::Data;
pub use self::physics::model::{GeomDescription, Model, ModelBuilder, PLANE_EXTENT};
pub use self::physics::simulation_allocation_sizes::CollisionSettings;
