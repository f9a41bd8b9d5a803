use thiserror::Error;

/// Errors raised while describing a scene or allocating per-world state.
///
/// Conditions that arise during a step (capacity overflow, geometry pairs without a routine,
/// bodies without geoms) are never errors. A step absorbs them and reports them through
/// [`StepReport`](crate::StepReport).
#[derive(Debug, Error)]
pub enum CollisionError {
    /// A configuration knob is out of its valid range.
    #[error("invalid collision settings: {reason}")]
    InvalidSettings { reason: String },
    /// A geom was attached to a body index that was never created.
    #[error("geom {geom} references body {body}, which does not exist")]
    InvalidBody { geom: usize, body: usize },
    /// Geoms belonging to one body must occupy a single contiguous index range.
    #[error("geoms of body {body} are not stored contiguously")]
    NonContiguousBody { body: usize },
    /// A size parameter is negative or not finite.
    #[error("geom {geom} has an invalid size: {reason}")]
    InvalidGeomSize { geom: usize, reason: &'static str },
    /// A mesh or height field geom has no data attached, or refers to missing data.
    #[error("geom {geom} requires mesh or height field data that is missing")]
    MissingGeomData { geom: usize },
    /// Height field dimensions or samples are unusable.
    #[error("invalid height field: {reason}")]
    InvalidHeightField { reason: String },
    /// Mesh vertices are unusable.
    #[error("invalid mesh: {reason}")]
    InvalidMesh { reason: String },
    /// A fixed-size buffer cannot hold what the scene requires.
    #[error("{what} capacity is {available}, but the scene requires at least {required}")]
    CapacityTooSmall {
        what: &'static str,
        required: usize,
        available: usize,
    },
    /// An index handed in by a collaborating stage is out of range.
    #[error("{what} index {index} is out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// The per-world state was allocated for a different model.
    #[error("data was allocated for {found} geoms and {found_bodies} bodies, model has {expected} geoms and {expected_bodies} bodies")]
    ModelMismatch {
        expected: usize,
        found: usize,
        expected_bodies: usize,
        found_bodies: usize,
    },
    /// A batch must contain at least one world.
    #[error("a batch must contain at least one world")]
    NoWorlds,
    /// Settings could not be parsed.
    #[error("failed to parse collision settings: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = CollisionError> = std::result::Result<T, E>;
