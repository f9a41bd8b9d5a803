//! Reference narrow-phase routines, one per entry of the dispatch table.
//!
//! Every routine receives the candidate pairs of its bucket with `geom_a` of the first type of the
//! table key, and emits zero or more contacts per pair through
//! [`NarrowPhaseContext::emit`](super::narrow_phase::NarrowPhaseContext::emit).

pub mod capsule_pair_tester;
pub mod convex_pair_tester;
pub mod height_field_tester;
pub mod plane_convex_tester;
pub mod sphere_capsule_tester;
pub mod sphere_pair_tester;

pub use self::capsule_pair_tester::capsule_capsule;
pub use self::convex_pair_tester::{box_box, convex_convex};
pub use self::height_field_tester::hfield_convex;
pub use self::plane_convex_tester::{
    plane_capsule, plane_convex, plane_cylinder, plane_ellipsoid, plane_sphere,
};
pub use self::sphere_capsule_tester::sphere_capsule;
pub use self::sphere_pair_tester::sphere_sphere;
