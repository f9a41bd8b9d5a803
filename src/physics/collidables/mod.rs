pub mod convex_hull;
pub mod geom_type;
pub mod height_field;
