pub mod bounding_box_helpers;
pub mod collidables;
pub mod collision_detection;
pub mod collision_pipeline;
pub mod data;
pub mod model;
pub mod simulation_allocation_sizes;
