pub mod broad_phase;
pub mod collision_task_registry;
pub mod collision_tasks;
pub mod contact_manifold;
pub mod depth_refiner;
pub mod narrow_phase;
pub mod support_finder;
