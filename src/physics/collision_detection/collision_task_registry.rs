use super::collision_tasks::{
    box_box, capsule_capsule, convex_convex, hfield_convex, plane_capsule, plane_convex,
    plane_cylinder, plane_ellipsoid, plane_sphere, sphere_capsule, sphere_sphere,
};
use super::narrow_phase::{CandidatePair, NarrowPhaseContext};
use crate::physics::collidables::geom_type::GeomType;
use std::fmt;

/// Narrow-phase routine handling every candidate pair of one bucket.
pub type CollisionRoutine = fn(&NarrowPhaseContext<'_>, &[CandidatePair]);

/// One entry of the dispatch table: a canonical type pair and the routine that handles it.
#[derive(Clone, Copy)]
pub struct CollisionTask {
    /// Type pair with the lower type first.
    pub types: (GeomType, GeomType),
    pub name: &'static str,
    pub routine: CollisionRoutine,
}

impl fmt::Debug for CollisionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionTask")
            .field("types", &self.types)
            .field("name", &self.name)
            .finish()
    }
}

const fn task(a: GeomType, b: GeomType, name: &'static str, routine: CollisionRoutine) -> CollisionTask {
    CollisionTask {
        types: (a, b),
        name,
        routine,
    }
}

/// The dispatch table. A bucket id is the index of its entry. Type pairs missing from the table
/// have no routine and never collide.
pub const COLLISION_TASKS: [CollisionTask; 27] = [
    task(GeomType::Plane, GeomType::Sphere, "plane_sphere", plane_sphere),
    task(GeomType::Plane, GeomType::Capsule, "plane_capsule", plane_capsule),
    task(GeomType::Plane, GeomType::Box, "plane_box", plane_convex),
    task(GeomType::Plane, GeomType::Ellipsoid, "plane_ellipsoid", plane_ellipsoid),
    task(GeomType::Plane, GeomType::Cylinder, "plane_cylinder", plane_cylinder),
    task(GeomType::Plane, GeomType::Mesh, "plane_mesh", plane_convex),
    task(GeomType::HeightField, GeomType::Sphere, "hfield_sphere", hfield_convex),
    task(GeomType::HeightField, GeomType::Capsule, "hfield_capsule", hfield_convex),
    task(GeomType::HeightField, GeomType::Box, "hfield_box", hfield_convex),
    task(GeomType::HeightField, GeomType::Mesh, "hfield_mesh", hfield_convex),
    task(GeomType::Sphere, GeomType::Sphere, "sphere_sphere", sphere_sphere),
    task(GeomType::Sphere, GeomType::Capsule, "sphere_capsule", sphere_capsule),
    task(GeomType::Sphere, GeomType::Cylinder, "sphere_cylinder", convex_convex),
    task(GeomType::Sphere, GeomType::Ellipsoid, "sphere_ellipsoid", convex_convex),
    task(GeomType::Sphere, GeomType::Box, "sphere_box", convex_convex),
    task(GeomType::Sphere, GeomType::Mesh, "sphere_mesh", convex_convex),
    task(GeomType::Capsule, GeomType::Capsule, "capsule_capsule", capsule_capsule),
    task(GeomType::Capsule, GeomType::Box, "capsule_box", convex_convex),
    task(GeomType::Capsule, GeomType::Ellipsoid, "capsule_ellipsoid", convex_convex),
    task(GeomType::Capsule, GeomType::Cylinder, "capsule_cylinder", convex_convex),
    task(GeomType::Capsule, GeomType::Mesh, "capsule_mesh", convex_convex),
    task(GeomType::Ellipsoid, GeomType::Ellipsoid, "ellipsoid_ellipsoid", convex_convex),
    task(GeomType::Ellipsoid, GeomType::Cylinder, "ellipsoid_cylinder", convex_convex),
    task(GeomType::Cylinder, GeomType::Cylinder, "cylinder_cylinder", convex_convex),
    task(GeomType::Box, GeomType::Box, "box_box", box_box),
    task(GeomType::Box, GeomType::Mesh, "box_mesh", convex_convex),
    task(GeomType::Mesh, GeomType::Mesh, "mesh_mesh", convex_convex),
];

/// Maps geometry type pairs to buckets and buckets to routines.
#[derive(Debug, Clone)]
pub struct CollisionTaskRegistry {
    tasks: Vec<CollisionTask>,
    top_level_matrix: [[Option<usize>; GeomType::COUNT]; GeomType::COUNT],
}

impl Default for CollisionTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionTaskRegistry {
    /// Creates a registry holding [`COLLISION_TASKS`].
    pub fn new() -> Self {
        let mut top_level_matrix = [[None; GeomType::COUNT]; GeomType::COUNT];
        for (bucket, task) in COLLISION_TASKS.iter().enumerate() {
            let (a, b) = (task.types.0.index(), task.types.1.index());
            debug_assert!(top_level_matrix[a][b].is_none(), "duplicate dispatch entry");
            top_level_matrix[a][b] = Some(bucket);
            top_level_matrix[b][a] = Some(bucket);
        }
        Self {
            tasks: COLLISION_TASKS.to_vec(),
            top_level_matrix,
        }
    }

    /// Number of buckets.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Bucket of a type pair in either order, or `None` if the pair has no routine.
    #[inline(always)]
    pub fn bucket(&self, a: GeomType, b: GeomType) -> Option<usize> {
        self.top_level_matrix[a.index()][b.index()]
    }

    #[inline(always)]
    pub fn task(&self, bucket: usize) -> &CollisionTask {
        &self.tasks[bucket]
    }

    pub fn tasks(&self) -> &[CollisionTask] {
        &self.tasks
    }

    /// Replaces the routine of a type pair's bucket. Bucket ids do not change. Returns the bucket,
    /// or `None` if the pair is not in the table.
    pub fn set_routine(&mut self, a: GeomType, b: GeomType, routine: CollisionRoutine) -> Option<usize> {
        let bucket = self.bucket(a, b)?;
        self.tasks[bucket].routine = routine;
        Some(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keys_are_canonical_and_unique() {
        let registry = CollisionTaskRegistry::new();
        assert_eq!(registry.len(), 27);
        for (bucket, task) in registry.tasks().iter().enumerate() {
            assert!(task.types.0 <= task.types.1, "{} is not canonical", task.name);
            assert_eq!(registry.bucket(task.types.0, task.types.1), Some(bucket));
            assert_eq!(registry.bucket(task.types.1, task.types.0), Some(bucket));
        }
    }

    #[test]
    fn undefined_pairs_have_no_bucket() {
        let registry = CollisionTaskRegistry::new();
        assert_eq!(registry.bucket(GeomType::Plane, GeomType::Plane), None);
        assert_eq!(registry.bucket(GeomType::Plane, GeomType::HeightField), None);
        assert_eq!(registry.bucket(GeomType::HeightField, GeomType::Ellipsoid), None);
        assert_eq!(registry.bucket(GeomType::Box, GeomType::Cylinder), None);
        assert_eq!(registry.bucket(GeomType::Mesh, GeomType::Cylinder), None);
        let defined = GeomType::ALL
            .iter()
            .flat_map(|&a| GeomType::ALL.iter().map(move |&b| (a, b)))
            .filter(|&(a, b)| a <= b && registry.bucket(a, b).is_some())
            .count();
        assert_eq!(defined, 27);
    }

    #[test]
    fn routines_can_be_replaced() {
        fn nothing(_: &NarrowPhaseContext<'_>, _: &[CandidatePair]) {}
        let mut registry = CollisionTaskRegistry::new();
        assert_eq!(registry.set_routine(GeomType::Sphere, GeomType::Sphere, nothing), Some(10));
        assert_eq!(registry.task(10).routine as usize, nothing as CollisionRoutine as usize);
        assert_eq!(registry.set_routine(GeomType::Box, GeomType::Cylinder, nothing), None);
    }
}
