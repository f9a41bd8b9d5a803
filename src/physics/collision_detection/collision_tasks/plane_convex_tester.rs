use crate::physics::collidables::geom_type::GeomType;
use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use crate::physics::collision_detection::support_finder::{ConvexSupport, SupportFinder};
use glam::{Mat3, Vec3};

/// Most contacts generated for one plane pair.
pub const MAX_PLANE_CONTACTS: usize = 4;

/// Contact tests of convex geometry against a plane through `plane_position` with unit normal
/// `plane_normal`. Every normal points from the plane toward the other geom.
pub struct PlaneConvexTester;

impl PlaneConvexTester {
    /// Contact for a point sitting `radius` above the surface of the other geom.
    #[inline(always)]
    pub fn point(plane_position: Vec3, plane_normal: Vec3, point: Vec3, radius: f32) -> ContactGeometry {
        let dist = plane_normal.dot(point - plane_position) - radius;
        ContactGeometry {
            dist,
            pos: point - plane_normal * (radius + 0.5 * dist),
            normal: plane_normal,
        }
    }

    /// Contacts at both capsule end spheres.
    pub fn capsule(
        plane_position: Vec3,
        plane_normal: Vec3,
        center: Vec3,
        axis: Vec3,
        radius: f32,
        half_length: f32,
    ) -> [ContactGeometry; 2] {
        let tip = axis * half_length;
        [
            Self::point(plane_position, plane_normal, center + tip, radius),
            Self::point(plane_position, plane_normal, center - tip, radius),
        ]
    }

    /// Deepest point of the cap nearest the plane, the opposite rim point and the two rim points
    /// in between.
    pub fn cylinder(
        plane_position: Vec3,
        plane_normal: Vec3,
        center: Vec3,
        rotation: &Mat3,
        radius: f32,
        half_height: f32,
    ) -> [ContactGeometry; 4] {
        let axis = rotation.z_axis;
        let along = axis.dot(plane_normal);
        let cap = center - axis * (half_height * along.signum());
        let radial = -plane_normal + axis * along;
        let radial = if radial.length_squared() > 1.0e-12 {
            radial.normalize()
        } else {
            rotation.x_axis
        };
        let side = axis.cross(radial);
        [radial, -radial, side, -side]
            .map(|direction| Self::point(plane_position, plane_normal, cap + direction * radius, 0.0))
    }
}

#[inline(always)]
fn plane_frame(context: &NarrowPhaseContext<'_>, pair: &CandidatePair) -> (Vec3, Vec3) {
    let (position, rotation) = context.pose(pair.world, pair.geom_a);
    (position, rotation.z_axis)
}

/// Bucket routine for plane vs sphere.
pub fn plane_sphere(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    for pair in pairs {
        let (plane_position, plane_normal) = plane_frame(context, pair);
        let (center, _) = context.pose(pair.world, pair.geom_b);
        let radius = context.model.geom_size[pair.geom_b].x;
        context.emit(pair, PlaneConvexTester::point(plane_position, plane_normal, center, radius));
    }
}

/// Bucket routine for plane vs capsule.
pub fn plane_capsule(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    for pair in pairs {
        let (plane_position, plane_normal) = plane_frame(context, pair);
        let (center, rotation) = context.pose(pair.world, pair.geom_b);
        let size = context.model.geom_size[pair.geom_b];
        let contacts = PlaneConvexTester::capsule(
            plane_position,
            plane_normal,
            center,
            rotation.z_axis,
            size.x,
            size.y,
        );
        for geometry in contacts {
            context.emit(pair, geometry);
        }
    }
}

/// Bucket routine for plane vs ellipsoid.
pub fn plane_ellipsoid(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    for pair in pairs {
        let (plane_position, plane_normal) = plane_frame(context, pair);
        let (center, rotation) = context.pose(pair.world, pair.geom_b);
        let Some(support) = ConvexSupport::from_geom(context.model, pair.geom_b, center, rotation)
        else {
            continue;
        };
        let deepest = support.support(-plane_normal);
        context.emit(pair, PlaneConvexTester::point(plane_position, plane_normal, deepest, 0.0));
    }
}

/// Bucket routine for plane vs cylinder.
pub fn plane_cylinder(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    for pair in pairs {
        let (plane_position, plane_normal) = plane_frame(context, pair);
        let (center, rotation) = context.pose(pair.world, pair.geom_b);
        let size = context.model.geom_size[pair.geom_b];
        let contacts = PlaneConvexTester::cylinder(
            plane_position,
            plane_normal,
            center,
            &rotation,
            size.x,
            size.y,
        );
        let margin = context.margin(pair);
        for geometry in contacts.into_iter().filter(|g| g.dist <= margin) {
            context.emit(pair, geometry);
        }
    }
}

/// The deepest contacts seen so far, ordered by distance. Ties keep the earlier contact.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeepestContacts {
    contacts: [ContactGeometry; MAX_PLANE_CONTACTS],
    count: usize,
}

impl DeepestContacts {
    pub fn insert(&mut self, geometry: ContactGeometry) {
        let slot = self.contacts[..self.count]
            .iter()
            .position(|kept| geometry.dist < kept.dist)
            .unwrap_or(self.count);
        if slot == MAX_PLANE_CONTACTS {
            return;
        }
        let last = self.count.min(MAX_PLANE_CONTACTS - 1);
        self.contacts.copy_within(slot..last, slot + 1);
        self.contacts[slot] = geometry;
        self.count = (self.count + 1).min(MAX_PLANE_CONTACTS);
    }

    pub fn as_slice(&self) -> &[ContactGeometry] {
        &self.contacts[..self.count]
    }
}

#[inline(always)]
fn box_corner(half: Vec3, corner: usize) -> Vec3 {
    Vec3::new(
        if corner & 1 == 0 { -half.x } else { half.x },
        if corner & 2 == 0 { -half.y } else { half.y },
        if corner & 4 == 0 { -half.z } else { half.z },
    )
}

/// Bucket routine for plane vs box and plane vs mesh. Emits the deepest vertices.
pub fn plane_convex(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let model = context.model;
    for pair in pairs {
        let (plane_position, plane_normal) = plane_frame(context, pair);
        let (center, rotation) = context.pose(pair.world, pair.geom_b);
        let margin = context.margin(pair);
        let mut deepest = DeepestContacts::default();
        let mut consider = |local: Vec3| {
            let geometry =
                PlaneConvexTester::point(plane_position, plane_normal, rotation * local + center, 0.0);
            if geometry.dist <= margin {
                deepest.insert(geometry);
            }
        };
        match model.geom_type[pair.geom_b] {
            GeomType::Box => {
                let half = model.geom_size[pair.geom_b];
                (0..8).for_each(|corner| consider(box_corner(half, corner)));
            }
            _ => match model.geom_mesh(pair.geom_b) {
                Some(mesh) => mesh.vertices().iter().for_each(|&vertex| consider(vertex)),
                None => continue,
            },
        }
        for &geometry in deepest.as_slice() {
            context.emit(pair, geometry);
        }
    }
}
