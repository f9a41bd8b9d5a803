use super::collidables::convex_hull::ConvexMesh;
use super::collidables::geom_type::GeomType;
use super::collidables::height_field::HeightField;
use super::collision_detection::contact_manifold::{DEFAULT_SOLIMP, DEFAULT_SOLREF};
use crate::error::{CollisionError, Result};
use crate::utilities::BoundingBox;
use glam::Vec3;

/// Half extent of a plane's local box in its tangent directions, and the depth of the
/// half-space behind its surface that the box covers.
pub const PLANE_EXTENT: f32 = 1.0e6;

/// Describes a geom before it is added to a [`ModelBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeomDescription {
    pub geom_type: GeomType,
    /// Body the geom is attached to.
    pub body: usize,
    /// Type-dependent size parameters.
    pub size: Vec3,
    /// Distance at which contacts start being generated.
    pub margin: f32,
    /// Part of the margin inside which contacts are generated but not enforced.
    pub gap: f32,
    pub contype: u32,
    pub conaffinity: u32,
    /// Sliding, torsional and rolling friction.
    pub friction: Vec3,
    pub solref: [f32; 2],
    pub solimp: [f32; 5],
    /// Weight of this geom's solver parameters when mixed with its partner's.
    pub solmix: f32,
    /// Mesh or height field index for geoms that need one.
    pub dataid: Option<usize>,
}

impl GeomDescription {
    /// Creates a description with default contact parameters.
    pub fn new(geom_type: GeomType, body: usize, size: Vec3) -> Self {
        Self {
            geom_type,
            body,
            size,
            margin: 0.0,
            gap: 0.0,
            contype: 1,
            conaffinity: 1,
            friction: Vec3::new(1.0, 0.005, 0.0001),
            solref: DEFAULT_SOLREF,
            solimp: DEFAULT_SOLIMP,
            solmix: 1.0,
            dataid: None,
        }
    }

    pub fn plane(body: usize) -> Self {
        Self::new(GeomType::Plane, body, Vec3::ZERO)
    }

    pub fn sphere(body: usize, radius: f32) -> Self {
        Self::new(GeomType::Sphere, body, Vec3::new(radius, 0.0, 0.0))
    }

    /// Capsule whose segment runs along local z.
    pub fn capsule(body: usize, radius: f32, half_length: f32) -> Self {
        Self::new(GeomType::Capsule, body, Vec3::new(radius, half_length, 0.0))
    }

    pub fn ellipsoid(body: usize, radii: Vec3) -> Self {
        Self::new(GeomType::Ellipsoid, body, radii)
    }

    /// Cylinder whose axis is local z.
    pub fn cylinder(body: usize, radius: f32, half_height: f32) -> Self {
        Self::new(GeomType::Cylinder, body, Vec3::new(radius, half_height, 0.0))
    }

    pub fn cuboid(body: usize, half_extents: Vec3) -> Self {
        Self::new(GeomType::Box, body, half_extents)
    }

    /// Convex mesh geom referring to a mesh added with [`ModelBuilder::add_mesh`].
    pub fn mesh(body: usize, mesh: usize) -> Self {
        Self {
            dataid: Some(mesh),
            ..Self::new(GeomType::Mesh, body, Vec3::ZERO)
        }
    }

    /// Height field geom referring to data added with [`ModelBuilder::add_height_field`].
    pub fn height_field(body: usize, height_field: usize) -> Self {
        Self {
            dataid: Some(height_field),
            ..Self::new(GeomType::HeightField, body, Vec3::ZERO)
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_gap(mut self, gap: f32) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_contype(mut self, contype: u32) -> Self {
        self.contype = contype;
        self
    }

    pub fn with_conaffinity(mut self, conaffinity: u32) -> Self {
        self.conaffinity = conaffinity;
        self
    }

    pub fn with_friction(mut self, friction: Vec3) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_solref(mut self, solref: [f32; 2]) -> Self {
        self.solref = solref;
        self
    }

    pub fn with_solimp(mut self, solimp: [f32; 5]) -> Self {
        self.solimp = solimp;
        self
    }

    pub fn with_solmix(mut self, solmix: f32) -> Self {
        self.solmix = solmix;
        self
    }
}

/// Immutable scene description shared by every world.
///
/// All per-geom arrays have `ngeom` entries and all per-body arrays `nbody` entries. The geoms of
/// one body occupy the contiguous range `body_geomadr[b]..body_geomadr[b] + body_geomnum[b]`.
/// Build instances with [`ModelBuilder`], which validates these invariants.
#[derive(Debug, Clone)]
pub struct Model {
    pub ngeom: usize,
    pub nbody: usize,
    pub geom_type: Vec<GeomType>,
    pub geom_bodyid: Vec<usize>,
    pub geom_size: Vec<Vec3>,
    /// Local box of each geom in its own frame.
    pub geom_aabb: Vec<BoundingBox>,
    /// Bounding sphere radius around the geom origin. Zero for planes, which are unbounded.
    pub geom_rbound: Vec<f32>,
    pub geom_margin: Vec<f32>,
    pub geom_gap: Vec<f32>,
    pub geom_contype: Vec<u32>,
    pub geom_conaffinity: Vec<u32>,
    pub geom_friction: Vec<Vec3>,
    pub geom_solref: Vec<[f32; 2]>,
    pub geom_solimp: Vec<[f32; 5]>,
    pub geom_solmix: Vec<f32>,
    pub geom_dataid: Vec<Option<usize>>,
    pub body_geomnum: Vec<usize>,
    pub body_geomadr: Vec<usize>,
    pub meshes: Vec<ConvexMesh>,
    pub height_fields: Vec<HeightField>,
}

impl Model {
    /// Mesh attached to a geom, if the geom is a mesh.
    #[inline]
    pub fn geom_mesh(&self, geom: usize) -> Option<&ConvexMesh> {
        match self.geom_type[geom] {
            GeomType::Mesh => self.meshes.get(self.geom_dataid[geom]?),
            _ => None,
        }
    }

    /// Height field attached to a geom, if the geom is a height field.
    #[inline]
    pub fn geom_height_field(&self, geom: usize) -> Option<&HeightField> {
        match self.geom_type[geom] {
            GeomType::HeightField => self.height_fields.get(self.geom_dataid[geom]?),
            _ => None,
        }
    }

    /// Whether the contype/conaffinity masks of two geoms allow them to collide.
    #[inline(always)]
    pub fn can_collide(&self, a: usize, b: usize) -> bool {
        (self.geom_contype[a] & self.geom_conaffinity[b]) != 0
            || (self.geom_contype[b] & self.geom_conaffinity[a]) != 0
    }
}

/// Accumulates bodies, geoms and geometry data, then validates them into a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    body_count: usize,
    geoms: Vec<GeomDescription>,
    meshes: Vec<ConvexMesh>,
    height_fields: Vec<HeightField>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body and returns its index.
    pub fn add_body(&mut self) -> usize {
        self.body_count += 1;
        self.body_count - 1
    }

    /// Adds a geom and returns its index. Geoms of one body must be added consecutively.
    pub fn add_geom(&mut self, description: GeomDescription) -> usize {
        self.geoms.push(description);
        self.geoms.len() - 1
    }

    pub fn add_mesh(&mut self, mesh: ConvexMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_height_field(&mut self, height_field: HeightField) -> usize {
        self.height_fields.push(height_field);
        self.height_fields.len() - 1
    }

    fn validate_geom(&self, geom: usize, description: &GeomDescription) -> Result<()> {
        if description.body >= self.body_count {
            return Err(CollisionError::InvalidBody {
                geom,
                body: description.body,
            });
        }
        if !description.size.is_finite() || description.size.min_element() < 0.0 {
            return Err(CollisionError::InvalidGeomSize {
                geom,
                reason: "size parameters must be finite and non-negative",
            });
        }
        if !description.margin.is_finite() || description.margin < 0.0 {
            return Err(CollisionError::InvalidGeomSize {
                geom,
                reason: "margin must be finite and non-negative",
            });
        }
        if !description.gap.is_finite() || description.gap < 0.0 {
            return Err(CollisionError::InvalidGeomSize {
                geom,
                reason: "gap must be finite and non-negative",
            });
        }
        let data_present = match description.geom_type {
            GeomType::Mesh => description.dataid.is_some_and(|id| id < self.meshes.len()),
            GeomType::HeightField => description
                .dataid
                .is_some_and(|id| id < self.height_fields.len()),
            _ => true,
        };
        if !data_present {
            return Err(CollisionError::MissingGeomData { geom });
        }
        Ok(())
    }

    /// Local box and bounding radius of a validated geom.
    fn local_bounds(&self, description: &GeomDescription) -> (BoundingBox, f32) {
        let size = description.size;
        match description.geom_type {
            GeomType::Plane => (
                BoundingBox::new(
                    Vec3::new(0.0, 0.0, -0.5 * PLANE_EXTENT),
                    Vec3::new(PLANE_EXTENT, PLANE_EXTENT, 0.5 * PLANE_EXTENT),
                ),
                0.0,
            ),
            GeomType::HeightField => {
                let (center, half_extents) = description
                    .dataid
                    .and_then(|id| self.height_fields.get(id))
                    .map(HeightField::local_box)
                    .unwrap_or((Vec3::ZERO, Vec3::ZERO));
                (
                    BoundingBox::new(center, half_extents),
                    (center.abs() + half_extents).length(),
                )
            }
            GeomType::Sphere => (BoundingBox::new(Vec3::ZERO, Vec3::splat(size.x)), size.x),
            GeomType::Capsule => (
                BoundingBox::new(Vec3::ZERO, Vec3::new(size.x, size.x, size.x + size.y)),
                size.x + size.y,
            ),
            GeomType::Ellipsoid => (BoundingBox::new(Vec3::ZERO, size), size.max_element()),
            GeomType::Cylinder => (
                BoundingBox::new(Vec3::ZERO, Vec3::new(size.x, size.x, size.y)),
                Vec3::new(size.x, size.y, 0.0).length(),
            ),
            GeomType::Box => (BoundingBox::new(Vec3::ZERO, size), size.length()),
            GeomType::Mesh => description
                .dataid
                .and_then(|id| self.meshes.get(id))
                .map(|mesh| {
                    let (min, max) = mesh.bounds();
                    (BoundingBox::from_min_max(min, max), mesh.bounding_radius())
                })
                .unwrap_or_default(),
        }
    }

    /// Validates the accumulated scene and produces the immutable model.
    pub fn build(self) -> Result<Model> {
        let ngeom = self.geoms.len();
        let nbody = self.body_count;
        let mut body_geomnum = vec![0usize; nbody];
        let mut body_geomadr = vec![0usize; nbody];
        let mut geom_aabb = Vec::with_capacity(ngeom);
        let mut geom_rbound = Vec::with_capacity(ngeom);

        for (geom, description) in self.geoms.iter().enumerate() {
            self.validate_geom(geom, description)?;
            let body = description.body;
            if body_geomnum[body] == 0 {
                body_geomadr[body] = geom;
            } else if body_geomadr[body] + body_geomnum[body] != geom {
                return Err(CollisionError::NonContiguousBody { body });
            }
            body_geomnum[body] += 1;

            let (local_box, rbound) = self.local_bounds(description);
            geom_aabb.push(local_box);
            geom_rbound.push(rbound);
        }

        let geoms = &self.geoms;
        Ok(Model {
            ngeom,
            nbody,
            geom_type: geoms.iter().map(|g| g.geom_type).collect(),
            geom_bodyid: geoms.iter().map(|g| g.body).collect(),
            geom_size: geoms.iter().map(|g| g.size).collect(),
            geom_aabb,
            geom_rbound,
            geom_margin: geoms.iter().map(|g| g.margin).collect(),
            geom_gap: geoms.iter().map(|g| g.gap).collect(),
            geom_contype: geoms.iter().map(|g| g.contype).collect(),
            geom_conaffinity: geoms.iter().map(|g| g.conaffinity).collect(),
            geom_friction: geoms.iter().map(|g| g.friction).collect(),
            geom_solref: geoms.iter().map(|g| g.solref).collect(),
            geom_solimp: geoms.iter().map(|g| g.solimp).collect(),
            geom_solmix: geoms.iter().map(|g| g.solmix).collect(),
            geom_dataid: geoms.iter().map(|g| g.dataid).collect(),
            body_geomnum,
            body_geomadr,
            meshes: self.meshes,
            height_fields: self.height_fields,
        })
    }
}
