//! Minkowski portal refinement for penetrating convex pairs.
//!
//! Works on the Minkowski difference `A - B` of two [`SupportFinder`]s. The shapes intersect when
//! the origin lies inside the difference. A portal (a triangle of support points) is first
//! discovered on the ray from an interior point toward the origin, then refined until the origin
//! is known to be inside or outside, and finally pushed toward the surface closest to the origin
//! to estimate the penetration depth and direction.

use super::support_finder::SupportFinder;
use glam::Vec3;

/// Magnitudes below this are treated as zero.
const EPSILON: f32 = f32::EPSILON;

#[inline(always)]
fn is_zero(value: f32) -> bool {
    value.abs() < EPSILON
}

/// Penetration of two convex shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Distance `B` has to move along `normal` to separate the shapes. Never negative.
    pub depth: f32,
    /// Unit direction from `A` toward `B`.
    pub normal: Vec3,
    /// Midpoint between the deepest points of the two shapes.
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, Default)]
struct SupportPoint {
    /// Point of the Minkowski difference.
    v: Vec3,
    /// Contributing point on A.
    on_a: Vec3,
    /// Contributing point on B.
    on_b: Vec3,
}

enum Discovery {
    Separated,
    /// The origin coincides with the first portal vertex.
    Touching,
    /// The origin lies on the segment between the interior point and the first portal vertex.
    OnSegment,
    Portal,
}

struct Portal<'s, A, B> {
    a: &'s A,
    b: &'s B,
    points: [SupportPoint; 4],
}

impl<'s, A: SupportFinder, B: SupportFinder> Portal<'s, A, B> {
    #[inline(always)]
    fn support(&self, direction: Vec3) -> SupportPoint {
        let on_a = self.a.support(direction);
        let on_b = self.b.support(-direction);
        SupportPoint {
            v: on_a - on_b,
            on_a,
            on_b,
        }
    }

    #[inline(always)]
    fn v(&self, index: usize) -> Vec3 {
        self.points[index].v
    }

    /// Normal of the portal triangle, pointing away from the interior point.
    fn direction(&self) -> Vec3 {
        (self.v(2) - self.v(1))
            .cross(self.v(3) - self.v(1))
            .normalize_or_zero()
    }

    fn encapsulates_origin(&self, direction: Vec3) -> bool {
        let dot = self.v(1).dot(direction);
        is_zero(dot) || dot > 0.0
    }

    fn reached_tolerance(&self, v4: Vec3, direction: Vec3, tolerance: f32) -> bool {
        let v4_dot = v4.dot(direction);
        let gap = (v4_dot - self.v(1).dot(direction))
            .min(v4_dot - self.v(2).dot(direction))
            .min(v4_dot - self.v(3).dot(direction));
        gap <= tolerance
    }

    /// Replaces one portal vertex with `v4` so that the portal stays on the interior ray.
    fn expand(&mut self, v4: SupportPoint) {
        let v4_cross_v0 = v4.v.cross(self.v(0));
        if self.v(1).dot(v4_cross_v0) > 0.0 {
            if self.v(2).dot(v4_cross_v0) > 0.0 {
                self.points[1] = v4;
            } else {
                self.points[3] = v4;
            }
        } else if self.v(3).dot(v4_cross_v0) > 0.0 {
            self.points[2] = v4;
        } else {
            self.points[1] = v4;
        }
    }

    fn discover(&mut self) -> Discovery {
        let mut v0 = self.a.center() - self.b.center();
        if v0 == Vec3::ZERO {
            v0 = Vec3::new(1.0e-5, 0.0, 0.0);
        }
        self.points[0] = SupportPoint {
            v: v0,
            on_a: self.a.center(),
            on_b: self.b.center(),
        };

        let mut direction = (-v0).normalize();
        self.points[1] = self.support(direction);
        let dot = self.v(1).dot(direction);
        if is_zero(dot) || dot < 0.0 {
            return Discovery::Separated;
        }

        direction = v0.cross(self.v(1));
        // Collinearity is judged on the sine of the angle so that tiny interior offsets still count.
        let scale = v0.length_squared() * self.v(1).length_squared();
        if scale == 0.0 || is_zero(direction.length_squared() / scale) {
            return if self.v(1) == Vec3::ZERO {
                Discovery::Touching
            } else {
                Discovery::OnSegment
            };
        }
        direction = direction.normalize();
        self.points[2] = self.support(direction);
        let dot = self.v(2).dot(direction);
        if is_zero(dot) || dot < 0.0 {
            return Discovery::Separated;
        }

        direction = (self.v(1) - v0).cross(self.v(2) - v0).normalize_or_zero();
        if direction.dot(v0) > 0.0 {
            self.points.swap(1, 2);
            direction = -direction;
        }

        loop {
            self.points[3] = self.support(direction);
            let dot = self.v(3).dot(direction);
            if is_zero(dot) || dot < 0.0 {
                return Discovery::Separated;
            }

            let mut replaced = false;
            let dot = self.v(1).cross(self.v(3)).dot(v0);
            if dot < 0.0 && !is_zero(dot) {
                self.points[2] = self.points[3];
                replaced = true;
            }
            if !replaced {
                let dot = self.v(3).cross(self.v(2)).dot(v0);
                if dot < 0.0 && !is_zero(dot) {
                    self.points[1] = self.points[3];
                    replaced = true;
                }
            }
            if !replaced {
                return Discovery::Portal;
            }
            direction = (self.v(1) - v0).cross(self.v(2) - v0).normalize_or_zero();
        }
    }

    /// Refines the portal until the origin is inside it. Returns false if the origin is outside
    /// the difference.
    fn refine(&mut self, tolerance: f32, max_iterations: usize) -> bool {
        for _ in 0..max_iterations {
            let direction = self.direction();
            if self.encapsulates_origin(direction) {
                return true;
            }
            let v4 = self.support(direction);
            let dot = v4.v.dot(direction);
            let can_encapsulate = is_zero(dot) || dot > 0.0;
            if !can_encapsulate || self.reached_tolerance(v4.v, direction, tolerance) {
                return false;
            }
            self.expand(v4);
        }
        false
    }

    /// Barycentric position of the origin's projection on the portal, mapped to both shapes.
    fn position(&self) -> Vec3 {
        let direction = self.direction();
        let (v0, v1, v2, v3) = (self.v(0), self.v(1), self.v(2), self.v(3));
        let mut weights = [
            v1.cross(v2).dot(v3),
            v3.cross(v2).dot(v0),
            v0.cross(v1).dot(v3),
            v2.cross(v1).dot(v0),
        ];
        let mut sum: f32 = weights.iter().sum();
        if is_zero(sum) || sum < 0.0 {
            weights = [
                0.0,
                v2.cross(v3).dot(direction),
                v3.cross(v1).dot(direction),
                v1.cross(v2).dot(direction),
            ];
            sum = weights.iter().sum();
        }
        if is_zero(sum) {
            return 0.5 * (self.points[1].on_a + self.points[1].on_b);
        }
        let inverse = 1.0 / sum;
        let mut on_a = Vec3::ZERO;
        let mut on_b = Vec3::ZERO;
        for (weight, point) in weights.iter().zip(self.points.iter()) {
            on_a += *weight * point.on_a;
            on_b += *weight * point.on_b;
        }
        0.5 * (on_a + on_b) * inverse
    }

    fn penetration(&mut self, tolerance: f32, max_iterations: usize) -> Penetration {
        let mut iterations = 0;
        loop {
            let direction = self.direction();
            let v4 = self.support(direction);
            if iterations >= max_iterations || self.reached_tolerance(v4.v, direction, tolerance) {
                let closest = closest_point_on_triangle(self.v(1), self.v(2), self.v(3));
                let depth = closest.length();
                let normal = if is_zero(depth) { direction } else { closest / depth };
                return Penetration {
                    depth,
                    normal,
                    position: self.position(),
                };
            }
            self.expand(v4);
            iterations += 1;
        }
    }
}

/// Point of triangle `abc` closest to the origin.
fn closest_point_on_triangle(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = -a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }
    let bp = -b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }
    let cp = -c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }
    let denominator = va + vb + vc;
    if is_zero(denominator) {
        return a;
    }
    let v = vb / denominator;
    let w = vc / denominator;
    a + ab * v + ac * w
}

/// Minkowski portal refinement entry points.
pub struct DepthRefiner;

impl DepthRefiner {
    /// Whether two convex shapes intersect.
    pub fn intersects<A: SupportFinder, B: SupportFinder>(
        a: &A,
        b: &B,
        tolerance: f32,
        max_iterations: usize,
    ) -> bool {
        let mut portal = Portal {
            a,
            b,
            points: [SupportPoint::default(); 4],
        };
        match portal.discover() {
            Discovery::Separated => false,
            Discovery::Touching | Discovery::OnSegment => true,
            Discovery::Portal => portal.refine(tolerance, max_iterations),
        }
    }

    /// Penetration of two convex shapes, or `None` when they do not intersect.
    pub fn find_penetration<A: SupportFinder, B: SupportFinder>(
        a: &A,
        b: &B,
        tolerance: f32,
        max_iterations: usize,
    ) -> Option<Penetration> {
        let mut portal = Portal {
            a,
            b,
            points: [SupportPoint::default(); 4],
        };
        match portal.discover() {
            Discovery::Separated => None,
            Discovery::Touching => {
                let touch = portal.points[1];
                Some(Penetration {
                    depth: 0.0,
                    normal: (b.center() - a.center()).normalize_or(Vec3::Z),
                    position: 0.5 * (touch.on_a + touch.on_b),
                })
            }
            Discovery::OnSegment => {
                let deepest = portal.points[1];
                let depth = deepest.v.length();
                Some(Penetration {
                    depth,
                    normal: deepest.v / depth,
                    position: 0.5 * (deepest.on_a + deepest.on_b),
                })
            }
            Discovery::Portal => {
                if !portal.refine(tolerance, max_iterations) {
                    return None;
                }
                Some(portal.penetration(tolerance, max_iterations))
            }
        }
    }
}
