//! Collision Geometry
//!
//! Stateless overlap and intersection tests between circles, axis-aligned
//! rectangles, triangles and line segments.
//!
//! Overlap functions return a *penetration* vector: subtracting it from the
//! circle centre moves the circle just out of the shape. Intersection
//! functions return the first contact point along a segment, plus the
//! outward surface normal where a reflection needs one.

use super::vec2::{Vec2, EPSILON};

// =============================================================================
// SHAPES
// =============================================================================

/// Directed line segment. `end` is the leading edge for projectiles.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Line {
    /// Segment start
    pub start: Vec2,
    /// Segment end
    pub end: Vec2,
}

impl Line {
    /// Create a segment.
    #[inline]
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    /// Vector from start to end.
    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    /// Segment length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    /// Intersection point of two segments.
    ///
    /// Collinear overlapping segments intersect at the middle of their
    /// overlap.
    pub fn intersection(&self, other: &Line) -> Option<Vec2> {
        let u = self.direction();
        let v = other.direction();
        let offset = self.start - other.start;

        let v_cross_u = v.cross(u);
        if v_cross_u.abs() < EPSILON {
            // Parallel
            if offset.cross(v).abs() >= EPSILON {
                return None;
            }
            // Collinear
            let v_len_sq = v.dot(v);
            if v_len_sq < EPSILON {
                return None;
            }
            let mut t0 = offset.dot(v) / v_len_sq;
            let mut t1 = (self.end - other.start).dot(v) / v_len_sq;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            let overlaps = (0.0..=1.0).contains(&t0)
                || (0.0..=1.0).contains(&t1)
                || (t0 <= 0.0 && t1 >= 1.0);
            if !overlaps {
                return None;
            }
            let t = (t0.max(0.0) + t1.min(1.0)) / 2.0;
            return Some(other.start + v.scale(t));
        }

        let s = offset.cross(v) / v_cross_u;
        let t = offset.cross(u) / v_cross_u;
        if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
            return Some(self.start + u.scale(s));
        }
        None
    }

    /// Closest point on the segment to `p`.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let u = self.direction();
        let u_len = u.length();
        if u_len < EPSILON {
            return self.start;
        }

        let s_len = (p - self.start).dot(u) / u_len;
        if s_len < 0.0 {
            self.start
        } else if s_len > u_len {
            self.end
        } else {
            self.start + u.scale(s_len / u_len)
        }
    }
}

/// Axis-aligned rectangle anchored at its bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    /// Bottom-left corner
    pub pos: Vec2,
    /// Width and height
    pub size: Vec2,
}

impl Rect {
    /// Create a rectangle.
    #[inline]
    pub const fn new(pos: Vec2, size: Vec2) -> Self {
        Self { pos, size }
    }

    /// Centre point.
    #[inline]
    pub fn mid(&self) -> Vec2 {
        self.pos + self.size.scale(0.5)
    }

    /// Strict containment: points on the boundary are outside.
    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x > self.pos.x
            && p.x < self.pos.x + self.size.x
            && p.y > self.pos.y
            && p.y < self.pos.y + self.size.y
    }

    /// Top side, left to right.
    pub fn top(&self) -> Line {
        Line::new(self.pos.add_xy(0.0, self.size.y), self.pos + self.size)
    }

    /// Bottom side, left to right.
    pub fn bottom(&self) -> Line {
        Line::new(self.pos, self.pos.add_xy(self.size.x, 0.0))
    }

    /// Left side, bottom to top.
    pub fn left(&self) -> Line {
        Line::new(self.pos, self.pos.add_xy(0.0, self.size.y))
    }

    /// Right side, bottom to top.
    pub fn right(&self) -> Line {
        Line::new(self.pos.add_xy(self.size.x, 0.0), self.pos + self.size)
    }

    /// Side nearest to `p`. Ties resolve top, bottom, left, right.
    pub fn closest_side(&self, p: Vec2) -> Line {
        let mut closest = self.top();
        let mut closest_dist = closest.closest_point(p).distance(p);
        for side in [self.bottom(), self.left(), self.right()] {
            let dist = side.closest_point(p).distance(p);
            if dist < closest_dist {
                closest_dist = dist;
                closest = side;
            }
        }
        closest
    }
}

/// Circle.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Circle {
    /// Centre
    pub pos: Vec2,
    /// Radius
    pub radius: f64,
}

impl Circle {
    /// Create a circle.
    #[inline]
    pub const fn new(pos: Vec2, radius: f64) -> Self {
        Self { pos, radius }
    }
}

/// Segment contact with a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Contact point
    pub pos: Vec2,
    /// Outward unit normal of the surface hit
    pub normal: Vec2,
}

// =============================================================================
// CIRCLE OVERLAP
// =============================================================================

/// Penetration of a circle into a rectangle.
///
/// Subtracting the result from `c.pos` leaves the circle touching the
/// rectangle's nearest side from outside.
pub fn circle_rect_overlap(c: Circle, r: Rect) -> Option<Vec2> {
    let closest = r.closest_side(c.pos).closest_point(c.pos);
    let centre_inside = r.contains_point(c.pos);

    // Separating axis, pointing out of the rectangle
    let mut axis = if centre_inside {
        closest - c.pos
    } else {
        c.pos - closest
    };
    let mut axis_len = axis.length();

    if axis_len >= c.radius && !centre_inside {
        return None;
    }

    // Centre sits exactly on a side
    if axis_len < EPSILON {
        axis = closest - r.mid();
        axis_len = axis.length();
        if axis_len < EPSILON {
            return None;
        }
    }
    let axis = axis.scale(1.0 / axis_len);

    let resolved = closest + axis.scale(c.radius);
    Some(c.pos - resolved)
}

/// Penetration of a circle into a counter-clockwise triangle.
///
/// ```text
///         t2
///         /\
///  n2 <- /  \ -> n1
///       /    \
///   t0 /______\ t1
///          |
///          n0
/// ```
pub fn circle_triangle_overlap(c: Circle, t: [Vec2; 3]) -> Option<Vec2> {
    let normals = triangle_normals(t);
    let u = [c.pos - t[0], c.pos - t[1], c.pos - t[2]];
    let dots = [u[0].dot(normals[0]), u[1].dot(normals[1]), u[2].dot(normals[2])];

    // First side the centre lies outside of decides the overlap
    for i in 0..3 {
        let j = (i + 1) % 3;
        if dots[i] > 0.0 {
            return triangle_side_overlap(c, u[i], u[j], t[i], t[j], normals[i], dots[i]);
        }
    }

    // Centre inside: push out through the nearest side
    let nearest = if dots[0] > dots[1] {
        if dots[0] > dots[2] { 0 } else { 2 }
    } else if dots[1] > dots[2] {
        1
    } else {
        2
    };
    Some(normals[nearest].scale(dots[nearest] - c.radius))
}

fn triangle_side_overlap(
    c: Circle,
    u0: Vec2,
    u1: Vec2,
    t0: Vec2,
    t1: Vec2,
    normal: Vec2,
    u0_dot_normal: f64,
) -> Option<Vec2> {
    if u0_dot_normal >= c.radius {
        return None;
    }

    let side = t1 - t0;
    let projection = side.dot(u0);

    // Closest to the first vertex
    if projection < 0.0 {
        return vertex_overlap(c, u0);
    }

    // Closest to the second vertex
    if projection > side.length_squared() {
        return vertex_overlap(c, u1);
    }

    Some(normal.scale(u0_dot_normal - c.radius))
}

fn vertex_overlap(c: Circle, u: Vec2) -> Option<Vec2> {
    let len = u.length();
    if len >= c.radius || len < EPSILON {
        return None;
    }
    Some(u.scale((len - c.radius) / len))
}

/// Outward unit normals of a counter-clockwise triangle, one per side
/// `t[i] -> t[i+1]`.
pub fn triangle_normals(t: [Vec2; 3]) -> [Vec2; 3] {
    [
        (t[1] - t[0]).normalize().rotate_cw(),
        (t[2] - t[1]).normalize().rotate_cw(),
        (t[0] - t[2]).normalize().rotate_cw(),
    ]
}

/// Strict point-in-triangle test for a counter-clockwise triangle.
pub fn triangle_contains_point(t: [Vec2; 3], p: Vec2) -> bool {
    (0..3).all(|i| {
        let a = t[i];
        let b = t[(i + 1) % 3];
        (b - a).cross(p - a) > 0.0
    })
}

// =============================================================================
// SEGMENT INTERSECTION
// =============================================================================

/// First point where a segment enters a circle.
///
/// A segment starting inside the circle hits at its start.
pub fn line_circle_intersect(l: Line, c: Circle) -> Option<Vec2> {
    let u = l.start - c.pos;
    let v = l.direction();
    let a = v.dot(v);
    let cc = u.dot(u) - c.radius * c.radius;

    if a < EPSILON * EPSILON {
        return (cc < 0.0).then_some(l.start);
    }

    let b = 2.0 * u.dot(v);
    let discriminant = b * b - 4.0 * a * cc;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt = discriminant.sqrt();
    let t1 = (-b - sqrt) / (2.0 * a);
    let t2 = (-b + sqrt) / (2.0 * a);
    if t2 <= 0.0 || t1 >= 1.0 {
        return None;
    }
    Some(l.start + v.scale(t1.max(0.0)))
}

/// First contact of a segment with a rectangle.
///
/// Only the sides facing the direction of travel are tested: left or right
/// first, then bottom or top.
pub fn line_rect_intersect(l: Line, r: Rect) -> Option<Hit> {
    let u = l.direction();
    if u.length_squared() < EPSILON * EPSILON {
        return None;
    }

    let mut line = l;
    if r.contains_point(line.start) {
        // Send start backward so the entry side is crossed
        line.start = line.start - u.resize(r.size.x + r.size.y);
    }

    let (side, normal) = if u.x > 0.0 {
        (r.left(), Vec2::LEFT)
    } else {
        (r.right(), Vec2::RIGHT)
    };
    if let Some(pos) = line.intersection(&side) {
        return Some(Hit { pos, normal });
    }

    let (side, normal) = if u.y > 0.0 {
        (r.bottom(), Vec2::DOWN)
    } else {
        (r.top(), Vec2::UP)
    };
    line.intersection(&side).map(|pos| Hit { pos, normal })
}

/// First contact of a segment with a counter-clockwise triangle.
pub fn line_triangle_intersect(l: Line, t: [Vec2; 3]) -> Option<Hit> {
    let u = l.direction();
    if u.length_squared() < EPSILON * EPSILON {
        return None;
    }

    let mut line = l;
    if triangle_contains_point(t, line.start) {
        let perimeter = t[0].distance(t[1]) + t[1].distance(t[2]) + t[2].distance(t[0]);
        line.start = line.start - u.resize(perimeter);
    }

    let normals = triangle_normals(t);
    let mut nearest: Option<(f64, Hit)> = None;
    for i in 0..3 {
        let normal = normals[i];
        // Back-facing sides can only be exits
        if u.dot(normal) >= 0.0 {
            continue;
        }
        let side = Line::new(t[i], t[(i + 1) % 3]);
        if let Some(pos) = line.intersection(&side) {
            let dist = line.start.distance(pos);
            if nearest.map_or(true, |(best, _)| dist < best) {
                nearest = Some((dist, Hit { pos, normal }));
            }
        }
    }
    nearest.map(|(_, hit)| hit)
}

// =============================================================================
// TESTS
// =============================================================================
