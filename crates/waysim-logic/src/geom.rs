//! Plain geometry primitives shared across the navigation stack.
//!
//! Everything here is a pure value type with no graph or world knowledge.

use serde::{Deserialize, Serialize};

/// 2D position vector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Linear interpolation: `self` at t=0, `other` at t=1.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Midpoint of two points.
    pub fn midpoint(&self, other: &Self) -> Self {
        self.lerp(other, 0.5)
    }

    /// Heading of this vector in radians, in (-π, π].
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

/// Axis-aligned rectangle (min corner + extents).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rect containing all points. Empty input yields a zero rect.
    pub fn from_points(points: &[Vec2]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: &Vec2) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.max_x()
            && other.x <= self.max_x()
            && self.y <= other.max_y()
            && other.y <= self.max_y()
    }

    /// Rect grown outward by `amount` on every side.
    pub fn outset(&self, amount: f32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    /// Closest point of the rect to `p` (p itself if inside).
    pub fn closest_point(&self, p: &Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.x, self.max_x()),
            p.y.clamp(self.y, self.max_y()),
        )
    }

    /// Whether segment `ab` touches the rect (slab clipping).
    pub fn intersects_segment(&self, a: &Vec2, b: &Vec2) -> bool {
        let d = *b - *a;
        let mut tmin = 0.0f32;
        let mut tmax = 1.0f32;
        for (start, delta, min, max) in [
            (a.x, d.x, self.x, self.max_x()),
            (a.y, d.y, self.y, self.max_y()),
        ] {
            if delta.abs() <= f32::EPSILON {
                if start < min || start > max {
                    return false;
                }
            } else {
                let t1 = (min - start) / delta;
                let t2 = (max - start) / delta;
                tmin = tmin.max(t1.min(t2));
                tmax = tmax.min(t1.max(t2));
            }
        }
        tmin <= tmax
    }
}

/// Circle (center + radius).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, p: &Vec2) -> bool {
        self.center.distance_squared(p) <= self.radius * self.radius
    }

    pub fn intersects_circle(&self, other: &Circle) -> bool {
        let r = self.radius + other.radius;
        self.center.distance_squared(&other.center) <= r * r
    }

    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        let closest = rect.closest_point(&self.center);
        self.center.distance_squared(&closest) <= self.radius * self.radius
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.center.x - self.radius,
            self.center.y - self.radius,
            self.radius * 2.0,
            self.radius * 2.0,
        )
    }
}

/// Simple polygon as an ordered vertex loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub points: Vec<Vec2>,
}

impl Polygon {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    pub fn from_rect(rect: &Rect) -> Self {
        Self::new(vec![
            Vec2::new(rect.x, rect.y),
            Vec2::new(rect.max_x(), rect.y),
            Vec2::new(rect.max_x(), rect.max_y()),
            Vec2::new(rect.x, rect.max_y()),
        ])
    }

    /// Ray-casting containment test.
    pub fn contains(&self, p: &Vec2) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.points[i];
            let vj = self.points[j];
            if ((vi.y > p.y) != (vj.y > p.y))
                && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Twice the signed area of triangle (a, b, c). Positive when CCW.
pub fn tri_area2(a: &Vec2, b: &Vec2, c: &Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// Point-in-triangle via sign of the three sub-areas (boundary counts as inside).
pub fn point_in_triangle(p: &Vec2, a: &Vec2, b: &Vec2, c: &Vec2) -> bool {
    let d1 = tri_area2(p, a, b);
    let d2 = tri_area2(p, b, c);
    let d3 = tri_area2(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Distance from `p` to the closest point of segment `ab`.
pub fn point_segment_distance(p: &Vec2, a: &Vec2, b: &Vec2) -> f32 {
    let ab = *b - *a;
    let len2 = ab.dot(&ab);
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((*p - *a).dot(&ab) / len2).clamp(0.0, 1.0);
    p.distance(&(*a + ab * t))
}

/// Shortest signed angular difference `to - from`, wrapped into (-π, π].
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let mut d = to - from;
    while d > std::f32::consts::PI {
        d -= 2.0 * std::f32::consts::PI;
    }
    while d <= -std::f32::consts::PI {
        d += 2.0 * std::f32::consts::PI;
    }
    d
}

/// Row-major 2D affine transform `[a b c d e f]`:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            e: dx,
            f: dy,
            ..Self::IDENTITY
        }
    }

    pub fn from_array(m: [f32; 6]) -> Self {
        Self {
            a: m[0],
            b: m[1],
            c: m[2],
            d: m[3],
            e: m[4],
            f: m[5],
        }
    }

    pub fn apply(&self, p: &Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Whether the transform flips orientation (negative determinant).
    /// Flipping transforms reverse triangle winding.
    pub fn flips(&self) -> bool {
        self.a * self.d - self.b * self.c < 0.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
