//! Point and rigid-transform types for 2D SLAM.
//!
//! A [`RigidTransform2D`] is a rotation followed by a translation. Poses are
//! transforms from the robot frame into the map frame; constraints are
//! transforms between two robot frames.
//!
//! Interpolation is constant-curvature: intermediate transforms lie on the
//! circular arc that joins the endpoints, which is the path a differential
//! drive robot actually follows. Linear blending of translation would drift
//! off that arc and bias the relaxation in the pose graph.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use super::math::{angle_diff, normalize_angle};

/// A 2D point or vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2D {
    /// Origin.
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` from the +x axis.
    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin)
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Point2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length (avoids sqrt).
    #[inline]
    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    /// Length of the vector.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        (*self - *other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Rotate counter-clockwise about the origin.
    #[inline]
    pub fn rotate(&self, angle: f64) -> Point2D {
        let (sin, cos) = angle.sin_cos();
        Point2D::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Angle from the +x axis.
    #[inline]
    pub fn heading(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    #[inline]
    pub fn normalized(&self) -> Point2D {
        let len = self.length();
        if len > 0.0 { *self * (1.0 / len) } else { Point2D::ZERO }
    }
}

impl Add for Point2D {
    type Output = Point2D;
    #[inline]
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point2D {
    #[inline]
    fn add_assign(&mut self, rhs: Point2D) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point2D {
    type Output = Point2D;
    #[inline]
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;
    #[inline]
    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point2D {
    type Output = Point2D;
    #[inline]
    fn neg(self) -> Point2D {
        Point2D::new(-self.x, -self.y)
    }
}

/// Rotation followed by translation in the plane.
///
/// ```text
/// apply(p) = R(rotation) · p + translation
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidTransform2D {
    /// Rotation in radians (counter-clockwise)
    pub rotation: f64,
    /// Translation applied after the rotation
    pub translation: Point2D,
}

impl RigidTransform2D {
    /// Create a new transform.
    #[inline]
    pub const fn new(rotation: f64, translation: Point2D) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity transform.
    #[inline]
    pub const fn identity() -> Self {
        Self::new(0.0, Point2D::ZERO)
    }

    /// Transform a point into the target frame.
    #[inline]
    pub fn apply(&self, point: &Point2D) -> Point2D {
        point.rotate(self.rotation) + self.translation
    }

    /// The transform that undoes this one.
    ///
    /// ```text
    /// T⁻¹ = (−r, −R(−r)·t)
    /// ```
    #[inline]
    pub fn inverse(&self) -> RigidTransform2D {
        RigidTransform2D::new(
            normalize_angle(-self.rotation),
            -self.translation.rotate(-self.rotation),
        )
    }

    /// Apply `a` and then `b` expressed in the frame of `a`.
    ///
    /// ```text
    /// combine(a, b) = (a.r + b.r, a.t + R(a.r)·b.t)
    /// ```
    #[inline]
    pub fn combine(a: &RigidTransform2D, b: &RigidTransform2D) -> RigidTransform2D {
        RigidTransform2D::new(
            normalize_angle(a.rotation + b.rotation),
            a.translation + b.translation.rotate(a.rotation),
        )
    }

    /// The transform from `b` to `a`, so that `combine(b, relative(a, b)) == a`.
    #[inline]
    pub fn relative(a: &RigidTransform2D, b: &RigidTransform2D) -> RigidTransform2D {
        RigidTransform2D::new(
            angle_diff(a.rotation, b.rotation),
            (a.translation - b.translation).rotate(-b.rotation),
        )
    }

    /// Scale the motion along its constant-curvature arc.
    ///
    /// The transform is read as a circular arc starting at the origin that
    /// turns by `rotation` and ends at `translation`. The result is the
    /// transform after travelling the fraction `s` of that arc:
    ///
    /// ```text
    /// φ = normalize(r)
    /// rotation'    = s·φ
    /// translation' = R((s − 1)·φ/2)·t · sin(s·φ/2) / sin(φ/2)
    /// ```
    ///
    /// For a (numerically) straight motion this degenerates to `s·t`.
    pub fn scale_along_arc(&self, s: f64) -> RigidTransform2D {
        let phi = normalize_angle(self.rotation);
        let half_sin = (phi / 2.0).sin();
        if half_sin.abs() < 1e-12 {
            return RigidTransform2D::new(phi * s, self.translation * s);
        }
        let chord_ratio = (s * phi / 2.0).sin() / half_sin;
        RigidTransform2D::new(
            phi * s,
            self.translation.rotate((s - 1.0) * phi / 2.0) * chord_ratio,
        )
    }

    /// Constant-curvature interpolation from `a` (t = 0) to `b` (t = 1).
    #[inline]
    pub fn interpolate(a: &RigidTransform2D, b: &RigidTransform2D, t: f64) -> RigidTransform2D {
        RigidTransform2D::combine(a, &RigidTransform2D::relative(b, a).scale_along_arc(t))
    }

    /// Rotate the frame of reference after the transformation.
    pub fn rotate_relative(&mut self, rotation: f64) -> &mut Self {
        self.rotation = normalize_angle(self.rotation + rotation);
        self
    }

    /// Translate in the frame of reference after the transformation.
    pub fn translate_relative(&mut self, translation: &Point2D) -> &mut Self {
        self.translation += translation.rotate(self.rotation);
        self
    }

    /// Rotate the frame of reference before the transformation.
    pub fn rotate_global(&mut self, rotation: f64) -> &mut Self {
        self.rotation = normalize_angle(self.rotation + rotation);
        self.translation = self.translation.rotate(rotation);
        self
    }

    /// Translate in the frame of reference before the transformation.
    pub fn translate_global(&mut self, translation: &Point2D) -> &mut Self {
        self.translation += *translation;
        self
    }

    /// Whether rotation and translation match within `epsilon`.
    pub fn approx_eq(&self, other: &RigidTransform2D, epsilon: f64) -> bool {
        angle_diff(self.rotation, other.rotation).abs() <= epsilon
            && (self.translation.x - other.translation.x).abs() <= epsilon
            && (self.translation.y - other.translation.y).abs() <= epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn assert_transform_eq(a: &RigidTransform2D, b: &RigidTransform2D) {
        assert!(a.approx_eq(b, 1e-7), "{a:?} != {b:?}");
    }

    #[test]
    fn test_point_rotate_quarter_turn() {
        let p = Point2D::new(1.0, 0.0).rotate(PI / 2.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn test_apply_then_inverse() {
        let p = Point2D::new(1.0, 2.0);
        let t = RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0));
        let back = t.inverse().apply(&t.apply(&p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_laws() {
        let cases = [
            RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0)),
            RigidTransform2D::new(-2.9, Point2D::new(-3.0, 0.25)),
            RigidTransform2D::new(PI, Point2D::new(0.0, -1.0)),
        ];
        for t in cases {
            assert_transform_eq(
                &RigidTransform2D::combine(&t, &t.inverse()),
                &RigidTransform2D::identity(),
            );
            assert_transform_eq(&t.inverse().inverse(), &t);
        }
    }

    #[test]
    fn test_relative_undoes_combine() {
        let base = RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0));
        let step = RigidTransform2D::new(PI / 10.0, Point2D::new(3.0, 4.0));
        let combined = RigidTransform2D::combine(&base, &step);
        assert_transform_eq(&RigidTransform2D::relative(&combined, &base), &step);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = RigidTransform2D::new(0.4, Point2D::new(1.0, 2.0));
        let b = RigidTransform2D::new(-1.1, Point2D::new(-4.0, 7.0));
        assert_transform_eq(&RigidTransform2D::interpolate(&a, &b, 0.0), &a);
        assert_transform_eq(&RigidTransform2D::interpolate(&a, &b, 1.0), &b);
    }

    #[test]
    fn test_interpolate_known_value() {
        let a = RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0));
        let b = RigidTransform2D::new(PI / 10.0, Point2D::new(3.0, 4.0));
        let mid = RigidTransform2D::interpolate(&a, &b, 0.3);
        assert_relative_eq!(mid.rotation, 0.534070751, epsilon = 1e-8);
        assert_relative_eq!(mid.translation.x, 1.631658371, epsilon = 1e-8);
        assert_relative_eq!(mid.translation.y, 4.766780390, epsilon = 1e-8);
    }

    #[test]
    fn test_interpolate_symmetry() {
        let pairs = [
            (
                RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0)),
                RigidTransform2D::new(PI / 10.0, Point2D::new(3.0, 4.0)),
            ),
            (
                RigidTransform2D::new(3.0, Point2D::new(2.0, -1.0)),
                RigidTransform2D::new(-2.9, Point2D::new(0.0, 4.0)),
            ),
        ];
        for (a, b) in pairs {
            for t in [0.0, 0.3, 0.6, 1.0] {
                let forward = RigidTransform2D::interpolate(&a, &b, t);
                let backward = RigidTransform2D::interpolate(&b, &a, 1.0 - t);
                assert_transform_eq(&forward, &backward);
            }
        }
    }

    #[test]
    fn test_interpolate_inverted_transformations() {
        let a = RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0));
        let b = RigidTransform2D::new(PI / 10.0, Point2D::new(3.0, 4.0));
        let direct = RigidTransform2D::interpolate(&a, &b, 0.3);
        let via_inverse =
            RigidTransform2D::interpolate(&a.inverse(), &b.inverse(), 0.3).inverse();
        assert_transform_eq(&via_inverse, &direct);
    }

    #[test]
    fn test_interpolate_offset_invariance() {
        let offset = RigidTransform2D::new(2.5, Point2D::new(-7.0, 3.0));
        let a = RigidTransform2D::new(PI / 5.0, Point2D::new(1.0, 5.0));
        let b = RigidTransform2D::new(PI / 10.0, Point2D::new(3.0, 4.0));
        let shifted = RigidTransform2D::interpolate(
            &RigidTransform2D::combine(&offset, &a),
            &RigidTransform2D::combine(&offset, &b),
            0.3,
        );
        let unshifted = RigidTransform2D::interpolate(&a, &b, 0.3);
        assert_transform_eq(
            &shifted,
            &RigidTransform2D::combine(&offset, &unshifted),
        );
        // Removing the interpolated pose from the shifted result recovers the offset
        let recovered = RigidTransform2D::combine(&shifted, &unshifted.inverse());
        assert_transform_eq(&recovered, &offset);
    }

    #[test]
    fn test_scale_along_arc_straight_line() {
        let t = RigidTransform2D::new(0.0, Point2D::new(0.0, 10.0));
        let half = t.scale_along_arc(0.5);
        assert_relative_eq!(half.rotation, 0.0);
        assert_relative_eq!(half.translation.y, 5.0);
    }

    #[test]
    fn test_scale_along_arc_stays_on_circle() {
        // Quarter circle of radius 2 turning left, heading along +y
        let radius = 2.0;
        let quarter = RigidTransform2D::new(PI / 2.0, Point2D::new(-radius, radius));
        let half = quarter.scale_along_arc(0.5);
        let center = Point2D::new(-radius, 0.0);
        assert_relative_eq!(half.rotation, PI / 4.0, epsilon = 1e-12);
        assert_relative_eq!(half.translation.distance(&center), radius, epsilon = 1e-9);
    }

    #[test]
    fn test_mutation_helpers() {
        let mut t = RigidTransform2D::identity();
        t.translate_relative(&Point2D::new(0.0, 1.0))
            .rotate_relative(PI / 2.0)
            .translate_relative(&Point2D::new(0.0, 1.0));
        assert_relative_eq!(t.translation.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(t.translation.y, 1.0, epsilon = 1e-12);

        let mut g = RigidTransform2D::new(0.0, Point2D::new(1.0, 0.0));
        g.rotate_global(PI / 2.0).translate_global(&Point2D::new(1.0, 0.0));
        assert_relative_eq!(g.translation.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(g.translation.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(g.rotation, PI / 2.0, epsilon = 1e-12);
    }
}
