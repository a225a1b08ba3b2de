//! Closed-form rigid alignment of paired point sets.
//!
//! Procrustes (Kabsch) solution in 2D:
//!
//! ```text
//! 1. Subtract centroids:         p' = p − p̄,  q' = q − q̄
//! 2. Cross-covariance:           H = Σ q'·p'ᵗ
//! 3. SVD:                        H = U·S·Vᵗ
//! 4. Rotation:                   R = U·Vᵗ   (flip U's second column if det R < 0)
//! 5. Translation:                t = q̄ − R·p̄
//! ```

use crate::core::transform::{Point2D, RigidTransform2D};

/// Row-major 2×2 matrix.
pub type Mat2 = [[f64; 2]; 2];

/// Singular value decomposition of a 2×2 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Svd2 {
    /// Left singular vectors as columns
    pub u: Mat2,
    /// Singular values, descending
    pub s: [f64; 2],
    /// Right singular vectors as columns
    pub v: Mat2,
}

#[inline]
fn mul(a: &Mat2, b: &Mat2) -> Mat2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

#[inline]
fn transpose(a: &Mat2) -> Mat2 {
    [[a[0][0], a[1][0]], [a[0][1], a[1][1]]]
}

#[inline]
fn det(a: &Mat2) -> f64 {
    a[0][0] * a[1][1] - a[0][1] * a[1][0]
}

/// SVD of `a` via the eigen-decomposition of `aᵗ·a`.
///
/// Singular values are returned in descending order. When the smaller
/// singular value vanishes, the second left singular vector is completed
/// as the perpendicular of the first.
pub fn svd2x2(a: &Mat2) -> Svd2 {
    let ata = mul(&transpose(a), a);
    let (p, q, r) = (ata[0][0], ata[0][1], ata[1][1]);

    // Jacobi rotation diagonalising the symmetric aᵗa; the first axis is the
    // eigenvector of the larger eigenvalue.
    let theta = 0.5 * (2.0 * q).atan2(p - r);
    let (sin, cos) = theta.sin_cos();
    let l1 = p * cos * cos + 2.0 * q * sin * cos + r * sin * sin;
    let l2 = p * sin * sin - 2.0 * q * sin * cos + r * cos * cos;
    let s1 = l1.max(0.0).sqrt();
    let s2 = l2.max(0.0).sqrt();
    let v = [[cos, -sin], [sin, cos]];

    let av1 = Point2D::new(a[0][0] * cos + a[0][1] * sin, a[1][0] * cos + a[1][1] * sin);
    let av2 = Point2D::new(-a[0][0] * sin + a[0][1] * cos, -a[1][0] * sin + a[1][1] * cos);
    let u1 = if s1 > 1e-12 { av1 * (1.0 / s1) } else { Point2D::new(1.0, 0.0) };
    let u2 = if s2 > 1e-12 * s1.max(1.0) {
        av2 * (1.0 / s2)
    } else {
        Point2D::new(-u1.y, u1.x)
    };

    Svd2 {
        u: [[u1.x, u2.x], [u1.y, u2.y]],
        s: [s1, s2],
        v,
    }
}

/// Rigid transform `T` minimising `Σ |T(p_i) − q_i|²`.
///
/// The rotation comes from the SVD of the centred cross-covariance
/// `H = Σ q_i·p_iᵀ` as `R = U·Vᵀ`. That is the transpose of the `Pᵀ·Q`
/// formulation with `R = V·Uᵀ`, so both give the same rotation.
///
/// # Panics
///
/// Panics if `p` and `q` differ in length.
pub fn align(p: &[Point2D], q: &[Point2D]) -> RigidTransform2D {
    assert_eq!(p.len(), q.len(), "point sets must have the same length");
    if p.is_empty() {
        return RigidTransform2D::identity();
    }
    let n = p.len() as f64;
    let centroid = |points: &[Point2D]| {
        points.iter().fold(Point2D::ZERO, |acc, pt| acc + *pt) * (1.0 / n)
    };
    let cp = centroid(p);
    let cq = centroid(q);

    let mut h: Mat2 = [[0.0; 2]; 2];
    for (pi, qi) in p.iter().zip(q) {
        let a = *pi - cp;
        let b = *qi - cq;
        h[0][0] += b.x * a.x;
        h[0][1] += b.x * a.y;
        h[1][0] += b.y * a.x;
        h[1][1] += b.y * a.y;
    }

    let Svd2 { mut u, v, .. } = svd2x2(&h);
    let mut r = mul(&u, &transpose(&v));
    if det(&r) < 0.0 {
        log::debug!("Reflection in alignment, correcting");
        u[0][1] = -u[0][1];
        u[1][1] = -u[1][1];
        r = mul(&u, &transpose(&v));
    }

    let rotation = r[1][0].atan2(r[0][0]);
    let rotated = Point2D::new(
        r[0][0] * cp.x + r[0][1] * cp.y,
        r[1][0] * cp.x + r[1][1] * cp.y,
    );
    RigidTransform2D::new(rotation, cq - rotated)
}
