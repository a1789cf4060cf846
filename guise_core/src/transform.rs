// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform.
//!
//! Covers what node placement needs (translation, Euler rotation through a
//! quaternion, scale, composition, affine inverse) without pulling in a full
//! linear-algebra crate.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A column-major 4×4 affine transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, the layout renderers
/// upload directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation from a unit quaternion `[x, y, z, w]`.
    #[must_use]
    pub fn from_quat(q: [f64; 4]) -> Self {
        let [x, y, z, w] = q;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Self {
            cols: [
                [1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0],
                [2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0],
                [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation from Euler angles in degrees.
    #[inline]
    #[must_use]
    pub fn from_euler_degrees(x: f64, y: f64, z: f64) -> Self {
        Self::from_quat(euler_to_quat(x, y, z))
    }

    /// Returns the translation column as `[x, y, z]`.
    #[inline]
    #[must_use]
    pub const fn translation(&self) -> [f64; 3] {
        let t = self.cols[3];
        [t[0], t[1], t[2]]
    }

    /// Returns the length of basis vector `i`, the scale along that axis.
    #[must_use]
    pub fn axis_length(&self, i: usize) -> f64 {
        let c = self.cols[i];
        (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt()
    }

    /// Transforms a point (implicit `w = 1`).
    #[must_use]
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let c = &self.cols;
        let mut out = [0.0; 3];
        let mut i = 0;
        while i < 3 {
            out[i] = c[0][i] * p[0] + c[1][i] * p[1] + c[2][i] * p[2] + c[3][i];
            i += 1;
        }
        out
    }

    /// Inverse of an affine transform, or `None` if it is singular.
    #[must_use]
    pub fn inverse_affine(&self) -> Option<Self> {
        let c = &self.cols;
        let (a, b, cc) = (c[0][0], c[1][0], c[2][0]);
        let (d, e, f) = (c[0][1], c[1][1], c[2][1]);
        let (g, h, k) = (c[0][2], c[1][2], c[2][2]);
        let co0 = e * k - f * h;
        let co1 = f * g - d * k;
        let co2 = d * h - e * g;
        let det = a * co0 + b * co1 + cc * co2;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        // Rows of the inverse 3×3.
        let r0 = [co0 * inv_det, (cc * h - b * k) * inv_det, (b * f - cc * e) * inv_det];
        let r1 = [co1 * inv_det, (a * k - cc * g) * inv_det, (cc * d - a * f) * inv_det];
        let r2 = [co2 * inv_det, (b * g - a * h) * inv_det, (a * e - b * d) * inv_det];
        let t = self.translation();
        let tx = -(r0[0] * t[0] + r0[1] * t[1] + r0[2] * t[2]);
        let ty = -(r1[0] * t[0] + r1[1] * t[1] + r1[2] * t[2]);
        let tz = -(r2[0] * t[0] + r2[1] * t[1] + r2[2] * t[2]);
        Some(Self {
            cols: [
                [r0[0], r1[0], r2[0], 0.0],
                [r0[1], r1[1], r2[1], 0.0],
                [r0[2], r1[2], r2[2], 0.0],
                [tx, ty, tz, 1.0],
            ],
        })
    }
}

/// Converts Euler angles in degrees to a quaternion `[x, y, z, w]`.
#[must_use]
pub fn euler_to_quat(x: f64, y: f64, z: f64) -> [f64; 4] {
    let half = core::f64::consts::PI / 360.0;
    let (hx, hy, hz) = (x * half, y * half, z * half);
    let (sx, cx) = (hx.sin(), hx.cos());
    let (sy, cy) = (hy.sin(), hy.cos());
    let (sz, cz) = (hz.sin(), hz.cos());
    [
        sx * cy * cz - cx * sy * sz,
        cx * sy * cz + sx * cy * sz,
        cx * cy * sz - sx * sy * cz,
        cx * cy * cz + sx * sy * sz,
    ]
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}
