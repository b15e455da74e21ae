// Copyright 2017 Matthew Plant. This file is part of MGF.
//
// MGF is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// MGF is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with MGF. If not, see <http://www.gnu.org/licenses/>.

use std::ops::Mul;

use cgmath::{InnerSpace, Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Scalar type used throughout the engine.
pub type Real = f32;

pub type Vec2 = Vector2<Real>;
pub type Mat2 = Matrix2<Real>;

/// Unit x axis.
pub const AXIS_X: Vec2 = Vector2 { x: 1.0, y: 0.0 };
/// Unit y axis.
pub const AXIS_Y: Vec2 = Vector2 { x: 0.0, y: 1.0 };
/// The origin.
pub const ORIGIN: Vec2 = Vector2 { x: 0.0, y: 0.0 };

/// Planar operations missing from cgmath's Vector2.
pub trait VectorExt: Sized {
    /// Returns the unit vector in the same direction, or the zero vector if
    /// the magnitude is zero.
    fn unit(self) -> Self;

    /// Normalizes in place. Leaves a zero vector untouched.
    fn normalize_in_place(&mut self);

    /// z component of the cross product of two vectors in the plane.
    fn cross(self, rhs: Self) -> Real;

    /// Cross product with the vector (0, 0, z), i.e. (y·z, −x·z).
    ///
    /// `r.cross_z(-w)` is the velocity of a point at lever arm `r` on a body
    /// spinning at `w`.
    fn cross_z(self, z: Real) -> Self;

    /// The vector rotated a quarter turn counter-clockwise.
    fn normal(self) -> Self;

    /// Rotates counter-clockwise by `angle` radians in place.
    fn rotate(&mut self, angle: Real);

    fn component_product(self, rhs: Self) -> Self;

    fn add_scaled(&mut self, v: Self, s: Real);
}

impl VectorExt for Vec2 {
    #[inline]
    fn unit(self) -> Self {
        let m = self.magnitude();
        if m <= 0.0 {
            return ORIGIN;
        }
        Vector2::new(self.x / m, self.y / m)
    }

    #[inline]
    fn normalize_in_place(&mut self) {
        let m = self.magnitude();
        if m > 0.0 {
            *self = *self * (1.0 / m);
        }
    }

    #[inline]
    fn cross(self, rhs: Self) -> Real {
        self.x * rhs.y - self.y * rhs.x
    }

    #[inline]
    fn cross_z(self, z: Real) -> Self {
        Vector2::new(self.y * z, -self.x * z)
    }

    #[inline]
    fn normal(self) -> Self {
        Vector2::new(-self.y, self.x)
    }

    fn rotate(&mut self, angle: Real) {
        let (sin, cos) = angle.sin_cos();
        let x = self.x * cos - self.y * sin;
        let y = self.x * sin + self.y * cos;
        self.x = x;
        self.y = y;
    }

    #[inline]
    fn component_product(self, rhs: Self) -> Self {
        Vector2::new(self.x * rhs.x, self.y * rhs.y)
    }

    #[inline]
    fn add_scaled(&mut self, v: Self, s: Real) {
        self.x += v.x * s;
        self.y += v.y * s;
    }
}

/// Row-major constructors for cgmath's column-major Matrix2.
pub trait MatrixExt {
    /// Builds a matrix from its rows: `[[m00, m01], [m10, m11]]`.
    fn from_rows(m00: Real, m01: Real, m10: Real, m11: Real) -> Self;

    /// Rotation taking the x axis onto the (normalized) heading `v`.
    fn from_orientation(v: Vec2) -> Self;
}

impl MatrixExt for Mat2 {
    #[inline]
    fn from_rows(m00: Real, m01: Real, m10: Real, m11: Real) -> Self {
        Matrix2::new(m00, m10, m01, m11)
    }

    fn from_orientation(v: Vec2) -> Self {
        let o = v.unit();
        Matrix2::from_rows(o.x, -o.y, o.y, o.x)
    }
}

/// A 2×3 affine matrix. The first two columns hold a rotation and the third a
/// translation; the bottom row of the full 3×3 form is implicitly [0, 0, 1].
///
/// Entries are stored row-major:
///
/// ```text
/// | data[0] data[1] data[2] |
/// | data[3] data[4] data[5] |
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2 {
    pub data: [Real; 6],
}

impl Default for Transform2 {
    fn default() -> Self {
        Transform2::identity()
    }
}

impl Transform2 {
    pub fn identity() -> Self {
        Transform2 {
            data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    pub fn new(c0: Real, c1: Real, c2: Real, c3: Real, c4: Real, c5: Real) -> Self {
        Transform2 {
            data: [c0, c1, c2, c3, c4, c5],
        }
    }

    /// Rotation to heading `orientation` followed by translation to `pos`.
    pub fn from_orientation_and_pos(orientation: Vec2, pos: Vec2) -> Self {
        let mut t = Transform2::identity();
        t.set_orientation_and_pos(orientation, pos);
        t
    }

    pub fn set_orientation_and_pos(&mut self, orientation: Vec2, pos: Vec2) {
        let o = orientation.unit();
        self.data = [o.x, -o.y, pos.x, o.y, o.x, pos.y];
    }

    /// Determinant of the rotation/scale part.
    pub fn determinant(&self) -> Real {
        self.data[0] * self.data[4] - self.data[1] * self.data[3]
    }

    /// Sets this matrix to the general inverse of `m`. If `m` is singular the
    /// matrix is left as it was.
    pub fn set_inverse(&mut self, m: &Transform2) {
        let det = m.determinant();
        if det == 0.0 {
            return;
        }
        let d = &m.data;
        self.data = [
            d[4] / det,
            -d[1] / det,
            (d[1] * d[5] - d[2] * d[4]) / det,
            -d[3] / det,
            d[0] / det,
            (d[2] * d[3] - d[0] * d[5]) / det,
        ];
    }

    /// The general inverse. A singular matrix yields the identity.
    pub fn inverse(&self) -> Transform2 {
        let mut result = Transform2::identity();
        result.set_inverse(self);
        result
    }

    pub fn invert(&mut self) {
        let m = *self;
        self.set_inverse(&m);
    }

    /// Transforms a point.
    #[inline]
    pub fn transform(&self, v: Vec2) -> Vec2 {
        Vector2::new(
            self.data[0] * v.x + self.data[1] * v.y + self.data[2],
            self.data[3] * v.x + self.data[4] * v.y + self.data[5],
        )
    }

    /// Transforms a point by the inverse, assuming the rotation part is
    /// orthonormal.
    #[inline]
    pub fn transform_inverse(&self, v: Vec2) -> Vec2 {
        let x = v.x - self.data[2];
        let y = v.y - self.data[5];
        Vector2::new(
            x * self.data[0] + y * self.data[3],
            x * self.data[1] + y * self.data[4],
        )
    }

    /// Rotates a direction, ignoring the translation.
    #[inline]
    pub fn transform_direction(&self, v: Vec2) -> Vec2 {
        Vector2::new(
            v.x * self.data[0] + v.y * self.data[1],
            v.x * self.data[3] + v.y * self.data[4],
        )
    }

    /// Rotates a direction by the transpose of the rotation part.
    #[inline]
    pub fn transform_inverse_direction(&self, v: Vec2) -> Vec2 {
        Vector2::new(
            v.x * self.data[0] + v.y * self.data[3],
            v.x * self.data[1] + v.y * self.data[4],
        )
    }

    /// Column `i` of the matrix. Columns 0 and 1 are the local axes in world
    /// space and column 2 is the translation.
    #[inline]
    pub fn axis(&self, i: usize) -> Vec2 {
        Vector2::new(self.data[i], self.data[i + 3])
    }

    /// The matrix as a column-major 4×4 array, as expected by OpenGL style
    /// renderers.
    pub fn to_gl_matrix(&self) -> [f32; 16] {
        let d = &self.data;
        [
            d[0] as f32, d[3] as f32, 0.0, 0.0,
            d[1] as f32, d[4] as f32, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            d[2] as f32, d[5] as f32, 0.0, 1.0,
        ]
    }
}

impl Mul<Vec2> for Transform2 {
    type Output = Vec2;

    fn mul(self, v: Vec2) -> Vec2 {
        self.transform(v)
    }
}

impl Mul<Transform2> for Transform2 {
    type Output = Transform2;

    fn mul(self, m: Transform2) -> Transform2 {
        let a = &self.data;
        let b = &m.data;
        Transform2::new(
            a[0] * b[0] + a[1] * b[3],
            a[0] * b[1] + a[1] * b[4],
            a[0] * b[2] + a[1] * b[5] + a[2],
            a[3] * b[0] + a[4] * b[3],
            a[3] * b[1] + a[4] * b[4],
            a[3] * b[2] + a[4] * b[5] + a[5],
        )
    }
}
