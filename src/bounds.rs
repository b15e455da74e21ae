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

use std::ops::{Add, Sub};

use cgmath::{InnerSpace, Zero};
use serde::{Deserialize, Serialize};

use crate::core::*;

/// Below this distance two circle centers are treated as coincident.
const BOUNDS_EPSILON: Real = 0.000001;

/// A type that can overlap another.
pub trait Overlaps<RHS> {
    /// Returns true if the two objects overlap and false otherwise.
    fn overlaps(&self, rhs: &RHS) -> bool;
}

/// A type that can completely subsume another.
pub trait Contains<RHS> {
    fn contains(&self, rhs: &RHS) -> bool;
}

/// A type that can overlap, contain, and be combined with one another.
///
/// Bounds can be displaced and extended by a scalar margin to produce proxy
/// volumes for the broad phase.
pub trait Bound
    : Copy
    + Add<Vec2, Output = Self>
    + Sub<Vec2, Output = Self>
    + Add<Real, Output = Self>     // Scalar extend
    + Overlaps<Self>
    + Contains<Self>
{
    /// Produce a bound that encloses the two arguments.
    fn combine(a: &Self, b: &Self) -> Self;

    /// Insertion cost of the bound. For circles this is the perimeter up to a
    /// constant factor.
    fn cost(&self) -> Real;
}

/// A closed circle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingCircle {
    pub c: Vec2,
    pub r: Real,
}

impl Add<Vec2> for BoundingCircle {
    type Output = Self;

    fn add(self, v: Vec2) -> Self {
        BoundingCircle { c: self.c + v, ..self }
    }
}

impl Sub<Vec2> for BoundingCircle {
    type Output = Self;

    fn sub(self, v: Vec2) -> Self {
        BoundingCircle { c: self.c - v, ..self }
    }
}

impl Add<Real> for BoundingCircle {
    type Output = Self;

    fn add(self, s: Real) -> Self {
        BoundingCircle { r: self.r + s, ..self }
    }
}

impl Overlaps<BoundingCircle> for BoundingCircle {
    fn overlaps(&self, rhs: &BoundingCircle) -> bool {
        let r = self.r + rhs.r;
        (rhs.c - self.c).magnitude2() <= r * r
    }
}

/// Two circles with the same center and radius contain each other.
impl Contains<BoundingCircle> for BoundingCircle {
    fn contains(&self, rhs: &BoundingCircle) -> bool {
        rhs.r <= self.r && (rhs.c - self.c).magnitude() <= self.r - rhs.r
    }
}

impl Contains<Vec2> for BoundingCircle {
    fn contains(&self, p: &Vec2) -> bool {
        (*p - self.c).magnitude2() <= self.r * self.r
    }
}

impl Bound for BoundingCircle {
    fn combine(a: &BoundingCircle, b: &BoundingCircle) -> BoundingCircle {
        let d = b.c - a.c;
        let r = b.r - a.r;
        if r * r >= d.magnitude2() {
            if a.r >= b.r {
                *a
            } else {
                *b
            }
        } else {
            let dist = d.magnitude();
            let r = (dist + a.r + b.r) * 0.5;
            BoundingCircle {
                c: a.c + if dist > BOUNDS_EPSILON {
                    d * ((r - a.r) / dist)
                } else {
                    Vec2::zero()
                },
                r,
            }
        }
    }

    #[inline(always)]
    fn cost(&self) -> Real {
        self.r
    }
}
