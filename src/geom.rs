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

//! Collision primitives. Spheres and boxes are attached to a rigid body and
//! follow its transform; planes are static scenery.

use cgmath::{InnerSpace, Vector2};
use serde::{Deserialize, Serialize};

use crate::body::*;
use crate::bounds::*;
use crate::core::*;

/// A circle centered on its body's center of mass.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionSphere {
    pub body: BodyHandle,
    pub radius: Real,
}

impl CollisionSphere {
    pub fn new(body: BodyHandle, radius: Real) -> Self {
        CollisionSphere { body, radius }
    }
}

/// A rectangle centered on its body's center of mass and aligned with the
/// body's axes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionBox {
    pub body: BodyHandle,
    pub half_size: Vec2,
}

impl CollisionBox {
    pub fn new(body: BodyHandle, half_size: Vec2) -> Self {
        CollisionBox { body, half_size }
    }

    /// Corners in body space.
    pub fn corners(&self) -> [Vec2; 4] {
        let h = self.half_size;
        [
            Vector2::new(h.x, h.y),
            Vector2::new(h.x, -h.y),
            Vector2::new(-h.x, h.y),
            Vector2::new(-h.x, -h.y),
        ]
    }
}

/// The line `p · normal = offset`. Used as a half-space, everything behind
/// the normal is solid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionPlane {
    pub normal: Vec2,
    pub offset: Real,
}

impl CollisionPlane {
    pub fn new(normal: Vec2, offset: Real) -> Self {
        CollisionPlane { normal, offset }
    }
}

/// Any collision primitive.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    Sphere(CollisionSphere),
    Box(CollisionBox),
    Plane(CollisionPlane),
}

macro_rules! collider_from {
    (
        $variant:ident, $prim:ident
    ) => {
        impl From<$prim> for Collider {
            fn from(prim: $prim) -> Self {
                Collider::$variant(prim)
            }
        }
    };
}

collider_from!(Sphere, CollisionSphere);
collider_from!(Box, CollisionBox);
collider_from!(Plane, CollisionPlane);

impl Collider {
    /// The body the primitive is attached to. Planes have none.
    pub fn body(&self) -> Option<BodyHandle> {
        match *self {
            Collider::Sphere(ref s) => Some(s.body),
            Collider::Box(ref b) => Some(b.body),
            Collider::Plane(_) => None,
        }
    }

    /// A circle enclosing the primitive at its body's current position.
    /// Planes are unbounded, and a primitive whose body is gone has no
    /// bounds either.
    pub fn bounding_circle(&self, bodies: &RigidBodySet) -> Option<BoundingCircle> {
        match *self {
            Collider::Sphere(ref s) => bodies.get(s.body).map(|body| BoundingCircle {
                c: body.position,
                r: s.radius,
            }),
            Collider::Box(ref b) => bodies.get(b.body).map(|body| BoundingCircle {
                c: body.position,
                r: b.half_size.magnitude(),
            }),
            Collider::Plane(_) => None,
        }
    }
}
