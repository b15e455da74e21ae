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

//! Constraints between rigid bodies, expressed as contacts generated whenever
//! the constraint is violated. Attachment points are given in body space.

use cgmath::InnerSpace;
use serde::{Deserialize, Serialize};

use crate::body::*;
use crate::collision::*;
use crate::contact::*;
use crate::core::*;

/// Friction of joint contacts. High enough that the joint never slips.
const JOINT_FRICTION: Real = 100.0;

/// World space positions of two body-space attachment points.
fn attachment_points(
    bodies: &RigidBodySet,
    ends: [BodyHandle; 2],
    points: [Vec2; 2],
) -> Option<(Vec2, Vec2)> {
    let a = bodies.get(ends[0])?.point_in_world_space(points[0]);
    let b = bodies.get(ends[1])?.point_in_world_space(points[1]);
    Some((a, b))
}

fn push_contact(
    data: &mut CollisionData,
    bodies: [Option<BodyHandle>; 2],
    friction: Real,
    restitution: Real,
    a: Vec2,
    b: Vec2,
    normal: Vec2,
    penetration: Real,
) -> usize {
    let mut contact = Contact::new(bodies[0], bodies[1], (a + b) * 0.5, normal, penetration);
    contact.friction = friction;
    contact.restitution = restitution;
    data.push(contact) as usize
}

/// Pins a point on one body to a point on another, allowing them to drift
/// up to `error` apart.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub bodies: [BodyHandle; 2],
    pub positions: [Vec2; 2],
    pub error: Real,
}

impl Joint {
    pub fn new(a: BodyHandle, a_pos: Vec2, b: BodyHandle, b_pos: Vec2, error: Real) -> Self {
        Joint {
            bodies: [a, b],
            positions: [a_pos, b_pos],
            error,
        }
    }
}

impl ContactGenerator for Joint {
    fn add_contact(&self, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
        let (a, b) = match attachment_points(bodies, self.bodies, self.positions) {
            Some(points) => points,
            None => return 0,
        };
        let normal = b - a;
        let penetration = normal.magnitude() - self.error;
        if penetration <= 0.0 {
            return 0;
        }
        push_contact(
            data,
            [Some(self.bodies[0]), Some(self.bodies[1])],
            JOINT_FRICTION,
            0.0,
            a,
            b,
            normal.unit(),
            penetration,
        )
    }
}

/// Pins a point on a body to a fixed point in the world.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointAnchored {
    pub body: BodyHandle,
    pub position: Vec2,
    /// World space.
    pub anchor: Vec2,
    pub error: Real,
}

impl JointAnchored {
    pub fn new(body: BodyHandle, position: Vec2, anchor: Vec2, error: Real) -> Self {
        JointAnchored {
            body,
            position,
            anchor,
            error,
        }
    }
}

impl ContactGenerator for JointAnchored {
    fn add_contact(&self, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
        let a = match bodies.get(self.body) {
            Some(body) => body.point_in_world_space(self.position),
            None => return 0,
        };
        let normal = self.anchor - a;
        let penetration = normal.magnitude() - self.error;
        if penetration <= 0.0 {
            return 0;
        }
        push_contact(
            data,
            [Some(self.body), None],
            JOINT_FRICTION,
            0.0,
            a,
            self.anchor,
            normal.unit(),
            penetration,
        )
    }
}

/// Holds two attachment points exactly `length` apart.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rod {
    pub bodies: [BodyHandle; 2],
    pub positions: [Vec2; 2],
    pub length: Real,
}

impl Rod {
    pub fn new(a: BodyHandle, a_pos: Vec2, b: BodyHandle, b_pos: Vec2, length: Real) -> Self {
        Rod {
            bodies: [a, b],
            positions: [a_pos, b_pos],
            length,
        }
    }
}

impl ContactGenerator for Rod {
    fn add_contact(&self, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
        let (a, b) = match attachment_points(bodies, self.bodies, self.positions) {
            Some(points) => points,
            None => return 0,
        };
        let d = b - a;
        let current = d.magnitude();
        if current == self.length {
            return 0;
        }
        let n = d.unit();
        let (normal, penetration) = if current > self.length {
            (n, current - self.length)
        } else {
            (-n, self.length - current)
        };
        push_contact(
            data,
            [Some(self.bodies[0]), Some(self.bodies[1])],
            0.0,
            0.0,
            a,
            b,
            normal,
            penetration,
        )
    }
}

/// Keeps two attachment points at most `length` apart. Slack otherwise.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub bodies: [BodyHandle; 2],
    pub positions: [Vec2; 2],
    pub length: Real,
    pub restitution: Real,
}

impl Cable {
    pub fn new(
        a: BodyHandle,
        a_pos: Vec2,
        b: BodyHandle,
        b_pos: Vec2,
        length: Real,
        restitution: Real,
    ) -> Self {
        Cable {
            bodies: [a, b],
            positions: [a_pos, b_pos],
            length,
            restitution,
        }
    }
}

impl ContactGenerator for Cable {
    fn add_contact(&self, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
        let (a, b) = match attachment_points(bodies, self.bodies, self.positions) {
            Some(points) => points,
            None => return 0,
        };
        let d = b - a;
        let current = d.magnitude();
        if current <= self.length {
            return 0;
        }
        push_contact(
            data,
            [Some(self.bodies[0]), Some(self.bodies[1])],
            0.0,
            self.restitution,
            a,
            b,
            d.unit(),
            current - self.length,
        )
    }
}
