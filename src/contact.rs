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

use cgmath::{InnerSpace, Matrix, Matrix2, SquareMatrix, Vector2, Zero};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::*;
use crate::collision::*;
use crate::core::*;
use crate::solver::*;

/// A point where two rigid bodies touch, or where one body touches immovable
/// scenery.
///
/// The contact normal points away from the second body toward the first. The
/// remaining fields are scratch space filled in by `calculate_internals` and
/// updated by the resolver while it works through the frame's contacts.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub bodies: [Option<BodyHandle>; 2],
    pub friction: Real,
    pub restitution: Real,
    /// World space.
    pub contact_point: Vec2,
    pub contact_normal: Vec2,
    pub penetration: Real,

    /// Columns are the normal and the tangent.
    contact_to_world: Mat2,
    /// Closing velocity in contact space: x along the normal, y along the
    /// tangent.
    contact_velocity: Vec2,
    desired_delta_velocity: Real,
    /// Contact point relative to each body's center.
    relative_contact_position: [Vec2; 2],

    /// Movement applied by the last `apply_position_change`.
    pub(crate) linear_change: [Vec2; 2],
    pub(crate) angular_change: [Real; 2],
    /// Velocity change applied by the last `apply_velocity_change`.
    pub(crate) velocity_change: [Vec2; 2],
    pub(crate) rotation_change: [Real; 2],
}

impl Default for Contact {
    fn default() -> Self {
        Contact {
            bodies: [None, None],
            friction: 0.0,
            restitution: 0.0,
            contact_point: Vec2::zero(),
            contact_normal: Vec2::zero(),
            penetration: 0.0,
            contact_to_world: Mat2::identity(),
            contact_velocity: Vec2::zero(),
            desired_delta_velocity: 0.0,
            relative_contact_position: [Vec2::zero(); 2],
            linear_change: [Vec2::zero(); 2],
            angular_change: [0.0; 2],
            velocity_change: [Vec2::zero(); 2],
            rotation_change: [0.0; 2],
        }
    }
}

impl Contact {
    pub fn new(
        first: Option<BodyHandle>,
        second: Option<BodyHandle>,
        contact_point: Vec2,
        contact_normal: Vec2,
        penetration: Real,
    ) -> Self {
        Contact {
            bodies: [first, second],
            contact_point,
            contact_normal,
            penetration,
            ..Contact::default()
        }
    }

    pub fn set_body_data(
        &mut self,
        first: Option<BodyHandle>,
        second: Option<BodyHandle>,
        friction: Real,
        restitution: Real,
    ) {
        self.bodies = [first, second];
        self.friction = friction;
        self.restitution = restitution;
    }

    pub fn contact_to_world(&self) -> Mat2 {
        self.contact_to_world
    }

    pub fn contact_velocity(&self) -> Vec2 {
        self.contact_velocity
    }

    pub fn desired_delta_velocity(&self) -> Real {
        self.desired_delta_velocity
    }

    pub fn relative_contact_position(&self, i: usize) -> Vec2 {
        self.relative_contact_position[i]
    }

    fn body<'a>(&self, bodies: &'a RigidBodySet, i: usize) -> Option<&'a RigidBody> {
        self.bodies[i].and_then(|h| bodies.get(h))
    }

    fn body_mut<'a>(&self, bodies: &'a mut RigidBodySet, i: usize) -> Option<&'a mut RigidBody> {
        match self.bodies[i] {
            Some(h) => bodies.get_mut(h),
            None => None,
        }
    }

    /// True if the contact shares body `b` with `other`'s body `d`.
    pub(crate) fn shares_body(&self, b: usize, other: &Contact, d: usize) -> bool {
        match (self.bodies[b], other.bodies[d]) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Exchanges the two bodies and flips the normal.
    pub fn swap_bodies(&mut self) {
        self.contact_normal = -self.contact_normal;
        self.bodies.swap(0, 1);
        self.relative_contact_position.swap(0, 1);
    }

    /// Wakes the sleeping body of a contact between an awake and a sleeping
    /// body. Contacts with scenery are left alone.
    pub fn match_awake_state(&self, bodies: &mut RigidBodySet) {
        let (awake0, awake1) = match (self.body(bodies, 0), self.body(bodies, 1)) {
            (Some(a), Some(b)) => (a.is_awake(), b.is_awake()),
            _ => return,
        };
        if awake0 && !awake1 {
            if let Some(body) = self.body_mut(bodies, 1) {
                body.set_awake(true);
            }
        } else if !awake0 && awake1 {
            if let Some(body) = self.body_mut(bodies, 0) {
                body.set_awake(true);
            }
        }
    }

    /// Prepares the contact for resolution: normalizes the normal, moves a
    /// lone body into the first slot, builds the contact basis and computes
    /// the closing velocity and the velocity change wanted along the normal.
    pub fn calculate_internals<P: ResolverParams>(&mut self, bodies: &RigidBodySet, duration: Real) {
        self.contact_normal.normalize_in_place();
        if self.bodies[0].is_none() {
            self.swap_bodies();
        }
        self.calculate_contact_basis();

        self.contact_velocity = Vec2::zero();
        for i in 0..2 {
            let position = match self.body(bodies, i) {
                Some(body) => body.position,
                None => continue,
            };
            self.relative_contact_position[i] = self.contact_point - position;
            let local = self.local_velocity(bodies, i, duration);
            if i == 0 {
                self.contact_velocity += local;
            } else {
                self.contact_velocity -= local;
            }
        }
        self.calculate_desired_delta_velocity::<P>(bodies, duration);
    }

    fn calculate_contact_basis(&mut self) {
        let tangent = self.contact_normal.normal();
        self.contact_to_world = Matrix2::from_cols(self.contact_normal, tangent);
    }

    /// Velocity of the contact point on body `i`, in contact space. Only the
    /// tangential part of this frame's acceleration is included.
    fn local_velocity(&self, bodies: &RigidBodySet, i: usize, duration: Real) -> Vec2 {
        let body = match self.body(bodies, i) {
            Some(body) => body,
            None => return Vec2::zero(),
        };
        let world_to_contact = self.contact_to_world.transpose();
        let rotational = self.relative_contact_position[i].cross_z(-body.angular_velocity);
        let mut velocity = world_to_contact * (rotational + body.velocity);

        let acceleration = world_to_contact * (body.acceleration * duration);
        velocity.y += acceleration.y;
        velocity
    }

    /// Restitution is dropped for slow contacts, and the velocity built up by
    /// this frame's acceleration is not bounced back.
    pub(crate) fn calculate_desired_delta_velocity<P: ResolverParams>(
        &mut self,
        bodies: &RigidBodySet,
        duration: Real,
    ) {
        let mut velocity_from_acc = 0.0;
        if let Some(body) = self.body(bodies, 0) {
            velocity_from_acc += (body.acceleration * duration).dot(self.contact_normal);
        }
        if let Some(body) = self.body(bodies, 1) {
            velocity_from_acc -= (body.acceleration * duration).dot(self.contact_normal);
        }

        let restitution = if self.contact_velocity.x.abs() < P::VELOCITY_LIMIT {
            0.0
        } else {
            self.restitution
        };
        self.desired_delta_velocity =
            -self.contact_velocity.x - (self.contact_velocity.x - velocity_from_acc) * restitution;
    }

    /// Adds a contact space velocity change to the closing velocity and
    /// recomputes the desired delta velocity from it.
    pub(crate) fn add_contact_velocity<P: ResolverParams>(
        &mut self,
        bodies: &RigidBodySet,
        world_delta: Vec2,
        duration: Real,
    ) {
        self.contact_velocity += self.contact_to_world.transpose() * world_delta;
        self.calculate_desired_delta_velocity::<P>(bodies, duration);
    }

    /// Normal-direction velocity change produced by a unit impulse, summed
    /// over both bodies.
    fn delta_velocity_per_unit_impulse(&self, bodies: &RigidBodySet) -> Real {
        let mut delta = 0.0;
        for i in 0..2 {
            if let Some(body) = self.body(bodies, i) {
                let r = self.relative_contact_position[i];
                let angular = r.cross(self.contact_normal) * body.inverse_moment();
                delta += r.cross_z(-angular).dot(self.contact_normal);
                delta += body.inverse_mass();
            }
        }
        delta
    }

    /// Contact space impulse along the normal only. None when neither body
    /// can be moved.
    pub fn frictionless_impulse(&self, bodies: &RigidBodySet) -> Option<Vec2> {
        let delta = self.delta_velocity_per_unit_impulse(bodies);
        if delta == 0.0 {
            return None;
        }
        Some(Vector2::new(self.desired_delta_velocity / delta, 0.0))
    }

    /// Contact space impulse that removes the tangential velocity too, capped
    /// by the Coulomb friction cone. Falls back to the frictionless impulse
    /// when the system can't be solved.
    pub fn friction_impulse(&self, bodies: &RigidBodySet) -> Option<Vec2> {
        let mut sum = Mat2::zero();
        for i in 0..2 {
            let body = match self.body(bodies, i) {
                Some(body) => body,
                None => continue,
            };
            let r = self.relative_contact_position[i];
            let moment = body.inverse_moment();
            let rotational = Mat2::from_rows(
                r.y * r.y * moment,
                -r.x * r.y * moment,
                -r.x * r.y * moment,
                r.x * r.x * moment,
            );
            let local = self.contact_to_world.transpose() * rotational * self.contact_to_world;
            sum = sum + local + Mat2::from_value(body.inverse_mass());
        }

        let inverse = match sum.invert() {
            Some(inverse) => inverse,
            None => {
                debug!("singular friction system, resolving without friction");
                return self.frictionless_impulse(bodies);
            }
        };
        let kill = Vector2::new(self.desired_delta_velocity, -self.contact_velocity.y);
        let mut impulse = inverse * kill;

        if impulse.y.abs() > self.friction * impulse.x {
            // Dynamic friction: slide along the tangent.
            let direction = impulse.y.signum();
            let denominator = sum[0][0] + sum[1][0] * self.friction * direction;
            if denominator == 0.0 {
                return self.frictionless_impulse(bodies);
            }
            impulse.x = self.desired_delta_velocity / denominator;
            impulse.y = direction * self.friction * impulse.x;
        }
        Some(impulse)
    }

    /// Applies the impulse for a closing contact and records the velocity
    /// change of each body.
    pub fn apply_velocity_change(&mut self, bodies: &mut RigidBodySet) {
        self.velocity_change = [Vec2::zero(); 2];
        self.rotation_change = [0.0; 2];
        if self.contact_velocity.x >= 0.0 {
            return;
        }

        let local = if self.friction == 0.0 {
            self.frictionless_impulse(bodies)
        } else {
            self.friction_impulse(bodies)
        };
        let mut impulse = match local {
            Some(local) => self.contact_to_world * local,
            None => return,
        };

        let point = self.contact_point;
        for i in 0..2 {
            if let Some(body) = self.body_mut(bodies, i) {
                body.apply_impulse_at_point(impulse, point);
                self.velocity_change[i] = impulse * body.inverse_mass();
                self.rotation_change[i] = -impulse.cross(point - body.position) * body.inverse_moment();
            }
            impulse = -impulse;
        }
    }

    /// Moves the bodies apart along the normal, splitting the move between
    /// translation and rotation by each body's inertia.
    pub fn apply_position_change<P: ResolverParams>(&mut self, bodies: &mut RigidBodySet) {
        self.linear_change = [Vec2::zero(); 2];
        self.angular_change = [0.0; 2];

        let mut linear_inertia = [0.0; 2];
        let mut angular_inertia = [0.0; 2];
        let mut angular_per_impulse = [0.0; 2];
        let mut total_inertia = 0.0;
        for i in 0..2 {
            if let Some(body) = self.body(bodies, i) {
                let r = self.relative_contact_position[i];
                angular_per_impulse[i] = r.cross(self.contact_normal) * body.inverse_moment();
                angular_inertia[i] = r.cross_z(-angular_per_impulse[i]).dot(self.contact_normal);
                linear_inertia[i] = body.inverse_mass();
                total_inertia += angular_inertia[i] + linear_inertia[i];
            }
        }
        if total_inertia == 0.0 {
            return;
        }

        for i in 0..2 {
            let sign = if i == 0 { 1.0 } else { -1.0 };
            let mut linear_move = sign * self.penetration * (linear_inertia[i] / total_inertia);
            let mut angular_move = sign * self.penetration * (angular_inertia[i] / total_inertia);

            let limit = P::ANGULAR_LIMIT * self.relative_contact_position[i].magnitude();
            if angular_move.abs() > limit {
                let total_move = linear_move + angular_move;
                angular_move = if angular_move >= 0.0 { limit } else { -limit };
                linear_move = total_move - angular_move;
            }

            let linear_change = self.contact_normal * linear_move;
            let angular_change = if angular_move == 0.0 || angular_inertia[i] == 0.0 {
                0.0
            } else {
                angular_per_impulse[i] / angular_inertia[i] * angular_move
            };

            if let Some(body) = self.body_mut(bodies, i) {
                body.translate(linear_change);
                body.rotate(angular_change);
                body.calculate_derived_data();
                self.linear_change[i] = linear_change;
                self.angular_change[i] = angular_change;
            }
        }
    }
}

/// Anything that writes rigid body contacts into a frame's CollisionData:
/// joints, links and collider pairs.
pub trait ContactGenerator {
    /// Returns the number of contacts written.
    fn add_contact(&self, bodies: &RigidBodySet, data: &mut CollisionData) -> usize;
}
