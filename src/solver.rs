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

use std::marker::PhantomData;

use cgmath::InnerSpace;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::body::*;
use crate::contact::*;
use crate::core::*;

/// A type that describes parameters used when resolving contacts.
pub trait ResolverParams {
    /// Closing speeds below this bounce with zero restitution.
    const VELOCITY_LIMIT: Real;
    /// Fraction of the lever arm length a single position step may rotate a
    /// body by.
    const ANGULAR_LIMIT: Real;
}

/// The suggested set of parameters to use when resolving contacts.
#[derive(Copy, Clone, Debug)]
pub struct DefaultResolverParams {}

impl ResolverParams for DefaultResolverParams {
    const VELOCITY_LIMIT: Real = 0.01;
    const ANGULAR_LIMIT: Real = 0.2;
}

/// Iteration budgets and thresholds for a ContactResolver.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Desired velocity changes at or below this are left alone.
    pub velocity_epsilon: Real,
    /// Penetrations at or below this are left alone.
    pub position_epsilon: Real,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            velocity_iterations: 0,
            position_iterations: 0,
            velocity_epsilon: 0.0,
            position_epsilon: 0.0,
        }
    }
}

/// Resolves rigid body contacts one at a time, always picking the worst one
/// next: first interpenetration, then closing velocity.
///
/// Each step changes the bodies of one contact, and the change is carried
/// over to every other contact that shares one of those bodies.
#[derive(Clone, Debug)]
pub struct ContactResolver<P: ResolverParams = DefaultResolverParams> {
    config: ResolverConfig,
    velocity_iterations_used: usize,
    position_iterations_used: usize,
    params: PhantomData<P>,
}

impl<P: ResolverParams> ContactResolver<P> {
    pub fn new(config: ResolverConfig) -> Self {
        ContactResolver {
            config,
            velocity_iterations_used: 0,
            position_iterations_used: 0,
            params: PhantomData,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn set_iterations(&mut self, velocity_iterations: usize, position_iterations: usize) {
        self.config.velocity_iterations = velocity_iterations;
        self.config.position_iterations = position_iterations;
    }

    pub fn set_epsilon(&mut self, velocity_epsilon: Real, position_epsilon: Real) {
        self.config.velocity_epsilon = velocity_epsilon;
        self.config.position_epsilon = position_epsilon;
    }

    /// Velocity iterations run by the last `resolve_contacts`.
    pub fn velocity_iterations_used(&self) -> usize {
        self.velocity_iterations_used
    }

    /// Position iterations run by the last `resolve_contacts`.
    pub fn position_iterations_used(&self) -> usize {
        self.position_iterations_used
    }

    /// Resolves a frame's contacts: prepare, then positions, then velocities.
    pub fn resolve_contacts(&mut self, contacts: &mut [Contact], bodies: &mut RigidBodySet, duration: Real) {
        self.velocity_iterations_used = 0;
        self.position_iterations_used = 0;
        if contacts.is_empty() {
            return;
        }
        self.prepare_contacts(contacts, bodies, duration);
        self.adjust_positions(contacts, bodies, duration);
        self.adjust_velocities(contacts, bodies, duration);
    }

    pub fn prepare_contacts(&self, contacts: &mut [Contact], bodies: &RigidBodySet, duration: Real) {
        for contact in contacts.iter_mut() {
            contact.calculate_internals::<P>(bodies, duration);
        }
    }

    pub fn adjust_positions(&mut self, contacts: &mut [Contact], bodies: &mut RigidBodySet, duration: Real) {
        self.position_iterations_used = 0;
        while self.position_iterations_used < self.config.position_iterations {
            let mut max = self.config.position_epsilon;
            let mut worst = None;
            for (i, contact) in contacts.iter().enumerate() {
                if contact.penetration > max {
                    max = contact.penetration;
                    worst = Some(i);
                }
            }
            let worst = match worst {
                Some(i) => i,
                None => break,
            };
            trace!(contact = worst, penetration = max, "resolving penetration");

            contacts[worst].apply_position_change::<P>(bodies);
            let resolved = contacts[worst];

            for contact in contacts.iter_mut() {
                let mut touched = false;
                for b in 0..2 {
                    for d in 0..2 {
                        if !contact.shares_body(b, &resolved, d) {
                            continue;
                        }
                        let delta = resolved.linear_change[d]
                            + contact.relative_contact_position(b).cross_z(-resolved.angular_change[d]);
                        let sign = if b == 0 { -1.0 } else { 1.0 };
                        contact.penetration += delta.dot(contact.contact_normal) * sign;
                        touched = true;
                    }
                }
                if touched {
                    contact.calculate_internals::<P>(bodies, duration);
                }
            }
            self.position_iterations_used += 1;
        }
    }

    pub fn adjust_velocities(&mut self, contacts: &mut [Contact], bodies: &mut RigidBodySet, duration: Real) {
        self.velocity_iterations_used = 0;
        while self.velocity_iterations_used < self.config.velocity_iterations {
            let mut max = self.config.velocity_epsilon;
            let mut worst = None;
            for (i, contact) in contacts.iter().enumerate() {
                if contact.desired_delta_velocity() > max {
                    max = contact.desired_delta_velocity();
                    worst = Some(i);
                }
            }
            let worst = match worst {
                Some(i) => i,
                None => break,
            };
            trace!(contact = worst, desired_delta_velocity = max, "resolving velocity");

            contacts[worst].match_awake_state(bodies);
            contacts[worst].apply_velocity_change(bodies);
            let resolved = contacts[worst];

            for contact in contacts.iter_mut() {
                for b in 0..2 {
                    for d in 0..2 {
                        if !contact.shares_body(b, &resolved, d) {
                            continue;
                        }
                        let delta = resolved.velocity_change[d]
                            + contact.relative_contact_position(b).cross_z(-resolved.rotation_change[d]);
                        let sign = if b == 0 { 1.0 } else { -1.0 };
                        contact.add_contact_velocity::<P>(bodies, delta * sign, duration);
                    }
                }
            }
            self.velocity_iterations_used += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    mod resolver {
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        use crate::collision::*;
        use crate::geom::*;
        use crate::solver::*;

        fn config(iterations: usize) -> ResolverConfig {
            ResolverConfig {
                velocity_iterations: iterations,
                position_iterations: iterations,
                ..ResolverConfig::default()
            }
        }

        #[test]
        fn test_resting_sphere() {
            let mut bodies = RigidBodySet::new();
            let h = bodies.insert(
                RigidBody::new(Vector2::new(0.0, 0.45), AXIS_X, 1.0, 1.0)
                    .unwrap()
                    .with_awake(true),
            );
            bodies[h].velocity = Vector2::new(0.0, -1.0);
            let sphere = CollisionSphere::new(h, 0.5);
            let plane = CollisionPlane::new(AXIS_Y, 0.0);
            let mut data = CollisionData::new(4, 0.5, 0.0).unwrap();
            assert_eq!(CollisionDetector::sphere_and_half_space(&sphere, &plane, &bodies, &mut data), 1);

            let mut resolver: ContactResolver = ContactResolver::new(config(4));
            resolver.resolve_contacts(data.contacts_mut(), &mut bodies, 0.01);

            assert_relative_eq!(bodies[h].position, Vector2::new(0.0, 0.5), epsilon = 1.0e-5);
            assert_relative_eq!(bodies[h].velocity, Vector2::new(0.0, 0.0), epsilon = 1.0e-5);
            assert_relative_eq!(bodies[h].angular_velocity, 0.0, epsilon = 1.0e-5);
            assert_eq!(resolver.velocity_iterations_used(), 1);
            assert!(resolver.position_iterations_used() >= 1);
            assert!(data.contacts()[0].penetration.abs() < 1.0e-5);
        }

        #[test]
        fn test_no_contacts() {
            let mut bodies = RigidBodySet::new();
            let mut resolver: ContactResolver = ContactResolver::new(config(4));
            resolver.resolve_contacts(&mut [], &mut bodies, 0.01);
            assert_eq!(resolver.velocity_iterations_used(), 0);
            assert_eq!(resolver.position_iterations_used(), 0);
        }

        #[test]
        fn test_iteration_budget() {
            let mut bodies = RigidBodySet::new();
            let h = bodies.insert(RigidBody::new(Vector2::new(0.0, 0.4), AXIS_X, 1.0, 1.0).unwrap());
            let sphere = CollisionSphere::new(h, 0.5);
            let plane = CollisionPlane::new(AXIS_Y, 0.0);
            let mut data = CollisionData::new(4, 0.0, 0.0).unwrap();
            sphere.collide(&plane, &bodies, &mut data);

            let mut resolver: ContactResolver = ContactResolver::new(config(0));
            resolver.resolve_contacts(data.contacts_mut(), &mut bodies, 0.01);
            assert_eq!(bodies[h].position, Vector2::new(0.0, 0.4));

            // Penetration below the threshold is left alone.
            resolver.set_iterations(4, 4);
            resolver.set_epsilon(0.0, 0.5);
            resolver.resolve_contacts(data.contacts_mut(), &mut bodies, 0.01);
            assert_eq!(resolver.position_iterations_used(), 0);
            assert_eq!(bodies[h].position, Vector2::new(0.0, 0.4));
        }

        #[test]
        fn test_shared_body_propagation() {
            let mut bodies = RigidBodySet::new();
            let h = bodies.insert(
                RigidBody::new(Vector2::new(0.0, 0.9), AXIS_X, 1.0, 1.0)
                    .unwrap()
                    .with_awake(true),
            );
            let cbox = CollisionBox::new(h, Vector2::new(1.0, 1.0));
            let plane = CollisionPlane::new(AXIS_Y, 0.0);
            let mut data = CollisionData::new(4, 0.0, 0.0).unwrap();
            assert_eq!(cbox.collide(&plane, &bodies, &mut data), 2);

            let mut resolver: ContactResolver = ContactResolver::new(ResolverConfig {
                position_iterations: 1,
                ..ResolverConfig::default()
            });
            let contacts = data.contacts_mut();
            resolver.prepare_contacts(contacts, &bodies, 0.01);
            resolver.adjust_positions(contacts, &mut bodies, 0.01);
            assert_eq!(resolver.position_iterations_used(), 1);

            // The resolved corner sits on the plane.
            assert_relative_eq!(contacts[0].penetration, 0.0, epsilon = 1.0e-5);
            // The other corner's penetration tracks the body's new pose.
            let corner = bodies[h].point_in_world_space(Vector2::new(-1.0, -1.0));
            assert_relative_eq!(contacts[1].penetration, -corner.y, epsilon = 5.0e-3);
        }

        #[test]
        fn test_wakes_resting_partner() {
            let mut bodies = RigidBodySet::new();
            let a = bodies.insert(
                RigidBody::new(Vector2::new(0.0, 0.0), AXIS_X, 1.0, 1.0)
                    .unwrap()
                    .with_awake(true),
            );
            let b = bodies.insert(RigidBody::new(Vector2::new(0.9, 0.0), AXIS_X, 1.0, 1.0).unwrap());
            bodies[a].velocity = Vector2::new(1.0, 0.0);
            let mut data = CollisionData::new(4, 0.0, 0.0).unwrap();
            CollisionDetector::sphere_and_sphere(
                &CollisionSphere::new(a, 0.5),
                &CollisionSphere::new(b, 0.5),
                &bodies,
                &mut data,
            );

            let mut resolver: ContactResolver = ContactResolver::new(config(4));
            resolver.resolve_contacts(data.contacts_mut(), &mut bodies, 0.01);
            assert!(bodies[b].is_awake());
            // An inelastic head-on hit leaves equal masses at their mean velocity.
            assert_relative_eq!(bodies[a].velocity.x, 0.5, epsilon = 1.0e-5);
            assert_relative_eq!(bodies[b].velocity.x, 0.5, epsilon = 1.0e-5);
        }
    }
}
