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

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::*;
use crate::bounds::*;
use crate::bvh::*;
use crate::collision::*;
use crate::config::*;
use crate::contact::*;
use crate::core::*;
use crate::error::*;
use crate::fgen::*;
use crate::geom::*;
use crate::pool::*;
use crate::solver::*;

/// Broad phase bounds are stored this much larger than the collider so that
/// small movements don't force a reinsertion.
const BROAD_PHASE_MARGIN: Real = 0.1;

/// Refers to a collider registered with a World.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderHandle(pub PoolId);

struct ColliderEntry {
    collider: Collider,
    /// Broad phase leaf. Planes and colliders without a live body have none.
    leaf: Option<PoolId>,
}

/// Steps a set of rigid bodies: forces, integration, collision detection,
/// then contact resolution.
pub struct World {
    bodies: RigidBodySet,
    registry: ForceRegistry,
    contact_generators: Vec<Box<dyn ContactGenerator>>,
    colliders: Pool<ColliderEntry>,
    broad_phase: BVH<BoundingCircle, ColliderHandle>,
    data: CollisionData,
    resolver: ContactResolver,
    iterations: Iterations,
}

impl World {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let sleep = SleepConfig::new(config.sleep_epsilon)?;
        let resolver_config = ResolverConfig {
            velocity_iterations: config.iterations.for_contacts(0),
            position_iterations: config.iterations.for_contacts(0),
            velocity_epsilon: config.velocity_epsilon,
            position_epsilon: config.position_epsilon,
        };
        Ok(World {
            bodies: RigidBodySet::with_sleep_config(sleep),
            registry: ForceRegistry::new(),
            contact_generators: Vec::new(),
            colliders: Pool::new(),
            broad_phase: BVH::new(),
            data: CollisionData::new(config.max_contacts, config.friction, config.restitution)?,
            resolver: ContactResolver::new(resolver_config),
            iterations: config.iterations,
        })
    }

    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut RigidBodySet {
        &mut self.bodies
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.insert(body)
    }

    /// Removes a body together with its force registrations and colliders.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        self.registry.remove_body(handle);
        let attached: Vec<ColliderHandle> = self
            .colliders
            .iter_ids()
            .filter(|&(_, entry)| entry.collider.body() == Some(handle))
            .map(|(id, _)| ColliderHandle(id))
            .collect();
        for collider in attached {
            self.remove_collider(collider);
        }
        Some(body)
    }

    pub fn add_collider<C: Into<Collider>>(&mut self, collider: C) -> ColliderHandle {
        ColliderHandle(self.colliders.push(ColliderEntry {
            collider: collider.into(),
            leaf: None,
        }))
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Option<Collider> {
        let entry = self.colliders.remove(handle.0)?;
        if let Some(leaf) = entry.leaf {
            self.broad_phase.remove(leaf);
        }
        Some(entry.collider)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle.0).map(|entry| &entry.collider)
    }

    pub fn collider_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.colliders.get_mut(handle.0).map(|entry| &mut entry.collider)
    }

    pub fn force_registry(&self) -> &ForceRegistry {
        &self.registry
    }

    pub fn force_registry_mut(&mut self) -> &mut ForceRegistry {
        &mut self.registry
    }

    pub fn add_contact_generator<G>(&mut self, generator: G)
    where
        G: ContactGenerator + 'static,
    {
        self.contact_generators.push(Box::new(generator));
    }

    pub fn contact_generators_mut(&mut self) -> &mut Vec<Box<dyn ContactGenerator>> {
        &mut self.contact_generators
    }

    /// Contacts generated by the last frame.
    pub fn contacts(&self) -> &[Contact] {
        self.data.contacts()
    }

    pub fn collision_data(&self) -> &CollisionData {
        &self.data
    }

    pub fn resolver(&self) -> &ContactResolver {
        &self.resolver
    }

    /// Changes the sleep threshold of every body, current and future.
    pub fn set_sleep_epsilon(&mut self, sleep_epsilon: Real) -> Result<()> {
        let sleep = SleepConfig::new(sleep_epsilon)?;
        self.bodies.set_sleep_config(sleep);
        Ok(())
    }

    /// Applies an impulse at a world space point, waking the body.
    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Vec2) -> Result<()> {
        self.bodies.try_get_mut(body)?.apply_impulse_at_point(impulse, point);
        Ok(())
    }

    /// The registered gravity generator with the given id, if it is one.
    pub fn gravity_mut(&mut self, id: ForceId) -> Option<&mut Gravity> {
        match self.registry.generator_mut(id)? {
            BodyForce::Gravity(gravity) => Some(gravity),
            _ => None,
        }
    }

    /// The registered field generator with the given id, if it is one.
    pub fn field_mut(&mut self, id: ForceId) -> Option<&mut Field> {
        match self.registry.generator_mut(id)? {
            BodyForce::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Clears every body's accumulators and refreshes its cached transform.
    pub fn start_frame(&mut self) {
        for body in self.bodies.iter_mut() {
            body.clear_accumulators();
            body.calculate_derived_data();
        }
    }

    /// Brings the broad phase up to date with the bodies' current positions.
    fn update_broad_phase(&mut self) {
        let bodies = &self.bodies;
        let broad_phase = &mut self.broad_phase;
        for (id, entry) in self.colliders.iter_ids_mut() {
            let bounds = entry.collider.bounding_circle(bodies);
            entry.leaf = match (entry.leaf, bounds) {
                (Some(leaf), Some(bounds)) => broad_phase.update(leaf, bounds, BROAD_PHASE_MARGIN),
                (None, Some(bounds)) => {
                    Some(broad_phase.insert(bounds + BROAD_PHASE_MARGIN, ColliderHandle(id)))
                }
                (Some(leaf), None) => {
                    broad_phase.remove(leaf);
                    None
                }
                (None, None) => None,
            };
        }
    }

    /// Runs collision detection and every contact generator until the
    /// arena fills up. Returns the number of contacts written.
    ///
    /// Collider pairs come from the broad phase. Planes are unbounded and are
    /// tested against every other collider.
    pub fn generate_contacts(&mut self) -> usize {
        self.data.reset();
        self.update_broad_phase();

        for (a, b) in self.broad_phase.potential_contacts() {
            if self.data.is_full() {
                break;
            }
            let (a, b) = match (self.colliders.get(a.0), self.colliders.get(b.0)) {
                (Some(a), Some(b)) => (&a.collider, &b.collider),
                _ => continue,
            };
            if a.body() == b.body() {
                continue;
            }
            a.collide(b, &self.bodies, &mut self.data);
        }

        for plane in self.colliders.iter() {
            if let Collider::Plane(_) = plane.collider {
                for other in self.colliders.iter() {
                    if self.data.is_full() {
                        break;
                    }
                    if other.leaf.is_some() {
                        plane.collider.collide(&other.collider, &self.bodies, &mut self.data);
                    }
                }
            }
        }

        for generator in &self.contact_generators {
            if self.data.is_full() {
                break;
            }
            generator.add_contact(&self.bodies, &mut self.data);
        }
        self.data.contact_count()
    }

    pub fn integrate(&mut self, duration: Real) {
        for body in self.bodies.iter_mut() {
            body.integrate(duration);
        }
    }

    pub fn run_physics(&mut self, duration: Real) {
        self.registry.update_forces(&mut self.bodies, duration);
        self.integrate(duration);

        let used = self.generate_contacts();
        let iterations = self.iterations.for_contacts(used);
        self.resolver.set_iterations(iterations, iterations);
        self.resolver
            .resolve_contacts(self.data.contacts_mut(), &mut self.bodies, duration);

        debug!(
            contacts = used,
            position_iterations = self.resolver.position_iterations_used(),
            velocity_iterations = self.resolver.velocity_iterations_used(),
            "rigid body frame"
        );
    }

    /// `start_frame` followed by `run_physics`.
    pub fn update(&mut self, duration: Real) {
        self.start_frame();
        self.run_physics(duration);
    }
}

#[cfg(test)]
mod tests {
    mod world {
        use approx::assert_relative_eq;
        use cgmath::{InnerSpace, Vector2};

        use crate::joints::*;
        use crate::world::*;

        const DT: Real = 1.0 / 60.0;

        fn sphere_body(x: Real, y: Real) -> RigidBody {
            let moment = sphere_moment_per_mass(0.5);
            RigidBody::from_mass(Vector2::new(x, y), AXIS_X, 1.0, moment)
                .unwrap()
                .with_awake(true)
        }

        fn ground_world(config: WorldConfig) -> World {
            let mut world = World::new(config).unwrap();
            world.add_collider(CollisionPlane::new(AXIS_Y, 0.0));
            world
        }

        #[test]
        fn test_invalid_config() {
            let config = WorldConfig {
                max_contacts: 0,
                ..WorldConfig::default()
            };
            assert_eq!(World::new(config).err(), Some(PhysicsError::ZeroCapacity));
            let config = WorldConfig {
                sleep_epsilon: -1.0,
                ..WorldConfig::default()
            };
            assert!(World::new(config).is_err());
        }

        #[test]
        fn test_two_spheres() {
            let mut world = World::new(WorldConfig::default()).unwrap();
            let a = world.add_body(sphere_body(0.0, 0.0));
            let b = world.add_body(sphere_body(0.9, 0.0));
            world.add_collider(CollisionSphere::new(a, 0.5));
            world.add_collider(CollisionSphere::new(b, 0.5));

            world.start_frame();
            assert_eq!(world.generate_contacts(), 1);
            let contact = world.contacts()[0];
            assert_eq!(contact.bodies, [Some(a), Some(b)]);
            assert_relative_eq!(contact.penetration, 0.1, epsilon = 1.0e-6);
            assert_relative_eq!(contact.contact_normal, Vector2::new(-1.0, 0.0));
            assert_eq!(contact.friction, 0.5);
            assert_eq!(contact.restitution, 0.4);
        }

        #[test]
        fn test_falling_sphere_settles() {
            let position_epsilon = 0.01;
            let mut world = ground_world(WorldConfig {
                position_epsilon,
                ..WorldConfig::default()
            });
            let ball = world.add_body(sphere_body(0.0, 3.0));
            world.add_collider(CollisionSphere::new(ball, 0.5));
            world
                .force_registry_mut()
                .add_generator(ball, Gravity::new(Vector2::new(0.0, -10.0)));

            for _ in 0..300 {
                world.update(DT);
                assert!(world.bodies()[ball].position.y >= 0.5 - position_epsilon - 1.0e-4);
            }
            let body = &world.bodies()[ball];
            assert!(body.position.y < 0.6);
            assert!(body.velocity.magnitude() < 0.2);
            assert_relative_eq!(body.position.x, 0.0, epsilon = 1.0e-4);
        }

        #[test]
        fn test_small_sphere_dropped_from_one_metre() {
            let position_epsilon = 0.01;
            let mut world = ground_world(WorldConfig {
                position_epsilon,
                ..WorldConfig::default()
            });
            let body = RigidBody::from_mass(Vector2::new(0.0, 1.0), AXIS_X, 1.0, sphere_moment_per_mass(0.1))
                .unwrap()
                .with_awake(true);
            let ball = world.add_body(body);
            world.add_collider(CollisionSphere::new(ball, 0.1));
            world
                .force_registry_mut()
                .add_generator(ball, Gravity::new(Vector2::new(0.0, -9.8)));

            for _ in 0..500 {
                world.update(0.01);
            }
            let body = &world.bodies()[ball];
            assert!(body.position.y >= 0.1 - position_epsilon);
            assert!(body.position.y < 0.15);
            assert!(body.velocity.magnitude() < 0.2);
            assert_relative_eq!(body.position.x, 0.0, epsilon = 1.0e-4);
        }

        #[test]
        fn test_resting_contact() {
            let mut world = ground_world(WorldConfig::default());
            let ball = world.add_body(sphere_body(2.0, 0.5));
            world.add_collider(CollisionSphere::new(ball, 0.5));
            world
                .force_registry_mut()
                .add_generator(ball, Gravity::new(Vector2::new(0.0, -10.0)));

            for _ in 0..120 {
                world.update(DT);
            }
            let body = &world.bodies()[ball];
            assert_relative_eq!(body.position, Vector2::new(2.0, 0.5), epsilon = 1.0e-3);
            assert!(body.velocity.magnitude() < 1.0e-3);
            assert_eq!(world.contacts().len(), 1);
        }

        #[test]
        fn test_capacity_truncation() {
            let mut world = ground_world(WorldConfig {
                max_contacts: 2,
                ..WorldConfig::default()
            });
            for i in 0..4 {
                let body = world.add_body(sphere_body(i as Real * 0.8, 0.4));
                world.add_collider(CollisionSphere::new(body, 0.5));
            }
            world.start_frame();
            assert_eq!(world.generate_contacts(), 2);
            assert!(world.collision_data().is_full());
            for contact in world.contacts() {
                assert!(contact.penetration > 0.0);
            }
        }

        #[test]
        fn test_removed_collider() {
            let mut world = World::new(WorldConfig::default()).unwrap();
            let a = world.add_body(sphere_body(0.0, 0.0));
            let b = world.add_body(sphere_body(0.5, 0.0));
            world.add_collider(CollisionSphere::new(a, 0.5));
            let second = world.add_collider(CollisionSphere::new(b, 0.5));
            assert_eq!(world.generate_contacts(), 1);

            assert!(world.remove_collider(second).is_some());
            assert!(world.collider(second).is_none());
            assert_eq!(world.generate_contacts(), 0);

            world.add_collider(CollisionBox::new(b, Vector2::new(0.5, 0.5)));
            assert!(world.remove_body(a).is_some());
            assert_eq!(world.generate_contacts(), 0);
        }

        #[test]
        fn test_contact_generators() {
            let mut world = World::new(WorldConfig::default()).unwrap();
            let body = world.add_body(sphere_body(0.0, 0.0));
            world.add_contact_generator(JointAnchored::new(body, ORIGIN, Vector2::new(0.0, 2.0), 0.5));
            world.update(DT);
            assert_eq!(world.contacts().len(), 1);
            let y = world.bodies()[body].position.y;
            assert_relative_eq!(y, 1.5, epsilon = 1.0e-3);
        }

        #[test]
        fn test_hooks() {
            let mut world = World::new(WorldConfig::default()).unwrap();
            let body = world.add_body(RigidBody::default());
            let gravity = world
                .force_registry_mut()
                .add_generator(body, Gravity::new(Vector2::new(0.0, -10.0)));

            world.apply_impulse(body, Vector2::new(1.0, 0.0), ORIGIN).unwrap();
            assert!(world.bodies()[body].is_awake());
            assert_relative_eq!(world.bodies()[body].velocity, Vector2::new(1.0, 0.0));

            world.gravity_mut(gravity).unwrap().set_on(false);
            assert!(world.field_mut(gravity).is_none());
            world.update(DT);
            assert_eq!(world.bodies()[body].velocity.y, 0.0);

            world.remove_body(body);
            assert_eq!(
                world.apply_impulse(body, AXIS_X, ORIGIN),
                Err(PhysicsError::StaleHandle)
            );
            assert!(world.set_sleep_epsilon(0.001).is_ok());
            assert!(world.set_sleep_epsilon(std::f32::NAN).is_err());
        }
    }
}
