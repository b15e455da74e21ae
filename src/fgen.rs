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

use cgmath::{InnerSpace, Vector2};
use serde::{Deserialize, Serialize};

use crate::body::*;
use crate::core::*;
use crate::pfgen::buoyant_force;
use crate::pool::*;

/// Adds forces and torques to a rigid body each frame.
///
/// Generators only add to the target's accumulators. Any other body a
/// generator refers to is read, never written.
pub trait ForceGenerator {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, duration: Real);
}

/// Constant acceleration that can be switched off. Skips sleeping and
/// immovable bodies.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gravity {
    pub gravity: Vec2,
    pub on: bool,
}

impl Gravity {
    pub fn new(gravity: Vec2) -> Self {
        Gravity { gravity, on: true }
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn set_on(&mut self, on: bool) {
        self.on = on;
    }
}

impl ForceGenerator for Gravity {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
        let body = match bodies.get_mut(target) {
            Some(body) => body,
            None => return,
        };
        if !body.has_finite_mass() || !body.is_awake() || self.gravity.magnitude() == 0.0 || !self.on {
            return;
        }
        let mass = body.mass();
        body.add_force(self.gravity * mass);
    }
}

/// A damped spring between points on two bodies, both given in body space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub connection_point: Vec2,
    pub other: BodyHandle,
    pub other_connection_point: Vec2,
    pub spring_constant: Real,
    pub damping_coefficient: Real,
    pub rest_length: Real,
}

impl Spring {
    pub fn new(
        connection_point: Vec2,
        other: BodyHandle,
        other_connection_point: Vec2,
        spring_constant: Real,
        damping_coefficient: Real,
        rest_length: Real,
    ) -> Self {
        Spring {
            connection_point,
            other,
            other_connection_point,
            spring_constant,
            damping_coefficient,
            rest_length,
        }
    }
}

impl ForceGenerator for Spring {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
        let (other_world, other_velocity) = match bodies.get(self.other) {
            Some(other) => (
                other.point_in_world_space(self.other_connection_point),
                other.velocity_at_point(self.other_connection_point),
            ),
            None => return,
        };
        let body = match bodies.get_mut(target) {
            Some(body) => body,
            None => return,
        };

        let world = body.point_in_world_space(self.connection_point);
        let l = world - other_world;
        let stretch = l.magnitude() - self.rest_length;
        if stretch == 0.0 {
            return;
        }
        let delta_v = body.velocity_at_point(self.connection_point) - other_velocity;
        let force = l.unit() * (-stretch * self.spring_constant) - delta_v * self.damping_coefficient;
        body.add_force_at_point(force, world);
    }
}

/// Inverse-square push away from `source`, acting on a body space point and
/// limited to `radius`. Wakes the bodies it reaches.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub source: Vec2,
    pub radius: Real,
    pub k: Real,
    pub point: Vec2,
}

impl Field {
    pub fn new(source: Vec2, radius: Real, k: Real, point: Vec2) -> Self {
        Field {
            source,
            radius,
            k,
            point,
        }
    }

    pub fn set_source(&mut self, source: Vec2) {
        self.source = source;
    }
}

impl ForceGenerator for Field {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
        let body = match bodies.get_mut(target) {
            Some(body) => body,
            None => return,
        };
        let v = body.point_in_world_space(self.point) - self.source;
        let d = v.magnitude();
        if d == 0.0 || d > self.radius {
            return;
        }
        body.add_force_at_body_point(v.unit() * (self.k / (d * d)), self.point);
        body.set_awake(true);
    }
}

/// Aerodynamic force from a body space tensor applied to the velocity of the
/// air relative to the body.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aero {
    pub tensor: Mat2,
    /// Body space point the force acts at.
    pub position: Vec2,
    pub wind_speed: Vec2,
}

impl Aero {
    pub fn new(tensor: Mat2, position: Vec2, wind_speed: Vec2) -> Self {
        Aero {
            tensor,
            position,
            wind_speed,
        }
    }

    pub fn set_wind_speed(&mut self, wind_speed: Vec2) {
        self.wind_speed = wind_speed;
    }
}

impl ForceGenerator for Aero {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
        let body = match bodies.get_mut(target) {
            Some(body) => body,
            None => return,
        };
        let velocity = body.velocity + self.wind_speed;
        if velocity.magnitude() == 0.0 {
            return;
        }
        let local = body.direction_in_local_space(velocity);
        let force = body.direction_in_world_space(self.tensor * local);
        body.add_force_at_body_point(force, self.position);
    }
}

/// Upward force of a liquid on a body space center of buoyancy. The force
/// ramps linearly while the center is within `max_depth` of the surface.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Buoyancy {
    pub max_depth: Real,
    pub volume: Real,
    pub water_height: Real,
    pub liquid_density: Real,
    pub center_of_buoyancy: Vec2,
}

impl Buoyancy {
    pub fn new(
        max_depth: Real,
        volume: Real,
        water_height: Real,
        liquid_density: Real,
        center_of_buoyancy: Vec2,
    ) -> Self {
        Buoyancy {
            max_depth,
            volume,
            water_height,
            liquid_density,
            center_of_buoyancy,
        }
    }
}

impl ForceGenerator for Buoyancy {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
        let body = match bodies.get_mut(target) {
            Some(body) => body,
            None => return,
        };
        let point = body.point_in_world_space(self.center_of_buoyancy);
        if let Some(lift) = buoyant_force(
            point.y,
            self.max_depth,
            self.volume,
            self.water_height,
            self.liquid_density,
        ) {
            body.add_force_at_point(Vector2::new(0.0, lift), point);
        }
    }
}

/// Every rigid body force the engine provides, plus user supplied
/// generators.
pub enum BodyForce {
    Gravity(Gravity),
    Spring(Spring),
    Field(Field),
    Aero(Aero),
    Buoyancy(Buoyancy),
    Custom(Box<dyn ForceGenerator>),
}

impl From<Gravity> for BodyForce {
    fn from(g: Gravity) -> Self {
        BodyForce::Gravity(g)
    }
}

impl From<Spring> for BodyForce {
    fn from(s: Spring) -> Self {
        BodyForce::Spring(s)
    }
}

impl From<Field> for BodyForce {
    fn from(f: Field) -> Self {
        BodyForce::Field(f)
    }
}

impl From<Aero> for BodyForce {
    fn from(a: Aero) -> Self {
        BodyForce::Aero(a)
    }
}

impl From<Buoyancy> for BodyForce {
    fn from(b: Buoyancy) -> Self {
        BodyForce::Buoyancy(b)
    }
}

impl From<Box<dyn ForceGenerator>> for BodyForce {
    fn from(g: Box<dyn ForceGenerator>) -> Self {
        BodyForce::Custom(g)
    }
}

impl ForceGenerator for BodyForce {
    fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, duration: Real) {
        match self {
            BodyForce::Gravity(g) => g.update_force(bodies, target, duration),
            BodyForce::Spring(s) => s.update_force(bodies, target, duration),
            BodyForce::Field(f) => f.update_force(bodies, target, duration),
            BodyForce::Aero(a) => a.update_force(bodies, target, duration),
            BodyForce::Buoyancy(b) => b.update_force(bodies, target, duration),
            BodyForce::Custom(g) => g.update_force(bodies, target, duration),
        }
    }
}

/// Refers to a generator stored in a ForceRegistry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForceId(pub PoolId);

/// Holds force generators and the bodies they act on.
#[derive(Default)]
pub struct ForceRegistry {
    generators: Pool<BodyForce>,
    registrations: Vec<(BodyHandle, ForceId)>,
}

impl ForceRegistry {
    pub fn new() -> Self {
        ForceRegistry::default()
    }

    pub fn insert_generator<G: Into<BodyForce>>(&mut self, generator: G) -> ForceId {
        ForceId(self.generators.push(generator.into()))
    }

    /// Removes a generator along with every registration using it.
    pub fn remove_generator(&mut self, id: ForceId) -> Option<BodyForce> {
        self.registrations.retain(|&(_, g)| g != id);
        self.generators.remove(id.0)
    }

    pub fn generator(&self, id: ForceId) -> Option<&BodyForce> {
        self.generators.get(id.0)
    }

    pub fn generator_mut(&mut self, id: ForceId) -> Option<&mut BodyForce> {
        self.generators.get_mut(id.0)
    }

    pub fn add(&mut self, body: BodyHandle, generator: ForceId) {
        self.registrations.push((body, generator));
    }

    pub fn add_generator<G: Into<BodyForce>>(&mut self, body: BodyHandle, generator: G) -> ForceId {
        let id = self.insert_generator(generator);
        self.add(body, id);
        id
    }

    /// Removes one matching registration. Returns false if none existed.
    pub fn remove(&mut self, body: BodyHandle, generator: ForceId) -> bool {
        match self.registrations.iter().position(|&r| r == (body, generator)) {
            Some(i) => {
                self.registrations.remove(i);
                true
            }
            None => false,
        }
    }

    /// Drops every registration naming `body`.
    pub fn remove_body(&mut self, body: BodyHandle) {
        self.registrations.retain(|&(b, _)| b != body);
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Runs every registration once, in registration order.
    pub fn update_forces(&self, bodies: &mut RigidBodySet, duration: Real) {
        for &(body, id) in &self.registrations {
            if let Some(generator) = self.generators.get(id.0) {
                generator.update_force(bodies, body, duration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod generators {
        use approx::assert_relative_eq;
        use cgmath::{Matrix2, Vector2, Zero};

        use crate::fgen::*;

        fn single(body: RigidBody) -> (RigidBodySet, BodyHandle) {
            let mut set = RigidBodySet::new();
            let h = set.insert(body);
            (set, h)
        }

        fn awake(position: Vec2, inverse_mass: Real) -> RigidBody {
            RigidBody::new(position, AXIS_X, inverse_mass, 1.0).unwrap().with_awake(true)
        }

        #[test]
        fn test_gravity() {
            let mut gravity = Gravity::new(Vector2::new(0.0, -10.0));
            let (mut set, h) = single(awake(ORIGIN, 0.5));
            gravity.update_force(&mut set, h, 0.1);
            assert_relative_eq!(set[h].accumulated_force(), Vector2::new(0.0, -20.0));

            set[h].clear_accumulators();
            gravity.set_on(false);
            gravity.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());

            // Sleeping bodies are skipped, and stay asleep.
            gravity.set_on(true);
            set[h].set_awake(false);
            gravity.update_force(&mut set, h, 0.1);
            assert!(!set[h].is_awake());

            let (mut set, h) = single(awake(ORIGIN, 0.0));
            gravity.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());

            let (mut set, h) = single(awake(ORIGIN, 1.0));
            gravity.set_gravity(Vector2::zero());
            gravity.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());
        }

        #[test]
        fn test_spring() {
            let mut set = RigidBodySet::new();
            let a = set.insert(awake(Vector2::new(3.0, 0.0), 1.0));
            let b = set.insert(awake(ORIGIN, 1.0));
            let spring = Spring::new(ORIGIN, b, ORIGIN, 2.0, 0.0, 1.0);
            spring.update_force(&mut set, a, 0.1);
            assert_relative_eq!(set[a].accumulated_force(), Vector2::new(-4.0, 0.0));
            assert_eq!(set[a].accumulated_torque(), 0.0);
            assert_eq!(set[b].accumulated_force(), Vector2::zero());

            // Off-center attachment adds torque.
            set[a].clear_accumulators();
            let spring = Spring::new(Vector2::new(0.0, 1.0), b, ORIGIN, 1.0, 0.0, 0.0);
            spring.update_force(&mut set, a, 0.1);
            let l = Vector2::new(3.0, 1.0);
            let f = -l;
            assert_relative_eq!(set[a].accumulated_force(), f, epsilon = 1.0e-5);
            assert_relative_eq!(set[a].accumulated_torque(), Vector2::new(0.0, 1.0).cross(f), epsilon = 1.0e-5);
        }

        #[test]
        fn test_spring_damping() {
            let mut set = RigidBodySet::new();
            let a = set.insert(awake(Vector2::new(2.0, 0.0), 1.0));
            let b = set.insert(awake(ORIGIN, 1.0));
            set[a].velocity = Vector2::new(1.0, 0.0);
            Spring::new(ORIGIN, b, ORIGIN, 0.0, 0.5, 1.0).update_force(&mut set, a, 0.1);
            assert_relative_eq!(set[a].accumulated_force(), Vector2::new(-0.5, 0.0));

            // At rest length nothing happens, damping included.
            set[a].clear_accumulators();
            Spring::new(ORIGIN, b, ORIGIN, 1.0, 0.5, 2.0).update_force(&mut set, a, 0.1);
            assert_eq!(set[a].accumulated_force(), Vector2::zero());
        }

        #[test]
        fn test_field() {
            let mut body = RigidBody::new(Vector2::new(2.0, 0.0), AXIS_X, 1.0, 1.0).unwrap();
            body.set_awake(false);
            let (mut set, h) = single(body);

            let mut field = Field::new(ORIGIN, 5.0, 8.0, ORIGIN);
            field.update_force(&mut set, h, 0.1);
            assert!(set[h].is_awake());
            assert_relative_eq!(set[h].accumulated_force(), Vector2::new(2.0, 0.0));

            set[h].clear_accumulators();
            field.set_source(Vector2::new(100.0, 0.0));
            field.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());
        }

        #[test]
        fn test_aero() {
            let tensor = Matrix2::from_rows(-0.1, 0.0, 0.0, -0.5);
            let mut body = awake(ORIGIN, 1.0);
            body.orientation = AXIS_Y;
            body.calculate_derived_data();
            let (mut set, h) = single(body);

            // Moving along world y is moving along body x.
            set[h].velocity = Vector2::new(0.0, 2.0);
            let mut aero = Aero::new(tensor, ORIGIN, Vector2::zero());
            aero.update_force(&mut set, h, 0.1);
            assert_relative_eq!(set[h].accumulated_force(), Vector2::new(0.0, -0.2), epsilon = 1.0e-6);

            // Wind cancelling the motion means no force.
            set[h].clear_accumulators();
            aero.set_wind_speed(Vector2::new(0.0, -2.0));
            aero.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());
        }

        #[test]
        fn test_buoyancy() {
            let buoyancy = Buoyancy::new(1.0, 2.0, 0.0, 3.0, Vector2::new(1.0, 0.0));

            let (mut set, h) = single(awake(Vector2::new(0.0, -5.0), 1.0));
            buoyancy.update_force(&mut set, h, 0.1);
            assert_relative_eq!(set[h].accumulated_force(), Vector2::new(0.0, 6.0));
            // Off-center lift tips the body.
            assert_relative_eq!(set[h].accumulated_torque(), 6.0);

            let (mut set, h) = single(awake(Vector2::new(0.0, 0.5), 1.0));
            buoyancy.update_force(&mut set, h, 0.1);
            assert_relative_eq!(set[h].accumulated_force(), Vector2::new(0.0, 1.5));

            let (mut set, h) = single(awake(Vector2::new(0.0, 5.0), 1.0));
            buoyancy.update_force(&mut set, h, 0.1);
            assert_eq!(set[h].accumulated_force(), Vector2::zero());
        }
    }

    mod registry {
        use approx::assert_relative_eq;
        use cgmath::{Vector2, Zero};

        use crate::fgen::*;

        #[test]
        fn test_update_forces() {
            let mut set = RigidBodySet::new();
            let a = set.insert(RigidBody::default().with_awake(true));
            let b = set.insert(RigidBody::default().with_awake(true));

            let mut registry = ForceRegistry::new();
            let gravity = registry.add_generator(a, Gravity::new(Vector2::new(0.0, -1.0)));
            registry.add(b, gravity);
            registry.add_generator(b, Field::new(Vector2::new(-1.0, 0.0), 2.0, 1.0, ORIGIN));
            assert_eq!(registry.len(), 3);

            registry.update_forces(&mut set, 0.1);
            assert_relative_eq!(set[a].accumulated_force(), Vector2::new(0.0, -1.0));
            assert_relative_eq!(set[b].accumulated_force(), Vector2::new(1.0, -1.0));

            // Scenes toggle generators through their ids.
            if let Some(BodyForce::Gravity(g)) = registry.generator_mut(gravity) {
                g.set_on(false);
            }
            set[a].clear_accumulators();
            registry.update_forces(&mut set, 0.1);
            assert_eq!(set[a].accumulated_force(), Vector2::zero());

            assert!(registry.remove(a, gravity));
            assert!(!registry.remove(a, gravity));
            registry.remove_body(b);
            assert!(registry.is_empty());
        }

        #[test]
        fn test_stale_handles() {
            let mut set = RigidBodySet::new();
            let a = set.insert(RigidBody::default().with_awake(true));
            let b = set.insert(RigidBody::default().with_awake(true));
            let mut registry = ForceRegistry::new();
            registry.add_generator(b, Spring::new(ORIGIN, a, ORIGIN, 1.0, 0.0, 0.0));
            let gravity = registry.add_generator(a, Gravity::new(Vector2::new(0.0, -1.0)));
            set.remove(a);

            registry.update_forces(&mut set, 0.1);
            assert_eq!(set[b].accumulated_force(), Vector2::zero());

            registry.remove_generator(gravity);
            assert_eq!(registry.len(), 1);
            assert!(registry.generator(gravity).is_none());
        }

        struct Thruster(Real);

        impl ForceGenerator for Thruster {
            fn update_force(&self, bodies: &mut RigidBodySet, target: BodyHandle, _: Real) {
                bodies[target].apply_torque(self.0);
            }
        }

        #[test]
        fn test_custom() {
            let mut set = RigidBodySet::new();
            let a = set.insert(RigidBody::default());
            let mut registry = ForceRegistry::new();
            let thruster: Box<dyn ForceGenerator> = Box::new(Thruster(3.0));
            registry.add_generator(a, thruster);
            registry.update_forces(&mut set, 0.1);
            assert_eq!(set[a].accumulated_torque(), 3.0);
            assert!(set[a].is_awake());
        }
    }
}
