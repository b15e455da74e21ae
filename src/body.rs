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

use std::ops::{Index, IndexMut};

use cgmath::{InnerSpace, Zero};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::check_sleep_epsilon;
use crate::core::*;
use crate::error::*;
use crate::particle::DEFAULT_DAMPING;
use crate::pool::*;

/// Moment of inertia per unit mass of a solid disc of radius `r`, using the
/// solid sphere formula.
pub fn sphere_moment_per_mass(r: Real) -> Real {
    0.4 * r * r
}

/// Moment of inertia per unit mass of a box with the given half extents.
pub fn box_moment_per_mass(half_size: Vec2) -> Real {
    (half_size.x * half_size.x + half_size.y * half_size.y) / 3.0
}

/// How eagerly bodies fall asleep.
///
/// A body whose recent squared speed, averaged over roughly the last second,
/// drops below `sleep_epsilon` is put to sleep. Zero keeps every body awake.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepConfig {
    pub sleep_epsilon: Real,
}

impl SleepConfig {
    pub fn new(sleep_epsilon: Real) -> Result<Self> {
        check_sleep_epsilon(sleep_epsilon)?;
        Ok(SleepConfig { sleep_epsilon })
    }
}

/// A body with mass and orientation that moves and rotates in the plane.
///
/// Bodies start asleep. Any force, torque or impulse wakes them.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    /// Center of mass in world space.
    pub position: Vec2,
    /// Heading of the body's local x axis. Normalized by
    /// `calculate_derived_data`.
    pub orientation: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: Real,
    /// Linear acceleration produced by the forces of the last integration.
    pub acceleration: Vec2,
    transform: Transform2,
    inverse_mass: Real,
    inverse_moment: Real,
    linear_damping: Real,
    angular_damping: Real,
    force_accum: Vec2,
    torque_accum: Real,
    motion: Real,
    is_awake: bool,
    can_sleep: bool,
    sleep_epsilon: Real,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = RigidBody {
            position: Vec2::zero(),
            orientation: AXIS_X,
            velocity: Vec2::zero(),
            angular_velocity: 0.0,
            acceleration: Vec2::zero(),
            transform: Transform2::identity(),
            inverse_mass: 1.0,
            inverse_moment: 1.0,
            linear_damping: DEFAULT_DAMPING,
            angular_damping: DEFAULT_DAMPING,
            force_accum: Vec2::zero(),
            torque_accum: 0.0,
            motion: 0.0,
            is_awake: false,
            can_sleep: true,
            sleep_epsilon: 0.0,
        };
        body.calculate_derived_data();
        body
    }
}

impl RigidBody {
    /// Creates a body at rest. A zero orientation falls back to the x axis.
    /// Zero inverse mass or moment makes the body immovable in that sense.
    pub fn new(position: Vec2, orientation: Vec2, inverse_mass: Real, inverse_moment: Real) -> Result<Self> {
        check_inverse_mass(inverse_mass)?;
        if inverse_moment < 0.0 {
            return Err(PhysicsError::NegativeInverseMoment(inverse_moment));
        }
        let mut body = RigidBody {
            position,
            inverse_mass,
            inverse_moment,
            ..RigidBody::default()
        };
        if orientation.magnitude() > 0.0 {
            body.orientation = orientation;
        }
        body.calculate_derived_data();
        Ok(body)
    }

    /// Creates a body from its mass and moment of inertia. Infinite values
    /// make it immovable.
    pub fn from_mass(position: Vec2, orientation: Vec2, mass: Real, moment: Real) -> Result<Self> {
        RigidBody::new(position, orientation, 1.0 / mass, 1.0 / moment)
    }

    pub fn with_damping(mut self, linear: Real, angular: Real) -> Result<Self> {
        self.set_damping(linear, angular)?;
        Ok(self)
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.set_awake(awake);
        self
    }

    pub fn transform(&self) -> &Transform2 {
        &self.transform
    }

    pub fn inverse_mass(&self) -> Real {
        self.inverse_mass
    }

    pub fn set_inverse_mass(&mut self, inverse_mass: Real) -> Result<()> {
        check_inverse_mass(inverse_mass)?;
        self.inverse_mass = inverse_mass;
        Ok(())
    }

    /// The mass, or zero for an immovable body.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            0.0
        } else {
            1.0 / self.inverse_mass
        }
    }

    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    pub fn inverse_moment(&self) -> Real {
        self.inverse_moment
    }

    pub fn set_inverse_moment(&mut self, inverse_moment: Real) -> Result<()> {
        if inverse_moment < 0.0 {
            return Err(PhysicsError::NegativeInverseMoment(inverse_moment));
        }
        self.inverse_moment = inverse_moment;
        Ok(())
    }

    pub fn linear_damping(&self) -> Real {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> Real {
        self.angular_damping
    }

    pub fn set_damping(&mut self, linear: Real, angular: Real) -> Result<()> {
        check_damping(linear)?;
        check_damping(angular)?;
        self.linear_damping = linear;
        self.angular_damping = angular;
        Ok(())
    }

    pub fn accumulated_force(&self) -> Vec2 {
        self.force_accum
    }

    pub fn accumulated_torque(&self) -> Real {
        self.torque_accum
    }

    /// Running average of the squared speed, used to decide when to sleep.
    pub fn motion(&self) -> Real {
        self.motion
    }

    pub fn is_awake(&self) -> bool {
        self.is_awake
    }

    pub fn can_sleep(&self) -> bool {
        self.can_sleep
    }

    /// Allows or forbids sleeping. Forbidding it wakes the body.
    pub fn set_can_sleep(&mut self, can_sleep: bool) {
        self.can_sleep = can_sleep;
        if !can_sleep && !self.is_awake {
            self.set_awake(true);
        }
    }

    /// Applies a new sleep threshold and restarts the motion average.
    pub fn set_sleep_config(&mut self, config: SleepConfig) {
        self.sleep_epsilon = config.sleep_epsilon;
        self.motion = 10.0 * config.sleep_epsilon;
    }

    /// Waking primes the motion average so the body is not put straight back
    /// to sleep. Sleeping zeroes both velocities.
    pub fn set_awake(&mut self, awake: bool) {
        if awake {
            self.is_awake = true;
            self.motion = self.sleep_epsilon * 2.0;
        } else {
            self.is_awake = false;
            self.velocity = Vec2::zero();
            self.angular_velocity = 0.0;
        }
    }

    /// Normalizes the orientation and rebuilds the transform. Call after
    /// changing the position or orientation directly.
    pub fn calculate_derived_data(&mut self) {
        self.orientation.normalize_in_place();
        self.transform.set_orientation_and_pos(self.orientation, self.position);
    }

    pub fn point_in_world_space(&self, point: Vec2) -> Vec2 {
        self.transform.transform(point)
    }

    pub fn point_in_local_space(&self, point: Vec2) -> Vec2 {
        self.transform.transform_inverse(point)
    }

    pub fn direction_in_world_space(&self, direction: Vec2) -> Vec2 {
        self.transform.transform_direction(direction)
    }

    pub fn direction_in_local_space(&self, direction: Vec2) -> Vec2 {
        self.transform.transform_inverse_direction(direction)
    }

    /// Adds a force through the center of mass.
    pub fn add_force(&mut self, force: Vec2) {
        self.force_accum += force;
        self.is_awake = true;
    }

    /// Adds a world space force at a world space point.
    pub fn add_force_at_point(&mut self, force: Vec2, point: Vec2) {
        let arm = point - self.position;
        self.force_accum += force;
        self.torque_accum += arm.cross(force);
        self.is_awake = true;
    }

    /// Adds a world space force at a point given in body space.
    pub fn add_force_at_body_point(&mut self, force: Vec2, point: Vec2) {
        let world = self.point_in_world_space(point);
        self.add_force_at_point(force, world);
    }

    pub fn apply_torque(&mut self, torque: Real) {
        self.torque_accum += torque;
        self.is_awake = true;
    }

    /// Applies a world space impulse at a world space point, changing both
    /// velocities at once.
    pub fn apply_impulse_at_point(&mut self, impulse: Vec2, point: Vec2) {
        self.velocity += impulse * self.inverse_mass;
        self.angular_velocity += -impulse.cross(point - self.position) * self.inverse_moment;
        self.is_awake = true;
    }

    /// World space velocity of a point given in body space.
    ///
    /// The rotational part is scaled by the lever arm length once more than
    /// the rigid motion formula would, so it grows with the square of the
    /// distance from the center.
    pub fn velocity_at_point(&self, point: Vec2) -> Vec2 {
        let spin = point.cross_z(-point.magnitude() * self.angular_velocity);
        self.velocity + self.transform.transform_direction(spin)
    }

    /// Moves the body without updating the transform.
    pub fn translate(&mut self, displacement: Vec2) {
        self.position += displacement;
    }

    /// Rotates the body without updating the transform.
    pub fn rotate(&mut self, angle: Real) {
        self.orientation.rotate(angle);
    }

    pub fn clear_accumulators(&mut self) {
        self.force_accum = Vec2::zero();
        self.torque_accum = 0.0;
    }

    /// Advances an awake body by `duration` seconds using the accumulated
    /// force and torque, clears the accumulators, then updates the sleep
    /// state. Sleeping bodies are left untouched.
    pub fn integrate(&mut self, duration: Real) {
        if !self.is_awake {
            return;
        }

        self.acceleration = self.force_accum * self.inverse_mass;
        let angular_acceleration = self.torque_accum * self.inverse_moment;

        self.velocity.add_scaled(self.acceleration, duration);
        self.angular_velocity += angular_acceleration * duration;

        self.velocity *= self.linear_damping.powf(duration);
        self.angular_velocity *= self.angular_damping.powf(duration);

        self.position.add_scaled(self.velocity, duration);
        self.position.add_scaled(self.acceleration, duration * duration / 2.0);
        self.orientation.rotate(self.angular_velocity * duration);
        self.orientation.rotate(angular_acceleration * (duration * duration / 2.0));

        self.calculate_derived_data();
        self.clear_accumulators();

        if self.can_sleep {
            let current = self.velocity.magnitude2() + self.angular_velocity * self.angular_velocity;
            let bias = 0.5f32.powf(duration);
            self.motion = bias * self.motion + (1.0 - bias) * current;

            if self.motion < self.sleep_epsilon {
                trace!(motion = self.motion, "body fell asleep");
                self.set_awake(false);
            } else if self.motion > 10.0 * self.sleep_epsilon {
                self.motion = 10.0 * self.sleep_epsilon;
            }
        }
    }
}

/// Refers to a body stored in a RigidBodySet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub PoolId);

/// Owns every rigid body of a simulation along with their shared sleep
/// settings.
#[derive(Clone, Default)]
pub struct RigidBodySet {
    bodies: Pool<RigidBody>,
    sleep: SleepConfig,
}

impl RigidBodySet {
    pub fn new() -> Self {
        RigidBodySet::default()
    }

    pub fn with_sleep_config(sleep: SleepConfig) -> Self {
        RigidBodySet {
            bodies: Pool::new(),
            sleep,
        }
    }

    pub fn sleep_config(&self) -> SleepConfig {
        self.sleep
    }

    /// Changes the sleep threshold of every body, current and future.
    pub fn set_sleep_config(&mut self, sleep: SleepConfig) {
        self.sleep = sleep;
        for body in self.bodies.iter_mut() {
            body.sleep_epsilon = sleep.sleep_epsilon;
        }
    }

    pub fn insert(&mut self, mut body: RigidBody) -> BodyHandle {
        let awake = body.is_awake;
        body.set_sleep_config(self.sleep);
        if awake {
            body.set_awake(true);
        }
        BodyHandle(self.bodies.push(body))
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        self.bodies.remove(handle.0)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }

    pub fn try_get(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.get(handle).ok_or(PhysicsError::StaleHandle)
    }

    pub fn try_get_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        self.get_mut(handle).ok_or(PhysicsError::StaleHandle)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn handles(&self) -> Vec<BodyHandle> {
        self.bodies.ids().into_iter().map(BodyHandle).collect()
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (BodyHandle, &'a RigidBody)> + 'a {
        self.bodies.iter_ids().map(|(id, b)| (BodyHandle(id), b))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.bodies.iter_mut()
    }
}

impl Index<BodyHandle> for RigidBodySet {
    type Output = RigidBody;

    fn index(&self, handle: BodyHandle) -> &RigidBody {
        &self.bodies[handle.0]
    }
}

impl IndexMut<BodyHandle> for RigidBodySet {
    fn index_mut(&mut self, handle: BodyHandle) -> &mut RigidBody {
        &mut self.bodies[handle.0]
    }
}

#[cfg(test)]
mod tests {
    mod body {
        use std::f32::consts::FRAC_PI_2;

        use approx::assert_relative_eq;
        use cgmath::{Vector2, Zero};

        use crate::body::*;
        use crate::error::PhysicsError;

        fn awake_body() -> RigidBody {
            RigidBody::new(ORIGIN, AXIS_X, 1.0, 1.0).unwrap().with_awake(true)
        }

        #[test]
        fn test_construction() {
            let body = RigidBody::new(Vector2::new(1.0, 2.0), ORIGIN, 2.0, 4.0).unwrap();
            assert_eq!(body.orientation, AXIS_X);
            assert!(!body.is_awake());
            assert!(body.can_sleep());
            assert_eq!(body.mass(), 0.5);
            assert_eq!(body.transform().axis(2), Vector2::new(1.0, 2.0));

            let body = RigidBody::new(ORIGIN, Vector2::new(0.0, 3.0), 0.0, 0.0).unwrap();
            assert_relative_eq!(body.orientation, AXIS_Y);
            assert_eq!(body.mass(), 0.0);
            assert!(!body.has_finite_mass());

            assert_eq!(
                RigidBody::new(ORIGIN, AXIS_X, 1.0, -1.0),
                Err(PhysicsError::NegativeInverseMoment(-1.0))
            );
            assert!(RigidBody::default().with_damping(0.5, 1.5).is_err());
        }

        #[test]
        fn test_integrate_linear() {
            let mut body = awake_body();
            body.add_force(Vector2::new(0.0, -10.0));
            body.integrate(0.1);

            let v = -1.0 * 0.99f32.powf(0.1);
            assert_relative_eq!(body.velocity.y, v);
            assert_relative_eq!(body.position.y, v * 0.1 - 0.05);
            assert_eq!(body.accumulated_force(), Vector2::zero());
            assert_relative_eq!(body.transform().axis(2), body.position);
        }

        #[test]
        fn test_integrate_angular() {
            let mut body = awake_body();
            body.apply_torque(2.0);
            body.integrate(0.5);

            let w = 1.0 * 0.99f32.powf(0.5);
            assert_relative_eq!(body.angular_velocity, w);
            let mut heading = AXIS_X;
            heading.rotate(w * 0.5 + 2.0 * 0.125);
            assert_relative_eq!(body.orientation, heading, epsilon = 1.0e-6);
            assert_eq!(body.accumulated_torque(), 0.0);
        }

        #[test]
        fn test_asleep_is_noop() {
            let mut body = RigidBody::new(ORIGIN, AXIS_X, 1.0, 1.0).unwrap();
            body.velocity = Vector2::new(1.0, 0.0);
            let before = body;
            body.integrate(0.1);
            assert_eq!(body, before);
        }

        #[test]
        fn test_force_at_point() {
            let mut body = RigidBody::new(Vector2::new(1.0, 0.0), AXIS_X, 1.0, 1.0).unwrap();
            body.add_force_at_point(Vector2::new(0.0, 2.0), Vector2::new(2.0, 0.0));
            assert!(body.is_awake());
            assert_eq!(body.accumulated_force(), Vector2::new(0.0, 2.0));
            assert_eq!(body.accumulated_torque(), 2.0);

            body.clear_accumulators();
            // Body space (0, 1) is world space (-1, 0) after a quarter turn.
            body.orientation = AXIS_Y;
            body.calculate_derived_data();
            body.add_force_at_body_point(Vector2::new(0.0, 1.0), Vector2::new(0.0, 1.0));
            assert_relative_eq!(body.accumulated_torque(), -1.0);
        }

        #[test]
        fn test_impulse() {
            let mut body = RigidBody::new(ORIGIN, AXIS_X, 0.5, 2.0).unwrap();
            body.apply_impulse_at_point(Vector2::new(0.0, 2.0), Vector2::new(1.0, 0.0));
            assert!(body.is_awake());
            assert_eq!(body.velocity, Vector2::new(0.0, 1.0));
            // Pushing up on the right spins counter-clockwise.
            assert_eq!(body.angular_velocity, 4.0);
        }

        #[test]
        fn test_velocity_at_point() {
            let mut body = awake_body();
            body.velocity = Vector2::new(1.0, 0.0);
            body.angular_velocity = 1.0;
            assert_relative_eq!(body.velocity_at_point(Vector2::new(2.0, 0.0)), Vector2::new(1.0, 4.0));
            assert_eq!(body.velocity_at_point(ORIGIN), Vector2::new(1.0, 0.0));
        }

        #[test]
        fn test_local_space() {
            let mut body = awake_body();
            body.position = Vector2::new(1.0, 1.0);
            body.rotate(FRAC_PI_2);
            body.translate(Vector2::new(1.0, 0.0));
            // Neither call refreshes the transform.
            assert_eq!(body.transform().axis(2), ORIGIN);
            body.calculate_derived_data();

            let world = body.point_in_world_space(Vector2::new(1.0, 0.0));
            assert_relative_eq!(world, Vector2::new(2.0, 2.0), epsilon = 1.0e-6);
            assert_relative_eq!(body.point_in_local_space(world), Vector2::new(1.0, 0.0), epsilon = 1.0e-6);
            assert_relative_eq!(body.direction_in_local_space(AXIS_Y), AXIS_X, epsilon = 1.0e-6);
        }

        #[test]
        fn test_moments() {
            assert_relative_eq!(sphere_moment_per_mass(0.5), 0.1);
            assert_relative_eq!(box_moment_per_mass(Vector2::new(1.0, 2.0)), 5.0 / 3.0);
        }
    }

    mod sleep {
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        use crate::body::*;

        #[test]
        fn test_falls_asleep() {
            let mut set = RigidBodySet::with_sleep_config(SleepConfig::new(0.001).unwrap());
            let h = set.insert(RigidBody::new(ORIGIN, AXIS_X, 1.0, 1.0).unwrap().with_awake(true));
            assert_eq!(set[h].motion(), 0.002);

            let mut frames = 0;
            while set[h].is_awake() && frames < 100 {
                set[h].integrate(1.0 / 60.0);
                frames += 1;
            }
            assert!(!set[h].is_awake());
            assert_eq!(set[h].velocity, ORIGIN);
        }

        #[test]
        fn test_motion_clamped() {
            let mut set = RigidBodySet::with_sleep_config(SleepConfig::new(0.001).unwrap());
            let h = set.insert(RigidBody::default().with_awake(true));
            set[h].velocity = Vector2::new(10.0, 0.0);
            set[h].integrate(1.0 / 60.0);
            assert!(set[h].is_awake());
            assert_relative_eq!(set[h].motion(), 0.01);
        }

        #[test]
        fn test_idempotent() {
            let mut body = RigidBody::default();
            body.set_awake(false);
            let once = body;
            body.set_awake(false);
            assert_eq!(body, once);

            body.set_awake(true);
            let once = body;
            body.set_awake(true);
            assert_eq!(body, once);
        }

        #[test]
        fn test_cannot_sleep() {
            let mut set = RigidBodySet::with_sleep_config(SleepConfig::new(1.0).unwrap());
            let h = set.insert(RigidBody::default());
            set[h].set_can_sleep(false);
            assert!(set[h].is_awake());
            for _ in 0..10 {
                set[h].integrate(0.1);
            }
            assert!(set[h].is_awake());
        }

        #[test]
        fn test_zero_epsilon_never_sleeps() {
            let mut set = RigidBodySet::new();
            let h = set.insert(RigidBody::default().with_awake(true));
            for _ in 0..100 {
                set[h].integrate(0.1);
            }
            assert!(set[h].is_awake());
        }
    }

    mod body_set {
        use crate::body::*;
        use crate::error::PhysicsError;

        #[test]
        fn test_handles() {
            let mut set = RigidBodySet::new();
            let a = set.insert(RigidBody::default());
            let b = set.insert(RigidBody::default());
            assert_eq!(set.len(), 2);
            assert!(set.remove(a).is_some());
            assert!(!set.contains(a));
            assert_eq!(set.try_get(a).err(), Some(PhysicsError::StaleHandle));
            assert!(set.try_get_mut(b).is_ok());
            assert_eq!(set.handles(), vec![b]);

            set.set_sleep_config(SleepConfig { sleep_epsilon: 0.5 });
            assert_eq!(set.sleep_config().sleep_epsilon, 0.5);
        }
    }
}
