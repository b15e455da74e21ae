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

use cgmath::{InnerSpace, Zero};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::arena::*;
use crate::core::*;
use crate::particle::*;

/// Two particles touching, or one particle touching immovable scenery.
///
/// The normal points from the second particle toward the first. A contact
/// without a first particle is ignored.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleContact {
    pub particles: [Option<ParticleHandle>; 2],
    pub restitution: Real,
    pub contact_normal: Vec2,
    pub penetration: Real,
    /// How far each particle was moved by the last interpenetration step.
    pub particle_movement: [Vec2; 2],
}

impl Default for ParticleContact {
    fn default() -> Self {
        ParticleContact {
            particles: [None, None],
            restitution: 0.0,
            contact_normal: Vec2::zero(),
            penetration: 0.0,
            particle_movement: [Vec2::zero(); 2],
        }
    }
}

impl ParticleContact {
    pub fn new(
        first: ParticleHandle,
        second: Option<ParticleHandle>,
        restitution: Real,
        contact_normal: Vec2,
        penetration: Real,
    ) -> Self {
        ParticleContact {
            particles: [Some(first), second],
            restitution,
            contact_normal,
            penetration,
            ..ParticleContact::default()
        }
    }

    fn get<'a>(&self, particles: &'a ParticleSet, i: usize) -> Option<&'a Particle> {
        self.particles[i].and_then(|h| particles.get(h))
    }

    fn get_mut<'a>(&self, particles: &'a mut ParticleSet, i: usize) -> Option<&'a mut Particle> {
        match self.particles[i] {
            Some(h) => particles.get_mut(h),
            None => None,
        }
    }

    /// Velocity of the first particle relative to the second, along the
    /// normal. Negative when closing.
    pub fn separating_velocity(&self, particles: &ParticleSet) -> Real {
        let mut relative = match self.get(particles, 0) {
            Some(p) => p.velocity,
            None => return 0.0,
        };
        if let Some(p) = self.get(particles, 1) {
            relative -= p.velocity;
        }
        relative.dot(self.contact_normal)
    }

    fn total_inverse_mass(&self, particles: &ParticleSet) -> Real {
        (0..2)
            .filter_map(|i| self.get(particles, i))
            .map(Particle::inverse_mass)
            .sum()
    }

    /// Resolves velocity, then interpenetration.
    pub fn resolve(&mut self, particles: &mut ParticleSet, duration: Real) {
        self.contact_normal.normalize_in_place();
        self.resolve_velocity(particles, duration);
        self.resolve_interpenetration(particles);
    }

    /// Removes the part of the bounce that is only due to the acceleration
    /// built up during this frame, so resting contacts do not jitter.
    fn micro_collision_resolve(&self, particles: &ParticleSet, new_sep: Real, duration: Real) -> Real {
        let mut acc = match self.get(particles, 0) {
            Some(p) => p.acceleration,
            None => return new_sep,
        };
        if let Some(p) = self.get(particles, 1) {
            acc -= p.acceleration;
        }
        let acc_sep = acc.dot(self.contact_normal) * duration;
        if acc_sep < 0.0 {
            (new_sep + self.restitution * acc_sep).max(0.0)
        } else {
            new_sep
        }
    }

    fn resolve_velocity(&mut self, particles: &mut ParticleSet, duration: Real) {
        let sep = self.separating_velocity(particles);
        if sep >= 0.0 {
            return;
        }
        let new_sep = self.micro_collision_resolve(particles, -sep * self.restitution, duration);
        let delta = new_sep - sep;

        let total = self.total_inverse_mass(particles);
        if total <= 0.0 {
            return;
        }
        let impulse = self.contact_normal * (delta / total);
        if let Some(p) = self.get_mut(particles, 0) {
            p.apply_impulse(impulse);
        }
        if let Some(p) = self.get_mut(particles, 1) {
            p.apply_impulse(-impulse);
        }
    }

    fn resolve_interpenetration(&mut self, particles: &mut ParticleSet) {
        self.particle_movement = [Vec2::zero(); 2];
        if self.penetration <= 0.0 {
            return;
        }
        let total = self.total_inverse_mass(particles);
        if total <= 0.0 {
            return;
        }
        let move_per_inverse_mass = self.contact_normal * (self.penetration / total);

        if let Some(p) = self.get_mut(particles, 0) {
            self.particle_movement[0] = move_per_inverse_mass * p.inverse_mass();
            p.translate(self.particle_movement[0]);
        }
        if let Some(p) = self.get_mut(particles, 1) {
            self.particle_movement[1] = move_per_inverse_mass * -p.inverse_mass();
            p.translate(self.particle_movement[1]);
        }
    }
}

/// Writes particle contacts for the current frame.
pub trait ParticleContactGenerator {
    /// Returns the number of contacts written, zero once the arena is full.
    fn add_contact(&self, particles: &ParticleSet, contacts: &mut ContactArena<ParticleContact>) -> usize;
}

/// Resolves particle contacts one at a time, always picking the one closing
/// fastest.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleContactResolver {
    iterations: usize,
    iterations_used: usize,
}

impl ParticleContactResolver {
    pub fn new(iterations: usize) -> Self {
        ParticleContactResolver {
            iterations,
            iterations_used: 0,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    /// Iterations spent by the last call to `resolve_contacts`.
    pub fn iterations_used(&self) -> usize {
        self.iterations_used
    }

    pub fn resolve_contacts(
        &mut self,
        contacts: &mut [ParticleContact],
        particles: &mut ParticleSet,
        duration: Real,
    ) {
        self.iterations_used = 0;
        while self.iterations_used < self.iterations {
            let mut max = Real::MAX;
            let mut max_index = None;
            for (i, contact) in contacts.iter().enumerate() {
                let sep = contact.separating_velocity(particles);
                if sep < max && (sep < 0.0 || contact.penetration > 0.0) {
                    max = sep;
                    max_index = Some(i);
                }
            }
            let max_index = match max_index {
                Some(i) => i,
                None => break,
            };

            trace!(
                contact = max_index,
                separating_velocity = max,
                penetration = contacts[max_index].penetration,
                "resolving particle contact"
            );
            contacts[max_index].resolve(particles, duration);
            update_penetration(contacts, max_index);
            self.iterations_used += 1;
        }
    }
}

/// Accounts for the movement made while resolving `contacts[resolved]` in
/// every contact that shares a particle with it.
fn update_penetration(contacts: &mut [ParticleContact], resolved: usize) {
    let [r0, r1] = contacts[resolved].particles;
    let [m0, m1] = contacts[resolved].particle_movement;

    for contact in contacts.iter_mut() {
        let n = contact.contact_normal;
        if contact.particles[0] == r0 {
            contact.penetration -= m0.dot(n);
        } else if r1.is_some() && contact.particles[0] == r1 {
            contact.penetration -= m1.dot(n);
        }
        if contact.particles[1].is_some() {
            if contact.particles[1] == r0 {
                contact.penetration += m0.dot(n);
            } else if contact.particles[1] == r1 {
                contact.penetration += m1.dot(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod contact {
        use approx::assert_relative_eq;
        use cgmath::{Vector2, Zero};

        use crate::pcontacts::*;

        fn pair() -> (ParticleSet, ParticleHandle, ParticleHandle) {
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::new(Vector2::new(0.0, 0.0), 1.0).unwrap());
            let b = set.insert(Particle::new(Vector2::new(0.9, 0.0), 1.0).unwrap());
            (set, a, b)
        }

        #[test]
        fn test_bounce() {
            let (mut set, a, b) = pair();
            set[a].velocity = Vector2::new(1.0, 0.0);
            set[b].velocity = Vector2::new(-1.0, 0.0);

            // Normal points from b toward a.
            let mut c = ParticleContact::new(a, Some(b), 0.5, Vector2::new(-2.0, 0.0), 0.0);
            assert_relative_eq!(c.separating_velocity(&set), -4.0);
            c.resolve(&mut set, 0.01);
            assert_relative_eq!(c.contact_normal, Vector2::new(-1.0, 0.0));
            assert_relative_eq!(c.separating_velocity(&set), 1.0);
            // Momentum is conserved.
            assert_relative_eq!(set[a].velocity + set[b].velocity, Vector2::zero());
        }

        #[test]
        fn test_interpenetration() {
            let mut set = ParticleSet::new();
            let light = set.insert(Particle::new(ORIGIN, 2.0).unwrap());
            let heavy = set.insert(Particle::new(Vector2::new(0.9, 0.0), 1.0).unwrap());

            let mut c = ParticleContact::new(light, Some(heavy), 0.0, Vector2::new(-1.0, 0.0), 0.3);
            c.resolve(&mut set, 0.01);
            // The light particle takes two thirds of the correction.
            assert_relative_eq!(set[light].position, Vector2::new(-0.2, 0.0));
            assert_relative_eq!(set[heavy].position, Vector2::new(1.0, 0.0));
            assert_relative_eq!(c.particle_movement[1], Vector2::new(0.1, 0.0));
        }

        #[test]
        fn test_immovable() {
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::new(ORIGIN, 0.0).unwrap());
            set[a].velocity = Vector2::new(0.0, -1.0);
            let mut c = ParticleContact::new(a, None, 1.0, Vector2::new(0.0, 1.0), 0.5);
            c.resolve(&mut set, 0.01);
            assert_eq!(set[a].velocity, Vector2::new(0.0, -1.0));
            assert_eq!(set[a].position, ORIGIN);
        }

        #[test]
        fn test_resting_contact() {
            // A particle pressed into the ground by gravity does not bounce.
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::new(ORIGIN, 1.0).unwrap());
            let dt = 0.1;
            set[a].add_force(Vector2::new(0.0, -10.0));
            set[a].integrate(dt);
            let mut c = ParticleContact::new(a, None, 0.8, Vector2::new(0.0, 1.0), 0.0);
            c.resolve(&mut set, dt);
            assert_relative_eq!(set[a].velocity.y, 0.0, epsilon = 1.0e-5);
        }
    }

    mod resolver {
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        use crate::pcontacts::*;

        #[test]
        fn test_picks_fastest_closing() {
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::new(ORIGIN, 1.0).unwrap());
            let b = set.insert(Particle::new(Vector2::new(5.0, 0.0), 1.0).unwrap());
            set[a].velocity = Vector2::new(0.0, -1.0);
            set[b].velocity = Vector2::new(0.0, -3.0);

            let mut contacts = [
                ParticleContact::new(a, None, 0.0, AXIS_Y, 0.0),
                ParticleContact::new(b, None, 0.0, AXIS_Y, 0.0),
            ];
            let mut resolver = ParticleContactResolver::new(1);
            resolver.resolve_contacts(&mut contacts, &mut set, 0.01);
            assert_eq!(resolver.iterations_used(), 1);
            assert_relative_eq!(set[b].velocity.y, 0.0);
            assert_relative_eq!(set[a].velocity.y, -1.0);

            resolver.set_iterations(10);
            resolver.resolve_contacts(&mut contacts, &mut set, 0.01);
            // Only one contact still qualified.
            assert_eq!(resolver.iterations_used(), 1);
            assert_relative_eq!(set[a].velocity.y, 0.0);
        }

        #[test]
        fn test_shared_particle_penetration() {
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::new(ORIGIN, 1.0).unwrap());
            let b = set.insert(Particle::new(Vector2::new(0.0, 1.0), 1.0).unwrap());

            // a sits 0.2 into the ground and b rests on a.
            let mut contacts = [
                ParticleContact::new(a, None, 0.0, AXIS_Y, 0.2),
                ParticleContact::new(b, Some(a), 0.0, AXIS_Y, 0.0),
            ];
            let mut resolver = ParticleContactResolver::new(1);
            resolver.resolve_contacts(&mut contacts, &mut set, 0.01);

            assert_relative_eq!(set[a].position.y, 0.2);
            // Lifting a pushes it 0.2 into b.
            assert_relative_eq!(contacts[1].penetration, 0.2);
        }

        #[test]
        fn test_no_contacts() {
            let mut set = ParticleSet::new();
            let mut resolver = ParticleContactResolver::new(4);
            resolver.resolve_contacts(&mut [], &mut set, 0.01);
            assert_eq!(resolver.iterations_used(), 0);
        }
    }
}
