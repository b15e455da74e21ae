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

use cgmath::Zero;
use serde::{Deserialize, Serialize};

use crate::core::*;
use crate::error::*;
use crate::pool::*;

/// Damping applied to newly created particles and bodies.
pub const DEFAULT_DAMPING: Real = 0.99;

/// A point mass that moves but does not rotate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Acceleration produced by the forces of the last integration.
    pub acceleration: Vec2,
    inverse_mass: Real,
    damping: Real,
    force_accum: Vec2,
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            position: Vec2::zero(),
            velocity: Vec2::zero(),
            acceleration: Vec2::zero(),
            inverse_mass: 1.0,
            damping: DEFAULT_DAMPING,
            force_accum: Vec2::zero(),
        }
    }
}

impl Particle {
    /// Creates a particle at rest. An inverse mass of zero makes the particle
    /// immovable.
    pub fn new(position: Vec2, inverse_mass: Real) -> Result<Self> {
        check_inverse_mass(inverse_mass)?;
        Ok(Particle {
            position,
            inverse_mass,
            ..Particle::default()
        })
    }

    pub fn with_damping(mut self, damping: Real) -> Result<Self> {
        self.set_damping(damping)?;
        Ok(self)
    }

    pub fn inverse_mass(&self) -> Real {
        self.inverse_mass
    }

    pub fn set_inverse_mass(&mut self, inverse_mass: Real) -> Result<()> {
        check_inverse_mass(inverse_mass)?;
        self.inverse_mass = inverse_mass;
        Ok(())
    }

    /// The mass, infinite for an immovable particle.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            Real::INFINITY
        } else {
            1.0 / self.inverse_mass
        }
    }

    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass != 0.0
    }

    pub fn damping(&self) -> Real {
        self.damping
    }

    pub fn set_damping(&mut self, damping: Real) -> Result<()> {
        check_damping(damping)?;
        self.damping = damping;
        Ok(())
    }

    /// The force accumulated since the last integration.
    pub fn accumulated_force(&self) -> Vec2 {
        self.force_accum
    }

    /// Advances the particle by `duration` seconds using the accumulated force,
    /// then clears the accumulator.
    pub fn integrate(&mut self, duration: Real) {
        self.acceleration = self.force_accum * self.inverse_mass;
        self.velocity.add_scaled(self.acceleration, duration);
        self.velocity *= self.damping.powf(duration);
        self.position.add_scaled(self.velocity, duration);
        self.position.add_scaled(self.acceleration, duration * duration / 2.0);
        self.clear_accumulator();
    }

    pub fn clear_accumulator(&mut self) {
        self.force_accum = Vec2::zero();
    }

    pub fn add_force(&mut self, force: Vec2) {
        self.force_accum += force;
    }

    /// Changes the velocity by `impulse / m`.
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity.add_scaled(impulse, self.inverse_mass);
    }

    /// Teleports the particle by `displacement`.
    pub fn translate(&mut self, displacement: Vec2) {
        self.position += displacement;
    }
}

/// Refers to a particle stored in a ParticleSet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleHandle(pub PoolId);

/// Owns every particle of a simulation.
#[derive(Clone, Default)]
pub struct ParticleSet {
    particles: Pool<Particle>,
}

impl ParticleSet {
    pub fn new() -> Self {
        ParticleSet {
            particles: Pool::new(),
        }
    }

    pub fn insert(&mut self, particle: Particle) -> ParticleHandle {
        ParticleHandle(self.particles.push(particle))
    }

    pub fn remove(&mut self, handle: ParticleHandle) -> Option<Particle> {
        self.particles.remove(handle.0)
    }

    pub fn contains(&self, handle: ParticleHandle) -> bool {
        self.particles.contains(handle.0)
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.particles.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut Particle> {
        self.particles.get_mut(handle.0)
    }

    pub fn try_get(&self, handle: ParticleHandle) -> Result<&Particle> {
        self.get(handle).ok_or(PhysicsError::StaleHandle)
    }

    pub fn try_get_mut(&mut self, handle: ParticleHandle) -> Result<&mut Particle> {
        self.get_mut(handle).ok_or(PhysicsError::StaleHandle)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn handles(&self) -> Vec<ParticleHandle> {
        self.particles.ids().into_iter().map(ParticleHandle).collect()
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (ParticleHandle, &'a Particle)> + 'a {
        self.particles.iter_ids().map(|(id, p)| (ParticleHandle(id), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }
}

impl Index<ParticleHandle> for ParticleSet {
    type Output = Particle;

    fn index(&self, handle: ParticleHandle) -> &Particle {
        &self.particles[handle.0]
    }
}

impl IndexMut<ParticleHandle> for ParticleSet {
    fn index_mut(&mut self, handle: ParticleHandle) -> &mut Particle {
        &mut self.particles[handle.0]
    }
}

#[cfg(test)]
mod tests {
    mod particle {
        use approx::assert_relative_eq;
        use cgmath::{Vector2, Zero};

        use crate::error::PhysicsError;
        use crate::particle::*;

        #[test]
        fn test_integrate() {
            let mut p = Particle::new(Vector2::zero(), 0.5).unwrap();
            p.add_force(Vector2::new(0.0, -20.0));
            p.integrate(0.1);

            // a = F / m, v = a·t·d^t, p = v·t + a·t²/2
            assert_relative_eq!(p.acceleration, Vector2::new(0.0, -10.0));
            let v = -1.0 * 0.99f32.powf(0.1);
            assert_relative_eq!(p.velocity.y, v);
            assert_relative_eq!(p.position.y, v * 0.1 - 0.05);
            assert_eq!(p.accumulated_force(), Vector2::zero());
        }

        #[test]
        fn test_deterministic() {
            let run = || {
                let mut p = Particle::new(Vector2::new(1.0, 2.0), 2.0).unwrap();
                for _ in 0..50 {
                    p.add_force(Vector2::new(0.3, -9.8));
                    p.integrate(1.0 / 60.0);
                }
                p
            };
            assert_eq!(run(), run());
        }

        #[test]
        fn test_immovable() {
            let mut p = Particle::new(ORIGIN, 0.0).unwrap();
            assert!(!p.has_finite_mass());
            assert_eq!(p.mass(), Real::INFINITY);
            p.add_force(Vector2::new(100.0, 100.0));
            p.apply_impulse(Vector2::new(5.0, 0.0));
            p.integrate(0.5);
            assert_eq!(p.position, ORIGIN);
        }

        #[test]
        fn test_validation() {
            assert_eq!(
                Particle::new(ORIGIN, -1.0),
                Err(PhysicsError::NegativeInverseMass(-1.0))
            );
            let p = Particle::default().with_damping(2.0);
            assert_eq!(p, Err(PhysicsError::DampingOutOfRange(2.0)));
        }
    }

    mod particle_set {
        use cgmath::Vector2;

        use crate::error::PhysicsError;
        use crate::particle::*;

        #[test]
        fn test_handles() {
            let mut set = ParticleSet::new();
            let a = set.insert(Particle::default());
            let b = set.insert(Particle::new(Vector2::new(1.0, 0.0), 1.0).unwrap());
            assert_eq!(set.len(), 2);
            assert_eq!(set[b].position.x, 1.0);

            set.remove(a);
            assert!(set.get(a).is_none());
            assert_eq!(set.try_get(a).err(), Some(PhysicsError::StaleHandle));
            let c = set.insert(Particle::default());
            assert_ne!(a, c);
            assert_eq!(set.handles(), vec![c, b]);
        }
    }
}
