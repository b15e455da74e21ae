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

use tracing::debug;

use crate::arena::*;
use crate::config::*;
use crate::core::*;
use crate::error::*;
use crate::particle::*;
use crate::pcontacts::*;
use crate::pfgen::*;

/// Steps a set of particles: forces, integration, then contacts.
pub struct ParticleWorld {
    particles: ParticleSet,
    registry: ParticleForceRegistry,
    contact_generators: Vec<Box<dyn ParticleContactGenerator>>,
    resolver: ParticleContactResolver,
    contacts: ContactArena<ParticleContact>,
    iterations: Iterations,
}

impl ParticleWorld {
    pub fn new(config: ParticleWorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(ParticleWorld {
            particles: ParticleSet::new(),
            registry: ParticleForceRegistry::new(),
            contact_generators: Vec::new(),
            resolver: ParticleContactResolver::new(config.iterations.for_contacts(0)),
            contacts: ContactArena::new(config.max_contacts)?,
            iterations: config.iterations,
        })
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    pub fn add_particle(&mut self, particle: Particle) -> ParticleHandle {
        self.particles.insert(particle)
    }

    pub fn force_registry(&self) -> &ParticleForceRegistry {
        &self.registry
    }

    pub fn force_registry_mut(&mut self) -> &mut ParticleForceRegistry {
        &mut self.registry
    }

    pub fn add_contact_generator<G>(&mut self, generator: G)
    where
        G: ParticleContactGenerator + 'static,
    {
        self.contact_generators.push(Box::new(generator));
    }

    pub fn contact_generators_mut(&mut self) -> &mut Vec<Box<dyn ParticleContactGenerator>> {
        &mut self.contact_generators
    }

    /// Contacts generated by the last frame.
    pub fn contacts(&self) -> &[ParticleContact] {
        self.contacts.as_slice()
    }

    pub fn resolver(&self) -> &ParticleContactResolver {
        &self.resolver
    }

    /// Clears every particle's force accumulator.
    pub fn start_frame(&mut self) {
        for particle in self.particles.iter_mut() {
            particle.clear_accumulator();
        }
    }

    /// Runs every contact generator until the arena fills up. Returns the
    /// number of contacts written.
    pub fn generate_contacts(&mut self) -> usize {
        self.contacts.reset();
        for generator in &self.contact_generators {
            if self.contacts.is_full() {
                break;
            }
            generator.add_contact(&self.particles, &mut self.contacts);
        }
        self.contacts.len()
    }

    pub fn integrate(&mut self, duration: Real) {
        for particle in self.particles.iter_mut() {
            particle.integrate(duration);
        }
    }

    pub fn run_physics(&mut self, duration: Real) {
        self.registry.update_forces(&mut self.particles, duration);
        self.integrate(duration);

        let used = self.generate_contacts();
        self.resolver.set_iterations(self.iterations.for_contacts(used));
        self.resolver
            .resolve_contacts(self.contacts.as_mut_slice(), &mut self.particles, duration);

        debug!(
            contacts = used,
            iterations = self.resolver.iterations_used(),
            "particle frame"
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
    mod particle_world {
        use approx::assert_relative_eq;
        use cgmath::{InnerSpace, Vector2};

        use crate::plinks::*;
        use crate::pworld::*;

        /// Keeps particles above y = 0.
        struct Ground(Vec<ParticleHandle>);

        impl ParticleContactGenerator for Ground {
            fn add_contact(&self, particles: &ParticleSet, contacts: &mut ContactArena<ParticleContact>) -> usize {
                let mut used = 0;
                for &h in &self.0 {
                    let y = particles[h].position.y;
                    if y < 0.0 {
                        if !contacts.push(ParticleContact::new(h, None, 0.2, AXIS_Y, -y)) {
                            break;
                        }
                        used += 1;
                    }
                }
                used
            }
        }

        #[test]
        fn test_falling_particle() {
            let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
            let p = world.add_particle(Particle::new(Vector2::new(0.0, 2.0), 1.0).unwrap());
            world
                .force_registry_mut()
                .add_generator(p, ParticleGravity::new(Vector2::new(0.0, -10.0)));
            world.add_contact_generator(Ground(vec![p]));

            for _ in 0..300 {
                world.update(1.0 / 60.0);
            }
            let particle = world.particles()[p];
            assert!(particle.position.y >= -1.0e-3);
            assert!(particle.position.y < 0.05);
        }

        #[test]
        fn test_rod_chain() {
            let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
            let a = world.add_particle(Particle::new(ORIGIN, 0.0).unwrap());
            let b = world.add_particle(Particle::new(Vector2::new(1.0, 0.0), 1.0).unwrap());
            world
                .force_registry_mut()
                .add_generator(b, ParticleGravity::new(Vector2::new(0.0, -10.0)));
            world.add_contact_generator(ParticleRod::new(a, b, 1.0));

            for _ in 0..30 {
                world.update(1.0 / 60.0);
            }
            let (pa, pb) = (world.particles()[a].position, world.particles()[b].position);
            assert_eq!(pa, ORIGIN);
            assert_relative_eq!((pb - pa).magnitude(), 1.0, epsilon = 1.0e-3);
            // The pendulum has swung below its anchor.
            assert!(pb.y < 0.0);
        }

        #[test]
        fn test_arena_capacity() {
            let config = ParticleWorldConfig {
                max_contacts: 2,
                iterations: Iterations::Fixed(1),
            };
            let mut world = ParticleWorld::new(config).unwrap();
            let handles: Vec<_> = (0..4)
                .map(|i| world.add_particle(Particle::new(Vector2::new(i as Real, -0.5), 1.0).unwrap()))
                .collect();
            world.add_contact_generator(Ground(handles));
            assert_eq!(world.generate_contacts(), 2);

            world.run_physics(0.01);
            assert_eq!(world.resolver().iterations_used(), 1);
        }

        #[test]
        fn test_zero_capacity() {
            let config = ParticleWorldConfig {
                max_contacts: 0,
                iterations: Iterations::Auto,
            };
            assert!(ParticleWorld::new(config).is_err());
        }
    }
}
