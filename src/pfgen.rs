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

use cgmath::{InnerSpace, Vector2, Zero};
use serde::{Deserialize, Serialize};

use crate::core::*;
use crate::particle::*;
use crate::pool::*;

/// Adds a force to a particle each frame.
///
/// Generators only ever add to the target's force accumulator. Any other
/// particle a generator refers to is read, never written.
pub trait ParticleForceGenerator {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, duration: Real);
}

/// Constant acceleration, applied as `g·m`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleGravity {
    pub gravity: Vec2,
}

impl ParticleGravity {
    pub fn new(gravity: Vec2) -> Self {
        ParticleGravity { gravity }
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }
}

impl ParticleForceGenerator for ParticleGravity {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            if !particle.has_finite_mass() {
                return;
            }
            let mass = particle.mass();
            particle.add_force(self.gravity * mass);
        }
    }
}

/// Drag opposing the velocity, linear and quadratic in speed.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleDrag {
    pub k1: Real,
    pub k2: Real,
}

impl ParticleDrag {
    pub fn new(k1: Real, k2: Real) -> Self {
        ParticleDrag { k1, k2 }
    }
}

impl ParticleForceGenerator for ParticleDrag {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.velocity;
            let speed = v.magnitude();
            let drag = self.k1 * speed + self.k2 * speed * speed;
            particle.add_force(v.unit() * -drag);
        }
    }
}

/// Inverse-square push away from `source`, limited to `radius`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleField {
    pub source: Vec2,
    pub radius: Real,
    pub k: Real,
}

impl ParticleField {
    pub fn new(source: Vec2, radius: Real, k: Real) -> Self {
        ParticleField { source, radius, k }
    }

    pub fn set_source(&mut self, source: Vec2) {
        self.source = source;
    }
}

impl ParticleForceGenerator for ParticleField {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - self.source;
            let d = v.magnitude();
            if d == 0.0 || d > self.radius {
                return;
            }
            particle.add_force(v.unit() * (self.k / (d * d)));
        }
    }
}

/// Hooke's law force along `offset`, `-k·(|offset| - rest)`.
fn spring_force(offset: Vec2, spring_constant: Real, rest_length: Real) -> Vec2 {
    offset.unit() * -(offset.magnitude() - rest_length) * spring_constant
}

/// A spring between the target and another particle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleSpring {
    pub other: ParticleHandle,
    pub spring_constant: Real,
    pub rest_length: Real,
}

impl ParticleSpring {
    pub fn new(other: ParticleHandle, spring_constant: Real, rest_length: Real) -> Self {
        ParticleSpring {
            other,
            spring_constant,
            rest_length,
        }
    }
}

impl ParticleForceGenerator for ParticleSpring {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        let other = match particles.get(self.other) {
            Some(other) => other.position,
            None => return,
        };
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - other;
            particle.add_force(spring_force(v, self.spring_constant, self.rest_length));
        }
    }
}

/// A spring between the target and a fixed point.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleAnchoredSpring {
    pub anchor: Vec2,
    pub spring_constant: Real,
    pub rest_length: Real,
}

impl ParticleAnchoredSpring {
    pub fn new(anchor: Vec2, spring_constant: Real, rest_length: Real) -> Self {
        ParticleAnchoredSpring {
            anchor,
            spring_constant,
            rest_length,
        }
    }

    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }
}

impl ParticleForceGenerator for ParticleAnchoredSpring {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - self.anchor;
            particle.add_force(spring_force(v, self.spring_constant, self.rest_length));
        }
    }
}

/// A spring that only pulls, between the target and another particle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleBungee {
    pub other: ParticleHandle,
    pub spring_constant: Real,
    pub rest_length: Real,
}

impl ParticleBungee {
    pub fn new(other: ParticleHandle, spring_constant: Real, rest_length: Real) -> Self {
        ParticleBungee {
            other,
            spring_constant,
            rest_length,
        }
    }
}

impl ParticleForceGenerator for ParticleBungee {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        let other = match particles.get(self.other) {
            Some(other) => other.position,
            None => return,
        };
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - other;
            if v.magnitude() <= self.rest_length {
                return;
            }
            particle.add_force(spring_force(v, self.spring_constant, self.rest_length));
        }
    }
}

/// A spring that only pulls, between the target and a fixed point.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleAnchoredBungee {
    pub anchor: Vec2,
    pub spring_constant: Real,
    pub rest_length: Real,
}

impl ParticleAnchoredBungee {
    pub fn new(anchor: Vec2, spring_constant: Real, rest_length: Real) -> Self {
        ParticleAnchoredBungee {
            anchor,
            spring_constant,
            rest_length,
        }
    }

    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }
}

impl ParticleForceGenerator for ParticleAnchoredBungee {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - self.anchor;
            if v.magnitude() <= self.rest_length {
                return;
            }
            particle.add_force(spring_force(v, self.spring_constant, self.rest_length));
        }
    }
}

/// Upward force of a liquid whose surface lies at `water_height`.
///
/// A particle is out of the liquid above `water_height + max_depth`, fully
/// submerged below `water_height - max_depth`, and receives a linearly
/// interpolated force in between.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleBuoyancy {
    pub max_depth: Real,
    pub volume: Real,
    pub water_height: Real,
    pub liquid_density: Real,
}

impl ParticleBuoyancy {
    pub fn new(max_depth: Real, volume: Real, water_height: Real, liquid_density: Real) -> Self {
        ParticleBuoyancy {
            max_depth,
            volume,
            water_height,
            liquid_density,
        }
    }
}

/// Vertical buoyant force on something at height `depth`.
pub(crate) fn buoyant_force(
    depth: Real,
    max_depth: Real,
    volume: Real,
    water_height: Real,
    liquid_density: Real,
) -> Option<Real> {
    if depth >= water_height + max_depth {
        None
    } else if depth <= water_height - max_depth {
        Some(liquid_density * volume)
    } else {
        Some(liquid_density * volume * (max_depth - (depth - water_height)) / (2.0 * max_depth))
    }
}

impl ParticleForceGenerator for ParticleBuoyancy {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let depth = particle.position.y;
            if let Some(lift) = buoyant_force(
                depth,
                self.max_depth,
                self.volume,
                self.water_height,
                self.liquid_density,
            ) {
                particle.add_force(Vector2::new(0.0, lift));
            }
        }
    }
}

/// A stiff damped spring to a fixed point, solved analytically over the frame
/// so that it stays stable at stiffnesses that would blow up a plain spring.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleFakeSpring {
    pub anchor: Vec2,
    pub spring_constant: Real,
    pub damping: Real,
}

impl ParticleFakeSpring {
    pub fn new(anchor: Vec2, spring_constant: Real, damping: Real) -> Self {
        ParticleFakeSpring {
            anchor,
            spring_constant,
            damping,
        }
    }

    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }
}

impl ParticleForceGenerator for ParticleFakeSpring {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, duration: Real) {
        let particle = match particles.get_mut(target) {
            Some(particle) => particle,
            None => return,
        };
        if !particle.has_finite_mass() || duration == 0.0 {
            return;
        }

        let p = particle.position - self.anchor;
        let gamma = 0.5 * (4.0 * self.spring_constant - self.damping * self.damping).sqrt();
        // Overdamped springs have no oscillating solution.
        if gamma == 0.0 || !gamma.is_finite() {
            return;
        }

        let v = particle.velocity;
        let c = p * (self.damping / (2.0 * gamma)) + v * (1.0 / gamma);
        let (sin, cos) = (gamma * duration).sin_cos();
        let target = (p * cos + c * sin) * (-0.5 * self.damping * duration).exp();
        let accel = (target - p) * (1.0 / (duration * duration)) - v * (1.0 / duration);
        let mass = particle.mass();
        particle.add_force(accel * mass);
    }
}

/// Drives the target toward another particle plus an offset, with a
/// proportional term on position and a derivative term on velocity.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleControl {
    pub other: ParticleHandle,
    pub offset: Vec2,
    pub on: bool,
}

impl ParticleControl {
    const GAINS: [Real; 2] = [1.0, 1.5];

    pub fn new(other: ParticleHandle) -> Self {
        ParticleControl::with_offset(other, Vec2::zero())
    }

    pub fn with_offset(other: ParticleHandle, offset: Vec2) -> Self {
        ParticleControl {
            other,
            offset,
            on: true,
        }
    }

    pub fn switch_on(&mut self, on: bool) {
        self.on = on;
    }
}

impl ParticleForceGenerator for ParticleControl {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if !self.on {
            return;
        }
        let (other_pos, other_vel) = match particles.get(self.other) {
            Some(other) => (other.position, other.velocity),
            None => return,
        };
        if let Some(particle) = particles.get_mut(target) {
            let x0 = particle.position - (other_pos + self.offset);
            let x1 = particle.velocity - other_vel;
            let kx = x0 * Self::GAINS[0] + x1 * Self::GAINS[1];
            let inverse_mass = particle.inverse_mass();
            particle.add_force(-kx * inverse_mass);
        }
    }
}

/// Inverse-square attraction toward a fixed point.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticlePointGravity {
    pub source: Vec2,
    pub g: Real,
}

impl ParticlePointGravity {
    pub fn new(source: Vec2, g: Real) -> Self {
        ParticlePointGravity { source, g }
    }
}

impl ParticleForceGenerator for ParticlePointGravity {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, _: Real) {
        if let Some(particle) = particles.get_mut(target) {
            let v = particle.position - self.source;
            let d = v.magnitude();
            if d == 0.0 {
                return;
            }
            particle.add_force(v.unit() * -(self.g / (d * d)));
        }
    }
}

/// Every particle force the engine provides, plus user supplied generators.
pub enum ParticleForce {
    Gravity(ParticleGravity),
    Drag(ParticleDrag),
    Field(ParticleField),
    Spring(ParticleSpring),
    AnchoredSpring(ParticleAnchoredSpring),
    Bungee(ParticleBungee),
    AnchoredBungee(ParticleAnchoredBungee),
    Buoyancy(ParticleBuoyancy),
    FakeSpring(ParticleFakeSpring),
    Control(ParticleControl),
    PointGravity(ParticlePointGravity),
    Custom(Box<dyn ParticleForceGenerator>),
}

macro_rules! particle_force_from {
    ($($variant:ident => $ty:ty),* $(,)*) => {
        $(
            impl From<$ty> for ParticleForce {
                fn from(g: $ty) -> Self {
                    ParticleForce::$variant(g)
                }
            }
        )*
    };
}

particle_force_from! {
    Gravity => ParticleGravity,
    Drag => ParticleDrag,
    Field => ParticleField,
    Spring => ParticleSpring,
    AnchoredSpring => ParticleAnchoredSpring,
    Bungee => ParticleBungee,
    AnchoredBungee => ParticleAnchoredBungee,
    Buoyancy => ParticleBuoyancy,
    FakeSpring => ParticleFakeSpring,
    Control => ParticleControl,
    PointGravity => ParticlePointGravity,
    Custom => Box<dyn ParticleForceGenerator>,
}

impl ParticleForceGenerator for ParticleForce {
    fn update_force(&self, particles: &mut ParticleSet, target: ParticleHandle, duration: Real) {
        match self {
            ParticleForce::Gravity(g) => g.update_force(particles, target, duration),
            ParticleForce::Drag(g) => g.update_force(particles, target, duration),
            ParticleForce::Field(g) => g.update_force(particles, target, duration),
            ParticleForce::Spring(g) => g.update_force(particles, target, duration),
            ParticleForce::AnchoredSpring(g) => g.update_force(particles, target, duration),
            ParticleForce::Bungee(g) => g.update_force(particles, target, duration),
            ParticleForce::AnchoredBungee(g) => g.update_force(particles, target, duration),
            ParticleForce::Buoyancy(g) => g.update_force(particles, target, duration),
            ParticleForce::FakeSpring(g) => g.update_force(particles, target, duration),
            ParticleForce::Control(g) => g.update_force(particles, target, duration),
            ParticleForce::PointGravity(g) => g.update_force(particles, target, duration),
            ParticleForce::Custom(g) => g.update_force(particles, target, duration),
        }
    }
}

/// Refers to a generator stored in a ParticleForceRegistry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticleForceId(pub PoolId);

/// Holds force generators and the particles they act on.
///
/// A generator may be registered against any number of particles and a
/// particle may have any number of generators.
#[derive(Default)]
pub struct ParticleForceRegistry {
    generators: Pool<ParticleForce>,
    registrations: Vec<(ParticleHandle, ParticleForceId)>,
}

impl ParticleForceRegistry {
    pub fn new() -> Self {
        ParticleForceRegistry::default()
    }

    /// Stores a generator, returning the id used to register it.
    pub fn insert_generator<G: Into<ParticleForce>>(&mut self, generator: G) -> ParticleForceId {
        ParticleForceId(self.generators.push(generator.into()))
    }

    /// Removes a generator along with every registration using it.
    pub fn remove_generator(&mut self, id: ParticleForceId) -> Option<ParticleForce> {
        self.registrations.retain(|&(_, g)| g != id);
        self.generators.remove(id.0)
    }

    pub fn generator(&self, id: ParticleForceId) -> Option<&ParticleForce> {
        self.generators.get(id.0)
    }

    pub fn generator_mut(&mut self, id: ParticleForceId) -> Option<&mut ParticleForce> {
        self.generators.get_mut(id.0)
    }

    pub fn add(&mut self, particle: ParticleHandle, generator: ParticleForceId) {
        self.registrations.push((particle, generator));
    }

    /// Stores `generator` and registers it against `particle` in one step.
    pub fn add_generator<G: Into<ParticleForce>>(
        &mut self,
        particle: ParticleHandle,
        generator: G,
    ) -> ParticleForceId {
        let id = self.insert_generator(generator);
        self.add(particle, id);
        id
    }

    /// Removes one matching registration. Returns false if none existed.
    pub fn remove(&mut self, particle: ParticleHandle, generator: ParticleForceId) -> bool {
        match self
            .registrations
            .iter()
            .position(|&r| r == (particle, generator))
        {
            Some(i) => {
                self.registrations.remove(i);
                true
            }
            None => false,
        }
    }

    /// Removes every registration. Stored generators are kept.
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
    pub fn update_forces(&self, particles: &mut ParticleSet, duration: Real) {
        for &(particle, id) in &self.registrations {
            if let Some(generator) = self.generators.get(id.0) {
                generator.update_force(particles, particle, duration);
            }
        }
    }
}
