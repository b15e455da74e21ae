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

//! Links hold two particles together by generating contacts whenever the
//! distance between them breaks the link's constraint.

use cgmath::InnerSpace;
use serde::{Deserialize, Serialize};

use crate::arena::*;
use crate::core::*;
use crate::particle::*;
use crate::pcontacts::*;

/// Positions of both ends of a link, or None if either is gone.
fn link_ends(particles: &ParticleSet, ends: [ParticleHandle; 2]) -> Option<(Vec2, Vec2)> {
    let a = particles.get(ends[0])?.position;
    let b = particles.get(ends[1])?.position;
    Some((a, b))
}

/// A link that may go slack but never stretches past `max_length`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleCable {
    pub particles: [ParticleHandle; 2],
    pub max_length: Real,
    pub restitution: Real,
}

impl ParticleCable {
    pub fn new(a: ParticleHandle, b: ParticleHandle, max_length: Real, restitution: Real) -> Self {
        ParticleCable {
            particles: [a, b],
            max_length,
            restitution,
        }
    }
}

impl ParticleContactGenerator for ParticleCable {
    fn add_contact(&self, particles: &ParticleSet, contacts: &mut ContactArena<ParticleContact>) -> usize {
        let (a, b) = match link_ends(particles, self.particles) {
            Some(ends) => ends,
            None => return 0,
        };
        let length = (a - b).magnitude();
        if length < self.max_length {
            return 0;
        }
        // The first particle is pulled back toward the second.
        let normal = (b - a).unit();
        let contact = ParticleContact::new(
            self.particles[0],
            Some(self.particles[1]),
            self.restitution,
            normal,
            length - self.max_length,
        );
        contacts.push(contact) as usize
    }
}

/// A link that holds its two particles exactly `length` apart.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleRod {
    pub particles: [ParticleHandle; 2],
    pub length: Real,
}

impl ParticleRod {
    pub fn new(a: ParticleHandle, b: ParticleHandle, length: Real) -> Self {
        ParticleRod {
            particles: [a, b],
            length,
        }
    }
}

impl ParticleContactGenerator for ParticleRod {
    fn add_contact(&self, particles: &ParticleSet, contacts: &mut ContactArena<ParticleContact>) -> usize {
        let (a, b) = match link_ends(particles, self.particles) {
            Some(ends) => ends,
            None => return 0,
        };
        let current = (a - b).magnitude();
        if current == self.length {
            return 0;
        }
        let normal = (b - a).unit();
        let (normal, penetration) = if current > self.length {
            (normal, current - self.length)
        } else {
            (-normal, self.length - current)
        };
        let contact = ParticleContact::new(
            self.particles[0],
            Some(self.particles[1]),
            0.0,
            normal,
            penetration,
        );
        contacts.push(contact) as usize
    }
}
