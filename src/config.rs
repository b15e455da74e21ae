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

use crate::core::Real;
use crate::error::*;

/// How many resolver iterations a world runs per frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Iterations {
    /// Twice the number of contacts generated this frame.
    Auto,
    Fixed(usize),
}

impl Default for Iterations {
    fn default() -> Self {
        Iterations::Auto
    }
}

impl Iterations {
    /// Iteration budget for a frame that generated `contacts` contacts.
    pub fn for_contacts(self, contacts: usize) -> usize {
        match self {
            Iterations::Auto => contacts * 2,
            Iterations::Fixed(n) => n,
        }
    }
}

impl From<usize> for Iterations {
    /// Zero selects `Auto`.
    fn from(n: usize) -> Self {
        if n == 0 {
            Iterations::Auto
        } else {
            Iterations::Fixed(n)
        }
    }
}

/// Settings for a rigid body World.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Size of the contact arena. Default: 1024.
    pub max_contacts: usize,
    /// Velocity and position iterations per frame. Default: Auto.
    pub iterations: Iterations,
    /// Desired velocity changes below this are ignored. Default: 0.
    pub velocity_epsilon: Real,
    /// Penetrations below this are ignored. Default: 0.
    pub position_epsilon: Real,
    /// Friction written into detected contacts. Default: 0.5.
    pub friction: Real,
    /// Restitution written into detected contacts. Default: 0.4.
    pub restitution: Real,
    /// Bodies whose recent motion drops below this fall asleep. Default: 0,
    /// which keeps bodies awake.
    pub sleep_epsilon: Real,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            max_contacts: 1024,
            iterations: Iterations::Auto,
            velocity_epsilon: 0.0,
            position_epsilon: 0.0,
            friction: 0.5,
            restitution: 0.4,
            sleep_epsilon: 0.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_contacts == 0 {
            return Err(PhysicsError::ZeroCapacity);
        }
        check_sleep_epsilon(self.sleep_epsilon)
    }
}

pub(crate) fn check_sleep_epsilon(sleep_epsilon: Real) -> Result<()> {
    if sleep_epsilon.is_finite() && sleep_epsilon >= 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidSleepEpsilon(sleep_epsilon))
    }
}

/// Settings for a ParticleWorld.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleWorldConfig {
    /// Size of the contact arena. Default: 256.
    pub max_contacts: usize,
    /// Resolver iterations per frame. Default: Auto.
    pub iterations: Iterations,
}

impl Default for ParticleWorldConfig {
    fn default() -> Self {
        ParticleWorldConfig {
            max_contacts: 256,
            iterations: Iterations::Auto,
        }
    }
}

impl ParticleWorldConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_contacts == 0 {
            Err(PhysicsError::ZeroCapacity)
        } else {
            Ok(())
        }
    }
}
