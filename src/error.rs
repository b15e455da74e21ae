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

use thiserror::Error;

use crate::core::Real;

/// Errors reported while setting up a simulation.
///
/// Nothing on the per-frame path returns these. Once a scene is built, a step
/// either completes or degrades (dropped contacts, skipped impulses), it never
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PhysicsError {
    #[error("inverse mass must be non-negative, got {0}")]
    NegativeInverseMass(Real),

    #[error("inverse moment of inertia must be non-negative, got {0}")]
    NegativeInverseMoment(Real),

    #[error("damping must lie in [0, 1], got {0}")]
    DampingOutOfRange(Real),

    #[error("sleep epsilon must be finite and non-negative, got {0}")]
    InvalidSleepEpsilon(Real),

    #[error("contact arena capacity must be at least one")]
    ZeroCapacity,

    #[error("handle refers to a removed or reused slot")]
    StaleHandle,
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

pub(crate) fn check_inverse_mass(inverse_mass: Real) -> Result<()> {
    if inverse_mass >= 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::NegativeInverseMass(inverse_mass))
    }
}

pub(crate) fn check_damping(damping: Real) -> Result<()> {
    if (0.0..=1.0).contains(&damping) {
        Ok(())
    } else {
        Err(PhysicsError::DampingOutOfRange(damping))
    }
}
