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

//! A 2D rigid body and particle physics engine.
//!
//! # Overview
//!
//! Two independent simulations are provided, each driven one frame at a time:
//!
//! - `ParticleWorld`: point masses moved by force generators and held
//!   together by particle contacts (cables, rods, ground planes).
//! - `World`: rigid bodies with orientation, moved by force generators,
//!   colliding through spheres, boxes and planes, and constrained by joints.
//!
//! A frame applies every registered force, integrates, fills a fixed size
//! contact arena and then resolves the contacts iteratively. Rigid body
//! contacts are resolved in two passes: penetration first, then relative
//! velocity.
//!
//! # Handles
//!
//! Bodies, particles, colliders and force generators live in generational
//! pools and are referred to by handle. A handle to a removed item goes
//! stale; generators and detectors holding one simply skip their work.
//!
//! # Errors
//!
//! Only setup can fail, with a `PhysicsError`. Stepping a world never
//! returns an error.

pub extern crate cgmath;

mod arena;
pub use arena::*;

mod body;
pub use body::*;

mod bounds;
pub use bounds::*;

mod bvh;
pub use bvh::*;

mod collision;
pub use collision::*;

mod config;
pub use config::*;

mod contact;
pub use contact::*;

mod core;
pub use crate::core::*;

mod error;
pub use error::*;

mod fgen;
pub use fgen::*;

mod geom;
pub use geom::*;

mod joints;
pub use joints::*;

mod particle;
pub use particle::*;

mod pcontacts;
pub use pcontacts::*;

mod pfgen;
pub use pfgen::*;

mod plinks;
pub use plinks::*;

mod pool;
pub use pool::*;

mod pworld;
pub use pworld::*;

mod solver;
pub use solver::*;

mod world;
pub use world::*;
