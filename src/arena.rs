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

use std::slice;

use tracing::warn;

use crate::error::*;

/// Fixed-capacity storage for the contacts generated during one frame.
///
/// Every slot is allocated up front and never reallocated. Claiming a slot
/// once the arena is full fails softly: the contact is dropped and a warning
/// is logged the first time it happens after a `reset`.
#[derive(Clone, Debug)]
pub struct ContactArena<C> {
    contacts: Vec<C>,
    used: usize,
    warned: bool,
}

impl<C: Clone + Default> ContactArena<C> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PhysicsError::ZeroCapacity);
        }
        Ok(ContactArena {
            contacts: vec![C::default(); capacity],
            used: 0,
            warned: false,
        })
    }

    /// Claims the next free slot, reset to its default value.
    pub fn next_slot(&mut self) -> Option<&mut C> {
        if self.is_full() {
            self.warn_full();
            return None;
        }
        let index = self.used;
        self.used += 1;
        let slot = &mut self.contacts[index];
        *slot = C::default();
        Some(slot)
    }

    /// Stores a contact. Returns false if the arena was already full.
    pub fn push(&mut self, contact: C) -> bool {
        match self.next_slot() {
            Some(slot) => {
                *slot = contact;
                true
            }
            None => false,
        }
    }
}

impl<C> ContactArena<C> {
    pub fn capacity(&self) -> usize {
        self.contacts.len()
    }

    /// Number of contacts written since the last reset.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn contacts_left(&self) -> usize {
        self.contacts.len() - self.used
    }

    pub fn is_full(&self) -> bool {
        self.used == self.contacts.len()
    }

    /// Forgets every contact. Slots are overwritten as they are claimed again.
    pub fn reset(&mut self) {
        self.used = 0;
        self.warned = false;
    }

    /// Drops every contact written after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        if len < self.used {
            self.used = len;
        }
    }

    pub fn as_slice(&self) -> &[C] {
        &self.contacts[..self.used]
    }

    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.contacts[..self.used]
    }

    pub fn iter(&self) -> slice::Iter<'_, C> {
        self.as_slice().iter()
    }

    fn warn_full(&mut self) {
        if !self.warned {
            warn!(capacity = self.contacts.len(), "contact arena exhausted, dropping contacts");
            self.warned = true;
        }
    }
}
