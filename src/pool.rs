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

use std::mem;
use std::slice;
use std::iter::FilterMap;
use std::ops::{Index, IndexMut};
use std::vec::Vec;

use serde::{Deserialize, Serialize};

/// A generation-checked index into a Pool.
///
/// Removing an item bumps the generation of its slot, so an id handed out
/// before the removal never aliases whatever is pushed into the slot later.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId {
    pub index: usize,
    pub generation: u32,
}

/// Internal storage type used by Pool.
#[derive(Clone)]
pub enum PoolEntry<T> {
    FreeListEnd {
        generation: u32,
    },
    FreeListPtr {
        next_free: usize,
        generation: u32,
    },
    Occupied {
        item: T,
        generation: u32,
    },
}

impl<T> PoolEntry<T> {
    fn generation(&self) -> u32 {
        match *self {
            PoolEntry::FreeListEnd { generation } => generation,
            PoolEntry::FreeListPtr { generation, .. } => generation,
            PoolEntry::Occupied { generation, .. } => generation,
        }
    }
}

/// Growable array type that allows items to be removed and inserted without
/// changing the ids of other entries.
#[derive(Clone)]
pub struct Pool<T> {
    len: usize,
    free_list: Option<usize>,
    entries: Vec<PoolEntry<T>>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool::new()
    }
}

impl<T> Pool<T> {
    /// Create an empty Pool.
    pub fn new() -> Self {
        Pool {
            len: 0,
            free_list: None,
            entries: Vec::new(),
        }
    }

    /// Create an empty Pool large enough to fit cap items.
    pub fn with_capacity(cap: usize) -> Self {
        Pool {
            len: 0,
            free_list: None,
            entries: Vec::with_capacity(cap),
        }
    }

    /// Determines if the Pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Push a new item to the Pool. Attempts to use spots left empty from
    /// removed items before performing a heap allocation.
    pub fn push(&mut self, item: T) -> PoolId {
        self.len += 1;
        if let Some(free_item) = self.free_list {
            let generation = self.entries[free_item].generation();
            self.free_list = match self.entries[free_item] {
                PoolEntry::FreeListEnd { .. } => None,
                PoolEntry::FreeListPtr { next_free, .. } => Some(next_free),
                PoolEntry::Occupied { .. } => unreachable!(),
            };
            self.entries[free_item] = PoolEntry::Occupied { item, generation };
            PoolId { index: free_item, generation }
        } else {
            let index = self.entries.len();
            self.entries.push(PoolEntry::Occupied { item, generation: 0 });
            PoolId { index, generation: 0 }
        }
    }

    /// Marks a slot as empty and adds it to the free list, allowing the spot
    /// to be reclaimed later. Returns None if the id is stale.
    pub fn remove(&mut self, id: PoolId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let generation = id.generation.wrapping_add(1);
        let new_entry = if let Some(next_free) = self.free_list {
            PoolEntry::FreeListPtr { next_free, generation }
        } else {
            PoolEntry::FreeListEnd { generation }
        };
        self.free_list = Some(id.index);
        match mem::replace(&mut self.entries[id.index], new_entry) {
            PoolEntry::Occupied { item, .. } => {
                self.len -= 1;
                Some(item)
            }
            _ => unreachable!(),
        }
    }

    /// Returns true if the id refers to a live item.
    pub fn contains(&self, id: PoolId) -> bool {
        match self.entries.get(id.index) {
            Some(&PoolEntry::Occupied { generation, .. }) => generation == id.generation,
            _ => false,
        }
    }

    pub fn get(&self, id: PoolId) -> Option<&T> {
        match self.entries.get(id.index) {
            Some(&PoolEntry::Occupied { ref item, generation }) if generation == id.generation => {
                Some(item)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut T> {
        match self.entries.get_mut(id.index) {
            Some(&mut PoolEntry::Occupied { ref mut item, generation })
                if generation == id.generation =>
            {
                Some(item)
            }
            _ => None,
        }
    }

    /// Returns the slot that the next push will occupy if one was freed.
    pub fn next_free(&self) -> Option<usize> {
        self.free_list
    }

    /// Iterates over live items paired with their ids, in slot order.
    pub fn iter_ids<'a>(&'a self) -> impl Iterator<Item = (PoolId, &'a T)> + 'a {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match *entry {
                PoolEntry::Occupied { ref item, generation } => {
                    Some((PoolId { index, generation }, item))
                }
                _ => None,
            })
    }

    pub fn iter_ids_mut<'a>(&'a mut self) -> impl Iterator<Item = (PoolId, &'a mut T)> + 'a {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(index, entry)| match *entry {
                PoolEntry::Occupied { ref mut item, generation } => {
                    Some((PoolId { index, generation }, item))
                }
                _ => None,
            })
    }

    /// Returns the ids of every live item, in slot order.
    pub fn ids(&self) -> Vec<PoolId> {
        self.iter_ids().map(|(id, _)| id).collect()
    }

    pub fn iter<'a>(&'a self) -> FilterMap<slice::Iter<'a, PoolEntry<T>>, fn(&PoolEntry<T>) -> Option<&T>> {
        self.into_iter()
    }

    pub fn iter_mut<'a>(&'a mut self) -> FilterMap<slice::IterMut<'a, PoolEntry<T>>, fn(&mut PoolEntry<T>) -> Option<&mut T>> {
        self.into_iter()
    }
}

impl<T> Index<PoolId> for Pool<T> {
    type Output = T;

    fn index(&self, id: PoolId) -> &T {
        match self.get(id) {
            Some(item) => item,
            None => panic!("pool id {:?} is stale or unoccupied", id),
        }
    }
}

impl<T> IndexMut<PoolId> for Pool<T> {
    fn index_mut(&mut self, id: PoolId) -> &mut T {
        match self.get_mut(id) {
            Some(item) => item,
            None => panic!("pool id {:?} is stale or unoccupied", id),
        }
    }
}

#[inline(always)]
fn filter_pool<'a, T>(entry: &'a PoolEntry<T>) -> Option<&'a T> {
    if let PoolEntry::Occupied { ref item, .. } = *entry {
        Some(item)
    } else {
        None
    }
}

impl<'a, T> IntoIterator for &'a Pool<T> {
    type Item = &'a T;
    type IntoIter = FilterMap<slice::Iter<'a, PoolEntry<T>>, fn(&PoolEntry<T>) -> Option<&T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().filter_map(filter_pool)
    }
}

#[inline(always)]
fn filter_pool_mut<'a, T>(entry: &'a mut PoolEntry<T>) -> Option<&'a mut T> {
    if let PoolEntry::Occupied { ref mut item, .. } = *entry {
        Some(item)
    } else {
        None
    }
}

impl<'a, T> IntoIterator for &'a mut Pool<T> {
    type Item = &'a mut T;
    type IntoIter = FilterMap<slice::IterMut<'a, PoolEntry<T>>, fn(&mut PoolEntry<T>) -> Option<&mut T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter_mut().filter_map(filter_pool_mut)
    }
}
