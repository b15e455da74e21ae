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

use std::cmp;

use smallvec::SmallVec;

use crate::bounds::*;
use crate::core::Real;
use crate::pool::*;

/// A Bounding Volume Hierarchy.
///
/// Leaves are addressed by the PoolId returned from `insert`. Ids stay valid
/// across other inserts and removals; a removed leaf's id goes stale.
#[derive(Clone)]
pub struct BVH<B: Bound, V> {
    root: Option<PoolId>,
    num_leaves: usize,
    pool: Pool<BVHNode<B, V>>,
}

#[derive(Clone)]
struct BVHNode<B, V> {
    height: i32,
    parent: Option<PoolId>,
    bounds: B,
    node_type: BVHNodeType<V>,
}

#[derive(Clone)]
enum BVHNodeType<V> {
    Leaf(V),
    Parent(PoolId, PoolId),
}

impl<B: Bound, V> Default for BVH<B, V> {
    fn default() -> Self {
        BVH::new()
    }
}

impl<B: Bound, V> BVH<B, V> {
    pub fn new() -> Self {
        BVH {
            root: None,
            num_leaves: 0,
            pool: Pool::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        BVH {
            root: None,
            num_leaves: 0,
            pool: Pool::with_capacity(cap),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of bounds inserted into the BVH.
    pub fn len(&self) -> usize {
        self.num_leaves
    }

    /// Returns the id of the root node.
    pub fn root(&self) -> Option<PoolId> {
        self.root
    }

    /// Height of the tree. A lone leaf has height zero.
    pub fn height(&self) -> i32 {
        self.root.map_or(0, |root| self.pool[root].height)
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.num_leaves = 0;
        self.pool = Pool::new();
    }

    /// Returns the value stored at a leaf.
    pub fn get(&self, leaf: PoolId) -> Option<&V> {
        match self.pool.get(leaf) {
            Some(&BVHNode {
                node_type: BVHNodeType::Leaf(ref val),
                ..
            }) => Some(val),
            _ => None,
        }
    }

    /// Returns the bounds of any node.
    pub fn bounds(&self, id: PoolId) -> Option<&B> {
        self.pool.get(id).map(|node| &node.bounds)
    }

    /// Inserts an item into the BVH, rebalancing if necessary. All IDs returned
    /// prior to insert remain valid afterward.
    pub fn insert(&mut self, bounds: B, val: V) -> PoolId {
        self.num_leaves += 1;
        let leaf = self.pool.push(BVHNode {
            height: 0,
            parent: None,
            bounds,
            node_type: BVHNodeType::Leaf(val),
        });
        let mut best = match self.root {
            Some(root) => root,
            None => {
                self.root = Some(leaf);
                return leaf;
            }
        };

        while let BVHNodeType::Parent(child1, child2) = self.pool[best].node_type {
            let curr_bounds = self.pool[best].bounds;
            let cost = curr_bounds.cost();
            let combined_cost = B::combine(&curr_bounds, &bounds).cost();
            let no_descent_cost = combined_cost * 2.0;
            let inheritance_cost = (combined_cost - cost) * 2.0;

            let child_cost = |child: PoolId| {
                let node = &self.pool[child];
                let new_cost = B::combine(&bounds, &node.bounds).cost();
                match node.node_type {
                    BVHNodeType::Parent(_, _) => new_cost - node.bounds.cost() + inheritance_cost,
                    BVHNodeType::Leaf(_) => new_cost + inheritance_cost,
                }
            };
            let child1_cost = child_cost(child1);
            let child2_cost = child_cost(child2);

            if no_descent_cost < child1_cost && no_descent_cost < child2_cost {
                break;
            }
            best = if child1_cost < child2_cost { child1 } else { child2 };
        }

        // The new leaf and the chosen node become siblings under a new parent.
        let old_parent = self.pool[best].parent;
        let best_bounds = self.pool[best].bounds;
        let best_height = self.pool[best].height;
        let new_parent = self.pool.push(BVHNode {
            height: best_height + 1,
            parent: old_parent,
            bounds: B::combine(&bounds, &best_bounds),
            node_type: BVHNodeType::Parent(best, leaf),
        });
        match old_parent {
            Some(parent) => self.replace_child(parent, best, new_parent),
            None => self.root = Some(new_parent),
        }
        self.pool[best].parent = Some(new_parent);
        self.pool[leaf].parent = Some(new_parent);

        self.refit(Some(new_parent));
        leaf
    }

    /// Removes a leaf node from the BVH and returns its value. Stale ids and
    /// ids of interior nodes are ignored.
    pub fn remove(&mut self, leaf: PoolId) -> Option<V> {
        match self.pool.get(leaf) {
            Some(&BVHNode {
                node_type: BVHNodeType::Leaf(_),
                ..
            }) => (),
            _ => return None,
        }
        let node = self.pool.remove(leaf)?;
        self.num_leaves -= 1;
        let val = match node.node_type {
            BVHNodeType::Leaf(val) => val,
            BVHNodeType::Parent(_, _) => return None,
        };

        let parent = match node.parent {
            Some(parent) => parent,
            None => {
                self.root = None;
                return Some(val);
            }
        };
        let sibling = match self.pool[parent].node_type {
            BVHNodeType::Parent(child1, child2) => {
                if child1 == leaf {
                    child2
                } else {
                    child1
                }
            }
            BVHNodeType::Leaf(_) => return Some(val),
        };
        let grand_parent = self.pool[parent].parent;
        self.pool.remove(parent);
        self.pool[sibling].parent = grand_parent;
        match grand_parent {
            Some(grand_parent) => {
                self.replace_child(grand_parent, parent, sibling);
                self.refit(Some(grand_parent));
            }
            None => self.root = Some(sibling),
        }
        Some(val)
    }

    /// Moves a leaf to new bounds. The leaf is only reinserted, with `bounds`
    /// extended by `margin`, when its stored bounds no longer contain
    /// `bounds`. Returns the leaf's id, which changes on reinsertion.
    pub fn update(&mut self, leaf: PoolId, bounds: B, margin: Real) -> Option<PoolId> {
        if self.pool.get(leaf)?.bounds.contains(&bounds) {
            return Some(leaf);
        }
        let val = self.remove(leaf)?;
        Some(self.insert(bounds + margin, val))
    }

    /// Calls `callback` with every leaf whose bounds overlap `bounds`. Returns
    /// true if any leaf was visited.
    pub fn query<F: FnMut(PoolId, &V)>(&self, bounds: &B, mut callback: F) -> bool {
        let root = match self.root {
            Some(root) => root,
            None => return false,
        };
        // A balanced tree deeper than 64 would hold more leaves than a Vec can.
        let mut stack = SmallVec::<[PoolId; 64]>::new();
        stack.push(root);
        let mut collided = false;
        while let Some(top) = stack.pop() {
            let node = &self.pool[top];
            if !node.bounds.overlaps(bounds) {
                continue;
            }
            match node.node_type {
                BVHNodeType::Leaf(ref val) => {
                    collided = true;
                    callback(top, val);
                }
                BVHNodeType::Parent(lchild, rchild) => {
                    stack.push(lchild);
                    stack.push(rchild);
                }
            }
        }
        collided
    }

    /// Every pair of leaves with overlapping bounds, each pair reported once.
    pub fn potential_contacts(&self) -> Vec<(V, V)>
    where
        V: Clone,
    {
        let mut pairs = Vec::new();
        for (id, node) in self.pool.iter_ids() {
            if let BVHNodeType::Leaf(ref val) = node.node_type {
                self.query(&node.bounds, |other, other_val| {
                    if other > id {
                        pairs.push((val.clone(), other_val.clone()));
                    }
                });
            }
        }
        pairs
    }

    fn replace_child(&mut self, parent: PoolId, old: PoolId, new: PoolId) {
        if let BVHNodeType::Parent(child1, child2) = self.pool[parent].node_type {
            self.pool[parent].node_type = if child1 == old {
                BVHNodeType::Parent(new, child2)
            } else {
                BVHNodeType::Parent(child1, new)
            };
        }
    }

    /// Recomputes the bounds and height of a parent from its children.
    fn fit(&mut self, i: PoolId) {
        if let BVHNodeType::Parent(child1, child2) = self.pool[i].node_type {
            self.pool[i].bounds = B::combine(&self.pool[child1].bounds, &self.pool[child2].bounds);
            self.pool[i].height = 1 + cmp::max(self.pool[child1].height, self.pool[child2].height);
        }
    }

    /// Walk up the tree fixing the heights and bounds.
    fn refit(&mut self, from: Option<PoolId>) {
        let mut i = from;
        while let Some(node) = i {
            let node = self.balance(node);
            self.fit(node);
            i = self.pool[node].parent;
        }
    }

    fn balance(&mut self, a: PoolId) -> PoolId {
        if self.pool[a].height < 2 {
            return a;
        }
        let (b, c) = match self.pool[a].node_type {
            BVHNodeType::Parent(b, c) => (b, c),
            BVHNodeType::Leaf(_) => return a,
        };
        let balance = self.pool[c].height - self.pool[b].height;
        if balance > 1 {
            self.rotate_up(a, c, b)
        } else if balance < -1 {
            self.rotate_up(a, b, c)
        } else {
            a
        }
    }

    /// Promotes `pivot`, the taller child of `a`, into a's place. `other` is
    /// a's remaining child. The pivot keeps its taller child and hands the
    /// shorter one to `a`.
    fn rotate_up(&mut self, a: PoolId, pivot: PoolId, other: PoolId) -> PoolId {
        let (f, g) = match self.pool[pivot].node_type {
            BVHNodeType::Parent(f, g) => (f, g),
            BVHNodeType::Leaf(_) => return a,
        };

        let parent = self.pool[a].parent;
        self.pool[pivot].parent = parent;
        self.pool[a].parent = Some(pivot);
        match parent {
            Some(parent) => self.replace_child(parent, a, pivot),
            None => self.root = Some(pivot),
        }

        let (keep, give) = if self.pool[f].height > self.pool[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.pool[pivot].node_type = BVHNodeType::Parent(a, keep);
        self.pool[a].node_type = BVHNodeType::Parent(other, give);
        self.pool[give].parent = Some(a);
        self.fit(a);
        self.fit(pivot);
        pivot
    }
}

#[cfg(test)]
mod tests {
    mod bvh {
        use cgmath::Vector2;

        use crate::bounds::*;
        use crate::bvh::BVH;
        use crate::core::*;

        fn circle(x: Real, y: Real, r: Real) -> BoundingCircle {
            BoundingCircle { c: Vector2::new(x, y), r }
        }

        #[test]
        fn test_bvh() {
            let circle_a = circle(0.0, 5.0, 1.0);
            let circle_b = circle(0.0, 8.0, 1.0);
            let circle_c = circle(3.0, 0.0, 1.0);

            let mut bvh: BVH<BoundingCircle, usize> = BVH::new();
            bvh.insert(circle_a, 1);
            bvh.insert(circle_b, 2);
            bvh.insert(circle_c, 3);
            assert_eq!(bvh.len(), 3);

            assert!(bvh.query(&circle_a, |_, &id| assert_eq!(id, 1)));
            assert!(bvh.query(&circle_b, |_, &id| assert_eq!(id, 2)));
            assert!(bvh.query(&circle_c, |_, &id| assert_eq!(id, 3)));
            assert!(!bvh.query(&circle(-10.0, -10.0, 1.0), |_, _| {}));
        }

        #[test]
        fn test_remove() {
            let mut bvh: BVH<BoundingCircle, &str> = BVH::new();
            let a = bvh.insert(circle(0.0, 0.0, 1.0), "a");
            let b = bvh.insert(circle(10.0, 0.0, 1.0), "b");
            let c = bvh.insert(circle(20.0, 0.0, 1.0), "c");

            assert_eq!(bvh.remove(b), Some("b"));
            assert_eq!(bvh.remove(b), None);
            assert_eq!(bvh.len(), 2);
            assert!(!bvh.query(&circle(10.0, 0.0, 1.0), |_, _| {}));
            assert_eq!(bvh.get(a), Some(&"a"));
            assert_eq!(bvh.get(c), Some(&"c"));

            // Interior nodes are not leaves.
            let root = bvh.root().unwrap();
            assert_eq!(bvh.remove(root), None);

            bvh.remove(a);
            bvh.remove(c);
            assert!(bvh.is_empty());
            assert_eq!(bvh.len(), 0);
        }

        #[test]
        fn test_balanced() {
            let mut bvh: BVH<BoundingCircle, usize> = BVH::new();
            for i in 0..64 {
                bvh.insert(circle(i as Real * 3.0, 0.0, 1.0), i);
            }
            assert_eq!(bvh.len(), 64);
            assert!(bvh.height() <= 16);
            for i in 0..64 {
                let mut found = Vec::new();
                bvh.query(&circle(i as Real * 3.0, 0.0, 0.5), |_, &v| found.push(v));
                assert_eq!(found, vec![i]);
            }
        }

        #[test]
        fn test_potential_contacts() {
            let mut bvh: BVH<BoundingCircle, usize> = BVH::new();
            bvh.insert(circle(0.0, 0.0, 1.0), 0);
            bvh.insert(circle(1.5, 0.0, 1.0), 1);
            bvh.insert(circle(3.0, 0.0, 1.0), 2);
            bvh.insert(circle(30.0, 0.0, 1.0), 3);

            let mut pairs: Vec<(usize, usize)> = bvh
                .potential_contacts()
                .into_iter()
                .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
                .collect();
            pairs.sort();
            assert_eq!(pairs, vec![(0, 1), (1, 2)]);
        }

        #[test]
        fn test_update() {
            let mut bvh: BVH<BoundingCircle, usize> = BVH::new();
            let a = bvh.insert(circle(0.0, 0.0, 1.0) + 0.5f32, 0);
            bvh.insert(circle(10.0, 0.0, 1.0), 1);

            assert_eq!(bvh.update(a, circle(0.2, 0.0, 1.0), 0.5), Some(a));

            let moved = bvh.update(a, circle(5.0, 0.0, 1.0), 0.5).unwrap();
            assert_ne!(moved, a);
            assert_eq!(bvh.get(moved), Some(&0));
            assert_eq!(bvh.bounds(moved), Some(&circle(5.0, 0.0, 1.5)));
            assert_eq!(bvh.len(), 2);
            assert!(bvh.query(&circle(5.0, 0.0, 0.1), |_, &v| assert_eq!(v, 0)));
        }
    }
}
