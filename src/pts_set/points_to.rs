// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Points-to set representations.
//!
//! The analysis keeps the concrete representation swappable at runtime: a dense
//! bit vector (fast unions over compact node ids) or a hash set (cheap for very
//! sparse sets over a large id space). Both are wrapped by `PtsCollection`.

use std::collections::hash_set;
use std::collections::HashSet;
use std::fmt;
use std::iter::Copied;

use serde::{Deserialize, Serialize};

use crate::util::bit_vec::{BitIter, BitVec, Idx};

pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn clear(&mut self);
    fn count(&self) -> usize;
    fn contains(&self, elem: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    fn insert(&mut self, elem: T) -> bool;
    fn remove(&mut self, elem: T) -> bool;
    fn union(&mut self, other: &Self) -> bool;
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter<'a>(&'a self) -> Self::Iter<'a>;
}

/// The representation selected for every points-to set of one analysis run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PtsCollectionType {
    BitVec,
    HashSet,
}

impl Default for PtsCollectionType {
    fn default() -> Self {
        PtsCollectionType::BitVec
    }
}

impl PtsCollectionType {
    /// Creates an empty set of this representation.
    pub fn new_set<T: Idx>(self) -> PtsCollection<T> {
        match self {
            PtsCollectionType::BitVec => PtsCollection::BitVec(BitVecPointsToSet::default()),
            PtsCollectionType::HashSet => PtsCollection::HashSet(HashPointsToSet::default()),
        }
    }
}

#[derive(Clone)]
pub struct BitVecPointsToSet<T> {
    bits: BitVec<T>,
}

impl<T: Idx> Default for BitVecPointsToSet<T> {
    fn default() -> Self {
        BitVecPointsToSet { bits: BitVec::new_empty() }
    }
}

impl<T: Idx> PointsToSet<T> for BitVecPointsToSet<T> {
    type Iter<'a> = BitIter<'a, T>;

    fn clear(&mut self) {
        self.bits.clear();
    }

    fn count(&self) -> usize {
        self.bits.count()
    }

    fn contains(&self, elem: T) -> bool {
        self.bits.contains(elem)
    }

    fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    fn superset(&self, other: &Self) -> bool {
        self.bits.superset(&other.bits)
    }

    fn insert(&mut self, elem: T) -> bool {
        self.bits.insert(elem)
    }

    fn remove(&mut self, elem: T) -> bool {
        self.bits.remove(elem)
    }

    fn union(&mut self, other: &Self) -> bool {
        self.bits.union(&other.bits)
    }

    fn subtract(&mut self, other: &Self) -> bool {
        self.bits.subtract(&other.bits)
    }

    fn iter(&self) -> BitIter<'_, T> {
        self.bits.iter()
    }
}

#[derive(Clone)]
pub struct HashPointsToSet<T> {
    set: HashSet<T>,
}

impl<T: Idx> Default for HashPointsToSet<T> {
    fn default() -> Self {
        HashPointsToSet { set: HashSet::new() }
    }
}

impl<T: Idx> PointsToSet<T> for HashPointsToSet<T> {
    type Iter<'a> = Copied<hash_set::Iter<'a, T>>;

    fn clear(&mut self) {
        self.set.clear();
    }

    fn count(&self) -> usize {
        self.set.len()
    }

    fn contains(&self, elem: T) -> bool {
        self.set.contains(&elem)
    }

    fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    fn superset(&self, other: &Self) -> bool {
        self.set.is_superset(&other.set)
    }

    fn insert(&mut self, elem: T) -> bool {
        self.set.insert(elem)
    }

    fn remove(&mut self, elem: T) -> bool {
        self.set.remove(&elem)
    }

    fn union(&mut self, other: &Self) -> bool {
        let old_len = self.set.len();
        self.set.extend(other.set.iter().copied());
        self.set.len() != old_len
    }

    fn subtract(&mut self, other: &Self) -> bool {
        let old_len = self.set.len();
        self.set.retain(|e| !other.set.contains(e));
        self.set.len() != old_len
    }

    fn iter(&self) -> Copied<hash_set::Iter<'_, T>> {
        self.set.iter().copied()
    }
}

/// A points-to set whose representation is chosen by `PtsCollectionType`.
#[derive(Clone)]
pub enum PtsCollection<T> {
    BitVec(BitVecPointsToSet<T>),
    HashSet(HashPointsToSet<T>),
}

impl<T: Idx> fmt::Debug for PtsCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub enum PtsIter<'a, T: Idx> {
    BitVec(BitIter<'a, T>),
    HashSet(Copied<hash_set::Iter<'a, T>>),
}

impl<'a, T: Idx> Iterator for PtsIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            PtsIter::BitVec(iter) => iter.next(),
            PtsIter::HashSet(iter) => iter.next(),
        }
    }
}

impl<'a, T: Idx> IntoIterator for &'a PtsCollection<T> {
    type Item = T;
    type IntoIter = PtsIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Idx> PtsCollection<T> {
    pub fn collection_type(&self) -> PtsCollectionType {
        match self {
            PtsCollection::BitVec(_) => PtsCollectionType::BitVec,
            PtsCollection::HashSet(_) => PtsCollectionType::HashSet,
        }
    }

    /// Returns an empty set with the same representation.
    pub fn new_empty_like(&self) -> Self {
        self.collection_type().new_set()
    }
}

impl<T: Idx> PointsToSet<T> for PtsCollection<T> {
    type Iter<'a> = PtsIter<'a, T>;

    fn clear(&mut self) {
        match self {
            PtsCollection::BitVec(s) => s.clear(),
            PtsCollection::HashSet(s) => s.clear(),
        }
    }

    fn count(&self) -> usize {
        match self {
            PtsCollection::BitVec(s) => s.count(),
            PtsCollection::HashSet(s) => s.count(),
        }
    }

    fn contains(&self, elem: T) -> bool {
        match self {
            PtsCollection::BitVec(s) => s.contains(elem),
            PtsCollection::HashSet(s) => s.contains(elem),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            PtsCollection::BitVec(s) => s.is_empty(),
            PtsCollection::HashSet(s) => s.is_empty(),
        }
    }

    fn superset(&self, other: &Self) -> bool {
        match (self, other) {
            (PtsCollection::BitVec(a), PtsCollection::BitVec(b)) => a.superset(b),
            (PtsCollection::HashSet(a), PtsCollection::HashSet(b)) => a.superset(b),
            _ => other.iter().all(|elem| self.contains(elem)),
        }
    }

    fn insert(&mut self, elem: T) -> bool {
        match self {
            PtsCollection::BitVec(s) => s.insert(elem),
            PtsCollection::HashSet(s) => s.insert(elem),
        }
    }

    fn remove(&mut self, elem: T) -> bool {
        match self {
            PtsCollection::BitVec(s) => s.remove(elem),
            PtsCollection::HashSet(s) => s.remove(elem),
        }
    }

    fn union(&mut self, other: &Self) -> bool {
        match (self, other) {
            (PtsCollection::BitVec(a), PtsCollection::BitVec(b)) => a.union(b),
            (PtsCollection::HashSet(a), PtsCollection::HashSet(b)) => a.union(b),
            (this, _) => {
                let mut changed = false;
                for elem in other.iter() {
                    changed |= this.insert(elem);
                }
                changed
            }
        }
    }

    fn subtract(&mut self, other: &Self) -> bool {
        match (self, other) {
            (PtsCollection::BitVec(a), PtsCollection::BitVec(b)) => a.subtract(b),
            (PtsCollection::HashSet(a), PtsCollection::HashSet(b)) => a.subtract(b),
            (this, _) => {
                let mut changed = false;
                for elem in other.iter() {
                    changed |= this.remove(elem);
                }
                changed
            }
        }
    }

    fn iter(&self) -> PtsIter<'_, T> {
        match self {
            PtsCollection::BitVec(s) => PtsIter::BitVec(s.iter()),
            PtsCollection::HashSet(s) => PtsIter::HashSet(s.iter()),
        }
    }
}
