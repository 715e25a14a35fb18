// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! A growable dense bit set indexed by newtyped ids, used as the bit-set
//! backend of points-to sets.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

const BITS: usize = u64::BITS as usize;

/// Represents some newtyped `usize` wrapper.
///
/// Purpose: avoid mixing indexes for different bitvector domains.
pub trait Idx: Copy + 'static + Eq + PartialEq + Debug + Hash {
    fn new(idx: usize) -> Self;

    fn index(self) -> usize;
}

impl Idx for usize {
    #[inline]
    fn new(idx: usize) -> Self {
        idx
    }
    #[inline]
    fn index(self) -> usize {
        self
    }
}

impl Idx for u32 {
    #[inline]
    fn new(idx: usize) -> Self {
        assert!(idx <= u32::MAX as usize);
        idx as u32
    }
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Splits an element into the index of its block and its bit in the block.
#[inline]
fn locate<T: Idx>(elem: T) -> (usize, u64) {
    let i = elem.index();
    (i / BITS, 1u64 << (i % BITS))
}

#[derive(Eq, PartialEq, Hash)]
pub struct BitVec<T> {
    blocks: Vec<u64>,
    marker: PhantomData<T>,
}

impl<T: Idx> BitVec<T> {
    pub fn new_empty() -> BitVec<T> {
        BitVec {
            blocks: Vec::new(),
            marker: PhantomData,
        }
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    #[inline]
    pub fn contains(&self, elem: T) -> bool {
        let (block, bit) = locate(elem);
        self.blocks.get(block).map_or(false, |b| b & bit != 0)
    }

    /// Is `self` is a (non-strict) superset of `other`?
    pub fn superset(&self, other: &BitVec<T>) -> bool {
        other
            .blocks
            .iter()
            .enumerate()
            .all(|(i, theirs)| self.blocks.get(i).map_or(0, |ours| *ours) & theirs == *theirs)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| *b == 0)
    }

    /// Insert `elem`. Returns whether the set has changed.
    #[inline]
    pub fn insert(&mut self, elem: T) -> bool {
        let (block, bit) = locate(elem);
        if self.blocks.len() <= block {
            self.blocks.resize(block + 1, 0);
        }
        let old = self.blocks[block];
        self.blocks[block] = old | bit;
        old & bit == 0
    }

    pub fn remove(&mut self, elem: T) -> bool {
        let (block, bit) = locate(elem);
        match self.blocks.get_mut(block) {
            Some(b) if *b & bit != 0 => {
                *b &= !bit;
                true
            }
            _ => false,
        }
    }

    /// Iterates over the set elements in ascending order.
    pub fn iter(&self) -> BitIter<'_, T> {
        BitIter {
            blocks: &self.blocks,
            next_block: 0,
            current: 0,
            base: 0,
            marker: PhantomData,
        }
    }

    /// Adds every element of `other`. Returns whether the set has changed.
    pub fn union(&mut self, other: &BitVec<T>) -> bool {
        if self.blocks.len() < other.blocks.len() {
            self.blocks.resize(other.blocks.len(), 0);
        }
        let mut changed = false;
        for (ours, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            let merged = *ours | theirs;
            changed |= merged != *ours;
            *ours = merged;
        }
        changed
    }

    /// Removes every element of `other`. Returns whether the set has changed.
    pub fn subtract(&mut self, other: &BitVec<T>) -> bool {
        let mut changed = false;
        for (ours, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            let kept = *ours & !theirs;
            changed |= kept != *ours;
            *ours = kept;
        }
        changed
    }
}

impl<T> Clone for BitVec<T> {
    fn clone(&self) -> Self {
        BitVec {
            blocks: self.blocks.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Idx> Debug for BitVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct BitIter<'a, T: Idx> {
    blocks: &'a [u64],
    next_block: usize,
    /// Bits of the current block not yet yielded.
    current: u64,
    /// Index of the first bit of the current block.
    base: usize,
    marker: PhantomData<T>,
}

impl<'a, T: Idx> Iterator for BitIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while self.current == 0 {
            self.current = *self.blocks.get(self.next_block)?;
            self.base = self.next_block * BITS;
            self.next_block += 1;
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(T::new(self.base + bit))
    }
}

#[cfg(test)]
mod test {
    use super::BitVec;

    #[test]
    fn insert_remove_across_words() {
        let mut bv = BitVec::<usize>::new_empty();
        assert!(bv.insert(3));
        assert!(bv.insert(130));
        assert!(!bv.insert(3));
        assert_eq!(bv.count(), 2);
        assert_eq!(bv.iter().collect::<Vec<_>>(), vec![3, 130]);
        assert!(bv.remove(130));
        assert!(!bv.remove(500));
        assert!(!bv.contains(130));
    }

    #[test]
    fn superset_with_different_lengths() {
        let mut small = BitVec::<usize>::new_empty();
        small.insert(1);
        let mut large = BitVec::<usize>::new_empty();
        large.insert(1);
        large.insert(200);
        assert!(large.superset(&small));
        assert!(!small.superset(&large));
        assert!(small.union(&large));
        assert!(!small.union(&large));
        assert!(small.superset(&large));
        assert!(small.subtract(&large));
        assert!(small.is_empty());
    }
}
