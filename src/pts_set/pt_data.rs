// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use super::points_to::{PointsToSet, PtsCollection, PtsCollectionType};
use crate::util::bit_vec::Idx;

/// Diff points-to data.
///
/// The points-to information of a key is split into the part that has already
/// been propagated along its outgoing edges and the newly added part that has
/// not. Propagation only pushes the diff part, then flushes it into the
/// propagated part.
pub struct DiffPTData<K, D> {
    /// Diff points-to to be propagated.
    pub(crate) diff_pts_map: HashMap<K, PtsCollection<D>>,
    /// Points-to already propagated.
    pub(crate) propa_pts_map: HashMap<K, PtsCollection<D>>,
    collection_type: PtsCollectionType,
}

impl<K, D> fmt::Debug for DiffPTData<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "DiffPTData".fmt(f)
    }
}

impl<K, D> DiffPTData<K, D>
where
    K: Hash + Eq + Copy,
    D: Idx,
{
    pub fn new(collection_type: PtsCollectionType) -> DiffPTData<K, D> {
        DiffPTData {
            diff_pts_map: HashMap::new(),
            propa_pts_map: HashMap::new(),
            collection_type,
        }
    }

    #[inline]
    pub fn collection_type(&self) -> PtsCollectionType {
        self.collection_type
    }

    /// Creates an empty set of the configured representation.
    #[inline]
    pub fn new_set(&self) -> PtsCollection<D> {
        self.collection_type.new_set()
    }

    /// Adds element to the points-to set associated with var.
    /// Returns false if elem is already in this set.
    pub fn add_pts(&mut self, var: K, elem: D) -> bool {
        if let Some(propa) = self.propa_pts_map.get(&var) {
            if propa.contains(elem) {
                return false;
            }
        }
        let collection_type = self.collection_type;
        let diff = self
            .diff_pts_map
            .entry(var)
            .or_insert_with(|| collection_type.new_set());
        diff.insert(elem)
    }

    /// diff_pts(dst_var) = diff_pts(dst_var) U (diff_pts(src_var) - propa_pts(dst_var)).
    pub fn union_diff_pts(&mut self, dst_var: K, src_var: K) -> bool {
        if dst_var == src_var {
            return false;
        }
        match self.diff_pts_map.get(&src_var) {
            Some(diff) => {
                let src_ds = diff.clone();
                self.union_pts_to(dst_var, &src_ds)
            }
            None => false,
        }
    }

    /// diff_pts(dst_var) = diff_pts(dst_var) U (pts(src_var) - propa_pts(dst_var)).
    pub fn union_pts(&mut self, dst_var: K, src_var: K) -> bool {
        if dst_var == src_var {
            return false;
        }
        let src_ds = self.get_pts(src_var);
        self.union_pts_to(dst_var, &src_ds)
    }

    /// Performs diff_pts(dst_var) = diff_pts(dst_var) U (src_ds - propa_pts(dst_var)).
    pub fn union_pts_to(&mut self, dst_var: K, src_ds: &PtsCollection<D>) -> bool {
        let mut new = src_ds.clone();
        if let Some(propa) = self.propa_pts_map.get(&dst_var) {
            new.subtract(propa);
        }
        if new.is_empty() {
            return false;
        }
        let collection_type = self.collection_type;
        let diff = self
            .diff_pts_map
            .entry(dst_var)
            .or_insert_with(|| collection_type.new_set());
        diff.union(&new)
    }

    #[inline]
    pub fn get_diff_pts(&self, var: K) -> Option<&PtsCollection<D>> {
        self.diff_pts_map.get(&var)
    }

    #[inline]
    pub fn get_propa_pts(&self, var: K) -> Option<&PtsCollection<D>> {
        self.propa_pts_map.get(&var)
    }

    /// Returns the full points-to set (propagated and pending) of `var`.
    pub fn get_pts(&self, var: K) -> PtsCollection<D> {
        let mut pts = self.new_set();
        if let Some(propa) = self.propa_pts_map.get(&var) {
            pts.union(propa);
        }
        if let Some(diff) = self.diff_pts_map.get(&var) {
            pts.union(diff);
        }
        pts
    }

    /// Returns true if `var` has pending elements that were not propagated yet.
    pub fn has_diff(&self, var: K) -> bool {
        self.diff_pts_map.get(&var).map_or(false, |diff| !diff.is_empty())
    }

    /// Sets all diff elems to propa elems.
    pub fn flush(&mut self, var: K) {
        let Some(diff) = self.diff_pts_map.get_mut(&var) else {
            return;
        };
        let collection_type = self.collection_type;
        let propa = self
            .propa_pts_map
            .entry(var)
            .or_insert_with(|| collection_type.new_set());
        propa.union(diff);
        diff.clear();
    }

    /// Iterates over all keys that own a non-empty points-to set.
    pub fn keys(&self) -> HashSet<K> {
        self.propa_pts_map
            .iter()
            .chain(self.diff_pts_map.iter())
            .filter(|(_, pts)| !pts.is_empty())
            .map(|(k, _)| *k)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::DiffPTData;
    use crate::pts_set::points_to::{PointsToSet, PtsCollectionType};

    #[test]
    fn diff_is_flushed_into_propagated() {
        let mut data = DiffPTData::<u32, u32>::new(PtsCollectionType::BitVec);
        assert!(data.add_pts(1, 10));
        assert!(data.has_diff(1));
        data.flush(1);
        assert!(!data.has_diff(1));
        assert!(!data.add_pts(1, 10));
        assert!(data.get_propa_pts(1).unwrap().contains(10));
    }

    #[test]
    fn union_only_moves_unpropagated_elements() {
        let mut data = DiffPTData::<u32, u32>::new(PtsCollectionType::HashSet);
        data.add_pts(1, 10);
        data.add_pts(1, 11);
        data.add_pts(2, 10);
        data.flush(2);
        assert!(data.union_pts(2, 1));
        let diff = data.get_diff_pts(2).unwrap();
        assert_eq!(diff.count(), 1);
        assert!(diff.contains(11));
        assert!(!data.union_pts(2, 1));
        assert_eq!(data.get_pts(2).count(), 2);
    }
}
