// Copyright 2026 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Pairs of particles that must not interact via Coulomb's law.
//!
//! Typical exclusions are bonded neighbors within a molecule. The real-space sum skips
//! these pairs while the reciprocal-space sum cannot avoid them, so their reciprocal
//! contribution is removed explicitly, see [`crate::correction`].

use crate::EwaldError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unordered_pair::UnorderedPair;

/// Set of unordered particle index pairs.
///
/// Pairs are stored with the smaller index first and iterate in ascending order,
/// which keeps accumulation order, and hence rounding, reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[usize; 2]>", into = "Vec<[usize; 2]>")]
pub struct ExclusionSet(BTreeSet<(usize, usize)>);

impl ExclusionSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from index pairs. Self pairs are rejected, duplicates are collapsed.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, EwaldError> {
        let mut exclusions = Self::new();
        for (i, j) in pairs {
            exclusions.insert(UnorderedPair(i, j))?;
        }
        Ok(exclusions)
    }

    /// Add a pair; returns `false` if it was already present.
    pub fn insert(&mut self, pair: UnorderedPair<usize>) -> Result<bool, EwaldError> {
        let (i, j) = pair.into_ordered_tuple();
        if i == j {
            return Err(EwaldError::SelfExclusion(i));
        }
        Ok(self.0.insert((i, j)))
    }

    /// Check if the pair `(i, j)` is excluded. The order of `i` and `j` is irrelevant.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.0.contains(&(i.min(j), i.max(j)))
    }

    /// Iterate over excluded pairs, `(i, j)` with `i < j`
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().copied()
    }

    /// Number of excluded pairs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no exclusions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Make sure all indices refer to one of `num_particles` particles
    pub fn validate(&self, num_particles: usize) -> Result<(), EwaldError> {
        match self.iter().find(|&(_, j)| j >= num_particles) {
            Some((i, j)) => Err(EwaldError::InvalidExclusion(i, j, num_particles)),
            None => Ok(()),
        }
    }
}

impl TryFrom<Vec<[usize; 2]>> for ExclusionSet {
    type Error = EwaldError;
    fn try_from(pairs: Vec<[usize; 2]>) -> Result<Self, Self::Error> {
        Self::from_pairs(pairs.into_iter().map(|[i, j]| (i, j)))
    }
}

impl From<ExclusionSet> for Vec<[usize; 2]> {
    fn from(exclusions: ExclusionSet) -> Self {
        exclusions.iter().map(|(i, j)| [i, j]).collect()
    }
}
