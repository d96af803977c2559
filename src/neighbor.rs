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

//! Cell-list construction of real-space pair lists.

use crate::cell::BoundaryConditions;
use crate::Snapshot;
use itertools::iproduct;
use rayon::prelude::*;

/// Minimum number of cells along each axis for the cell list to pay off
const MIN_CELLS: usize = 3;

/// Unique pairs `(i, j)`, `i < j`, closer than a cutoff under the minimum image convention.
///
/// Excluded pairs are not included. Particles are binned in fractional coordinates into
/// cells that are at least one cutoff wide, measured perpendicular to the cell faces, so
/// neighbors are found among the 27 surrounding cells also for triclinic boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborList {
    pairs: Vec<(usize, usize)>,
    /// Number of cells along each axis; `None` if all pairs were tested
    cells: Option<[usize; 3]>,
}

impl NeighborList {
    /// Build the list for a snapshot; owned by the caller and not reused between snapshots
    pub fn build(snapshot: &Snapshot, cutoff: f64) -> Self {
        let widths = snapshot.cell().widths();
        let cells = [0, 1, 2].map(|i| (widths[i] / cutoff).floor() as usize);
        let n = snapshot.len();
        let cutoff_squared = cutoff * cutoff;
        let accept = |i: usize, j: usize| {
            let positions = snapshot.positions();
            !snapshot.exclusions().contains(i, j)
                && snapshot
                    .cell()
                    .distance_squared(&positions[i], &positions[j])
                    < cutoff_squared
        };

        if cells.iter().any(|&c| c < MIN_CELLS) {
            log::debug!(
                "too few cells ({:?}); testing all {} pairs",
                cells,
                n * n.saturating_sub(1) / 2
            );
            let pairs = (0..n)
                .into_par_iter()
                .flat_map_iter(|i| ((i + 1)..n).filter(move |&j| accept(i, j)).map(move |j| (i, j)))
                .collect();
            return Self { pairs, cells: None };
        }

        // bin particles and sort indices by cell
        let cell_index = |c: [usize; 3]| c[0] + cells[0] * (c[1] + cells[1] * c[2]);
        let cell_of: Vec<[usize; 3]> = snapshot
            .positions()
            .iter()
            .map(|p| {
                let s = snapshot.cell().wrapped_fractional(p);
                [0, 1, 2].map(|d| ((s[d] * cells[d] as f64) as usize).min(cells[d] - 1))
            })
            .collect();
        let num_cells = cells.iter().product::<usize>();
        let mut count = vec![0usize; num_cells];
        cell_of.iter().for_each(|c| count[cell_index(*c)] += 1);
        let mut start = vec![0usize; num_cells + 1];
        for c in 0..num_cells {
            start[c + 1] = start[c] + count[c];
        }
        let mut sorted: Vec<usize> = (0..n).collect();
        sorted.sort_by_key(|&i| cell_index(cell_of[i]));

        let pairs = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let home = cell_of[i];
                let mut neighbors: Vec<usize> = iproduct!(-1i64..=1, -1i64..=1, -1i64..=1)
                    .flat_map(|(dx, dy, dz)| {
                        let offset = [dx, dy, dz];
                        let index = cell_index([0, 1, 2].map(|d| {
                            (home[d] as i64 + offset[d]).rem_euclid(cells[d] as i64) as usize
                        }));
                        sorted[start[index]..start[index + 1]].iter().copied()
                    })
                    .filter(|&j| j > i && accept(i, j))
                    .collect();
                neighbors.sort_unstable();
                neighbors.into_iter().map(move |j| (i, j))
            })
            .collect();
        Self {
            pairs,
            cells: Some(cells),
        }
    }

    /// Pairs sorted by first, then second index
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Cell grid used for the construction, if any
    pub fn cells(&self) -> Option<[usize; 3]> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
