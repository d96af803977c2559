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

//! # Data parallel platform
//!
//! Uses `rayon` to evaluate real space and reciprocal space concurrently. Real space
//! visits pairs from a cell list, the Ewald sum multiplies tabulated phase factors and
//! is split over k-vectors, and PME spreads onto per-thread grids.

use super::{check_parameters, Method, Platform, Snapshot};
use crate::assemble::assemble;
use crate::correction::{exclusion_correction, net_charge_correction, self_energy};
use crate::neighbor::NeighborList;
use crate::realspace::RealSpaceEwald;
use crate::reciprocal::{EwaldReciprocal, ParticleMesh};
use crate::{Contribution, EwaldError, Evaluation, SolverParameters, COULOMB_PREFACTOR};
use rayon::prelude::*;

/// Multi-threaded CPU platform
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelPlatform;

impl ParallelPlatform {
    /// Real-space sum over a neighbor list, accumulated per thread and then reduced
    fn real_space(
        snapshot: &Snapshot,
        scheme: &RealSpaceEwald,
        list: &NeighborList,
    ) -> Contribution {
        let n = snapshot.len();
        list.pairs()
            .par_iter()
            .fold(
                || Contribution::zeros(n),
                |mut contribution, &(i, j)| {
                    if let Some((energy, force)) = scheme.pair(snapshot, i, j) {
                        contribution.energy += energy;
                        contribution.forces[i] += force;
                        contribution.forces[j] -= force;
                    }
                    contribution
                },
            )
            .reduce(|| Contribution::zeros(n), Contribution::merge)
            .scaled(COULOMB_PREFACTOR)
    }
}

impl Platform for ParallelPlatform {
    fn name(&self) -> &str {
        "parallel"
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        parameters: &SolverParameters,
        method: Method,
    ) -> Result<Evaluation, EwaldError> {
        snapshot.validate()?;
        check_parameters(snapshot, parameters, method)?;
        let alpha = *parameters.alpha();
        let scheme = RealSpaceEwald::new(*parameters.cutoff(), alpha);

        let (real_space, reciprocal) = rayon::join(
            || {
                let list = NeighborList::build(snapshot, *parameters.cutoff());
                log::trace!("{} pairs within the cutoff", list.len());
                Self::real_space(snapshot, &scheme, &list)
            },
            || match method {
                Method::Ewald => {
                    EwaldReciprocal::new(parameters, snapshot.cell()).tabulated(snapshot)
                }
                Method::Pme => {
                    let mesh = ParticleMesh::new(parameters, snapshot.cell());
                    let mut workspace = mesh.workspace();
                    mesh.compute_parallel(snapshot, &mut workspace)
                }
            },
        );
        Ok(assemble(
            real_space,
            reciprocal,
            self_energy(snapshot.charges(), alpha),
            exclusion_correction(snapshot, alpha),
            net_charge_correction(snapshot, alpha),
        ))
    }
}
