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

//! # Reference platform
//!
//! Serial evaluation that favors simplicity over speed: all pairs are visited in real
//! space, the Ewald sum evaluates trigonometric functions for every k-vector and particle,
//! and PME spreads and gathers on a single thread.

use super::{check_parameters, Method, Platform, Snapshot};
use crate::assemble::assemble;
use crate::correction::{exclusion_correction, net_charge_correction, self_energy};
use crate::realspace::{all_pairs, RealSpaceEwald};
use crate::reciprocal::{EwaldReciprocal, ParticleMesh};
use crate::{EwaldError, Evaluation, SolverParameters};

/// Default platform running serially on the CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencePlatform;

impl Platform for ReferencePlatform {
    fn name(&self) -> &str {
        "reference"
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
        log::trace!("{} on {} particles", scheme, snapshot.len());

        let real_space = all_pairs(snapshot, &scheme);
        let reciprocal = match method {
            Method::Ewald => EwaldReciprocal::new(parameters, snapshot.cell()).direct(snapshot),
            Method::Pme => {
                let mesh = ParticleMesh::new(parameters, snapshot.cell());
                let mut workspace = mesh.workspace();
                mesh.compute(snapshot, &mut workspace)
            }
        };
        Ok(assemble(
            real_space,
            reciprocal,
            self_energy(snapshot.charges(), alpha),
            exclusion_correction(snapshot, alpha),
            net_charge_correction(snapshot, alpha),
        ))
    }
}
