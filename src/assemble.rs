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

//! Combination of real-space, reciprocal-space and correction terms.

use crate::Point;
use serde::{Deserialize, Serialize};

/// Energy and per-particle forces from one part of the Ewald sum
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contribution {
    /// Energy in kJ/mol
    pub energy: f64,
    /// Forces in kJ/mol/nm, one per particle
    pub forces: Vec<Point>,
}

impl Contribution {
    /// Zero energy and zero forces on `num_particles` particles
    pub fn zeros(num_particles: usize) -> Self {
        Self {
            energy: 0.0,
            forces: vec![Point::zeros(); num_particles],
        }
    }

    /// Multiply energy and forces by a constant, e.g. the Coulomb prefactor
    pub fn scaled(mut self, factor: f64) -> Self {
        self.energy *= factor;
        self.forces.iter_mut().for_each(|f| *f *= factor);
        self
    }

    /// Element-wise sum of two contributions on the same particles
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.forces.len(), other.forces.len());
        self.energy += other.energy;
        self.forces
            .iter_mut()
            .zip(other.forces)
            .for_each(|(a, b)| *a += b);
        self
    }
}

/// Energy terms of the Ewald sum, all in kJ/mol
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyTerms {
    /// erfc-screened pair sum within the cutoff
    pub real_space: f64,
    /// Reciprocal-space sum, Ewald or PME
    pub reciprocal: f64,
    /// Self-interaction of each Gaussian charge cloud
    pub self_energy: f64,
    /// Removal of the reciprocal interaction between excluded pairs
    pub exclusion: f64,
    /// Interaction with the uniform neutralising background; zero for neutral systems
    pub net_charge: f64,
}

impl EnergyTerms {
    /// Named terms in a fixed order
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("real_space", self.real_space),
            ("reciprocal", self.reciprocal),
            ("self_energy", self.self_energy),
            ("exclusion", self.exclusion),
            ("net_charge", self.net_charge),
        ]
    }

    /// Sum of all terms, added in order of increasing magnitude
    pub fn total(&self) -> f64 {
        let mut terms = self.named().map(|(_, energy)| energy);
        terms.sort_by(|a, b| a.abs().total_cmp(&b.abs()));
        terms.iter().sum()
    }
}

/// Result of a complete force and energy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Total force on each particle (kJ/mol/nm)
    pub forces: Vec<Point>,
    /// Total energy (kJ/mol)
    pub energy: f64,
    /// Breakdown of the energy
    pub terms: EnergyTerms,
}

impl Evaluation {
    /// Norm of the 3N dimensional force vector
    pub fn force_norm(&self) -> f64 {
        self.forces
            .iter()
            .map(|f| f.norm_squared())
            .sum::<f64>()
            .sqrt()
    }
}

/// Sum the parts of the Ewald sum into forces and energy.
///
/// Forces are summed per particle; the net charge term carries no force.
pub fn assemble(
    real_space: Contribution,
    reciprocal: Contribution,
    self_energy: f64,
    exclusion: Contribution,
    net_charge: f64,
) -> Evaluation {
    let terms = EnergyTerms {
        real_space: real_space.energy,
        reciprocal: reciprocal.energy,
        self_energy,
        exclusion: exclusion.energy,
        net_charge,
    };
    let forces = real_space
        .forces
        .iter()
        .zip(&reciprocal.forces)
        .zip(&exclusion.forces)
        .map(|((a, b), c)| a + b + c)
        .collect();
    let energy = terms.total();
    log::debug!(
        "energy terms (kJ/mol): {}",
        terms
            .named()
            .iter()
            .map(|(name, energy)| format!("{name} = {energy:.6}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Evaluation {
        forces,
        energy,
        terms,
    }
}
