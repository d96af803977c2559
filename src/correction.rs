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

//! # Correction terms
//!
//! The reciprocal-space sum includes the interaction of each Gaussian charge cloud with
//! itself as well as the full interaction between excluded pairs. Both are removed here.
//! A system with a net charge is implicitly neutralised by a uniform background charge
//! and the energy of that background is returned as a separate term.

use crate::cell::{BoundaryConditions, Shape};
use crate::{Contribution, Snapshot, COULOMB_PREFACTOR, SQRT_PI};
use statrs::function::erf::erf;

/// Net charges below this magnitude are considered neutral
const NEUTRALITY_THRESHOLD: f64 = 1e-8;

/// Self-energy, `-k α/√π Σ qᵢ²`
pub fn self_energy(charges: &[f64], alpha: f64) -> f64 {
    -COULOMB_PREFACTOR * alpha / SQRT_PI * charges.iter().map(|q| q * q).sum::<f64>()
}

/// Remove the reciprocal-space interaction, `k qᵢqⱼ erf(αr)/r`, of every excluded pair.
///
/// The separation is the minimum image, as in the real-space sum.
/// Coinciding particles contribute the `r → 0` limit, `-k qᵢqⱼ 2α/√π`, and no force.
pub fn exclusion_correction(snapshot: &Snapshot, alpha: f64) -> Contribution {
    let mut contribution = Contribution::zeros(snapshot.len());
    let positions = snapshot.positions();
    let charges = snapshot.charges();
    for (i, j) in snapshot.exclusions().iter() {
        let charge_product = charges[i] * charges[j];
        let delta = snapshot.cell().distance(&positions[i], &positions[j]);
        let distance = delta.norm();
        if alpha * distance < 1e-8 {
            contribution.energy -= charge_product * 2.0 * alpha / SQRT_PI;
            continue;
        }
        let erf_term = erf(alpha * distance);
        let gaussian = 2.0 * alpha * distance / SQRT_PI * (-(alpha * distance).powi(2)).exp();
        contribution.energy -= charge_product * erf_term / distance;
        let force = delta * (charge_product * (gaussian - erf_term) / distance.powi(3));
        contribution.forces[i] += force;
        contribution.forces[j] -= force;
    }
    contribution.scaled(COULOMB_PREFACTOR)
}

/// Energy of the uniform background that neutralises a net charge, `-k π Q² / (2Vα²)`.
///
/// The background is uniform and hence exerts no force.
pub fn net_charge_correction(snapshot: &Snapshot, alpha: f64) -> f64 {
    let net_charge = snapshot.net_charge();
    if net_charge.abs() < NEUTRALITY_THRESHOLD {
        return 0.0;
    }
    let volume = snapshot.cell().volume().unwrap_or(f64::INFINITY);
    let energy = -COULOMB_PREFACTOR * std::f64::consts::PI * net_charge.powi(2)
        / (2.0 * volume * alpha.powi(2));
    log::warn!(
        "system has a net charge of {:.4}e; neutralising background contributes {:.6} kJ/mol",
        net_charge,
        energy
    );
    energy
}
