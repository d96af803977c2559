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

//! # Real-space part of the Ewald sum
//!
//! Pairs within the cutoff interact via the screened Coulomb potential,
//! `u(r) = q₁q₂ erfc(αr) / r`. Excluded pairs are skipped; their reciprocal-space
//! interaction is removed in [`crate::correction`].

use crate::cell::BoundaryConditions;
use crate::{Contribution, Cutoff, Point, Snapshot, COULOMB_PREFACTOR, SQRT_PI};
use statrs::function::erf::erfc;

/// Scheme for real-space Ewald interactions
///
/// The short-ranged function is written in terms of the reduced distance, `q = r / r✂`,
/// and the reduced splitting parameter, `η = α r✂`, so that `u(r) = q₁q₂ S(q) / r` with
/// `S(q) = erfc(ηq)`.
///
/// Further information, see original article by _P.P. Ewald_, <https://doi.org/fcjts8>.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RealSpaceEwald {
    /// Real space cutoff distance, 𝑟✂︎
    cutoff: f64,
    /// Splitting parameter, 𝛼
    alpha: f64,
    /// Reduced alpha, 𝜂 = 𝛼 × 𝑟✂︎ (dimensionless)
    eta: f64,
}

impl core::fmt::Display for RealSpaceEwald {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Real-space Ewald: 𝑟✂ = {:.3}, 𝛼 = {:.4}, 𝜂 = {:.3}",
            self.cutoff, self.alpha, self.eta,
        )
    }
}

impl RealSpaceEwald {
    /// Construct a new Ewald scheme with given cutoff and alpha.
    pub fn new(cutoff: f64, alpha: f64) -> Self {
        Self {
            cutoff,
            alpha,
            eta: alpha * cutoff,
        }
    }

    /// Short-ranged function, `S(q) = erfc(ηq)`
    #[inline]
    pub fn short_range_f0(&self, q: f64) -> f64 {
        erfc(self.eta * q)
    }

    /// First derivative of the short-ranged function with respect to `q`
    #[inline]
    pub fn short_range_f1(&self, q: f64) -> f64 {
        -2.0 * self.eta / SQRT_PI * f64::exp(-(self.eta * q).powi(2))
    }

    /// Pair energy, `q₁q₂ erfc(αr) / r`, without the Coulomb prefactor
    #[inline]
    pub fn energy(&self, charge_product: f64, distance: f64) -> f64 {
        charge_product / distance * self.short_range_f0(distance / self.cutoff)
    }

    /// Magnitude of the pair force divided by the distance, without the Coulomb prefactor.
    ///
    /// Multiply by the distance vector `rᵢ - rⱼ` to get the force on particle `i`.
    /// Both terms are positive so there is no cancellation as `erfc` vanishes near the cutoff.
    #[inline]
    pub fn force_over_r(&self, charge_product: f64, distance: f64) -> f64 {
        let q = distance / self.cutoff;
        charge_product / distance.powi(3) * (self.short_range_f0(q) - q * self.short_range_f1(q))
    }

    /// Energy and force on particle `i` for the pair `(i, j)`, or `None` if beyond the cutoff
    #[inline]
    pub fn pair(&self, snapshot: &Snapshot, i: usize, j: usize) -> Option<(f64, Point)> {
        let positions = snapshot.positions();
        let delta = snapshot.cell().distance(&positions[i], &positions[j]);
        let distance_squared = delta.norm_squared();
        if distance_squared >= self.cutoff_squared() {
            return None;
        }
        let distance = distance_squared.sqrt();
        let charge_product = snapshot.charges()[i] * snapshot.charges()[j];
        Some((
            self.energy(charge_product, distance),
            delta * self.force_over_r(charge_product, distance),
        ))
    }
}

impl Cutoff for RealSpaceEwald {
    #[inline]
    fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

/// Serial real-space sum over all unique, non-excluded pairs
pub fn all_pairs(snapshot: &Snapshot, scheme: &RealSpaceEwald) -> Contribution {
    let n = snapshot.len();
    let mut contribution = Contribution::zeros(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if snapshot.exclusions().contains(i, j) {
                continue;
            }
            if let Some((energy, force)) = scheme.pair(snapshot, i, j) {
                contribution.energy += energy;
                contribution.forces[i] += force;
                contribution.forces[j] -= force;
            }
        }
    }
    contribution.scaled(COULOMB_PREFACTOR)
}
