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

//! Direct summation over reciprocal lattice vectors.

use crate::cell::{PeriodicBox, Shape};
use crate::{Contribution, Point, Snapshot, SolverParameters, COULOMB_PREFACTOR};
use itertools::iproduct;
use num::complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Reciprocal-space Ewald sum over the half space of k-vectors.
///
/// Since `|S(-k)| = |S(k)|` only one of each `±k` pair is visited and the result doubled:
///
/// E = k/V Σₖ (4π/k²) exp(-k²/4α²) |S(k)|²,  S(k) = Σᵢ qᵢ exp(i k·rᵢ)
///
/// The force on particle `i` follows from the sine and cosine parts of the structure factor,
///
/// Fᵢ = 2k/V Σₖ (4π/k²) exp(-k²/4α²) qᵢ k (Re S sin k·rᵢ - Im S cos k·rᵢ)
#[derive(Debug, Clone)]
pub struct EwaldReciprocal {
    alpha: f64,
    kmax: [usize; 3],
    volume: f64,
    /// Reciprocal lattice vectors including the factor 2π
    reciprocal: [Point; 3],
}

impl EwaldReciprocal {
    pub fn new(parameters: &SolverParameters, cell: &PeriodicBox) -> Self {
        Self {
            alpha: *parameters.alpha(),
            kmax: *parameters.kmax(),
            volume: cell.volume().unwrap_or(f64::INFINITY),
            reciprocal: cell.reciprocal_vectors().map(|v| v * (2.0 * PI)),
        }
    }

    /// Integer triples in the half space with `|nᵢ| < kmaxᵢ`, excluding zero
    pub fn half_space(&self) -> impl Iterator<Item = [i64; 3]> {
        let [kx, ky, kz] = self.kmax.map(|k| k as i64);
        iproduct!(0..kx, (1 - ky)..ky, (1 - kz)..kz)
            .filter(|&(n1, n2, n3)| n1 > 0 || n2 > 0 || (n2 == 0 && n3 > 0))
            .map(|(n1, n2, n3)| [n1, n2, n3])
    }

    /// Cartesian wave vector of an integer triple
    pub fn wave_vector(&self, n: [i64; 3]) -> Point {
        self.reciprocal[0] * n[0] as f64
            + self.reciprocal[1] * n[1] as f64
            + self.reciprocal[2] * n[2] as f64
    }

    /// `(4π/k²) exp(-k²/4α²)`
    fn damping(&self, k2: f64) -> f64 {
        4.0 * PI / k2 * (-k2 / (4.0 * self.alpha * self.alpha)).exp()
    }

    /// Apply the prefactors common to all k-vectors
    fn finish(&self, contribution: Contribution) -> Contribution {
        let energy_factor = COULOMB_PREFACTOR / self.volume;
        Contribution {
            energy: contribution.energy * energy_factor,
            forces: contribution
                .forces
                .into_iter()
                .map(|f| f * (2.0 * energy_factor))
                .collect(),
        }
    }

    /// Serial sum evaluating `sin(k·r)` and `cos(k·r)` for every k-vector and particle
    pub fn direct(&self, snapshot: &Snapshot) -> Contribution {
        let n = snapshot.len();
        let positions = snapshot.positions();
        let charges = snapshot.charges();
        let mut contribution = Contribution::zeros(n);
        let mut phases = vec![(0.0, 0.0); n];
        for triple in self.half_space() {
            let k = self.wave_vector(triple);
            let damping = self.damping(k.norm_squared());
            let (mut s_re, mut s_im) = (0.0, 0.0);
            for ((phase, position), charge) in phases.iter_mut().zip(positions).zip(charges) {
                *phase = k.dot(position).sin_cos();
                s_re += charge * phase.1;
                s_im += charge * phase.0;
            }
            contribution.energy += damping * (s_re * s_re + s_im * s_im);
            for ((force, (sin, cos)), charge) in
                contribution.forces.iter_mut().zip(&phases).zip(charges)
            {
                *force += k * (damping * charge * (s_re * sin - s_im * cos));
            }
        }
        self.finish(contribution)
    }

    /// Parallel sum over k-vectors using tabulated phase factors.
    ///
    /// With fractional coordinates `s`, `exp(i k·r) = Πₐ exp(2πi nₐ sₐ)` so only
    /// `N × (2 kmax - 1)` complex exponentials are evaluated per axis.
    pub fn tabulated(&self, snapshot: &Snapshot) -> Contribution {
        let n = snapshot.len();
        let charges = snapshot.charges();
        let cell = snapshot.cell();
        let fractional: Vec<Point> = snapshot
            .positions()
            .iter()
            .map(|p| cell.fractional(p))
            .collect();
        // tables[axis][particle][m + kmax - 1] = exp(2πi m s)
        let tables: Vec<Vec<Vec<Complex64>>> = (0..3)
            .map(|axis| {
                let kmax = self.kmax[axis] as i64;
                fractional
                    .par_iter()
                    .map(|s| {
                        ((1 - kmax)..kmax)
                            .map(|m| Complex64::from_polar(1.0, 2.0 * PI * m as f64 * s[axis]))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let offset = self.kmax.map(|k| k - 1);
        let triples: Vec<[i64; 3]> = self.half_space().collect();

        let contribution = triples
            .par_iter()
            .fold(
                || (Contribution::zeros(n), vec![Complex64::default(); n]),
                |(mut contribution, mut phases), triple| {
                    let index = [0, 1, 2].map(|a| (triple[a] + offset[a] as i64) as usize);
                    let mut structure_factor = Complex64::default();
                    for (i, phase) in phases.iter_mut().enumerate() {
                        *phase = tables[0][i][index[0]]
                            * tables[1][i][index[1]]
                            * tables[2][i][index[2]];
                        structure_factor += charges[i] * *phase;
                    }
                    let k = self.wave_vector(*triple);
                    let damping = self.damping(k.norm_squared());
                    contribution.energy += damping * structure_factor.norm_sqr();
                    for ((force, phase), charge) in
                        contribution.forces.iter_mut().zip(&phases).zip(charges)
                    {
                        *force += k * (damping * charge * (phase * structure_factor.conj()).im);
                    }
                    (contribution, phases)
                },
            )
            .map(|(contribution, _)| contribution)
            .reduce(|| Contribution::zeros(n), Contribution::merge);
        self.finish(contribution)
    }
}
