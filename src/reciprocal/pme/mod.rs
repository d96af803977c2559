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

//! # Smooth particle-mesh Ewald
//!
//! The reciprocal-space sum is evaluated on a regular grid in four stages:
//!
//! 1. charges are spread onto the grid with cardinal B-splines ([`bspline`]),
//! 2. the grid is Fourier transformed and multiplied by the influence function,
//! 3. an inverse transform gives the reciprocal-space potential on the grid,
//! 4. forces are interpolated back with the derivatives of the same splines.
//!
//! Using the same weights for spreading and gathering makes the forces the exact
//! gradient of the grid energy.
//!
//! Further information, see _Essmann et al._, <https://doi.org/10.1063/1.470117>.

pub mod bspline;
mod grid;

use crate::cell::{PeriodicBox, Shape};
use crate::{Contribution, Point, Snapshot, SolverParameters, COULOMB_PREFACTOR};
use bspline::BSpline;
pub use grid::{Direction, PmeWorkspace};
use itertools::iproduct;
use ndarray::Array3;
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Grid points and spline weights of one particle along each axis
#[derive(Debug, Clone)]
struct Stencil {
    points: [Vec<usize>; 3],
    weights: [Vec<f64>; 3],
    derivatives: [Vec<f64>; 3],
}

impl Stencil {
    /// Iterate over all `order³` grid points with their weight
    fn iter_weights(&self) -> impl Iterator<Item = ((usize, usize, usize), f64)> + '_ {
        let order = self.points[0].len();
        iproduct!(0..order, 0..order, 0..order).map(move |(a, b, c)| {
            (
                (self.points[0][a], self.points[1][b], self.points[2][c]),
                self.weights[0][a] * self.weights[1][b] * self.weights[2][c],
            )
        })
    }
}

/// Particle-mesh Ewald solver for one set of solver parameters and one cell
#[derive(Debug, Clone)]
pub struct ParticleMesh {
    alpha: f64,
    dims: [usize; 3],
    spline: BSpline,
    /// Squared spline moduli along each axis
    moduli: [Vec<f64>; 3],
    cell: PeriodicBox,
}

impl ParticleMesh {
    pub fn new(parameters: &SolverParameters, cell: &PeriodicBox) -> Self {
        let spline = BSpline::new(*parameters.pme_order());
        let dims = *parameters.grid();
        Self {
            alpha: *parameters.alpha(),
            dims,
            spline,
            moduli: dims.map(|n| spline.moduli(n)),
            cell: cell.clone(),
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Allocate a workspace matching the grid of this solver
    pub fn workspace(&self) -> PmeWorkspace {
        PmeWorkspace::new(self.dims)
    }

    fn stencil(&self, position: &Point) -> Stencil {
        let fractional = self.cell.wrapped_fractional(position);
        let mut points: [Vec<usize>; 3] = Default::default();
        let mut weights: [Vec<f64>; 3] = Default::default();
        let mut derivatives: [Vec<f64>; 3] = Default::default();
        for axis in 0..3 {
            let n = self.dims[axis];
            let u = fractional[axis] * n as f64;
            let base = u.floor();
            let (w, dw) = self.spline.weights(u - base);
            let base = base as usize % n;
            points[axis] = (0..self.spline.order())
                .map(|j| (base + n * self.spline.order() - j) % n)
                .collect();
            weights[axis] = w;
            derivatives[axis] = dw;
        }
        Stencil {
            points,
            weights,
            derivatives,
        }
    }

    /// Influence function on the grid, zero at the origin
    fn influence(&self) -> Array3<f64> {
        let volume = self.cell.volume().unwrap_or(f64::INFINITY);
        let [ra, rb, rc] = self.cell.reciprocal_vectors();
        let signed = |index: usize, n: usize| {
            if index < (n + 1) / 2 {
                index as f64
            } else {
                index as f64 - n as f64
            }
        };
        let factor = COULOMB_PREFACTOR / (PI * volume);
        let [nx, ny, nz] = self.dims;
        Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
            if i == 0 && j == 0 && k == 0 {
                return 0.0;
            }
            let m = ra * signed(i, nx) + rb * signed(j, ny) + rc * signed(k, nz);
            let m2 = m.norm_squared();
            let moduli = self.moduli[0][i] * self.moduli[1][j] * self.moduli[2][k];
            factor * (-PI * PI * m2 / (self.alpha * self.alpha)).exp() / (m2 * moduli)
        })
    }

    /// Transform the charge grid, apply the influence function and transform back.
    ///
    /// Returns the energy; afterwards the real part of the grid holds the potential.
    fn convolve(&self, workspace: &mut PmeWorkspace) -> f64 {
        workspace.transform(Direction::Forward);
        let influence = self.influence();
        let mut energy = 0.0;
        workspace
            .grid_mut()
            .zip_mut_with(&influence, |z, &eterm| {
                energy += eterm * z.norm_sqr();
                *z *= eterm;
            });
        workspace.transform(Direction::Inverse);
        0.5 * energy
    }

    /// Force on a particle from the grid potential
    fn gather(&self, stencil: &Stencil, charge: f64, potential: &Array3<Complex64>) -> Point {
        let [ra, rb, rc] = self.cell.reciprocal_vectors();
        let order = self.spline.order();
        let mut gradient = [0.0; 3];
        for (a, b, c) in iproduct!(0..order, 0..order, 0..order) {
            let phi =
                potential[(stencil.points[0][a], stencil.points[1][b], stencil.points[2][c])].re;
            let (wa, wb, wc) = (
                stencil.weights[0][a],
                stencil.weights[1][b],
                stencil.weights[2][c],
            );
            gradient[0] += stencil.derivatives[0][a] * wb * wc * phi;
            gradient[1] += wa * stencil.derivatives[1][b] * wc * phi;
            gradient[2] += wa * wb * stencil.derivatives[2][c] * phi;
        }
        // chain rule from grid to Cartesian coordinates: ∂u/∂r = K b*
        let [nx, ny, nz] = self.dims.map(|n| n as f64);
        -charge * (ra * (nx * gradient[0]) + rb * (ny * gradient[1]) + rc * (nz * gradient[2]))
    }

    /// Serial reciprocal-space energy and forces
    pub fn compute(&self, snapshot: &Snapshot, workspace: &mut PmeWorkspace) -> Contribution {
        let stencils: Vec<Stencil> = snapshot
            .positions()
            .iter()
            .map(|p| self.stencil(p))
            .collect();
        workspace.grid_mut().fill(Complex64::default());
        for (stencil, charge) in stencils.iter().zip(snapshot.charges()) {
            for (point, weight) in stencil.iter_weights() {
                workspace.grid_mut()[point].re += charge * weight;
            }
        }
        let energy = self.convolve(workspace);
        let forces = stencils
            .iter()
            .zip(snapshot.charges())
            .map(|(stencil, charge)| self.gather(stencil, *charge, workspace.grid()))
            .collect();
        Contribution { energy, forces }
    }

    /// Reciprocal-space energy and forces with parallel spreading and gathering.
    ///
    /// Each thread spreads onto its own grid and the grids are summed before the transform.
    pub fn compute_parallel(
        &self,
        snapshot: &Snapshot,
        workspace: &mut PmeWorkspace,
    ) -> Contribution {
        let stencils: Vec<Stencil> = snapshot
            .positions()
            .par_iter()
            .map(|p| self.stencil(p))
            .collect();
        let [nx, ny, nz] = self.dims;
        let charge_grid = stencils
            .par_iter()
            .zip(snapshot.charges().par_iter())
            .fold(
                || Array3::<f64>::zeros((nx, ny, nz)),
                |mut grid, (stencil, charge)| {
                    for (point, weight) in stencil.iter_weights() {
                        grid[point] += charge * weight;
                    }
                    grid
                },
            )
            .reduce(
                || Array3::<f64>::zeros((nx, ny, nz)),
                |mut a, b| {
                    a += &b;
                    a
                },
            );
        workspace.load_real(&charge_grid);
        let energy = self.convolve(workspace);
        let potential = workspace.grid();
        let forces = stencils
            .par_iter()
            .zip(snapshot.charges().par_iter())
            .map(|(stencil, charge)| self.gather(stencil, *charge, potential))
            .collect();
        Contribution { energy, forces }
    }
}
