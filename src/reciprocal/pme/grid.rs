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

//! Charge grid and three-dimensional FFTs of one PME evaluation.

use ndarray::{Array3, Axis};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::sync::Arc;

/// FFT direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    /// Unnormalised inverse transform
    Inverse,
}

/// Grid buffer and FFT plans owned by a single evaluation.
///
/// A workspace is created for each evaluation and dropped when it returns, so concurrent
/// evaluations never share a grid.
pub struct PmeWorkspace {
    grid: Array3<Complex64>,
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl std::fmt::Debug for PmeWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmeWorkspace")
            .field("dims", &self.grid.dim())
            .finish()
    }
}

impl PmeWorkspace {
    /// Allocate a zeroed grid and plan the transforms along each axis
    pub fn new(dims: [usize; 3]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = dims.map(|n| planner.plan_fft_forward(n));
        let inverse = dims.map(|n| planner.plan_fft_inverse(n));
        Self {
            grid: Array3::zeros((dims[0], dims[1], dims[2])),
            forward,
            inverse,
        }
    }

    /// Number of grid points along each axis
    pub fn dims(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.grid.dim();
        [nx, ny, nz]
    }

    pub fn grid(&self) -> &Array3<Complex64> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Array3<Complex64> {
        &mut self.grid
    }

    /// Replace the grid content by real values, e.g. charges spread in parallel
    pub fn load_real(&mut self, values: &Array3<f64>) {
        self.grid
            .zip_mut_with(values, |z, &x| *z = Complex64::new(x, 0.0));
    }

    /// Three-dimensional transform in place, done as one-dimensional transforms along each axis
    pub fn transform(&mut self, direction: Direction) {
        let plans = match direction {
            Direction::Forward => &self.forward,
            Direction::Inverse => &self.inverse,
        };
        for (axis, fft) in plans.iter().enumerate() {
            let mut buffer = vec![Complex64::default(); fft.len()];
            let mut scratch = vec![Complex64::default(); fft.get_inplace_scratch_len()];
            for mut lane in self.grid.lanes_mut(Axis(axis)) {
                buffer
                    .iter_mut()
                    .zip(lane.iter())
                    .for_each(|(b, z)| *b = *z);
                fft.process_with_scratch(&mut buffer, &mut scratch);
                lane.iter_mut().zip(&buffer).for_each(|(z, b)| *z = *b);
            }
        }
    }
}
