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

//! Cardinal B-splines used to interpolate charges onto, and potentials from, the PME grid.

use std::f64::consts::PI;

/// Euler exponential spline moduli below this value are replaced by neighbor averages
const SMALL_MODULUS: f64 = 1e-7;

/// Cardinal B-spline, `Mₚ(x)`, of order `p` with support on `[0, p]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BSpline {
    order: usize,
}

impl BSpline {
    /// New spline; the order must be at least three so that derivatives are continuous
    pub fn new(order: usize) -> Self {
        debug_assert!(order >= 3);
        Self { order }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Spline values and derivatives at `x = fraction + j` for `j = 0..order`.
    ///
    /// A particle at grid coordinate `u = ⌊u⌋ + fraction` has weight `values[j]` on grid
    /// point `⌊u⌋ - j`. The values sum to one for any `fraction` in `[0, 1)`.
    pub fn weights(&self, fraction: f64) -> (Vec<f64>, Vec<f64>) {
        let p = self.order;
        let mut values = vec![0.0; p];
        let mut derivatives = vec![0.0; p];
        values[0] = fraction;
        values[1] = 1.0 - fraction;
        for n in 3..=p {
            if n == p {
                // M'ₚ(x) = Mₚ₋₁(x) - Mₚ₋₁(x - 1)
                for j in 0..p {
                    let previous = if j > 0 { values[j - 1] } else { 0.0 };
                    derivatives[j] = values[j] - previous;
                }
            }
            let divisor = (n - 1) as f64;
            for j in (0..n).rev() {
                let x = fraction + j as f64;
                let previous = if j > 0 { values[j - 1] } else { 0.0 };
                values[j] = (x * values[j] + (n as f64 - x) * previous) / divisor;
            }
        }
        (values, derivatives)
    }

    /// Squared moduli, `|Σₖ Mₚ(k + 1) exp(2πimk/K)|²`, for `m = 0..size`.
    ///
    /// The PME influence function is divided by the product of these along the three axes,
    /// which undoes the smoothing introduced by the spline interpolation.
    pub fn moduli(&self, size: usize) -> Vec<f64> {
        let (integer_values, _) = self.weights(0.0);
        let mut moduli: Vec<f64> = (0..size)
            .map(|m| {
                let (re, im) = (0..self.order - 1).fold((0.0, 0.0), |(re, im), k| {
                    let arg = 2.0 * PI * (m * k) as f64 / size as f64;
                    let value = integer_values[k + 1];
                    (re + value * arg.cos(), im + value * arg.sin())
                });
                re * re + im * im
            })
            .collect();
        for i in 0..size {
            if moduli[i] < SMALL_MODULUS {
                moduli[i] = 0.5 * (moduli[(i + size - 1) % size] + moduli[(i + 1) % size]);
            }
        }
        moduli
    }
}
