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

//! # Selection of the Ewald splitting parameter and reciprocal-space resolution
//!
//! Given a cutoff, `r_c`, and a relative error tolerance, `ε`, the splitting parameter
//! `α` is chosen such that the real-space tail, `erfc(α r_c)`, equals `ε`. The number of
//! reciprocal vectors and the PME grid are then chosen such that the reciprocal-space
//! truncation error is of similar magnitude.

use crate::cell::{PeriodicBox, Shape};
use crate::EwaldError;
use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

/// Default order of the cardinal B-splines used by PME (quartic)
pub const DEFAULT_PME_ORDER: usize = 5;
const DEFAULT_MAX_ITERATIONS: usize = 200;
const DEFAULT_MIN_GRID: usize = 6;
const DEFAULT_MAX_GRID: usize = 1024;
/// Largest number of reciprocal vectors along an axis
pub const MAX_KMAX: usize = 1024;

/// Relative step or bracket width at which the root search is converged
const ROOT_TOLERANCE: f64 = 1e-12;
/// Relative residual accepted when the iteration budget is exhausted
const ROOT_FALLBACK_TOLERANCE: f64 = 1e-6;
/// Initial guess for the number of reciprocal vectors along an axis
const KMAX_INITIAL_GUESS: usize = 10;

/// Derived solver settings for one system.
///
/// Created by [`select_parameters`] or [`ParameterSelector::select`]; equal input always
/// gives equal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(deny_unknown_fields)]
pub struct SolverParameters {
    /// Real-space cutoff distance
    cutoff: f64,
    /// Relative error tolerance
    tolerance: f64,
    /// Ewald splitting parameter, α (inverse length)
    alpha: f64,
    /// Reciprocal vectors along each axis are restricted to `|n| < kmax`
    kmax: [usize; 3],
    /// Number of PME grid points along each axis
    grid: [usize; 3],
    /// Order of the PME interpolation splines
    pme_order: usize,
}

impl SolverParameters {
    /// Override the number of reciprocal vectors used by the direct Ewald sum
    pub fn with_kmax(mut self, kmax: [usize; 3]) -> Self {
        self.kmax = kmax;
        self
    }

    /// Override the PME grid dimensions
    pub fn with_grid(mut self, grid: [usize; 3]) -> Self {
        self.grid = grid;
        self
    }
}

/// Settings that control how [`SolverParameters`] are derived.
///
/// ~~~
/// use ewald::parameters::ParameterSelectorBuilder;
/// let selector = ParameterSelectorBuilder::default().pme_order(6).build().unwrap();
/// assert_eq!(*selector.pme_order(), 6);
/// assert!(ParameterSelectorBuilder::default().pme_order(1).build().is_err());
/// ~~~
#[derive(Debug, Clone, PartialEq, Builder, Getters)]
#[builder(build_fn(skip), derive(Deserialize, Serialize, Debug))]
#[builder_struct_attr(serde(deny_unknown_fields))]
pub struct ParameterSelector {
    /// B-spline order; 5 means quartic splines over 5 grid points per axis
    pme_order: usize,
    /// Maximum number of iterations when solving for α
    max_iterations: usize,
    /// Smallest allowed PME grid dimension
    min_grid: usize,
    /// Largest allowed PME grid dimension; tighter tolerances are rejected
    max_grid: usize,
}

impl Default for ParameterSelector {
    fn default() -> Self {
        Self {
            pme_order: DEFAULT_PME_ORDER,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_grid: DEFAULT_MIN_GRID,
            max_grid: DEFAULT_MAX_GRID,
        }
    }
}

impl ParameterSelectorBuilder {
    /// Build the selector; unset fields take their default values
    pub fn build(&self) -> Result<ParameterSelector, EwaldError> {
        let defaults = ParameterSelector::default();
        let selector = ParameterSelector {
            pme_order: self.pme_order.unwrap_or(defaults.pme_order),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            min_grid: self.min_grid.unwrap_or(defaults.min_grid),
            max_grid: self.max_grid.unwrap_or(defaults.max_grid),
        };
        if !(3..=16).contains(&selector.pme_order) {
            return Err(EwaldError::InvalidParameter {
                name: "pme_order",
                value: selector.pme_order as f64,
                reason: "must be in [3, 16]".to_string(),
            });
        }
        if selector.max_iterations == 0 {
            return Err(EwaldError::InvalidParameter {
                name: "max_iterations",
                value: 0.0,
                reason: "must be positive".to_string(),
            });
        }
        if selector.max_grid < selector.min_grid.max(selector.pme_order) {
            return Err(EwaldError::InvalidParameter {
                name: "max_grid",
                value: selector.max_grid as f64,
                reason: "must be at least min_grid and pme_order".to_string(),
            });
        }
        Ok(selector)
    }
}

impl ParameterSelector {
    /// Derive solver parameters for a cell, cutoff and relative error tolerance
    pub fn select(
        &self,
        cell: &PeriodicBox,
        cutoff: f64,
        tolerance: f64,
    ) -> Result<SolverParameters, EwaldError> {
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(EwaldError::InvalidParameter {
                name: "cutoff",
                value: cutoff,
                reason: "must be positive and finite".to_string(),
            });
        }
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(EwaldError::InvalidParameter {
                name: "tolerance",
                value: tolerance,
                reason: "must be in (0, 1)".to_string(),
            });
        }
        let half_width = 0.5 * cell.min_width();
        if cutoff > half_width {
            return Err(EwaldError::InvalidParameter {
                name: "cutoff",
                value: cutoff,
                reason: format!("exceeds half the smallest box width ({half_width})"),
            });
        }

        let alpha = splitting_parameter(cutoff, tolerance, self.max_iterations)?;
        let lengths = cell.diagonal();
        let too_fine = |what: &str, limit: usize| EwaldError::InvalidParameter {
            name: "tolerance",
            value: tolerance,
            reason: format!("needs more than {limit} {what} along an axis"),
        };
        let mut kmax = [0; 3];
        let mut grid = [0; 3];
        for i in 0..3 {
            kmax[i] = kmax_for(lengths[i], alpha, tolerance)
                .ok_or_else(|| too_fine("reciprocal vectors", MAX_KMAX))?;
            grid[i] = self
                .grid_dimension(alpha, lengths[i], tolerance)
                .ok_or_else(|| too_fine("PME grid points", self.max_grid))?;
        }
        log::debug!(
            "alpha = {:.6} nm⁻¹, kmax = {:?}, grid = {:?}, volume = {:.4} nm³",
            alpha,
            kmax,
            grid,
            cell.volume().unwrap_or_default()
        );
        Ok(SolverParameters {
            cutoff,
            tolerance,
            alpha,
            kmax,
            grid,
            pme_order: self.pme_order,
        })
    }

    /// PME grid points along an axis of length `length`, or `None` if above `max_grid`
    fn grid_dimension(&self, alpha: f64, length: f64, tolerance: f64) -> Option<usize> {
        let estimate = (2.0 * alpha * length / (3.0 * tolerance.powf(0.2))).ceil();
        if !(estimate <= self.max_grid as f64) {
            return None;
        }
        let n = (estimate as usize).max(self.min_grid).max(self.pme_order);
        find_fft_dimension(n).filter(|&n| n <= self.max_grid)
    }
}

/// Derive solver parameters using default selector settings.
///
/// ~~~
/// use ewald::{cell::PeriodicBox, select_parameters};
/// let cell = PeriodicBox::cubic(6.0)?;
/// let parameters = select_parameters(&cell, 2.0, 1e-5)?;
/// assert!((statrs::function::erf::erfc(parameters.alpha() * 2.0) - 1e-5).abs() < 1e-12);
/// # Ok::<(), ewald::EwaldError>(())
/// ~~~
pub fn select_parameters(
    cell: &PeriodicBox,
    cutoff: f64,
    tolerance: f64,
) -> Result<SolverParameters, EwaldError> {
    ParameterSelector::default().select(cell, cutoff, tolerance)
}

/// Solve `erfc(α r_c) = ε` for α using Newton steps safeguarded by bisection.
///
/// The bracket starts as `[0, √(-ln ε)/r_c]` where the upper end is the analytic guess;
/// since `erfc(x) ≤ exp(-x²)` it always satisfies the tail bound. Iteration stops when the
/// step or the bracket is relatively smaller than `1e-12`. If the iteration budget runs out,
/// the best estimate is accepted only if its residual is within `1e-6 ε`.
pub fn splitting_parameter(
    cutoff: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, EwaldError> {
    let residual = |alpha: f64| erfc(alpha * cutoff) - tolerance;
    let slope = |alpha: f64| -2.0 * cutoff / crate::SQRT_PI * (-(alpha * cutoff).powi(2)).exp();
    let mut lower = 0.0;
    let mut upper = (-tolerance.ln()).sqrt() / cutoff;
    let mut alpha = upper;
    for _ in 0..max_iterations {
        let f = residual(alpha);
        if f == 0.0 {
            return Ok(alpha);
        }
        if f > 0.0 {
            lower = alpha;
        } else {
            upper = alpha;
        }
        let newton = alpha - f / slope(alpha);
        let next = if newton > lower && newton < upper {
            newton
        } else {
            0.5 * (lower + upper)
        };
        if (next - alpha).abs() <= ROOT_TOLERANCE * next || upper - lower <= ROOT_TOLERANCE * upper
        {
            return Ok(next);
        }
        alpha = next;
    }
    let best = [lower, alpha, upper]
        .into_iter()
        .min_by(|a, b| residual(*a).abs().total_cmp(&residual(*b).abs()))
        .unwrap_or(upper);
    if residual(best).abs() <= ROOT_FALLBACK_TOLERANCE * tolerance {
        log::warn!(
            "alpha search exhausted {} iterations; using best estimate {:.10}",
            max_iterations,
            best
        );
        return Ok(best);
    }
    Err(EwaldError::NonConvergent {
        iterations: max_iterations,
        lower,
        upper,
    })
}

/// Smallest number of reciprocal vectors along an axis of length `length`
/// for which the estimated truncation error is below `tolerance`.
///
/// Returns `None` if more than [`MAX_KMAX`] vectors would be needed.
pub fn kmax_for(length: f64, alpha: f64, tolerance: f64) -> Option<usize> {
    let scaled = length * alpha;
    let residual = |k: usize| {
        let t = k as f64 * std::f64::consts::PI / scaled;
        tolerance - 0.05 * scaled.sqrt() * k as f64 * (-t * t).exp()
    };
    let mut k = KMAX_INITIAL_GUESS;
    if residual(k) > 0.0 {
        while k > 0 && residual(k - 1) > 0.0 {
            k -= 1;
        }
        return Some(k.max(1));
    }
    while residual(k) <= 0.0 {
        if k >= MAX_KMAX {
            return None;
        }
        k += 1;
    }
    Some(k)
}

/// Smallest integer `>= minimum` whose prime factors are all 2, 3, 5 or 7,
/// or `None` if there is no such `usize`
pub fn find_fft_dimension(minimum: usize) -> Option<usize> {
    std::iter::successors(Some(minimum.max(1)), |n| n.checked_add(1))
        .find(|&n| {
            let mut n = n;
            for factor in [2, 3, 5, 7] {
                while n % factor == 0 {
                    n /= factor;
                }
            }
            n == 1
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fft_dimensions() {
        assert_eq!(find_fft_dimension(0), Some(1));
        assert_eq!(find_fft_dimension(11), Some(12));
        assert_eq!(find_fft_dimension(13), Some(14));
        assert_eq!(find_fft_dimension(17), Some(18));
        assert_eq!(find_fft_dimension(22), Some(24));
        assert_eq!(find_fft_dimension(64), Some(64));
        assert_eq!(find_fft_dimension(121), Some(125));
        assert_eq!(find_fft_dimension(usize::MAX), None);
    }

    #[test]
    fn alpha_solves_tail_equation() {
        for (cutoff, tolerance) in [(2.0, 1e-5), (1.2, 5e-4), (0.9, 1e-10), (1.0, 1e-15)] {
            let alpha = splitting_parameter(cutoff, tolerance, 200).unwrap();
            assert_relative_eq!(erfc(alpha * cutoff), tolerance, max_relative = 1e-8);
        }
        let alpha = splitting_parameter(2.0, 1e-5, 200).unwrap();
        assert_relative_eq!(alpha, 1.5615, epsilon = 1e-3);
    }

    #[test]
    fn exhausted_iterations() {
        let result = splitting_parameter(2.0, 1e-5, 1);
        assert!(matches!(
            result,
            Err(EwaldError::NonConvergent { iterations: 1, .. })
        ));
    }

    #[test]
    fn kmax_meets_error_estimate() {
        let (length, alpha, tolerance): (f64, f64, f64) = (6.0, 1.5615, 1e-5);
        let k = kmax_for(length, alpha, tolerance).unwrap();
        let estimate = |k: f64| {
            let t = k * std::f64::consts::PI / (length * alpha);
            0.05 * (length * alpha).sqrt() * k * (-t * t).exp()
        };
        assert!(estimate(k as f64) < tolerance);
        assert!(estimate((k - 1) as f64) >= tolerance);
        // tighter tolerance needs more vectors
        assert!(kmax_for(length, alpha, 1e-8).unwrap() > k);
        assert_eq!(kmax_for(length, 1000.0, 1e-300), None);
    }

    #[test]
    fn deterministic_selection() {
        let cell = PeriodicBox::cubic(3.00646).unwrap();
        let first = select_parameters(&cell, 1.2, 1e-5).unwrap();
        let second = select_parameters(&cell, 1.2, 1e-5).unwrap();
        assert_eq!(first, second);
        assert_eq!(*first.pme_order(), DEFAULT_PME_ORDER);
        assert_eq!(first.kmax()[0], first.kmax()[2]);
        for n in first.grid() {
            assert!(*n >= DEFAULT_MIN_GRID);
            assert_eq!(find_fft_dimension(*n), Some(*n));
        }
    }

    #[test]
    fn invalid_input() {
        let cell = PeriodicBox::cubic(6.0).unwrap();
        for (cutoff, tolerance) in [
            (0.0, 1e-5),
            (-1.0, 1e-5),
            (f64::NAN, 1e-5),
            (2.0, 0.0),
            (2.0, 1.0),
            (2.0, -1e-3),
            (2.0, f64::NAN),
            (3.5, 1e-5),
        ] {
            assert!(matches!(
                select_parameters(&cell, cutoff, tolerance),
                Err(EwaldError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn tiny_tolerances_are_rejected() {
        let cell = PeriodicBox::cubic(5.0).unwrap();
        for tolerance in [1e-16, 1e-100, 1e-300] {
            assert!(matches!(
                select_parameters(&cell, 1.0, tolerance),
                Err(EwaldError::InvalidParameter {
                    name: "tolerance",
                    ..
                })
            ));
        }
        // a larger grid limit admits tighter tolerances
        let selector = ParameterSelectorBuilder::default()
            .max_grid(40000)
            .build()
            .unwrap();
        let parameters = selector.select(&cell, 1.0, 1e-16).unwrap();
        assert!(parameters.grid().iter().all(|&n| n > 1024 && n <= 40000));
        // converged references stay within the default limit
        let parameters = select_parameters(&cell, 1.0, 1e-9).unwrap();
        assert!(parameters.grid().iter().all(|&n| n <= DEFAULT_MAX_GRID));
    }

    #[test]
    fn selector_from_yaml() {
        let builder: ParameterSelectorBuilder = serde_yaml::from_str("pme_order: 4").unwrap();
        let selector = builder.build().unwrap();
        assert_eq!(*selector.pme_order(), 4);
        assert_eq!(*selector.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert!(serde_yaml::from_str::<ParameterSelectorBuilder>("order: 4").is_err());
    }
}
