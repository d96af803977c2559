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

//! # Consistency checks of force and energy backends
//!
//! The checks below depend only on the [`Platform`] trait:
//!
//! - [`compare_backends`]: two backends must give the same forces and energy.
//! - [`compare_methods`]: PME must approximate the direct Ewald sum.
//! - [`finite_difference_check`]: forces must be the negative gradient of the energy.
//! - [`error_scaling`]: tightening the tolerance must converge the forces.
//!
//! Each check returns a report; use `into_result()` to turn a failed check into an
//! [`EwaldError`] carrying the offending values.

use crate::{
    select_parameters, EwaldError, Evaluation, Method, Platform, Point, Snapshot,
    SolverParameters,
};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Acceptance criteria when comparing two backends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Largest allowed absolute difference of any force component (kJ/mol/nm)
    pub force_tolerance: f64,
    /// Largest allowed relative difference of the total energy
    pub energy_tolerance: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            force_tolerance: 1e-2,
            energy_tolerance: 1e-5,
        }
    }
}

/// Outcome of [`compare_backends`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendComparison {
    pub first: String,
    pub second: String,
    pub method: Method,
    /// Particle with the largest force component deviation
    pub particle: usize,
    /// Cartesian component (0, 1, 2) of that deviation
    pub component: usize,
    /// Largest absolute force component deviation
    pub max_force_deviation: f64,
    pub energy_first: f64,
    pub energy_second: f64,
    /// `|E₁ - E₂| / |E₁|`
    pub relative_energy_deviation: f64,
    pub criteria: Criteria,
}

impl BackendComparison {
    pub fn forces_agree(&self) -> bool {
        self.max_force_deviation <= self.criteria.force_tolerance
    }

    pub fn energies_agree(&self) -> bool {
        self.relative_energy_deviation <= self.criteria.energy_tolerance
    }

    pub fn passed(&self) -> bool {
        self.forces_agree() && self.energies_agree()
    }

    /// Convert a failed comparison to an error; forces are checked first
    pub fn into_result(self) -> Result<Self, EwaldError> {
        if !self.forces_agree() {
            return Err(EwaldError::BackendDisagreement {
                first: self.first,
                second: self.second,
                particle: self.particle,
                deviation: self.max_force_deviation,
                tolerance: self.criteria.force_tolerance,
            });
        }
        if !self.energies_agree() {
            return Err(EwaldError::EnergyDisagreement {
                first: self.first,
                second: self.second,
                energy_first: self.energy_first,
                energy_second: self.energy_second,
                relative: self.relative_energy_deviation,
                tolerance: self.criteria.energy_tolerance,
            });
        }
        Ok(self)
    }
}

/// Relative deviation `|a - b| / |a|`, falling back to the absolute deviation if `a` is zero
fn relative_deviation(a: f64, b: f64) -> f64 {
    let deviation = (a - b).abs();
    if a == 0.0 {
        deviation
    } else {
        deviation / a.abs()
    }
}

/// Largest absolute force component deviation as `(particle, component, deviation)`
fn max_force_deviation(first: &[Point], second: &[Point]) -> (usize, usize, f64) {
    first
        .iter()
        .zip(second)
        .enumerate()
        .flat_map(|(i, (a, b))| (0..3).map(move |c| (i, c, (a[c] - b[c]).abs())))
        .fold((0, 0, 0.0), |worst, current| {
            if current.2 > worst.2 {
                current
            } else {
                worst
            }
        })
}

/// Evaluate the same snapshot with two backends, concurrently, and compare the results
pub fn compare_backends(
    snapshot: &Snapshot,
    parameters: &SolverParameters,
    first: &dyn Platform,
    second: &dyn Platform,
    method: Method,
    criteria: Criteria,
) -> Result<BackendComparison, EwaldError> {
    let (a, b) = rayon::join(
        || first.evaluate(snapshot, parameters, method),
        || second.evaluate(snapshot, parameters, method),
    );
    Ok(summarize(
        first.name().to_string(),
        second.name().to_string(),
        method,
        &a?,
        &b?,
        criteria,
    ))
}

/// Evaluate a snapshot with direct Ewald and with PME on one backend and compare.
///
/// The two methods share only the real-space part and the corrections, so this checks the
/// PME influence function, spreading and gathering against an independent sum. PME is an
/// approximation; `criteria` must allow for its error at the chosen tolerance.
pub fn compare_methods(
    snapshot: &Snapshot,
    parameters: &SolverParameters,
    platform: &dyn Platform,
    criteria: Criteria,
) -> Result<BackendComparison, EwaldError> {
    let (ewald, pme) = rayon::join(
        || platform.evaluate(snapshot, parameters, Method::Ewald),
        || platform.evaluate(snapshot, parameters, Method::Pme),
    );
    Ok(summarize(
        format!("{} ({})", platform.name(), Method::Ewald),
        format!("{} ({})", platform.name(), Method::Pme),
        Method::Pme,
        &ewald?,
        &pme?,
        criteria,
    ))
}

fn summarize(
    first: String,
    second: String,
    method: Method,
    a: &Evaluation,
    b: &Evaluation,
    criteria: Criteria,
) -> BackendComparison {
    let (particle, component, max_force_deviation) = max_force_deviation(&a.forces, &b.forces);
    let comparison = BackendComparison {
        first,
        second,
        method,
        particle,
        component,
        max_force_deviation,
        energy_first: a.energy,
        energy_second: b.energy,
        relative_energy_deviation: relative_deviation(a.energy, b.energy),
        criteria,
    };
    log::debug!(
        "{} vs {} ({}): max |ΔF| = {:.3e} on particle {}, relative ΔE = {:.3e}",
        comparison.first,
        comparison.second,
        method,
        comparison.max_force_deviation,
        comparison.particle,
        comparison.relative_energy_deviation
    );
    comparison
}

/// Outcome of [`finite_difference_check`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfConsistency {
    /// Step length, δ
    pub delta: f64,
    /// Norm of the 3N-dimensional force vector, ‖F‖
    pub force_norm: f64,
    /// Measured energy slope, `(E(X - δF̂) - E(X)) / δ`
    pub slope: f64,
    /// `|slope - ‖F‖| / ‖F‖`
    pub relative_error: f64,
    pub tolerance: f64,
}

impl SelfConsistency {
    pub fn passed(&self) -> bool {
        self.relative_error <= self.tolerance
    }

    pub fn into_result(self) -> Result<Self, EwaldError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(EwaldError::SelfConsistency {
                slope: self.slope,
                expected: self.force_norm,
                relative: self.relative_error,
                tolerance: self.tolerance,
            })
        }
    }
}

/// Check that the forces are the negative gradient of the energy.
///
/// All particles are displaced by `δ` along the negative, normalised, 3N-dimensional force
/// vector. To first order the energy then increases by `δ‖F‖`. A large `δ` mixes
/// truncation error into the comparison; `1e-3` nm works well for ionic systems.
pub fn finite_difference_check(
    platform: &dyn Platform,
    snapshot: &Snapshot,
    parameters: &SolverParameters,
    method: Method,
    delta: f64,
    tolerance: f64,
) -> Result<SelfConsistency, EwaldError> {
    if !(delta.is_finite() && delta > 0.0) {
        return Err(EwaldError::InvalidParameter {
            name: "delta",
            value: delta,
            reason: "must be positive and finite".to_string(),
        });
    }
    let initial = platform.evaluate(snapshot, parameters, method)?;
    let force_norm = initial.force_norm();
    if force_norm == 0.0 {
        return Err(EwaldError::InvalidSnapshot(
            "all forces vanish; the finite difference slope is undefined".to_string(),
        ));
    }
    let step = delta / force_norm;
    let displaced: Vec<Point> = snapshot
        .positions()
        .iter()
        .zip(&initial.forces)
        .map(|(position, force)| position - force * step)
        .collect();
    let moved = platform.evaluate(&snapshot.with_positions(&displaced), parameters, method)?;
    let slope = (moved.energy - initial.energy) / delta;
    let report = SelfConsistency {
        delta,
        force_norm,
        slope,
        relative_error: (slope - force_norm).abs() / force_norm,
        tolerance,
    };
    log::debug!(
        "{} ({}): slope = {:.6}, |F| = {:.6}, relative error = {:.3e}",
        platform.name(),
        method,
        report.slope,
        report.force_norm,
        report.relative_error
    );
    Ok(report)
}

/// Force deviation at one tolerance, see [`ErrorScaling`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingEntry {
    pub tolerance: f64,
    /// `‖F(ε) - F(ε_min)‖ / ‖F(ε_min)‖`
    pub relative_deviation: f64,
    /// `factor × ε`
    pub limit: f64,
}

impl ScalingEntry {
    pub fn passed(&self) -> bool {
        self.relative_deviation <= self.limit
    }
}

/// Outcome of [`error_scaling`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorScaling {
    pub cutoff: f64,
    pub method: Method,
    /// Tightest tolerance which serves as the reference
    pub reference_tolerance: f64,
    /// One entry per looser tolerance, in order of decreasing tolerance
    pub entries: Vec<ScalingEntry>,
}

impl ErrorScaling {
    pub fn passed(&self) -> bool {
        self.entries.iter().all(ScalingEntry::passed)
    }

    /// True if deviations shrink as the tolerance tightens, ignoring increases below `noise_floor`
    pub fn is_monotonic(&self, noise_floor: f64) -> bool {
        self.entries
            .iter()
            .tuple_windows()
            .all(|(looser, tighter)| {
                tighter.relative_deviation <= looser.relative_deviation + noise_floor
            })
    }

    /// Convert to an error naming the first tolerance that failed
    pub fn into_result(self) -> Result<Self, EwaldError> {
        match self.entries.iter().find(|entry| !entry.passed()) {
            Some(entry) => Err(EwaldError::ErrorScaling {
                cutoff: self.cutoff,
                tolerance: entry.tolerance,
                deviation: entry.relative_deviation,
                limit: entry.limit,
            }),
            None => Ok(self),
        }
    }
}

/// Relative norm of the force difference, `‖a - b‖ / ‖b‖`
fn relative_force_deviation(a: &Evaluation, b: &Evaluation) -> f64 {
    let difference = a
        .forces
        .iter()
        .zip(&b.forces)
        .map(|(a, b)| (a - b).norm_squared())
        .sum::<f64>()
        .sqrt();
    difference / b.force_norm()
}

/// Evaluate forces at several tolerances, concurrently, and compare with the tightest one.
///
/// Each looser tolerance, `ε`, passes if the relative force deviation is at most `factor × ε`.
pub fn error_scaling(
    platform: &dyn Platform,
    snapshot: &Snapshot,
    cutoff: f64,
    tolerances: &[f64],
    method: Method,
    factor: f64,
) -> Result<ErrorScaling, EwaldError> {
    let mut tolerances = tolerances.to_vec();
    tolerances.sort_by(|a, b| b.total_cmp(a));
    tolerances.dedup();
    if tolerances.len() < 2 {
        return Err(EwaldError::InvalidParameter {
            name: "tolerances",
            value: tolerances.len() as f64,
            reason: "need at least two distinct tolerances".to_string(),
        });
    }
    let evaluations = tolerances
        .par_iter()
        .map(|&tolerance| {
            let parameters = select_parameters(snapshot.cell(), cutoff, tolerance)?;
            platform.evaluate(snapshot, &parameters, method)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (reference, others) = evaluations.split_last().ok_or_else(|| {
        EwaldError::InvalidParameter {
            name: "tolerances",
            value: 0.0,
            reason: "empty".to_string(),
        }
    })?;
    let entries = tolerances
        .iter()
        .zip(others)
        .map(|(&tolerance, evaluation)| ScalingEntry {
            tolerance,
            relative_deviation: relative_force_deviation(evaluation, reference),
            limit: factor * tolerance,
        })
        .collect();
    Ok(ErrorScaling {
        cutoff,
        method,
        reference_tolerance: tolerances[tolerances.len() - 1],
        entries,
    })
}
