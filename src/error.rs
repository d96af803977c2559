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

//! Typed errors for parameter selection, evaluation and backend validation.

use thiserror::Error;

/// Failure modes of the electrostatics engine.
///
/// All errors are local to a single call; nothing is cached across calls, so callers
/// may retry with adjusted input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EwaldError {
    /// Box vectors are degenerate or not in reduced, lower-triangular form.
    #[error("invalid periodic box: {0}")]
    InvalidCell(String),

    /// A cutoff, tolerance or other numerical setting is out of range.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },

    /// An excluded pair refers to a missing particle.
    #[error("invalid exclusion ({0}, {1}) for {2} particles")]
    InvalidExclusion(usize, usize, usize),

    /// An excluded pair names the same particle twice.
    #[error("particle {0} cannot be excluded from itself")]
    SelfExclusion(usize),

    /// Positions, charges and exclusions do not describe the same system.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The splitting parameter search ran out of iterations without a usable bracket.
    #[error(
        "splitting parameter search did not converge after {iterations} iterations; bracket [{lower}, {upper}]"
    )]
    NonConvergent {
        iterations: usize,
        lower: f64,
        upper: f64,
    },

    /// A force component differs between two backends by more than the tolerance.
    #[error(
        "backends `{first}` and `{second}` disagree on particle {particle}: |ΔF| = {deviation:.3e} > {tolerance:.1e}"
    )]
    BackendDisagreement {
        first: String,
        second: String,
        particle: usize,
        deviation: f64,
        tolerance: f64,
    },

    /// Total energies differ between two backends by more than the relative tolerance.
    #[error(
        "backends `{first}` and `{second}` disagree on energy: {energy_first} vs {energy_second} (relative {relative:.3e} > {tolerance:.1e})"
    )]
    EnergyDisagreement {
        first: String,
        second: String,
        energy_first: f64,
        energy_second: f64,
        relative: f64,
        tolerance: f64,
    },

    /// Finite-difference slope of the energy does not match the force norm.
    #[error(
        "forces are not the gradient of the energy: slope {slope} vs |F| = {expected} (relative error {relative:.3e} > {tolerance:.1e})"
    )]
    SelfConsistency {
        slope: f64,
        expected: f64,
        relative: f64,
        tolerance: f64,
    },

    /// Forces at a loose tolerance deviate too much from those at the tightest tolerance.
    #[error(
        "force deviation {deviation:.3e} at tolerance {tolerance:.1e} exceeds {limit:.3e} (cutoff {cutoff})"
    )]
    ErrorScaling {
        cutoff: f64,
        tolerance: f64,
        deviation: f64,
        limit: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_backend_disagreement() {
        let err = EwaldError::BackendDisagreement {
            first: "reference".into(),
            second: "parallel".into(),
            particle: 12,
            deviation: 0.5,
            tolerance: 1e-2,
        };
        let msg = err.to_string();
        assert!(msg.contains("particle 12"));
        assert!(msg.contains("5.000e-1"));
    }

    #[test]
    fn display_exclusions() {
        assert_eq!(
            EwaldError::SelfExclusion(3).to_string(),
            "particle 3 cannot be excluded from itself"
        );
        assert_eq!(
            EwaldError::InvalidExclusion(0, 4, 4).to_string(),
            "invalid exclusion (0, 4) for 4 particles"
        );
    }

    #[test]
    fn display_invalid_parameter() {
        let err = EwaldError::InvalidParameter {
            name: "tolerance",
            value: 1.5,
            reason: "must be in (0, 1)".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter `tolerance` = 1.5: must be in (0, 1)"
        );
    }
}
