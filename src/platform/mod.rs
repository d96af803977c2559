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

//! # Backends for force and energy evaluation
//!
//! A backend implements [`Platform`] which takes an immutable [`Snapshot`] of the system
//! and returns forces and energy. The [`reference::ReferencePlatform`] is a
//! straightforward serial implementation while [`parallel::ParallelPlatform`] uses
//! data parallelism and different summation strategies; the two can be cross-checked
//! with [`crate::oracle`].

use crate::{
    cell::PeriodicBox, EwaldError, Evaluation, ExclusionSet, Point, SolverParameters,
};
use serde::{Deserialize, Serialize};

pub mod parallel;
pub mod reference;

/// Reciprocal-space method
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Method {
    /// Direct sum over reciprocal lattice vectors
    #[default]
    Ewald,
    /// Smooth particle-mesh Ewald
    Pme,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Ewald => write!(f, "Ewald"),
            Method::Pme => write!(f, "PME"),
        }
    }
}

/// Immutable view of the system to evaluate
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    positions: &'a [Point],
    charges: &'a [f64],
    cell: &'a PeriodicBox,
    exclusions: &'a ExclusionSet,
}

impl<'a> Snapshot<'a> {
    pub fn new(
        positions: &'a [Point],
        charges: &'a [f64],
        cell: &'a PeriodicBox,
        exclusions: &'a ExclusionSet,
    ) -> Self {
        Self {
            positions,
            charges,
            cell,
            exclusions,
        }
    }

    /// Same charges, cell and exclusions but different positions
    pub fn with_positions(&self, positions: &'a [Point]) -> Self {
        Self { positions, ..*self }
    }

    pub fn positions(&self) -> &'a [Point] {
        self.positions
    }

    pub fn charges(&self) -> &'a [f64] {
        self.charges
    }

    pub fn cell(&self) -> &'a PeriodicBox {
        self.cell
    }

    pub fn exclusions(&self) -> &'a ExclusionSet {
        self.exclusions
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of all charges
    pub fn net_charge(&self) -> f64 {
        self.charges.iter().sum()
    }

    /// Check that positions, charges and exclusions describe the same, finite, system
    pub fn validate(&self) -> Result<(), EwaldError> {
        if self.positions.len() != self.charges.len() {
            return Err(EwaldError::InvalidSnapshot(format!(
                "{} positions but {} charges",
                self.positions.len(),
                self.charges.len()
            )));
        }
        if let Some(i) = self
            .positions
            .iter()
            .position(|p| p.iter().any(|x| !x.is_finite()))
        {
            return Err(EwaldError::InvalidSnapshot(format!(
                "position of particle {i} is not finite"
            )));
        }
        if let Some(i) = self.charges.iter().position(|q| !q.is_finite()) {
            return Err(EwaldError::InvalidSnapshot(format!(
                "charge of particle {i} is not finite"
            )));
        }
        self.exclusions.validate(self.len())
    }
}

/// Common interface for force and energy backends
pub trait Platform: Sync {
    /// Short, unique name used in reports
    fn name(&self) -> &str;

    /// Forces and energy of a snapshot
    fn evaluate(
        &self,
        snapshot: &Snapshot,
        parameters: &SolverParameters,
        method: Method,
    ) -> Result<Evaluation, EwaldError>;
}

/// Evaluate forces and energy with the reference backend
pub fn evaluate(
    snapshot: &Snapshot,
    parameters: &SolverParameters,
    method: Method,
) -> Result<Evaluation, EwaldError> {
    reference::ReferencePlatform.evaluate(snapshot, parameters, method)
}

/// Refuse parameters that do not fit the cell of a snapshot or the chosen method
pub(crate) fn check_parameters(
    snapshot: &Snapshot,
    parameters: &SolverParameters,
    method: Method,
) -> Result<(), EwaldError> {
    let half_width = 0.5 * snapshot.cell().min_width();
    if *parameters.cutoff() > half_width {
        return Err(EwaldError::InvalidParameter {
            name: "cutoff",
            value: *parameters.cutoff(),
            reason: format!("exceeds half the smallest box width ({half_width})"),
        });
    }
    match method {
        Method::Ewald => {
            if let Some(k) = parameters.kmax().iter().find(|&&k| k == 0) {
                return Err(EwaldError::InvalidParameter {
                    name: "kmax",
                    value: *k as f64,
                    reason: "must be positive along all axes".to_string(),
                });
            }
        }
        Method::Pme => {
            let order = *parameters.pme_order();
            if order < 3 {
                return Err(EwaldError::InvalidParameter {
                    name: "pme_order",
                    value: order as f64,
                    reason: "must be at least 3".to_string(),
                });
            }
            if let Some(n) = parameters.grid().iter().find(|&&n| n < order) {
                return Err(EwaldError::InvalidParameter {
                    name: "grid",
                    value: *n as f64,
                    reason: format!("must be at least the spline order ({order})"),
                });
            }
        }
    }
    Ok(())
}
