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

//! # YAML input
//!
//! Example input:
//!
//! ~~~yaml
//! cell: { cubic: 6.0 }
//! cutoff: 2.0
//! tolerance: 1.0e-5
//! method: Ewald        # or Pme
//! pme_order: 5         # optional
//! particles:
//!   - { charge: 1.0, pos: [3.048, 2.764, 3.156] }
//!   - { charge: -1.0, pos: [2.809, 2.888, 2.571] }
//! exclusions: []       # optional list of index pairs
//! ~~~

use crate::{
    cell::PeriodicBox,
    parameters::{ParameterSelector, ParameterSelectorBuilder},
    ExclusionSet, Method, Point, SolverParameters,
};
use anyhow::Context;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

/// Charge and position of one particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleInput {
    /// Charge in units of the elementary charge
    pub charge: f64,
    /// Position (nm)
    pub pos: Point,
}

/// System and solver settings read from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Getters)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_input"))]
pub struct InputConfig {
    /// Periodic cell
    cell: PeriodicBox,
    /// Real-space cutoff (nm)
    cutoff: f64,
    /// Relative error tolerance
    tolerance: f64,
    /// Reciprocal-space method
    #[serde(default)]
    method: Method,
    /// Order of the PME splines; default is 5
    #[validate(range(min = 3, max = 16))]
    pme_order: Option<usize>,
    /// Point charges
    #[validate(length(min = 1))]
    particles: Vec<ParticleInput>,
    /// Excluded pairs
    #[serde(default)]
    exclusions: ExclusionSet,
}

fn validate_input(input: &InputConfig) -> Result<(), ValidationError> {
    if !(input.cutoff.is_finite() && input.cutoff > 0.0) {
        return Err(ValidationError::new("cutoff must be positive"));
    }
    if !(input.tolerance > 0.0 && input.tolerance < 1.0) {
        return Err(ValidationError::new("tolerance must be in (0, 1)"));
    }
    if input.exclusions.validate(input.particles.len()).is_err() {
        return Err(ValidationError::new("exclusion refers to a missing particle"));
    }
    Ok(())
}

impl InputConfig {
    /// Parse and validate a YAML string
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let input: Self = serde_yaml::from_str(yaml)?;
        input.validate()?;
        Ok(input)
    }

    /// Read and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read input file {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Invalid input in {}", path.display()))
    }

    /// Particle positions in input order
    pub fn positions(&self) -> Vec<Point> {
        self.particles.iter().map(|p| p.pos).collect()
    }

    /// Particle charges in input order
    pub fn charges(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.charge).collect()
    }

    /// Parameter selector honoring the optional spline order
    pub fn selector(&self) -> anyhow::Result<ParameterSelector> {
        let mut builder = ParameterSelectorBuilder::default();
        if let Some(order) = self.pme_order {
            builder.pme_order(order);
        }
        Ok(builder.build()?)
    }

    /// Solver parameters for the input cutoff and tolerance
    pub fn parameters(&self) -> anyhow::Result<SolverParameters> {
        Ok(self
            .selector()?
            .select(&self.cell, self.cutoff, self.tolerance)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_IONS: &str = "
cell: { cubic: 6.0 }
cutoff: 2.0
tolerance: 1.0e-5
method: Pme
particles:
  - { charge: 1.0, pos: [3.048, 2.764, 3.156] }
  - { charge: -1.0, pos: [2.809, 2.888, 2.571] }
";

    #[test]
    fn parse_two_ions() {
        let input = InputConfig::from_yaml(TWO_IONS).unwrap();
        assert_eq!(*input.method(), Method::Pme);
        assert_eq!(input.charges(), vec![1.0, -1.0]);
        assert_eq!(input.positions()[1], Point::new(2.809, 2.888, 2.571));
        assert!(input.exclusions().is_empty());
        let parameters = input.parameters().unwrap();
        assert_eq!(*parameters.pme_order(), 5);
        assert_eq!(*parameters.cutoff(), 2.0);
    }

    #[test]
    fn reject_invalid_input() {
        let bad_tolerance = TWO_IONS.replace("1.0e-5", "1.5");
        assert!(InputConfig::from_yaml(&bad_tolerance).is_err());
        let bad_order = format!("{TWO_IONS}pme_order: 2\n");
        assert!(InputConfig::from_yaml(&bad_order).is_err());
        let bad_exclusion = format!("{TWO_IONS}exclusions: [[0, 2]]\n");
        assert!(InputConfig::from_yaml(&bad_exclusion).is_err());
        let unknown_field = format!("{TWO_IONS}temperature: 298.0\n");
        assert!(InputConfig::from_yaml(&unknown_field).is_err());
        let no_particles = "cell: { cubic: 6.0 }\ncutoff: 2.0\ntolerance: 1.0e-5\nparticles: []\n";
        assert!(InputConfig::from_yaml(no_particles).is_err());
    }
}
