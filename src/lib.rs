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

//! # Ewald Summation for Periodic Point Charges
//!
//! This library computes the electrostatic energy and forces of point charges in a
//! periodically replicated, possibly triclinic, box. The conditionally convergent lattice
//! sum is split into a short-ranged real-space part and a smooth reciprocal-space part:
//!
//! - [`realspace`]: erfc-screened pair interactions within a spherical cutoff.
//! - [`reciprocal`]: either a direct sum over reciprocal lattice vectors (Ewald) or the
//!   smooth particle-mesh Ewald (PME) grid pipeline.
//! - [`correction`]: self-energy, excluded pairs and the neutralising background.
//!
//! Numerical parameters (splitting parameter, number of k-vectors, PME grid) are derived
//! from a relative error tolerance by [`parameters::select_parameters`].
//! Concrete backends implement the [`platform::Platform`] trait and can be cross-checked
//! with the [`oracle`] module.
//!
//! ## Units
//!
//! Lengths are in nm, charges in elementary charges, energies in kJ/mol and forces in
//! kJ/mol/nm; see [`COULOMB_PREFACTOR`].
//!
//! ## Examples
//! ~~~
//! # use approx::assert_relative_eq;
//! use ewald::{cell::PeriodicBox, evaluate, select_parameters, ExclusionSet, Method, Point, Snapshot};
//!
//! let cell = PeriodicBox::cubic(6.0)?;
//! let positions = [Point::new(3.048, 2.764, 3.156), Point::new(2.809, 2.888, 2.571)];
//! let charges = [1.0, -1.0];
//! let exclusions = ExclusionSet::default();
//! let snapshot = Snapshot::new(&positions, &charges, &cell, &exclusions);
//!
//! let parameters = select_parameters(&cell, 2.0, 1e-5)?;
//! let result = evaluate(&snapshot, &parameters, Method::Ewald)?;
//! assert_relative_eq!(result.energy, -216.303, epsilon = 0.01);
//! # Ok::<(), ewald::EwaldError>(())
//! ~~~

#[cfg(test)]
extern crate approx;

/// A point in 3D space
pub type Point = nalgebra::Vector3<f64>;
/// A 3x3 matrix
pub type Matrix3 = nalgebra::Matrix3<f64>;

pub mod assemble;
pub mod cell;
pub mod config;
pub mod correction;
mod error;
pub mod exclusions;
pub mod neighbor;
pub mod oracle;
pub mod parameters;
pub mod platform;
pub mod realspace;
pub mod reciprocal;

pub use assemble::{Contribution, EnergyTerms, Evaluation};
pub use error::EwaldError;
pub use exclusions::ExclusionSet;
pub use parameters::{select_parameters, ParameterSelector, SolverParameters};
pub use platform::{evaluate, Method, Platform, Snapshot};

use physical_constants::{AVOGADRO_CONSTANT, ELEMENTARY_CHARGE, VACUUM_ELECTRIC_PERMITTIVITY};
use std::f64::consts::PI;

const NANOMETER_PER_METER: f64 = 1e9;
const KILO_JOULE_PER_JOULE: f64 = 1e-3;

/// Electrostatic prefactor, e²/4πε₀ × N_A [nm × kJ / mol].
///
/// Multiplying q₁q₂/r, with charges in elementary charges and r in nm, gives kJ/mol.
///
/// # Examples:
/// ```
/// # use approx::assert_relative_eq;
/// use ewald::COULOMB_PREFACTOR;
/// let (z1, z2, r) = (1.0, -1.0, 0.7); // unit-less charge number, separation in nm
/// assert_relative_eq!(COULOMB_PREFACTOR * z1 * z2 / r, -198.4792, epsilon = 1e-3);
/// ```
pub const COULOMB_PREFACTOR: f64 = ELEMENTARY_CHARGE
    * ELEMENTARY_CHARGE
    * NANOMETER_PER_METER
    * AVOGADRO_CONSTANT
    * KILO_JOULE_PER_JOULE
    / (4.0 * PI * VACUUM_ELECTRIC_PERMITTIVITY);

/// Square root of pi
pub(crate) const SQRT_PI: f64 = 1.772_453_850_905_516;

/// Defines a cutoff distance
pub trait Cutoff {
    /// Squared cutoff distance
    fn cutoff_squared(&self) -> f64 {
        self.cutoff().powi(2)
    }

    /// Cutoff distance
    fn cutoff(&self) -> f64;
}
