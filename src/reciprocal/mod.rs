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

//! # Reciprocal-space part of the Ewald sum
//!
//! Two methods are available:
//!
//! - [`ewald::EwaldReciprocal`]: direct summation over reciprocal lattice vectors.
//!   Accurate but scales as N × number of k-vectors.
//! - [`pme::ParticleMesh`]: smooth particle-mesh Ewald with FFTs on a charge grid.
//!
//! Both exclude the `k = 0` term; for a system with a net charge this corresponds to
//! a uniform neutralising background whose energy is added by
//! [`crate::correction::net_charge_correction`].

pub mod ewald;
pub mod pme;

pub use ewald::EwaldReciprocal;
pub use pme::{ParticleMesh, PmeWorkspace};
