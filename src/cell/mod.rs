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

//! # Periodic simulation cells
//!
//! The electrostatics engine works with fully periodic cells described by three lattice
//! vectors, see [`PeriodicBox`]. Cells expose their geometry through [`Shape`] and the
//! minimum image convention through [`BoundaryConditions`].

mod periodic_box;

use crate::Point;
pub use periodic_box::PeriodicBox;

/// Geometric shape like a cube, a parallelepiped etc.
pub trait Shape {
    /// Get volume; `None` if infinite
    fn volume(&self) -> Option<f64>;
}

/// Interface for periodic boundary conditions and minimum image convention
pub trait BoundaryConditions {
    /// Wrap a displacement vector to its minimum image
    fn boundary(&self, point: &mut Point);
    /// Minimum image distance vector, `point1 - point2`
    fn distance(&self, point1: &Point, point2: &Point) -> Point {
        let mut delta = point1 - point2;
        self.boundary(&mut delta);
        delta
    }
    /// Get the minimum squared distance between two points
    #[inline(always)]
    fn distance_squared(&self, point1: &Point, point2: &Point) -> f64 {
        self.distance(point1, point2).norm_squared()
    }
}
