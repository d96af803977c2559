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

use super::{BoundaryConditions, Shape};
use crate::{EwaldError, Matrix3, Point};
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// Relative magnitude below which an off-triangle component is treated as zero
const TRIANGULAR_TOLERANCE: f64 = 1e-12;

/// Fully periodic cell spanned by three lattice vectors, `a`, `b`, and `c`.
///
/// The vectors must be lower triangular, i.e. `a` lies along x and `b` in the xy-plane:
///
/// ~~~text
/// a = (ax, 0,  0 )
/// b = (bx, by, 0 )
/// c = (cx, cy, cz)
/// ~~~
///
/// Upon construction the vectors are reduced so that `ax >= 2|bx|`, `ax >= 2|cx|`, and
/// `by >= 2|cy|`. Reduction is done by adding integer multiples of the other vectors
/// and leaves the lattice, and hence all periodic observables, unchanged.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "RawCell")]
pub struct PeriodicBox {
    a: Point,
    b: Point,
    c: Point,
    /// Columns are the lattice vectors
    matrix: Matrix3,
    /// Rows are the reciprocal lattice vectors (without 2π)
    inverse: Matrix3,
    triclinic: bool,
}

impl PeriodicBox {
    /// Construct from three lower triangular lattice vectors
    pub fn new(a: Point, b: Point, c: Point) -> Result<Self, EwaldError> {
        if a.iter().chain(b.iter()).chain(c.iter()).any(|v| !v.is_finite()) {
            return Err(EwaldError::InvalidCell(
                "lattice vectors must be finite".to_string(),
            ));
        }
        if a.x <= 0.0 || b.y <= 0.0 || c.z <= 0.0 {
            return Err(EwaldError::InvalidCell(format!(
                "diagonal elements must be positive, got ({}, {}, {})",
                a.x, b.y, c.z
            )));
        }
        let scale = a.x.max(b.y).max(c.z);
        if [a.y, a.z, b.z]
            .iter()
            .any(|v| v.abs() > TRIANGULAR_TOLERANCE * scale)
        {
            return Err(EwaldError::InvalidCell(
                "lattice vectors must be lower triangular (a along x, b in the xy-plane)"
                    .to_string(),
            ));
        }
        let a = Point::new(a.x, 0.0, 0.0);
        let mut b = Point::new(b.x, b.y, 0.0);
        let mut c = c;

        // reduce c against b, then both c and b against a
        c -= b * (c.y / b.y).round();
        c -= a * (c.x / a.x).round();
        b -= a * (b.x / a.x).round();

        let matrix = Matrix3::from_columns(&[a, b, c]);
        let inverse = matrix.try_inverse().ok_or_else(|| {
            EwaldError::InvalidCell("lattice vectors are linearly dependent".to_string())
        })?;
        let triclinic = b.x != 0.0 || c.x != 0.0 || c.y != 0.0;
        if triclinic {
            log::debug!("triclinic cell with a={:?} b={:?} c={:?}", a, b, c);
        }
        Ok(Self {
            a,
            b,
            c,
            matrix,
            inverse,
            triclinic,
        })
    }

    /// Cube with side length `side`
    pub fn cubic(side: f64) -> Result<Self, EwaldError> {
        Self::cuboid(side, side, side)
    }

    /// Rectangular box with side lengths `x`, `y`, and `z`
    pub fn cuboid(x: f64, y: f64, z: f64) -> Result<Self, EwaldError> {
        Self::new(
            Point::new(x, 0.0, 0.0),
            Point::new(0.0, y, 0.0),
            Point::new(0.0, 0.0, z),
        )
    }

    /// The three (reduced) lattice vectors
    pub fn vectors(&self) -> [Point; 3] {
        [self.a, self.b, self.c]
    }

    /// Reciprocal lattice vectors, `a*`, `b*`, `c*`, without the factor 2π.
    ///
    /// They satisfy `a*·a = 1`, `a*·b = 0` etc.
    pub fn reciprocal_vectors(&self) -> [Point; 3] {
        [0, 1, 2].map(|i| self.inverse.row(i).transpose())
    }

    /// Diagonal elements, `(ax, by, cz)`
    pub fn diagonal(&self) -> Point {
        Point::new(self.a.x, self.b.y, self.c.z)
    }

    /// Perpendicular widths, i.e. distances between opposite faces
    pub fn widths(&self) -> Point {
        let [ra, rb, rc] = self.reciprocal_vectors();
        Point::new(1.0 / ra.norm(), 1.0 / rb.norm(), 1.0 / rc.norm())
    }

    /// Smallest distance between opposite faces
    pub fn min_width(&self) -> f64 {
        self.widths().min()
    }

    /// True if any off-diagonal element is non-zero after reduction
    pub fn is_triclinic(&self) -> bool {
        self.triclinic
    }

    /// Fractional coordinates of a Cartesian point (not wrapped)
    pub fn fractional(&self, point: &Point) -> Point {
        self.inverse * point
    }

    /// Fractional coordinates wrapped into `[0, 1)`
    pub fn wrapped_fractional(&self, point: &Point) -> Point {
        self.fractional(point).map(|s| {
            let s = s - s.floor();
            // `s - floor(s)` may round to exactly one for tiny negative `s`
            if s >= 1.0 {
                0.0
            } else {
                s
            }
        })
    }

    /// Cartesian coordinates from fractional coordinates
    pub fn cartesian(&self, fractional: &Point) -> Point {
        self.matrix * fractional
    }
}

impl Shape for PeriodicBox {
    fn volume(&self) -> Option<f64> {
        Some(self.a.x * self.b.y * self.c.z)
    }
}

impl BoundaryConditions for PeriodicBox {
    fn boundary(&self, point: &mut Point) {
        *point -= self.c * (point.z / self.c.z).round();
        *point -= self.b * (point.y / self.b.y).round();
        *point -= self.a * (point.x / self.a.x).round();
        if !self.triclinic {
            return;
        }
        // skewed cells: the nearest image may be a neighbor of the wrapped one
        let wrapped = *point;
        let mut shortest = wrapped.norm_squared();
        for (i, j, k) in iproduct!(-1..=1, -1..=1, -1..=1) {
            let image = wrapped + self.a * i as f64 + self.b * j as f64 + self.c * k as f64;
            let r2 = image.norm_squared();
            if r2 < shortest {
                shortest = r2;
                *point = image;
            }
        }
    }
}

/// Serialized form of a cell. Exactly one field must be given.
#[derive(Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
struct RawCell {
    #[serde(skip_serializing_if = "Option::is_none")]
    cubic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cuboid: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vectors: Option<[[f64; 3]; 3]>,
}

impl From<PeriodicBox> for RawCell {
    fn from(cell: PeriodicBox) -> Self {
        Self {
            vectors: Some(cell.vectors().map(|v| [v.x, v.y, v.z])),
            ..Default::default()
        }
    }
}

impl TryFrom<RawCell> for PeriodicBox {
    type Error = EwaldError;
    fn try_from(raw: RawCell) -> Result<Self, Self::Error> {
        match (raw.cubic, raw.cuboid, raw.vectors) {
            (Some(side), None, None) => Self::cubic(side),
            (None, Some([x, y, z]), None) => Self::cuboid(x, y, z),
            (None, None, Some([a, b, c])) => {
                Self::new(Point::from(a), Point::from(b), Point::from(c))
            }
            _ => Err(EwaldError::InvalidCell(
                "give exactly one of `cubic`, `cuboid`, or `vectors`".to_string(),
            )),
        }
    }
}

impl<'de> Deserialize<'de> for PeriodicBox {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawCell::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cubic_box() {
        let cell = PeriodicBox::cubic(6.0).unwrap();
        assert_eq!(cell.volume(), Some(216.0));
        assert!(!cell.is_triclinic());
        assert_relative_eq!(cell.min_width(), 6.0);

        let mut d = Point::new(5.0, -4.0, 2.9);
        cell.boundary(&mut d);
        assert_relative_eq!(d, Point::new(-1.0, 2.0, 2.9), epsilon = 1e-12);
        assert_relative_eq!(
            cell.distance_squared(&Point::new(0.5, 0.0, 0.0), &Point::new(5.5, 0.0, 0.0)),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn invalid_cells() {
        assert!(PeriodicBox::cubic(0.0).is_err());
        assert!(PeriodicBox::cubic(f64::NAN).is_err());
        assert!(PeriodicBox::cuboid(1.0, -2.0, 3.0).is_err());
        let not_triangular = PeriodicBox::new(
            Point::new(3.0, 0.1, 0.0),
            Point::new(0.0, 3.0, 0.0),
            Point::new(0.0, 0.0, 3.0),
        );
        assert!(matches!(not_triangular, Err(EwaldError::InvalidCell(_))));
    }

    #[test]
    fn reduction() {
        let cell = PeriodicBox::new(
            Point::new(4.0, 0.0, 0.0),
            Point::new(5.0, 4.0, 0.0),
            Point::new(-3.0, 7.0, 4.0),
        )
        .unwrap();
        let [a, b, c] = cell.vectors();
        assert!(a.x >= 2.0 * b.x.abs());
        assert!(a.x >= 2.0 * c.x.abs());
        assert!(b.y >= 2.0 * c.y.abs());
        assert_relative_eq!(b, Point::new(1.0, 4.0, 0.0));
        // c - 2b = (-13, -1, 4), then c + 3a = (-1, -1, 4)
        assert_relative_eq!(c, Point::new(-1.0, -1.0, 4.0));
        assert_relative_eq!(cell.volume().unwrap(), 64.0);
        assert!(cell.is_triclinic());
    }

    #[test]
    fn reciprocal_vectors_are_dual() {
        let cell = PeriodicBox::new(
            Point::new(3.0, 0.0, 0.0),
            Point::new(1.0, 2.5, 0.0),
            Point::new(-0.5, 0.8, 2.8),
        )
        .unwrap();
        let real = cell.vectors();
        let recip = cell.reciprocal_vectors();
        for (i, j) in iproduct!(0..3, 0..3) {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(recip[i].dot(&real[j]), expected, epsilon = 1e-12);
        }
        let p = Point::new(0.3, -1.7, 4.1);
        assert_relative_eq!(cell.cartesian(&cell.fractional(&p)), p, epsilon = 1e-12);
        let s = cell.wrapped_fractional(&p);
        assert!(s.iter().all(|s| (0.0..1.0).contains(s)));
    }

    #[test]
    fn triclinic_minimum_image() {
        let cell = PeriodicBox::new(
            Point::new(3.0, 0.0, 0.0),
            Point::new(1.4, 2.6, 0.0),
            Point::new(-1.2, 1.1, 2.4),
        )
        .unwrap();
        let p1 = Point::new(0.1, 0.2, 0.3);
        let p2 = Point::new(2.7, 2.3, 2.2);
        let d = cell.distance(&p1, &p2);
        // brute force over a generous set of images
        let [a, b, c] = cell.vectors();
        let brute = iproduct!(-3..=3, -3..=3, -3..=3)
            .map(|(i, j, k)| (p1 - p2 + a * i as f64 + b * j as f64 + c * k as f64).norm())
            .fold(f64::INFINITY, f64::min);
        assert_relative_eq!(d.norm(), brute, epsilon = 1e-12);
    }

    #[test]
    fn yaml_round_trip() {
        let cell: PeriodicBox = serde_yaml::from_str("cubic: 6.0").unwrap();
        assert_eq!(cell, PeriodicBox::cubic(6.0).unwrap());
        let cell: PeriodicBox = serde_yaml::from_str("cuboid: [2.0, 3.0, 4.0]").unwrap();
        assert_relative_eq!(cell.volume().unwrap(), 24.0);
        let yaml = serde_yaml::to_string(&cell).unwrap();
        let back: PeriodicBox = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cell);
        assert!(serde_yaml::from_str::<PeriodicBox>("{cubic: 2.0, cuboid: [1, 2, 3]}").is_err());
    }
}
