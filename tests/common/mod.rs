//! Shared systems and helpers for integration tests.
//!
//! All random configurations use a seeded `StdRng` so results are reproducible.

#![allow(dead_code)]

use ewald::{cell::PeriodicBox, Point};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::path::PathBuf;
use std::process::Command;

/// Path to the compiled `ewald` binary.
pub fn ewald_binary() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_BIN_EXE_ewald"));
    if !path.exists() {
        path = PathBuf::from("target/debug/ewald");
    }
    path
}

/// Run the binary with the given arguments and assert success.
pub fn run_ewald(args: &[&str]) {
    let status = Command::new(ewald_binary())
        .args(args)
        .status()
        .expect("failed to execute ewald binary");
    assert!(status.success(), "ewald exited with status: {status}");
}

/// A system of point charges in a periodic cell
pub struct System {
    pub cell: PeriodicBox,
    pub positions: Vec<Point>,
    pub charges: Vec<f64>,
}

/// Sodium and chloride ions in a 6 nm cubic box
pub fn two_ions() -> System {
    System {
        cell: PeriodicBox::cubic(6.0).unwrap(),
        positions: vec![
            Point::new(3.048, 2.764, 3.156),
            Point::new(2.809, 2.888, 2.571),
        ],
        charges: vec![1.0, -1.0],
    }
}

/// Amorphous, rock salt-like arrangement of 447 cations and 447 anions.
///
/// Ions occupy randomly chosen sites of a 10×10×10 lattice in a 3.00646 nm box with
/// alternating site parity for the two species, and are then displaced randomly by up to
/// 15% of the lattice spacing along each axis.
pub fn ionic_crystal(seed: u64) -> System {
    const SITES: usize = 10;
    const IONS_PER_KIND: usize = 447;
    let side = 3.00646;
    let spacing = side / SITES as f64;
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut even, mut odd): (Vec<_>, Vec<_>) = itertools::iproduct!(0..SITES, 0..SITES, 0..SITES)
        .map(|(x, y, z)| {
            let site = Point::new(x as f64 + 0.5, y as f64 + 0.5, z as f64 + 0.5) * spacing;
            ((x + y + z) % 2 == 0, site)
        })
        .partition(|(is_even, _)| *is_even);
    even.shuffle(&mut rng);
    odd.shuffle(&mut rng);

    let positions = even[..IONS_PER_KIND]
        .iter()
        .chain(&odd[..IONS_PER_KIND])
        .map(|(_, site)| site + Point::from_fn(|_, _| rng.gen_range(-0.15..0.15) * spacing))
        .collect();
    let charges = std::iter::repeat(1.0)
        .take(IONS_PER_KIND)
        .chain(std::iter::repeat(-1.0).take(IONS_PER_KIND))
        .collect();
    System {
        cell: PeriodicBox::cubic(side).unwrap(),
        positions,
        charges,
    }
}

/// 51 particles with charges evenly spaced from -1 to +1 at random positions in a 5 nm box
pub fn random_charges(seed: u64) -> System {
    const NUM_PARTICLES: usize = 51;
    let side = 5.0;
    let mut rng = StdRng::seed_from_u64(seed);
    let positions = (0..NUM_PARTICLES)
        .map(|_| Point::from_fn(|_, _| rng.gen_range(0.0..side)))
        .collect();
    let charges = (0..NUM_PARTICLES)
        .map(|i| -1.0 + 2.0 * i as f64 / (NUM_PARTICLES - 1) as f64)
        .collect();
    System {
        cell: PeriodicBox::cubic(side).unwrap(),
        positions,
        charges,
    }
}
