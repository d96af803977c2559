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

//! Physical invariances and input validation of complete evaluations.

mod common;

use approx::assert_relative_eq;
use ewald::{
    cell::{BoundaryConditions, PeriodicBox},
    platform::{parallel::ParallelPlatform, reference::ReferencePlatform},
    select_parameters, ExclusionSet, EwaldError, Method, Platform, Point, Snapshot,
    COULOMB_PREFACTOR,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use statrs::function::erf::erf;

/// Madelung constant of a simple cubic lattice of like charges in a neutralising background
const SIMPLE_CUBIC_MADELUNG: f64 = 2.837_297_479;

#[test]
fn translation_invariance() {
    let system = common::random_charges(11);
    let exclusions = ExclusionSet::default();
    let snapshot = Snapshot::new(&system.positions, &system.charges, &system.cell, &exclusions);
    let parameters = select_parameters(&system.cell, 2.0, 1e-6).unwrap();
    let shift = Point::new(1.3, -2.1, 7.9);
    let shifted: Vec<Point> = system.positions.iter().map(|p| p + shift).collect();

    let first = ReferencePlatform
        .evaluate(&snapshot, &parameters, Method::Ewald)
        .unwrap();
    let second = ReferencePlatform
        .evaluate(&snapshot.with_positions(&shifted), &parameters, Method::Ewald)
        .unwrap();
    assert_relative_eq!(first.energy, second.energy, max_relative = 1e-9);
    for (a, b) in first.forces.iter().zip(&second.forces) {
        assert_relative_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn excluded_pair_removes_direct_coulomb_interaction() {
    let system = common::two_ions();
    let parameters = select_parameters(&system.cell, 2.0, 1e-5).unwrap();
    let none = ExclusionSet::default();
    let excluded = ExclusionSet::from_pairs([(1, 0)]).unwrap();
    let full = Snapshot::new(&system.positions, &system.charges, &system.cell, &none);
    let partial = Snapshot::new(&system.positions, &system.charges, &system.cell, &excluded);

    let distance = system
        .cell
        .distance(&system.positions[0], &system.positions[1]);
    let bare_energy = COULOMB_PREFACTOR * system.charges[0] * system.charges[1] / distance.norm();
    let bare_force = distance * bare_energy / distance.norm_squared();
    let screened_energy = bare_energy * erf(parameters.alpha() * distance.norm());

    let platforms: [&dyn Platform; 2] = [&ReferencePlatform, &ParallelPlatform];
    for (platform, method) in itertools::iproduct!(platforms, [Method::Ewald, Method::Pme]) {
        let with_pair = platform.evaluate(&full, &parameters, method).unwrap();
        let without_pair = platform.evaluate(&partial, &parameters, method).unwrap();
        assert_eq!(without_pair.terms.real_space, 0.0);
        assert_relative_eq!(
            without_pair.terms.exclusion,
            -screened_energy,
            max_relative = 1e-12
        );
        assert!(without_pair.terms.exclusion > 0.0);
        assert_relative_eq!(
            without_pair.energy,
            with_pair.energy - bare_energy,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            without_pair.forces[0],
            with_pair.forces[0] - bare_force,
            epsilon = 1e-8
        );
        if method == Method::Ewald {
            assert_relative_eq!(without_pair.forces[0], -without_pair.forces[1], epsilon = 1e-8);
        }
    }
}

/// A lone ion interacts with its own images and the neutralising background only
#[test]
fn single_ion_madelung_energy() {
    let side = 4.0;
    let cell = PeriodicBox::cubic(side).unwrap();
    let positions = [Point::new(1.0, 2.0, 0.5)];
    let charges = [1.0];
    let exclusions = ExclusionSet::default();
    let snapshot = Snapshot::new(&positions, &charges, &cell, &exclusions);
    let parameters = select_parameters(&cell, 1.5, 1e-6).unwrap();
    let expected = -COULOMB_PREFACTOR * SIMPLE_CUBIC_MADELUNG / (2.0 * side);
    let alpha = *parameters.alpha();
    let background =
        -COULOMB_PREFACTOR * std::f64::consts::PI / (2.0 * side.powi(3) * alpha * alpha);

    for (method, accuracy) in [(Method::Ewald, 1e-6), (Method::Pme, 1e-3)] {
        let result = ReferencePlatform
            .evaluate(&snapshot, &parameters, method)
            .unwrap();
        assert_eq!(result.terms.real_space, 0.0);
        assert_relative_eq!(result.terms.net_charge, background, max_relative = 1e-12);
        assert_relative_eq!(result.energy, expected, max_relative = accuracy);
        assert_relative_eq!(result.forces[0], Point::zeros(), epsilon = 1e-2);
    }
}

#[test]
fn equivalent_triclinic_lattices() {
    let reduced = PeriodicBox::new(
        Point::new(4.0, 0.0, 0.0),
        Point::new(1.0, 4.0, 0.0),
        Point::new(-1.0, -1.0, 4.0),
    )
    .unwrap();
    let skewed = PeriodicBox::new(
        Point::new(4.0, 0.0, 0.0),
        Point::new(5.0, 4.0, 0.0),
        Point::new(-3.0, 7.0, 4.0),
    )
    .unwrap();
    assert!(reduced.is_triclinic());

    let mut rng = StdRng::seed_from_u64(5);
    let positions: Vec<Point> = (0..30)
        .map(|_| reduced.cartesian(&Point::from_fn(|_, _| rng.gen_range(0.0..1.0))))
        .collect();
    let charges: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let exclusions = ExclusionSet::default();
    let parameters = select_parameters(&reduced, 1.5, 1e-6).unwrap();

    let first = ParallelPlatform
        .evaluate(
            &Snapshot::new(&positions, &charges, &reduced, &exclusions),
            &parameters,
            Method::Ewald,
        )
        .unwrap();
    let second = ParallelPlatform
        .evaluate(
            &Snapshot::new(&positions, &charges, &skewed, &exclusions),
            &parameters,
            Method::Ewald,
        )
        .unwrap();
    assert_relative_eq!(first.energy, second.energy, max_relative = 1e-10);

    let pme = ReferencePlatform
        .evaluate(
            &Snapshot::new(&positions, &charges, &reduced, &exclusions),
            &parameters,
            Method::Pme,
        )
        .unwrap();
    assert_relative_eq!(first.energy, pme.energy, epsilon = 1e-2, max_relative = 1e-3);
    for (a, b) in first.forces.iter().zip(&pme.forces) {
        assert_relative_eq!(a, b, epsilon = 1.0);
    }
}

#[test]
fn parameter_selection_is_deterministic() {
    let cell = PeriodicBox::cuboid(3.0, 4.0, 5.0).unwrap();
    let first = select_parameters(&cell, 1.2, 1e-5).unwrap();
    let second = select_parameters(&cell, 1.2, 1e-5).unwrap();
    assert_eq!(first, second);
    assert!(first.kmax()[0] <= first.kmax()[1] && first.kmax()[1] <= first.kmax()[2]);
    assert!(first.grid().iter().all(|&n| n >= *first.pme_order()));
}

#[test]
fn invalid_input_is_rejected() {
    let system = common::two_ions();
    let parameters = select_parameters(&system.cell, 2.0, 1e-5).unwrap();
    let exclusions = ExclusionSet::default();

    let snapshot = Snapshot::new(&system.positions, &[1.0], &system.cell, &exclusions);
    assert!(matches!(
        ReferencePlatform.evaluate(&snapshot, &parameters, Method::Ewald),
        Err(EwaldError::InvalidSnapshot(_))
    ));

    let out_of_range = ExclusionSet::from_pairs([(0, 2)]).unwrap();
    let snapshot = Snapshot::new(&system.positions, &system.charges, &system.cell, &out_of_range);
    assert_eq!(
        ParallelPlatform.evaluate(&snapshot, &parameters, Method::Pme),
        Err(EwaldError::InvalidExclusion(0, 2, 2))
    );

    assert_eq!(
        ExclusionSet::from_pairs([(1, 1)]),
        Err(EwaldError::SelfExclusion(1))
    );

    let small = PeriodicBox::cubic(3.0).unwrap();
    let snapshot = Snapshot::new(&system.positions, &system.charges, &small, &exclusions);
    assert!(matches!(
        ReferencePlatform.evaluate(&snapshot, &parameters, Method::Ewald),
        Err(EwaldError::InvalidParameter { name: "cutoff", .. })
    ));
    assert!(select_parameters(&system.cell, 2.0, 1.5).is_err());
    assert!(select_parameters(&system.cell, -1.0, 1e-5).is_err());
}
