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

//! Two ions in a large box compared with reference forces and energy.

mod common;

use approx::assert_relative_eq;
use ewald::{
    platform::{parallel::ParallelPlatform, reference::ReferencePlatform},
    select_parameters, ExclusionSet, Method, Platform, Point, Snapshot,
};
use float_cmp::assert_approx_eq;

/// Force on the cation (kJ/mol/nm); the anion feels the opposite force
const REFERENCE_FORCE: [f64; 3] = [-123.711, 64.188, -302.716];
/// Energy reported by an established implementation (kJ/mol)
const REFERENCE_ENERGY: f64 = -217.276;
/// Fully converged energy of this configuration (kJ/mol)
const CONVERGED_ENERGY: f64 = -216.303;

#[test]
fn forces_and_energy() {
    let system = common::two_ions();
    let exclusions = ExclusionSet::default();
    let snapshot = Snapshot::new(&system.positions, &system.charges, &system.cell, &exclusions);
    let parameters = select_parameters(&system.cell, 2.0, 1e-5).unwrap();
    let platforms: [&dyn Platform; 2] = [&ReferencePlatform, &ParallelPlatform];

    for (platform, method) in itertools::iproduct!(platforms, [Method::Ewald, Method::Pme]) {
        let result = platform.evaluate(&snapshot, &parameters, method).unwrap();
        let expected = Point::from(REFERENCE_FORCE);
        assert_relative_eq!(result.forces[0], expected, epsilon = 1e-2);
        assert_relative_eq!(result.forces[1], -expected, epsilon = 1e-2);
        assert_approx_eq!(f64, result.energy, CONVERGED_ENERGY, epsilon = 1e-2);
        assert_relative_eq!(result.energy, REFERENCE_ENERGY, max_relative = 1e-2);
        // pair attraction dominates the total
        assert!(result.terms.real_space < 0.0);
        assert_eq!(result.terms.exclusion, 0.0);
    }
}

#[test]
fn command_line_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.yaml");
    let input = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/files/two_ions.yaml");
    common::run_ewald(&["-o", output.to_str().unwrap(), "run", "-i", input]);

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let energy = yaml["evaluation"]["energy"].as_f64().unwrap();
    assert_approx_eq!(f64, energy, CONVERGED_ENERGY, epsilon = 1e-2);
    let force_x = yaml["evaluation"]["forces"][0][0].as_f64().unwrap();
    assert_approx_eq!(f64, force_x, REFERENCE_FORCE[0], epsilon = 1e-2);
    assert!(yaml["parameters"]["alpha"].as_f64().unwrap() > 0.0);
}

#[test]
fn command_line_params() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("params.yaml");
    let input = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/files/two_ions.yaml");
    common::run_ewald(&["-o", output.to_str().unwrap(), "params", "-i", input]);
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(yaml["parameters"]["pme_order"].as_u64(), Some(5));
    assert_eq!(yaml["parameters"]["cutoff"].as_f64(), Some(2.0));
}

#[test]
fn command_line_compare() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("compare.yaml");
    let input = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/files/two_ions.yaml");
    common::run_ewald(&["-o", output.to_str().unwrap(), "compare", "-i", input]);
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(yaml["methods"]["second"].as_str(), Some("parallel (PME)"));
    assert!(yaml["methods"]["max_force_deviation"].as_f64().unwrap() < 1e-2);
    assert!(yaml["methods"]["relative_energy_deviation"].as_f64().unwrap() < 1e-5);
    assert!(yaml["pme_backends"]["max_force_deviation"].as_f64().is_some());
}
