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

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ewald::{
    config::InputConfig,
    oracle::{
        compare_backends, compare_methods, error_scaling, finite_difference_check, Criteria,
    },
    platform::{parallel::ParallelPlatform, reference::ReferencePlatform},
    Method, Platform, Snapshot,
};
use indicatif::ProgressBar;
use pretty_env_logger::env_logger::DEFAULT_FILTER_ENV;
use std::{io::Write, path::PathBuf};

/// Available backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformChoice {
    Reference,
    Parallel,
}

impl PlatformChoice {
    fn platform(&self) -> &'static dyn Platform {
        match self {
            PlatformChoice::Reference => &ReferencePlatform,
            PlatformChoice::Parallel => &ParallelPlatform,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print splitting parameter, k-vectors and PME grid
    #[clap(arg_required_else_help = true)]
    Params {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
    },
    /// Calculate energy and forces
    #[clap(arg_required_else_help = true)]
    Run {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
        /// Backend used for the evaluation
        #[clap(long, value_enum, default_value = "reference")]
        platform: PlatformChoice,
        /// Override the reciprocal-space method of the input file
        #[clap(long, value_enum)]
        method: Option<Method>,
    },
    /// Cross-check backends and test that forces are the gradient of the energy
    #[clap(arg_required_else_help = true)]
    Compare {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
        /// Absolute force tolerance (kJ/mol/nm)
        #[clap(long, default_value = "1e-2")]
        force_tolerance: f64,
        /// Relative energy tolerance
        #[clap(long, default_value = "1e-5")]
        energy_tolerance: f64,
        /// Finite difference step (nm)
        #[clap(long, default_value = "1e-3")]
        delta: f64,
        /// Relative tolerance of the finite difference check
        #[clap(long, default_value = "1e-3")]
        gradient_tolerance: f64,
        /// Absolute force tolerance between PME and direct Ewald (kJ/mol/nm)
        #[clap(long, default_value = "1.0")]
        method_force_tolerance: f64,
        /// Relative energy tolerance between PME and direct Ewald
        #[clap(long, default_value = "5e-4")]
        method_energy_tolerance: f64,
    },
    /// Measure how forces converge with the error tolerance
    #[clap(arg_required_else_help = true)]
    Scan {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
        /// Error tolerances; the tightest one is the reference
        #[clap(long, value_delimiter = ',', default_value = "5e-5,1e-4,2e-4,4e-4,8e-4")]
        tolerances: Vec<f64>,
        /// Cutoff distances; default is the cutoff of the input file
        #[clap(long, value_delimiter = ',')]
        cutoffs: Vec<f64>,
        /// Allowed deviation in units of the looser tolerance
        #[clap(long, default_value = "5.0")]
        factor: f64,
        /// Backend used for the evaluations
        #[clap(long, value_enum, default_value = "parallel")]
        platform: PlatformChoice,
    },
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Verbose output. See more with e.g. RUST_LOG=Trace
    #[clap(long, short = 'v', action)]
    pub verbose: bool,
    /// Output file in YAML format
    #[clap(long, short = 'o', default_value = "output.yaml")]
    pub output: PathBuf,
}

fn main() {
    if let Err(err) = do_main() {
        eprintln!("Error: {}", &err);
        std::process::exit(1);
    }
}

fn do_main() -> Result<()> {
    let args = Args::parse();
    if args.verbose && std::env::var(DEFAULT_FILTER_ENV).is_err() {
        std::env::set_var(DEFAULT_FILTER_ENV, "Debug");
    }
    pretty_env_logger::init();

    let mut yaml_output = std::fs::File::create(args.output)?;

    match args.command {
        Commands::Params { input } => params(input, &mut yaml_output),
        Commands::Run {
            input,
            platform,
            method,
        } => run(input, platform, method, &mut yaml_output),
        Commands::Compare {
            input,
            force_tolerance,
            energy_tolerance,
            delta,
            gradient_tolerance,
            method_force_tolerance,
            method_energy_tolerance,
        } => {
            let criteria = Criteria {
                force_tolerance,
                energy_tolerance,
            };
            let method_criteria = Criteria {
                force_tolerance: method_force_tolerance,
                energy_tolerance: method_energy_tolerance,
            };
            compare(
                input,
                criteria,
                method_criteria,
                delta,
                gradient_tolerance,
                &mut yaml_output,
            )
        }
        Commands::Scan {
            input,
            tolerances,
            cutoffs,
            factor,
            platform,
        } => scan(input, &tolerances, &cutoffs, factor, platform, &mut yaml_output),
    }
}

/// Helper function to serialize data to an existing YAML file
fn write_yaml<T: serde::Serialize>(
    data: &T,
    output: &mut std::fs::File,
    key: Option<&str>,
) -> Result<()> {
    match key {
        Some(key) => {
            let mut wrapper = std::collections::BTreeMap::new();
            wrapper.insert(key.to_string(), data);
            let yaml = serde_yaml::to_string(&wrapper)?;
            output.write_all(yaml.as_bytes())?;
        }
        None => {
            let yaml = serde_yaml::to_string(data)?;
            output.write_all(yaml.as_bytes())?;
        }
    }
    Ok(())
}

fn params(input: PathBuf, yaml_output: &mut std::fs::File) -> Result<()> {
    let config = InputConfig::from_file(&input)?;
    let parameters = config.parameters()?;
    log::info!(
        "alpha = {:.6} nm⁻¹, kmax = {:?}, PME grid = {:?}",
        parameters.alpha(),
        parameters.kmax(),
        parameters.grid()
    );
    write_yaml(config.cell(), yaml_output, Some("cell"))?;
    write_yaml(&parameters, yaml_output, Some("parameters"))?;
    Ok(())
}

fn run(
    input: PathBuf,
    platform: PlatformChoice,
    method: Option<Method>,
    yaml_output: &mut std::fs::File,
) -> Result<()> {
    let config = InputConfig::from_file(&input)?;
    let parameters = config.parameters()?;
    let method = method.unwrap_or(*config.method());
    let (positions, charges) = (config.positions(), config.charges());
    let snapshot = Snapshot::new(&positions, &charges, config.cell(), config.exclusions());
    let platform = platform.platform();

    let evaluation = platform.evaluate(&snapshot, &parameters, method)?;
    log::info!(
        "{} energy on platform `{}`: {:.6} kJ/mol",
        method,
        platform.name(),
        evaluation.energy
    );
    write_yaml(&parameters, yaml_output, Some("parameters"))?;
    write_yaml(&method, yaml_output, Some("method"))?;
    write_yaml(&evaluation, yaml_output, Some("evaluation"))?;
    Ok(())
}

fn compare(
    input: PathBuf,
    criteria: Criteria,
    method_criteria: Criteria,
    delta: f64,
    gradient_tolerance: f64,
    yaml_output: &mut std::fs::File,
) -> Result<()> {
    let config = InputConfig::from_file(&input)?;
    let parameters = config.parameters()?;
    let (positions, charges) = (config.positions(), config.charges());
    let snapshot = Snapshot::new(&positions, &charges, config.cell(), config.exclusions());

    let mut failures = Vec::new();
    for method in [Method::Ewald, Method::Pme] {
        let comparison = compare_backends(
            &snapshot,
            &parameters,
            &ReferencePlatform,
            &ParallelPlatform,
            method,
            criteria,
        )?;
        log::info!(
            "{}: max |ΔF| = {:.3e} (particle {}), relative ΔE = {:.3e}",
            method,
            comparison.max_force_deviation,
            comparison.particle,
            comparison.relative_energy_deviation
        );
        let gradient = finite_difference_check(
            &ParallelPlatform,
            &snapshot,
            &parameters,
            method,
            delta,
            gradient_tolerance,
        )?;
        log::info!(
            "{}: energy slope {:.6} vs |F| = {:.6}",
            method,
            gradient.slope,
            gradient.force_norm
        );
        let key = method.to_string().to_lowercase();
        write_yaml(&comparison, yaml_output, Some(&format!("{key}_backends")))?;
        write_yaml(&gradient, yaml_output, Some(&format!("{key}_gradient")))?;
        if let Err(err) = comparison.into_result() {
            failures.push(err.to_string());
        }
        if let Err(err) = gradient.into_result() {
            failures.push(err.to_string());
        }
    }
    let methods = compare_methods(&snapshot, &parameters, &ParallelPlatform, method_criteria)?;
    log::info!(
        "PME vs Ewald: max |ΔF| = {:.3e} (particle {}), relative ΔE = {:.3e}",
        methods.max_force_deviation,
        methods.particle,
        methods.relative_energy_deviation
    );
    write_yaml(&methods, yaml_output, Some("methods"))?;
    if let Err(err) = methods.into_result() {
        failures.push(err.to_string());
    }
    if !failures.is_empty() {
        anyhow::bail!("{} check(s) failed:\n{}", failures.len(), failures.join("\n"));
    }
    Ok(())
}

fn scan(
    input: PathBuf,
    tolerances: &[f64],
    cutoffs: &[f64],
    factor: f64,
    platform: PlatformChoice,
    yaml_output: &mut std::fs::File,
) -> Result<()> {
    let config = InputConfig::from_file(&input)?;
    let cutoffs = if cutoffs.is_empty() {
        vec![*config.cutoff()]
    } else {
        cutoffs.to_vec()
    };
    let (positions, charges) = (config.positions(), config.charges());
    let snapshot = Snapshot::new(&positions, &charges, config.cell(), config.exclusions());
    let method = *config.method();

    let pb = ProgressBar::new(cutoffs.len() as u64);
    let mut reports = Vec::with_capacity(cutoffs.len());
    for cutoff in cutoffs {
        let report = error_scaling(
            platform.platform(),
            &snapshot,
            cutoff,
            tolerances,
            method,
            factor,
        )?;
        for entry in &report.entries {
            log::debug!(
                "cutoff {:.2}, tolerance {:.1e}: deviation {:.3e} (limit {:.3e})",
                cutoff,
                entry.tolerance,
                entry.relative_deviation,
                entry.limit
            );
        }
        reports.push(report);
        pb.inc(1);
    }
    pb.finish_and_clear();
    write_yaml(&reports, yaml_output, Some("scan"))?;
    let failed = reports.iter().filter(|report| !report.passed()).count();
    if failed > 0 {
        anyhow::bail!("force deviations exceed {factor} × tolerance for {failed} cutoff(s)");
    }
    log::info!("all {} cutoffs passed", reports.len());
    Ok(())
}
