//! oltc-sim entry point: CLI wiring and config-driven scenario runs.

use std::path::Path;
use std::process;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use oltc_sim::cli::{self, CliOptions};
use oltc_sim::config::ScenarioConfig;
use oltc_sim::io::export::export_csv;
use oltc_sim::runner::run_scenario;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_scenario(cli: &CliOptions) -> Result<ScenarioConfig, String> {
    // --scenario takes priority, then --preset, then baseline default
    let loaded = if let Some(ref path) = cli.scenario {
        ScenarioConfig::from_toml_file(path)
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    loaded.map_err(|e| e.to_string())
}

fn main() {
    let cli = match cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };
    if cli.help {
        cli::print_usage();
        process::exit(0);
    }

    init_tracing();

    let mut scenario = match load_scenario(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }
    if cli.verbose {
        scenario.simulation.verbose = true;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let report = match run_scenario(&scenario) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("simulation aborted: {e}");
            eprintln!("error: {e}");
            process::exit(2);
        }
    };

    // Only ticks where a controller published a tap position
    for r in report.records.iter().filter(|r| r.tap_output.is_some()) {
        println!("{r}");
    }

    println!("\n{}", report.summary);

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&report.records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {}", path.display());
    }
}
