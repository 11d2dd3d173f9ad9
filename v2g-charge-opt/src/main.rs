use std::env;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use v2g_charge_opt::general::report::{
    build_comparison_table, build_schedule_table, build_sweep_table, log_summary,
};
use v2g_charge_opt::{ChargingConfig, compare_models, run_target_soc_sweep, run_v2g_opt};

const SWEEP_TARGETS: [f64; 7] = [0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

const MODES: [&str; 3] = ["single", "compare", "sweep"];

/// Splits `[mode] [config.toml]` into a mode and an optional config path.
/// A first argument that is not a mode is taken as the config path.
fn parse_args(args: &[String]) -> (&str, Option<&String>) {
    match args.get(1) {
        Some(mode) if MODES.contains(&mode.as_str()) => (mode.as_str(), args.get(2)),
        Some(path) => ("single", Some(path)),
        None => ("single", None),
    }
}

fn load_config(path: Option<&String>) -> Result<ChargingConfig> {
    match path {
        Some(path) => ChargingConfig::from_toml_file(path)
            .with_context(|| format!("failed to load configuration from {path}")),
        None => Ok(ChargingConfig::default()),
    }
}

fn main() -> Result<()> {
    // Respects RUST_LOG
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = env::args().collect();
    let (mode, path) = parse_args(&args);
    let config = load_config(path)?;

    match mode {
        "compare" => {
            info!("Comparing unidirectional and bidirectional charging...");
            let comparison = compare_models(&config)?;
            println!("{}", build_comparison_table(&comparison));
            info!(
                saving = comparison.saving(),
                saving_percent = comparison.saving_percent(),
                "V2G saving over G2V"
            );
        }
        "sweep" => {
            info!("Sweeping departure SOC targets...");
            let points = run_target_soc_sweep(&config, &SWEEP_TARGETS);
            println!("{}", build_sweep_table(&points));
        }
        _ => {
            info!("Running bidirectional charge optimization...");
            let schedule = run_v2g_opt(&config)?;
            println!("{}", build_schedule_table(&schedule, &config.prices));
            log_summary(&schedule);
        }
    }

    info!("Optimization complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_mode_and_config_path() {
        let args = args(&["v2g-charge-opt", "compare", "cfg.toml"]);
        assert_eq!(parse_args(&args), ("compare", Some(&args[2])));
    }

    #[test]
    fn test_config_path_without_mode() {
        let args = args(&["v2g-charge-opt", "cfg.toml"]);
        assert_eq!(parse_args(&args), ("single", Some(&args[1])));
    }

    #[test]
    fn test_no_arguments_runs_reference_scenario() {
        let args = args(&["v2g-charge-opt"]);
        assert_eq!(parse_args(&args), ("single", None));
        assert_eq!(load_config(None).unwrap(), ChargingConfig::default());
    }
}
