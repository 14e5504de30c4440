//! CDP CLI: scenario, stress and configuration commands.
//!
//! Commands:
//! - `run`: execute a scenario file and save its artifacts
//! - `stress`: seeded random runs against a ledger configuration
//! - `check-config`: validate a ledger configuration and print a summary

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use cdp_core::math::format_fixed;
use cdp_runner::export::export_stress_json;
use cdp_runner::{
    run_scenario, run_stress, save_artifacts, LedgerConfig, LedgerHarness, Scenario,
    ScenarioReport, StepResult, StressConfig,
};

#[derive(Parser)]
#[command(name = "cdp", about = "CDP ledger: scenario runner and stress tester")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a scenario file.
    Run {
        /// Path to a TOML scenario file.
        #[arg(long)]
        scenario: PathBuf,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run seeded random action sequences and check invariants.
    Stress {
        /// Path to a TOML ledger configuration.
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 8)]
        runs: usize,

        /// Random actions per run.
        #[arg(long, default_value_t = 200)]
        steps: usize,

        #[arg(long, default_value_t = 5)]
        accounts: usize,

        /// Write the stress report as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a ledger configuration.
    CheckConfig {
        /// Path to a TOML ledger configuration.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run {
            scenario,
            output_dir,
            no_save,
        } => run_scenario_cmd(&scenario, &output_dir, no_save),
        Commands::Stress {
            config,
            seed,
            runs,
            steps,
            accounts,
            output,
        } => run_stress_cmd(
            &config,
            StressConfig {
                master_seed: seed,
                runs,
                steps,
                accounts,
            },
            output.as_deref(),
        ),
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cdp_runner=info,cdp_core=warn".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_scenario_cmd(path: &Path, output_dir: &Path, no_save: bool) -> Result<()> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;
    let report = run_scenario(&scenario)
        .with_context(|| format!("scenario '{}' failed", scenario.name))?;

    print_summary(&report);

    if !no_save {
        let run_dir = save_artifacts(&report, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_stress_cmd(config_path: &Path, config: StressConfig, output: Option<&Path>) -> Result<()> {
    let ledger = LedgerConfig::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    info!(seed = config.master_seed, runs = config.runs, "stress starting");
    let report = run_stress(&ledger, &config)?;

    println!("{:<6} {:>20} {:>8} {:>8} {:>10}  state", "run", "seed", "actions", "ok", "positions");
    for run in &report.runs {
        println!(
            "{:<6} {:>20} {:>8} {:>8} {:>10}  {}",
            run.index,
            run.seed,
            run.actions,
            run.succeeded,
            run.open_positions,
            &run.state_digest[..12.min(run.state_digest.len())]
        );
        for violation in &run.violations {
            println!("    ! {violation}");
        }
    }

    if let Some(path) = output {
        std::fs::write(path, export_stress_json(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    if !report.is_clean() {
        bail!("invariant violations found; rerun with --seed {} to reproduce", config.master_seed);
    }
    Ok(())
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = LedgerConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let harness = LedgerHarness::build(&config)?;

    println!("governance owner:  {}", config.governance_owner);
    println!(
        "fee recipient:     {}",
        config
            .fee_recipient
            .as_ref()
            .unwrap_or(&config.governance_owner)
    );
    println!("minimum ratio:     {}", config.minimum_collateral_ratio);
    println!("borrowing spread:  {}", config.fees.borrowing_spread);
    println!("redemption spread: {}", config.fees.redemption_spread);
    println!("redemption rebate: {}", config.fees.redemption_rebate);
    for asset in harness.assets() {
        let price = config
            .assets
            .iter()
            .find(|a| &a.id == asset)
            .and_then(|a| a.price)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unset".into());
        println!("asset {asset}: price {price}");
    }
    Ok(())
}

fn print_summary(report: &ScenarioReport) {
    println!("Scenario: {}", report.scenario);
    println!(
        "Steps: {} ({} expected failures)",
        report.steps.len(),
        report.failed_steps()
    );
    for step in &report.steps {
        if let StepResult::Failed { kind, message } = &step.result {
            println!("  #{:<3} {:<24} {kind:?}: {message}", step.index, step.op);
        }
    }
    for asset in &report.final_state.assets {
        println!(
            "{}: {} positions, collateral {}, debt {}",
            asset.asset,
            asset.positions.len(),
            format_fixed(asset.total_collateral),
            format_fixed(asset.total_debt)
        );
    }
    println!("Stablecoin supply: {}", format_fixed(report.stable.supply));
    println!("State digest: {}", report.state_digest);
}
