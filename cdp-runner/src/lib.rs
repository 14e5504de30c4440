//! CDP Runner: configuration, scenario runs, stress runs and export.
//!
//! This crate builds on `cdp-core` to provide:
//! - TOML ledger configuration with decimal-string amounts
//! - Scenario files with per-step error expectations
//! - A deterministic scenario runner with per-step invariant checks
//! - Seeded parallel stress runs
//! - BLAKE3 fingerprints of scenarios and ledger state
//! - JSON and CSV artifacts

pub mod config;
pub mod export;
pub mod fingerprint;
pub mod runner;
pub mod scenario;
pub mod stress;

pub use config::{AssetConfig, ConfigError, FeeConfig, Fixed, LedgerConfig, SplitConfig};
pub use export::{export_json, export_positions_csv, export_steps_csv, save_artifacts};
pub use fingerprint::{digest_of, state_digest, sub_seed};
pub use runner::{
    run_scenario, LedgerHarness, RunError, ScenarioReport, StepError, StepOutput, StepRecord,
    StepResult,
};
pub use scenario::{Action, Scenario, Step};
pub use stress::{run_stress, StressConfig, StressReport, StressRun};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<LedgerConfig>();
        assert_sync::<LedgerConfig>();
        assert_send::<StressConfig>();
        assert_sync::<StressConfig>();
    }

    #[test]
    fn scenario_is_send_sync() {
        assert_send::<Scenario>();
        assert_sync::<Scenario>();
    }

    #[test]
    fn harness_is_send_sync() {
        assert_send::<LedgerHarness>();
        assert_sync::<LedgerHarness>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<ScenarioReport>();
        assert_sync::<ScenarioReport>();
        assert_send::<StressReport>();
        assert_sync::<StressReport>();
    }
}
