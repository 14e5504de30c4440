//! Report export: JSON and CSV artifacts.
//!
//! - **JSON**: the full scenario or stress report
//! - **CSV**: final positions and the step log, for spreadsheets
//!
//! Fixed-point amounts are written as decimal strings in CSV output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cdp_core::math::format_fixed;
use cdp_core::LedgerSnapshot;

use crate::runner::{ScenarioReport, StepRecord, StepResult};
use crate::stress::StressReport;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ScenarioReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScenarioReport to JSON")
}

pub fn export_stress_json(report: &StressReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize StressReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per open position, ascending ICR within each asset.
///
/// Columns: asset, owner, collateral, debt, collateral_shares, debt_shares, icr
pub fn export_positions_csv(snapshot: &LedgerSnapshot) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "asset",
        "owner",
        "collateral",
        "debt",
        "collateral_shares",
        "debt_shares",
        "icr",
    ])?;

    for asset in &snapshot.assets {
        for p in &asset.positions {
            let icr = p.icr.map(format_fixed).unwrap_or_default();
            wtr.write_record([
                asset.asset.as_str(),
                p.owner.as_str(),
                format_fixed(p.collateral).as_str(),
                format_fixed(p.debt).as_str(),
                p.collateral_shares.to_string().as_str(),
                p.debt_shares.to_string().as_str(),
                icr.as_str(),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: index, op, expected, status, error_kind, message
pub fn export_steps_csv(steps: &[StepRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "op", "expected", "status", "error_kind", "message"])?;
    for step in steps {
        let expected = step.expected.map(|k| format!("{k:?}")).unwrap_or_default();
        let (status, kind, message) = match &step.result {
            StepResult::Ok { .. } => ("ok", String::new(), String::new()),
            StepResult::Failed { kind, message } => ("failed", format!("{kind:?}"), message.clone()),
        };
        wtr.write_record([
            step.index.to_string().as_str(),
            step.op,
            expected.as_str(),
            status,
            kind.as_str(),
            message.as_str(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a scenario run.
///
/// Creates `{scenario}_{digest prefix}/` under `output_dir` containing:
/// - `report.json`: the full `ScenarioReport`
/// - `positions.csv`: final positions
/// - `steps.csv`: step log
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &ScenarioReport, output_dir: &Path) -> Result<PathBuf> {
    let slug: String = report
        .scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let prefix = report.state_digest.get(..12).unwrap_or(&report.state_digest);
    let run_dir = output_dir.join(format!("{slug}_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(
        run_dir.join("positions.csv"),
        export_positions_csv(&report.final_state)?,
    )?;
    std::fs::write(run_dir.join("steps.csv"), export_steps_csv(&report.steps)?)?;

    Ok(run_dir)
}
