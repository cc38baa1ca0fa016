//! `filmbotctl sync` command implementation

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, ConfigSource};
use crate::host::{HostScheduler, SystemdHost};
use crate::schedule::{ReconcileReport, Synchronizer, UnitSettings};

const TABLE_COL_SCHEDULE: usize = 16;
const TABLE_COL_UNIT: usize = 36;
const TABLE_COL_ACTION: usize = 14;

#[derive(Args)]
pub struct SyncArgs {
    /// Write unit files but skip every systemctl registration call
    #[arg(long)]
    pub dry_run: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
pub struct ReportJson {
    pub dry_run: bool,
    pub changes: usize,
    pub unchanged: Vec<String>,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct ItemJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub action: &'static str,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ReconcileReport> for ReportJson {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            dry_run: report.dry_run,
            changes: report.changes(),
            unchanged: report.unchanged.clone(),
            items: report
                .items
                .iter()
                .map(|item| ItemJson {
                    schedule_id: item.schedule_id.clone(),
                    unit: item.unit.clone(),
                    action: item.action.label(),
                    outcome: item.outcome.label(),
                    error: item.outcome.error(),
                })
                .collect(),
        }
    }
}

pub async fn run(config: &Config, args: SyncArgs) -> Result<()> {
    let host = SystemdHost::from_config(&config.scheduler);
    let settings = UnitSettings::from_config(&config.scheduler);
    let report = reconcile(host, settings, config, args.dry_run).await;
    print_report(&report, args.json)
}

/// One pass against any host. Per-item failures land in the report, never in `Err`.
pub async fn reconcile<H: HostScheduler>(
    host: H,
    settings: UnitSettings,
    source: &impl ConfigSource,
    dry_run: bool,
) -> ReconcileReport {
    let synchronizer = Synchronizer::new(host, settings, dry_run);
    let report = synchronizer.reconcile(source.schedules()).await;
    info!(dry_run, "{}", report.summary_line());
    report
}

pub fn print_report(report: &ReconcileReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ReportJson::from(report))?);
        return Ok(());
    }

    if report.dry_run {
        println!("DRY RUN: unit files written, systemctl calls skipped\n");
    }

    if report.items.is_empty() {
        println!("Nothing to do.");
    } else {
        println!(
            "{:<ws$} {:<wu$} {:<wa$} OUTCOME",
            "SCHEDULE",
            "UNIT",
            "ACTION",
            ws = TABLE_COL_SCHEDULE,
            wu = TABLE_COL_UNIT,
            wa = TABLE_COL_ACTION
        );
        println!(
            "{}",
            "-".repeat(TABLE_COL_SCHEDULE + TABLE_COL_UNIT + TABLE_COL_ACTION + 10)
        );
        for item in &report.items {
            let schedule = item.schedule_id.as_deref().unwrap_or("-");
            let unit = item.unit.as_deref().unwrap_or("-");
            let mut outcome = item.outcome.label().to_string();
            if let Some(error) = item.outcome.error() {
                outcome.push_str(&format!(": {}", error));
            }
            println!(
                "{:<ws$} {:<wu$} {:<wa$} {}",
                super::truncate(schedule, TABLE_COL_SCHEDULE),
                super::truncate(unit, TABLE_COL_UNIT),
                item.action.label(),
                outcome,
                ws = TABLE_COL_SCHEDULE,
                wu = TABLE_COL_UNIT,
                wa = TABLE_COL_ACTION
            );
        }
    }

    println!("\n{}", report.summary_line());
    Ok(())
}
