//! `filmbotctl health` subcommands implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use crate::alert::{
    AlertPolicy, AlertState, AlertStateStore, MailTransport, Notifier, NotificationIntent,
    SmtpTransport,
};
use crate::config::{Config, ConfigSource};
use crate::health::{HealthSampler, HealthSnapshot, LinuxProbe, SamplerSettings};

const TABLE_COL_CHECK: usize = 16;

#[derive(Subcommand)]
pub enum HealthCommands {
    /// Sample once and print the result without sending anything
    Check(CheckArgs),

    /// Sample, send due alerts, and send the daily digest when it is due
    Run,

    /// Send the daily digest now
    Digest,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// What one alerting pass delivered
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub sent: usize,
    pub failed: usize,
    pub digest_sent: bool,
}

pub async fn run(config: &Config, command: HealthCommands) -> Result<()> {
    match command {
        HealthCommands::Check(args) => check(config, args).await,
        HealthCommands::Run => run_pass(config).await,
        HealthCommands::Digest => force_digest(config).await,
    }
}

fn sampler(config: &Config) -> HealthSampler<LinuxProbe> {
    HealthSampler::new(
        LinuxProbe::new(&config.health.thermal_zone),
        SamplerSettings::from_config(config),
    )
}

fn notifier(config: &Config) -> Option<Notifier<SmtpTransport>> {
    let alerts = config.alert_config();
    match SmtpTransport::from_config(alerts) {
        Ok(transport) => Some(Notifier::new(
            transport,
            config.device_name.clone(),
            alerts.email_to.clone(),
        )),
        Err(e) => {
            if alerts.enabled {
                warn!("Email delivery unavailable: {}", e);
            }
            None
        }
    }
}

async fn check(config: &Config, args: CheckArgs) -> Result<()> {
    let snapshot = sampler(config).sample().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

async fn run_pass(config: &Config) -> Result<()> {
    let snapshot = sampler(config).sample().await;
    let policy = AlertPolicy::from_config(config.alert_config());
    let notifier = notifier(config);
    let store = AlertStateStore::new(&config.health.state_file);
    let mut state = store.load();

    let summary = alert_pass(
        &snapshot,
        &policy,
        notifier.as_ref(),
        &mut state,
        Local::now(),
    )
    .await;

    if let Err(e) = store.save(&state) {
        warn!(path = %store.path().display(), "Failed to save alert state: {:#}", e);
    }

    info!(
        overall = %snapshot.overall,
        sent = summary.sent,
        failed = summary.failed,
        digest = summary.digest_sent,
        "health pass complete"
    );
    print_snapshot(&snapshot);
    Ok(())
}

async fn force_digest(config: &Config) -> Result<()> {
    let snapshot = sampler(config).sample().await;
    let policy = AlertPolicy::from_config(config.alert_config());
    let transport = SmtpTransport::from_config(config.alert_config())
        .context("Cannot send digest")?;
    let notifier = Notifier::new(
        transport,
        config.device_name.clone(),
        config.alert_config().email_to.clone(),
    );
    let store = AlertStateStore::new(&config.health.state_file);
    let mut state = store.load();

    let intent = policy.digest(&snapshot, &mut state, Local::now());
    notifier
        .dispatch(&intent)
        .await
        .context("Failed to send digest")?;

    store.save(&state).context("Failed to save alert state")?;
    println!("Digest sent.");
    Ok(())
}

/// Evaluate the policy, deliver what it decides, then the digest if due.
///
/// A notification that cannot be delivered is forgotten in `state` so the
/// next pass retries it. A failed digest leaves its queue intact.
pub async fn alert_pass<T: MailTransport>(
    snapshot: &HealthSnapshot,
    policy: &AlertPolicy,
    notifier: Option<&Notifier<T>>,
    state: &mut AlertState,
    now: DateTime<Local>,
) -> PassSummary {
    let mut summary = PassSummary::default();

    for intent in policy.evaluate(snapshot, state, now) {
        if deliver(notifier, &intent).await {
            summary.sent += 1;
        } else {
            summary.failed += 1;
            if !intent.resolved {
                state.forget_notification(&intent.check_name);
            }
        }
    }

    if policy.digest_due(state, now) {
        let before = state.clone();
        let intent = policy.digest(snapshot, state, now);
        if deliver(notifier, &intent).await {
            summary.digest_sent = true;
        } else {
            summary.failed += 1;
            *state = before;
        }
    }

    summary
}

async fn deliver<T: MailTransport>(
    notifier: Option<&Notifier<T>>,
    intent: &NotificationIntent,
) -> bool {
    match notifier {
        Some(notifier) => notifier.dispatch(intent).await.is_ok(),
        None => {
            warn!(check = %intent.check_name, "No mail transport; notification dropped");
            false
        }
    }
}

pub fn print_snapshot(snapshot: &HealthSnapshot) {
    println!(
        "{} {}  {}\n",
        snapshot.overall.emoji(),
        snapshot.device_name,
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    for check in &snapshot.checks {
        println!(
            "{} {:<width$} {}",
            check.status.emoji(),
            check.name,
            check.message,
            width = TABLE_COL_CHECK
        );
    }
    println!("\nOverall: {}", snapshot.overall.label().to_uppercase());
}
