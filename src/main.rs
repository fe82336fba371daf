use std::sync::Arc;

use anyhow::Context;
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use lead_followup::config::AppConfig;
use lead_followup::google::auth::SHEETS_SCOPES;
use lead_followup::google::{GoogleTokenProvider, TokenGrant};
use lead_followup::mailer::GmailTransport;
use lead_followup::pipeline::{FollowUpJob, RunSummary};
use lead_followup::store::SheetsStore;
use lead_followup::template::TemplateResolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    eprintln!("📬 Lead follow-up v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sheet: {}", config.job.sheet_id);
    eprintln!("   Rows: {}", config.job.follow_up_tab);
    eprintln!("   Log: {}", config.job.email_log_tab);
    eprintln!(
        "   Mode: {}\n",
        if config.job.dry_run { "dry run (drafts)" } else { "live (send)" }
    );

    let client = reqwest::Client::new();

    // ── Google APIs ─────────────────────────────────────────────────────
    let sheets_tokens = Arc::new(GoogleTokenProvider::new(
        client.clone(),
        TokenGrant::service_account(config.sheets_key.clone(), SHEETS_SCOPES),
    ));
    let gmail_tokens = Arc::new(GoogleTokenProvider::new(
        client.clone(),
        TokenGrant::for_gmail(&config.gmail.credentials),
    ));

    let store = Arc::new(SheetsStore::new(client.clone(), sheets_tokens));
    let transport = Arc::new(GmailTransport::new(
        client,
        gmail_tokens,
        config.gmail.from.clone(),
    ));
    let templates = TemplateResolver::from_config(&config.job.templates);

    // ── Run ─────────────────────────────────────────────────────────────
    let job = FollowUpJob::new(config.job, store, transport, templates);
    let run_id = Uuid::new_v4();
    let summary = job
        .run()
        .instrument(tracing::info_span!("follow_up_run", %run_id))
        .await
        .context("Follow-up run failed")?;

    log_summary(&run_id, &summary);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn log_summary(run_id: &Uuid, summary: &RunSummary) {
    info!(
        %run_id,
        scanned = summary.scanned,
        attempted = summary.attempted,
        sent = summary.sent,
        drafted = summary.drafted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Follow-up run complete"
    );

    for sample in &summary.skip_samples {
        info!(row = ?sample.row_number, reason = %sample.reason, "Skipped row");
    }
    for sample in &summary.fail_samples {
        warn!(row = sample.row_number, error = %sample.message, "Failed row");
    }
}
