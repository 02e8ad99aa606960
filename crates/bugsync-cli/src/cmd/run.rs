//! `bugsync run`: one full synchronization pass.

use anyhow::{Result, bail};
use bugsync_core::{ReconcileOptions, SyncReport};
use clap::Args;
use std::io::{self, Write};
use tracing::info;

use super::{SecretArgs, Session};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub secrets: SecretArgs,

    /// Compute every decision and payload but send nothing to the remote store.
    #[arg(long)]
    pub dry_run: bool,
}

/// Run one sync pass and print its report.
///
/// Per-bug and per-analysis failures are part of the report and do not fail
/// the command. Configuration errors and a failure to list analyses do.
pub fn run_sync(args: &RunArgs, output: OutputMode) -> Result<()> {
    let session = Session::open(&args.secrets, output)?;
    let remote = session.remote();
    let tracker = session.tracker();
    let analyzer = session.analyzer();

    if args.dry_run {
        info!("Dry run: no changes will be sent");
    }

    let started = chrono::Utc::now();
    let report = match bugsync_core::run(
        &remote,
        &tracker,
        &analyzer,
        ReconcileOptions {
            dry_run: args.dry_run,
        },
    ) {
        Ok(report) => report,
        Err(err) => {
            render_error(output, &CliError::with_code(err.to_string(), err.code()))?;
            bail!("{err}");
        }
    };
    let elapsed = chrono::Utc::now() - started;
    info!(
        elapsed_ms = elapsed.num_milliseconds(),
        remote_requests = remote.request_count(),
        tracker_requests = tracker.request_count(),
        "Run complete"
    );

    render_mode(output, &report, print_text, print_pretty)
}

fn print_text(report: &SyncReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "dry_run={}", report.dry_run)?;
    writeln!(w, "analyses={} failed={}", report.analyses_total, report.analyses_failed)?;
    writeln!(w, "bugs={}", report.bugs_seen)?;
    writeln!(w, "upserted={} upsert_failed={}", report.upserted, report.upsert_failed)?;
    writeln!(w, "deleted={} delete_failed={}", report.deleted, report.delete_failed)?;
    writeln!(w, "analysis_failed={} inconsistent={}", report.analysis_failed, report.inconsistent)?;
    for error in &report.errors {
        writeln!(w, "error: {error}")?;
    }
    Ok(())
}

fn print_pretty(report: &SyncReport, w: &mut dyn Write) -> io::Result<()> {
    let heading = if report.dry_run {
        "bugsync run (dry run)"
    } else {
        "bugsync run"
    };
    pretty_section(w, heading)?;
    pretty_kv(
        w,
        "analyses",
        format!("{} ({} failed)", report.analyses_total, report.analyses_failed),
    )?;
    pretty_kv(w, "bugs seen", report.bugs_seen.to_string())?;
    pretty_kv(w, "upserted", report.upserted.to_string())?;
    pretty_kv(w, "deleted", report.deleted.to_string())?;
    pretty_kv(w, "analysis failures", report.analysis_failed.to_string())?;
    pretty_kv(w, "upsert failures", report.upsert_failed.to_string())?;
    pretty_kv(w, "delete failures", report.delete_failed.to_string())?;
    if report.inconsistent > 0 {
        pretty_kv(w, "inconsistent", report.inconsistent.to_string())?;
    }

    if !report.errors.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Errors")?;
        for error in &report.errors {
            writeln!(w, "  - {error}")?;
        }
    }
    Ok(())
}
