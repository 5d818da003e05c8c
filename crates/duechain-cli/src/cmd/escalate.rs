//! `due escalate` — run the escalation engine once.
//!
//! Safe to run as often as wanted (from cron, a login hook, or by hand):
//! each run moves an overdue task by at most one stage, and a stage already
//! recorded by another session is skipped silently.

use clap::Args;
use duechain_core::escalation::{EscalationUpdate, RunOutcome};
use duechain_core::{OutcomeKind, RunReport};
use serde::Serialize;
use std::io::{self, Write};

use super::Context;
use crate::output::{pretty_section, render_mode, render_success};

#[derive(Args, Debug)]
pub struct EscalateArgs {
    /// Show what would escalate without writing or notifying.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct DryRun {
    dry_run: bool,
    evaluated: usize,
    planned: Vec<Planned>,
}

#[derive(Debug, Serialize)]
struct Planned {
    #[serde(flatten)]
    update: EscalationUpdate,
    recipient: String,
    message: String,
}

impl DryRun {
    fn new(evaluated: usize, outcome: RunOutcome) -> Self {
        let planned = outcome
            .escalations
            .into_iter()
            .map(|e| Planned {
                update: e.update,
                recipient: e.notification.recipient.to_string(),
                message: e.notification.message,
            })
            .collect();
        Self {
            dry_run: true,
            evaluated,
            planned,
        }
    }
}

/// Execute `due escalate`.
///
/// # Errors
///
/// Returns an error when tasks cannot be loaded, or after printing the
/// report when any stage failed to persist or any notification failed.
pub fn run_escalate(args: &EscalateArgs, ctx: &Context) -> anyhow::Result<()> {
    if !ctx.config.escalation.enabled {
        tracing::info!("escalation disabled in config; skipping run");
        return render_success(ctx.output, "Escalation is disabled in .duechain/config.toml");
    }

    let mut store = ctx.open_store()?;

    if args.dry_run {
        let now = store.now();
        let evaluated = store.fetch_tasks().map_err(|err| ctx.fail(&err))?.len();
        let outcome = ctx.config.escalation.runner().run(store.tasks(), now);
        let plan = DryRun::new(evaluated, outcome);
        return render_mode(ctx.output, &plan, write_plan_text, write_plan_pretty);
    }

    let report = store.run_escalations().map_err(|err| ctx.fail(&err))?;
    render_mode(ctx.output, &report, write_report_text, write_report_pretty)?;

    if !report.is_clean() {
        anyhow::bail!(
            "{} escalation(s) not persisted, {} notification(s) failed; re-run `due escalate`",
            report.unpersisted().len(),
            report.failed_notifications().len()
        );
    }
    Ok(())
}

fn result_label(kind: &OutcomeKind) -> String {
    match kind {
        OutcomeKind::Escalated { notification_id } => format!("escalated {notification_id}"),
        OutcomeKind::Stale => "skipped (already escalated)".to_string(),
        OutcomeKind::PersistFailed { reason } => format!("persist failed: {reason}"),
        OutcomeKind::NotifyFailed { reason } => format!("notify failed: {reason}"),
    }
}

fn write_report_text(report: &RunReport, w: &mut dyn Write) -> io::Result<()> {
    for o in &report.outcomes {
        writeln!(w, "{}\t{}\t{}\t{}", o.task_id, o.from, o.to, result_label(&o.kind))?;
    }
    for bad in &report.skipped {
        writeln!(w, "{}\t-\t-\tunreadable: {}", bad.task_id, bad.reason)?;
    }
    Ok(())
}

fn write_report_pretty(report: &RunReport, w: &mut dyn Write) -> io::Result<()> {
    let escalated = report.escalated().count();
    pretty_section(
        w,
        &format!("Evaluated {} task(s), escalated {escalated}", report.evaluated),
    )?;
    for o in &report.outcomes {
        writeln!(
            w,
            "{:<15} {:>10} -> {:<10}  {}",
            o.task_id,
            o.from,
            o.to,
            result_label(&o.kind)
        )?;
    }
    if !report.skipped.is_empty() {
        writeln!(w)?;
        pretty_section(
            w,
            &format!("Skipped {} unreadable task(s)", report.skipped.len()),
        )?;
        for bad in &report.skipped {
            writeln!(w, "{:<15} {}", bad.task_id, bad.reason)?;
        }
    }
    Ok(())
}

fn write_plan_text(plan: &DryRun, w: &mut dyn Write) -> io::Result<()> {
    for p in &plan.planned {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            p.update.id, p.update.expected, p.update.new, p.recipient
        )?;
    }
    Ok(())
}

fn write_plan_pretty(plan: &DryRun, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(
        w,
        &format!(
            "Dry run: {} of {} task(s) would escalate",
            plan.planned.len(),
            plan.evaluated
        ),
    )?;
    for p in &plan.planned {
        writeln!(
            w,
            "{:<15} {:>10} -> {:<10}  {}",
            p.update.id, p.update.expected, p.update.new, p.recipient
        )?;
        writeln!(w, "                {}", p.message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use duechain_core::store::TaskOutcome;
    use duechain_core::{EscalationStatus, TaskId, UnreadableTask};

    fn report() -> RunReport {
        RunReport {
            evaluated: 3,
            outcomes: vec![
                TaskOutcome {
                    task_id: TaskId::new("tk-00000001"),
                    from: EscalationStatus::None,
                    to: EscalationStatus::Level1,
                    kind: OutcomeKind::Escalated {
                        notification_id: "nt-0000abcd".into(),
                    },
                },
                TaskOutcome {
                    task_id: TaskId::new("tk-00000002"),
                    from: EscalationStatus::Level1,
                    to: EscalationStatus::Level2,
                    kind: OutcomeKind::Stale,
                },
            ],
            skipped: Vec::new(),
        }
    }

    #[test]
    fn text_report_has_one_row_per_outcome() {
        let mut buf = Vec::new();
        write_report_text(&report(), &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "tk-00000001\tnone\tlevel1\tescalated nt-0000abcd");
        assert!(lines[1].ends_with("skipped (already escalated)"));
    }

    #[test]
    fn skipped_tasks_are_listed_after_outcomes() {
        let mut report = report();
        report.skipped.push(UnreadableTask {
            task_id: TaskId::new("tk-garbled"),
            reason: "corrupt row".into(),
        });
        let mut buf = Vec::new();
        write_report_text(&report, &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        assert_eq!(
            out.lines().last(),
            Some("tk-garbled\t-\t-\tunreadable: corrupt row")
        );

        let mut buf = Vec::new();
        write_report_pretty(&report, &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        assert!(out.contains("Skipped 1 unreadable task(s)"));
    }

    #[test]
    fn pretty_report_summarises_counts() {
        let mut buf = Vec::new();
        write_report_pretty(&report(), &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        assert!(out.starts_with("Evaluated 3 task(s), escalated 1"));
    }

    #[test]
    fn report_json_flattens_result() {
        let json = serde_json::to_value(report()).expect("serialize");
        assert_eq!(json["outcomes"][0]["result"], "escalated");
        assert_eq!(json["outcomes"][0]["notification_id"], "nt-0000abcd");
        assert_eq!(json["outcomes"][1]["result"], "stale");
    }
}
