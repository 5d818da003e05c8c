//! `due list` — list tasks with their effective deadlines.

use clap::Args;
use duechain_core::{Clock, EscalationStatus, TaskRepository, TaskStatus};
use std::io::Write;

use super::{Context, TaskView};
use crate::output::{OutputMode, pretty_section, render_list};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status: todo, in-progress, done.
    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    /// Filter by escalation stage: none, level1, level2, email-sent.
    #[arg(short, long)]
    pub escalation: Option<EscalationStatus>,

    /// Filter by assignee.
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Only tasks past their effective deadline.
    #[arg(long)]
    pub overdue: bool,

    /// Include done tasks (hidden by default unless `--status done`).
    #[arg(long)]
    pub all: bool,
}

impl ListArgs {
    fn matches(&self, view: &TaskView) -> bool {
        let task = &view.task;
        let status_ok = match self.status {
            Some(status) => task.status == status,
            None => self.all || task.status != TaskStatus::Done,
        };
        status_ok
            && self.escalation.is_none_or(|e| task.escalation_status == e)
            && self
                .assignee
                .as_ref()
                .is_none_or(|a| task.assigned_to.as_ref() == Some(a))
            && (!self.overdue || view.is_overdue)
    }
}

/// Execute `due list`.
///
/// # Errors
///
/// Returns an error when the project is not initialized or the task table
/// cannot be read.
pub fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let backend = ctx.open_backend()?;
    let now = ctx.clock().now();
    let views: Vec<TaskView> = backend
        .fetch_tasks()
        .map_err(|err| ctx.fail(&err))?
        .into_iter()
        .map(|task| TaskView::new(task, now))
        .filter(|view| args.matches(view))
        .collect();

    if ctx.output == OutputMode::Pretty {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if views.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        pretty_section(&mut out, &format!("{} task(s)", views.len()))?;
        for view in &views {
            let flag = if view.is_overdue { "!" } else { " " };
            let deadline = view
                .effective_deadline
                .map_or_else(|| "-".to_string(), |d| d.to_string());
            writeln!(
                out,
                "{flag} {:<15} {:<12} {:<11} {:<10} {}",
                view.task.id, view.task.status, view.task.escalation_status, deadline, view.task.name
            )?;
        }
        return Ok(());
    }

    render_list(&views, ctx.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use clap::Parser;
    use duechain_core::{EscalationChain, Task, TaskId, UserStage};

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ListArgs,
    }

    fn view(status: TaskStatus, stage: EscalationStatus) -> TaskView {
        let created = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
        let task = Task {
            id: TaskId::new("tk-00000001"),
            name: "Rent".into(),
            description: None,
            assigned_to: Some("alice".into()),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            status,
            escalation_status: stage,
            escalation: EscalationChain {
                level1: Some(UserStage {
                    assignee: "bob".into(),
                    duration_days: 3,
                }),
                ..EscalationChain::default()
            },
            created_at: created,
            updated_at: created,
        };
        TaskView::new(task, Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap())
    }

    #[test]
    fn list_args_defaults() {
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.status.is_none());
        assert!(!w.args.overdue);
        assert!(!w.args.all);
    }

    #[test]
    fn done_tasks_hidden_unless_asked() {
        let done = view(TaskStatus::Done, EscalationStatus::None);
        assert!(!Wrapper::parse_from(["test"]).args.matches(&done));
        assert!(Wrapper::parse_from(["test", "--all"]).args.matches(&done));
        assert!(
            Wrapper::parse_from(["test", "--status", "done"])
                .args
                .matches(&done)
        );
    }

    #[test]
    fn filters_combine() {
        let open = view(TaskStatus::InProgress, EscalationStatus::None);
        assert!(open.is_overdue);
        assert!(Wrapper::parse_from(["test", "--overdue"]).args.matches(&open));
        assert!(
            Wrapper::parse_from(["test", "--assignee", "alice", "--escalation", "none"])
                .args
                .matches(&open)
        );
        assert!(
            !Wrapper::parse_from(["test", "--escalation", "level1"])
                .args
                .matches(&open)
        );
        assert!(!Wrapper::parse_from(["test", "--assignee", "bob"]).args.matches(&open));
    }
}
