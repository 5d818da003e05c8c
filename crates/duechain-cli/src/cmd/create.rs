//! `due create` — create a task, optionally with an escalation chain.

use chrono::NaiveDate;
use clap::Args;
use duechain_core::{EscalationInput, TaskDraft, TaskStatus};

use super::{Context, StageArgs, TaskView, parse_date};
use crate::output::render_item;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the new task.
    #[arg(short, long)]
    pub name: String,

    /// Description text.
    #[arg(short, long)]
    pub description: Option<String>,

    /// User the task is assigned to.
    #[arg(short, long)]
    pub assign: Option<String>,

    /// Due date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,

    /// Initial status: todo, in-progress, done.
    #[arg(short, long, default_value = "todo")]
    pub status: TaskStatus,

    #[command(flatten)]
    pub stages: StageArgs,
}

impl CreateArgs {
    fn draft(&self) -> TaskDraft {
        TaskDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            assigned_to: self.assign.clone(),
            due_date: self.due,
            status: self.status,
            escalation: self.stages.overlay(EscalationInput::default()),
        }
    }
}

/// Execute `due create`.
///
/// # Errors
///
/// Returns an error when the project is not initialized, the draft is
/// invalid, or the task cannot be stored.
pub fn run_create(args: &CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut store = ctx.open_store()?;
    let task = store
        .create_task(args.draft())
        .map_err(|err| ctx.fail(&err))?;
    let view = TaskView::new(task, store.now());
    render_item(&view, ctx.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CreateArgs,
    }

    #[test]
    fn create_args_defaults() {
        let w = Wrapper::parse_from(["test", "--name", "Hello"]);
        assert_eq!(w.args.name, "Hello");
        assert_eq!(w.args.status, TaskStatus::ToDo);
        assert!(w.args.due.is_none());
        assert!(w.args.stages.is_empty());
    }

    #[test]
    fn create_args_build_chain() {
        let w = Wrapper::parse_from([
            "test",
            "--name",
            "Rent",
            "--due",
            "2024-01-01",
            "--level1",
            "alice",
            "--level1-days",
            "3",
            "--email",
            "boss@example.com",
            "--email-days",
            "2",
        ]);
        let draft = w.args.draft();
        assert_eq!(draft.due_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        let chain = draft.escalation.validate().expect("valid chain");
        assert_eq!(chain.level1.map(|s| s.assignee), Some("alice".to_string()));
        assert!(chain.level2.is_none());
        assert_eq!(chain.email.map(|s| s.duration_days), Some(2));
    }

    #[test]
    fn create_rejects_bad_date() {
        let parsed = Wrapper::try_parse_from(["test", "--name", "x", "--due", "01/02/2024"]);
        assert!(parsed.is_err());
    }
}
