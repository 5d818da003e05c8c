//! `due update` — edit task fields and the escalation chain.
//!
//! The escalation stage itself is never editable here; only `due escalate`
//! moves it.

use chrono::NaiveDate;
use clap::Args;
use duechain_core::{
    EscalationInput, ErrorCode, StageInput, TaskId, TaskPatch, TaskRepository, TaskStatus,
};

use super::{Context, StageArgs, TaskView, chain_input, parse_date};
use crate::output::{CliError, render_error, render_item};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Task ID to update.
    pub id: String,

    /// New name.
    #[arg(short, long)]
    pub name: Option<String>,

    /// New description.
    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    /// Remove the description.
    #[arg(long)]
    pub clear_description: bool,

    /// Assign the task to a user.
    #[arg(short, long, conflicts_with = "unassign")]
    pub assign: Option<String>,

    /// Remove the assignee.
    #[arg(long)]
    pub unassign: bool,

    /// New due date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date, conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    /// Remove the due date.
    #[arg(long)]
    pub clear_due: bool,

    /// New status: todo, in-progress, done.
    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    /// Remove every escalation stage.
    #[arg(long, conflicts_with_all = ["level1", "level1_days", "level2", "level2_days", "email", "email_days"])]
    pub clear_escalation: bool,

    /// Remove the level 1 stage, keeping the others.
    #[arg(long, conflicts_with_all = ["clear_escalation", "level1", "level1_days"])]
    pub clear_level1: bool,

    /// Remove the level 2 stage, keeping the others.
    #[arg(long, conflicts_with_all = ["clear_escalation", "level2", "level2_days"])]
    pub clear_level2: bool,

    /// Remove the email stage, keeping the others.
    #[arg(long, conflicts_with_all = ["clear_escalation", "email", "email_days"])]
    pub clear_email: bool,

    #[command(flatten)]
    pub stages: StageArgs,
}

impl UpdateArgs {
    const fn clears_a_stage(&self) -> bool {
        self.clear_level1 || self.clear_level2 || self.clear_email
    }

    /// Build the patch. Stage flags overlay the task's current chain, then
    /// the per-stage clear flags remove their stage.
    fn patch(&self, current: &duechain_core::EscalationChain) -> TaskPatch {
        let escalation = if self.clear_escalation {
            Some(EscalationInput::default())
        } else if self.stages.is_empty() && !self.clears_a_stage() {
            None
        } else {
            let mut input = self.stages.overlay(chain_input(current));
            if self.clear_level1 {
                input.level1 = StageInput::default();
            }
            if self.clear_level2 {
                input.level2 = StageInput::default();
            }
            if self.clear_email {
                input.email = StageInput::default();
            }
            Some(input)
        };
        TaskPatch {
            name: self.name.clone(),
            description: optional_edit(self.description.as_ref(), self.clear_description),
            assigned_to: optional_edit(self.assign.as_ref(), self.unassign),
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
            status: self.status,
            escalation,
        }
    }
}

fn optional_edit(value: Option<&String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(|v| Some(v.clone()))
    }
}

/// Execute `due update`.
///
/// # Errors
///
/// Returns an error when nothing was requested, the task does not exist,
/// or the edit is invalid.
pub fn run_update(args: &UpdateArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut store = ctx.open_store()?;
    let id = TaskId::new(args.id.trim());
    let current = store
        .repository()
        .get_task(&id)
        .map_err(|err| ctx.fail(&err))?;

    let patch = args.patch(&current.escalation);
    if patch.is_empty() {
        let code = ErrorCode::InvalidTaskField;
        render_error(
            ctx.output,
            &CliError::with_details(
                "nothing to update",
                "pass at least one field flag, e.g. --name or --due",
                code.code(),
            ),
        )?;
        anyhow::bail!("nothing to update");
    }

    let task = store
        .update_task(&id, &patch)
        .map_err(|err| ctx.fail(&err))?;
    render_item(&TaskView::new(task, store.now()), ctx.output)?;
    Ok(())
}
