//! `due start` / `due done` — status shortcuts.

use clap::Args;
use duechain_core::{TaskId, TaskPatch, TaskStatus};

use super::{Context, TaskView};
use crate::output::render_item;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Task ID.
    pub id: String,
}

/// Execute `due start <id>`.
///
/// # Errors
///
/// Returns an error when the task does not exist or cannot be saved.
pub fn run_start(args: &StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    set_status(args, TaskStatus::InProgress, ctx)
}

/// Execute `due done <id>`. A done task is never escalated again.
///
/// # Errors
///
/// Returns an error when the task does not exist or cannot be saved.
pub fn run_done(args: &StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    set_status(args, TaskStatus::Done, ctx)
}

fn set_status(args: &StatusArgs, status: TaskStatus, ctx: &Context) -> anyhow::Result<()> {
    let mut store = ctx.open_store()?;
    let task = store
        .update_task(&TaskId::new(args.id.trim()), &TaskPatch::status(status))
        .map_err(|err| ctx.fail(&err))?;
    render_item(&TaskView::new(task, store.now()), ctx.output)?;
    Ok(())
}
