//! `due show` — display one task with its effective deadline.

use clap::Args;
use duechain_core::{Clock, TaskId, TaskRepository};

use super::{Context, TaskView};
use crate::output::render_item;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task ID to display.
    pub id: String,
}

/// Execute `due show <id>`.
///
/// # Errors
///
/// Returns an error when the task does not exist or cannot be read.
pub fn run_show(args: &ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let backend = ctx.open_backend()?;
    let task = backend
        .get_task(&TaskId::new(args.id.trim()))
        .map_err(|err| ctx.fail(&err))?;
    render_item(&TaskView::new(task, ctx.clock().now()), ctx.output)?;
    Ok(())
}
