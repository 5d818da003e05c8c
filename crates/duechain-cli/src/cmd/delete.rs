//! `due delete` — remove a task. Notifications already sent are kept.

use clap::Args;
use duechain_core::TaskId;

use super::Context;
use crate::output::render_success;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Task ID to delete.
    pub id: String,
}

/// Execute `due delete <id>`.
///
/// # Errors
///
/// Returns an error when the task does not exist or cannot be removed.
pub fn run_delete(args: &DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut store = ctx.open_store()?;
    let id = TaskId::new(args.id.trim());
    store.delete_task(&id).map_err(|err| ctx.fail(&err))?;
    render_success(ctx.output, &format!("Deleted {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn delete_args_parses_id() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: DeleteArgs,
        }
        let w = Wrapper::parse_from(["test", "tk-1"]);
        assert_eq!(w.args.id, "tk-1");
    }
}
