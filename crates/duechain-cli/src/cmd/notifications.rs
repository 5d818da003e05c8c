//! `due notifications` — list recorded notifications and mark them read.

use clap::{Args, Subcommand};
use duechain_core::{ErrorCode, Notification};
use duechain_core::db::NotificationFilter;
use std::io::{self, Write};

use super::Context;
use crate::output::{CliError, Renderable, pretty_kv, render_error, render_list, render_success};

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    /// Only notifications for this user id or email address.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only unread notifications.
    #[arg(long)]
    pub unread: bool,

    /// Maximum notifications to show.
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,

    #[command(subcommand)]
    pub command: Option<NotificationsCommand>,
}

#[derive(Subcommand, Debug)]
pub enum NotificationsCommand {
    /// Mark a notification as read.
    Read {
        /// Notification ID (nt-...).
        id: String,
    },
}

impl NotificationsArgs {
    fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            user_id: self.user.clone(),
            unread_only: self.unread,
            limit: self.limit,
        }
    }
}

#[derive(Debug)]
struct NotificationRow<'a>(&'a Notification);

impl Renderable for NotificationRow<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let n = self.0;
        let marker = if n.is_read { " " } else { "*" };
        writeln!(w, "{marker} {}  {}", n.id, n.message)?;
        pretty_kv(w, "  To", &n.user_id)?;
        pretty_kv(w, "  At", n.created_at.format("%Y-%m-%d %H:%M UTC").to_string())?;
        if let Some(link) = &n.link_to {
            pretty_kv(w, "  Link", link)?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let n = self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            n.id,
            n.user_id,
            if n.is_read { "read" } else { "unread" },
            n.task_id.as_ref().map_or("-", |t| t.as_str()),
            n.message
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "TO", "STATE", "TASK", "MESSAGE"]
    }
}

/// Execute `due notifications [read <id>]`.
///
/// # Errors
///
/// Returns an error when the database cannot be read or the notification
/// to mark does not exist.
pub fn run_notifications(args: &NotificationsArgs, ctx: &Context) -> anyhow::Result<()> {
    let backend = ctx.open_backend()?;

    if let Some(NotificationsCommand::Read { id }) = &args.command {
        let id = id.trim();
        if !backend
            .mark_notification_read(id)
            .map_err(|err| ctx.fail(&err))?
        {
            render_error(
                ctx.output,
                &CliError::with_details(
                    format!("notification '{id}' not found"),
                    "use `due notifications` to see notification IDs",
                    ErrorCode::TaskNotFound.code(),
                ),
            )?;
            anyhow::bail!("notification '{id}' not found");
        }
        return render_success(ctx.output, &format!("Marked {id} as read"));
    }

    let notes = backend
        .list_notifications(&args.filter())
        .map_err(|err| ctx.fail(&err))?;
    let rows: Vec<NotificationRow<'_>> = notes.iter().map(NotificationRow).collect();
    render_list(&rows, ctx.output)?;
    Ok(())
}
