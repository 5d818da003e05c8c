#![forbid(unsafe_code)]

mod cmd;
mod output;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use duechain_core::config;
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "due: deadline escalation for task lists",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Evaluate as if the current time were this instant (YYYY-MM-DD or RFC 3339).
    #[arg(long, global = true, value_parser = cmd::parse_instant, value_name = "WHEN")]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a duechain project",
        long_about = "Create .duechain/ with a default config and an empty task database.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    due init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Create a task",
        long_about = "Create a task, optionally with a due date and an escalation chain.",
        after_help = "EXAMPLES:\n    # A task escalating to alice three days after it is due\n    due create --name \"File taxes\" --due 2024-04-15 --level1 alice --level1-days 3\n\n    # Full chain ending in an email\n    due create --name \"Renew lease\" --due 2024-06-01 \\\n        --level1 alice --level1-days 3 --level2 bob --level2-days 2 \\\n        --email director@example.com --email-days 2"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "List tasks",
        long_about = "List tasks with their escalation stage, effective deadline, and overdue flag.",
        after_help = "EXAMPLES:\n    # Open tasks\n    due list\n\n    # Overdue tasks as JSON\n    due list --overdue --json"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Tasks", about = "Show one task")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Edit a task",
        long_about = "Edit task fields or its escalation chain. The escalation stage is not editable.",
        after_help = "EXAMPLES:\n    # Push the due date\n    due update tk-1a2b3c4d5e6f --due 2024-05-01\n\n    # Add a second escalation level\n    due update tk-1a2b3c4d5e6f --level2 bob --level2-days 2"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(next_help_heading = "Tasks", about = "Mark a task in progress")]
    Start(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Mark a task done",
        long_about = "Mark a task done. Done tasks are never escalated."
    )]
    Done(cmd::status::StatusArgs),

    #[command(next_help_heading = "Tasks", about = "Delete a task")]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Escalation",
        about = "Run escalations once",
        long_about = "Advance every overdue task by at most one escalation stage and record one notification per stage.",
        after_help = "EXAMPLES:\n    # Run now\n    due escalate\n\n    # Preview without writing\n    due escalate --dry-run\n\n    # Evaluate as of a given day\n    due escalate --now 2024-01-05"
    )]
    Escalate(cmd::escalate::EscalateArgs),

    #[command(
        next_help_heading = "Escalation",
        about = "List or acknowledge notifications",
        after_help = "EXAMPLES:\n    # Unread notifications for alice\n    due notifications --user alice --unread\n\n    # Mark one read\n    due notifications read nt-1a2b3c4d5e6f7a8b"
    )]
    Notifications(cmd::notifications::NotificationsArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    due completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("DUECHAIN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if verbose || env::var("DEBUG").is_ok() {
            "duechain=debug,info"
        } else {
            "duechain=info,warn"
        })
    });

    let format = env::var("DUECHAIN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = cmd::project_root()?;
    let effective = config::resolve_config(&project_root, cli.json)?;
    let output = cli
        .format
        .unwrap_or_else(|| OutputMode::from_resolved(&effective.resolved_output));
    debug!(?output, now = ?cli.now, root = %project_root.display(), "starting command");

    let ctx = cmd::Context {
        project_root,
        output,
        config: effective.project,
        now: cli.now,
    };

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::Create(args) => cmd::create::run_create(args, &ctx),
        Commands::List(args) => cmd::list::run_list(args, &ctx),
        Commands::Show(args) => cmd::show::run_show(args, &ctx),
        Commands::Update(args) => cmd::update::run_update(args, &ctx),
        Commands::Start(args) => cmd::status::run_start(args, &ctx),
        Commands::Done(args) => cmd::status::run_done(args, &ctx),
        Commands::Delete(args) => cmd::delete::run_delete(args, &ctx),
        Commands::Escalate(args) => cmd::escalate::run_escalate(args, &ctx),
        Commands::Notifications(args) => cmd::notifications::run_notifications(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["due", "--json", "list"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["due", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_is_a_value_enum() {
        let cli = Cli::parse_from(["due", "list", "--format", "text"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert!(Cli::try_parse_from(["due", "list", "--format", "yaml"]).is_err());
    }

    #[test]
    fn now_accepts_dates_and_instants() {
        let cli = Cli::parse_from(["due", "--now", "2024-01-05", "escalate"]);
        assert_eq!(
            cli.now.map(|n| n.date_naive().to_string()),
            Some("2024-01-05".to_string())
        );
        let cli = Cli::parse_from(["due", "escalate", "--now", "2024-01-05T23:30:00Z"]);
        assert!(cli.now.is_some());
        assert!(Cli::try_parse_from(["due", "--now", "soon", "escalate"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["due", "-v", "-q", "list"]).is_err());
        let cli = Cli::parse_from(["due", "-q", "list"]);
        assert!(cli.quiet);
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["due", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["due", "init"],
            vec!["due", "create", "--name", "x"],
            vec!["due", "list"],
            vec!["due", "show", "x"],
            vec!["due", "update", "x", "--name", "y"],
            vec!["due", "start", "x"],
            vec!["due", "done", "x"],
            vec!["due", "delete", "x"],
            vec!["due", "escalate"],
            vec!["due", "escalate", "--dry-run"],
            vec!["due", "notifications"],
            vec!["due", "notifications", "read", "nt-1"],
            vec!["due", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
