//! Subcommand handlers plus the session plumbing they share.

pub mod completions;
pub mod create;
pub mod delete;
pub mod escalate;
pub mod init;
pub mod list;
pub mod notifications;
pub mod show;
pub mod status;
pub mod update;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use duechain_core::config::{self, ProjectConfig};
use duechain_core::db::SqliteBackend;
use duechain_core::escalation::compute_effective_deadline;
use duechain_core::{
    Clock, ErrorCode, EscalationChain, EscalationInput, FixedClock, StageInput, StoreError,
    SystemClock, Task, TaskStore,
};
use serde::Serialize;

use crate::output::{CliError, OutputMode, Renderable, pretty_kv, pretty_rule, render_error};

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub project_root: PathBuf,
    pub output: OutputMode,
    pub config: ProjectConfig,
    /// `--now` override; `None` means the system clock.
    pub now: Option<DateTime<Utc>>,
}

pub type CliStore = TaskStore<SqliteBackend, SqliteBackend, Arc<dyn Clock>>;

impl Context {
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.now {
            Some(now) => Arc::new(FixedClock::new(now)),
            None => Arc::new(SystemClock),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        config::database_path(&self.project_root, &self.config)
    }

    /// Open the project database, failing with E1001 when `due init` has not run.
    pub fn open_backend(&self) -> anyhow::Result<SqliteBackend> {
        if !config::project_dir(&self.project_root).is_dir() {
            let code = ErrorCode::NotInitialized;
            render_error(
                self.output,
                &CliError::with_details(
                    format!("no {} directory in {}", config::PROJECT_DIR, self.project_root.display()),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("{}", code.message());
        }
        let path = self.database_path();
        SqliteBackend::open(&path)
            .with_context(|| format!("open task database {}", path.display()))
    }

    /// A store over two connections to the project database: one for tasks,
    /// one for notifications.
    pub fn open_store(&self) -> anyhow::Result<CliStore> {
        let repo = self.open_backend()?;
        let notifier = self.open_backend()?;
        Ok(TaskStore::new(repo, notifier, self.clock()).with_runner(self.config.escalation.runner()))
    }

    /// Render `err` and turn it into the command's failure.
    pub fn fail(&self, err: &StoreError) -> anyhow::Error {
        if let Err(render_err) = render_error(self.output, &CliError::from(err)) {
            return render_err;
        }
        anyhow::anyhow!("{}: {err}", err.code())
    }
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{raw}': {e}"))
}

/// Parse an RFC 3339 instant, or a bare date taken as midnight UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = parse_date(raw)?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date '{raw}'"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// The stage flags shared by `create` and `update`.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct StageArgs {
    /// User who receives the first escalation.
    #[arg(long, value_name = "USER")]
    pub level1: Option<String>,

    /// Days after the due date before escalating to level 1.
    #[arg(long, value_name = "DAYS")]
    pub level1_days: Option<u32>,

    /// User who receives the second escalation.
    #[arg(long, value_name = "USER")]
    pub level2: Option<String>,

    /// Days after level 1 before escalating to level 2.
    #[arg(long, value_name = "DAYS")]
    pub level2_days: Option<u32>,

    /// Email address notified after the last user level.
    #[arg(long, value_name = "ADDR")]
    pub email: Option<String>,

    /// Days after level 2 before the email is sent.
    #[arg(long, value_name = "DAYS")]
    pub email_days: Option<u32>,
}

impl StageArgs {
    pub const fn is_empty(&self) -> bool {
        self.level1.is_none()
            && self.level1_days.is_none()
            && self.level2.is_none()
            && self.level2_days.is_none()
            && self.email.is_none()
            && self.email_days.is_none()
    }

    /// Overlay the given flags on `base`, stage field by stage field.
    pub fn overlay(&self, base: EscalationInput) -> EscalationInput {
        fn merge(base: StageInput, target: Option<&String>, days: Option<u32>) -> StageInput {
            StageInput::new(
                target.cloned().or(base.target),
                days.or(base.duration_days),
            )
        }
        EscalationInput {
            level1: merge(base.level1, self.level1.as_ref(), self.level1_days),
            level2: merge(base.level2, self.level2.as_ref(), self.level2_days),
            email: merge(base.email, self.email.as_ref(), self.email_days),
        }
    }
}

/// Turn a validated chain back into editable input.
pub fn chain_input(chain: &EscalationChain) -> EscalationInput {
    let user = |stage: Option<&duechain_core::UserStage>| {
        stage.map_or_else(StageInput::default, |s| {
            StageInput::new(Some(s.assignee.clone()), Some(s.duration_days))
        })
    };
    EscalationInput {
        level1: user(chain.level1.as_ref()),
        level2: user(chain.level2.as_ref()),
        email: chain.email.as_ref().map_or_else(StageInput::default, |s| {
            StageInput::new(Some(s.recipient.clone()), Some(s.duration_days))
        }),
    }
}

/// A task plus its effective deadline at the session's instant.
#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub effective_deadline: Option<NaiveDate>,
    pub is_overdue: bool,
}

impl TaskView {
    pub fn new(task: Task, now: DateTime<Utc>) -> Self {
        let eff = compute_effective_deadline(&task, now);
        Self {
            task,
            effective_deadline: eff.deadline,
            is_overdue: eff.is_overdue,
        }
    }

    fn deadline_label(&self) -> String {
        self.effective_deadline
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
    }
}

impl Renderable for TaskView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let t = &self.task;
        writeln!(w, "{}  {}", t.id, t.name)?;
        pretty_rule(w)?;
        pretty_kv(w, "Status", t.status.to_string())?;
        pretty_kv(w, "Escalation", t.escalation_status.to_string())?;
        if let Some(assignee) = &t.assigned_to {
            pretty_kv(w, "Assignee", assignee)?;
        }
        if let Some(due) = t.due_date {
            pretty_kv(w, "Due", due.format("%Y-%m-%d").to_string())?;
        }
        let overdue = if self.is_overdue { "  (overdue)" } else { "" };
        pretty_kv(w, "Deadline", format!("{}{overdue}", self.deadline_label()))?;
        if let Some(stage) = &t.escalation.level1 {
            pretty_kv(w, "Level 1", format!("{} after {}d", stage.assignee, stage.duration_days))?;
        }
        if let Some(stage) = &t.escalation.level2 {
            pretty_kv(w, "Level 2", format!("{} after {}d", stage.assignee, stage.duration_days))?;
        }
        if let Some(stage) = &t.escalation.email {
            pretty_kv(w, "Email", format!("{} after {}d", stage.recipient, stage.duration_days))?;
        }
        if let Some(description) = &t.description {
            writeln!(w)?;
            writeln!(w, "{description}")?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.task.id,
            self.task.status,
            self.task.escalation_status,
            self.deadline_label(),
            if self.is_overdue { "overdue" } else { "-" },
            self.task.name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATUS", "ESCALATION", "DEADLINE", "OVERDUE", "NAME"]
    }
}

/// Resolve the project root for a command: the working directory.
pub fn project_root() -> anyhow::Result<PathBuf> {
    std::env::current_dir().context("resolve current directory")
}

pub fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
