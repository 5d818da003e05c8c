use anyhow::{Context as _, Result};
use clap::Args;
use duechain_core::config::{self, PROJECT_DIR};
use duechain_core::db::SqliteBackend;
use serde::Serialize;
use std::io::Write;

use super::{Context, relative};
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.duechain/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[escalation]\n\
    enabled = true\n\
    link_to = \"/tasks\"\n\
    \n\
    [storage]\n\
    database = \"duechain.db\"\n";

const GITIGNORE: &str = "duechain.db\nduechain.db-wal\nduechain.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    project_dir: String,
    config: String,
    database: String,
}

/// Execute `due init`. Creates the project skeleton:
///
/// ```text
/// .duechain/
///   config.toml   (default project config)
///   .gitignore    (database files)
///   duechain.db   (migrated, empty)
/// ```
///
/// # Errors
///
/// Returns an error if `.duechain/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let dir = config::project_dir(&ctx.project_root);

    if dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `due init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let project = config::load_project_config(&ctx.project_root)?;
    let db_path = config::database_path(&ctx.project_root, &project);
    SqliteBackend::open(&db_path)?;
    tracing::info!(path = %db_path.display(), "task database ready");

    let root = &ctx.project_root;
    let out = InitOutput {
        project_dir: relative(root, &dir).display().to_string(),
        config: relative(root, &config_path).display().to_string(),
        database: relative(root, &db_path).display().to_string(),
    };
    render_mode(
        ctx.output,
        &out,
        |o, w| writeln!(w, "initialized\t{}", o.project_dir),
        |o, w| {
            writeln!(w, "✓ Initialized {}/ project structure.", o.project_dir)?;
            writeln!(w)?;
            pretty_kv(w, "Config", &o.config)?;
            pretty_kv(w, "Database", &o.database)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(
                w,
                "  due create --name \"File taxes\" --due 2024-04-15 --level1 alice --level1-days 3"
            )?;
            writeln!(w, "  due escalate")
        },
    )
}
