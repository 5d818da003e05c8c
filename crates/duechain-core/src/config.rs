use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::escalation::{EscalationRunner, runner::DEFAULT_LINK_TO};

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".duechain";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Run escalations at all. When off, `run_escalations` is never invoked.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deep link attached to escalation notifications. Empty disables it.
    #[serde(default = "default_link_to")]
    pub link_to: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            link_to: default_link_to(),
        }
    }
}

impl EscalationConfig {
    #[must_use]
    pub fn runner(&self) -> EscalationRunner {
        let link = self.link_to.trim();
        EscalationRunner::new((!link.is_empty()).then(|| link.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file, relative to `.duechain/` unless absolute.
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Path of the project's `.duechain/` directory.
#[must_use]
pub fn project_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR)
}

/// Resolve the database path for a project.
#[must_use]
pub fn database_path(project_root: &Path, config: &ProjectConfig) -> PathBuf {
    let db = &config.storage.database;
    if db.is_absolute() {
        db.clone()
    } else {
        project_dir(project_root).join(db)
    }
}

/// # Errors
///
/// Returns an error when the config file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_dir(project_root).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Returns an error when the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("duechain/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Returns an error when either config file is unreadable.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.clone(),
        env_format,
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if is_tty { "pretty" } else { "text" }.to_string()
}

const fn default_true() -> bool {
    true
}

fn default_link_to() -> String {
    DEFAULT_LINK_TO.to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("duechain.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert!(cfg.escalation.enabled);
        assert_eq!(cfg.escalation.link_to, "/tasks");
        assert_eq!(
            database_path(root.path(), &cfg),
            root.path().join(".duechain/duechain.db")
        );
    }

    #[test]
    fn partial_project_config_fills_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let dir = project_dir(root.path());
        std::fs::create_dir_all(&dir).expect("create .duechain");
        std::fs::write(
            dir.join("config.toml"),
            "[escalation]\nlink_to = \"\"\n\n[storage]\ndatabase = \"/var/lib/duechain/tasks.db\"\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert!(cfg.escalation.enabled);
        assert_eq!(
            database_path(root.path(), &cfg),
            PathBuf::from("/var/lib/duechain/tasks.db")
        );

        let runner = cfg.escalation.runner();
        let outcome = runner.run(&[], chrono::Utc::now());
        assert!(outcome.is_empty());
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let dir = project_dir(root.path());
        std::fs::create_dir_all(&dir).expect("create .duechain");
        std::fs::write(dir.join("config.toml"), "[escalation\n").expect("write config");

        let err = load_project_config(root.path()).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(
            true,
            Some("pretty".to_string()),
            Some("text".to_string()),
            true,
        );
        assert_eq!(output, "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()), false);
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("human".to_string()), Some("table".to_string()), true);
        assert_eq!(text, "text");
    }

    #[test]
    fn tty_decides_when_nothing_is_set() {
        assert_eq!(resolve_output(false, None, None, true), "pretty");
        assert_eq!(resolve_output(false, None, None, false), "text");
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }
}
