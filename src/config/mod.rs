use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_READINESS_WAIT_MS: u64 = 12_000;
const DEFAULT_BACKUP_KEEP: usize = 5;
const DEFAULT_RECENT_PROJECTS: usize = 10;

// ─── AutosaveConfig ───────────────────────────────────────────────────────────

/// Autosave tuning (`[autosave]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before the draft is persisted
    /// (milliseconds). Default: 1000.
    pub debounce_ms: u64,
    /// How long a wizard step waits for a project to become available before
    /// settling on defaults (milliseconds). Default: 12000.
    pub readiness_wait_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            readiness_wait_ms: DEFAULT_READINESS_WAIT_MS,
        }
    }
}

// ─── BackupConfig ─────────────────────────────────────────────────────────────

/// Backup retention (`[backup]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backups kept per project after cleanup. Default: 5.
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            keep: DEFAULT_BACKUP_KEEP,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Directory holding `.courseproj` documents (default: `{data_dir}/projects`).
    projects_dir: Option<PathBuf>,
    /// How many recently opened projects to report (default: 10).
    recent_projects: Option<usize>,
    /// Log level filter string, e.g. "debug", "info,courseforge=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
    /// Log SQLite queries exceeding this threshold (milliseconds). 0 = off (default).
    slow_query_threshold_ms: Option<u64>,
    /// Autosave tuning (`[autosave]`).
    autosave: Option<AutosaveConfig>,
    /// Backup retention (`[backup]`).
    backup: Option<BackupConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── HostConfig ───────────────────────────────────────────────────────────────

/// Resolved host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub data_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub recent_projects: usize,
    pub log: String,
    pub log_format: String,
    pub slow_query_threshold_ms: u64,
    pub autosave: AutosaveConfig,
    pub backup: BackupConfig,
}

impl HostConfig {
    /// Build config from an optional explicit data dir + TOML file + env.
    ///
    /// Priority (highest to lowest):
    ///   1. Environment (`COURSEFORGE_*`)
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let projects_dir = std::env::var("COURSEFORGE_PROJECTS_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or(toml.projects_dir)
            .unwrap_or_else(|| data_dir.join("projects"));

        let log = std::env::var("COURSEFORGE_LOG")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log)
            .unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("COURSEFORGE_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let recent_projects = toml.recent_projects.unwrap_or(DEFAULT_RECENT_PROJECTS);
        let slow_query_threshold_ms = toml.slow_query_threshold_ms.unwrap_or(0);
        let autosave = toml.autosave.unwrap_or_default();
        let backup = toml.backup.unwrap_or_default();

        Self {
            data_dir,
            projects_dir,
            recent_projects,
            log,
            log_format,
            slow_query_threshold_ms,
            autosave,
            backup,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/courseforge
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("courseforge");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/courseforge or ~/.local/share/courseforge
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("courseforge");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("courseforge");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\courseforge
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("courseforge");
        }
    }
    // Fallback
    PathBuf::from(".courseforge")
}
