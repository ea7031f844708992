use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::template::TocTemplate;

/// Project configuration, read from an optional `toc.toml`.
///
/// All keys are optional; an unreadable file degrades to defaults. The
/// `TOC`/`FULL` environment switch is applied on top of the `enabled` key.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub enabled: bool,
    pub docs_dir: PathBuf,
    pub template_path: Option<PathBuf>,
    pub ignored_commits_path: Option<PathBuf>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            docs_dir: PathBuf::from("docs"),
            template_path: None,
            ignored_commits_path: None,
        }
    }
}

impl HookConfig {
    pub fn from_json_value(value: &Value) -> Self {
        let enabled = value
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let docs_dir = value
            .get("docs_dir")
            .and_then(Value::as_str)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("docs"));

        let template_path = value
            .get("template")
            .and_then(Value::as_str)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let ignored_commits_path = value
            .get("ignored_commits_file")
            .and_then(Value::as_str)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            enabled,
            docs_dir,
            template_path,
            ignored_commits_path,
        }
    }

    /// Effective switch: the config key gated by the environment.
    pub fn is_enabled(&self) -> bool {
        self.enabled && env_enabled()
    }

    pub fn template(&self) -> TocTemplate {
        match &self.template_path {
            Some(path) => TocTemplate::from_path(path.clone()),
            None => TocTemplate::embedded(),
        }
    }

    /// Commit ids excluded from update-time resolution. Defaults to
    /// `<docs_dir>/.ignored-commits`; a missing file means an empty set.
    pub fn ignored_commits(&self) -> HashSet<String> {
        let path = self
            .ignored_commits_path
            .clone()
            .unwrap_or_else(|| self.docs_dir.join(".ignored-commits"));
        load_ignored_commits(&path)
    }
}

/// Load configuration, warning and falling back to defaults on any failure.
/// Relative paths in the file resolve against the file's own directory.
pub fn load_config(path: Option<&Path>) -> HookConfig {
    let Some(path) = path else {
        return HookConfig::default();
    };

    let raw = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!(
                "Warning: failed to read configuration at {}: {err}",
                path.display()
            );
            return HookConfig::default();
        }
    };

    match parse_toml_config(&raw, path) {
        Ok(value) => anchor_config(HookConfig::from_json_value(&value), path.parent()),
        Err(err) => {
            eprintln!(
                "Warning: failed to parse configuration at {}: {err}",
                path.display()
            );
            HookConfig::default()
        }
    }
}

fn parse_toml_config(raw: &str, path: &Path) -> Result<Value, String> {
    toml::from_str::<toml::Value>(raw)
        .map_err(|err| format!("TOML parse error: {err}"))
        .and_then(|value| serde_json::to_value(value).map_err(|err| err.to_string()))
        .map_err(|err| format!("failed to parse config {}: {err}", path.display()))
}

fn anchor_config(config: HookConfig, base: Option<&Path>) -> HookConfig {
    HookConfig {
        enabled: config.enabled,
        docs_dir: anchor_path(config.docs_dir, base),
        template_path: config.template_path.map(|p| anchor_path(p, base)),
        ignored_commits_path: config.ignored_commits_path.map(|p| anchor_path(p, base)),
    }
}

fn anchor_path(path: PathBuf, base: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match base {
        Some(base) if !base.as_os_str().is_empty() => base.join(path),
        _ => path,
    }
}

/// One commit id per line; blanks and `#` comments skipped. Missing file is
/// an empty set.
pub fn load_ignored_commits(path: &Path) -> HashSet<String> {
    let Ok(raw) = fs::read_to_string(path) else {
        return HashSet::new();
    };

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// The hook switch from the environment: `TOC` (default "1") enables, any
/// other value disables; `FULL=true` force-enables.
pub fn env_enabled() -> bool {
    enabled_from(env::var("TOC").ok().as_deref(), env::var("FULL").ok().as_deref())
}

fn enabled_from(toc: Option<&str>, full: Option<&str>) -> bool {
    toc.unwrap_or("1") == "1" || full.unwrap_or("0").to_lowercase() == "true"
}
