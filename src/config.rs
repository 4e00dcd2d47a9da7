//! Runtime configuration resolved from the environment (and `.env`).

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::warn;

use crate::search::tantivy::{IndexSettings, index_dir};

pub const ENV_DATA_DIR: &str = "STUSEARCH_DATA_DIR";
pub const ENV_DB: &str = "STUSEARCH_DB";
pub const ENV_INDEX_DIR: &str = "STUSEARCH_INDEX_DIR";
pub const ENV_MAX_HITS: &str = "STUSEARCH_MAX_HITS";
pub const ENV_WRITER_HEAP: &str = "STUSEARCH_WRITER_HEAP";
pub const ENV_ALLOW_RESET: &str = "STUSEARCH_ALLOW_RESET";

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub index_dir: PathBuf,
    pub max_hits: usize,
    pub writer_heap_bytes: usize,
    pub allow_reset: bool,
}

impl SearchConfig {
    /// Paths derived from `data_dir`, everything else at defaults.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let defaults = IndexSettings::default();
        Self {
            db_path: data_dir.join("students.db"),
            index_dir: index_dir(&data_dir),
            data_dir,
            max_hits: defaults.max_hits,
            writer_heap_bytes: defaults.writer_heap_bytes,
            allow_reset: defaults.allow_reset,
        }
    }

    /// Environment first, then explicit overrides (CLI flags) on top.
    pub fn resolve(data_dir: Option<PathBuf>, db: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir.or_else(|| dotenvy::var(ENV_DATA_DIR).ok().map(PathBuf::from)) {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let mut cfg = Self::with_data_dir(data_dir);

        if let Ok(path) = dotenvy::var(ENV_DB) {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(path) = db {
            cfg.db_path = path;
        }
        if let Ok(path) = dotenvy::var(ENV_INDEX_DIR) {
            cfg.index_dir = PathBuf::from(path);
        }
        if let Some(n) = parse_env(ENV_MAX_HITS, |v| v.parse::<usize>().ok().filter(|n| *n > 0)) {
            cfg.max_hits = n;
        }
        if let Some(n) = parse_env(ENV_WRITER_HEAP, |v| v.parse::<usize>().ok()) {
            cfg.writer_heap_bytes = n;
        }
        if let Some(b) = parse_env(ENV_ALLOW_RESET, parse_bool) {
            cfg.allow_reset = b;
        }
        Ok(cfg)
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            writer_heap_bytes: self.writer_heap_bytes,
            max_hits: self.max_hits,
            allow_reset: self.allow_reset,
        }
    }
}

fn parse_env<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = dotenvy::var(key).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(key, value = raw.as_str(), "ignoring unparseable config value");
    }
    parsed
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("com", "student-search", "student-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("no home directory to derive a data dir from"))
}
