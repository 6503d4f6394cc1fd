use std::fs;

use client_core::{OrderingMode, RestStoreConfig, RetryPolicy};
use tracing::warn;

pub const CONFIG_FILE: &str = "planner.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted PostgREST-style table.
    Rest,
    /// Local SQLite file.
    Sqlite,
}

impl Backend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rest" | "hosted" => Some(Backend::Rest),
            "sqlite" | "local" => Some(Backend::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub store_url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub database_url: String,
    pub ordering: OrderingMode,
    pub retry_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            store_url: None,
            api_key: None,
            table: client_core::rest::DEFAULT_TABLE.into(),
            database_url: "sqlite://./data/planner.db".into(),
            ordering: OrderingMode::default(),
            retry_attempts: RetryPolicy::default().max_attempts,
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_attempts(self.retry_attempts)
    }

    /// `None` when no store url is configured.
    pub fn rest_config(&self) -> Option<RestStoreConfig> {
        let url = self.store_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let mut config = RestStoreConfig::new(url).with_table(self.table.clone());
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        Some(config)
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `planner.toml`, then the environment. For every setting the
/// `APP__` spelling wins over the `PLANNER_` one.
pub fn settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();
    let mut backend: Option<String> = None;
    let mut ordering: Option<String> = None;
    let mut retry_attempts: Option<String> = None;

    if let Some(raw) = file {
        match toml::from_str::<toml::Table>(raw) {
            Ok(file_cfg) => {
                let value = |key: &str| file_value(&file_cfg, key);
                if let Some(v) = value("store_url") {
                    settings.store_url = Some(v);
                }
                if let Some(v) = value("api_key") {
                    settings.api_key = Some(v);
                }
                if let Some(v) = value("table") {
                    settings.table = v;
                }
                if let Some(v) = value("database_url") {
                    settings.database_url = v;
                }
                backend = value("backend").or(backend);
                ordering = value("ordering").or(ordering);
                retry_attempts = value("retry_attempts").or(retry_attempts);
            }
            Err(err) => warn!(error = %err, "ignoring unreadable {CONFIG_FILE}"),
        }
    }

    let lookup = |names: &[&str]| names.iter().rev().find_map(|name| env(*name));

    if let Some(v) = lookup(&["PLANNER_STORE_URL", "APP__STORE_URL"]) {
        settings.store_url = Some(v);
    }
    if let Some(v) = lookup(&["PLANNER_API_KEY", "APP__API_KEY"]) {
        settings.api_key = Some(v);
    }
    if let Some(v) = lookup(&["PLANNER_TABLE", "APP__TABLE"]) {
        settings.table = v;
    }
    if let Some(v) = lookup(&["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    backend = lookup(&["PLANNER_BACKEND", "APP__BACKEND"]).or(backend);
    ordering = lookup(&["PLANNER_ORDERING", "APP__ORDERING"]).or(ordering);
    retry_attempts = lookup(&["PLANNER_RETRY_ATTEMPTS", "APP__RETRY_ATTEMPTS"]).or(retry_attempts);

    settings.backend = match backend.as_deref().map(|raw| (raw, Backend::parse(raw))) {
        Some((_, Some(parsed))) => parsed,
        Some((raw, None)) => {
            warn!(value = raw, "unknown backend; choosing from the configured store url");
            implied_backend(&settings)
        }
        None => implied_backend(&settings),
    };

    if let Some(raw) = ordering {
        match OrderingMode::parse(&raw) {
            Some(parsed) => settings.ordering = parsed,
            None => warn!(value = %raw, "unknown ordering; keeping start_time"),
        }
    }

    if let Some(raw) = retry_attempts {
        match raw.trim().parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.retry_attempts = parsed,
            _ => warn!(value = %raw, "retry attempts must be a positive integer"),
        }
    }

    settings
}

fn implied_backend(settings: &Settings) -> Backend {
    if settings.rest_config().is_some() {
        Backend::Rest
    } else {
        Backend::Sqlite
    }
}

fn file_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        toml::Value::Boolean(v) => Some(v.to_string()),
        _ => None,
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
