use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{DEFAULT_FNAME_TTL, DEFAULT_MAX_DEPTH};
use crate::format::DEFAULT_WRAP_WIDTH;
use crate::history::DEFAULT_CAPACITY;
use crate::hub::DEFAULT_HUB_URL;

const DEFAULT_ENV_PREFIX: &str = "FARGO";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub explore: ExploreConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    #[serde(default = "default_hub_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: default_hub_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_hub_url() -> String {
    DEFAULT_HUB_URL.to_string()
}

fn default_user_agent() -> String {
    format!("fargo/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExploreConfig {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_max_thread_depth")]
    pub max_thread_depth: usize,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            history_size: default_history_size(),
            max_thread_depth: default_max_thread_depth(),
        }
    }
}

fn default_count() -> usize {
    50
}

fn default_history_size() -> usize {
    DEFAULT_CAPACITY
}

fn default_max_thread_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            wrap_width: default_wrap_width(),
        }
    }
}

fn default_wrap_width() -> usize {
    DEFAULT_WRAP_WIDTH
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_fname_ttl", with = "humantime_serde")]
    pub fname_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            fname_ttl: default_fname_ttl(),
        }
    }
}

fn default_fname_ttl() -> Duration {
    DEFAULT_FNAME_TTL
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    let path = options.config_file.or_else(default_config_path);
    if let Some(path) = path.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix, env::vars());

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.hub.url.trim().is_empty() {
        base.hub.url = other.hub.url;
    }
    if !other.hub.user_agent.trim().is_empty() {
        base.hub.user_agent = other.hub.user_agent;
    }
    if !other.hub.timeout.is_zero() {
        base.hub.timeout = other.hub.timeout;
    }

    if other.explore.count != 0 {
        base.explore.count = other.explore.count;
    }
    if other.explore.history_size != 0 {
        base.explore.history_size = other.explore.history_size;
    }
    if other.explore.max_thread_depth != 0 {
        base.explore.max_thread_depth = other.explore.max_thread_depth;
    }

    if other.ui.wrap_width != 0 {
        base.ui.wrap_width = other.ui.wrap_width;
    }

    if other.cache.path.is_some() {
        base.cache.path = other.cache.path;
    }
    if !other.cache.fname_ttl.is_zero() {
        base.cache.fname_ttl = other.cache.fname_ttl;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str, vars: impl IntoIterator<Item = (String, String)>) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            apply_env_value(cfg, &normalized, value);
        }
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "hub.url" => cfg.hub.url = value,
        "hub.user_agent" => cfg.hub.user_agent = value,
        "hub.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.hub.timeout = duration;
            }
        }
        "explore.count" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.explore.count = parsed;
            }
        }
        "explore.history_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.explore.history_size = parsed;
            }
        }
        "explore.max_thread_depth" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.explore.max_thread_depth = parsed;
            }
        }
        "ui.wrap_width" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.ui.wrap_width = parsed;
            }
        }
        "cache.path" => cfg.cache.path = Some(PathBuf::from(value)),
        "cache.fname_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.cache.fname_ttl = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fargo").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.hub.url, "http://127.0.0.1:2281");
        assert_eq!(cfg.hub.timeout, Duration::from_secs(20));
        assert_eq!(cfg.explore.count, 50);
        assert_eq!(cfg.explore.history_size, 1024);
        assert_eq!(cfg.explore.max_thread_depth, 32);
        assert_eq!(cfg.ui.wrap_width, 79);
        assert_eq!(cfg.cache.path, None);
        assert_eq!(cfg.cache.fname_ttl, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "hub:\n  url: http://hub.example:2281\n  timeout: 5s\nexplore:\n  count: 10\ncache:\n  fname_ttl: 1h\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("FARGO_TEST_FILE_ONLY".into()),
        })
        .unwrap();
        assert_eq!(cfg.hub.url, "http://hub.example:2281");
        assert_eq!(cfg.hub.timeout, Duration::from_secs(5));
        assert_eq!(cfg.explore.count, 10);
        assert_eq!(cfg.explore.history_size, 1024);
        assert_eq!(cfg.ui.wrap_width, 79);
        assert_eq!(cfg.cache.fname_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "explore:\n  count: many\n").unwrap();
        let err = load(LoadOptions {
            config_file: Some(path),
            env_prefix: None,
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn env_values_apply_over_file_values() {
        let mut cfg = Config::default();
        cfg.hub.timeout = Duration::from_secs(5);
        apply_env(
            &mut cfg,
            "fargo",
            vars(&[
                ("FARGO_HUB__URL", "http://other:2281"),
                ("FARGO_EXPLORE__COUNT", "7"),
                ("FARGO_EXPLORE__HISTORY_SIZE", "lots"),
                ("FARGO_UI__WRAP_WIDTH", "60"),
                ("FARGO_CACHE__FNAME_TTL", "2days"),
                ("FARGO_CACHE__PATH", "/tmp/fargo.db"),
                ("OTHER_UI__WRAP_WIDTH", "1"),
            ]),
        );
        assert_eq!(cfg.hub.url, "http://other:2281");
        assert_eq!(cfg.hub.timeout, Duration::from_secs(5));
        assert_eq!(cfg.explore.count, 7);
        assert_eq!(cfg.explore.history_size, 1024);
        assert_eq!(cfg.ui.wrap_width, 60);
        assert_eq!(cfg.cache.fname_ttl, Duration::from_secs(2 * 24 * 60 * 60));
        assert_eq!(cfg.cache.path, Some(PathBuf::from("/tmp/fargo.db")));
    }

    #[test]
    fn process_env_is_read_with_prefix() {
        env::set_var("FARGO_TEST_ENV_UI__WRAP_WIDTH", "42");
        let dir = tempdir().unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(dir.path().join("missing.yaml")),
            env_prefix: Some("FARGO_TEST_ENV".into()),
        })
        .unwrap();
        env::remove_var("FARGO_TEST_ENV_UI__WRAP_WIDTH");
        assert_eq!(cfg.ui.wrap_width, 42);
    }
}
