// src/config/frontpage.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::casts::paginate::DriverConfig;

pub const ENV_CONFIG_PATH: &str = "FRONTPAGE_CONFIG_PATH";
pub const ENV_API_KEY: &str = "NEYNAR_API_KEY";
pub const ENV_API_BASE: &str = "NEYNAR_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://api.neynar.com/v2";
const DEFAULT_TOML_PATH: &str = "config/frontpage.toml";
const DEFAULT_JSON_PATH: &str = "config/frontpage.json";

/// Upstream cap on casts per user-feed request.
const MAX_PAGE_LIMIT: u32 = 25;

/// Floor for the pause between seed-author batches.
const MIN_INTER_REQUEST_DELAY_MS: u64 = 100;

/// Well-known accounts that post often enough to fill a daily front page.
const DEFAULT_SEED_AUTHORS: &[&str] = &[
    "dwr",
    "v",
    "farcaster",
    "base",
    "optimism",
    "a16z",
    "paradigm",
    "danromero",
    "jesse",
    "varunsrinivasan",
    "rish",
    "balajis",
];

/// Where the global "today" list draws candidates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalSource {
    #[default]
    Authors,
    Trending,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontpageConfig {
    pub api_base: String,
    pub seed_authors: Vec<String>,
    pub global_source: GlobalSource,
    pub per_author_limit: u32,
    pub page_limit: u32,
    pub max_pages: usize,
    pub candidate_cap: usize,
    pub inter_request_delay_ms: u64,
    pub author_concurrency: usize,
    pub early_stop_on_stale: bool,
    pub request_budget_secs: Option<u64>,
    /// Env only, never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for FrontpageConfig {
    fn default() -> Self {
        let d = DriverConfig::default();
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            seed_authors: DEFAULT_SEED_AUTHORS.iter().map(|s| s.to_string()).collect(),
            global_source: GlobalSource::default(),
            per_author_limit: d.per_author_limit,
            page_limit: d.page_limit,
            max_pages: d.max_pages,
            candidate_cap: d.candidate_cap,
            inter_request_delay_ms: d.inter_request_delay.as_millis() as u64,
            author_concurrency: d.author_concurrency,
            early_stop_on_stale: d.early_stop_on_stale,
            request_budget_secs: None,
            api_key: None,
        }
    }
}

impl FrontpageConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading frontpage config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// File lookup + env overrides:
    /// 1) $FRONTPAGE_CONFIG_PATH (must exist)
    /// 2) config/frontpage.toml
    /// 3) config/frontpage.json
    /// 4) built-in defaults
    ///
    /// Then `NEYNAR_API_KEY` and `NEYNAR_API_BASE` are applied.
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::load_file_default()?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn load_file_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    pub fn apply_env(&mut self) {
        self.api_key = std::env::var(ENV_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(base) = std::env::var(ENV_API_BASE)
            .ok()
            .filter(|b| !b.trim().is_empty())
        {
            self.api_base = base.trim().to_string();
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            per_author_limit: self.per_author_limit,
            page_limit: self.page_limit,
            max_pages: self.max_pages,
            candidate_cap: self.candidate_cap,
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
            author_concurrency: self.author_concurrency,
            early_stop_on_stale: self.early_stop_on_stale,
            request_budget: self.request_budget_secs.map(Duration::from_secs),
        }
    }

    fn sanitized(mut self) -> Self {
        self.seed_authors = clean_list(self.seed_authors);
        self.per_author_limit = self.per_author_limit.clamp(1, MAX_PAGE_LIMIT);
        self.page_limit = self.page_limit.clamp(1, MAX_PAGE_LIMIT);
        self.max_pages = self.max_pages.max(1);
        self.candidate_cap = self.candidate_cap.max(1);
        self.author_concurrency = self.author_concurrency.clamp(1, 3);
        self.inter_request_delay_ms = self.inter_request_delay_ms.max(MIN_INTER_REQUEST_DELAY_MS);
        self
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<FrontpageConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    match toml::from_str::<FrontpageConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported frontpage config format: {toml_err}")),
    }
}

// trim, drop blanks, drop repeats; first occurrence keeps its place
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_ascii_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_and_json_formats() {
        let toml = r#"
            seed_authors = [" dwr ", "", "@v", "DWR"]
            global_source = "trending"
            page_limit = 100
        "#;
        let cfg = parse_config(toml, "toml").unwrap().sanitized();
        assert_eq!(cfg.seed_authors, vec!["dwr".to_string(), "v".to_string()]);
        assert_eq!(cfg.global_source, GlobalSource::Trending);
        assert_eq!(cfg.page_limit, 25);
        assert_eq!(cfg.max_pages, 50);

        let json = r#"{"candidate_cap": 10, "author_concurrency": 9}"#;
        let cfg = parse_config(json, "json").unwrap().sanitized();
        assert_eq!(cfg.candidate_cap, 10);
        assert_eq!(cfg.author_concurrency, 3);
        assert_eq!(cfg.seed_authors.len(), DEFAULT_SEED_AUTHORS.len());
    }

    #[test]
    fn batch_delay_has_a_floor() {
        let cfg = parse_config("inter_request_delay_ms = 0\nauthor_concurrency = 3", "toml")
            .unwrap()
            .sanitized();
        assert_eq!(cfg.inter_request_delay_ms, 100);
        assert_eq!(cfg.driver_config().inter_request_delay, Duration::from_millis(100));

        let cfg = parse_config("inter_request_delay_ms = 400", "toml").unwrap().sanitized();
        assert_eq!(cfg.inter_request_delay_ms, 400);
    }

    #[test]
    fn driver_config_maps_units() {
        let cfg = FrontpageConfig {
            inter_request_delay_ms: 250,
            request_budget_secs: Some(20),
            ..FrontpageConfig::default()
        };
        let d = cfg.driver_config();
        assert_eq!(d.inter_request_delay, Duration::from_millis(250));
        assert_eq!(d.request_budget, Some(Duration::from_secs(20)));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_API_BASE);
        env::set_var(ENV_API_KEY, "  secret  ");

        let cfg = FrontpageConfig::load_default().unwrap();
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "max_pages = 3\napi_base = \"http://file\"").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_API_BASE, "http://env-wins");
        let cfg = FrontpageConfig::load_default().unwrap();
        assert_eq!(cfg.max_pages, 3);
        assert_eq!(cfg.api_base, "http://env-wins");

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(FrontpageConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_API_BASE);
        env::remove_var(ENV_API_KEY);
        env::set_current_dir(&old).unwrap();
    }
}
