//! Settings file loading
//!
//! Settings path precedence: `--config` > `$MANIFESTER_DIRECTORY/manifester_settings.toml`
//! > `./manifester_settings.toml`.
//!
//! The offline token may live in the TOML, in `offline_token_file`, or in the
//! `MANIFESTER_OFFLINE_TOKEN` env var, which wins over everything else
//! including per-category overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use manifester::{ContentAccess, DesiredSubscription, ManifestSpec, ManifesterConfig, Tuning};
use requester::RetryPolicy;
use serde::{Deserialize, Deserializer};

const SETTINGS_FILE: &str = "manifester_settings.toml";
const TOKEN_ENV: &str = "MANIFESTER_OFFLINE_TOKEN";
const DIRECTORY_ENV: &str = "MANIFESTER_DIRECTORY";

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Secret<String>>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(Secret::new)
        .filter(|s| !s.is_blank()))
}

/// Root settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, deserialize_with = "secret")]
    pub offline_token: Option<Secret<String>>,
    #[serde(default)]
    pub offline_token_file: Option<PathBuf>,
    #[serde(skip)]
    offline_token_env: Option<Secret<String>>,
    pub username_prefix: String,
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,
    #[serde(default = "default_manifest_directory")]
    pub manifest_directory: PathBuf,
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default)]
    pub url: UrlSettings,
    #[serde(default)]
    pub proxies: ProxySettings,
    #[serde(default)]
    pub tuning: TuningSettings,
    #[serde(default)]
    pub manifest_category: BTreeMap<String, CategorySettings>,
}

/// API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    #[serde(default = "default_token_request_url")]
    pub token_request: String,
    #[serde(default = "default_allocations_url")]
    pub allocations: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            token_request: default_token_request_url(),
            allocations: default_allocations_url(),
        }
    }
}

/// Per-category endpoint overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlOverride {
    pub token_request: Option<String>,
    pub allocations: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxySettings {
    pub https: Option<String>,
}

/// Retry, paging and polling knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TuningSettings {
    pub max_backoff_secs: u64,
    pub allocations_page_size: usize,
    pub pools_page_size: usize,
    pub max_reconcile_rounds: u32,
    pub reconcile_delay_secs: u64,
    pub export_max_attempts: u32,
    pub export_poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            max_backoff_secs: 240,
            allocations_page_size: 100,
            pools_page_size: 50,
            max_reconcile_rounds: 10,
            reconcile_delay_secs: 1,
            export_max_attempts: 500,
            export_poll_interval_ms: 500,
            request_timeout_secs: 60,
        }
    }
}

impl TuningSettings {
    fn to_tuning(&self) -> Tuning {
        Tuning {
            retry: RetryPolicy::default().with_max_backoff(Duration::from_secs(self.max_backoff_secs)),
            allocations_page_size: self.allocations_page_size,
            pools_page_size: self.pools_page_size,
            max_reconcile_rounds: self.max_reconcile_rounds,
            reconcile_delay: Duration::from_secs(self.reconcile_delay_secs),
            export_max_attempts: self.export_max_attempts,
            export_poll_interval: Duration::from_millis(self.export_poll_interval_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One `[manifest_category.<name>]` table
#[derive(Debug, Deserialize)]
pub struct CategorySettings {
    pub sat_version: String,
    #[serde(default)]
    pub simple_content_access: ContentAccess,
    #[serde(default)]
    pub subscription_data: Vec<DesiredSubscription>,
    #[serde(default, deserialize_with = "secret")]
    pub offline_token: Option<Secret<String>>,
    #[serde(default)]
    pub username_prefix: Option<String>,
    #[serde(default)]
    pub url: Option<UrlOverride>,
    #[serde(default)]
    pub proxies: Option<ProxySettings>,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("manifester_inventory.yaml")
}

fn default_manifest_directory() -> PathBuf {
    PathBuf::from("manifests")
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_token_request_url() -> String {
    rhsm_auth::TOKEN_REQUEST_URL.to_string()
}

fn default_allocations_url() -> String {
    rhsm_auth::ALLOCATIONS_URL.to_string()
}

fn check_prefix(key: &str, prefix: &str) -> common::Result<()> {
    if prefix.chars().count() < 3 {
        return Err(common::Error::Config(format!(
            "{key} must be at least 3 characters, got {prefix:?}"
        )));
    }
    Ok(())
}

fn check_url(key: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{key} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

impl Settings {
    /// Load settings from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&contents)?;

        check_prefix("username_prefix", &settings.username_prefix)?;
        check_url("url.token_request", &settings.url.token_request)?;
        check_url("url.allocations", &settings.url.allocations)?;

        let tuning = &settings.tuning;
        for (key, value) in [
            ("tuning.allocations_page_size", tuning.allocations_page_size as u64),
            ("tuning.pools_page_size", tuning.pools_page_size as u64),
            ("tuning.max_reconcile_rounds", u64::from(tuning.max_reconcile_rounds)),
            ("tuning.request_timeout_secs", tuning.request_timeout_secs),
            ("tuning.max_backoff_secs", tuning.max_backoff_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!("{key} must be greater than 0")));
            }
        }

        for (name, category) in &settings.manifest_category {
            if let Some(prefix) = &category.username_prefix {
                check_prefix(&format!("manifest_category.{name}.username_prefix"), prefix)?;
            }
            if let Some(url) = &category.url {
                for (key, value) in [("token_request", &url.token_request), ("allocations", &url.allocations)] {
                    if let Some(value) = value {
                        check_url(&format!("manifest_category.{name}.url.{key}"), value)?;
                    }
                }
            }
            if let Some(sub) = category.subscription_data.iter().find(|s| s.quantity == 0) {
                return Err(common::Error::Config(format!(
                    "manifest_category.{name}: quantity for {:?} must be greater than 0",
                    sub.name
                )));
            }
        }

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            let token = Secret::new(token);
            if !token.is_blank() {
                settings.offline_token_env = Some(token);
            }
        }
        if settings.offline_token.is_none()
            && let Some(ref token_file) = settings.offline_token_file
        {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read offline_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = Secret::new(token.trim().to_owned());
            if !token.is_blank() {
                settings.offline_token = Some(token);
            }
        }

        if let Ok(dir) = std::env::var(DIRECTORY_ENV) {
            let dir = PathBuf::from(dir);
            if settings.inventory_path.is_relative() {
                settings.inventory_path = dir.join(&settings.inventory_path);
            }
            if settings.manifest_directory.is_relative() {
                settings.manifest_directory = dir.join(&settings.manifest_directory);
            }
            if settings.log_directory.is_relative() {
                settings.log_directory = dir.join(&settings.log_directory);
            }
        }

        Ok(settings)
    }

    /// Resolve the settings path from the CLI arg or `MANIFESTER_DIRECTORY`.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(dir) = std::env::var(DIRECTORY_ENV) {
            let dir = PathBuf::from(dir);
            if dir.is_dir() {
                return dir.join(SETTINGS_FILE);
            }
        }
        PathBuf::from(SETTINGS_FILE)
    }

    fn category(&self, name: &str) -> common::Result<&CategorySettings> {
        self.manifest_category
            .get(name)
            .ok_or_else(|| common::Error::UnknownCategory(name.to_string()))
    }

    /// HTTPS proxy for `category`, falling back to the top-level one.
    pub fn https_proxy(&self, category: Option<&str>) -> Option<String> {
        category
            .and_then(|name| self.manifest_category.get(name))
            .and_then(|c| c.proxies.as_ref())
            .and_then(|p| p.https.clone())
            .or_else(|| self.proxies.https.clone())
    }

    /// Connection settings, with `category`'s overrides applied when given.
    pub fn manifester_config(&self, category: Option<&str>) -> common::Result<ManifesterConfig> {
        let category = category.map(|name| self.category(name)).transpose()?;

        let offline_token = self
            .offline_token_env
            .clone()
            .or_else(|| category.and_then(|c| c.offline_token.clone()))
            .or_else(|| self.offline_token.clone())
            .ok_or_else(|| {
                common::Error::Config(format!(
                    "no offline token: set {TOKEN_ENV}, offline_token or offline_token_file"
                ))
            })?;
        let username_prefix = category
            .and_then(|c| c.username_prefix.clone())
            .unwrap_or_else(|| self.username_prefix.clone());
        let url = category.and_then(|c| c.url.clone()).unwrap_or_default();

        let mut config = ManifesterConfig::new(offline_token, username_prefix);
        config.token_request_url = url
            .token_request
            .unwrap_or_else(|| self.url.token_request.clone());
        config.allocations_url = url
            .allocations
            .unwrap_or_else(|| self.url.allocations.clone())
            .trim_end_matches('/')
            .to_string();
        config.inventory_path = self.inventory_path.clone();
        config.manifest_dir = self.manifest_directory.clone();
        config.tuning = self.tuning.to_tuning();
        Ok(config)
    }

    /// What to put in a manifest for `category`.
    pub fn manifest_spec(
        &self,
        category: &str,
        allocation_name: Option<String>,
    ) -> common::Result<ManifestSpec> {
        let settings = self.category(category)?;
        Ok(ManifestSpec {
            allocation_name,
            sat_version: settings.sat_version.clone(),
            content_access: settings.simple_content_access,
            subscriptions: settings.subscription_data.clone(),
        })
    }
}
