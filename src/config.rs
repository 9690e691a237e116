//! Configuration loading and validation.
//!
//! Values come from an optional JSON file, then environment overrides, then
//! validation. Secrets (admin credentials, notification token) have no
//! defaults in source.
use crate::wire::DELIVERY_PATH;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL for the delivery endpoint.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";
/// Fixed request deadline for delivery calls.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default bind address for `signup serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
/// Sheet that receives registration rows.
pub const DEFAULT_SHEET_NAME: &str = "Registrations";
/// Directory name under the platform data dir.
pub const APP_DIR: &str = "signup-relay";

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub endpoint: EndpointConfig,
    pub admin: AdminConfig,
    pub mirror: MirrorConfig,
}

/// Submission client settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub delivery: DeliveryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            delivery: DeliveryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Full URL of the delivery endpoint.
    pub fn endpoint_url(&self) -> String {
        join_url(&self.base_url, DELIVERY_PATH)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Network delivery policy. `retries: 0` is at-most-once delivery.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryPolicy {
    pub retries: u32,
}

/// Delivery endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub bind: String,
    /// Target store reference; defaults under the platform data dir.
    pub workbook_dir: Option<PathBuf>,
    pub sheet_name: String,
    pub notify: Option<NotifyConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            workbook_dir: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            notify: None,
        }
    }
}

impl EndpointConfig {
    pub fn resolved_workbook_dir(&self) -> Result<PathBuf> {
        match &self.workbook_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(data_root()?.join("workbook")),
        }
    }
}

/// Webhook used to send the messaging invite after a row is appended.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_notify_timeout_ms() -> u64 {
    10_000
}

/// Admin credential pair. Unset means every login is rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Local mirror settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub path: Option<PathBuf>,
}

impl MirrorConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_root()?.join("mirror").join("registrations.json")),
        }
    }
}

/// Root directory for app-owned data (`~/.local/share/signup-relay` on Linux).
pub fn data_root() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(data_dir.join(APP_DIR))
}

/// Default config file location, used when `--config` is not given.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(data_root()?.join("config.json"))
}

/// Load config from an explicit path, else the default path if it exists.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path()?;
            if !path.is_file() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Apply `SIGNUP_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(url) = non_empty("SIGNUP_BACKEND_URL") {
        config.client.base_url = url;
    }
    if let Some(bind) = non_empty("SIGNUP_BIND") {
        config.endpoint.bind = bind;
    }
    if let Some(dir) = non_empty("SIGNUP_WORKBOOK_DIR") {
        config.endpoint.workbook_dir = Some(PathBuf::from(dir));
    }
    if let Some(url) = non_empty("SIGNUP_NOTIFY_URL") {
        let token = non_empty("SIGNUP_NOTIFY_TOKEN");
        let notify = config.endpoint.notify.get_or_insert_with(|| NotifyConfig {
            url: String::new(),
            token: None,
            timeout_ms: default_notify_timeout_ms(),
        });
        notify.url = url;
        if token.is_some() {
            notify.token = token;
        }
    }
    if let Some(username) = non_empty("SIGNUP_ADMIN_USERNAME") {
        config.admin.username = Some(username);
    }
    if let Some(password) = non_empty("SIGNUP_ADMIN_PASSWORD") {
        config.admin.password = Some(password);
    }
    if let Some(path) = non_empty("SIGNUP_MIRROR_PATH") {
        config.mirror.path = Some(PathBuf::from(path));
    }
}

/// Validate values that would otherwise fail late at request time.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_http_url(&config.client.base_url, "client.base_url")?;
    if config.client.timeout_ms == 0 {
        return Err(anyhow!("client.timeout_ms must be greater than zero"));
    }
    if config.endpoint.bind.trim().is_empty() {
        return Err(anyhow!("endpoint.bind must be non-empty"));
    }
    if config.endpoint.sheet_name.trim().is_empty() {
        return Err(anyhow!("endpoint.sheet_name must be non-empty"));
    }
    if let Some(notify) = &config.endpoint.notify {
        validate_http_url(&notify.url, "endpoint.notify.url")?;
        if notify.timeout_ms == 0 {
            return Err(anyhow!("endpoint.notify.timeout_ms must be greater than zero"));
        }
    }
    if config.admin.username.is_some() != config.admin.password.is_some() {
        return Err(anyhow!(
            "admin.username and admin.password must be set together"
        ));
    }
    if config.client.delivery.retries > 0 {
        tracing::warn!(
            retries = config.client.delivery.retries,
            "delivery retries enabled; the endpoint has no dedup key, so retried rows may repeat"
        );
    }
    Ok(())
}

/// Load, apply process environment overrides, and validate.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = load_config(explicit)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

fn validate_http_url(url: &str, label: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("{label} must be an http(s) URL (got {url:?})"));
    }
    Ok(())
}

fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
