//! # Operator Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LITELLM_OPERATOR_CONCURRENCY=8                                     │
//! │     LITELLM_OPERATOR_WATCH_NAMESPACE=ml                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config PATH / LITELLM_OPERATOR_CONFIG                            │
//! │     else ~/.config/litellm-operator/operator.toml (Linux)              │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [controller]
//! concurrency = 4
//! drift_interval_secs = 300
//! pass_timeout_secs = 60
//! initial_backoff_ms = 500
//! max_backoff_secs = 300
//!
//! [gateway]
//! request_timeout_secs = 30
//! tls_verify = true
//!
//! [instances]
//! secret_suffix = "-secrets"
//! service_suffix = "-service"
//! scheme = "http"
//! port = 4000
//! cluster_domain = "cluster.local"
//!
//! [watch]
//! namespace = "ml"          # omit to watch every namespace
//! kinds = ["Team", "VirtualKey"]
//!
//! [server]
//! health_port = 8081
//!
//! [log]
//! filter = "info,litellm=debug"
//! format = "compact"        # pretty | compact
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::dispatcher::DispatchConfig;
use crate::error::{ConfigError, ConfigResult};
use litellm_client::ClientOptions;
use litellm_core::{ResourceKind, RECONCILED_KINDS};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "LITELLM_OPERATOR_";

// =============================================================================
// Controller Settings
// =============================================================================

/// Scheduling of reconcile passes, shared by every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Maximum passes in flight per kind.
    pub concurrency: usize,

    /// Interval between drift checks of a successfully reconciled record.
    pub drift_interval_secs: u64,

    /// Deadline of a whole reconcile pass.
    pub pass_timeout_secs: u64,

    /// First retry delay after a retryable failure (milliseconds).
    pub initial_backoff_ms: u64,

    /// Upper bound of the retry delay (seconds).
    pub max_backoff_secs: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            concurrency: 4,
            drift_interval_secs: 300,
            pass_timeout_secs: 60,
            initial_backoff_ms: 500,
            max_backoff_secs: 300,
        }
    }
}

impl ControllerSettings {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            concurrency: self.concurrency,
            pass_timeout: Duration::from_secs(self.pass_timeout_secs),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            drift_interval: Duration::from_secs(self.drift_interval_secs),
        }
    }
}

// =============================================================================
// Gateway Settings
// =============================================================================

/// HTTP settings of gateway clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub request_timeout_secs: u64,

    /// Verify the gateway's TLS certificate.
    pub tls_verify: bool,

    pub user_agent: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            request_timeout_secs: 30,
            tls_verify: true,
            user_agent: None,
        }
    }
}

impl GatewaySettings {
    pub fn client_options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            tls_verify: self.tls_verify,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

// =============================================================================
// Instance Conventions
// =============================================================================

/// How an instance pointer maps to a credential secret and a service address.
///
/// ```text
/// instanceRef { name: "prod", namespace: "ml" }
///     secret    ml/prod-secrets  key "masterkey"
///     endpoint  http://prod-service.ml.svc.cluster.local:4000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    pub secret_suffix: String,
    pub master_key_field: String,
    pub service_suffix: String,
    pub scheme: String,
    pub port: u16,
    pub cluster_domain: String,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        InstanceSettings {
            secret_suffix: "-secrets".to_string(),
            master_key_field: "masterkey".to_string(),
            service_suffix: "-service".to_string(),
            scheme: "http".to_string(),
            port: 4000,
            cluster_domain: "cluster.local".to_string(),
        }
    }
}

impl InstanceSettings {
    /// Name of the instance's credential secret.
    pub fn secret_name(&self, instance: &str) -> String {
        format!("{}{}", instance, self.secret_suffix)
    }

    /// In-cluster address of the instance's service.
    pub fn endpoint(&self, namespace: &str, instance: &str) -> String {
        format!(
            "{}://{}{}.{}.svc.{}:{}",
            self.scheme, instance, self.service_suffix, namespace, self.cluster_domain, self.port
        )
    }
}

// =============================================================================
// Watch, Server and Log Settings
// =============================================================================

/// Which records the operator watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Restrict watches to one namespace. `None` watches all namespaces.
    pub namespace: Option<String>,

    /// Kinds to reconcile, by kind name or plural.
    pub kinds: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        WatchSettings {
            namespace: None,
            kinds: RECONCILED_KINDS.iter().map(|k| k.kind.to_string()).collect(),
        }
    }
}

impl WatchSettings {
    /// Resolves the configured kind names.
    pub fn resolved_kinds(&self) -> ConfigResult<Vec<ResourceKind>> {
        let mut kinds = Vec::new();
        for name in &self.kinds {
            let kind = RECONCILED_KINDS
                .iter()
                .find(|k| k.kind.eq_ignore_ascii_case(name) || k.plural.eq_ignore_ascii_case(name))
                .ok_or_else(|| ConfigError::Invalid(format!("unknown kind '{}'", name)))?;
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        Ok(kinds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_address: "0.0.0.0".to_string(),
            health_port: 8081,
        }
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ConfigError::Invalid(format!(
                "unknown log format '{}'. Valid options: pretty, compact",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing-subscriber` env-filter directive. `RUST_LOG` wins if set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            filter: "info,litellm=debug".to_string(),
            format: LogFormat::default(),
        }
    }
}

// =============================================================================
// Main Operator Configuration
// =============================================================================

/// Complete operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub controller: ControllerSettings,
    pub gateway: GatewaySettings,
    pub instances: InstanceSettings,
    pub watch: WatchSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

impl OperatorConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, `LITELLM_OPERATOR_CONFIG`, or platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let explicit = config_path.or_else(|| env(&format!("{}CONFIG", ENV_PREFIX)).map(PathBuf::from));

        let mut config = match explicit {
            // An explicitly named file must exist.
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading operator config from file");
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ai", "litellm", "litellm-operator")
            .map(|dirs| dirs.config_dir().join("operator.toml"))
    }

    /// Applies `LITELLM_OPERATOR_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let full = format!("{}{}", ENV_PREFIX, name);
            lookup(&full).map(|value| (full, value))
        };

        if let Some((name, value)) = var("CONCURRENCY") {
            self.controller.concurrency = parse(&name, &value)?;
        }
        if let Some((name, value)) = var("DRIFT_INTERVAL_SECS") {
            self.controller.drift_interval_secs = parse(&name, &value)?;
        }
        if let Some((name, value)) = var("PASS_TIMEOUT_SECS") {
            self.controller.pass_timeout_secs = parse(&name, &value)?;
        }
        if let Some((name, value)) = var("REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs = parse(&name, &value)?;
        }
        if let Some((name, value)) = var("TLS_VERIFY") {
            self.gateway.tls_verify = parse(&name, &value)?;
        }
        if let Some((_, value)) = var("WATCH_NAMESPACE") {
            debug!(namespace = %value, "Overriding watch namespace from environment");
            self.watch.namespace = Some(value).filter(|v| !v.trim().is_empty());
        }
        if let Some((_, value)) = var("KINDS") {
            self.watch.kinds = value
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some((name, value)) = var("HEALTH_PORT") {
            self.server.health_port = parse(&name, &value)?;
        }
        if let Some((_, value)) = var("LOG_FILTER") {
            self.log.filter = value;
        }
        if let Some((_, value)) = var("LOG_FORMAT") {
            self.log.format = value.parse()?;
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.controller;
        if c.concurrency == 0 {
            return Err(ConfigError::Invalid("controller.concurrency must be greater than 0".into()));
        }
        if c.drift_interval_secs == 0 || c.pass_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "controller intervals must be greater than 0".into(),
            ));
        }
        if c.initial_backoff_ms == 0 || c.initial_backoff_ms > c.max_backoff_secs.saturating_mul(1000) {
            return Err(ConfigError::Invalid(format!(
                "controller.initial_backoff_ms ({}) must be in 1..=max_backoff_secs",
                c.initial_backoff_ms
            )));
        }
        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "gateway.request_timeout_secs must be greater than 0".into(),
            ));
        }

        let i = &self.instances;
        if i.secret_suffix.is_empty() || i.service_suffix.is_empty() || i.master_key_field.is_empty() {
            return Err(ConfigError::Invalid("instance suffixes and key names must not be empty".into()));
        }
        if !matches!(i.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "instances.scheme must be http or https, got: {}",
                i.scheme
            )));
        }

        if self.watch.resolved_kinds()?.is_empty() {
            return Err(ConfigError::Invalid("watch.kinds must name at least one kind".into()));
        }
        Ok(())
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: name.to_string(),
        value: value.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = OperatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.controller.concurrency, 4);
        assert_eq!(config.watch.resolved_kinds().unwrap().len(), 5);
    }

    #[test]
    fn test_partial_toml() {
        let config = OperatorConfig::from_toml_str(
            r#"
            [controller]
            concurrency = 8

            [watch]
            namespace = "ml"
            kinds = ["teams", "VirtualKey"]
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.concurrency, 8);
        assert_eq!(config.controller.drift_interval_secs, 300);
        assert_eq!(config.watch.namespace.as_deref(), Some("ml"));

        let kinds = config.watch.resolved_kinds().unwrap();
        assert_eq!(kinds, vec![litellm_core::types::TEAM, litellm_core::types::API_KEY]);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = OperatorConfig::default();
        config
            .apply_overrides(lookup(&[
                ("LITELLM_OPERATOR_CONCURRENCY", "16"),
                ("LITELLM_OPERATOR_TLS_VERIFY", "false"),
                ("LITELLM_OPERATOR_KINDS", "Team, Model"),
                ("LITELLM_OPERATOR_LOG_FORMAT", "pretty"),
            ]))
            .unwrap();

        assert_eq!(config.controller.concurrency, 16);
        assert!(!config.gateway.tls_verify);
        assert_eq!(config.watch.kinds, vec!["Team", "Model"]);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = OperatorConfig::default();
        let err = config
            .apply_overrides(lookup(&[("LITELLM_OPERATOR_CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "LITELLM_OPERATOR_CONCURRENCY"));
    }

    #[test]
    fn test_validation() {
        let mut config = OperatorConfig::default();
        config.controller.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = OperatorConfig::default();
        config.controller.initial_backoff_ms = 10_000;
        config.controller.max_backoff_secs = 5;
        assert!(config.validate().is_err());

        let mut config = OperatorConfig::default();
        config.watch.kinds = vec!["Gadget".to_string()];
        assert!(config.validate().is_err());

        let mut config = OperatorConfig::default();
        config.instances.secret_suffix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_instance_conventions() {
        let instances = InstanceSettings::default();
        assert_eq!(instances.secret_name("prod"), "prod-secrets");
        assert_eq!(
            instances.endpoint("ml", "prod"),
            "http://prod-service.ml.svc.cluster.local:4000"
        );
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&OperatorConfig::default()).unwrap();
        assert!(toml_str.contains("[controller]"));
        assert!(toml_str.contains("[instances]"));
    }
}
