//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! The mirror structs here deserialize with serde and are converted into the
//! programmatic [`ClientConfig`](crate::config::ClientConfig) through the
//! builder API, so file and code configuration share one validation path.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `ClientConfig::from_yaml("udf.yaml")`
//! - **TOML** (requires `config-file` feature): `ClientConfig::from_toml("udf.toml")`
//! - **Environment Variables** (always available): `ClientConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! network:
//!   addresses:
//!     - "10.0.0.1:3000"
//!     - "10.0.0.2"
//!   connect-timeout-ms: 500
//!   max-idle-per-node: 2
//!   idle-timeout-ms: 30000
//!   load-balancer: random
//! registry:
//!   chunk-size: 262144
//!   hash-algorithm: sha1
//! policy:
//!   timeout-ms: 2000
//!   max-retries: 3
//!   initial-backoff-ms: 50
//!   max-backoff-ms: 1000
//!   multiplier: 2.0
//!   jitter: 0.1
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use udf_registry_core::HashAlgorithm;

use crate::config::{
    CallPolicyBuilder, ClientConfig, ClientConfigBuilder, ConfigError, LoadBalancerKind,
};

/// Port assumed for addresses given without one.
const DEFAULT_PORT: u16 = 3000;

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Network configuration.
    pub network: Option<FileNetworkConfig>,
    /// Registry configuration.
    pub registry: Option<FileRegistryConfig>,
    /// Default call policy.
    pub policy: Option<FilePolicyConfig>,
}

/// File-based network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileNetworkConfig {
    /// Seed node addresses, `host:port` or bare IP.
    pub addresses: Option<Vec<String>>,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Idle connections kept per node.
    pub max_idle_per_node: Option<usize>,
    /// How long a pooled connection may stay unused, in milliseconds.
    pub idle_timeout_ms: Option<u64>,
    /// `"round-robin"` or `"random"`.
    pub load_balancer: Option<String>,
}

/// File-based registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileRegistryConfig {
    /// Maximum chunk payload in bytes.
    pub chunk_size: Option<usize>,
    /// `"sha1"` or `"sha256"`.
    pub hash_algorithm: Option<String>,
}

/// File-based call policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilePolicyConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: Option<u64>,
    /// Maximum backoff duration in milliseconds.
    pub max_backoff_ms: Option<u64>,
    /// Backoff multiplier.
    pub multiplier: Option<f64>,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: Option<f64>,
}

fn parse_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    value
        .parse::<SocketAddr>()
        .or_else(|_| format!("{value}:{DEFAULT_PORT}").parse::<SocketAddr>())
        .map_err(|_| ConfigError::new(format!("invalid node address '{value}'")))
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ClientConfigBuilder::new();

        if let Some(net) = file.network {
            let addresses = net
                .addresses
                .unwrap_or_default()
                .iter()
                .map(|a| parse_address(a))
                .collect::<Result<Vec<_>, _>>()?;
            let load_balancer = net
                .load_balancer
                .map(|s| s.parse::<LoadBalancerKind>())
                .transpose()?;

            builder = builder.network(|mut n| {
                n = n.addresses(addresses);
                if let Some(ms) = net.connect_timeout_ms {
                    n = n.connect_timeout(Duration::from_millis(ms));
                }
                if let Some(max_idle) = net.max_idle_per_node {
                    n = n.max_idle_per_node(max_idle);
                }
                if let Some(ms) = net.idle_timeout_ms {
                    n = n.idle_timeout(Duration::from_millis(ms));
                }
                if let Some(kind) = load_balancer {
                    n = n.load_balancer(kind);
                }
                n
            });
        }

        let mut policy = CallPolicyBuilder::new();
        if let Some(p) = file.policy {
            if let Some(ms) = p.timeout_ms {
                policy = policy.timeout(Duration::from_millis(ms));
            }
            if let Some(n) = p.max_retries {
                policy = policy.max_retries(n);
            }
            if let Some(ms) = p.initial_backoff_ms {
                policy = policy.initial_backoff(Duration::from_millis(ms));
            }
            if let Some(ms) = p.max_backoff_ms {
                policy = policy.max_backoff(Duration::from_millis(ms));
            }
            if let Some(m) = p.multiplier {
                policy = policy.multiplier(m);
            }
            if let Some(j) = p.jitter {
                policy = policy.jitter(j);
            }
        }
        let policy = policy.build()?;

        let registry = file.registry.unwrap_or_default();
        let hash_algorithm = registry
            .hash_algorithm
            .map(|s| {
                s.parse::<HashAlgorithm>().map_err(|_| {
                    ConfigError::new(format!(
                        "unknown hash algorithm '{s}' (expected sha1 or sha256)"
                    ))
                })
            })
            .transpose()?;

        builder = builder.registry(|mut r| {
            r = r.default_policy(policy);
            if let Some(size) = registry.chunk_size {
                r = r.chunk_size(size);
            }
            if let Some(algorithm) = hash_algorithm {
                r = r.hash_algorithm(algorithm);
            }
            r
        });

        builder.build()
    }
}

impl ClientConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        let file_config: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse YAML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        let file_config: FileConfig = toml_crate::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse TOML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `UDF_ADDRESSES` | Comma-separated seed addresses |
    /// | `UDF_CONNECT_TIMEOUT_MS` | Connection timeout in milliseconds |
    /// | `UDF_IDLE_TIMEOUT_MS` | Pooled connection idle timeout in milliseconds |
    /// | `UDF_TIMEOUT_MS` | Default per-attempt timeout in milliseconds |
    /// | `UDF_MAX_RETRIES` | Default retry count |
    /// | `UDF_CHUNK_SIZE` | Chunk size in bytes |
    /// | `UDF_HASH_ALGORITHM` | `sha1` or `sha256` |
    ///
    /// Numeric variables that do not parse are rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn number<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::new(format!("{key} is not a valid number: '{value}'")))
        }

        let mut file_config = FileConfig::default();

        if let Some(val) = lookup("UDF_ADDRESSES") {
            file_config.network.get_or_insert_with(Default::default).addresses = Some(
                val.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }

        if let Some(val) = lookup("UDF_CONNECT_TIMEOUT_MS") {
            file_config
                .network
                .get_or_insert_with(Default::default)
                .connect_timeout_ms = Some(number("UDF_CONNECT_TIMEOUT_MS", val)?);
        }

        if let Some(val) = lookup("UDF_IDLE_TIMEOUT_MS") {
            file_config
                .network
                .get_or_insert_with(Default::default)
                .idle_timeout_ms = Some(number("UDF_IDLE_TIMEOUT_MS", val)?);
        }

        if let Some(val) = lookup("UDF_TIMEOUT_MS") {
            file_config.policy.get_or_insert_with(Default::default).timeout_ms =
                Some(number("UDF_TIMEOUT_MS", val)?);
        }

        if let Some(val) = lookup("UDF_MAX_RETRIES") {
            file_config.policy.get_or_insert_with(Default::default).max_retries =
                Some(number("UDF_MAX_RETRIES", val)?);
        }

        if let Some(val) = lookup("UDF_CHUNK_SIZE") {
            file_config.registry.get_or_insert_with(Default::default).chunk_size =
                Some(number("UDF_CHUNK_SIZE", val)?);
        }

        if let Some(val) = lookup("UDF_HASH_ALGORITHM") {
            file_config
                .registry
                .get_or_insert_with(Default::default)
                .hash_algorithm = Some(val);
        }

        file_config.try_into()
    }
}

/// Loads a configuration file, detecting the format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ClientConfig::from_yaml(path),
        Some("toml") => ClientConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}
