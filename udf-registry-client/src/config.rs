//! Client configuration types and builders.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use udf_registry_core::transfer::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use udf_registry_core::{HashAlgorithm, UdfError};

/// Default seed address of a local node.
const DEFAULT_ADDRESS: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
/// Default per-attempt timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default maximum retry attempts after the first one.
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default initial retry backoff.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
/// Default maximum retry backoff.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);
/// Default retry multiplier.
const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
/// Default jitter factor.
const DEFAULT_JITTER: f64 = 0.1;
/// Default number of idle connections kept per node.
const DEFAULT_MAX_IDLE_PER_NODE: usize = 4;
/// Default time a pooled connection may sit unused before it is closed.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(55);

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for UdfError {
    fn from(err: ConfigError) -> Self {
        UdfError::Configuration(err.message)
    }
}

/// Which node a command is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeSelection {
    /// Any reachable node, chosen by the transport's load balancer.
    #[default]
    Any,
    /// A specific node.
    Address(SocketAddr),
}

/// Timeout and retry behavior of one registry call.
///
/// A call that is not given a policy uses the registry's default policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: f64,
    node: NodeSelection,
}

impl CallPolicy {
    /// Creates a new policy builder.
    pub fn builder() -> CallPolicyBuilder {
        CallPolicyBuilder::new()
    }

    /// Returns the timeout applied to each attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the number of retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the initial backoff duration.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Returns the maximum backoff duration.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Returns the backoff multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Returns the jitter factor.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns the node selection.
    pub fn node(&self) -> NodeSelection {
        self.node
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            node: NodeSelection::Any,
        }
    }
}

impl From<CallPolicy> for CallPolicyBuilder {
    fn from(policy: CallPolicy) -> Self {
        Self {
            timeout: Some(policy.timeout),
            max_retries: Some(policy.max_retries),
            initial_backoff: Some(policy.initial_backoff),
            max_backoff: Some(policy.max_backoff),
            multiplier: Some(policy.multiplier),
            jitter: Some(policy.jitter),
            node: Some(policy.node),
        }
    }
}

/// Builder for `CallPolicy`.
#[derive(Debug, Clone, Default)]
pub struct CallPolicyBuilder {
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
    node: Option<NodeSelection>,
}

impl CallPolicyBuilder {
    /// Creates a new policy builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout applied to each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries allowed after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the initial backoff duration.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Sets the jitter factor (0.0 to 1.0).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Targets a specific node.
    pub fn node(mut self, address: SocketAddr) -> Self {
        self.node = Some(NodeSelection::Address(address));
        self
    }

    /// Lets the transport pick any node.
    pub fn any_node(mut self) -> Self {
        self.node = Some(NodeSelection::Any);
        self
    }

    /// Builds the policy, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `timeout` is zero
    /// - `initial_backoff` exceeds `max_backoff`
    /// - `multiplier` is less than 1.0
    /// - `jitter` is outside `[0.0, 1.0]`
    pub fn build(self) -> Result<CallPolicy, ConfigError> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let initial_backoff = self.initial_backoff.unwrap_or(DEFAULT_INITIAL_BACKOFF);
        let max_backoff = self.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF);
        let multiplier = self.multiplier.unwrap_or(DEFAULT_RETRY_MULTIPLIER);
        let jitter = self.jitter.unwrap_or(DEFAULT_JITTER);

        if timeout.is_zero() {
            return Err(ConfigError::new("timeout must be greater than zero"));
        }

        if initial_backoff > max_backoff {
            return Err(ConfigError::new(
                "initial_backoff must not exceed max_backoff",
            ));
        }

        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigError::new("multiplier must be at least 1.0"));
        }

        if !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigError::new("jitter must be between 0.0 and 1.0"));
        }

        Ok(CallPolicy {
            timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            multiplier,
            jitter,
            node: self.node.unwrap_or_default(),
        })
    }
}

/// Strategy used to pick a node for [`NodeSelection::Any`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancerKind {
    /// Cycle through the seed addresses.
    #[default]
    RoundRobin,
    /// Pick a seed address at random.
    Random,
}

impl FromStr for LoadBalancerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "round-robin" | "roundrobin" => Ok(LoadBalancerKind::RoundRobin),
            "random" => Ok(LoadBalancerKind::Random),
            other => Err(ConfigError::new(format!(
                "unknown load balancer '{}' (expected round-robin or random)",
                other
            ))),
        }
    }
}

/// Network configuration for node connections.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    addresses: Vec<SocketAddr>,
    connect_timeout: Duration,
    max_idle_per_node: usize,
    idle_timeout: Duration,
    load_balancer: LoadBalancerKind,
}

impl NetworkConfig {
    /// Creates a new network configuration builder.
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder::new()
    }

    /// Returns the seed node addresses.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Returns the connection timeout duration.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns how many idle connections are kept per node.
    pub fn max_idle_per_node(&self) -> usize {
        self.max_idle_per_node
    }

    /// Returns how long a pooled connection may stay unused.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the load balancing strategy.
    pub fn load_balancer(&self) -> LoadBalancerKind {
        self.load_balancer
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            addresses: vec![SocketAddr::from(DEFAULT_ADDRESS)],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_idle_per_node: DEFAULT_MAX_IDLE_PER_NODE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            load_balancer: LoadBalancerKind::default(),
        }
    }
}

/// Builder for `NetworkConfig`.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigBuilder {
    addresses: Vec<SocketAddr>,
    connect_timeout: Option<Duration>,
    max_idle_per_node: Option<usize>,
    idle_timeout: Option<Duration>,
    load_balancer: Option<LoadBalancerKind>,
}

impl NetworkConfigBuilder {
    /// Creates a new network configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a seed node address.
    pub fn add_address(mut self, address: SocketAddr) -> Self {
        self.addresses.push(address);
        self
    }

    /// Sets the seed node addresses, replacing any previously configured.
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    /// Sets the connection timeout duration.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets how many idle connections are kept per node.
    pub fn max_idle_per_node(mut self, max_idle: usize) -> Self {
        self.max_idle_per_node = Some(max_idle);
        self
    }

    /// Sets how long a pooled connection may stay unused before it is closed
    /// instead of reused.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Sets the load balancing strategy.
    pub fn load_balancer(mut self, kind: LoadBalancerKind) -> Self {
        self.load_balancer = Some(kind);
        self
    }

    /// Builds the network configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `connect_timeout` or `idle_timeout` is zero.
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        let addresses = if self.addresses.is_empty() {
            vec![SocketAddr::from(DEFAULT_ADDRESS)]
        } else {
            self.addresses
        };

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(ConfigError::new("connect_timeout must be greater than zero"));
        }

        let idle_timeout = self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        if idle_timeout.is_zero() {
            return Err(ConfigError::new("idle_timeout must be greater than zero"));
        }

        Ok(NetworkConfig {
            addresses,
            connect_timeout,
            max_idle_per_node: self.max_idle_per_node.unwrap_or(DEFAULT_MAX_IDLE_PER_NODE),
            idle_timeout,
            load_balancer: self.load_balancer.unwrap_or_default(),
        })
    }
}

/// Registry behavior shared by all calls.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    chunk_size: usize,
    hash_algorithm: HashAlgorithm,
    default_policy: CallPolicy,
}

impl RegistryConfig {
    /// Creates a new registry configuration builder.
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }

    /// Returns the maximum payload of one transfer chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the content fingerprint algorithm.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Returns the policy used by calls that do not supply one.
    pub fn default_policy(&self) -> &CallPolicy {
        &self.default_policy
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash_algorithm: HashAlgorithm::default(),
            default_policy: CallPolicy::default(),
        }
    }
}

/// Builder for `RegistryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfigBuilder {
    chunk_size: Option<usize>,
    hash_algorithm: Option<HashAlgorithm>,
    default_policy: Option<CallPolicy>,
}

impl RegistryConfigBuilder {
    /// Creates a new registry configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum payload of one transfer chunk.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets the content fingerprint algorithm.
    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(algorithm);
        self
    }

    /// Sets the policy used by calls that do not supply one.
    pub fn default_policy(mut self, policy: CallPolicy) -> Self {
        self.default_policy = Some(policy);
        self
    }

    /// Builds the registry configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `chunk_size` is zero or exceeds
    /// [`MAX_CHUNK_SIZE`].
    pub fn build(self) -> Result<RegistryConfig, ConfigError> {
        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::new(format!(
                "chunk_size must be between 1 and {} bytes",
                MAX_CHUNK_SIZE
            )));
        }

        Ok(RegistryConfig {
            chunk_size,
            hash_algorithm: self.hash_algorithm.unwrap_or_default(),
            default_policy: self.default_policy.unwrap_or_default(),
        })
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    network: NetworkConfig,
    registry: RegistryConfig,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Returns the registry configuration.
    pub fn registry(&self) -> &RegistryConfig {
        &self.registry
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    network: NetworkConfigBuilder,
    registry: RegistryConfigBuilder,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures network settings using a builder function.
    pub fn network<F>(mut self, f: F) -> Self
    where
        F: FnOnce(NetworkConfigBuilder) -> NetworkConfigBuilder,
    {
        self.network = f(self.network);
        self
    }

    /// Configures registry settings using a builder function.
    pub fn registry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RegistryConfigBuilder) -> RegistryConfigBuilder,
    {
        self.registry = f(self.registry);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            network: self.network.build()?,
            registry: self.registry.build()?,
        })
    }
}
