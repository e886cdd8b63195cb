//! Async client for the UDF module registry of a database cluster.
//!
//! [`UdfRegistry`] enumerates, fetches, uploads and removes user-defined
//! function modules over the cluster's administrative info channel. Module
//! content of any size is moved in fingerprinted chunks and verified on
//! arrival; every call runs under a [`CallPolicy`] that bounds its time and
//! retries.
//!
//! ```ignore
//! use std::ops::ControlFlow;
//! use udf_registry_client::{ClientConfig, UdfRegistry, UdfType};
//!
//! let registry = UdfRegistry::connect(&ClientConfig::from_env()?);
//! registry.put(None, "counter.lua", UdfType::Lua, source).await?;
//! registry
//!     .foreach(None, |udf| {
//!         println!("{} {}", udf.name(), udf.hash());
//!         ControlFlow::Continue(())
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod policy;
pub mod registry;
pub mod transport;

pub use config::{
    CallPolicy, CallPolicyBuilder, ClientConfig, ClientConfigBuilder, ConfigError,
    LoadBalancerKind, NetworkConfig, NetworkConfigBuilder, NodeSelection, RegistryConfig,
    RegistryConfigBuilder,
};
pub use config_file::FileConfig;
#[cfg(feature = "config-file")]
pub use config_file::load_config;
pub use policy::PolicyExecutor;
pub use registry::UdfRegistry;
pub use transport::{InfoConnection, NodeTransport, TcpNodeTransport};

pub use udf_registry_core::{
    HashAlgorithm, Result, UdfDescriptor, UdfError, UdfListing, UdfModule, UdfType,
};
