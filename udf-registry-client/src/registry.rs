//! The UDF registry client.

use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::Bytes;
use tracing::instrument;
use udf_registry_core::protocol::{
    expect_ok, get_command, list_command, parse_get_response, put_command, remove_command,
};
use udf_registry_core::transfer::upload_plan;
use udf_registry_core::{
    hashes_match, validate_name, Reassembler, Result, UdfDescriptor, UdfError, UdfListing,
    UdfModule, UdfType,
};

use crate::config::{CallPolicy, ClientConfig, RegistryConfig};
use crate::policy::PolicyExecutor;
use crate::transport::{NodeTransport, TcpNodeTransport};

/// Lists, fetches, uploads and removes UDF modules through a [`NodeTransport`].
///
/// The registry holds no state besides its configuration and a shared
/// transport handle. Clones share the transport, and calls on any clone are
/// independent of each other.
///
/// Every operation accepts an optional [`CallPolicy`]; `None` selects the
/// default policy of the [`RegistryConfig`].
///
/// # Example
///
/// ```ignore
/// let registry = UdfRegistry::connect(&ClientConfig::default());
/// let hash = registry.put(None, "counter.lua", UdfType::Lua, source).await?;
/// let module = registry.get(None, "counter.lua", UdfType::Lua).await?;
/// assert_eq!(module.hash(), hash);
/// ```
#[derive(Debug)]
pub struct UdfRegistry<T: NodeTransport> {
    transport: Arc<T>,
    config: Arc<RegistryConfig>,
}

impl<T: NodeTransport> Clone for UdfRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl UdfRegistry<TcpNodeTransport> {
    /// Creates a registry talking TCP to the configured seed nodes.
    ///
    /// Connections are opened lazily by the first command.
    pub fn connect(config: &ClientConfig) -> Self {
        Self::new(
            TcpNodeTransport::new(config.network()),
            config.registry().clone(),
        )
    }
}

impl<T: NodeTransport> UdfRegistry<T> {
    /// Creates a registry over `transport`.
    pub fn new(transport: T, config: RegistryConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Creates a registry over a transport shared with other users.
    pub fn with_shared_transport(transport: Arc<T>, config: RegistryConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn policy<'a>(&'a self, policy: Option<&'a CallPolicy>) -> &'a CallPolicy {
        policy.unwrap_or_else(|| self.config.default_policy())
    }

    /// Returns all registered modules in the order the node reported them.
    #[instrument(name = "registry.list", skip_all)]
    pub async fn list(&self, policy: Option<&CallPolicy>) -> Result<Vec<UdfDescriptor>> {
        let descriptors = self.listing(policy).await?.collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = descriptors.len(), "listed UDF modules");
        Ok(descriptors)
    }

    /// Fetches the module enumeration and returns a lazy iterator over it.
    ///
    /// Records are parsed as the iterator is advanced. A malformed record is
    /// yielded as an error, after which the iterator ends.
    #[instrument(name = "registry.listing", skip_all)]
    pub async fn listing(&self, policy: Option<&CallPolicy>) -> Result<UdfListing> {
        let body =
            PolicyExecutor::execute(&*self.transport, self.policy(policy), &list_command()).await?;
        Ok(UdfListing::new(body))
    }

    /// Calls `visit` once per registered module, in order, until it breaks.
    ///
    /// Returns the number of times `visit` was called. No record after the
    /// one that broke the loop is parsed.
    #[instrument(name = "registry.foreach", skip_all)]
    pub async fn foreach<F>(&self, policy: Option<&CallPolicy>, mut visit: F) -> Result<usize>
    where
        F: FnMut(&UdfDescriptor) -> ControlFlow<()>,
    {
        let mut visited = 0;
        for descriptor in self.listing(policy).await? {
            let descriptor = descriptor?;
            visited += 1;
            if visit(&descriptor).is_break() {
                tracing::debug!(visited, "enumeration stopped by visitor");
                return Ok(visited);
            }
        }
        tracing::debug!(visited, "enumeration complete");
        Ok(visited)
    }

    /// Fetches a module, reassembling it from as many chunks as needed.
    ///
    /// # Errors
    ///
    /// - `Argument` if `name` is invalid, before any network activity
    /// - `NotFound` if the node has no such module
    /// - `HashMismatch` if the content does not match the reported hash, or
    ///   the hash changed between chunks
    /// - `TransferIntegrity` if the chunk sequence is inconsistent or a chunk
    ///   is larger than the configured chunk size
    #[instrument(
        name = "registry.get",
        skip_all,
        fields(name = %name, udf_type = %udf_type)
    )]
    pub async fn get(
        &self,
        policy: Option<&CallPolicy>,
        name: &str,
        udf_type: UdfType,
    ) -> Result<UdfModule> {
        validate_name(name)?;
        let policy = self.policy(policy);
        let mut reassembler = Reassembler::with_max_chunk(self.config.chunk_size());
        let mut reported: Option<UdfDescriptor> = None;

        loop {
            let offset = reassembler.next_offset();
            let command = get_command(name, udf_type, offset, self.config.chunk_size());
            let value = PolicyExecutor::execute(&*self.transport, policy, &command).await?;
            let (descriptor, chunk) = parse_get_response(&value)?.into_parts();

            if !descriptor.is(name, udf_type) {
                return Err(UdfError::TransferIntegrity(format!(
                    "requested {} ({}) but node answered for {} ({})",
                    name,
                    udf_type,
                    descriptor.name(),
                    descriptor.udf_type()
                )));
            }

            if let Some(first) = &reported {
                if !hashes_match(first.hash(), descriptor.hash()) {
                    return Err(UdfError::HashMismatch {
                        expected: first.hash().to_string(),
                        actual: descriptor.hash().to_string(),
                    });
                }
                if first.size() != descriptor.size() {
                    return Err(UdfError::TransferIntegrity(format!(
                        "module size changed from {} to {} during transfer",
                        first.size(),
                        descriptor.size()
                    )));
                }
            } else {
                reported = Some(descriptor);
            }

            reassembler.push(&chunk)?;
            tracing::trace!(
                offset = chunk.offset(),
                received = reassembler.next_offset(),
                total = chunk.total_size(),
                "received chunk"
            );

            if reassembler.is_complete() {
                break;
            }
        }

        let chunks = reassembler.chunk_count();
        let content = reassembler.finish()?;
        let expected = match reported {
            Some(descriptor) => descriptor.hash().to_string(),
            None => return Err(UdfError::TransferIntegrity("no chunks received".to_string())),
        };
        let actual = self.config.hash_algorithm().fingerprint(&content);
        if !hashes_match(&expected, &actual) {
            return Err(UdfError::HashMismatch { expected, actual });
        }

        tracing::debug!(size = content.len(), chunks, "fetched UDF module");
        let size = content.len() as u64;
        Ok(UdfModule::new(
            UdfDescriptor::new(name, udf_type, actual, size),
            content,
        ))
    }

    /// Uploads a module and returns its locally computed hash.
    ///
    /// The call returns once the contacted node acknowledged every chunk; it
    /// does not wait for the module to reach the rest of the cluster.
    ///
    /// # Errors
    ///
    /// - `Argument` if `name` is invalid, before any network activity
    /// - `Server` if the node rejects the module (for example a compile error)
    #[instrument(
        name = "registry.put",
        skip_all,
        fields(name = %name, udf_type = %udf_type)
    )]
    pub async fn put(
        &self,
        policy: Option<&CallPolicy>,
        name: &str,
        udf_type: UdfType,
        content: impl Into<Bytes>,
    ) -> Result<String> {
        validate_name(name)?;
        let policy = self.policy(policy);
        let content: Bytes = content.into();
        let hash = self.config.hash_algorithm().fingerprint(&content);
        let plan = upload_plan(&content, self.config.chunk_size())?;

        for chunk in &plan {
            let command = put_command(name, udf_type, &hash, chunk);
            let value = PolicyExecutor::execute(&*self.transport, policy, &command).await?;
            expect_ok(&value)?;
            tracing::trace!(
                offset = chunk.offset(),
                len = chunk.len(),
                total = chunk.total_size(),
                "uploaded chunk"
            );
        }

        tracing::debug!(size = content.len(), chunks = plan.len(), hash = %hash, "registered UDF module");
        Ok(hash)
    }

    /// Removes a module from the contacted node.
    ///
    /// # Errors
    ///
    /// - `Argument` if `name` is invalid, before any network activity
    /// - `NotFound` if the node has no such module
    #[instrument(
        name = "registry.remove",
        skip_all,
        fields(name = %name, udf_type = %udf_type)
    )]
    pub async fn remove(
        &self,
        policy: Option<&CallPolicy>,
        name: &str,
        udf_type: UdfType,
    ) -> Result<()> {
        validate_name(name)?;
        let command = remove_command(name, udf_type);
        let value = PolicyExecutor::execute(&*self.transport, self.policy(policy), &command).await?;
        expect_ok(&value)?;
        tracing::debug!("removed UDF module");
        Ok(())
    }
}
