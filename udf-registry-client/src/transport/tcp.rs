//! TCP node transport with a small per-node idle connection pool.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::instrument;
use udf_registry_core::{Result, UdfError};

use super::connection::InfoConnection;
use super::load_balancer::LoadBalancer;
use super::NodeTransport;
use crate::config::{NetworkConfig, NodeSelection};

/// Sends info commands over TCP to the seed nodes of a [`NetworkConfig`].
///
/// Connections are reused across commands. A connection is returned to the
/// pool only after a complete exchange; one that failed or whose exchange
/// was cancelled is dropped. A pooled connection unused for longer than the
/// configured idle timeout is closed rather than reused, since the node may
/// already have reaped its end.
#[derive(Debug)]
pub struct TcpNodeTransport {
    addresses: Vec<SocketAddr>,
    load_balancer: Arc<dyn LoadBalancer>,
    connect_timeout: Duration,
    max_idle_per_node: usize,
    idle_timeout: Duration,
    idle: Mutex<HashMap<SocketAddr, Vec<InfoConnection>>>,
}

impl TcpNodeTransport {
    /// Creates a transport using the configured load balancer.
    pub fn new(config: &NetworkConfig) -> Self {
        Self::with_load_balancer(config, config.load_balancer().build())
    }

    /// Creates a transport with a custom load balancer.
    pub fn with_load_balancer(config: &NetworkConfig, load_balancer: Arc<dyn LoadBalancer>) -> Self {
        Self {
            addresses: config.addresses().to_vec(),
            load_balancer,
            connect_timeout: config.connect_timeout(),
            max_idle_per_node: config.max_idle_per_node(),
            idle_timeout: config.idle_timeout(),
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the seed node addresses.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Returns the number of pooled idle connections to `address`.
    pub async fn idle_connections(&self, address: SocketAddr) -> usize {
        self.idle.lock().await.get(&address).map_or(0, Vec::len)
    }

    /// Drops all pooled connections.
    pub async fn close(&self) {
        let drained: usize = self.idle.lock().await.drain().map(|(_, c)| c.len()).sum();
        tracing::debug!(connections = drained, "closed idle info connections");
    }

    /// Closes pooled connections that exceeded the idle timeout and returns
    /// how many were closed.
    pub async fn evict_idle(&self) -> usize {
        let mut idle = self.idle.lock().await;
        let mut evicted = 0;
        for pooled in idle.values_mut() {
            let before = pooled.len();
            pooled.retain(|c| c.last_used_at().elapsed() <= self.idle_timeout);
            evicted += before - pooled.len();
        }
        idle.retain(|_, pooled| !pooled.is_empty());
        if evicted > 0 {
            tracing::debug!(connections = evicted, "evicted stale info connections");
        }
        evicted
    }

    fn resolve(&self, target: &NodeSelection) -> Result<SocketAddr> {
        match target {
            NodeSelection::Address(address) => Ok(*address),
            NodeSelection::Any => self
                .load_balancer
                .select(&self.addresses)
                .copied()
                .ok_or_else(|| UdfError::Transport("no node addresses configured".to_string())),
        }
    }

    async fn checkout(&self, address: SocketAddr) -> Result<InfoConnection> {
        {
            let mut idle = self.idle.lock().await;
            if let Some(pooled) = idle.get_mut(&address) {
                while let Some(connection) = pooled.pop() {
                    if connection.last_used_at().elapsed() <= self.idle_timeout {
                        return Ok(connection);
                    }
                    tracing::trace!(id = %connection.id(), "closing stale info connection");
                }
            }
        }
        InfoConnection::connect(address, self.connect_timeout).await
    }

    async fn checkin(&self, connection: InfoConnection) {
        let mut idle = self.idle.lock().await;
        let pooled = idle.entry(connection.address()).or_default();
        if pooled.len() < self.max_idle_per_node {
            pooled.push(connection);
        }
    }
}

#[async_trait]
impl NodeTransport for TcpNodeTransport {
    #[instrument(name = "transport.send", skip(self, command), fields(command = %command_name(command)))]
    async fn send(&self, target: &NodeSelection, command: &str) -> Result<String> {
        let address = self.resolve(target)?;
        let mut connection = self.checkout(address).await?;

        match connection.request(command).await {
            Ok(response) => {
                tracing::trace!(
                    address = %address,
                    id = %connection.id(),
                    bytes = response.len(),
                    "received info response"
                );
                self.checkin(connection).await;
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "dropping failed info connection");
                Err(e)
            }
        }
    }
}

fn command_name(command: &str) -> &str {
    command
        .split(|c: char| c == ':' || c == '\n')
        .next()
        .unwrap_or(command)
}
