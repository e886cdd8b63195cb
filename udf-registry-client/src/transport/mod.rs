//! Delivery of info commands to cluster nodes.

mod connection;
mod load_balancer;
mod tcp;

pub use connection::{ConnectionId, InfoConnection};
pub use load_balancer::{LoadBalancer, RandomLoadBalancer, RoundRobinLoadBalancer};
pub use tcp::TcpNodeTransport;

use std::sync::Arc;

use async_trait::async_trait;
use udf_registry_core::Result;

use crate::config::NodeSelection;

/// Sends one info command to one node and returns its raw response text.
///
/// Implementations do not interpret the response; failure reports embedded
/// in the text are left to the caller. Transport-level failures are
/// reported as `UdfError::Transport` (or `Io`) so they can be retried.
#[async_trait]
pub trait NodeTransport: Send + Sync + std::fmt::Debug {
    /// Sends `command` to the node chosen by `target`.
    async fn send(&self, target: &NodeSelection, command: &str) -> Result<String>;
}

#[async_trait]
impl<T: NodeTransport + ?Sized> NodeTransport for Arc<T> {
    async fn send(&self, target: &NodeSelection, command: &str) -> Result<String> {
        (**self).send(target, command).await
    }
}
