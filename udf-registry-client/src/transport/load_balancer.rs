//! Spreading `NodeSelection::Any` commands over the seed nodes.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::LoadBalancerKind;

/// Chooses which seed node receives the next untargeted command.
///
/// Implementors only pick a position; [`LoadBalancer::select`] maps it onto
/// the address list.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Position of the next node among `node_count` nodes, `None` when there
    /// are none.
    fn next_index(&self, node_count: usize) -> Option<usize>;

    fn select<'a>(&self, addresses: &'a [SocketAddr]) -> Option<&'a SocketAddr> {
        self.next_index(addresses.len())
            .and_then(|index| addresses.get(index))
    }
}

/// Visits the seed nodes in configuration order.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    issued: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn next_index(&self, node_count: usize) -> Option<usize> {
        (node_count > 0).then(|| self.issued.fetch_add(1, Ordering::Relaxed) % node_count)
    }
}

/// Picks a seed node uniformly at random for every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLoadBalancer;

impl LoadBalancer for RandomLoadBalancer {
    fn next_index(&self, node_count: usize) -> Option<usize> {
        (node_count > 0).then(|| rand::thread_rng().gen_range(0..node_count))
    }
}

impl LoadBalancerKind {
    /// Builds the strategy this kind names.
    pub fn build(self) -> Arc<dyn LoadBalancer> {
        match self {
            LoadBalancerKind::RoundRobin => Arc::new(RoundRobinLoadBalancer::new()),
            LoadBalancerKind::Random => Arc::new(RandomLoadBalancer),
        }
    }
}
