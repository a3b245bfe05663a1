use std::{collections::HashMap, sync::Arc, time::Duration};

use fusion_composition::SubgraphConfiguration;
use hyper_util::{
    client::legacy::Client,
    rt::{TokioExecutor, TokioTimer},
};
use tracing::warn;

use crate::executors::{
    common::{SubgraphTransport, SubgraphTransportBoxedArc},
    error::TransportError,
    http::HttpSubgraphTransport,
};

/// Transport clients of one request, by subgraph name.
#[derive(Clone)]
pub struct SubgraphTransportMap {
    inner: HashMap<String, SubgraphTransportBoxedArc>,
}

impl Default for SubgraphTransportMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SubgraphTransportMap {
    pub fn new() -> Self {
        SubgraphTransportMap {
            inner: HashMap::new(),
        }
    }

    pub fn get(&self, subgraph_name: &str) -> Option<&SubgraphTransportBoxedArc> {
        self.inner.get(subgraph_name)
    }

    pub fn insert<T>(&mut self, subgraph_name: impl Into<String>, transport: T)
    where
        T: SubgraphTransport + Send + Sync + 'static,
    {
        self.insert_boxed_arc(subgraph_name.into(), transport.to_boxed_arc());
    }

    pub fn insert_boxed_arc(&mut self, subgraph_name: String, boxed_arc: SubgraphTransportBoxedArc) {
        self.inner.insert(subgraph_name, boxed_arc);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Builds HTTP transports sharing one connection pool. Subgraphs without an
    /// HTTP client configuration are skipped.
    pub fn from_subgraph_configurations(
        subgraphs: &[SubgraphConfiguration],
        subgraph_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder(TokioExecutor::new());
        let builder_mut = builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(60 * 60))
            .pool_max_idle_per_host(usize::MAX);
        let http_client = builder_mut.build_http();
        let http_client_arc = Arc::new(http_client);

        let mut map = SubgraphTransportMap::new();
        for subgraph in subgraphs {
            let Some(http) = subgraph.http_client() else {
                warn!(subgraph = %subgraph.name, "subgraph has no HTTP client configuration");
                continue;
            };
            let transport = HttpSubgraphTransport::new(
                &subgraph.name,
                &http.base_address,
                http_client_arc.clone(),
                subgraph_timeout,
            )?;
            map.insert(subgraph.name.clone(), transport);
        }

        Ok(map)
    }
}
