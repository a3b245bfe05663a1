mod compose;
mod error;
mod ingest;
mod subgraph;

pub mod fusion_graph;

pub use compose::compose;
pub use error::{CompositionError, CompositionErrors};
pub use fusion_graph::FusionGraph;
pub use subgraph::{
    ClientConfiguration, HttpClientConfiguration, SubgraphConfiguration,
    WebSocketClientConfiguration,
};

#[cfg(test)]
mod tests;
