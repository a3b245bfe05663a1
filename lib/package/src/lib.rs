mod archive;
mod error;
mod fusion_package;
mod subgraph_package;
mod transport_config;

pub use error::PackageError;
pub use fusion_package::{FusionGraphPackage, PackageAccess, PACKAGE_FORMAT_VERSION};
pub use subgraph_package::{
    read_subgraph_package, write_subgraph_configuration, write_subgraph_package, SubgraphFiles,
};
pub use transport_config::TransportConfig;

#[cfg(test)]
mod tests;
