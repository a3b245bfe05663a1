pub mod context;
pub mod execution;
pub mod executors;
pub mod projection;
pub mod response;

#[cfg(test)]
mod tests;

pub use execution::plan::{execute_query_plan, ExecutionOptions};
pub use executors::common::{SubgraphRequest, SubgraphResponse, SubgraphTransport};
pub use executors::error::TransportError;
pub use executors::http::HttpSubgraphTransport;
pub use executors::map::SubgraphTransportMap;
pub use response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};
pub use response::graphql_response::GraphQLResponse;
