use std::sync::Arc;

use async_trait::async_trait;
use fusion_query_planner::ast::operation::OperationKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::executors::error::TransportError;
use crate::response::graphql_error::GraphQLError;

/// Sends one GraphQL request to one subgraph.
///
/// Dropping the returned future aborts the call.
#[async_trait]
pub trait SubgraphTransport {
    async fn send<'a>(
        &self,
        request: SubgraphRequest<'a>,
    ) -> Result<SubgraphResponse, TransportError>;

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn SubgraphTransport + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type SubgraphTransportType = dyn SubgraphTransport + Send + Sync;

pub type SubgraphTransportBoxedArc = Arc<Box<SubgraphTransportType>>;

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphRequest<'a> {
    #[serde(skip)]
    pub subgraph: &'a str,
    #[serde(skip)]
    pub operation_kind: OperationKind,
    pub query: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubgraphResponse {
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl SubgraphResponse {
    pub fn with_data(data: JsonValue) -> Self {
        SubgraphResponse {
            data: Some(data),
            errors: None,
        }
    }
}
