use fusion_query_planner::planner::plan_nodes::{PathSegment, PlanNode, PlanNodeKind};
use serde_json::{Map, Value as JsonValue};
use tracing::{trace, warn};

use crate::executors::common::SubgraphResponse;
use crate::executors::error::TransportError;
use crate::response::error_normalization::{
    add_subgraph_info_to_error, normalize_errors_for_representations,
};
use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};
use crate::response::merge::{deep_merge, value_at_path_mut};

const ENTITIES_FIELD_NAME: &str = "_entities";

/// Where the data of a finished fetch is merged.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeTarget {
    Root,
    /// Response path of each representation, by representation index.
    Entities(Vec<Vec<GraphQLErrorPathSegment>>),
}

/// The data merged so far and the errors collected along the way.
pub struct ExecutionContext {
    pub data: JsonValue,
    pub errors: Vec<GraphQLError>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext {
            data: JsonValue::Object(Map::new()),
            errors: vec![],
        }
    }

    pub fn merge_response(
        &mut self,
        node: &PlanNode,
        target: &MergeTarget,
        response: SubgraphResponse,
    ) {
        match (target, &node.kind) {
            (MergeTarget::Root, _) => {
                if let Some(data) = response.data {
                    deep_merge(&mut self.data, data);
                }
                if let Some(errors) = response.errors {
                    self.errors.extend(
                        errors
                            .into_iter()
                            .map(|error| add_subgraph_info_to_error(error, &node.subgraph)),
                    );
                }
            }
            (MergeTarget::Entities(paths), kind) => {
                let entities = match response.data {
                    Some(JsonValue::Object(mut data)) => data.remove(ENTITIES_FIELD_NAME),
                    _ => None,
                };
                match entities {
                    Some(JsonValue::Array(entities)) => {
                        if entities.len() != paths.len() {
                            warn!(
                                subgraph = %node.subgraph,
                                expected = paths.len(),
                                received = entities.len(),
                                "entity count does not match the representations sent"
                            );
                        }
                        for (entity, path) in entities.into_iter().zip(paths.iter()) {
                            if let Some(target) = value_at_path_mut(&mut self.data, path) {
                                deep_merge(target, entity);
                            }
                        }
                    }
                    Some(_) | None => trace!(subgraph = %node.subgraph, "no entities returned"),
                }

                if let Some(errors) = response.errors {
                    let fetch_path: &[PathSegment] = match kind {
                        PlanNodeKind::Entity(entity) => entity.path.as_slice(),
                        PlanNodeKind::Root => &[],
                    };
                    self.errors.extend(normalize_errors_for_representations(
                        &node.subgraph,
                        fetch_path,
                        paths,
                        errors,
                    ));
                }
            }
        }
    }

    /// Records `error` at every field the node was responsible for.
    pub fn record_failure(&mut self, node: &PlanNode, target: &MergeTarget, error: &TransportError) {
        let root: [Vec<GraphQLErrorPathSegment>; 1] = [vec![]];
        let bases = match target {
            MergeTarget::Root => &root[..],
            MergeTarget::Entities(paths) => paths.as_slice(),
        };

        for base in bases {
            for field in &node.owned_fields {
                let mut path = base.clone();
                path.push(GraphQLErrorPathSegment::String(field.clone()));
                self.errors.push(
                    GraphQLError::from(error.to_string())
                        .with_path(path)
                        .with_extension("code", error.code())
                        .with_extension("serviceName", node.subgraph.as_str()),
                );
            }
        }
    }
}
