use fusion_query_planner::planner::plan_nodes::PathSegment;

use crate::response::graphql_error::{
    GraphQLError, GraphQLErrorPathSegment, DOWNSTREAM_SERVICE_ERROR,
};

/**
 * Map `[_entities, 0, field]` to the response path of the entity the error
 * belongs to.
 *
 * For example if the error location is `[_entities, 1, name]` and the
 * entity with representation index 1 lives at `["users", 3, "author"]`,
 * it becomes `["users", 3, "author", "name"]`.
 */
pub fn normalize_errors_for_representations(
    subgraph_name: &str,
    fetch_path: &[PathSegment],
    entity_paths: &[Vec<GraphQLErrorPathSegment>],
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|mut error| {
            let entity_path = match error.path.as_deref() {
                Some(
                    [GraphQLErrorPathSegment::String(first), GraphQLErrorPathSegment::Index(index), rest @ ..],
                ) if first == "_entities" => entity_paths.get(*index).map(|entity_path| {
                    let mut real_path = entity_path.clone();
                    real_path.extend_from_slice(rest);
                    real_path
                }),
                _ => None,
            };

            // Unlocated errors point at the fetch path up to its first list.
            let real_path = entity_path.unwrap_or_else(|| {
                fetch_path
                    .iter()
                    .map_while(|segment| match segment {
                        PathSegment::Field(name) => {
                            Some(GraphQLErrorPathSegment::String(name.clone()))
                        }
                        PathSegment::List => None,
                    })
                    .collect()
            });
            if !real_path.is_empty() {
                error.path = Some(real_path);
            }

            add_subgraph_info_to_error(error, subgraph_name)
        })
        .collect()
}

pub fn add_subgraph_info_to_error(mut error: GraphQLError, subgraph_name: &str) -> GraphQLError {
    let mut extensions = error.extensions.unwrap_or_default();
    if !extensions.contains_key("serviceName") {
        extensions.insert("serviceName".to_string(), subgraph_name.into());
    }
    if !extensions.contains_key("code") {
        extensions.insert("code".to_string(), DOWNSTREAM_SERVICE_ERROR.into());
    }
    error.extensions = Some(extensions);
    error
}
