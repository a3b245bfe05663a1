use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::response::graphql_error::GraphQLError;

/// The response returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLResponse {
    /// `null` when a non-null error propagated to the root.
    pub data: JsonValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    /// Errors located at exactly `path`.
    pub fn errors_at<'a>(
        &'a self,
        path: &'a [&'a str],
    ) -> impl Iterator<Item = &'a GraphQLError> + 'a {
        self.errors.iter().filter(move |error| {
            error.path.as_ref().is_some_and(|error_path| {
                error_path.len() == path.len()
                    && error_path
                        .iter()
                        .zip(path.iter())
                        .all(|(segment, expected)| segment.to_string() == *expected)
            })
        })
    }
}
