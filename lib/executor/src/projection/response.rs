use fusion_composition::fusion_graph::TypeRef;
use fusion_query_planner::planner::plan_nodes::QueryPlan;
use fusion_query_planner::planner::projection::ProjectionField;
use serde_json::{Map, Value as JsonValue};
use tracing::{instrument, trace};

use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};

const TYPENAME_FIELD_NAME: &str = "__typename";

/// A non-null field resolved to null; the enclosing value must become null.
struct NullBubble;

/// Shapes the merged subgraph data into the client response.
///
/// Only requested fields are kept, in request order and under their response
/// keys. A null in a non-null position nulls the nearest nullable ancestor;
/// without one the whole `data` becomes null.
#[instrument(level = "trace", skip_all)]
pub fn project_by_operation(
    plan: &QueryPlan,
    data: &JsonValue,
    errors: &mut Vec<GraphQLError>,
) -> JsonValue {
    let empty = Map::new();
    let root = data.as_object().unwrap_or(&empty);
    let mut path = vec![];

    match project_selection_set(&plan.projection, root, &mut path, errors) {
        Ok(map) => JsonValue::Object(map),
        Err(NullBubble) => {
            trace!("null propagated to the response root");
            JsonValue::Null
        }
    }
}

fn project_selection_set(
    fields: &[ProjectionField],
    source: &Map<String, JsonValue>,
    path: &mut Vec<GraphQLErrorPathSegment>,
    errors: &mut Vec<GraphQLError>,
) -> Result<Map<String, JsonValue>, NullBubble> {
    let type_name = source.get(TYPENAME_FIELD_NAME).and_then(JsonValue::as_str);
    let mut output = Map::new();

    for field in fields {
        if !field.applies_to(type_name) || output.contains_key(&field.response_key) {
            continue;
        }

        let value = if field.is_typename() {
            let resolved = type_name.unwrap_or(field.parent_type.as_str());
            Some(JsonValue::String(resolved.to_string()))
        } else {
            source.get(&field.response_key).cloned()
        };

        path.push(GraphQLErrorPathSegment::String(field.response_key.clone()));
        let projected = project_value(&field.ty, field, value.as_ref(), path, errors);
        path.pop();

        output.insert(field.response_key.clone(), projected?);
    }

    Ok(output)
}

fn project_value(
    ty: &TypeRef,
    field: &ProjectionField,
    value: Option<&JsonValue>,
    path: &mut Vec<GraphQLErrorPathSegment>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, NullBubble> {
    match ty {
        TypeRef::NonNull(inner) => {
            let projected = project_value(inner, field, value, path, errors)?;
            if projected.is_null() {
                if !errors.iter().any(|error| error.is_at_or_below(path.as_slice())) {
                    errors.push(
                        GraphQLError::from(format!(
                            "Cannot return null for non-nullable field {}.{}.",
                            field.parent_type, field.name
                        ))
                        .with_path(path.clone()),
                    );
                }
                return Err(NullBubble);
            }
            Ok(projected)
        }
        TypeRef::List(inner) => match value {
            Some(JsonValue::Array(items)) => {
                let mut projected_items = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(GraphQLErrorPathSegment::Index(index));
                    let projected = project_value(inner, field, Some(item), path, errors);
                    path.pop();
                    match projected {
                        Ok(projected) => projected_items.push(projected),
                        Err(NullBubble) => return Ok(JsonValue::Null),
                    }
                }
                Ok(JsonValue::Array(projected_items))
            }
            _ => Ok(JsonValue::Null),
        },
        TypeRef::Named(_) => match value {
            None | Some(JsonValue::Null) => Ok(JsonValue::Null),
            Some(leaf) if field.selections.is_empty() => Ok(leaf.clone()),
            Some(JsonValue::Object(object)) => {
                match project_selection_set(&field.selections, object, path, errors) {
                    Ok(projected) => Ok(JsonValue::Object(projected)),
                    Err(NullBubble) => Ok(JsonValue::Null),
                }
            }
            Some(_) => Ok(JsonValue::Null),
        },
    }
}

#[cfg(test)]
mod tests {
    use fusion_composition::fusion_graph::TypeRef;
    use fusion_query_planner::ast::operation::OperationKind;
    use fusion_query_planner::planner::plan_nodes::QueryPlan;
    use fusion_query_planner::planner::projection::ProjectionField;
    use serde_json::json;

    use super::project_by_operation;
    use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};

    fn field(
        key: &str,
        ty: TypeRef,
        parent_type: &str,
        selections: Vec<ProjectionField>,
    ) -> ProjectionField {
        ProjectionField {
            response_key: key.to_string(),
            name: key.to_string(),
            ty,
            parent_type: parent_type.to_string(),
            type_condition: None,
            selections,
        }
    }

    fn plan(projection: Vec<ProjectionField>) -> QueryPlan {
        QueryPlan {
            operation_kind: OperationKind::Query,
            root_type: "Query".to_string(),
            nodes: vec![],
            variables: vec![],
            projection,
        }
    }

    fn user_plan(name_type: TypeRef, user_type: TypeRef) -> QueryPlan {
        plan(vec![field(
            "user",
            user_type,
            "Query",
            vec![
                field("name", name_type, "User", vec![]),
                field("__typename", TypeRef::named("String").non_null(), "User", vec![]),
            ],
        )])
    }

    #[test]
    fn keeps_requested_fields_in_order() {
        let query_plan = user_plan(TypeRef::named("String"), TypeRef::named("User"));
        let data = json!({ "user": { "id": "1", "name": "Ada" } });
        let mut errors = vec![];

        let projected = project_by_operation(&query_plan, &data, &mut errors);

        assert_eq!(
            serde_json::to_string(&projected).expect("data should serialize"),
            r#"{"user":{"name":"Ada","__typename":"User"}}"#
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn null_bubbles_to_nullable_parent() {
        let query_plan = user_plan(
            TypeRef::named("String").non_null(),
            TypeRef::named("User"),
        );
        let data = json!({ "user": { "id": "1" } });
        let mut errors = vec![];

        let projected = project_by_operation(&query_plan, &data, &mut errors);

        assert_eq!(projected, json!({ "user": null }));
        assert_eq!(
            serde_json::to_value(&errors).expect("errors should serialize"),
            json!([{
                "message": "Cannot return null for non-nullable field User.name.",
                "path": ["user", "name"]
            }])
        );
    }

    #[test]
    fn null_without_nullable_ancestor_nulls_data() {
        let query_plan = user_plan(
            TypeRef::named("String").non_null(),
            TypeRef::named("User").non_null(),
        );
        let data = json!({ "user": { "id": "1" } });
        let mut errors =
            vec![GraphQLError::from("upstream failed").with_path(vec!["user".into(), "name".into()])];

        let projected = project_by_operation(&query_plan, &data, &mut errors);

        assert_eq!(projected, json!(null));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn null_list_item_nulls_the_list() {
        let query_plan = plan(vec![field(
            "ids",
            TypeRef::named("ID").non_null().list(),
            "Query",
            vec![],
        )]);
        let data = json!({ "ids": ["1", null] });
        let mut errors = vec![];

        let projected = project_by_operation(&query_plan, &data, &mut errors);

        assert_eq!(projected, json!({ "ids": null }));
        let expected: Vec<GraphQLErrorPathSegment> = vec!["ids".into(), 1usize.into()];
        assert_eq!(errors[0].path, Some(expected));
    }

    #[test]
    fn type_conditions_select_concrete_fields() {
        let mut title = field("title", TypeRef::named("String"), "Book", vec![]);
        title.type_condition = Some("Book".to_string());
        let mut length = field("length", TypeRef::named("Int"), "Movie", vec![]);
        length.type_condition = Some("Movie".to_string());
        let query_plan = plan(vec![field(
            "media",
            TypeRef::named("Media").list(),
            "Query",
            vec![
                field("__typename", TypeRef::named("String").non_null(), "Media", vec![]),
                title,
                length,
            ],
        )]);
        let data = json!({
            "media": [
                { "__typename": "Book", "title": "Dune" },
                { "__typename": "Movie", "length": 155 }
            ]
        });
        let mut errors = vec![];

        let projected = project_by_operation(&query_plan, &data, &mut errors);

        assert_eq!(
            projected,
            json!({
                "media": [
                    { "__typename": "Book", "title": "Dune" },
                    { "__typename": "Movie", "length": 155 }
                ]
            })
        );
    }
}
