use fusion_composition::fusion_graph::FieldSet;
use fusion_query_planner::planner::plan_nodes::{key_field_alias, EntityFetch, PathSegment};
use serde_json::{Map, Value as JsonValue};

use crate::response::graphql_error::GraphQLErrorPathSegment;

const TYPENAME_FIELD_NAME: &str = "__typename";

/// An object an entity fetch resolves fields for.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTarget {
    /// Concrete response path of the object, with list indexes.
    pub path: Vec<GraphQLErrorPathSegment>,
    pub representation: JsonValue,
}

/// Finds the objects at `entity.path` and builds their representations.
///
/// Objects of another concrete type, and objects missing a key field, are
/// skipped.
pub fn collect_entity_targets(data: &JsonValue, entity: &EntityFetch) -> Vec<EntityTarget> {
    let mut targets = vec![];
    let mut current_path = vec![];
    collect(data, &entity.path, entity, &mut current_path, &mut targets);
    targets
}

fn collect(
    value: &JsonValue,
    remaining: &[PathSegment],
    entity: &EntityFetch,
    current_path: &mut Vec<GraphQLErrorPathSegment>,
    targets: &mut Vec<EntityTarget>,
) {
    match remaining.split_first() {
        None => {
            let Some(object) = value.as_object() else {
                return;
            };
            if let Some(representation) = representation(object, entity) {
                targets.push(EntityTarget {
                    path: current_path.clone(),
                    representation,
                });
            }
        }
        Some((PathSegment::Field(name), rest)) => {
            if let Some(child) = value.as_object().and_then(|object| object.get(name)) {
                current_path.push(GraphQLErrorPathSegment::String(name.clone()));
                collect(child, rest, entity, current_path, targets);
                current_path.pop();
            }
        }
        Some((PathSegment::List, rest)) => {
            if let Some(items) = value.as_array() {
                for (index, item) in items.iter().enumerate() {
                    current_path.push(GraphQLErrorPathSegment::Index(index));
                    collect(item, rest, entity, current_path, targets);
                    current_path.pop();
                }
            }
        }
    }
}

fn representation(object: &Map<String, JsonValue>, entity: &EntityFetch) -> Option<JsonValue> {
    if let Some(type_name) = object.get(TYPENAME_FIELD_NAME).and_then(JsonValue::as_str) {
        if type_name != entity.type_name {
            return None;
        }
    }

    let mut representation = Map::new();
    representation.insert(
        TYPENAME_FIELD_NAME.to_string(),
        JsonValue::String(entity.type_name.clone()),
    );
    project_key(object, &entity.key, &mut representation)?;

    Some(JsonValue::Object(representation))
}

fn project_key(
    object: &Map<String, JsonValue>,
    key: &FieldSet,
    output: &mut Map<String, JsonValue>,
) -> Option<()> {
    for item in key.iter() {
        // Present when the client selection took the key's own response key.
        let value = object
            .get(&key_field_alias(&item.name))
            .or_else(|| object.get(&item.name))
            .filter(|value| !value.is_null())?;
        let value = if item.selections.items.is_empty() {
            value.clone()
        } else {
            project_key_value(value, &item.selections)?
        };
        output.insert(item.name.clone(), value);
    }

    Some(())
}

fn project_key_value(value: &JsonValue, key: &FieldSet) -> Option<JsonValue> {
    match value {
        JsonValue::Object(object) => {
            let mut nested = Map::new();
            project_key(object, key, &mut nested)?;
            Some(JsonValue::Object(nested))
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| project_key_value(item, key))
            .collect::<Option<Vec<_>>>()
            .map(JsonValue::Array),
        _ => None,
    }
}
