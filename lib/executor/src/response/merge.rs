use serde_json::Value as JsonValue;

use crate::response::graphql_error::GraphQLErrorPathSegment;

/// Merges `source` into `target`.
///
/// Objects merge field by field, lists merge item by item, a `null` source
/// leaves the target untouched and any other source replaces the target.
pub fn deep_merge(target: &mut JsonValue, source: JsonValue) {
    match (target, source) {
        (_, JsonValue::Null) => {}
        (JsonValue::Object(target_map), JsonValue::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => deep_merge(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (JsonValue::Array(target_items), JsonValue::Array(source_items)) => {
            let mut source_items = source_items.into_iter();
            for target_item in target_items.iter_mut() {
                match source_items.next() {
                    Some(source_item) => deep_merge(target_item, source_item),
                    None => break,
                }
            }
            target_items.extend(source_items);
        }
        (target, source) => *target = source,
    }
}

/// Walks a concrete response path.
pub fn value_at_path_mut<'v>(
    root: &'v mut JsonValue,
    path: &[GraphQLErrorPathSegment],
) -> Option<&'v mut JsonValue> {
    path.iter().try_fold(root, |current, segment| match segment {
        GraphQLErrorPathSegment::String(key) => current.as_object_mut()?.get_mut(key),
        GraphQLErrorPathSegment::Index(index) => current.as_array_mut()?.get_mut(*index),
    })
}
