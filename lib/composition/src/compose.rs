use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::error::{CompositionError, CompositionErrors};
use crate::fusion_graph::{
    BindingKind, EntityKey, EnumType, EnumValueDefinition, FieldBinding, FieldDefinition,
    FusionGraph, InputObjectType, InputValueDefinition, ObjectType, TypeDefinition, TypeKind,
    TypeRef, UnionType,
};
use crate::ingest::{
    ingest_subgraph, SubgraphEnumValue, SubgraphField, SubgraphObject, SubgraphSchema,
    SubgraphType, SubgraphTypeKind,
};
use crate::subgraph::SubgraphConfiguration;

const ROOT_TYPES: [&str; 3] = ["Query", "Mutation", "Subscription"];

/// Composes a set of subgraphs into one fusion graph.
///
/// The result depends only on the set of subgraphs, never on their order:
/// subgraphs are merged sorted by name. Every detected problem is reported.
#[instrument(level = "debug", skip_all, fields(subgraphs = configs.len()))]
pub fn compose(configs: &[SubgraphConfiguration]) -> Result<FusionGraph, CompositionErrors> {
    let mut errors = CompositionErrors::default();

    let mut sorted: Vec<&SubgraphConfiguration> = configs.iter().collect();
    sorted.sort_by(|left, right| left.name.cmp(&right.name));

    let mut seen = BTreeMap::<&str, usize>::new();
    for config in &sorted {
        *seen.entry(config.name.as_str()).or_default() += 1;
    }
    for (name, count) in &seen {
        if *count > 1 {
            errors.push(CompositionError::DuplicateSubgraph(name.to_string()));
        }
    }

    let mut subgraphs = Vec::with_capacity(sorted.len());
    for config in sorted {
        match ingest_subgraph(config) {
            Ok((schema, subgraph_errors)) => {
                debug!(
                    subgraph = %schema.name,
                    types = schema.types.len(),
                    errors = subgraph_errors.len(),
                    "subgraph schema ingested"
                );
                errors.extend(subgraph_errors);
                subgraphs.push(schema);
            }
            Err(error) => errors.push(error),
        }
    }

    let graph = merge_subgraphs(&subgraphs, &mut errors);

    if !errors.is_empty() {
        warn!(errors = errors.len(), "composition failed");
        return Err(errors);
    }

    debug!(types = graph.types.len(), "composition finished");

    Ok(graph)
}

fn merge_subgraphs(subgraphs: &[SubgraphSchema], errors: &mut CompositionErrors) -> FusionGraph {
    let mut declarations: IndexMap<&str, Vec<(&str, &SubgraphType)>> = IndexMap::new();
    for subgraph in subgraphs {
        for (name, definition) in &subgraph.types {
            declarations
                .entry(name.as_str())
                .or_default()
                .push((subgraph.name.as_str(), definition));
        }
    }

    if !subgraphs.is_empty() && !declarations.contains_key("Query") {
        errors.push(CompositionError::MissingQueryType);
    }

    let mut names: Vec<&str> = declarations.keys().copied().collect();
    names.sort_by_key(|name| {
        let root_rank = ROOT_TYPES
            .iter()
            .position(|root| root == name)
            .unwrap_or(ROOT_TYPES.len());
        (root_rank, *name)
    });

    let mut types = IndexMap::with_capacity(names.len());
    for name in names {
        let entries = &declarations[name];
        if let Some(definition) = merge_type(name, entries, errors) {
            types.insert(name.to_string(), definition);
        }
    }

    FusionGraph {
        subgraphs: subgraphs.iter().map(|subgraph| subgraph.name.clone()).collect(),
        query_type: "Query".to_string(),
        mutation_type: subgraphs
            .iter()
            .any(|subgraph| subgraph.has_mutation)
            .then(|| "Mutation".to_string()),
        subscription_type: subgraphs
            .iter()
            .any(|subgraph| subgraph.has_subscription)
            .then(|| "Subscription".to_string()),
        types,
    }
}

fn merge_type(
    name: &str,
    entries: &[(&str, &SubgraphType)],
    errors: &mut CompositionErrors,
) -> Option<TypeDefinition> {
    let (_, first) = entries.first()?;
    let expected = first.kind.kind_name();

    if entries
        .iter()
        .any(|(_, definition)| definition.kind.kind_name() != expected)
    {
        errors.push(CompositionError::TypeKindConflict {
            type_name: name.to_string(),
            declarations: entries
                .iter()
                .map(|(subgraph, definition)| {
                    (subgraph.to_string(), definition.kind.kind_name().to_string())
                })
                .collect(),
        });
        return None;
    }

    let kind = match &first.kind {
        SubgraphTypeKind::Scalar => TypeKind::Scalar,
        SubgraphTypeKind::Object(_) => {
            let objects = entries
                .iter()
                .filter_map(|(subgraph, definition)| match &definition.kind {
                    SubgraphTypeKind::Object(object) => Some((*subgraph, object)),
                    _ => None,
                })
                .collect::<Vec<_>>();
            TypeKind::Object(merge_object(name, &objects, false, errors))
        }
        SubgraphTypeKind::Interface(_) => {
            let interfaces = entries
                .iter()
                .filter_map(|(subgraph, definition)| match &definition.kind {
                    SubgraphTypeKind::Interface(object) => Some((*subgraph, object)),
                    _ => None,
                })
                .collect::<Vec<_>>();
            TypeKind::Interface(merge_object(name, &interfaces, true, errors))
        }
        SubgraphTypeKind::Union(_) => {
            let mut members: Vec<String> = Vec::new();
            for (_, definition) in entries {
                if let SubgraphTypeKind::Union(declared) = &definition.kind {
                    for member in declared {
                        if !members.contains(member) {
                            members.push(member.clone());
                        }
                    }
                }
            }
            TypeKind::Union(UnionType { members })
        }
        SubgraphTypeKind::Enum(_) => {
            let values = entries
                .iter()
                .filter_map(|(subgraph, definition)| match &definition.kind {
                    SubgraphTypeKind::Enum(values) => Some((*subgraph, values)),
                    _ => None,
                })
                .collect::<Vec<_>>();
            TypeKind::Enum(merge_enum(&values))
        }
        SubgraphTypeKind::InputObject(_) => {
            let inputs = entries
                .iter()
                .filter_map(|(subgraph, definition)| match &definition.kind {
                    SubgraphTypeKind::InputObject(fields) => Some((*subgraph, fields)),
                    _ => None,
                })
                .collect::<Vec<_>>();
            TypeKind::InputObject(merge_input_object(name, &inputs, errors))
        }
    };

    Some(TypeDefinition {
        name: name.to_string(),
        description: entries
            .iter()
            .find_map(|(_, definition)| definition.description.clone()),
        sources: entries
            .iter()
            .map(|(subgraph, _)| subgraph.to_string())
            .collect(),
        kind,
    })
}

fn merge_object(
    type_name: &str,
    entries: &[(&str, &SubgraphObject)],
    is_interface: bool,
    errors: &mut CompositionErrors,
) -> ObjectType {
    let is_root = ROOT_TYPES.contains(&type_name);

    let mut implements: Vec<String> = Vec::new();
    let mut keys = Vec::new();
    let mut fields: IndexMap<&str, Vec<(&str, bool, &SubgraphField)>> = IndexMap::new();

    for (subgraph, object) in entries {
        for interface in &object.implements {
            if !implements.contains(interface) {
                implements.push(interface.clone());
            }
        }
        for key in &object.keys {
            keys.push(EntityKey {
                subgraph: subgraph.to_string(),
                fields: key.clone(),
            });
        }
        let is_entity = !object.keys.is_empty();
        for (field_name, field) in &object.fields {
            fields
                .entry(field_name.as_str())
                .or_default()
                .push((*subgraph, is_entity, field));
        }
    }

    let kind_for = |is_entity: bool| {
        if is_root {
            BindingKind::Root
        } else if is_entity && !is_interface {
            BindingKind::Keyed
        } else {
            BindingKind::Local
        }
    };

    let mut merged_fields = IndexMap::with_capacity(fields.len());
    for (field_name, declarations) in fields {
        let Some(field) = merge_field(type_name, field_name, &declarations, &kind_for, errors)
        else {
            continue;
        };
        merged_fields.insert(field_name.to_string(), field);
    }

    ObjectType {
        implements,
        keys,
        fields: merged_fields,
    }
}

fn merge_field(
    type_name: &str,
    field_name: &str,
    declarations: &[(&str, bool, &SubgraphField)],
    kind_for: &dyn Fn(bool) -> BindingKind,
    errors: &mut CompositionErrors,
) -> Option<FieldDefinition> {
    let (_, _, first) = declarations.first()?;

    let merged_type = declarations
        .iter()
        .skip(1)
        .try_fold(first.ty.clone(), |merged, (_, _, field)| {
            merged.merge_output(&field.ty)
        });
    let Some(ty) = merged_type else {
        errors.push(CompositionError::FieldTypeMismatch {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
            declarations: declarations
                .iter()
                .map(|(subgraph, _, field)| (subgraph.to_string(), field.ty.to_string()))
                .collect(),
        });
        return None;
    };

    let mut arguments: IndexMap<&str, (InputValueDefinition, Vec<(&str, &TypeRef)>)> =
        IndexMap::new();
    for (subgraph, _, field) in declarations {
        for argument in &field.arguments {
            let (_, seen) = arguments
                .entry(argument.name.as_str())
                .or_insert_with(|| (argument.clone(), Vec::new()));
            seen.push((*subgraph, &argument.ty));
        }
    }

    let mut merged_arguments = Vec::with_capacity(arguments.len());
    for (argument_name, (definition, seen)) in arguments {
        if seen.iter().any(|(_, ty)| **ty != definition.ty) {
            errors.push(CompositionError::ArgumentTypeMismatch {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
                argument_name: argument_name.to_string(),
                declarations: seen
                    .iter()
                    .map(|(subgraph, ty)| (subgraph.to_string(), ty.to_string()))
                    .collect(),
            });
            continue;
        }
        merged_arguments.push(definition);
    }

    Some(FieldDefinition {
        name: field_name.to_string(),
        description: declarations
            .iter()
            .find_map(|(_, _, field)| field.description.clone()),
        deprecation: declarations
            .iter()
            .find_map(|(_, _, field)| field.deprecation.clone()),
        arguments: merged_arguments,
        ty,
        bindings: rank_bindings(declarations, kind_for),
    })
}

/// Orders the subgraphs able to serve a field: explicit `@priority` values
/// first (lower wins), then subgraph name order. Ranks are unique.
fn rank_bindings(
    declarations: &[(&str, bool, &SubgraphField)],
    kind_for: &dyn Fn(bool) -> BindingKind,
) -> Vec<FieldBinding> {
    let mut ordered = declarations.to_vec();
    // Stable: equal priorities keep subgraph name order.
    ordered.sort_by_key(|(_, _, field)| field.priority.unwrap_or(i64::MAX));

    ordered
        .into_iter()
        .enumerate()
        .map(|(priority, (subgraph, is_entity, _))| FieldBinding {
            subgraph: subgraph.to_string(),
            kind: kind_for(is_entity),
            priority,
        })
        .collect()
}

fn merge_enum(entries: &[(&str, &IndexMap<String, SubgraphEnumValue>)]) -> EnumType {
    let mut values: IndexMap<String, EnumValueDefinition> = IndexMap::new();
    for (subgraph, declared) in entries {
        for (name, value) in declared.iter() {
            let merged = values
                .entry(name.clone())
                .or_insert_with(|| EnumValueDefinition {
                    name: name.clone(),
                    description: None,
                    deprecation: None,
                    sources: vec![],
                });
            if merged.description.is_none() {
                merged.description = value.description.clone();
            }
            if merged.deprecation.is_none() {
                merged.deprecation = value.deprecation.clone();
            }
            merged.sources.push(subgraph.to_string());
        }
    }

    EnumType { values }
}

fn merge_input_object(
    type_name: &str,
    entries: &[(&str, &IndexMap<String, InputValueDefinition>)],
    errors: &mut CompositionErrors,
) -> InputObjectType {
    let mut fields: IndexMap<&str, Vec<(&str, &InputValueDefinition)>> = IndexMap::new();
    for (subgraph, declared) in entries {
        for (name, field) in declared.iter() {
            fields
                .entry(name.as_str())
                .or_default()
                .push((*subgraph, field));
        }
    }

    let mut merged = IndexMap::with_capacity(fields.len());
    for (name, declarations) in fields {
        let Some((_, first)) = declarations.first() else {
            continue;
        };
        if declarations.iter().any(|(_, field)| field.ty != first.ty) {
            errors.push(CompositionError::FieldTypeMismatch {
                type_name: type_name.to_string(),
                field_name: name.to_string(),
                declarations: declarations
                    .iter()
                    .map(|(subgraph, field)| (subgraph.to_string(), field.ty.to_string()))
                    .collect(),
            });
            continue;
        }

        let mut field = (*first).clone();
        if field.description.is_none() {
            field.description = declarations
                .iter()
                .find_map(|(_, declared)| declared.description.clone());
        }
        merged.insert(name.to_string(), field);
    }

    InputObjectType { fields: merged }
}
