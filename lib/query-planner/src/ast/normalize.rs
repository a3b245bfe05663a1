use std::collections::HashMap;

use fusion_composition::fusion_graph::{is_builtin_scalar, TypeDefinition, TypeRef};
use fusion_composition::FusionGraph;
use graphql_parser::query::{
    Definition, Directive, Document, Field as ParserField, FragmentDefinition,
    OperationDefinition, Selection as ParserSelection, SelectionSet as ParserSelectionSet,
    TypeCondition, Value as ParserValue, VariableDefinition as ParserVariableDefinition,
};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{instrument, trace};

use crate::ast::operation::{NormalizedOperation, OperationKind, VariableDefinition};
use crate::ast::selection_set::{
    FieldSelection, InlineFragmentSelection, Selection, SelectionSet,
};
use crate::ast::value::Value;
use crate::planner::error::PlanningError;
use crate::utils::cancellation::CancellationToken;

/// Picks the requested operation from `document` and normalizes it against
/// the fusion graph.
///
/// `@skip` and `@include` are evaluated here, so `variables` must be the
/// request variables the plan will be executed with.
#[instrument(level = "trace", skip_all, fields(operation_name = ?operation_name))]
pub fn normalize_operation(
    graph: &FusionGraph,
    document: &Document<'_, String>,
    operation_name: Option<&str>,
    variables: &Map<String, JsonValue>,
    cancellation_token: &CancellationToken,
) -> Result<NormalizedOperation, PlanningError> {
    let operation = select_operation(document, operation_name)?;

    let (kind, name, variable_definitions, selection_set) = match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            (OperationKind::Query, None, &[][..], selection_set)
        }
        OperationDefinition::Query(query) => (
            OperationKind::Query,
            query.name.clone(),
            &query.variable_definitions[..],
            &query.selection_set,
        ),
        OperationDefinition::Mutation(mutation) => (
            OperationKind::Mutation,
            mutation.name.clone(),
            &mutation.variable_definitions[..],
            &mutation.selection_set,
        ),
        OperationDefinition::Subscription(_) => {
            return Err(PlanningError::UnsupportedOperation(
                "subscription".to_string(),
            ))
        }
    };

    let root_type = match kind {
        OperationKind::Query => graph.query_type.clone(),
        OperationKind::Mutation => graph
            .mutation_type
            .clone()
            .ok_or_else(|| PlanningError::MissingRootType("mutation".to_string()))?,
    };

    let variable_definitions = variable_definitions
        .iter()
        .map(VariableDefinition::from)
        .collect::<Vec<_>>();

    let mut coerced = variables.clone();
    for variable in &variable_definitions {
        if coerced.contains_key(&variable.name) {
            continue;
        }
        if let Some(default_value) = &variable.default_value {
            coerced.insert(variable.name.clone(), default_value.clone());
        }
    }

    let fragments = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
            Definition::Operation(_) => None,
        })
        .collect();

    let mut normalizer = Normalizer {
        graph,
        fragments,
        variables: &coerced,
        fragment_stack: vec![],
        cancellation_token,
    };

    let root = normalizer.type_definition(&root_type)?;
    let mut collected = vec![];
    normalizer.collect_fields(root, None, selection_set, &mut collected)?;
    let selection_set = normalizer.build_selection_set(root, collected)?;

    trace!(%selection_set, "operation normalized");

    Ok(NormalizedOperation {
        kind,
        name,
        root_type,
        variables: variable_definitions,
        selection_set,
    })
}

fn select_operation<'d, 'a>(
    document: &'d Document<'a, String>,
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition<'a, String>, PlanningError> {
    let operations = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::Operation(operation) => Some(operation),
            Definition::Fragment(_) => None,
        })
        .collect::<Vec<_>>();

    match operation_name {
        Some(requested) => operations
            .into_iter()
            .find(|operation| operation_name_of(operation) == Some(requested))
            .ok_or_else(|| PlanningError::UnknownOperation(requested.to_string())),
        None => match operations.as_slice() {
            [] => Err(PlanningError::MissingOperation),
            [operation] => Ok(*operation),
            _ => Err(PlanningError::AmbiguousOperation),
        },
    }
}

fn operation_name_of<'d>(operation: &'d OperationDefinition<'_, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

impl From<&ParserVariableDefinition<'_, String>> for VariableDefinition {
    fn from(value: &ParserVariableDefinition<'_, String>) -> Self {
        VariableDefinition {
            name: value.name.clone(),
            ty: TypeRef::from(&value.var_type).to_string(),
            default_value: value
                .default_value
                .as_ref()
                .and_then(|default_value| Value::from(default_value).to_json()),
        }
    }
}

struct CollectedField<'n, 'a> {
    /// Concrete object type the field was selected on, when narrower than the
    /// parent type.
    type_condition: Option<String>,
    field: &'n ParserField<'a, String>,
}

struct Normalizer<'n, 'a> {
    graph: &'n FusionGraph,
    fragments: HashMap<&'n str, &'n FragmentDefinition<'a, String>>,
    variables: &'n Map<String, JsonValue>,
    fragment_stack: Vec<String>,
    cancellation_token: &'n CancellationToken,
}

impl<'n, 'a> Normalizer<'n, 'a> {
    fn type_definition(&self, name: &str) -> Result<&'n TypeDefinition, PlanningError> {
        self.graph
            .type_definition(name)
            .ok_or_else(|| PlanningError::UnknownType(name.to_string()))
    }

    /// The composite type behind a field, `None` for leaves.
    fn composite_type(&self, name: &str) -> Result<Option<&'n TypeDefinition>, PlanningError> {
        match self.graph.type_definition(name) {
            Some(definition) if definition.is_composite() => Ok(Some(definition)),
            Some(_) => Ok(None),
            None if is_builtin_scalar(name) => Ok(None),
            None => Err(PlanningError::UnknownType(name.to_string())),
        }
    }

    fn collect_fields(
        &mut self,
        parent: &'n TypeDefinition,
        scope: Option<&str>,
        selection_set: &'n ParserSelectionSet<'a, String>,
        collected: &mut Vec<CollectedField<'n, 'a>>,
    ) -> Result<(), PlanningError> {
        self.cancellation_token.bail_if_cancelled()?;

        for selection in &selection_set.items {
            match selection {
                ParserSelection::Field(field) => {
                    if self.is_excluded(&field.directives)? {
                        continue;
                    }
                    collected.push(CollectedField {
                        type_condition: scope.map(str::to_string),
                        field,
                    });
                }
                ParserSelection::InlineFragment(fragment) => {
                    if self.is_excluded(&fragment.directives)? {
                        continue;
                    }
                    let condition = fragment
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(name)| name.as_str());
                    self.collect_fragment(
                        parent,
                        scope,
                        condition,
                        &fragment.selection_set,
                        collected,
                    )?;
                }
                ParserSelection::FragmentSpread(spread) => {
                    if self.is_excluded(&spread.directives)? {
                        continue;
                    }
                    let fragment = self
                        .fragments
                        .get(spread.fragment_name.as_str())
                        .copied()
                        .ok_or_else(|| {
                            PlanningError::UnknownFragment(spread.fragment_name.clone())
                        })?;
                    if self.fragment_stack.contains(&spread.fragment_name) {
                        return Err(PlanningError::FragmentCycle(spread.fragment_name.clone()));
                    }

                    let TypeCondition::On(condition) = &fragment.type_condition;
                    self.fragment_stack.push(spread.fragment_name.clone());
                    self.collect_fragment(
                        parent,
                        scope,
                        Some(condition),
                        &fragment.selection_set,
                        collected,
                    )?;
                    self.fragment_stack.pop();
                }
            }
        }

        Ok(())
    }

    fn collect_fragment(
        &mut self,
        parent: &'n TypeDefinition,
        scope: Option<&str>,
        condition: Option<&str>,
        selection_set: &'n ParserSelectionSet<'a, String>,
        collected: &mut Vec<CollectedField<'n, 'a>>,
    ) -> Result<(), PlanningError> {
        let condition = match condition {
            Some(condition) if condition != parent.name => condition,
            _ => return self.collect_fields(parent, scope, selection_set, collected),
        };

        self.type_definition(condition)?;
        let condition_types = self.graph.possible_types(condition);

        if parent.is_object() {
            if condition_types.contains(&parent.name) {
                self.collect_fields(parent, scope, selection_set, collected)?;
            }
            return Ok(());
        }

        let candidates = match scope {
            Some(scoped) if condition_types.contains(scoped) => vec![scoped.to_string()],
            Some(_) => vec![],
            None => self
                .graph
                .possible_types(&parent.name)
                .intersection(&condition_types)
                .cloned()
                .collect(),
        };

        for object_type in candidates {
            self.collect_fields(parent, Some(object_type.as_str()), selection_set, collected)?;
        }

        Ok(())
    }

    fn build_selection_set(
        &mut self,
        parent: &'n TypeDefinition,
        collected: Vec<CollectedField<'n, 'a>>,
    ) -> Result<SelectionSet, PlanningError> {
        let mut groups: IndexMap<(Option<String>, &str), Vec<&'n ParserField<'a, String>>> =
            IndexMap::new();
        for CollectedField {
            type_condition,
            field,
        } in collected
        {
            let response_key = field.alias.as_deref().unwrap_or(&field.name);
            groups
                .entry((type_condition, response_key))
                .or_default()
                .push(field);
        }

        // Each type-conditioned group sits where its first field was selected.
        let mut selection_set = SelectionSet::default();
        let mut fragment_positions: HashMap<String, usize> = HashMap::new();

        for ((type_condition, response_key), fields) in groups {
            match type_condition {
                None => {
                    let field = self.merge_fields(parent, response_key, &fields)?;
                    selection_set.push(Selection::Field(field));
                }
                Some(type_name) => {
                    let owner = self.type_definition(&type_name)?;
                    let field = self.merge_fields(owner, response_key, &fields)?;
                    let position = match fragment_positions.get(&type_name) {
                        Some(position) => *position,
                        None => {
                            let position = selection_set.items.len();
                            fragment_positions.insert(type_name.clone(), position);
                            selection_set.push(Selection::InlineFragment(
                                InlineFragmentSelection {
                                    type_condition: type_name,
                                    selections: SelectionSet::default(),
                                },
                            ));
                            position
                        }
                    };
                    if let Some(Selection::InlineFragment(fragment)) =
                        selection_set.items.get_mut(position)
                    {
                        fragment.selections.push(Selection::Field(field));
                    }
                }
            }
        }

        Ok(selection_set)
    }

    fn merge_fields(
        &mut self,
        owner: &'n TypeDefinition,
        response_key: &str,
        fields: &[&'n ParserField<'a, String>],
    ) -> Result<FieldSelection, PlanningError> {
        let Some((first, rest)) = fields.split_first() else {
            return Err(PlanningError::FieldConflict {
                response_key: response_key.to_string(),
                reason: "no field was selected".to_string(),
            });
        };

        for other in rest {
            if other.name != first.name {
                return Err(PlanningError::FieldConflict {
                    response_key: response_key.to_string(),
                    reason: format!(
                        "\"{}\" and \"{}\" are different fields",
                        first.name, other.name
                    ),
                });
            }
            if other.arguments != first.arguments {
                return Err(PlanningError::FieldConflict {
                    response_key: response_key.to_string(),
                    reason: "they have different arguments".to_string(),
                });
            }
        }

        let alias = first
            .alias
            .clone()
            .filter(|alias| alias != &first.name);
        let has_selections = fields
            .iter()
            .any(|field| !field.selection_set.items.is_empty());

        if first.name == "__typename" {
            if has_selections {
                return Err(PlanningError::InvalidSelection {
                    type_name: owner.name.clone(),
                    field_name: first.name.clone(),
                    reason: "is a leaf and cannot have a selection".to_string(),
                });
            }
            return Ok(FieldSelection {
                alias,
                ..FieldSelection::new("__typename")
            });
        }

        let definition = owner
            .field(&first.name)
            .ok_or_else(|| PlanningError::UnknownField {
                type_name: owner.name.clone(),
                field_name: first.name.clone(),
            })?;
        let field_type = self.composite_type(definition.ty.named_type())?;

        let selections = if let Some(field_type) = field_type {
            if !has_selections {
                return Err(PlanningError::InvalidSelection {
                    type_name: owner.name.clone(),
                    field_name: first.name.clone(),
                    reason: format!("of type \"{}\" needs a selection", definition.ty),
                });
            }
            let mut collected = vec![];
            for field in fields {
                self.collect_fields(field_type, None, &field.selection_set, &mut collected)?;
            }
            self.build_selection_set(field_type, collected)?
        } else if has_selections {
            return Err(PlanningError::InvalidSelection {
                type_name: owner.name.clone(),
                field_name: first.name.clone(),
                reason: "is a leaf and cannot have a selection".to_string(),
            });
        } else {
            SelectionSet::default()
        };

        Ok(FieldSelection {
            name: first.name.clone(),
            alias,
            arguments: first
                .arguments
                .iter()
                .map(|(name, value)| (name.clone(), Value::from(value)))
                .collect(),
            selections,
        })
    }

    fn is_excluded(&self, directives: &[Directive<'a, String>]) -> Result<bool, PlanningError> {
        for directive in directives {
            let skip = match directive.name.as_str() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };

            let invalid = |reason: String| PlanningError::InvalidDirective {
                directive: directive.name.clone(),
                reason,
            };

            let condition = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .map(|(_, value)| value)
                .ok_or_else(|| invalid("missing the \"if\" argument".to_string()))?;

            let condition = match condition {
                ParserValue::Boolean(value) => *value,
                ParserValue::Variable(name) => match self.variables.get(name) {
                    Some(JsonValue::Bool(value)) => *value,
                    _ => return Err(invalid(format!("variable \"${}\" is not a boolean", name))),
                },
                _ => return Err(invalid("\"if\" must be a boolean".to_string())),
            };

            if condition == skip {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
