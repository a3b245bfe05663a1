use std::collections::BTreeSet;

use fusion_composition::fusion_graph::{
    BindingKind, FieldDefinition, FieldSet, FieldSetItem, TypeDefinition,
};
use fusion_composition::FusionGraph;
use indexmap::IndexMap;
use tracing::trace;

use crate::ast::operation::{NormalizedOperation, OperationKind};
use crate::ast::selection_set::{
    FieldSelection, InlineFragmentSelection, Selection, SelectionSet,
};
use crate::planner::error::PlanningError;
use crate::planner::plan_nodes::{
    key_field_alias, EntityFetch, PathSegment, PlanNode, PlanNodeKind, QueryPlan,
    REPRESENTATIONS_VARIABLE,
};
use crate::planner::projection::build_projection;
use crate::utils::cancellation::CancellationToken;

struct NodeDraft<'a> {
    subgraph: &'a str,
    kind: PlanNodeKind,
    depends_on: BTreeSet<usize>,
    selection: SelectionSet,
    owned_fields: Vec<String>,
}

/// Walks a normalized operation and assigns every field to a subgraph fetch.
///
/// A field stays in the fetch that produced its parent object whenever that
/// subgraph resolves it. Otherwise it moves to an entity fetch against the
/// highest ranked subgraph that binds it as keyed and whose key the current
/// subgraph can provide. Fields going to the same subgraph at the same
/// position share one fetch.
pub(crate) struct PlanBuilder<'a> {
    graph: &'a FusionGraph,
    operation: &'a NormalizedOperation,
    cancellation_token: &'a CancellationToken,
    nodes: Vec<NodeDraft<'a>>,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(
        graph: &'a FusionGraph,
        operation: &'a NormalizedOperation,
        cancellation_token: &'a CancellationToken,
    ) -> Self {
        PlanBuilder {
            graph,
            operation,
            cancellation_token,
            nodes: vec![],
        }
    }

    pub(crate) fn build(mut self) -> Result<QueryPlan, PlanningError> {
        let root = self.type_definition(&self.operation.root_type)?;
        match self.operation.kind {
            OperationKind::Query => self.plan_query_root(root)?,
            OperationKind::Mutation => self.plan_mutation_root(root)?,
        }

        let projection = build_projection(
            self.graph,
            &self.operation.root_type,
            &self.operation.selection_set,
        )?;

        let operation = self.operation;
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(id, draft)| finish_node(operation, id, draft))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryPlan {
            operation_kind: operation.kind,
            root_type: operation.root_type.clone(),
            nodes,
            variables: operation.variables.clone(),
            projection,
        })
    }

    fn type_definition(&self, name: &str) -> Result<&'a TypeDefinition, PlanningError> {
        self.graph
            .type_definition(name)
            .ok_or_else(|| PlanningError::UnknownType(name.to_string()))
    }

    fn field_definition(
        &self,
        parent: &'a TypeDefinition,
        field: &FieldSelection,
    ) -> Result<&'a FieldDefinition, PlanningError> {
        parent
            .field(&field.name)
            .ok_or_else(|| PlanningError::UnknownField {
                type_name: parent.name.clone(),
                field_name: field.name.clone(),
            })
    }

    /// Root fields of a query are grouped per subgraph; the groups run in parallel.
    fn plan_query_root(&mut self, root: &'a TypeDefinition) -> Result<(), PlanningError> {
        let operation = self.operation;
        let mut groups: IndexMap<&'a str, SelectionSet> = IndexMap::new();
        for field in operation.selection_set.fields() {
            if field.is_typename() {
                continue;
            }
            let subgraph = self.root_subgraph(root, field)?;
            groups
                .entry(subgraph)
                .or_default()
                .push(Selection::Field(field.clone()));
        }

        for (subgraph, selection_set) in groups {
            self.plan_root_fetch(subgraph, root, &selection_set, BTreeSet::new())?;
        }

        Ok(())
    }

    /// Root fields of a mutation run one after the other. Consecutive fields
    /// of the same subgraph share a fetch, and each fetch waits for every node
    /// planned for the previous one.
    fn plan_mutation_root(&mut self, root: &'a TypeDefinition) -> Result<(), PlanningError> {
        let operation = self.operation;
        let mut runs: Vec<(&'a str, SelectionSet)> = vec![];
        for field in operation.selection_set.fields() {
            if field.is_typename() {
                continue;
            }
            let subgraph = self.root_subgraph(root, field)?;
            match runs.last_mut() {
                Some((last, selection_set)) if *last == subgraph => {
                    selection_set.push(Selection::Field(field.clone()))
                }
                _ => runs.push((
                    subgraph,
                    SelectionSet {
                        items: vec![Selection::Field(field.clone())],
                    },
                )),
            }
        }

        let mut previous = BTreeSet::new();
        for (subgraph, selection_set) in runs {
            let first = self.nodes.len();
            self.plan_root_fetch(subgraph, root, &selection_set, previous)?;
            previous = (first..self.nodes.len()).collect();
        }

        Ok(())
    }

    fn root_subgraph(
        &self,
        root: &'a TypeDefinition,
        field: &FieldSelection,
    ) -> Result<&'a str, PlanningError> {
        let definition = self.field_definition(root, field)?;
        definition
            .bindings
            .iter()
            .filter(|binding| match binding.kind {
                BindingKind::Root => true,
                BindingKind::Local | BindingKind::Keyed => false,
            })
            .min_by_key(|binding| binding.priority)
            .map(|binding| binding.subgraph.as_str())
            .ok_or_else(|| PlanningError::UnresolvableField {
                type_name: root.name.clone(),
                field_name: field.name.clone(),
                reason: "no subgraph exposes it as a root field".to_string(),
            })
    }

    fn plan_root_fetch(
        &mut self,
        subgraph: &'a str,
        root: &'a TypeDefinition,
        selection_set: &SelectionSet,
        depends_on: BTreeSet<usize>,
    ) -> Result<usize, PlanningError> {
        let id = self.push_node(subgraph, PlanNodeKind::Root, depends_on, selection_set);
        let selection = self.plan_selection(subgraph, id, root, selection_set, &[])?;
        self.nodes[id].selection = selection;
        Ok(id)
    }

    fn push_node(
        &mut self,
        subgraph: &'a str,
        kind: PlanNodeKind,
        depends_on: BTreeSet<usize>,
        owned: &SelectionSet,
    ) -> usize {
        let id = self.nodes.len();
        trace!(id, subgraph, "plan node added");
        self.nodes.push(NodeDraft {
            subgraph,
            kind,
            depends_on,
            selection: SelectionSet::default(),
            owned_fields: owned
                .fields()
                .map(|field| field.response_key().to_string())
                .collect(),
        });
        id
    }

    /// Plans `selection_set` under `parent` for the fetch `node` against
    /// `subgraph` and returns what that fetch has to select at this position.
    fn plan_selection(
        &mut self,
        subgraph: &'a str,
        node: usize,
        parent: &'a TypeDefinition,
        selection_set: &SelectionSet,
        path: &[PathSegment],
    ) -> Result<SelectionSet, PlanningError> {
        self.cancellation_token.bail_if_cancelled()?;

        let mut local = SelectionSet::default();
        let mut remote: IndexMap<&'a str, (&'a FieldSet, SelectionSet)> = IndexMap::new();

        if parent.is_abstract() {
            local.push(Selection::Field(FieldSelection::new("__typename")));
        }

        for item in &selection_set.items {
            match item {
                Selection::Field(field) if field.is_typename() => {}
                Selection::Field(field) => {
                    let definition = self.field_definition(parent, field)?;
                    if definition.is_resolvable_by(subgraph) {
                        let selections = self.plan_field(subgraph, node, definition, field, path)?;
                        local.push(Selection::Field(FieldSelection {
                            name: field.name.clone(),
                            alias: field.alias.clone(),
                            arguments: field.arguments.clone(),
                            selections,
                        }));
                    } else if parent.is_abstract() {
                        return Err(PlanningError::UnresolvableField {
                            type_name: parent.name.clone(),
                            field_name: field.name.clone(),
                            reason: format!(
                                "{} fields must be resolved by the subgraph returning the object, \"{}\" does not",
                                parent.kind.kind_name(),
                                subgraph
                            ),
                        });
                    } else {
                        let (target, key) = self.entity_subgraph(parent, definition, subgraph)?;
                        remote
                            .entry(target)
                            .or_insert_with(|| (key, SelectionSet::default()))
                            .1
                            .push(item.clone());
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let object = self.type_definition(&fragment.type_condition)?;
                    if !object.is_declared_by(subgraph) {
                        trace!(
                            subgraph,
                            type_name = %fragment.type_condition,
                            "fragment dropped, the subgraph does not declare the type"
                        );
                        continue;
                    }
                    let selections =
                        self.plan_selection(subgraph, node, object, &fragment.selections, path)?;
                    local.push(Selection::InlineFragment(InlineFragmentSelection {
                        type_condition: fragment.type_condition.clone(),
                        selections,
                    }));
                }
            }
        }

        for (target, (key, fields)) in remote {
            self.add_key_fields(&mut local, parent, key)?;

            let entity = EntityFetch {
                type_name: parent.name.clone(),
                path: path.to_vec(),
                key: key.clone(),
            };
            let id = self.push_node(
                target,
                PlanNodeKind::Entity(entity),
                BTreeSet::from([node]),
                &fields,
            );
            let selection = self.plan_selection(target, id, parent, &fields, path)?;
            self.nodes[id].selection = selection;
        }

        if local.is_empty() {
            local.push(Selection::Field(FieldSelection::new("__typename")));
        }

        Ok(local)
    }

    fn plan_field(
        &mut self,
        subgraph: &'a str,
        node: usize,
        definition: &'a FieldDefinition,
        field: &FieldSelection,
        path: &[PathSegment],
    ) -> Result<SelectionSet, PlanningError> {
        if field.selections.is_empty() {
            return Ok(SelectionSet::default());
        }

        let field_type = self.type_definition(definition.ty.named_type())?;
        let mut field_path = path.to_vec();
        field_path.push(PathSegment::Field(field.response_key().to_string()));
        field_path.extend(std::iter::repeat(PathSegment::List).take(definition.ty.list_depth()));

        self.plan_selection(subgraph, node, field_type, &field.selections, &field_path)
    }

    /// Picks the subgraph an entity fetch for `definition` goes to, together
    /// with the key `current` provides for it.
    fn entity_subgraph(
        &self,
        parent: &'a TypeDefinition,
        definition: &'a FieldDefinition,
        current: &str,
    ) -> Result<(&'a str, &'a FieldSet), PlanningError> {
        let mut bindings = definition.bindings.iter().collect::<Vec<_>>();
        bindings.sort_by_key(|binding| binding.priority);

        for binding in bindings {
            match binding.kind {
                BindingKind::Keyed => {}
                BindingKind::Local | BindingKind::Root => continue,
            }
            if binding.subgraph == current {
                continue;
            }

            let key = parent
                .keys()
                .iter()
                .filter(|key| key.subgraph == binding.subgraph)
                .find(|key| self.can_provide(parent, &key.fields, current));
            if let Some(key) = key {
                return Ok((binding.subgraph.as_str(), &key.fields));
            }
        }

        Err(PlanningError::UnresolvableField {
            type_name: parent.name.clone(),
            field_name: definition.name.clone(),
            reason: format!(
                "no subgraph resolving it accepts an entity key that \"{}\" provides",
                current
            ),
        })
    }

    fn can_provide(&self, parent: &TypeDefinition, key: &FieldSet, subgraph: &str) -> bool {
        key.iter().all(|item| {
            let Some(field) = parent.field(&item.name) else {
                return false;
            };
            if !field.is_resolvable_by(subgraph) {
                return false;
            }
            if item.selections.is_empty() {
                return true;
            }
            self.graph
                .type_definition(field.ty.named_type())
                .is_some_and(|nested| self.can_provide(nested, &item.selections, subgraph))
        })
    }

    /// Makes sure the key fields are part of `selection_set`, reusing fields
    /// the client already selected. A key whose name the client uses for
    /// something else is selected under an internal alias.
    fn add_key_fields(
        &self,
        selection_set: &mut SelectionSet,
        parent: &TypeDefinition,
        key: &FieldSet,
    ) -> Result<(), PlanningError> {
        for item in key.iter() {
            let response_key = match selection_set.field_by_response_key(&item.name) {
                Some(existing) if !is_plain_field(existing, &item.name) => {
                    key_field_alias(&item.name)
                }
                _ => item.name.clone(),
            };

            match selection_set.field_by_response_key_mut(&response_key) {
                Some(existing) if existing.name == item.name && existing.arguments.is_empty() => {
                    if item.selections.is_empty() {
                        continue;
                    }
                    let nested = parent
                        .field(&item.name)
                        .and_then(|field| self.graph.type_definition(field.ty.named_type()))
                        .ok_or_else(|| PlanningError::UnknownField {
                            type_name: parent.name.clone(),
                            field_name: item.name.clone(),
                        })?;
                    self.add_key_fields(&mut existing.selections, nested, &item.selections)?;
                }
                Some(_) => {
                    return Err(PlanningError::KeyFieldConflict {
                        type_name: parent.name.clone(),
                        field_name: item.name.clone(),
                    })
                }
                None => {
                    let mut selection = key_selection(item);
                    if response_key != item.name {
                        selection.alias = Some(response_key);
                    }
                    selection_set.push(Selection::Field(selection));
                }
            }
        }

        Ok(())
    }
}

fn is_plain_field(field: &FieldSelection, name: &str) -> bool {
    field.name == name && field.arguments.is_empty()
}

fn key_selection(item: &FieldSetItem) -> FieldSelection {
    FieldSelection {
        selections: SelectionSet {
            items: item
                .selections
                .iter()
                .map(|nested| Selection::Field(key_selection(nested)))
                .collect(),
        },
        ..FieldSelection::new(item.name.clone())
    }
}

fn finish_node(
    operation: &NormalizedOperation,
    id: usize,
    draft: NodeDraft<'_>,
) -> Result<PlanNode, PlanningError> {
    let usages = draft
        .selection
        .variable_usages()
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>();

    let mut definitions = vec![];
    if matches!(draft.kind, PlanNodeKind::Entity(_)) {
        definitions.push(format!("${}: [_Any!]!", REPRESENTATIONS_VARIABLE));
    }
    for name in &usages {
        let variable = operation
            .variable(name)
            .ok_or_else(|| PlanningError::UndefinedVariable(name.clone()))?;
        definitions.push(variable.to_string());
    }
    let definitions = if definitions.is_empty() {
        String::new()
    } else {
        format!("({})", definitions.join(", "))
    };

    let (operation_kind, document) = match &draft.kind {
        PlanNodeKind::Root => (
            operation.kind,
            format!("{}{} {}", operation.kind, definitions, draft.selection),
        ),
        PlanNodeKind::Entity(entity) => (
            OperationKind::Query,
            format!(
                "query{} {{ _entities(representations: ${}) {{ ... on {} {} }} }}",
                definitions, REPRESENTATIONS_VARIABLE, entity.type_name, draft.selection
            ),
        ),
    };

    Ok(PlanNode {
        id,
        subgraph: draft.subgraph.to_string(),
        operation_kind,
        kind: draft.kind,
        depends_on: draft.depends_on.into_iter().collect(),
        selection: draft.selection,
        operation: document,
        variable_usages: usages.into_iter().collect(),
        owned_fields: draft.owned_fields,
    })
}
