use fusion_composition::fusion_graph::TypeRef;
use fusion_composition::FusionGraph;
use serde::{Deserialize, Serialize};

use crate::ast::selection_set::{Selection, SelectionSet};
use crate::planner::error::PlanningError;

/// One field of the client response, with the type information needed to
/// shape subgraph data and to propagate nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionField {
    pub response_key: String,
    pub name: String,
    pub ty: TypeRef,
    /// Type the field is selected on; answers `__typename` when the data
    /// does not carry it.
    pub parent_type: String,
    /// Only applies to objects whose `__typename` equals this object type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_condition: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub selections: Vec<ProjectionField>,
}

impl ProjectionField {
    pub fn is_typename(&self) -> bool {
        self.name == "__typename"
    }

    pub fn applies_to(&self, type_name: Option<&str>) -> bool {
        match (&self.type_condition, type_name) {
            (None, _) => true,
            (Some(condition), Some(type_name)) => condition == type_name,
            (Some(_), None) => false,
        }
    }
}

/// Builds the projection for a normalized selection under `parent_type`.
pub(crate) fn build_projection(
    graph: &FusionGraph,
    parent_type: &str,
    selection_set: &SelectionSet,
) -> Result<Vec<ProjectionField>, PlanningError> {
    let mut fields = vec![];
    collect(graph, parent_type, None, selection_set, &mut fields)?;
    Ok(fields)
}

fn collect(
    graph: &FusionGraph,
    parent_type: &str,
    type_condition: Option<&str>,
    selection_set: &SelectionSet,
    fields: &mut Vec<ProjectionField>,
) -> Result<(), PlanningError> {
    let parent = graph
        .type_definition(parent_type)
        .ok_or_else(|| PlanningError::UnknownType(parent_type.to_string()))?;

    for item in &selection_set.items {
        match item {
            Selection::Field(field) if field.is_typename() => fields.push(ProjectionField {
                response_key: field.response_key().to_string(),
                name: field.name.clone(),
                ty: TypeRef::named("String").non_null(),
                parent_type: parent_type.to_string(),
                type_condition: type_condition.map(str::to_string),
                selections: vec![],
            }),
            Selection::Field(field) => {
                let definition =
                    parent
                        .field(&field.name)
                        .ok_or_else(|| PlanningError::UnknownField {
                            type_name: parent_type.to_string(),
                            field_name: field.name.clone(),
                        })?;
                let selections = if field.selections.is_empty() {
                    vec![]
                } else {
                    build_projection(graph, definition.ty.named_type(), &field.selections)?
                };
                fields.push(ProjectionField {
                    response_key: field.response_key().to_string(),
                    name: field.name.clone(),
                    ty: definition.ty.clone(),
                    parent_type: parent_type.to_string(),
                    type_condition: type_condition.map(str::to_string),
                    selections,
                });
            }
            Selection::InlineFragment(fragment) => collect(
                graph,
                &fragment.type_condition,
                Some(&fragment.type_condition),
                &fragment.selections,
                fields,
            )?,
        }
    }

    Ok(())
}
