use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use fusion_composition::fusion_graph::FieldSet;
use serde::{Deserialize, Serialize};

use crate::ast::operation::{OperationKind, VariableDefinition};
use crate::ast::selection_set::SelectionSet;
use crate::planner::projection::ProjectionField;
use crate::utils::pretty_display::{get_indent, PrettyDisplay};

/// Name of the variable carrying entity representations.
pub const REPRESENTATIONS_VARIABLE: &str = "representations";

/// Response key of a key field the planner had to add next to a client field
/// that already uses the key's name.
pub fn key_field_alias(field_name: &str) -> String {
    format!("__key_{}", field_name)
}

/// A directed acyclic graph of subgraph fetches plus the shape of the client
/// response.
///
/// Nodes are stored in topological order: a node only depends on nodes with a
/// smaller id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub operation_kind: OperationKind,
    pub root_type: String,
    pub nodes: Vec<PlanNode>,
    pub variables: Vec<VariableDefinition>,
    pub projection: Vec<ProjectionField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    pub id: usize,
    pub subgraph: String,
    pub operation_kind: OperationKind,
    pub kind: PlanNodeKind,
    pub depends_on: Vec<usize>,
    /// Selection sent to the subgraph, relative to the root type or to the
    /// entity type.
    pub selection: SelectionSet,
    /// The complete document sent to the subgraph.
    pub operation: String,
    /// Client variables forwarded with the request.
    pub variable_usages: Vec<String>,
    /// Response keys of the client fields this node resolves at its merge
    /// position.
    pub owned_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PlanNodeKind {
    /// A fetch against the subgraph's root type; data merges at the response root.
    Root,
    /// An `_entities` fetch for the objects found at `path`.
    Entity(EntityFetch),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFetch {
    pub type_name: String,
    pub path: Vec<PathSegment>,
    /// Key fields read from each object to build its representation.
    pub key: FieldSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    Field(String),
    /// Every item of a list.
    List,
}

impl QueryPlan {
    pub fn node(&self, id: usize) -> Option<&PlanNode> {
        self.nodes.get(id)
    }

    /// Ids of the nodes that depend on nothing and can start right away.
    pub fn entry_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.depends_on.is_empty())
            .map(|node| node.id)
    }
}

impl PlanNode {
    pub fn entity(&self) -> Option<&EntityFetch> {
        match &self.kind {
            PlanNodeKind::Root => None,
            PlanNodeKind::Entity(entity) => Some(entity),
        }
    }
}

pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Field(name) => name.as_str(),
            PathSegment::List => "@",
        })
        .collect::<Vec<_>>()
        .join(".")
}

impl PrettyDisplay for QueryPlan {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}QueryPlan {{")?;
        for node in &self.nodes {
            node.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{indent}}},")
    }
}

impl PrettyDisplay for PlanNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        match &self.kind {
            PlanNodeKind::Root => {
                write!(f, "{indent}Fetch(id: {}, service: {:?}", self.id, self.subgraph)?;
                if self.operation_kind == OperationKind::Mutation {
                    write!(f, ", kind: mutation")?;
                }
                if !self.depends_on.is_empty() {
                    write!(f, ", depends_on: {:?}", self.depends_on)?;
                }
                writeln!(f, ") {{")?;
                writeln!(f, "{indent}  {}", self.selection)?;
                writeln!(f, "{indent}}},")
            }
            PlanNodeKind::Entity(entity) => {
                writeln!(
                    f,
                    "{indent}Flatten(path: \"{}\", depends_on: {:?}) {{",
                    display_path(&entity.path),
                    self.depends_on
                )?;
                writeln!(
                    f,
                    "{indent}  Fetch(id: {}, service: {:?}) {{",
                    self.id, self.subgraph
                )?;
                writeln!(
                    f,
                    "{indent}    {{ ... on {} {{ {} }} }} =>",
                    entity.type_name, entity.key
                )?;
                writeln!(
                    f,
                    "{indent}    {{ ... on {} {} }}",
                    entity.type_name, self.selection
                )?;
                writeln!(f, "{indent}  }},")?;
                writeln!(f, "{indent}}},")
            }
        }
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}
