use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ast::selection_set::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    /// The declared type as written, e.g. `[ID!]!`.
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
}

impl Display for VariableDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "${}: {}", self.name, self.ty)
    }
}

/// The selected operation with fragments inlined, conditional directives
/// applied and fields merged by response key.
///
/// Under object types the selection only contains fields. Under abstract types
/// it contains the fields of the abstract type followed by one inline fragment
/// per concrete object type.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOperation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub root_type: String,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

impl NormalizedOperation {
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|variable| variable.name == name)
    }
}
