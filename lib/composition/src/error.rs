use std::fmt::{Display, Formatter, Result as FmtResult};

/// A problem that makes a set of subgraphs impossible to compose.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error("[{subgraph}] failed to parse {document}: {message}")]
    InvalidDocument {
        subgraph: String,
        document: String,
        message: String,
    },
    #[error("subgraph \"{0}\" is declared more than once")]
    DuplicateSubgraph(String),
    #[error("[{subgraph}] cannot extend type \"{type_name}\": {reason}")]
    UnresolvedExtension {
        subgraph: String,
        type_name: String,
        reason: String,
    },
    #[error(
        "type \"{type_name}\" is declared with incompatible kinds: {}",
        format_declarations(declarations)
    )]
    TypeKindConflict {
        type_name: String,
        declarations: Vec<(String, String)>,
    },
    #[error(
        "field \"{type_name}.{field_name}\" has incompatible types across subgraphs: {}",
        format_declarations(declarations)
    )]
    FieldTypeMismatch {
        type_name: String,
        field_name: String,
        declarations: Vec<(String, String)>,
    },
    #[error(
        "argument \"{type_name}.{field_name}({argument_name}:)\" has incompatible types across subgraphs: {}",
        format_declarations(declarations)
    )]
    ArgumentTypeMismatch {
        type_name: String,
        field_name: String,
        argument_name: String,
        declarations: Vec<(String, String)>,
    },
    #[error("[{subgraph}] invalid key \"{fields}\" on type \"{type_name}\": {reason}")]
    InvalidKey {
        subgraph: String,
        type_name: String,
        fields: String,
        reason: String,
    },
    #[error("none of the subgraphs declares a query root type")]
    MissingQueryType,
}

fn format_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(subgraph, declared)| format!("{} in {}", declared, subgraph))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every error found while composing; composition never stops at the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionErrors(Vec<CompositionError>);

impl CompositionErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositionError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<CompositionError> {
        self.0
    }

    pub(crate) fn push(&mut self, error: CompositionError) {
        self.0.push(error);
    }

    pub(crate) fn extend(&mut self, errors: impl IntoIterator<Item = CompositionError>) {
        self.0.extend(errors);
    }
}

impl Display for CompositionErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "composition failed with {} error(s):", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositionErrors {}

impl IntoIterator for CompositionErrors {
    type Item = CompositionError;
    type IntoIter = std::vec::IntoIter<CompositionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
