use crate::utils::cancellation::CancellationError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    #[error("failed to parse operation: {0}")]
    InvalidDocument(String),
    #[error("document does not contain an operation")]
    MissingOperation,
    #[error("document contains several operations, an operation name is required")]
    AmbiguousOperation,
    #[error("operation \"{0}\" is not defined in the document")]
    UnknownOperation(String),
    #[error("{0} operations are not supported")]
    UnsupportedOperation(String),
    #[error("schema does not define a {0} root type")]
    MissingRootType(String),
    #[error("fragment \"{0}\" is not defined")]
    UnknownFragment(String),
    #[error("fragment \"{0}\" spreads itself")]
    FragmentCycle(String),
    #[error("type \"{0}\" is not defined")]
    UnknownType(String),
    #[error("type \"{type_name}\" has no field \"{field_name}\"")]
    UnknownField {
        type_name: String,
        field_name: String,
    },
    #[error("field \"{type_name}.{field_name}\" {reason}")]
    InvalidSelection {
        type_name: String,
        field_name: String,
        reason: String,
    },
    #[error("fields selected as \"{response_key}\" cannot be merged: {reason}")]
    FieldConflict {
        response_key: String,
        reason: String,
    },
    #[error("variable \"${0}\" is not defined by the operation")]
    UndefinedVariable(String),
    #[error("invalid @{directive}: {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("field \"{type_name}.{field_name}\" cannot be resolved: {reason}")]
    UnresolvableField {
        type_name: String,
        field_name: String,
        reason: String,
    },
    #[error(
        "key field \"{type_name}.{field_name}\" is needed to fetch entities, but the selection uses all of its response keys for other fields"
    )]
    KeyFieldConflict {
        type_name: String,
        field_name: String,
    },
    #[error("query planning stopped: {0}")]
    Cancelled(#[from] CancellationError),
}

impl From<graphql_parser::query::ParseError> for PlanningError {
    fn from(value: graphql_parser::query::ParseError) -> Self {
        PlanningError::InvalidDocument(value.to_string())
    }
}
