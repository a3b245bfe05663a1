use std::fmt::{Display, Formatter, Result as FmtResult};

use graphql_parser::schema::Type as ParserType;
use serde::{Deserialize, Serialize};

/// A wrapped GraphQL type reference, e.g. `[Review!]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn non_null(self) -> Self {
        match self {
            TypeRef::NonNull(_) => self,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    pub fn list(self) -> Self {
        TypeRef::List(Box::new(self))
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// Strips an outer non-null wrapper, if any.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    /// How many list wrappers surround the named type.
    pub fn list_depth(&self) -> usize {
        match self {
            TypeRef::Named(_) => 0,
            TypeRef::NonNull(inner) => inner.list_depth(),
            TypeRef::List(inner) => 1 + inner.list_depth(),
        }
    }

    /// Merges two output types declared by different subgraphs.
    ///
    /// Both must wrap the same named type in the same list structure; where the
    /// nullability differs, the merged type is nullable at that position.
    pub fn merge_output(&self, other: &TypeRef) -> Option<TypeRef> {
        match (self, other) {
            (TypeRef::NonNull(left), TypeRef::NonNull(right)) => {
                left.merge_output(right).map(TypeRef::non_null)
            }
            (TypeRef::NonNull(left), right) => left.merge_output(right),
            (left, TypeRef::NonNull(right)) => left.merge_output(right),
            (TypeRef::List(left), TypeRef::List(right)) => left.merge_output(right).map(TypeRef::list),
            (TypeRef::Named(left), TypeRef::Named(right)) if left == right => {
                Some(TypeRef::Named(left.clone()))
            }
            _ => None,
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

impl From<&ParserType<'_, String>> for TypeRef {
    fn from(value: &ParserType<'_, String>) -> Self {
        match value {
            ParserType::NamedType(name) => TypeRef::Named(name.clone()),
            ParserType::ListType(inner) => TypeRef::List(Box::new(inner.as_ref().into())),
            ParserType::NonNullType(inner) => TypeRef::NonNull(Box::new(inner.as_ref().into())),
        }
    }
}
