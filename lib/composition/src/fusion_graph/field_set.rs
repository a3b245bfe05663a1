use std::fmt::{Display, Formatter, Result as FmtResult};

use graphql_parser::query::{Definition, OperationDefinition, Selection, SelectionSet};
use serde::{Deserialize, Serialize};

/// The selection used as an entity key, e.g. `id` or `id organization { id }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSet {
    pub items: Vec<FieldSetItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSetItem {
    pub name: String,
    pub selections: FieldSet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldSetError {
    #[error("failed to parse field set \"{0}\": {1}")]
    Parse(String, String),
    #[error("field set \"{0}\" is empty")]
    Empty(String),
    #[error("field set \"{0}\" may only contain plain fields (no aliases, arguments or fragments)")]
    Unsupported(String),
}

impl FieldSet {
    pub fn parse(source: &str) -> Result<Self, FieldSetError> {
        let wrapped = format!("{{ {} }}", source);
        let document = graphql_parser::parse_query::<String>(&wrapped)
            .map_err(|err| FieldSetError::Parse(source.to_string(), err.to_string()))?;

        let selection_set = match document.definitions.first() {
            Some(Definition::Operation(OperationDefinition::SelectionSet(selection_set))) => {
                selection_set
            }
            _ => return Err(FieldSetError::Unsupported(source.to_string())),
        };

        let field_set = Self::from_selection_set(source, selection_set)?;
        if field_set.items.is_empty() {
            return Err(FieldSetError::Empty(source.to_string()));
        }

        Ok(field_set)
    }

    fn from_selection_set(
        source: &str,
        selection_set: &SelectionSet<'_, String>,
    ) -> Result<Self, FieldSetError> {
        let mut items = Vec::with_capacity(selection_set.items.len());
        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) if field.alias.is_none() && field.arguments.is_empty() => {
                    items.push(FieldSetItem {
                        name: field.name.clone(),
                        selections: Self::from_selection_set(source, &field.selection_set)?,
                    });
                }
                _ => return Err(FieldSetError::Unsupported(source.to_string())),
            }
        }

        Ok(FieldSet { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSetItem> {
        self.items.iter()
    }
}

impl Display for FieldSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", item.name)?;
            if !item.selections.is_empty() {
                write!(f, " {{ {} }}", item.selections)?;
            }
        }

        Ok(())
    }
}
