use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::ast::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub arguments: Vec<(String, Value)>,
    #[serde(skip_serializing_if = "SelectionSet::is_empty", default)]
    pub selections: SelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragmentSelection {
    pub type_condition: String,
    pub selections: SelectionSet,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, selection: Selection) {
        self.items.push(selection);
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSelection> {
        self.items.iter().filter_map(|item| match item {
            Selection::Field(field) => Some(field),
            Selection::InlineFragment(_) => None,
        })
    }

    pub fn field_by_response_key(&self, response_key: &str) -> Option<&FieldSelection> {
        self.fields()
            .find(|field| field.response_key() == response_key)
    }

    pub fn field_by_response_key_mut(&mut self, response_key: &str) -> Option<&mut FieldSelection> {
        self.items.iter_mut().find_map(|item| match item {
            Selection::Field(field) if field.response_key() == response_key => Some(field),
            _ => None,
        })
    }

    /// Names of every variable referenced by arguments in this selection.
    pub fn variable_usages(&self) -> Vec<&str> {
        let mut usages = Vec::new();
        self.collect_variable_usages(&mut usages);
        usages
    }

    fn collect_variable_usages<'a>(&'a self, usages: &mut Vec<&'a str>) {
        for item in &self.items {
            match item {
                Selection::Field(field) => {
                    for (_, value) in &field.arguments {
                        value.variable_usages(usages);
                    }
                    field.selections.collect_variable_usages(usages);
                }
                Selection::InlineFragment(fragment) => {
                    fragment.selections.collect_variable_usages(usages)
                }
            }
        }
    }
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        FieldSelection {
            name: name.into(),
            alias: None,
            arguments: vec![],
            selections: SelectionSet::default(),
        }
    }

    /// The key under which the field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_typename(&self) -> bool {
        self.name == "__typename"
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.items.is_empty() {
            return Ok(());
        }

        write!(f, "{{")?;
        for item in &self.items {
            write!(f, " {}", item)?;
        }
        write!(f, " }}")
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Selection::Field(field) => write!(f, "{}", field),
            Selection::InlineFragment(fragment) => write!(f, "{}", fragment),
        }
    }
}

impl Display for FieldSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(alias) = &self.alias {
            write!(f, "{}: ", alias)?;
        }
        write!(f, "{}", self.name)?;

        if !self.arguments.is_empty() {
            write!(f, "(")?;
            for (index, (name, value)) in self.arguments.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            write!(f, ")")?;
        }

        if !self.selections.is_empty() {
            write!(f, " {}", self.selections)?;
        }

        Ok(())
    }
}

impl Display for InlineFragmentSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "... on {} {}", self.type_condition, self.selections)
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldSelection, InlineFragmentSelection, Selection, SelectionSet};
    use crate::ast::value::Value;

    #[test]
    fn prints_nested_selections() {
        let mut user = FieldSelection::new("user");
        user.arguments
            .push(("id".to_string(), Value::Variable("id".to_string())));
        user.selections.push(Selection::Field(FieldSelection {
            alias: Some("displayName".to_string()),
            ..FieldSelection::new("name")
        }));
        user.selections
            .push(Selection::InlineFragment(InlineFragmentSelection {
                type_condition: "Admin".to_string(),
                selections: SelectionSet {
                    items: vec![Selection::Field(FieldSelection::new("level"))],
                },
            }));

        let selection_set = SelectionSet {
            items: vec![Selection::Field(user)],
        };

        insta::assert_snapshot!(selection_set, @"{ user(id: $id) { displayName: name ... on Admin { level } } }");
        assert_eq!(selection_set.variable_usages(), vec!["id"]);
    }
}
