use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use graphql_parser::query::Value as ParserValue;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Collects the names of variables referenced anywhere in the value.
    pub fn variable_usages<'a>(&'a self, usages: &mut Vec<&'a str>) {
        match self {
            Value::Variable(name) => usages.push(name),
            Value::List(items) => items.iter().for_each(|item| item.variable_usages(usages)),
            Value::Object(fields) => fields
                .values()
                .for_each(|value| value.variable_usages(usages)),
            _ => {}
        }
    }

    /// JSON form of a constant value; `None` if it references a variable.
    pub fn to_json(&self) -> Option<JsonValue> {
        Some(match self {
            Value::Variable(_) => return None,
            Value::Int(value) => JsonValue::from(*value),
            Value::Float(value) => JsonValue::from(*value),
            Value::String(value) | Value::Enum(value) => JsonValue::String(value.clone()),
            Value::Boolean(value) => JsonValue::Bool(*value),
            Value::Null => JsonValue::Null,
            Value::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| value.to_json().map(|value| (name.clone(), value)))
                    .collect::<Option<_>>()?,
            ),
        })
    }
}

impl From<&ParserValue<'_, String>> for Value {
    fn from(value: &ParserValue<'_, String>) -> Self {
        match value {
            ParserValue::Variable(name) => Value::Variable(name.to_owned()),
            ParserValue::Int(i) => i.as_i64().map(Value::Int).unwrap_or(Value::Null),
            ParserValue::Float(f) => Value::Float(f.to_owned()),
            ParserValue::String(s) => Value::String(s.to_owned()),
            ParserValue::Boolean(b) => Value::Boolean(b.to_owned()),
            ParserValue::Null => Value::Null,
            ParserValue::Enum(e) => Value::Enum(e.to_owned()),
            ParserValue::List(l) => Value::List(l.iter().map(Value::from).collect()),
            ParserValue::Object(o) => {
                let mut map = BTreeMap::new();
                for (k, v) in o {
                    map.insert(k.to_string(), Value::from(v));
                }
                Value::Object(map)
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::String(value) => write_quoted(f, value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Enum(value) => write!(f, "{}", value),
            Value::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (index, (name, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_quoted(f: &mut Formatter<'_>, value: &str) -> FmtResult {
    write!(f, "\"")?;
    for c in value.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::Value;

    #[test]
    fn prints_graphql_literals() {
        let value = Value::Object(BTreeMap::from([
            ("term".to_string(), Value::String("say \"hi\"".to_string())),
            (
                "ids".to_string(),
                Value::List(vec![Value::Int(1), Value::Variable("next".to_string())]),
            ),
            ("order".to_string(), Value::Enum("DESC".to_string())),
        ]));

        insta::assert_snapshot!(value, @r###"{ids: [1, $next], order: DESC, term: "say \"hi\""}"###);
    }

    #[test]
    fn variables_have_no_json_form() {
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Null]).to_json(),
            Some(serde_json::json!([1, null]))
        );
        assert_eq!(Value::Variable("id".to_string()).to_json(), None);
    }
}
