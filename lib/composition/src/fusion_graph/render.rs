use std::fmt::Write;

use graphql_parser::schema::Value;

use super::{
    EnumType, FieldDefinition, FusionGraph, InputValueDefinition, ObjectType, TypeDefinition,
    TypeKind, FUSION_FORMAT_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RenderMode {
    FusionGraph,
    ClientSchema,
}

impl RenderMode {
    fn with_bindings(&self) -> bool {
        matches!(self, RenderMode::FusionGraph)
    }
}

pub(super) fn render(graph: &FusionGraph, mode: RenderMode) -> String {
    let mut out = String::new();
    let mut blocks = Vec::with_capacity(graph.types.len() + 1);

    if let Some(schema_block) = render_schema_definition(graph, mode) {
        blocks.push(schema_block);
    }

    for definition in graph.types.values() {
        blocks.push(render_type(definition, mode));
    }

    for (index, block) in blocks.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(block);
    }

    out
}

fn render_schema_definition(graph: &FusionGraph, mode: RenderMode) -> Option<String> {
    let canonical_roots = graph.query_type == "Query"
        && graph.mutation_type.as_deref().unwrap_or("Mutation") == "Mutation"
        && graph.subscription_type.as_deref().unwrap_or("Subscription") == "Subscription";

    if !mode.with_bindings() && canonical_roots {
        return None;
    }

    let mut out = String::from("schema");
    if mode.with_bindings() {
        let _ = write!(out, " @fusion(version: {})", FUSION_FORMAT_VERSION);
        for subgraph in &graph.subgraphs {
            let _ = write!(out, " @subgraph(name: {})", render_string(subgraph));
        }
    }
    out.push_str(" {\n");
    let _ = writeln!(out, "  query: {}", graph.query_type);
    if let Some(mutation) = &graph.mutation_type {
        let _ = writeln!(out, "  mutation: {}", mutation);
    }
    if let Some(subscription) = &graph.subscription_type {
        let _ = writeln!(out, "  subscription: {}", subscription);
    }
    out.push_str("}\n");

    Some(out)
}

fn render_type(definition: &TypeDefinition, mode: RenderMode) -> String {
    let mut out = String::new();
    render_description(&mut out, definition.description.as_deref(), "");

    let keyword = match &definition.kind {
        TypeKind::Scalar => "scalar",
        TypeKind::Object(_) => "type",
        TypeKind::Interface(_) => "interface",
        TypeKind::Union(_) => "union",
        TypeKind::Enum(_) => "enum",
        TypeKind::InputObject(_) => "input",
    };
    let _ = write!(out, "{} {}", keyword, definition.name);

    if let TypeKind::Object(object) | TypeKind::Interface(object) = &definition.kind {
        if !object.implements.is_empty() {
            let _ = write!(out, " implements {}", object.implements.join(" & "));
        }
    }

    if mode.with_bindings() {
        render_sources(&mut out, &definition.sources);
        for key in definition.keys() {
            let _ = write!(
                out,
                " @key(subgraph: {}, fields: {})",
                render_string(&key.subgraph),
                render_string(&key.fields.to_string())
            );
        }
    }

    match &definition.kind {
        TypeKind::Scalar => out.push('\n'),
        TypeKind::Object(object) | TypeKind::Interface(object) => {
            render_fields(&mut out, object, mode);
        }
        TypeKind::Union(union_type) => {
            if !union_type.members.is_empty() {
                let _ = write!(out, " = {}", union_type.members.join(" | "));
            }
            out.push('\n');
        }
        TypeKind::Enum(enum_type) => render_enum_values(&mut out, enum_type, mode),
        TypeKind::InputObject(input_object) => {
            if input_object.fields.is_empty() {
                out.push('\n');
            } else {
                out.push_str(" {\n");
                for field in input_object.fields.values() {
                    render_description(&mut out, field.description.as_deref(), "  ");
                    let _ = writeln!(out, "  {}", render_input_value(field));
                }
                out.push_str("}\n");
            }
        }
    }

    out
}

fn render_fields(out: &mut String, object: &ObjectType, mode: RenderMode) {
    if object.fields.is_empty() {
        out.push('\n');
        return;
    }

    out.push_str(" {\n");
    for field in object.fields.values() {
        render_field(out, field, mode);
    }
    out.push_str("}\n");
}

fn render_field(out: &mut String, field: &FieldDefinition, mode: RenderMode) {
    render_description(out, field.description.as_deref(), "  ");
    let _ = write!(out, "  {}", field.name);

    if !field.arguments.is_empty() {
        let arguments = field
            .arguments
            .iter()
            .map(|argument| {
                let mut rendered = String::new();
                if let Some(description) = &argument.description {
                    let _ = write!(rendered, "{} ", render_string(description));
                }
                rendered.push_str(&render_input_value(argument));
                rendered
            })
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "({})", arguments);
    }

    let _ = write!(out, ": {}", field.ty);
    render_deprecation(out, field.deprecation.as_deref());

    if mode.with_bindings() {
        for binding in &field.bindings {
            let _ = write!(
                out,
                " @resolve(subgraph: {}, kind: {}, priority: {})",
                render_string(&binding.subgraph),
                binding.kind.as_str(),
                binding.priority
            );
        }
    }

    out.push('\n');
}

fn render_enum_values(out: &mut String, enum_type: &EnumType, mode: RenderMode) {
    if enum_type.values.is_empty() {
        out.push('\n');
        return;
    }

    out.push_str(" {\n");
    for value in enum_type.values.values() {
        render_description(out, value.description.as_deref(), "  ");
        let _ = write!(out, "  {}", value.name);
        render_deprecation(out, value.deprecation.as_deref());
        if mode.with_bindings() {
            render_sources(out, &value.sources);
        }
        out.push('\n');
    }
    out.push_str("}\n");
}

fn render_input_value(value: &InputValueDefinition) -> String {
    match &value.default_value {
        Some(default_value) => format!("{}: {} = {}", value.name, value.ty, default_value),
        None => format!("{}: {}", value.name, value.ty),
    }
}

fn render_sources(out: &mut String, sources: &[String]) {
    for source in sources {
        let _ = write!(out, " @source(subgraph: {})", render_string(source));
    }
}

fn render_deprecation(out: &mut String, deprecation: Option<&str>) {
    if let Some(reason) = deprecation {
        let _ = write!(out, " @deprecated(reason: {})", render_string(reason));
    }
}

fn render_description(out: &mut String, description: Option<&str>, indent: &str) {
    if let Some(description) = description {
        let _ = writeln!(out, "{}{}", indent, render_string(description));
    }
}

/// Renders a GraphQL string literal.
pub(crate) fn render_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders a GraphQL value literal, e.g. a default value.
pub(crate) fn render_value(value: &Value<'_, String>) -> String {
    match value {
        Value::Variable(name) => format!("${}", name),
        Value::Int(number) => number
            .as_i64()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "0".to_string()),
        Value::Float(number) => {
            let rendered = number.to_string();
            if rendered.contains(['.', 'e', 'E']) {
                rendered
            } else {
                format!("{}.0", rendered)
            }
        }
        Value::String(text) => render_string(text),
        Value::Boolean(flag) => flag.to_string(),
        Value::Null => "null".to_string(),
        Value::Enum(name) => name.clone(),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(name, value)| format!("{}: {}", name, render_value(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
