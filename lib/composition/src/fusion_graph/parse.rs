use graphql_parser::schema::{
    Definition, Directive, Document, EnumType as ParserEnumType, Field as ParserField,
    InputValue, TypeDefinition as ParserTypeDefinition, Value,
};
use indexmap::IndexMap;

use super::{
    render::render_value, BindingKind, EntityKey, EnumType, EnumValueDefinition, FieldBinding,
    FieldDefinition, FieldSet, FieldSetError, FusionGraph, InputObjectType, InputValueDefinition,
    ObjectType, TypeDefinition, TypeKind, TypeRef, UnionType, FUSION_FORMAT_VERSION,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum FusionGraphParseError {
    #[error("failed to parse fusion graph document: {0}")]
    Syntax(String),
    #[error("fusion graph document has no schema definition with @fusion")]
    MissingSchemaDefinition,
    #[error("unsupported fusion graph format version {0}")]
    UnsupportedVersion(i64),
    #[error("invalid @{directive} on \"{location}\": {reason}")]
    InvalidDirective {
        directive: String,
        location: String,
        reason: String,
    },
    #[error(transparent)]
    InvalidKey(#[from] FieldSetError),
}

pub(super) fn parse_fusion_document(source: &str) -> Result<FusionGraph, FusionGraphParseError> {
    let document: Document<'_, String> = graphql_parser::parse_schema(source)
        .map_err(|err| FusionGraphParseError::Syntax(err.to_string()))?;

    let mut graph: Option<FusionGraph> = None;
    let mut types = IndexMap::new();

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(schema) => {
                let version = find_directive(&schema.directives, "fusion")
                    .ok_or(FusionGraphParseError::MissingSchemaDefinition)?;
                let version = int_argument(version, "version", "schema")?;
                if version != FUSION_FORMAT_VERSION {
                    return Err(FusionGraphParseError::UnsupportedVersion(version));
                }

                let subgraphs = schema
                    .directives
                    .iter()
                    .filter(|directive| directive.name == "subgraph")
                    .map(|directive| string_argument(directive, "name", "schema"))
                    .collect::<Result<Vec<_>, _>>()?;

                graph = Some(FusionGraph {
                    subgraphs,
                    query_type: schema.query.clone().unwrap_or_else(|| "Query".to_string()),
                    mutation_type: schema.mutation.clone(),
                    subscription_type: schema.subscription.clone(),
                    types: IndexMap::new(),
                });
            }
            Definition::TypeDefinition(type_definition) => {
                let parsed = parse_type_definition(type_definition)?;
                types.insert(parsed.name.clone(), parsed);
            }
            Definition::TypeExtension(_) | Definition::DirectiveDefinition(_) => {}
        }
    }

    let mut graph = graph.ok_or(FusionGraphParseError::MissingSchemaDefinition)?;
    graph.types = types;

    Ok(graph)
}

fn parse_type_definition(
    definition: &ParserTypeDefinition<'_, String>,
) -> Result<TypeDefinition, FusionGraphParseError> {
    let (name, description, directives, kind) = match definition {
        ParserTypeDefinition::Scalar(scalar) => (
            &scalar.name,
            &scalar.description,
            &scalar.directives,
            TypeKind::Scalar,
        ),
        ParserTypeDefinition::Object(object) => (
            &object.name,
            &object.description,
            &object.directives,
            TypeKind::Object(ObjectType {
                implements: object.implements_interfaces.clone(),
                keys: parse_keys(&object.name, &object.directives)?,
                fields: parse_fields(&object.name, &object.fields)?,
            }),
        ),
        ParserTypeDefinition::Interface(interface) => (
            &interface.name,
            &interface.description,
            &interface.directives,
            TypeKind::Interface(ObjectType {
                implements: interface.implements_interfaces.clone(),
                keys: vec![],
                fields: parse_fields(&interface.name, &interface.fields)?,
            }),
        ),
        ParserTypeDefinition::Union(union_type) => (
            &union_type.name,
            &union_type.description,
            &union_type.directives,
            TypeKind::Union(UnionType {
                members: union_type.types.clone(),
            }),
        ),
        ParserTypeDefinition::Enum(enum_type) => (
            &enum_type.name,
            &enum_type.description,
            &enum_type.directives,
            TypeKind::Enum(parse_enum_values(enum_type)?),
        ),
        ParserTypeDefinition::InputObject(input_object) => (
            &input_object.name,
            &input_object.description,
            &input_object.directives,
            TypeKind::InputObject(InputObjectType {
                fields: input_object
                    .fields
                    .iter()
                    .map(|field| (field.name.clone(), parse_input_value(field)))
                    .collect(),
            }),
        ),
    };

    Ok(TypeDefinition {
        name: name.clone(),
        description: description.clone(),
        sources: parse_sources(name, directives)?,
        kind,
    })
}

fn parse_fields(
    type_name: &str,
    fields: &[ParserField<'_, String>],
) -> Result<IndexMap<String, FieldDefinition>, FusionGraphParseError> {
    let mut parsed = IndexMap::with_capacity(fields.len());

    for field in fields {
        let location = format!("{}.{}", type_name, field.name);
        let mut bindings = field
            .directives
            .iter()
            .filter(|directive| directive.name == "resolve")
            .map(|directive| {
                let kind_name = enum_argument(directive, "kind", &location)?;
                let kind = BindingKind::from_name(&kind_name).ok_or_else(|| {
                    FusionGraphParseError::InvalidDirective {
                        directive: directive.name.clone(),
                        location: location.clone(),
                        reason: format!("unknown binding kind {}", kind_name),
                    }
                })?;
                let priority = int_argument(directive, "priority", &location)?;

                Ok(FieldBinding {
                    subgraph: string_argument(directive, "subgraph", &location)?,
                    kind,
                    priority: usize::try_from(priority).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, FusionGraphParseError>>()?;
        bindings.sort_by_key(|binding| binding.priority);

        parsed.insert(
            field.name.clone(),
            FieldDefinition {
                name: field.name.clone(),
                description: field.description.clone(),
                deprecation: deprecation_reason(&field.directives),
                arguments: field.arguments.iter().map(parse_input_value).collect(),
                ty: (&field.field_type).into(),
                bindings,
            },
        );
    }

    Ok(parsed)
}

fn parse_enum_values(
    enum_type: &ParserEnumType<'_, String>,
) -> Result<EnumType, FusionGraphParseError> {
    let mut values = IndexMap::with_capacity(enum_type.values.len());
    for value in &enum_type.values {
        let location = format!("{}.{}", enum_type.name, value.name);
        values.insert(
            value.name.clone(),
            EnumValueDefinition {
                name: value.name.clone(),
                description: value.description.clone(),
                deprecation: deprecation_reason(&value.directives),
                sources: parse_sources(&location, &value.directives)?,
            },
        );
    }

    Ok(EnumType { values })
}

fn parse_input_value(value: &InputValue<'_, String>) -> InputValueDefinition {
    InputValueDefinition {
        name: value.name.clone(),
        description: value.description.clone(),
        ty: TypeRef::from(&value.value_type),
        default_value: value.default_value.as_ref().map(render_value),
    }
}

fn parse_sources(
    location: &str,
    directives: &[Directive<'_, String>],
) -> Result<Vec<String>, FusionGraphParseError> {
    directives
        .iter()
        .filter(|directive| directive.name == "source")
        .map(|directive| string_argument(directive, "subgraph", location))
        .collect()
}

fn parse_keys(
    location: &str,
    directives: &[Directive<'_, String>],
) -> Result<Vec<EntityKey>, FusionGraphParseError> {
    directives
        .iter()
        .filter(|directive| directive.name == "key")
        .map(|directive| {
            Ok(EntityKey {
                subgraph: string_argument(directive, "subgraph", location)?,
                fields: FieldSet::parse(&string_argument(directive, "fields", location)?)?,
            })
        })
        .collect()
}

pub(crate) fn deprecation_reason(directives: &[Directive<'_, String>]) -> Option<String> {
    find_directive(directives, "deprecated").map(|directive| {
        directive
            .arguments
            .iter()
            .find(|(name, _)| name == "reason")
            .and_then(|(_, value)| match value {
                Value::String(reason) => Some(reason.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "No longer supported".to_string())
    })
}

pub(crate) fn find_directive<'d, 'a>(
    directives: &'d [Directive<'a, String>],
    name: &str,
) -> Option<&'d Directive<'a, String>> {
    directives.iter().find(|directive| directive.name == name)
}

fn argument<'d, 'a>(
    directive: &'d Directive<'a, String>,
    name: &str,
    location: &str,
) -> Result<&'d Value<'a, String>, FusionGraphParseError> {
    directive
        .arguments
        .iter()
        .find(|(argument_name, _)| argument_name == name)
        .map(|(_, value)| value)
        .ok_or_else(|| FusionGraphParseError::InvalidDirective {
            directive: directive.name.clone(),
            location: location.to_string(),
            reason: format!("missing argument \"{}\"", name),
        })
}

fn string_argument(
    directive: &Directive<'_, String>,
    name: &str,
    location: &str,
) -> Result<String, FusionGraphParseError> {
    match argument(directive, name, location)? {
        Value::String(value) => Ok(value.clone()),
        _ => Err(FusionGraphParseError::InvalidDirective {
            directive: directive.name.clone(),
            location: location.to_string(),
            reason: format!("argument \"{}\" must be a string", name),
        }),
    }
}

fn enum_argument(
    directive: &Directive<'_, String>,
    name: &str,
    location: &str,
) -> Result<String, FusionGraphParseError> {
    match argument(directive, name, location)? {
        Value::Enum(value) => Ok(value.clone()),
        _ => Err(FusionGraphParseError::InvalidDirective {
            directive: directive.name.clone(),
            location: location.to_string(),
            reason: format!("argument \"{}\" must be an enum value", name),
        }),
    }
}

fn int_argument(
    directive: &Directive<'_, String>,
    name: &str,
    location: &str,
) -> Result<i64, FusionGraphParseError> {
    match argument(directive, name, location)? {
        Value::Int(value) => value
            .as_i64()
            .ok_or_else(|| FusionGraphParseError::InvalidDirective {
                directive: directive.name.clone(),
                location: location.to_string(),
                reason: format!("argument \"{}\" is out of range", name),
            }),
        _ => Err(FusionGraphParseError::InvalidDirective {
            directive: directive.name.clone(),
            location: location.to_string(),
            reason: format!("argument \"{}\" must be an integer", name),
        }),
    }
}
