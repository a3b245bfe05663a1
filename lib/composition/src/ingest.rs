use std::collections::HashMap;

use graphql_parser::schema::{
    Definition, Directive, Document, EnumValue as ParserEnumValue, Field as ParserField,
    InputValue, TypeDefinition as ParserTypeDefinition, TypeExtension, Value,
};
use indexmap::IndexMap;

use crate::error::CompositionError;
use crate::fusion_graph::{
    deprecation_reason, find_directive, is_builtin_scalar, render_value, FieldSet, FieldSetItem,
    InputValueDefinition, TypeRef,
};
use crate::subgraph::SubgraphConfiguration;

const INTERNAL_TYPES: [&str; 4] = ["_Any", "_Entity", "_Service", "_FieldSet"];
const INTERNAL_FIELDS: [&str; 2] = ["_entities", "_service"];

/// One subgraph's schema after its extensions were applied, with the root
/// operation types renamed to `Query`, `Mutation` and `Subscription`.
#[derive(Debug, Clone)]
pub(crate) struct SubgraphSchema {
    pub name: String,
    pub has_mutation: bool,
    pub has_subscription: bool,
    pub types: IndexMap<String, SubgraphType>,
}

#[derive(Debug, Clone)]
pub(crate) struct SubgraphType {
    pub description: Option<String>,
    pub kind: SubgraphTypeKind,
}

#[derive(Debug, Clone)]
pub(crate) enum SubgraphTypeKind {
    Scalar,
    Object(SubgraphObject),
    Interface(SubgraphObject),
    Union(Vec<String>),
    Enum(IndexMap<String, SubgraphEnumValue>),
    InputObject(IndexMap<String, InputValueDefinition>),
}

impl SubgraphTypeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SubgraphTypeKind::Scalar => "scalar",
            SubgraphTypeKind::Object(_) => "object",
            SubgraphTypeKind::Interface(_) => "interface",
            SubgraphTypeKind::Union(_) => "union",
            SubgraphTypeKind::Enum(_) => "enum",
            SubgraphTypeKind::InputObject(_) => "input object",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SubgraphObject {
    pub implements: Vec<String>,
    pub keys: Vec<FieldSet>,
    pub fields: IndexMap<String, SubgraphField>,
    raw_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SubgraphField {
    pub description: Option<String>,
    pub deprecation: Option<String>,
    pub arguments: Vec<InputValueDefinition>,
    pub ty: TypeRef,
    pub priority: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct SubgraphEnumValue {
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

struct Ingest<'c> {
    subgraph: &'c str,
    roots: HashMap<String, &'static str>,
    types: IndexMap<String, SubgraphType>,
    errors: Vec<CompositionError>,
}

/// Parses the schema and extension documents of one subgraph.
///
/// Only an unparseable schema document stops ingestion. Other problems are
/// returned next to the schema built from everything that could be applied,
/// so composition still reports conflicts with other subgraphs.
///
/// Extension documents may only extend types declared by the schema document
/// or by an earlier extension document.
pub(crate) fn ingest_subgraph(
    config: &SubgraphConfiguration,
) -> Result<(SubgraphSchema, Vec<CompositionError>), CompositionError> {
    let schema = parse_document(&config.name, "schema", &config.schema)?;

    let mut extension_documents = Vec::with_capacity(config.extensions.len());
    let mut errors = Vec::new();
    for (index, extension) in config.extensions.iter().enumerate() {
        match parse_document(&config.name, &format!("extension {}", index), extension) {
            Ok(document) => extension_documents.push(document),
            Err(error) => errors.push(error),
        }
    }

    let mut ingest = Ingest {
        subgraph: &config.name,
        roots: root_type_names(std::iter::once(&schema).chain(extension_documents.iter())),
        types: IndexMap::new(),
        errors,
    };

    ingest.add_schema_document(&schema);
    for document in &extension_documents {
        ingest.add_extension_document(document);
    }
    ingest.validate_keys();

    let schema = SubgraphSchema {
        name: config.name.clone(),
        has_mutation: ingest.types.contains_key("Mutation"),
        has_subscription: ingest.types.contains_key("Subscription"),
        types: ingest.types,
    };

    Ok((schema, ingest.errors))
}

fn parse_document<'a>(
    subgraph: &str,
    label: &str,
    source: &'a str,
) -> Result<Document<'a, String>, CompositionError> {
    graphql_parser::parse_schema::<String>(source).map_err(|err| CompositionError::InvalidDocument {
        subgraph: subgraph.to_string(),
        document: label.to_string(),
        message: err.to_string(),
    })
}

/// Maps the declared root operation type names to their canonical names.
fn root_type_names<'d, 'a: 'd>(
    documents: impl Iterator<Item = &'d Document<'a, String>>,
) -> HashMap<String, &'static str> {
    let mut roots = HashMap::new();
    for document in documents {
        for definition in &document.definitions {
            if let Definition::SchemaDefinition(schema) = definition {
                if let Some(query) = &schema.query {
                    roots.insert(query.clone(), "Query");
                }
                if let Some(mutation) = &schema.mutation {
                    roots.insert(mutation.clone(), "Mutation");
                }
                if let Some(subscription) = &schema.subscription {
                    roots.insert(subscription.clone(), "Subscription");
                }
            }
        }
    }

    roots
}

fn is_internal_type(name: &str) -> bool {
    name.starts_with("__")
        || is_builtin_scalar(name)
        || INTERNAL_TYPES.contains(&name)
}

impl Ingest<'_> {
    fn rename(&self, name: &str) -> String {
        self.roots
            .get(name)
            .map(|canonical| canonical.to_string())
            .unwrap_or_else(|| name.to_string())
    }

    fn rename_type_ref(&self, ty: TypeRef) -> TypeRef {
        match ty {
            TypeRef::Named(name) => TypeRef::Named(self.rename(&name)),
            TypeRef::List(inner) => TypeRef::List(Box::new(self.rename_type_ref(*inner))),
            TypeRef::NonNull(inner) => TypeRef::NonNull(Box::new(self.rename_type_ref(*inner))),
        }
    }

    fn add_schema_document(&mut self, document: &Document<'_, String>) {
        for definition in &document.definitions {
            if let Definition::TypeDefinition(type_definition) = definition {
                self.add_type_definition(type_definition);
            }
        }

        // Extensions inside the schema document itself may stand in for a
        // definition when the type is owned by another subgraph.
        for definition in &document.definitions {
            if let Definition::TypeExtension(extension) = definition {
                let name = self.rename(extension_name(extension));
                if !self.types.contains_key(&name) && !is_internal_type(&name) {
                    self.types.insert(
                        name,
                        SubgraphType {
                            description: None,
                            kind: empty_kind(extension),
                        },
                    );
                }
                self.apply_extension(extension);
            }
        }
    }

    fn add_extension_document(&mut self, document: &Document<'_, String>) {
        for definition in &document.definitions {
            match definition {
                Definition::TypeExtension(extension) => self.apply_extension(extension),
                Definition::TypeDefinition(type_definition) => {
                    self.add_type_definition(type_definition)
                }
                Definition::SchemaDefinition(_) | Definition::DirectiveDefinition(_) => {}
            }
        }
    }

    fn add_type_definition(&mut self, definition: &ParserTypeDefinition<'_, String>) {
        let (name, description, kind) = match definition {
            ParserTypeDefinition::Scalar(scalar) => {
                (&scalar.name, &scalar.description, SubgraphTypeKind::Scalar)
            }
            ParserTypeDefinition::Object(object) => (
                &object.name,
                &object.description,
                SubgraphTypeKind::Object(self.object(
                    &object.name,
                    &object.implements_interfaces,
                    &object.directives,
                    &object.fields,
                )),
            ),
            ParserTypeDefinition::Interface(interface) => (
                &interface.name,
                &interface.description,
                SubgraphTypeKind::Interface(self.object(
                    &interface.name,
                    &interface.implements_interfaces,
                    &[],
                    &interface.fields,
                )),
            ),
            ParserTypeDefinition::Union(union_type) => (
                &union_type.name,
                &union_type.description,
                SubgraphTypeKind::Union(
                    union_type.types.iter().map(|name| self.rename(name)).collect(),
                ),
            ),
            ParserTypeDefinition::Enum(enum_type) => (
                &enum_type.name,
                &enum_type.description,
                SubgraphTypeKind::Enum(enum_values(&enum_type.values)),
            ),
            ParserTypeDefinition::InputObject(input_object) => (
                &input_object.name,
                &input_object.description,
                SubgraphTypeKind::InputObject(
                    input_object
                        .fields
                        .iter()
                        .map(|field| (field.name.clone(), self.input_value(field)))
                        .collect(),
                ),
            ),
        };

        if is_internal_type(name) {
            return;
        }

        self.types.insert(
            self.rename(name),
            SubgraphType {
                description: description.clone(),
                kind,
            },
        );
    }

    fn apply_extension(&mut self, extension: &TypeExtension<'_, String>) {
        let original_name = extension_name(extension);
        if is_internal_type(original_name) {
            return;
        }

        let name = self.rename(original_name);
        let Some((index, _, mut base)) = self.types.shift_remove_full(&name) else {
            self.unresolved(&name, "the type is not declared by the subgraph".to_string());
            return;
        };

        let mut conflicts = Vec::new();
        match (&mut base.kind, extension) {
            (SubgraphTypeKind::Scalar, TypeExtension::Scalar(_)) => {}
            (SubgraphTypeKind::Object(object), TypeExtension::Object(ext)) => {
                let addition =
                    self.object(&name, &ext.implements_interfaces, &ext.directives, &ext.fields);
                conflicts = merge_object(object, addition);
            }
            (SubgraphTypeKind::Interface(object), TypeExtension::Interface(ext)) => {
                let addition = self.object(&name, &ext.implements_interfaces, &[], &ext.fields);
                conflicts = merge_object(object, addition);
            }
            (SubgraphTypeKind::Union(members), TypeExtension::Union(ext)) => {
                for member in &ext.types {
                    let member = self.rename(member);
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }
            }
            (SubgraphTypeKind::Enum(values), TypeExtension::Enum(ext)) => {
                for (value_name, value) in enum_values(&ext.values) {
                    if values.contains_key(&value_name) {
                        conflicts.push(format!("enum value \"{}\" is already declared", value_name));
                    } else {
                        values.insert(value_name, value);
                    }
                }
            }
            (SubgraphTypeKind::InputObject(fields), TypeExtension::InputObject(ext)) => {
                for field in &ext.fields {
                    if fields.contains_key(&field.name) {
                        conflicts.push(format!("input field \"{}\" is already declared", field.name));
                    } else {
                        fields.insert(field.name.clone(), self.input_value(field));
                    }
                }
            }
            (kind, _) => conflicts.push(format!(
                "{} extension does not match the {} base type",
                extension_kind_name(extension),
                kind.kind_name()
            )),
        }

        for reason in conflicts {
            self.unresolved(&name, reason);
        }
        self.types.shift_insert(index, name, base);
    }

    fn unresolved(&mut self, type_name: &str, reason: String) {
        self.errors.push(CompositionError::UnresolvedExtension {
            subgraph: self.subgraph.to_string(),
            type_name: type_name.to_string(),
            reason,
        });
    }

    fn object(
        &self,
        type_name: &str,
        implements: &[String],
        directives: &[Directive<'_, String>],
        fields: &[ParserField<'_, String>],
    ) -> SubgraphObject {
        let is_query = self.rename(type_name) == "Query";

        SubgraphObject {
            implements: implements.iter().map(|name| self.rename(name)).collect(),
            keys: vec![],
            raw_keys: directives
                .iter()
                .filter(|directive| directive.name == "key")
                .filter_map(|directive| {
                    directive
                        .arguments
                        .iter()
                        .find(|(name, _)| name == "fields")
                        .map(|(_, value)| match value {
                            Value::String(fields) => fields.clone(),
                            other => render_value(other),
                        })
                })
                .collect(),
            fields: fields
                .iter()
                .filter(|field| !(is_query && INTERNAL_FIELDS.contains(&field.name.as_str())))
                .map(|field| (field.name.clone(), self.field(field)))
                .collect(),
        }
    }

    fn field(&self, field: &ParserField<'_, String>) -> SubgraphField {
        let priority = find_directive(&field.directives, "priority").and_then(|directive| {
            directive
                .arguments
                .iter()
                .find(|(name, _)| name == "value")
                .and_then(|(_, value)| match value {
                    Value::Int(number) => number.as_i64(),
                    _ => None,
                })
        });

        SubgraphField {
            description: field.description.clone(),
            deprecation: deprecation_reason(&field.directives),
            arguments: field
                .arguments
                .iter()
                .map(|argument| self.input_value(argument))
                .collect(),
            ty: self.rename_type_ref(TypeRef::from(&field.field_type)),
            priority,
        }
    }

    fn input_value(&self, value: &InputValue<'_, String>) -> InputValueDefinition {
        InputValueDefinition {
            name: value.name.clone(),
            description: value.description.clone(),
            ty: self.rename_type_ref(TypeRef::from(&value.value_type)),
            default_value: value.default_value.as_ref().map(render_value),
        }
    }

    /// Parses every `@key` once all extensions are applied, so keys may name
    /// fields contributed by an extension.
    fn validate_keys(&mut self) {
        let mut errors = Vec::new();
        let mut parsed_keys = Vec::new();

        for (type_name, definition) in &self.types {
            let SubgraphTypeKind::Object(object) = &definition.kind else {
                continue;
            };

            let mut keys = Vec::with_capacity(object.raw_keys.len());
            for raw in &object.raw_keys {
                let result = FieldSet::parse(raw)
                    .map_err(|err| err.to_string())
                    .and_then(|field_set| {
                        self.check_field_set(type_name, &field_set.items)?;
                        Ok(field_set)
                    });

                match result {
                    Ok(field_set) if !keys.contains(&field_set) => keys.push(field_set),
                    Ok(_) => {}
                    Err(reason) => errors.push(CompositionError::InvalidKey {
                        subgraph: self.subgraph.to_string(),
                        type_name: type_name.clone(),
                        fields: raw.clone(),
                        reason,
                    }),
                }
            }
            parsed_keys.push((type_name.clone(), keys));
        }

        for (type_name, keys) in parsed_keys {
            if let Some(SubgraphTypeKind::Object(object)) =
                self.types.get_mut(&type_name).map(|definition| &mut definition.kind)
            {
                object.keys = keys;
            }
        }
        self.errors.extend(errors);
    }

    fn check_field_set(&self, type_name: &str, items: &[FieldSetItem]) -> Result<(), String> {
        let fields = match self.types.get(type_name).map(|definition| &definition.kind) {
            Some(SubgraphTypeKind::Object(object)) | Some(SubgraphTypeKind::Interface(object)) => {
                &object.fields
            }
            _ => return Err(format!("\"{}\" has no fields", type_name)),
        };

        for item in items {
            let field = fields.get(&item.name).ok_or_else(|| {
                format!("field \"{}.{}\" is not declared", type_name, item.name)
            })?;
            if !field.arguments.is_empty() {
                return Err(format!(
                    "field \"{}.{}\" takes arguments",
                    type_name, item.name
                ));
            }
            if field.ty.list_depth() > 0 {
                return Err(format!("field \"{}.{}\" is a list", type_name, item.name));
            }

            let field_type = field.ty.named_type();
            let is_composite = matches!(
                self.types.get(field_type).map(|definition| &definition.kind),
                Some(SubgraphTypeKind::Object(_)) | Some(SubgraphTypeKind::Interface(_))
            );
            match (is_composite, item.selections.is_empty()) {
                (true, true) => {
                    return Err(format!(
                        "field \"{}.{}\" needs a selection",
                        type_name, item.name
                    ))
                }
                (false, false) => {
                    return Err(format!(
                        "field \"{}.{}\" is a leaf and cannot have a selection",
                        type_name, item.name
                    ))
                }
                (true, false) => self.check_field_set(field_type, &item.selections.items)?,
                (false, true) => {}
            }
        }

        Ok(())
    }
}

fn merge_object(base: &mut SubgraphObject, addition: SubgraphObject) -> Vec<String> {
    let mut conflicts = Vec::new();

    for interface in addition.implements {
        if !base.implements.contains(&interface) {
            base.implements.push(interface);
        }
    }
    base.raw_keys.extend(addition.raw_keys);
    for (name, field) in addition.fields {
        if base.fields.contains_key(&name) {
            conflicts.push(format!("field \"{}\" is already declared", name));
        } else {
            base.fields.insert(name, field);
        }
    }

    conflicts
}

fn enum_values(values: &[ParserEnumValue<'_, String>]) -> IndexMap<String, SubgraphEnumValue> {
    values
        .iter()
        .map(|value| {
            (
                value.name.clone(),
                SubgraphEnumValue {
                    description: value.description.clone(),
                    deprecation: deprecation_reason(&value.directives),
                },
            )
        })
        .collect()
}

fn extension_name<'e>(extension: &'e TypeExtension<'_, String>) -> &'e str {
    match extension {
        TypeExtension::Scalar(ext) => &ext.name,
        TypeExtension::Object(ext) => &ext.name,
        TypeExtension::Interface(ext) => &ext.name,
        TypeExtension::Union(ext) => &ext.name,
        TypeExtension::Enum(ext) => &ext.name,
        TypeExtension::InputObject(ext) => &ext.name,
    }
}

fn extension_kind_name(extension: &TypeExtension<'_, String>) -> &'static str {
    empty_kind(extension).kind_name()
}

fn empty_kind(extension: &TypeExtension<'_, String>) -> SubgraphTypeKind {
    match extension {
        TypeExtension::Scalar(_) => SubgraphTypeKind::Scalar,
        TypeExtension::Object(_) => SubgraphTypeKind::Object(SubgraphObject::default()),
        TypeExtension::Interface(_) => SubgraphTypeKind::Interface(SubgraphObject::default()),
        TypeExtension::Union(_) => SubgraphTypeKind::Union(vec![]),
        TypeExtension::Enum(_) => SubgraphTypeKind::Enum(IndexMap::new()),
        TypeExtension::InputObject(_) => SubgraphTypeKind::InputObject(IndexMap::new()),
    }
}
