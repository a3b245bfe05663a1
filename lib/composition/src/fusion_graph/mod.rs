//! The fusion graph: the merged schema of all subgraphs plus the binding
//! metadata the planner needs to route every field to a subgraph.

mod field_set;
mod parse;
mod render;
mod type_ref;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use field_set::{FieldSet, FieldSetError, FieldSetItem};
pub use parse::FusionGraphParseError;
pub use type_ref::TypeRef;

pub(crate) use parse::{deprecation_reason, find_directive};
pub(crate) use render::render_value;

pub const FUSION_FORMAT_VERSION: i64 = 1;

/// Scalars every schema has; they are not part of the fusion graph document.
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALARS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionGraph {
    /// Subgraph names, sorted.
    pub subgraphs: Vec<String>,
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub description: Option<String>,
    /// Subgraphs declaring the type, in subgraph order.
    pub sources: Vec<String>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Scalar,
    Object(ObjectType),
    Interface(ObjectType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub implements: Vec<String>,
    pub keys: Vec<EntityKey>,
    pub fields: IndexMap<String, FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKey {
    pub subgraph: String,
    pub fields: FieldSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
    pub arguments: Vec<InputValueDefinition>,
    pub ty: TypeRef,
    /// Sorted by priority, preferred binding first.
    pub bindings: Vec<FieldBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub subgraph: String,
    pub kind: BindingKind,
    pub priority: usize,
}

/// How a subgraph can serve a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    /// A field of a root operation type.
    Root,
    /// Only reachable when the parent object was fetched from the same subgraph.
    Local,
    /// The parent is an entity of the subgraph and can be re-entered by key.
    Keyed,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Root => "ROOT",
            BindingKind::Local => "LOCAL",
            BindingKind::Keyed => "KEYED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ROOT" => Some(BindingKind::Root),
            "LOCAL" => Some(BindingKind::Local),
            "KEYED" => Some(BindingKind::Keyed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValueDefinition {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    /// GraphQL literal text of the default value.
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionType {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub values: IndexMap<String, EnumValueDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueDefinition {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputObjectType {
    pub fields: IndexMap<String, InputValueDefinition>,
}

impl TypeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "scalar",
            TypeKind::Object(_) => "object",
            TypeKind::Interface(_) => "interface",
            TypeKind::Union(_) => "union",
            TypeKind::Enum(_) => "enum",
            TypeKind::InputObject(_) => "input object",
        }
    }
}

impl TypeDefinition {
    /// Fields of object and interface types.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match &self.kind {
            TypeKind::Object(object) | TypeKind::Interface(object) => Some(&object.fields),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().and_then(|fields| fields.get(name))
    }

    pub fn keys(&self) -> &[EntityKey] {
        match &self.kind {
            TypeKind::Object(object) => &object.keys,
            _ => &[],
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface(_) | TypeKind::Union(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object(_) | TypeKind::Interface(_) | TypeKind::Union(_)
        )
    }

    pub fn is_declared_by(&self, subgraph: &str) -> bool {
        self.sources.iter().any(|source| source == subgraph)
    }
}

impl FieldDefinition {
    pub fn binding_for(&self, subgraph: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.subgraph == subgraph)
    }

    pub fn is_resolvable_by(&self, subgraph: &str) -> bool {
        self.binding_for(subgraph).is_some()
    }
}

impl FusionGraph {
    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn root_type_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.query_type.as_str())
            .chain(self.mutation_type.as_deref())
            .chain(self.subscription_type.as_deref())
    }

    pub fn is_root_type(&self, name: &str) -> bool {
        self.root_type_names().any(|root| root == name)
    }

    /// Object types a value of `type_name` may have at runtime.
    pub fn possible_types(&self, type_name: &str) -> BTreeSet<String> {
        let mut possible = BTreeSet::new();
        match self.types.get(type_name).map(|definition| &definition.kind) {
            Some(TypeKind::Object(_)) => {
                possible.insert(type_name.to_string());
            }
            Some(TypeKind::Union(union_type)) => {
                possible.extend(union_type.members.iter().cloned());
            }
            Some(TypeKind::Interface(_)) => {
                for definition in self.types.values() {
                    if let TypeKind::Object(object) = &definition.kind {
                        if object.implements.iter().any(|name| name == type_name) {
                            possible.insert(definition.name.clone());
                        }
                    }
                }
            }
            _ => {}
        }

        possible
    }

    /// Every subgraph name referenced by a source, key or binding.
    pub fn referenced_subgraphs(&self) -> BTreeSet<String> {
        let mut referenced: BTreeSet<String> = self.subgraphs.iter().cloned().collect();

        for definition in self.types.values() {
            referenced.extend(definition.sources.iter().cloned());
            match &definition.kind {
                TypeKind::Object(object) | TypeKind::Interface(object) => {
                    referenced.extend(object.keys.iter().map(|key| key.subgraph.clone()));
                    for field in object.fields.values() {
                        referenced.extend(field.bindings.iter().map(|b| b.subgraph.clone()));
                    }
                }
                TypeKind::Enum(enum_type) => {
                    for value in enum_type.values.values() {
                        referenced.extend(value.sources.iter().cloned());
                    }
                }
                _ => {}
            }
        }

        referenced
    }

    /// The fusion graph document: merged schema plus binding directives.
    pub fn to_fusion_document(&self) -> String {
        render::render(self, render::RenderMode::FusionGraph)
    }

    /// The client-facing schema document, without binding metadata.
    pub fn to_schema_document(&self) -> String {
        render::render(self, render::RenderMode::ClientSchema)
    }

    /// Reads a fusion graph document produced by [`FusionGraph::to_fusion_document`].
    pub fn parse(document: &str) -> Result<Self, FusionGraphParseError> {
        parse::parse_fusion_document(document)
    }
}

impl Display for FusionGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_fusion_document())
    }
}
