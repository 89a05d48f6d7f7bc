//! Materialized asset administration shell content.
//!
//! Element kinds are a closed set: every consumer matches exhaustively on
//! [`SubmodelElement`] instead of dispatching on `modelType` strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete environment as served by a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, rename = "assetAdministrationShells")]
    pub shells: Vec<AssetAdministrationShell>,
    #[serde(default)]
    pub submodels: Vec<Submodel>,
}

impl Environment {
    pub fn shell(&self, id: &str) -> Option<&AssetAdministrationShell> {
        self.shells.iter().find(|s| s.id == id)
    }

    pub fn submodel(&self, id: &str) -> Option<&Submodel> {
        self.submodels.iter().find(|s| s.id == id)
    }

    /// Submodels referenced by a shell, in reference order.
    ///
    /// Dangling references are skipped.
    pub fn submodels_of<'a>(
        &'a self,
        shell: &'a AssetAdministrationShell,
    ) -> impl Iterator<Item = &'a Submodel> + 'a {
        shell
            .submodels
            .iter()
            .filter_map(|r| r.first_key())
            .filter_map(move |key| self.submodel(&key.value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAdministrationShell {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    pub asset_information: AssetInformation,
    #[serde(default)]
    pub submodels: Vec<Reference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Instance,
    Type,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInformation {
    pub asset_kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_thumbnail: Option<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default)]
    pub submodel_elements: Vec<SubmodelElement>,
}

impl Submodel {
    /// Whether the submodel's semantic id is `semantic_id`.
    pub fn has_semantic_id(&self, semantic_id: &str) -> bool {
        self.semantic_id
            .as_ref()
            .is_some_and(|r| r.keys.iter().any(|k| k.value == semantic_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    ExternalReference,
    ModelReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: ReferenceType,
    pub keys: Vec<Key>,
}

impl Reference {
    /// Model reference with a single key.
    pub fn model(kind: KeyType, value: impl Into<String>) -> Self {
        Self {
            kind: ReferenceType::ModelReference,
            keys: vec![Key {
                kind,
                value: value.into(),
            }],
        }
    }

    /// External reference to a global identifier.
    pub fn global(value: impl Into<String>) -> Self {
        Self {
            kind: ReferenceType::ExternalReference,
            keys: vec![Key {
                kind: KeyType::GlobalReference,
                value: value.into(),
            }],
        }
    }

    pub fn first_key(&self) -> Option<&Key> {
        self.keys.first()
    }

    /// Identifier of the shell this reference points at, if it points at one.
    pub fn shell_id(&self) -> Option<&str> {
        self.first_key()
            .filter(|k| k.kind == KeyType::AssetAdministrationShell)
            .map(|k| k.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "type")]
    pub kind: KeyType,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    AnnotatedRelationshipElement,
    AssetAdministrationShell,
    BasicEventElement,
    Blob,
    Capability,
    ConceptDescription,
    DataElement,
    Entity,
    EventElement,
    File,
    FragmentReference,
    GlobalReference,
    Identifiable,
    MultiLanguageProperty,
    Operation,
    Property,
    Range,
    Referable,
    ReferenceElement,
    RelationshipElement,
    Submodel,
    SubmodelElement,
    SubmodelElementCollection,
    SubmodelElementList,
}

/// XML schema data types a property value can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "xs:string")]
    String,
    #[serde(rename = "xs:anyURI")]
    AnyUri,
    #[serde(rename = "xs:boolean")]
    Boolean,
    #[serde(rename = "xs:byte")]
    Byte,
    #[serde(rename = "xs:short")]
    Short,
    #[serde(rename = "xs:int")]
    Int,
    #[serde(rename = "xs:integer")]
    Integer,
    #[serde(rename = "xs:long")]
    Long,
    #[serde(rename = "xs:unsignedByte")]
    UnsignedByte,
    #[serde(rename = "xs:unsignedShort")]
    UnsignedShort,
    #[serde(rename = "xs:unsignedInt")]
    UnsignedInt,
    #[serde(rename = "xs:unsignedLong")]
    UnsignedLong,
    #[serde(rename = "xs:nonNegativeInteger")]
    NonNegativeInteger,
    #[serde(rename = "xs:decimal")]
    Decimal,
    #[serde(rename = "xs:double")]
    Double,
    #[serde(rename = "xs:float")]
    Float,
    #[serde(rename = "xs:date")]
    Date,
    #[serde(rename = "xs:dateTime")]
    DateTime,
    #[serde(rename = "xs:time")]
    Time,
    #[serde(rename = "xs:base64Binary")]
    Base64Binary,
}

/// Storage class of a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Text,
    Integer,
    Number,
    Boolean,
    Date,
}

impl DataType {
    pub fn class(self) -> ValueClass {
        match self {
            DataType::Boolean => ValueClass::Boolean,
            DataType::Byte
            | DataType::Short
            | DataType::Int
            | DataType::Integer
            | DataType::Long
            | DataType::UnsignedByte
            | DataType::UnsignedShort
            | DataType::UnsignedInt
            | DataType::UnsignedLong
            | DataType::NonNegativeInteger => ValueClass::Integer,
            DataType::Decimal | DataType::Double | DataType::Float => ValueClass::Number,
            DataType::Date | DataType::DateTime => ValueClass::Date,
            DataType::String
            | DataType::AnyUri
            | DataType::Time
            | DataType::Base64Binary => ValueClass::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangString {
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub value_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiLanguageProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default)]
    pub value: Vec<LangString>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub value_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub content_type: String,
    /// Base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub first: Reference,
    pub second: Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCollection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default)]
    pub value: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default = "default_true")]
    pub order_relevant: bool,
    #[serde(default)]
    pub value: Vec<SubmodelElement>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    CoManagedEntity,
    SelfManagedEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(default)]
    pub statements: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
}

/// Operations are indexed by name only; their variables describe a
/// signature, not state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
}

/// Every element kind that can appear inside a submodel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelType")]
pub enum SubmodelElement {
    Property(Property),
    MultiLanguageProperty(MultiLanguageProperty),
    Range(Range),
    File(FileElement),
    Blob(Blob),
    ReferenceElement(ReferenceElement),
    RelationshipElement(RelationshipElement),
    #[serde(rename = "SubmodelElementCollection")]
    Collection(ElementCollection),
    #[serde(rename = "SubmodelElementList")]
    List(ElementList),
    Entity(Entity),
    Capability(Capability),
    Operation(Operation),
}

/// Tag of a [`SubmodelElement`] variant, used for filtering and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Property,
    MultiLanguageProperty,
    Range,
    File,
    Blob,
    ReferenceElement,
    RelationshipElement,
    SubmodelElementCollection,
    SubmodelElementList,
    Entity,
    Capability,
    Operation,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Property => "Property",
            ElementKind::MultiLanguageProperty => "MultiLanguageProperty",
            ElementKind::Range => "Range",
            ElementKind::File => "File",
            ElementKind::Blob => "Blob",
            ElementKind::ReferenceElement => "ReferenceElement",
            ElementKind::RelationshipElement => "RelationshipElement",
            ElementKind::SubmodelElementCollection => "SubmodelElementCollection",
            ElementKind::SubmodelElementList => "SubmodelElementList",
            ElementKind::Entity => "Entity",
            ElementKind::Capability => "Capability",
            ElementKind::Operation => "Operation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SubmodelElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            SubmodelElement::Property(_) => ElementKind::Property,
            SubmodelElement::MultiLanguageProperty(_) => ElementKind::MultiLanguageProperty,
            SubmodelElement::Range(_) => ElementKind::Range,
            SubmodelElement::File(_) => ElementKind::File,
            SubmodelElement::Blob(_) => ElementKind::Blob,
            SubmodelElement::ReferenceElement(_) => ElementKind::ReferenceElement,
            SubmodelElement::RelationshipElement(_) => ElementKind::RelationshipElement,
            SubmodelElement::Collection(_) => ElementKind::SubmodelElementCollection,
            SubmodelElement::List(_) => ElementKind::SubmodelElementList,
            SubmodelElement::Entity(_) => ElementKind::Entity,
            SubmodelElement::Capability(_) => ElementKind::Capability,
            SubmodelElement::Operation(_) => ElementKind::Operation,
        }
    }

    pub fn id_short(&self) -> Option<&str> {
        let id_short = match self {
            SubmodelElement::Property(e) => &e.id_short,
            SubmodelElement::MultiLanguageProperty(e) => &e.id_short,
            SubmodelElement::Range(e) => &e.id_short,
            SubmodelElement::File(e) => &e.id_short,
            SubmodelElement::Blob(e) => &e.id_short,
            SubmodelElement::ReferenceElement(e) => &e.id_short,
            SubmodelElement::RelationshipElement(e) => &e.id_short,
            SubmodelElement::Collection(e) => &e.id_short,
            SubmodelElement::List(e) => &e.id_short,
            SubmodelElement::Entity(e) => &e.id_short,
            SubmodelElement::Capability(e) => &e.id_short,
            SubmodelElement::Operation(e) => &e.id_short,
        };
        id_short.as_deref()
    }

    pub fn semantic_id(&self) -> Option<&Reference> {
        let semantic_id = match self {
            SubmodelElement::Property(e) => &e.semantic_id,
            SubmodelElement::MultiLanguageProperty(e) => &e.semantic_id,
            SubmodelElement::Range(e) => &e.semantic_id,
            SubmodelElement::File(e) => &e.semantic_id,
            SubmodelElement::Blob(e) => &e.semantic_id,
            SubmodelElement::ReferenceElement(e) => &e.semantic_id,
            SubmodelElement::RelationshipElement(e) => &e.semantic_id,
            SubmodelElement::Collection(e) => &e.semantic_id,
            SubmodelElement::List(e) => &e.semantic_id,
            SubmodelElement::Entity(e) => &e.semantic_id,
            SubmodelElement::Capability(e) => &e.semantic_id,
            SubmodelElement::Operation(e) => &e.semantic_id,
        };
        semantic_id.as_ref()
    }

    /// Directly nested elements, in document order.
    pub fn children(&self) -> &[SubmodelElement] {
        match self {
            SubmodelElement::Collection(e) => &e.value,
            SubmodelElement::List(e) => &e.value,
            SubmodelElement::Entity(e) => &e.statements,
            SubmodelElement::Property(_)
            | SubmodelElement::MultiLanguageProperty(_)
            | SubmodelElement::Range(_)
            | SubmodelElement::File(_)
            | SubmodelElement::Blob(_)
            | SubmodelElement::ReferenceElement(_)
            | SubmodelElement::RelationshipElement(_)
            | SubmodelElement::Capability(_)
            | SubmodelElement::Operation(_) => &[],
        }
    }
}
