//! Resource schema definitions
//!
//! A schema describes the attributes a resource accepts and exposes. It is
//! built once per resource type with the builder methods on [`Attribute`]
//! and [`Block`] and is serialized as-is by `stratus schema`.

use crate::duration::format_duration;
use crate::validation::Validator;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default timeout for every operation that a resource does not override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Type of an attribute value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    /// Integer that may be left unset (`null` or `""`) without becoming 0.
    NullableInt,
    List(Element),
    Set(Element),
    Map(Box<AttributeType>),
}

impl AttributeType {
    pub fn list(elem: impl Into<Element>) -> Self {
        Self::List(elem.into())
    }

    pub fn set(elem: impl Into<Element>) -> Self {
        Self::Set(elem.into())
    }

    pub fn map(value: AttributeType) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

/// Element type of a list or set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Primitive(Box<AttributeType>),
    Block(Block),
}

impl From<AttributeType> for Element {
    fn from(ty: AttributeType) -> Self {
        Self::Primitive(Box::new(ty))
    }
}

impl From<Block> for Element {
    fn from(block: Block) -> Self {
        Self::Block(block)
    }
}

/// A single attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: AttributeType,

    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub computed: bool,

    /// Changing the value replaces the remote object.
    #[serde(skip_serializing_if = "is_false")]
    pub force_new: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub sensitive: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_with: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exactly_one_of: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub at_least_one_of: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Attribute {
    pub fn required(ty: AttributeType) -> Self {
        Self {
            ty,
            required: true,
            ..Default::default()
        }
    }

    pub fn optional(ty: AttributeType) -> Self {
        Self {
            ty,
            optional: true,
            ..Default::default()
        }
    }

    pub fn computed(ty: AttributeType) -> Self {
        Self {
            ty,
            computed: true,
            ..Default::default()
        }
    }

    /// Optional attribute whose value falls back to what the remote side reports.
    pub fn optional_computed(ty: AttributeType) -> Self {
        Self {
            ty,
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn conflicts_with(mut self, others: &[&str]) -> Self {
        self.conflicts_with = names(others);
        self
    }

    pub fn required_with(mut self, others: &[&str]) -> Self {
        self.required_with = names(others);
        self
    }

    pub fn exactly_one_of(mut self, group: &[&str]) -> Self {
        self.exactly_one_of = names(group);
        self
    }

    pub fn at_least_one_of(mut self, group: &[&str]) -> Self {
        self.at_least_one_of = names(group);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set only by the provider; configuring it is an error.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Nested block for list/set-of-block attributes.
    pub fn nested_block(&self) -> Option<&Block> {
        match &self.ty {
            AttributeType::List(Element::Block(block))
            | AttributeType::Set(Element::Block(block)) => Some(block),
            _ => None,
        }
    }
}

/// An ordered set of named attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    pub attributes: BTreeMap<String, Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }
}

/// Operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Per-operation timeouts; unset operations use [`DEFAULT_TIMEOUT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    #[serde(serialize_with = "serialize_timeout", skip_serializing_if = "Option::is_none")]
    pub create: Option<Duration>,
    #[serde(serialize_with = "serialize_timeout", skip_serializing_if = "Option::is_none")]
    pub read: Option<Duration>,
    #[serde(serialize_with = "serialize_timeout", skip_serializing_if = "Option::is_none")]
    pub update: Option<Duration>,
    #[serde(serialize_with = "serialize_timeout", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Duration>,
}

fn serialize_timeout<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_str(&format_duration(*d)),
        None => s.serialize_none(),
    }
}

impl Timeouts {
    pub fn create(mut self, d: Duration) -> Self {
        self.create = Some(d);
        self
    }

    pub fn read(mut self, d: Duration) -> Self {
        self.read = Some(d);
        self
    }

    pub fn update(mut self, d: Duration) -> Self {
        self.update = Some(d);
        self
    }

    pub fn delete(mut self, d: Duration) -> Self {
        self.delete = Some(d);
        self
    }

    pub fn get(&self, op: Operation) -> Duration {
        let value = match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        };
        value.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn set(&mut self, op: Operation, d: Duration) {
        match op {
            Operation::Create => self.create = Some(d),
            Operation::Read => self.read = Some(d),
            Operation::Update => self.update = Some(d),
            Operation::Delete => self.delete = Some(d),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Schema of a resource type or data source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub version: u32,
    pub block: Block,
    #[serde(skip_serializing_if = "Timeouts::is_empty")]
    pub timeouts: Timeouts,
}

impl ResourceSchema {
    pub fn new(block: Block) -> Self {
        Self {
            version: 0,
            block,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Every schema a provider exposes, keyed by type name
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderSchema {
    pub resources: BTreeMap<String, ResourceSchema>,
    pub data_sources: BTreeMap<String, ResourceSchema>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::optional_computed(AttributeType::String)
            .force_new()
            .conflicts_with(&["certificate_body"]);

        assert!(attr.optional && attr.computed && attr.force_new);
        assert!(!attr.is_computed_only());
        assert_eq!(attr.conflicts_with, vec!["certificate_body".to_string()]);

        assert!(Attribute::computed(AttributeType::String).is_computed_only());
    }

    #[test]
    fn test_nested_block() {
        let inner = Block::new().attribute("days", Attribute::optional(AttributeType::Int));
        let attr = Attribute::optional(AttributeType::list(inner.clone())).max_items(1);

        assert_eq!(attr.nested_block(), Some(&inner));
        assert!(Attribute::optional(AttributeType::list(AttributeType::String))
            .nested_block()
            .is_none());
    }

    #[test]
    fn test_timeouts_default() {
        let timeouts = Timeouts::default().create(Duration::from_secs(180));
        assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(180));
        assert_eq!(timeouts.get(Operation::Delete), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_schema_serialization() {
        let schema = ResourceSchema::new(
            Block::new()
                .attribute(
                    "bucket",
                    Attribute::required(AttributeType::String)
                        .force_new()
                        .validate(Validator::StringLenBetween(1, 63)),
                )
                .attribute("arn", Attribute::computed(AttributeType::String)),
        )
        .with_timeouts(Timeouts::default().create(Duration::from_secs(180)));

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["timeouts"], json!({"create": "3m0s"}));
        assert_eq!(value["block"]["attributes"]["arn"]["computed"], json!(true));
        assert_eq!(
            value["block"]["attributes"]["bucket"]["validators"],
            json!(["length between 1 and 63"])
        );
        assert!(value["block"]["attributes"]["bucket"].get("optional").is_none());
    }
}
