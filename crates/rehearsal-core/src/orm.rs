//! ORM model capability.
//!
//! Models are looked up by logical name in a [`ModelRegistry`] and queried
//! with a [`Criteria`]: a condition string in the framework's query language
//! (`[title] = :title: AND [deleted_at] IS NULL`), its bound parameters, and
//! the same conditions in structured form so in-memory stores can evaluate
//! them.
//!
//! # Example
//!
//! ```rust
//! use rehearsal_core::orm::Criteria;
//! use serde_json::json;
//!
//! let attributes = json!({"title": "Hello", "deleted_at": null});
//! let criteria = Criteria::from_attributes(attributes.as_object().unwrap());
//! assert_eq!(criteria.conditions(), "[title] = :title: AND [deleted_at] IS NULL");
//! assert_eq!(criteria.bind()["title"], json!("Hello"));
//! ```

use crate::di::Container;
use crate::{HarnessError, HarnessResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A validation or persistence message reported by a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Message type, e.g. `PresenceOf`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Field (or fields, comma separated) the message is about.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl ModelMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(
        message_type: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.message_type, self.field, self.message)
    }
}

/// A model instance.
pub trait Model: Send + Sync {
    /// Assigns attribute values.
    fn assign(&mut self, attributes: &Map<String, Value>);

    /// Persists the record. Returns `false` and records messages on failure.
    fn save(&mut self) -> bool;

    /// Returns the messages recorded by the last failed operation.
    fn messages(&self) -> Vec<ModelMessage>;

    /// Reads an attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Serializes the record.
    fn to_json(&self) -> Value;
}

/// A model class: constructor, finders and metadata.
pub trait ModelClass: Send + Sync {
    /// Returns the logical model name.
    fn name(&self) -> &str;

    /// Creates an empty record bound to the application's services.
    fn create(&self, container: &Container) -> HarnessResult<Box<dyn Model>>;

    /// Returns the first record matching `criteria`.
    fn find_first(
        &self,
        container: &Container,
        criteria: &Criteria,
    ) -> HarnessResult<Option<Box<dyn Model>>>;

    /// Returns every record matching `criteria`.
    fn find(&self, container: &Container, criteria: &Criteria) -> HarnessResult<Vec<Box<dyn Model>>>;

    /// Returns the primary key attributes.
    fn primary_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Returns the column map (column name to attribute name), if the model
    /// renames its columns.
    fn column_map(&self) -> Option<IndexMap<String, String>> {
        None
    }
}

/// Model classes by logical name.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    classes: IndexMap<String, Arc<dyn ModelClass>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model class under its own name.
    #[must_use]
    pub fn with(mut self, class: Arc<dyn ModelClass>) -> Self {
        self.register(class);
        self
    }

    /// Registers a model class under its own name.
    pub fn register(&mut self, class: Arc<dyn ModelClass>) {
        self.classes.insert(class.name().to_string(), class);
    }

    /// Looks up a model class.
    pub fn get(&self, model: &str) -> HarnessResult<Arc<dyn ModelClass>> {
        self.classes
            .get(model)
            .cloned()
            .ok_or_else(|| HarnessError::model_not_found(model))
    }

    /// Returns `true` if a class is registered under the name.
    #[must_use]
    pub fn contains(&self, model: &str) -> bool {
        self.classes.contains_key(model)
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One condition of a [`Criteria`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `[attribute] IS NULL`
    IsNull(String),
    /// `[attribute] = :attribute:`
    Equals(String, Value),
}

/// Find conditions with bound parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    conditions: String,
    bind: Map<String, Value>,
    clauses: Vec<Condition>,
}

impl Criteria {
    /// Matches every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds criteria matching every attribute: `null` values become
    /// `IS NULL` checks, the rest are bound equality checks.
    #[must_use]
    pub fn from_attributes(attributes: &Map<String, Value>) -> Self {
        let mut parts = Vec::with_capacity(attributes.len());
        let mut bind = Map::new();
        let mut clauses = Vec::with_capacity(attributes.len());

        for (key, value) in attributes {
            if value.is_null() {
                parts.push(format!("[{key}] IS NULL"));
                clauses.push(Condition::IsNull(key.clone()));
            } else {
                parts.push(format!("[{key}] = :{key}:"));
                bind.insert(key.clone(), value.clone());
                clauses.push(Condition::Equals(key.clone(), value.clone()));
            }
        }

        Self {
            conditions: parts.join(" AND "),
            bind,
            clauses,
        }
    }

    /// Returns the condition string.
    #[must_use]
    pub fn conditions(&self) -> &str {
        &self.conditions
    }

    /// Returns the bound parameters.
    #[must_use]
    pub fn bind(&self) -> &Map<String, Value> {
        &self.bind
    }

    /// Returns the structured conditions.
    #[must_use]
    pub fn clauses(&self) -> &[Condition] {
        &self.clauses
    }

    /// Returns `true` if there are no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates the conditions against a row of attributes.
    ///
    /// Equality is loose the way bound parameters are: `"5"` matches `5`.
    #[must_use]
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Condition::IsNull(key) => row.get(key).map_or(true, Value::is_null),
            Condition::Equals(key, expected) => row
                .get(key)
                .is_some_and(|actual| loosely_equal(actual, expected)),
        })
    }

    /// Formats the criteria for failure messages.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "no conditions".to_string();
        }
        format!("{} {}", self.conditions, Value::Object(self.bind.clone()))
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(s), other) | (other, Value::String(s))
            if other.is_number() || other.is_boolean() =>
        {
            s == &scalar_text(other)
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

/// Returns the identity of a saved record.
///
/// A record with an `id` attribute is identified by it. Otherwise the
/// class's primary keys decide: none yields no identity, a single key yields
/// that attribute (through the column map when there is one), and a
/// composite key yields an object of the key attributes.
#[must_use]
pub fn model_identity(class: &dyn ModelClass, record: &dyn Model) -> Option<Value> {
    if let Some(id) = record.attribute("id") {
        return Some(id);
    }

    let keys = class.primary_keys();
    match keys.as_slice() {
        [] => None,
        [key] => {
            let attribute = class
                .column_map()
                .and_then(|map| map.get(key).cloned())
                .unwrap_or_else(|| key.clone());
            record.attribute(&attribute)
        }
        keys => Some(Value::Object(
            keys.iter()
                .filter_map(|key| record.attribute(key).map(|value| (key.clone(), value)))
                .collect(),
        )),
    }
}
