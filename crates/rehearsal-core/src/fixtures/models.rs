//! The `Articles` sample model, stored in a [`MemoryConnection`].

use super::{MemoryConnection, MEMORY_DB_SERVICE};
use crate::di::Container;
use crate::orm::{Criteria, Model, ModelClass, ModelMessage};
use crate::{HarnessError, HarnessResult};
use serde_json::{Map, Value};
use std::sync::Arc;

const TABLE: &str = "articles";

/// The `Articles` model class.
///
/// Records need a non-empty `title`; `id` is assigned on save.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticlesClass;

impl ArticlesClass {
    /// The registered model name.
    pub const NAME: &'static str = "Articles";

    fn connection(container: &Container) -> HarnessResult<Arc<MemoryConnection>> {
        container
            .get::<MemoryConnection>(MEMORY_DB_SERVICE)
            .map_err(|_| HarnessError::invalid_model(Self::NAME, "no database connection is registered"))
    }
}

impl ModelClass for ArticlesClass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create(&self, container: &Container) -> HarnessResult<Box<dyn Model>> {
        Ok(Box::new(Article::new(Self::connection(container)?)))
    }

    fn find_first(
        &self,
        container: &Container,
        criteria: &Criteria,
    ) -> HarnessResult<Option<Box<dyn Model>>> {
        let connection = Self::connection(container)?;
        let row = connection.select(TABLE, criteria).into_iter().next();
        Ok(row.map(|attributes| Box::new(Article::loaded(connection, attributes)) as Box<dyn Model>))
    }

    fn find(&self, container: &Container, criteria: &Criteria) -> HarnessResult<Vec<Box<dyn Model>>> {
        let connection = Self::connection(container)?;
        Ok(connection
            .select(TABLE, criteria)
            .into_iter()
            .map(|attributes| {
                Box::new(Article::loaded(Arc::clone(&connection), attributes)) as Box<dyn Model>
            })
            .collect())
    }

    fn primary_keys(&self) -> Vec<String> {
        vec!["id".to_string()]
    }
}

/// An article record.
#[derive(Debug)]
pub struct Article {
    connection: Arc<MemoryConnection>,
    attributes: Map<String, Value>,
    messages: Vec<ModelMessage>,
}

impl Article {
    fn new(connection: Arc<MemoryConnection>) -> Self {
        Self::loaded(connection, Map::new())
    }

    fn loaded(connection: Arc<MemoryConnection>, attributes: Map<String, Value>) -> Self {
        Self {
            connection,
            attributes,
            messages: Vec::new(),
        }
    }

    fn validate(&self) -> Vec<ModelMessage> {
        let has_title = self
            .attributes
            .get("title")
            .and_then(Value::as_str)
            .is_some_and(|title| !title.trim().is_empty());
        if has_title {
            Vec::new()
        } else {
            vec![ModelMessage::new("PresenceOf", "title", "title is required")]
        }
    }
}

impl Model for Article {
    fn assign(&mut self, attributes: &Map<String, Value>) {
        for (key, value) in attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
    }

    fn save(&mut self) -> bool {
        self.messages = self.validate();
        if !self.messages.is_empty() {
            return false;
        }
        let id = self.connection.insert(TABLE, self.attributes.clone());
        self.attributes.insert("id".to_string(), id);
        true
    }

    fn messages(&self) -> Vec<ModelMessage> {
        self.messages.clone()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn to_json(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}
