//! CRM Integration
//!
//! The contact tool reaches the CRM only through [`CrmClient`], so tests and
//! demos can swap the Dataverse Web API for [`MockCrmClient`].

mod dataverse;
mod mock;

pub use dataverse::{DataverseClient, DataverseConfig};
pub use mock::MockCrmClient;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

/// One record returned by a query
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRow {
    /// Primary key, when the query selected it
    pub id: Option<Uuid>,

    /// Entity logical name (e.g., "contact")
    pub logical_name: String,

    /// Attribute values keyed by logical name
    pub attributes: Map<String, Value>,
}

impl EntityRow {
    pub fn new(logical_name: impl Into<String>, id: Option<Uuid>) -> Self {
        Self {
            id,
            logical_name: logical_name.into(),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// String attribute, `None` when absent, null or not a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// CRM client trait (Strategy pattern)
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Run a FetchXml query and return the matching rows
    async fn retrieve_multiple(&self, fetch_xml: &str) -> Result<Vec<EntityRow>>;

    /// Check if the CRM is reachable with our credentials
    async fn health_check(&self) -> bool;

    /// Client name
    fn name(&self) -> &str;
}
