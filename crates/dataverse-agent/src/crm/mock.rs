//! Mock CRM Client
//!
//! For testing and demo purposes. Serves canned rows and records every
//! query it receives.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CrmClient, EntityRow};
use crate::error::{CrmError, Result};

/// Mock CRM client with canned rows
#[derive(Default)]
pub struct MockCrmClient {
    rows: Vec<EntityRow>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl MockCrmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query with `rows`
    pub fn with_rows(rows: Vec<EntityRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Fail every query with a 503 carrying `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queries received so far, oldest first
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl CrmClient for MockCrmClient {
    async fn retrieve_multiple(&self, fetch_xml: &str) -> Result<Vec<EntityRow>> {
        self.queries.lock().await.push(fetch_xml.to_owned());

        match &self.failure {
            Some(message) => Err(CrmError::Api {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(self.rows.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.failure.is_none()
    }

    fn name(&self) -> &str {
        "MockCrm"
    }
}
