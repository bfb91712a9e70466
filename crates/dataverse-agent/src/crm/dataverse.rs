//! Dataverse Web API client
//!
//! Authenticates with the OAuth2 client-credentials grant and runs FetchXml
//! queries against `/api/data/v9.2`. The tenant authority is discovered from
//! the Web API's `WWW-Authenticate` challenge unless configured.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

use super::{CrmClient, EntityRow};
use crate::error::{CrmError, Result};

const API_PATH: &str = "api/data/v9.2";

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Dataverse connection settings
#[derive(Clone, Debug)]
pub struct DataverseConfig {
    /// Environment URL, e.g. `https://org.crm.dynamics.com`
    pub url: String,
    pub client_id: String,
    pub secret: String,
    /// OAuth authority, e.g. `https://login.microsoftonline.com/{tenant}`
    pub authority: Option<String>,
    pub timeout_secs: u64,
}

impl DataverseConfig {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_owned(),
            client_id: client_id.into(),
            secret: secret.into(),
            authority: None,
            timeout_secs: 30,
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into().trim_end_matches('/').to_owned());
        self
    }
}

#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ODataCollection {
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct EntityDefinition {
    #[serde(rename = "EntitySetName")]
    entity_set_name: String,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    message: String,
}

/// Dataverse Web API client
pub struct DataverseClient {
    http: Client,
    config: DataverseConfig,
    authority: OnceCell<String>,
    token: RwLock<Option<CachedToken>>,
    /// Entity set names read from table metadata, keyed by logical name
    entity_sets: RwLock<HashMap<String, String>>,
}

impl DataverseClient {
    pub fn new(config: DataverseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrmError::Config(format!("HTTP client: {e}")))?;

        let authority = OnceCell::new_with(config.authority.clone());
        Ok(Self {
            http,
            config,
            authority,
            token: RwLock::new(None),
            entity_sets: RwLock::new(HashMap::new()),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{API_PATH}/{path}", self.config.url)
    }

    async fn authority(&self) -> Result<&str> {
        self.authority
            .get_or_try_init(|| self.discover_authority())
            .await
            .map(String::as_str)
    }

    /// Ask the Web API for its bearer challenge and read the authority off it
    async fn discover_authority(&self) -> Result<String> {
        let response = self.http.get(self.api_url("")).send().await?;
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CrmError::Auth("no WWW-Authenticate challenge from Dataverse".into()))?;

        let authority = parse_authority(challenge)
            .ok_or_else(|| CrmError::Auth(format!("unrecognised challenge: {challenge}")))?;
        tracing::info!(authority = %authority, "Discovered Dataverse authority");
        Ok(authority)
    }

    /// Current access token, fetching a new one when the cached one is stale
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let token_url = format!("{}/oauth2/v2.0/token", self.authority().await?);
        let scope = format!("{}/.default", self.config.url);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self.http.post(&token_url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Auth(format!("token request failed ({status}): {body}")));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "Acquired Dataverse access token");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        })
    }

    /// Entity set for a logical name. Table metadata is asked first; when it
    /// can't be read the name is pluralised instead.
    async fn entity_set(&self, logical_name: &str) -> String {
        if let Some(set) = self.entity_sets.read().await.get(logical_name) {
            return set.clone();
        }

        let url = self.api_url(&format!("EntityDefinitions(LogicalName='{logical_name}')"));
        let lookup = match self.get(&url, &[("$select", "EntitySetName")]).await {
            Ok(response) => response.json::<EntityDefinition>().await.map_err(CrmError::from),
            Err(e) => Err(e),
        };

        match lookup {
            Ok(definition) => {
                tracing::debug!(entity = %logical_name, set = %definition.entity_set_name, "Resolved entity set");
                self.entity_sets
                    .write()
                    .await
                    .insert(logical_name.to_owned(), definition.entity_set_name.clone());
                definition.entity_set_name
            }
            Err(e) => {
                let guess = entity_set_name(logical_name);
                tracing::warn!(entity = %logical_name, set = %guess, "Entity metadata unavailable, guessing set name: {}", e);
                guess
            }
        }
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }
}

#[async_trait]
impl CrmClient for DataverseClient {
    async fn retrieve_multiple(&self, fetch_xml: &str) -> Result<Vec<EntityRow>> {
        let entity = fetch_entity_name(fetch_xml)?;
        let url = self.api_url(&self.entity_set(&entity).await);

        let response = self.get(&url, &[("fetchXml", fetch_xml)]).await?;
        let collection: ODataCollection = response.json().await?;

        let id_attribute = format!("{entity}id");
        let rows: Vec<EntityRow> = collection
            .value
            .into_iter()
            .map(|attributes| EntityRow {
                id: attributes
                    .get(&id_attribute)
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok()),
                logical_name: entity.clone(),
                attributes,
            })
            .collect();

        tracing::debug!(entity = %entity, rows = rows.len(), "FetchXml query completed");
        Ok(rows)
    }

    async fn health_check(&self) -> bool {
        match self.get(&self.api_url("WhoAmI"), &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Dataverse health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "Dataverse"
    }
}

fn error_for_status(status: StatusCode, body: &str) -> CrmError {
    let message = serde_json::from_str::<ODataErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_owned());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CrmError::Auth(message),
        _ => CrmError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Authority from a bearer challenge such as
/// `Bearer authorization_uri=https://login.microsoftonline.com/{tenant}/oauth2/authorize, resource_id=…`
fn parse_authority(challenge: &str) -> Option<String> {
    let uri = challenge
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|part| part.trim().strip_prefix("authorization_uri="))?
        .trim_matches('"');

    let authority = uri
        .strip_suffix("/oauth2/authorize")
        .or_else(|| uri.strip_suffix("/oauth2/v2.0/authorize"))
        .unwrap_or(uri);
    (!authority.is_empty()).then(|| authority.to_owned())
}

/// Logical name of the queried entity, from `<entity name="…">`
fn fetch_entity_name(fetch_xml: &str) -> Result<String> {
    let attributes = fetch_xml
        .match_indices("<entity")
        .map(|(start, tag)| &fetch_xml[start + tag.len()..])
        .find(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/'))
        .ok_or_else(|| CrmError::Query("FetchXml has no <entity> element".into()))?;
    let attributes = &attributes[..attributes.find('>').unwrap_or(attributes.len())];

    let name = attribute(attributes, "name")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CrmError::Query("<entity> element has no name".into()))?;

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CrmError::Query(format!("invalid entity name: {name}")));
    }
    Ok(name.to_owned())
}

/// Value of `wanted` in a tag's attribute list. Whitespace around `=` is
/// allowed and values may use either quote.
fn attribute<'a>(attributes: &'a str, wanted: &str) -> Option<&'a str> {
    let mut rest = attributes;
    loop {
        rest = rest.trim_start();
        let name_end = rest.find(|c: char| c == '=' || c.is_whitespace())?;
        let (name, after) = rest.split_at(name_end);

        let after = after.trim_start().strip_prefix('=')?.trim_start();
        let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &after[1..];
        let end = value.find(quote)?;

        if name == wanted {
            return Some(&value[..end]);
        }
        rest = &value[end + 1..];
    }
}

/// Entity set guessed from English plural rules
fn entity_set_name(logical_name: &str) -> String {
    let consonant_y = logical_name.strip_suffix('y').filter(|stem| {
        stem.chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
    });

    if let Some(stem) = consonant_y {
        format!("{stem}ies")
    } else if ["s", "x", "ch", "sh"].iter().any(|s| logical_name.ends_with(s)) {
        format!("{logical_name}es")
    } else {
        format!("{logical_name}s")
    }
}
