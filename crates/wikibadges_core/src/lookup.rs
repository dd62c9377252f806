//! Entity lookup collaborators: the trait the amender depends on, an
//! in-memory store for fixtures and dumps, and a Wikibase API client.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::ApiSettings;
use crate::entity::Entity;
use crate::ids::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("failed to look up {id}: {reason}")]
    Failed { id: EntityId, reason: String },
}

impl LookupError {
    pub fn failed(id: &EntityId, reason: impl Into<String>) -> Self {
        Self::Failed {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

/// Resolves entity ids to entities. `Ok(None)` means the entity does not
/// exist; `Err` means the store could not answer.
pub trait EntityLookup {
    fn entity(&self, id: &EntityId) -> Result<Option<Entity>, LookupError>;
}

impl<T: EntityLookup + ?Sized> EntityLookup for &T {
    fn entity(&self, id: &EntityId) -> Result<Option<Entity>, LookupError> {
        (**self).entity(id)
    }
}

impl<T: EntityLookup + ?Sized> EntityLookup for Box<T> {
    fn entity(&self, id: &EntityId) -> Result<Option<Entity>, LookupError> {
        (**self).entity(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityLookup {
    entities: BTreeMap<EntityId, Entity>,
    failures: BTreeSet<EntityId>,
}

impl InMemoryEntityLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Make every lookup of `id` fail.
    pub fn add_failure(&mut self, id: EntityId) {
        self.failures.insert(id);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parse either a `wbgetentities` response (`{"entities": {...}}`) or a
    /// JSON array of entities. Entries flagged `missing` are skipped.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(content).context("invalid entity JSON")?;
        let records = match &payload {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            Value::Object(object) => match object.get("entities").and_then(Value::as_object) {
                Some(entities) => entities.values().collect(),
                None => bail!("expected an `entities` object or an array of entities"),
            },
            _ => bail!("expected an `entities` object or an array of entities"),
        };

        let mut lookup = Self::new();
        for record in records {
            if record.get("missing").is_some() {
                continue;
            }
            let entity: Entity =
                serde_json::from_value(record.clone()).context("invalid entity record")?;
            lookup.add_entity(entity);
        }
        Ok(lookup)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

impl EntityLookup for InMemoryEntityLookup {
    fn entity(&self, id: &EntityId) -> Result<Option<Entity>, LookupError> {
        if self.failures.contains(id) {
            return Err(LookupError::failed(id, "lookup configured to fail"));
        }
        Ok(self.entities.get(id).cloned())
    }
}

/// Fetches entities from a Wikibase `api.php` via `wbgetentities`. Each
/// lookup is a single request; failures are not retried.
pub struct ApiEntityLookup {
    client: Client,
    api_url: String,
    user_agent: String,
}

impl ApiEntityLookup {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("failed to build entity API HTTP client")?;
        Ok(Self {
            client,
            api_url: settings.url.clone(),
            user_agent: settings.user_agent.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, id: &EntityId) -> Result<Value, String> {
        let response = self
            .client
            .get(&self.api_url)
            .header("User-Agent", self.user_agent.clone())
            .query(&[
                ("action", "wbgetentities"),
                ("ids", id.as_str()),
                ("props", "claims"),
                ("format", "json"),
            ])
            .send()
            .map_err(|error| error.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response
            .json::<Value>()
            .map_err(|error| format!("failed to decode entity API JSON response: {error}"))
    }
}

impl EntityLookup for ApiEntityLookup {
    fn entity(&self, id: &EntityId) -> Result<Option<Entity>, LookupError> {
        let payload = self
            .request(id)
            .map_err(|reason| LookupError::failed(id, reason))?;
        entity_from_response(id, &payload)
    }
}

fn entity_from_response(id: &EntityId, payload: &Value) -> Result<Option<Entity>, LookupError> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        // Wikibase reports unknown ids as an API error rather than `missing`.
        if code == "no-such-entity" {
            return Ok(None);
        }
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        return Err(LookupError::failed(id, format!("api error [{code}]: {info}")));
    }

    let record = payload
        .get("entities")
        .and_then(|entities| entities.get(id.as_str()))
        .ok_or_else(|| LookupError::failed(id, "invalid wbgetentities response shape"))?;
    if record.get("missing").is_some() {
        return Ok(None);
    }
    serde_json::from_value::<Entity>(record.clone())
        .map(Some)
        .map_err(|error| LookupError::failed(id, format!("invalid entity record: {error}")))
}
