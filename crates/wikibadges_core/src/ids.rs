//! Typed entity and property identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("malformed entity id: {0:?}")]
    Malformed(String),
    #[error("not a property id: {0}")]
    NotAProperty(String),
}

/// Identifier of a Wikibase entity such as `Q123` or `P373`.
///
/// Always stored normalised: one upper-case ASCII letter followed by a
/// positive number without leading zeroes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let trimmed = value.trim();
        let mut chars = trimmed.chars();
        let prefix = chars
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(|| IdError::Malformed(value.to_string()))?;
        let digits = chars.as_str();
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(IdError::Malformed(value.to_string()));
        }
        Ok(Self(format!("{}{digits}", prefix.to_ascii_uppercase())))
    }

    /// Leading type letter, e.g. `'Q'` for items.
    pub fn prefix(&self) -> char {
        self.0.chars().next().unwrap_or('Q')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a property (`P` prefixed entity id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(EntityId);

impl PropertyId {
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let id = EntityId::parse(value)?;
        if id.prefix() != 'P' {
            return Err(IdError::NotAProperty(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_entity_id(&self) -> &EntityId {
        &self.0
    }
}

impl FromStr for PropertyId {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl AsRef<str> for PropertyId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for PropertyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
