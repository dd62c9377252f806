//! Entity records and the statements attached to them, as delivered by a
//! Wikibase repository (`wbgetentities` responses or JSON dumps).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::ids::{EntityId, IdError, PropertyId};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEntity")]
pub struct Entity {
    pub id: EntityId,
    pub statements: Vec<Statement>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            statements: Vec::new(),
        }
    }

    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Statements for `property` that share the highest non-deprecated rank,
    /// in declaration order.
    pub fn best_statements(&self, property: &PropertyId) -> Vec<&Statement> {
        let mut candidates = self
            .statements
            .iter()
            .filter(|statement| &statement.property == property)
            .filter(|statement| statement.rank != Rank::Deprecated)
            .collect::<Vec<_>>();
        // Stable sort: equal ranks keep declaration order.
        candidates.sort_by(|left, right| right.rank.cmp(&left.rank));
        if let Some(top) = candidates.first().map(|statement| statement.rank) {
            candidates.retain(|statement| statement.rank == top);
        }
        candidates
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub property: PropertyId,
    pub main_snak: Snak,
    pub rank: Rank,
}

impl Statement {
    pub fn new(property: PropertyId, main_snak: Snak) -> Self {
        Self {
            property,
            main_snak,
            rank: Rank::Normal,
        }
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Deprecated,
    #[default]
    Normal,
    Preferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snak {
    Value(DataValue),
    SomeValue,
    NoValue,
}

impl Snak {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Value(DataValue::String(value.into()))
    }

    /// Short description of what the snak holds, used in diagnostics.
    pub fn kind(&self) -> String {
        match self {
            Self::Value(value) => format!("value:{}", value.type_name()),
            Self::SomeValue => "somevalue".to_string(),
            Self::NoValue => "novalue".to_string(),
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::Value(DataValue::String(value)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    String(String),
    EntityId(EntityId),
    Decimal(String),
    Quantity { amount: String },
    Other { value_type: String },
}

impl DataValue {
    pub fn type_name(&self) -> &str {
        match self {
            Self::String(_) => "string",
            Self::EntityId(_) => "wikibase-entityid",
            Self::Decimal(_) => "decimal",
            Self::Quantity { .. } => "quantity",
            Self::Other { value_type } => value_type,
        }
    }

    fn from_raw(raw: RawDataValue) -> Self {
        match raw.value_type.as_str() {
            "string" => match raw.value {
                Value::String(value) => Self::String(value),
                _ => Self::Other {
                    value_type: raw.value_type,
                },
            },
            "wikibase-entityid" => raw
                .value
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| EntityId::parse(id).ok())
                .map(Self::EntityId)
                .unwrap_or(Self::Other {
                    value_type: raw.value_type,
                }),
            "decimal" => match &raw.value {
                Value::String(amount) => Self::Decimal(amount.clone()),
                Value::Number(amount) => Self::Decimal(amount.to_string()),
                _ => Self::Other {
                    value_type: raw.value_type,
                },
            },
            "quantity" => match raw.value.get("amount").and_then(Value::as_str) {
                Some(amount) => Self::Quantity {
                    amount: amount.to_string(),
                },
                None => Self::Other {
                    value_type: raw.value_type,
                },
            },
            _ => Self::Other {
                value_type: raw.value_type,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    id: String,
    // MediaInfo entities carry "statements" instead of "claims".
    #[serde(default, alias = "statements")]
    claims: BTreeMap<String, Vec<RawClaim>>,
}

impl TryFrom<RawEntity> for Entity {
    type Error = IdError;

    fn try_from(raw: RawEntity) -> Result<Self, Self::Error> {
        let id = EntityId::parse(&raw.id)?;
        let mut statements = Vec::new();
        for (property, claims) in raw.claims {
            let property = PropertyId::parse(&property)?;
            for claim in claims {
                statements.push(Statement {
                    property: property.clone(),
                    main_snak: claim.main_snak.into_snak(),
                    rank: claim.rank,
                });
            }
        }
        Ok(Self { id, statements })
    }
}

#[derive(Debug, Deserialize)]
struct RawClaim {
    #[serde(rename = "mainsnak")]
    main_snak: RawSnak,
    #[serde(default)]
    rank: Rank,
}

#[derive(Debug, Deserialize)]
struct RawSnak {
    #[serde(rename = "snaktype")]
    snak_type: RawSnakType,
    #[serde(rename = "datavalue")]
    data_value: Option<RawDataValue>,
}

impl RawSnak {
    fn into_snak(self) -> Snak {
        match (self.snak_type, self.data_value) {
            (RawSnakType::Value, Some(value)) => Snak::Value(DataValue::from_raw(value)),
            // A value snak without a payload carries nothing usable.
            (RawSnakType::Value, None) | (RawSnakType::Somevalue, _) => Snak::SomeValue,
            (RawSnakType::Novalue, _) => Snak::NoValue,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum RawSnakType {
    Value,
    Somevalue,
    Novalue,
}

#[derive(Debug, Deserialize)]
struct RawDataValue {
    #[serde(rename = "type")]
    value_type: String,
    #[serde(default)]
    value: Value,
}
