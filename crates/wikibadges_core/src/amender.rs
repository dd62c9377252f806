//! Points the sidebar's Commons entry at the category named by the entity's
//! commons-category statement.

use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

use crate::config::{BadgesConfig, ConfigError};
use crate::ids::{EntityId, PropertyId};
use crate::lookup::{EntityLookup, LookupError};
use crate::sidebar::{LinkRecord, Sidebar};

pub const COMMONS_GROUP: &str = "commons";
pub const COMMONS_SITE: &str = "commonswiki";
pub const COMMONS_CATEGORY_BASE_URL: &str = "https://commons.wikimedia.org/wiki/Category:";

const COMMONS_MESSAGE: &str = "wikibase-otherprojects-commons";
const COMMONS_LINK_CLASS: &str = "wb-otherproject-link wb-otherproject-commons";
const COMMONS_HREFLANG: &str = "en";

/// Characters MediaWiki leaves literal when encoding a title for a URL.
const TITLE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b';')
    .remove(b'@')
    .remove(b'$')
    .remove(b'!')
    .remove(b'*')
    .remove(b'(')
    .remove(b')')
    .remove(b',')
    .remove(b'/')
    .remove(b'~')
    .remove(b':');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmendError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("{property} on {entity} holds {found}, expected a non-empty string")]
    InvalidValueKind {
        entity: EntityId,
        property: PropertyId,
        found: String,
    },
}

pub struct OtherProjectsSidebarAmender<L> {
    lookup: L,
    property: Option<PropertyId>,
}

impl<L: EntityLookup> OtherProjectsSidebarAmender<L> {
    /// `property` is the commons-category property; `None` disables the
    /// amender entirely.
    pub fn new(lookup: L, property: Option<PropertyId>) -> Self {
        Self { lookup, property }
    }

    pub fn from_config(lookup: L, config: &BadgesConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(lookup, config.commons_category_property()?))
    }

    pub fn property(&self) -> Option<&PropertyId> {
        self.property.as_ref()
    }

    /// Add or replace `commons`/`commonswiki` in `sidebar`. Missing entities,
    /// lookup failures and unusable values leave the sidebar as it was.
    pub fn amend(&self, entity_id: &EntityId, sidebar: &mut Sidebar) {
        if self.property.is_none() {
            return;
        }
        match self.commons_link(entity_id) {
            Ok(Some(link)) => {
                debug!("commons sidebar link for {entity_id}: {}", link.href);
                sidebar.set_link(COMMONS_GROUP, COMMONS_SITE, link);
            }
            Ok(None) => {}
            Err(error) => warn!("Skipped commons sidebar link for {entity_id}: {error}"),
        }
    }

    /// The Commons link for `entity_id`, if the entity has a usable value.
    pub fn commons_link(&self, entity_id: &EntityId) -> Result<Option<LinkRecord>, AmendError> {
        let Some(property) = &self.property else {
            return Ok(None);
        };
        let Some(entity) = self.lookup.entity(entity_id)? else {
            debug!("entity {entity_id} not found, commons sidebar link skipped");
            return Ok(None);
        };
        let Some(statement) = entity.best_statements(property).into_iter().next() else {
            return Ok(None);
        };

        let category = statement
            .main_snak
            .as_string()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AmendError::InvalidValueKind {
                entity: entity_id.clone(),
                property: property.clone(),
                found: match statement.main_snak.as_string() {
                    Some(_) => "an empty string".to_string(),
                    None => statement.main_snak.kind(),
                },
            })?;

        Ok(commons_category_url(category).map(commons_link_record))
    }
}

/// Full URL of the Commons category page named `category`, or `None` for a
/// blank name.
pub fn commons_category_url(category: &str) -> Option<String> {
    let title = category.trim().replace(' ', "_");
    if title.is_empty() {
        return None;
    }
    Some(format!(
        "{COMMONS_CATEGORY_BASE_URL}{}",
        utf8_percent_encode(&title, TITLE_ENCODE_SET)
    ))
}

fn commons_link_record(href: String) -> LinkRecord {
    LinkRecord {
        msg: COMMONS_MESSAGE.to_string(),
        class: COMMONS_LINK_CLASS.to_string(),
        href,
        hreflang: COMMONS_HREFLANG.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DataValue, Entity, Rank, Snak, Statement};
    use crate::lookup::InMemoryEntityLookup;
    use rstest::rstest;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).expect("entity id")
    }

    fn p373() -> PropertyId {
        PropertyId::parse("P373").expect("property id")
    }

    fn lookup_with(statements: Vec<Statement>) -> InMemoryEntityLookup {
        let mut entity = Entity::new(id("Q123"));
        entity.statements = statements;
        let mut lookup = InMemoryEntityLookup::new();
        lookup.add_entity(entity);
        lookup
    }

    #[rstest]
    #[case("Amsterdam", "https://commons.wikimedia.org/wiki/Category:Amsterdam")]
    #[case(
        "Churches in Amsterdam",
        "https://commons.wikimedia.org/wiki/Category:Churches_in_Amsterdam"
    )]
    #[case(
        "Gdańsk (city)",
        "https://commons.wikimedia.org/wiki/Category:Gda%C5%84sk_(city)"
    )]
    #[case("AC/DC", "https://commons.wikimedia.org/wiki/Category:AC/DC")]
    #[case("Q&A?", "https://commons.wikimedia.org/wiki/Category:Q%26A%3F")]
    fn category_urls_are_encoded_like_titles(#[case] category: &str, #[case] expected: &str) {
        assert_eq!(commons_category_url(category).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_category_has_no_url(#[case] category: &str) {
        assert_eq!(commons_category_url(category), None);
    }

    #[test]
    fn preferred_statement_is_used() {
        let lookup = lookup_with(vec![
            Statement::new(p373(), Snak::string("Normal")),
            Statement::new(p373(), Snak::string("Preferred")).with_rank(Rank::Preferred),
        ]);
        let amender = OtherProjectsSidebarAmender::new(&lookup, Some(p373()));
        let link = amender.commons_link(&id("Q123")).expect("link").expect("some");
        assert_eq!(link.href, "https://commons.wikimedia.org/wiki/Category:Preferred");
    }

    #[test]
    fn placeholder_value_is_invalid() {
        let lookup = lookup_with(vec![
            Statement::new(p373(), Snak::SomeValue),
            Statement::new(p373(), Snak::string("Amsterdam")),
        ]);
        let amender = OtherProjectsSidebarAmender::new(&lookup, Some(p373()));
        let error = amender.commons_link(&id("Q123")).expect_err("invalid");
        assert_eq!(
            error,
            AmendError::InvalidValueKind {
                entity: id("Q123"),
                property: p373(),
                found: "somevalue".to_string(),
            }
        );
    }

    #[test]
    fn blank_string_is_invalid() {
        let lookup = lookup_with(vec![Statement::new(p373(), Snak::string("  "))]);
        let amender = OtherProjectsSidebarAmender::new(&lookup, Some(p373()));
        let error = amender.commons_link(&id("Q123")).expect_err("invalid");
        assert!(error.to_string().contains("an empty string"));
    }

    #[test]
    fn non_string_value_is_invalid() {
        let lookup = lookup_with(vec![Statement::new(
            p373(),
            Snak::Value(DataValue::Decimal("+1".to_string())),
        )]);
        let amender = OtherProjectsSidebarAmender::new(&lookup, Some(p373()));
        let error = amender.commons_link(&id("Q123")).expect_err("invalid");
        assert!(error.to_string().contains("value:decimal"));
    }

    #[test]
    fn lookup_failure_is_reported_by_commons_link() {
        let mut lookup = InMemoryEntityLookup::new();
        lookup.add_failure(id("Q503"));
        let amender = OtherProjectsSidebarAmender::new(&lookup, Some(p373()));
        assert!(matches!(
            amender.commons_link(&id("Q503")),
            Err(AmendError::Lookup(_))
        ));
    }

    #[test]
    fn disabled_amender_reports_nothing() {
        let mut lookup = InMemoryEntityLookup::new();
        lookup.add_failure(id("Q503"));
        let amender = OtherProjectsSidebarAmender::new(&lookup, None);
        assert_eq!(amender.commons_link(&id("Q503")), Ok(None));
    }
}
