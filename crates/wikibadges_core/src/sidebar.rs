//! The "other projects" sidebar: groups keyed by project (`wikiquote`,
//! `commons`, ...) holding links keyed by site id (`enwikiquote`,
//! `commonswiki`, ...).
//!
//! Entries are kept as raw JSON in document order (serde_json is built with
//! `preserve_order`), so whatever the host put in the sidebar comes back out
//! unchanged unless it sits in the one slot being written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub msg: String,
    pub class: String,
    pub href: String,
    pub hreflang: String,
}

impl LinkRecord {
    pub fn to_value(&self) -> Value {
        json!({
            "msg": self.msg,
            "class": self.class,
            "href": self.href,
            "hreflang": self.hreflang,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sidebar {
    groups: Map<String, Value>,
}

impl Sidebar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(mut self, group: &str, site: &str, link: LinkRecord) -> Self {
        self.set_link(group, site, link);
        self
    }

    /// Write `link` at `group`/`site`, overwriting only that slot. A new
    /// group or site is appended after the existing ones; a `group` that
    /// holds something other than an object is replaced. Returns the entry
    /// previously stored in the slot.
    pub fn set_link(&mut self, group: &str, site: &str, link: LinkRecord) -> Option<Value> {
        let slot = self
            .groups
            .entry(group)
            .or_insert_with(|| Value::Object(Map::new()));
        match slot {
            Value::Object(sites) => sites.insert(site.to_string(), link.to_value()),
            other => {
                let mut sites = Map::new();
                sites.insert(site.to_string(), link.to_value());
                *other = Value::Object(sites);
                None
            }
        }
    }

    pub fn link(&self, group: &str, site: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|sites| sites.get(site))
    }

    /// The entry at `group`/`site`, if it has the shape of a link record.
    pub fn link_record(&self, group: &str, site: &str) -> Option<LinkRecord> {
        LinkRecord::deserialize(self.link(group, site)?).ok()
    }

    pub fn group(&self, group: &str) -> Option<&Value> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.groups.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
