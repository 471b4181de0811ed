//! Knowledge source lookup and reference matching
//!
//! Components do not carry a foreign key to the knowledge sources they use.
//! A reference is inferred when a source's id (older bots) or name (newer
//! bots) appears anywhere in the component's serialized `data`/`content`.
//! This is a heuristic: it misses references stored in other shapes, and a
//! short or common source name will produce false positives.

use crate::api::dataverse::{BotComponent, KnowledgeSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// How a component was linked to a knowledge source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Guid,
    Name,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Guid => write!(f, "GUID"),
            MatchType::Name => write!(f, "NAME"),
        }
    }
}

/// One inferred component → knowledge source link
#[derive(Debug, Clone)]
pub struct SourceMatch<'a> {
    pub match_type: MatchType,
    pub match_value: String,
    pub source: &'a KnowledgeSource,
}

/// Insertion-ordered key → slot map; re-inserting a key replaces its slot
/// but keeps its original position.
#[derive(Debug, Default)]
struct OrderedKeys {
    keys: Vec<String>,
    slots: HashMap<String, usize>,
}

impl OrderedKeys {
    fn insert(&mut self, key: String, slot: usize) {
        if self.slots.insert(key.clone(), slot).is_none() {
            self.keys.push(key);
        }
    }

    fn get(&self, key: &str) -> Option<usize> {
        self.slots.get(key).copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.keys.iter().map(|k| (k.as_str(), self.slots[k]))
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Knowledge sources keyed by id and by display name.
///
/// Names are not unique; a later source with the same name replaces the
/// earlier one in the name index.
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    sources: Vec<KnowledgeSource>,
    by_id: OrderedKeys,
    by_name: OrderedKeys,
}

impl KnowledgeIndex {
    pub fn build(sources: Vec<KnowledgeSource>) -> Self {
        let mut by_id = OrderedKeys::default();
        let mut by_name = OrderedKeys::default();

        for (slot, source) in sources.iter().enumerate() {
            by_id.insert(source_key(source), slot);
            if let Some(name) = source.name.as_deref().filter(|n| !n.is_empty()) {
                by_name.insert(name.to_string(), slot);
            }
        }

        Self {
            sources,
            by_id,
            by_name,
        }
    }

    pub fn unique_names(&self) -> usize {
        self.by_name.len()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&KnowledgeSource> {
        self.by_id.get(id).map(|slot| &self.sources[slot])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&KnowledgeSource> {
        self.by_name.get(name).map(|slot| &self.sources[slot])
    }

    /// Every id match, then every name match, found in the component payload
    pub fn find_references(&self, component: &BotComponent) -> Vec<SourceMatch<'_>> {
        let haystack = component_search_text(component);
        let mut matches = Vec::new();

        if haystack.is_empty() {
            return matches;
        }

        for (id, slot) in self.by_id.iter() {
            if !id.is_empty() && haystack.contains(id) {
                matches.push(SourceMatch {
                    match_type: MatchType::Guid,
                    match_value: id.to_string(),
                    source: &self.sources[slot],
                });
            }
        }

        for (name, slot) in self.by_name.iter() {
            if haystack.contains(name) {
                matches.push(SourceMatch {
                    match_type: MatchType::Name,
                    match_value: name.to_string(),
                    source: &self.sources[slot],
                });
            }
        }

        matches
    }
}

/// Id key of a source; sources without an id share the empty key
pub fn source_key(source: &KnowledgeSource) -> String {
    source.dvtablesearchid.clone().unwrap_or_default()
}

/// Serialized `data` followed by serialized `content`
pub fn component_search_text(component: &BotComponent) -> String {
    let mut text = payload_text(component.data.as_ref());
    text.push_str(&payload_text(component.content.as_ref()));
    text
}

fn payload_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(s)) if s.is_empty() => String::new(),
        Some(Value::Array(a)) if a.is_empty() => String::new(),
        Some(Value::Object(o)) if o.is_empty() => String::new(),
        Some(v) => serde_json::to_string(v).unwrap_or_default(),
    }
}
