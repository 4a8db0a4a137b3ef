//! Character record types and candidate deduplication.
//!
//! A `CharacterRecord` starts life as an unvalidated candidate produced by
//! the extractor. It becomes durable only after passing validation and
//! being upserted into the store, at which point it gains a `created_at`
//! timestamp and is returned as a `StoredCharacter`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One character extracted from narrative text.
///
/// `full_name` is the sole identity key: the store matches it exactly,
/// case-sensitively, and a later write with the same name replaces the
/// prior row wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// The character's name, exactly as it appears in the text.
    pub full_name: String,

    /// Plot events involving the character, in narrative order.
    #[serde(default)]
    pub events: Vec<String>,

    /// Descriptive traits (personality, appearance, habits).
    #[serde(default)]
    pub characteristics: Vec<String>,

    /// The character's occupation or role, if stated.
    #[serde(default)]
    pub occupation: Option<String>,

    /// Related character name → relation label.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,

    /// Title of the source text, if known.
    #[serde(default)]
    pub novel_title: Option<String>,
}

impl CharacterRecord {
    /// Create a record with just a name; other fields start empty.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            events: Vec::new(),
            characteristics: Vec::new(),
            occupation: None,
            relationships: BTreeMap::new(),
            novel_title: None,
        }
    }

    /// Fold another record for the same character into this one.
    ///
    /// Scalar fields keep the first non-empty value, list fields take the
    /// union (preserving this record's order, skipping exact duplicates),
    /// and relationship keys already present are kept as-is.
    pub fn merge(&mut self, other: CharacterRecord) {
        for event in other.events {
            if !self.events.contains(&event) {
                self.events.push(event);
            }
        }
        for trait_ in other.characteristics {
            if !self.characteristics.contains(&trait_) {
                self.characteristics.push(trait_);
            }
        }
        if self.occupation.is_none() {
            self.occupation = other.occupation;
        }
        for (name, relation) in other.relationships {
            self.relationships.entry(name).or_insert(relation);
        }
        if self.novel_title.is_none() {
            self.novel_title = other.novel_title;
        }
    }
}

/// A persisted character row: the record plus its write timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCharacter {
    pub record: CharacterRecord,

    /// Set by the store at write time; refreshed on overwrite.
    pub created_at: String,
}

/// A lightweight listing entry, as returned by the store's list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub full_name: String,
    pub occupation: Option<String>,
    pub novel_title: Option<String>,
}

/// Collapse candidates sharing a `full_name` into one record each.
///
/// Extraction output may name the same character twice; downstream
/// stages assume names are unique, so duplicates are merged here rather
/// than left to the LLM. First occurrence wins for scalar fields; list
/// fields are unioned. Candidate order is otherwise preserved.
pub fn dedup_candidates(candidates: Vec<CharacterRecord>) -> Vec<CharacterRecord> {
    let mut merged: Vec<CharacterRecord> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match merged
            .iter_mut()
            .find(|existing| existing.full_name == candidate.full_name)
        {
            Some(existing) => existing.merge(candidate),
            None => merged.push(candidate),
        }
    }
    merged
}
