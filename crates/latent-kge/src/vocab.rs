//! Vocabulary indexing for entities and relations.
//!
//! Every identifier gets a dense, zero-based index in first-seen order.
//! Entities and relations live in independent index spaces: entity `3` and
//! relation `3` are unrelated. Indices are append-only and never reused
//! within one model.

use crate::error::{Error, Result};
use crate::triple::Triple;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which index space an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Subjects and objects.
    Entity,
    /// Predicates.
    Relation,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Relation => f.write_str("relation"),
        }
    }
}

/// Bidirectional identifier <-> index mapping for one [`Kind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    kind: Kind,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Create an empty vocabulary.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            names: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build entity and relation vocabularies from a triple set.
    ///
    /// Scans triples top to bottom and each triple left to right, so subjects
    /// are indexed before objects of the same triple.
    ///
    /// ```rust
    /// use latent_kge::{Triple, Vocabulary};
    ///
    /// let triples = vec![Triple::new("a", "y", "b"), Triple::new("c", "z", "a")];
    /// let (entities, relations) = Vocabulary::build(&triples);
    ///
    /// assert_eq!(entities.index_of("c"), Some(2));
    /// assert_eq!(relations.index_of("z"), Some(1));
    /// ```
    pub fn build(triples: &[Triple]) -> (Self, Self) {
        let mut entities = Self::new(Kind::Entity);
        let mut relations = Self::new(Kind::Relation);

        for t in triples {
            entities.get_or_insert(&t.subject);
            relations.get_or_insert(&t.predicate);
            entities.get_or_insert(&t.object);
        }

        (entities, relations)
    }

    fn get_or_insert(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Append a new identifier and return its index.
    pub fn push(&mut self, id: &str) -> Result<usize> {
        if self.index.contains_key(id) {
            return Err(Error::DuplicateIdentifier {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        Ok(self.get_or_insert(id))
    }

    /// Index of `id`, if present.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Index of `id`, failing with `UnknownIdentifier` when absent.
    pub fn lookup(&self, id: &str) -> Result<usize> {
        self.index_of(id).ok_or_else(|| Error::unknown(self.kind, id))
    }

    /// Identifier at `index`, if assigned.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Identifiers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Re-tag after deserialization (the serialized form carries no kind).
    pub(crate) fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = String;

    fn try_from(names: Vec<String>) -> std::result::Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(format!("duplicate identifier '{}' at index {}", name, i));
            }
        }
        Ok(Self {
            kind: Kind::Entity,
            names,
            index,
        })
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.names
    }
}
