//! Triple type for knowledge graph embedding.
//!
//! A triple is a (subject, predicate, object) statement. Duplicates are
//! meaningful: a repeated triple counts as repeated evidence during training.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (subject, predicate, object) triple.
///
/// # Example
///
/// ```rust
/// use latent_kge::Triple;
///
/// let triple = Triple::new("Paris", "capitalOf", "France");
/// assert_eq!(triple.subject, "Paris");
/// assert_eq!(triple.predicate, "capitalOf");
/// assert_eq!(triple.object, "France");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity.
    pub subject: String,
    /// Predicate (relation type).
    pub predicate: String,
    /// Object entity.
    pub object: String,
}

impl Triple {
    /// Create a new triple.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Create from string slices.
    pub fn from_strs(subject: &str, predicate: &str, object: &str) -> Self {
        Self::new(subject, predicate, object)
    }

    /// Whether `entity` is the subject or the object of this triple.
    pub fn mentions(&self, entity: &str) -> bool {
        self.subject == entity || self.object == entity
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

impl<S: Into<String>> From<(S, S, S)> for Triple {
    fn from((s, p, o): (S, S, S)) -> Self {
        Self::new(s, p, o)
    }
}

/// Triples in which `entity` appears as subject or object, in input order.
///
/// Used to pick the neighbourhood of an out-of-graph entity out of an
/// auxiliary triple set before approximating its embedding.
pub fn entity_triples(entity: &str, triples: &[Triple]) -> Vec<Triple> {
    triples
        .iter()
        .filter(|t| t.mentions(entity))
        .cloned()
        .collect()
}
