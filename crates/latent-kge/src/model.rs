//! The embedding model: vocabularies, tables and a scorer behind one type.
//!
//! ```rust,ignore
//! use latent_kge::{EmbeddingModel, Hyperparams, Kind, Triple};
//!
//! let mut model = EmbeddingModel::transe(Hyperparams::default().with_k(10).with_seed(555))?;
//! model.fit(&triples)?;
//!
//! let scores = model.predict(&[Triple::new("f", "y", "e")])?;
//! let vectors = model.get_embeddings(&["a", "b"], Kind::Entity)?;
//!
//! // Out-of-graph entity from auxiliary evidence
//! let h = model.generate_approximate_embeddings("h", &neighbours)?;
//! ```
//!
//! # Mutation
//!
//! Only [`fit`](EmbeddingModel::fit) and
//! [`generate_approximate_embeddings`](EmbeddingModel::generate_approximate_embeddings)
//! take `&mut self`. Both validate everything before touching state, so a
//! failed call leaves the model exactly as it was. Share a model across
//! threads behind an `RwLock`.

use crate::config::Hyperparams;
use crate::error::{Error, Result};
use crate::scoring::{ModelKind, Orientation, ScoringFunction};
use crate::store::{EmbeddingStore, EmbeddingTable};
use crate::training::{EncodedTriple, Trainer, TrainingSummary};
use crate::triple::Triple;
use crate::vocab::{Kind, Vocabulary};
use tracing::info;

/// A knowledge graph embedding model.
///
/// Equality is structural over the full model state: variant, hyperparameters,
/// both vocabularies, both tables and the fitted flag.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingModel {
    scoring: ScoringFunction,
    hyperparams: Hyperparams,
    entities: Vocabulary,
    relations: Vocabulary,
    store: EmbeddingStore,
    fitted: bool,
}

impl EmbeddingModel {
    /// Create an unfitted model of the given variant.
    pub fn new(kind: ModelKind, hyperparams: Hyperparams) -> Result<Self> {
        hyperparams.validate()?;
        let scoring = ScoringFunction::for_kind(kind, hyperparams.norm);
        let width = scoring.row_width(hyperparams.k)?;
        Ok(Self {
            scoring,
            store: EmbeddingStore::new(width),
            hyperparams,
            entities: Vocabulary::new(Kind::Entity),
            relations: Vocabulary::new(Kind::Relation),
            fitted: false,
        })
    }

    /// Create a model from a variant name such as `"TransE"`.
    pub fn from_name(name: &str, hyperparams: Hyperparams) -> Result<Self> {
        Self::new(name.parse()?, hyperparams)
    }

    pub fn transe(hyperparams: Hyperparams) -> Result<Self> {
        Self::new(ModelKind::TransE, hyperparams)
    }

    pub fn distmult(hyperparams: Hyperparams) -> Result<Self> {
        Self::new(ModelKind::DistMult, hyperparams)
    }

    pub fn complex(hyperparams: Hyperparams) -> Result<Self> {
        Self::new(ModelKind::ComplEx, hyperparams)
    }

    /// Reassemble a model from its parts, checking the table invariants.
    pub(crate) fn from_parts(
        kind: ModelKind,
        hyperparams: Hyperparams,
        entities: Vocabulary,
        relations: Vocabulary,
        store: EmbeddingStore,
        fitted: bool,
    ) -> Result<Self> {
        let model = Self::new(kind, hyperparams)?;
        let width = model.embedding_width();

        for (vocab, table) in [(&entities, &store.entities), (&relations, &store.relations)] {
            if table.width() != width {
                return Err(Error::DimensionMismatch {
                    expected: width,
                    got: table.width(),
                });
            }
            if table.row_count() != vocab.len() {
                return Err(Error::InvalidInput(format!(
                    "{} vocabulary has {} identifiers but the table has {} rows",
                    vocab.kind(),
                    vocab.len(),
                    table.row_count()
                )));
            }
        }

        Ok(Self {
            entities,
            relations,
            store,
            fitted,
            ..model
        })
    }

    /// Train on `triples`, replacing any previous vocabularies and tables.
    ///
    /// On error the previous state is kept untouched.
    pub fn fit(&mut self, triples: &[Triple]) -> Result<TrainingSummary> {
        if triples.is_empty() {
            return Err(Error::InvalidInput("No training triples provided".into()));
        }

        let (entities, relations) = Vocabulary::build(triples);
        let encoded = encode(triples, &entities, &relations)?;

        let trainer = Trainer::new(self.scoring, &self.hyperparams);
        let (store, summary) = trainer.train(&encoded, entities.len(), relations.len())?;

        info!(
            model = %self.kind(),
            triples = triples.len(),
            entities = entities.len(),
            relations = relations.len(),
            loss = summary.final_loss(),
            "fit complete"
        );

        self.entities = entities;
        self.relations = relations;
        self.store = store;
        self.fitted = true;
        Ok(summary)
    }

    /// Score each triple, in input order.
    ///
    /// Fails if any identifier is missing from the vocabularies; no partial
    /// result is returned.
    pub fn predict(&self, triples: &[Triple]) -> Result<Vec<f32>> {
        self.ensure_fitted()?;
        let encoded = encode(triples, &self.entities, &self.relations)?;

        encoded
            .iter()
            .map(|&[s, p, o]| {
                let h = self.row(s, Kind::Entity)?;
                let r = self.row(p, Kind::Relation)?;
                let t = self.row(o, Kind::Entity)?;
                Ok(self.scoring.score(h, r, t))
            })
            .collect()
    }

    /// Embeddings of `ids`, in input order.
    pub fn get_embeddings<S: AsRef<str>>(&self, ids: &[S], kind: Kind) -> Result<Vec<Vec<f32>>> {
        ids.iter()
            .map(|id| self.get_embedding(id.as_ref(), kind))
            .collect()
    }

    /// Embedding of a single identifier.
    pub fn get_embedding(&self, id: &str, kind: Kind) -> Result<Vec<f32>> {
        let index = self.vocabulary(kind).lookup(id)?;
        Ok(self.store.get(index, kind)?.to_vec())
    }

    /// Approximate an embedding for an entity absent from training.
    ///
    /// Every neighbouring triple links `entity` to a known entity through a
    /// known relation. Each one yields a partner vector by inverting the
    /// scorer's composition from the known side; the mean of those vectors
    /// becomes the new entity's row, appended at the next entity index.
    ///
    /// Returns the vector exactly as stored.
    pub fn generate_approximate_embeddings(
        &mut self,
        entity: &str,
        neighbouring_triples: &[Triple],
    ) -> Result<Vec<f32>> {
        self.ensure_fitted()?;
        if self.entities.contains(entity) {
            return Err(Error::DuplicateIdentifier {
                kind: Kind::Entity,
                id: entity.to_string(),
            });
        }
        if neighbouring_triples.is_empty() {
            return Err(Error::InsufficientEvidence(format!(
                "no neighbouring triples for '{}'",
                entity
            )));
        }

        let width = self.embedding_width();
        let mut sum = vec![0.0f32; width];

        for triple in neighbouring_triples {
            let (known, orientation) = if triple.subject == entity {
                (&triple.object, Orientation::KnownObject)
            } else if triple.object == entity {
                (&triple.subject, Orientation::KnownSubject)
            } else {
                return Err(Error::InvalidInput(format!(
                    "triple {} does not mention '{}'",
                    triple, entity
                )));
            };

            let r = self.row(self.relations.lookup(&triple.predicate)?, Kind::Relation)?;
            let e = self.row(self.entities.lookup(known)?, Kind::Entity)?;

            let partner = self.scoring.invert(e, r, orientation);
            for (acc, x) in sum.iter_mut().zip(&partner) {
                *acc += x;
            }
        }

        let n = neighbouring_triples.len() as f32;
        let approx: Vec<f32> = sum.into_iter().map(|x| x / n).collect();

        // Row first: a rejected write leaves the vocabulary untouched.
        let index = self.entities.len();
        self.store.set(index, Kind::Entity, &approx)?;
        self.entities.push(entity)?;

        info!(
            entity,
            index,
            evidence = neighbouring_triples.len(),
            "approximated out-of-graph entity"
        );
        Ok(approx)
    }

    pub fn kind(&self) -> ModelKind {
        self.scoring.kind()
    }

    pub fn scoring(&self) -> ScoringFunction {
        self.scoring
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyperparams
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn entity_vocabulary(&self) -> &Vocabulary {
        &self.entities
    }

    pub fn relation_vocabulary(&self) -> &Vocabulary {
        &self.relations
    }

    pub fn vocabulary(&self, kind: Kind) -> &Vocabulary {
        match kind {
            Kind::Entity => &self.entities,
            Kind::Relation => &self.relations,
        }
    }

    pub fn entity_table(&self) -> &EmbeddingTable {
        self.store.table(Kind::Entity)
    }

    pub fn relation_table(&self) -> &EmbeddingTable {
        self.store.table(Kind::Relation)
    }

    pub(crate) fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// Floats per stored row (`k`, or `2k` for ComplEx).
    pub fn embedding_width(&self) -> usize {
        self.store.width()
    }

    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(Error::NotFitted)
        }
    }

    fn row(&self, index: usize, kind: Kind) -> Result<&[f32]> {
        self.store.table(kind).row_slice(index)
    }
}

/// Map string triples onto vocabulary indices.
fn encode(
    triples: &[Triple],
    entities: &Vocabulary,
    relations: &Vocabulary,
) -> Result<Vec<EncodedTriple>> {
    triples
        .iter()
        .map(|t| {
            Ok([
                entities.lookup(&t.subject)?,
                relations.lookup(&t.predicate)?,
                entities.lookup(&t.object)?,
            ])
        })
        .collect()
}
