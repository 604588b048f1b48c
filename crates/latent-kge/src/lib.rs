//! Knowledge graph embeddings: training, inference and out-of-graph
//! approximation.
//!
//! A knowledge graph is a set of `(subject, predicate, object)` triples.
//! An embedding model maps every entity and relation to a dense vector and
//! scores triples with a variant-specific function, so that facts seen during
//! training score higher than facts that were not.
//!
//! | Model | Score | Row width |
//! |-------|-------|-----------|
//! | TransE | -‖h + r - t‖ | k |
//! | DistMult | Σ hᵢ rᵢ tᵢ | k |
//! | ComplEx | Re(⟨h, r, conj(t)⟩) | 2k |
//!
//! ## Layout
//!
//! - [`Vocabulary`]: identifier to dense index, in first-seen order
//! - [`EmbeddingStore`]: one append-only row table per [`Kind`]
//! - [`ScoringFunction`]: score, gradients and inversion per variant
//! - [`Trainer`]: margin-ranking training with negative sampling
//! - [`EmbeddingModel`]: the facade tying these together
//! - [`save_model`] / [`restore_model`]: directory snapshots
//!
//! ## Usage
//!
//! ```rust,ignore
//! use latent_kge::{entity_triples, EmbeddingModel, Hyperparams, Kind, Triple};
//!
//! let triples: Vec<Triple> = [("a", "y", "b"), ("b", "y", "a"), ("a", "y", "c")]
//!     .into_iter()
//!     .map(Triple::from)
//!     .collect();
//!
//! let mut model = EmbeddingModel::complex(Hyperparams::default().with_k(10))?;
//! model.fit(&triples)?;
//!
//! let scores = model.predict(&[Triple::from_strs("c", "y", "a")])?;
//!
//! // An entity that was never trained, placed from triples that mention it
//! let aux = vec![Triple::from_strs("h", "y", "b"), Triple::from_strs("c", "y", "h")];
//! let h = model.generate_approximate_embeddings("h", &entity_triples("h", &aux))?;
//!
//! latent_kge::save_model(&model, "model")?;
//! let restored = latent_kge::restore_model("model")?;
//! assert_eq!(restored, model);
//! ```
//!
//! ## References
//!
//! - Bordes et al. (2013). "Translating Embeddings for Modeling
//!   Multi-relational Data." NIPS.
//! - Yang et al. (2015). "Embedding Entities and Relations for Learning and
//!   Inference in Knowledge Bases." ICLR.
//! - Trouillon et al. (2016). "Complex Embeddings for Simple Link
//!   Prediction." ICML.

mod config;
mod error;
mod model;
mod persist;
mod scoring;
mod store;
mod training;
mod triple;
mod vocab;

pub use config::{Hyperparams, Optimizer};
pub use error::{Error, Result};
pub use model::EmbeddingModel;
pub use persist::{restore_model, save_model, FORMAT_VERSION};
pub use scoring::{Gradients, ModelKind, Norm, Orientation, ScoringFunction};
pub use store::{EmbeddingStore, EmbeddingTable};
pub use training::{EncodedTriple, Trainer, TrainingSummary};
pub use triple::{entity_triples, Triple};
pub use vocab::{Kind, Vocabulary};
