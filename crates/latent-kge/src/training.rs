//! Training loop for knowledge graph embeddings.
//!
//! One loop serves every [`ScoringFunction`]; the variant only supplies the
//! score and its gradients.
//!
//! 1. Initialize rows Xavier-uniform (TransE entities on the unit sphere)
//! 2. Each epoch, shuffle the triples and split them into `batches_count` batches
//! 3. For each positive triple draw `eta` negatives by corrupting the subject
//!    or the object, skipping corruptions that are themselves training triples
//! 4. Accumulate gradients of the pairwise ranking loss
//!    `max(0, margin - s(pos) + s(neg))` and apply them once per batch
//!
//! All randomness comes from one `XorShiftRng` seeded with
//! [`Hyperparams::seed`], so the same triples and seed always give
//! bit-identical tables.

use crate::config::{Hyperparams, Optimizer};
use crate::error::{Error, Result};
use crate::scoring::ScoringFunction;
use crate::store::{EmbeddingStore, EmbeddingTable};
use crate::vocab::Kind;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Corruption attempts before accepting a negative that is a known positive.
const MAX_CORRUPTION_TRIES: usize = 10;

const ADAGRAD_EPS: f32 = 1e-8;

/// Index-encoded triple: `[subject, predicate, object]`.
pub type EncodedTriple = [usize; 3];

/// Outcome of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    /// Mean ranking loss over sampled pairs, one entry per epoch.
    pub loss_history: Vec<f32>,
    /// Epochs completed.
    pub epochs_run: usize,
}

impl TrainingSummary {
    /// Loss of the last epoch, 0 if none ran.
    pub fn final_loss(&self) -> f32 {
        self.loss_history.last().copied().unwrap_or(0.0)
    }
}

/// Row-major parameter table with optimizer state.
struct ParamTable {
    width: usize,
    data: Vec<f32>,
    accum: Vec<f32>,
}

impl ParamTable {
    fn xavier(rows: usize, width: usize, rng: &mut XorShiftRng) -> Self {
        let bound = (6.0 / (rows + width) as f32).sqrt();
        let data = (0..rows * width)
            .map(|_| rng.random_range(-bound..bound))
            .collect();
        Self {
            width,
            data,
            accum: vec![0.0; rows * width],
        }
    }

    fn rows(&self) -> usize {
        self.data.len() / self.width
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    fn apply(&mut self, i: usize, grad: &[f32], optimizer: Optimizer, lr: f32) {
        let span = i * self.width..(i + 1) * self.width;
        let row = &mut self.data[span.clone()];
        let accum = &mut self.accum[span];

        for ((p, acc), g) in row.iter_mut().zip(accum.iter_mut()).zip(grad) {
            match optimizer {
                Optimizer::Sgd => *p -= lr * g,
                Optimizer::Adagrad => {
                    *acc += g * g;
                    *p -= lr * g / (acc.sqrt() + ADAGRAD_EPS);
                }
            }
        }
    }

    /// Scale every row with L2 norm above `max_norm` back onto the sphere.
    fn clip_rows(&mut self, max_norm: f32) {
        for row in self.data.chunks_mut(self.width) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > max_norm {
                row.iter_mut().for_each(|x| *x *= max_norm / norm);
            }
        }
    }

    /// Scale every non-zero row to unit L2 norm.
    fn normalize_rows(&mut self) {
        for row in self.data.chunks_mut(self.width) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 1e-8 {
                row.iter_mut().for_each(|x| *x /= norm);
            }
        }
    }

    fn into_table(self, kind: Kind) -> Result<EmbeddingTable> {
        let shape = (self.rows(), self.width);
        let rows = Array2::from_shape_vec(shape, self.data)
            .map_err(|e| Error::InvalidInput(format!("embedding table shape: {}", e)))?;
        Ok(EmbeddingTable::from_array(kind, rows))
    }
}

/// Per-batch gradient accumulator, applied in ascending row order.
#[derive(Default)]
struct GradBuffer {
    rows: BTreeMap<usize, Vec<f32>>,
}

impl GradBuffer {
    fn add(&mut self, row: usize, grad: &[f32], sign: f32) {
        let acc = self
            .rows
            .entry(row)
            .or_insert_with(|| vec![0.0; grad.len()]);
        for (a, g) in acc.iter_mut().zip(grad) {
            *a += sign * g;
        }
    }

    fn flush(&mut self, table: &mut ParamTable, optimizer: Optimizer, lr: f32) {
        for (row, grad) in std::mem::take(&mut self.rows) {
            table.apply(row, &grad, optimizer, lr);
        }
    }
}

/// Knowledge graph embedding trainer.
pub struct Trainer<'a> {
    scoring: ScoringFunction,
    params: &'a Hyperparams,
}

impl<'a> Trainer<'a> {
    pub fn new(scoring: ScoringFunction, params: &'a Hyperparams) -> Self {
        Self { scoring, params }
    }

    /// Train fresh tables for `num_entities` entities and `num_relations`
    /// relations on index-encoded triples.
    pub fn train(
        &self,
        triples: &[EncodedTriple],
        num_entities: usize,
        num_relations: usize,
    ) -> Result<(EmbeddingStore, TrainingSummary)> {
        self.params.validate()?;
        if triples.is_empty() {
            return Err(Error::InvalidInput("No training triples provided".into()));
        }
        if let Some(bad) = triples
            .iter()
            .find(|[s, p, o]| *s >= num_entities || *o >= num_entities || *p >= num_relations)
        {
            return Err(Error::InvalidInput(format!(
                "encoded triple {:?} outside vocabulary ({} entities, {} relations)",
                bad, num_entities, num_relations
            )));
        }

        let params = self.params;
        let width = self.scoring.row_width(params.k)?;
        let translational = matches!(self.scoring, ScoringFunction::TransE { .. });

        let mut rng = XorShiftRng::seed_from_u64(params.seed);
        let mut entities = ParamTable::xavier(num_entities, width, &mut rng);
        let mut relations = ParamTable::xavier(num_relations, width, &mut rng);
        if translational {
            entities.normalize_rows();
        }

        let known: HashSet<EncodedTriple> = triples.iter().copied().collect();
        let mut order: Vec<usize> = (0..triples.len()).collect();
        let batch_size = triples.len().div_ceil(params.batches_count);

        let mut summary = TrainingSummary::default();
        let mut entity_grads = GradBuffer::default();
        let mut relation_grads = GradBuffer::default();

        for epoch in 0..params.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut num_pairs = 0usize;

            for batch in order.chunks(batch_size) {
                for &ti in batch {
                    let [s, p, o] = triples[ti];
                    let (h, r, t) = (entities.row(s), relations.row(p), entities.row(o));
                    let pos_score = self.scoring.score(h, r, t);

                    for _ in 0..params.eta {
                        let Some((ns, no)) = corrupt(&mut rng, [s, p, o], num_entities, &known)
                        else {
                            continue;
                        };
                        let (nh, nt) = (entities.row(ns), entities.row(no));
                        let neg_score = self.scoring.score(nh, r, nt);
                        num_pairs += 1;

                        let loss = params.margin - pos_score + neg_score;
                        if loss <= 0.0 {
                            continue;
                        }
                        epoch_loss += loss;

                        // Descend on the loss: raise the positive, lower the negative.
                        let (dh, dr, dt) = self.scoring.gradients(h, r, t);
                        entity_grads.add(s, &dh, -1.0);
                        relation_grads.add(p, &dr, -1.0);
                        entity_grads.add(o, &dt, -1.0);

                        let (dh, dr, dt) = self.scoring.gradients(nh, r, nt);
                        entity_grads.add(ns, &dh, 1.0);
                        relation_grads.add(p, &dr, 1.0);
                        entity_grads.add(no, &dt, 1.0);
                    }
                }

                entity_grads.flush(&mut entities, params.optimizer, params.learning_rate);
                relation_grads.flush(&mut relations, params.optimizer, params.learning_rate);

                if translational {
                    entities.clip_rows(1.0);
                }
            }

            let avg_loss = if num_pairs > 0 {
                epoch_loss / num_pairs as f32
            } else {
                0.0
            };
            debug!(epoch, loss = avg_loss, "epoch complete");

            summary.loss_history.push(avg_loss);
            summary.epochs_run = epoch + 1;
        }

        let store = EmbeddingStore {
            entities: entities.into_table(Kind::Entity)?,
            relations: relations.into_table(Kind::Relation)?,
        };
        Ok((store, summary))
    }
}

/// Replace the subject or the object with a different entity.
///
/// Returns `None` when there is no other entity to swap in.
fn corrupt(
    rng: &mut XorShiftRng,
    [s, p, o]: EncodedTriple,
    num_entities: usize,
    known: &HashSet<EncodedTriple>,
) -> Option<(usize, usize)> {
    if num_entities < 2 {
        return None;
    }

    let mut candidate = (s, o);
    for _ in 0..MAX_CORRUPTION_TRIES {
        let corrupt_subject = rng.random_bool(0.5);
        let offset = 1 + rng.random_range(0..num_entities - 1);
        candidate = if corrupt_subject {
            ((s + offset) % num_entities, o)
        } else {
            (s, (o + offset) % num_entities)
        };
        if !known.contains(&[candidate.0, p, candidate.1]) {
            break;
        }
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Norm;

    fn toy_triples() -> Vec<EncodedTriple> {
        // a=0 b=1 c=2 d=3 f=4 e=5, y=0
        vec![
            [0, 0, 1],
            [1, 0, 0],
            [0, 0, 2],
            [2, 0, 0],
            [0, 0, 3],
            [2, 0, 3],
            [1, 0, 2],
            [4, 0, 5],
        ]
    }

    fn params() -> Hyperparams {
        Hyperparams::default()
            .with_k(8)
            .with_epochs(10)
            .with_batches_count(2)
            .with_seed(42)
    }

    #[test]
    fn test_training_shapes() {
        let params = params();
        let trainer = Trainer::new(ScoringFunction::TransE { norm: Norm::L1 }, &params);
        let (store, summary) = trainer.train(&toy_triples(), 6, 1).unwrap();

        assert_eq!(store.entities.row_count(), 6);
        assert_eq!(store.relations.row_count(), 1);
        assert_eq!(store.width(), 8);
        assert_eq!(summary.epochs_run, 10);
        assert_eq!(summary.loss_history.len(), 10);
        assert!(summary.final_loss().is_finite());
    }

    #[test]
    fn test_complex_rows_are_double_width() {
        let params = params();
        let trainer = Trainer::new(ScoringFunction::ComplEx, &params);
        let (store, _) = trainer.train(&toy_triples(), 6, 1).unwrap();
        assert_eq!(store.width(), 16);
    }

    #[test]
    fn test_training_is_deterministic() {
        let params = params();
        for scoring in [
            ScoringFunction::TransE { norm: Norm::L2 },
            ScoringFunction::DistMult,
            ScoringFunction::ComplEx,
        ] {
            let trainer = Trainer::new(scoring, &params);
            let (first, loss_a) = trainer.train(&toy_triples(), 6, 1).unwrap();
            let (second, loss_b) = trainer.train(&toy_triples(), 6, 1).unwrap();
            assert_eq!(first, second);
            assert_eq!(loss_a, loss_b);
        }
    }

    #[test]
    fn test_seed_changes_tables() {
        let a = params();
        let b = params().with_seed(43);
        let scoring = ScoringFunction::DistMult;
        let (first, _) = Trainer::new(scoring, &a).train(&toy_triples(), 6, 1).unwrap();
        let (second, _) = Trainer::new(scoring, &b).train(&toy_triples(), 6, 1).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_transe_entities_stay_in_unit_ball() {
        let params = params().with_learning_rate(0.5);
        let trainer = Trainer::new(ScoringFunction::TransE { norm: Norm::L1 }, &params);
        let (store, _) = trainer.train(&toy_triples(), 6, 1).unwrap();

        for row in store.entities.view().rows() {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!(norm <= 1.0 + 1e-5, "row norm {}", norm);
        }
    }

    #[test]
    fn test_single_entity_has_no_negatives() {
        let params = params();
        let trainer = Trainer::new(ScoringFunction::DistMult, &params);
        let (_, summary) = trainer.train(&[[0, 0, 0]], 1, 1).unwrap();
        assert!(summary.loss_history.iter().all(|&l| l == 0.0));
    }

    #[test]
    fn test_rejects_out_of_vocabulary_indices() {
        let params = params();
        let trainer = Trainer::new(ScoringFunction::DistMult, &params);
        assert!(matches!(
            trainer.train(&[[0, 0, 7]], 2, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(trainer.train(&[], 2, 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_corruption_avoids_known_positives() {
        let mut rng = XorShiftRng::seed_from_u64(1);
        let known: HashSet<EncodedTriple> = [[0, 0, 1], [0, 0, 2], [1, 0, 2]].into_iter().collect();
        for _ in 0..100 {
            let (s, o) = corrupt(&mut rng, [0, 0, 1], 10, &known).unwrap();
            assert!((s, o) != (0, 1));
            assert!(s == 0 || o == 1);
        }
    }
}
