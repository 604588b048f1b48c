//! Property-based tests for latent-kge.
//!
//! These tests verify invariants that should hold for any input:
//! - Vocabulary indices are dense and follow first-seen order
//! - Embedding tables only grow by appending
//! - Lookups preserve the caller's order
//! - TransE inversion lands on a zero-distance triple

use proptest::prelude::*;

mod vocab_props {
    use super::*;
    use latent_kge::{Kind, Triple, Vocabulary};
    use std::collections::HashSet;

    fn arb_entity_id() -> impl Strategy<Value = String> {
        "[a-f]{1,2}".prop_map(|s| s)
    }

    fn arb_relation() -> impl Strategy<Value = String> {
        "[x-z]".prop_map(|s| s)
    }

    prop_compose! {
        fn arb_triple()(
            subject in arb_entity_id(),
            predicate in arb_relation(),
            object in arb_entity_id(),
        ) -> Triple {
            Triple::new(subject, predicate, object)
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn indices_are_dense(triples in prop::collection::vec(arb_triple(), 0..40)) {
            let (entities, relations) = Vocabulary::build(&triples);

            for vocab in [&entities, &relations] {
                for index in 0..vocab.len() {
                    let name = vocab.name_of(index).unwrap();
                    prop_assert_eq!(vocab.index_of(name), Some(index));
                }
                prop_assert_eq!(vocab.name_of(vocab.len()), None);
            }
            prop_assert_eq!(entities.kind(), Kind::Entity);
            prop_assert_eq!(relations.kind(), Kind::Relation);
        }

        #[test]
        fn first_seen_order(triples in prop::collection::vec(arb_triple(), 0..40)) {
            let (entities, relations) = Vocabulary::build(&triples);

            let mut seen = HashSet::new();
            let mut expected_entities = Vec::new();
            let mut expected_relations = Vec::new();
            for t in &triples {
                for id in [&t.subject, &t.object] {
                    if seen.insert(id.clone()) {
                        expected_entities.push(id.as_str());
                    }
                }
                if !expected_relations.contains(&t.predicate.as_str()) {
                    expected_relations.push(t.predicate.as_str());
                }
            }

            prop_assert_eq!(entities.iter().collect::<Vec<_>>(), expected_entities);
            prop_assert_eq!(relations.iter().collect::<Vec<_>>(), expected_relations);
        }
    }
}

mod store_props {
    use super::*;
    use latent_kge::{EmbeddingTable, Error, Kind};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn writes_append_or_overwrite(writes in prop::collection::vec(0usize..8, 0..30)) {
            let mut table = EmbeddingTable::new(Kind::Entity, 3);

            for (step, index) in writes.into_iter().enumerate() {
                let before = table.row_count();
                let row = [step as f32, 0.0, 1.0];
                let result = table.set(index, &row);

                if index <= before {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(table.row_count(), before.max(index + 1));
                    prop_assert_eq!(table.get(index).unwrap().to_vec(), row.to_vec());
                } else {
                    let is_out_of_range = matches!(result, Err(Error::IndexOutOfRange { .. }));
                    prop_assert!(is_out_of_range);
                    prop_assert_eq!(table.row_count(), before);
                }
            }
        }
    }
}

mod model_props {
    use super::*;
    use latent_kge::{EmbeddingModel, Hyperparams, Kind, ModelKind, Triple};

    const ENTITIES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

    fn small_model(kind: ModelKind) -> EmbeddingModel {
        let params = Hyperparams::default()
            .with_k(4)
            .with_epochs(2)
            .with_batches_count(1)
            .with_seed(11);
        let mut model = EmbeddingModel::new(kind, params).unwrap();
        model
            .fit(&[
                Triple::from_strs("a", "y", "b"),
                Triple::from_strs("c", "y", "d"),
                Triple::from_strs("f", "y", "e"),
            ])
            .unwrap();
        model
    }

    fn arb_kind() -> impl Strategy<Value = ModelKind> {
        prop::sample::select(ModelKind::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn lookup_follows_request_order(
            kind in arb_kind(),
            order in Just(ENTITIES.to_vec()).prop_shuffle(),
        ) {
            let model = small_model(kind);
            let batch = model.get_embeddings(&order, Kind::Entity).unwrap();

            prop_assert_eq!(batch.len(), order.len());
            for (id, vector) in order.iter().zip(&batch) {
                prop_assert_eq!(vector, &model.get_embedding(id, Kind::Entity).unwrap());
            }
        }
    }
}

mod scoring_props {
    use super::*;
    use latent_kge::{Norm, Orientation, ScoringFunction};

    fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, dim)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn transe_invert_is_zero_distance(
            (h, r) in (1usize..16).prop_flat_map(|d| (arb_vector(d), arb_vector(d))),
            l2 in any::<bool>(),
        ) {
            let norm = if l2 { Norm::L2 } else { Norm::L1 };
            let scorer = ScoringFunction::TransE { norm };

            let t = scorer.invert(&h, &r, Orientation::KnownSubject);
            prop_assert!(scorer.score(&h, &r, &t).abs() < 1e-4);

            let back = scorer.invert(&t, &r, Orientation::KnownObject);
            prop_assert!(scorer.score(&back, &r, &t).abs() < 1e-4);
            for (x, y) in back.iter().zip(&h) {
                prop_assert!((x - y).abs() < 1e-5);
            }
        }

        #[test]
        fn transe_score_is_non_positive(
            (h, r, t) in (1usize..16).prop_flat_map(|d| (arb_vector(d), arb_vector(d), arb_vector(d))),
        ) {
            let scorer = ScoringFunction::TransE { norm: Norm::L1 };
            prop_assert!(scorer.score(&h, &r, &t) <= 0.0);
        }
    }
}
