//! Scoring functions for knowledge graph embeddings.
//!
//! Each variant provides three things:
//!
//! - `score(h, r, t)`: plausibility, higher is more plausible
//! - `gradients(h, r, t)`: partial derivatives of the score, used by the trainer
//! - `invert(known, r, orientation)`: the vector the scorer expects on the
//!   missing side of a triple, used to approximate out-of-graph entities
//!
//! | Model | Score | Invert (known subject) | Invert (known object) |
//! |-------|-------|------------------------|-----------------------|
//! | TransE | -‖h + r - t‖ₚ | h + r | t - r |
//! | DistMult | Σ hᵢ rᵢ tᵢ | h ⊙ r | r ⊙ t |
//! | ComplEx | Re(⟨h, r, conj(t)⟩) | h ⊙ r | conj(r) ⊙ t |
//!
//! ComplEx vectors hold `2k` floats with real and imaginary parts interleaved.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest row width an `f32` table can address.
pub const MAX_ROW_WIDTH: usize = isize::MAX as usize / std::mem::size_of::<f32>();

/// Model variant tag, stored in snapshots and used to pick a scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    TransE,
    DistMult,
    ComplEx,
}

impl ModelKind {
    /// Every supported variant.
    pub const ALL: [ModelKind; 3] = [ModelKind::TransE, ModelKind::DistMult, ModelKind::ComplEx];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TransE => "TransE",
            Self::DistMult => "DistMult",
            Self::ComplEx => "ComplEx",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown model: {}", s)))
    }
}

/// Distance norm used by TransE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Norm {
    #[default]
    L1,
    L2,
}

/// Which endpoint of a triple is already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `(known, r, ?)`
    KnownSubject,
    /// `(?, r, known)`
    KnownObject,
}

/// Gradients of the score with respect to head, relation and tail.
pub type Gradients = (Vec<f32>, Vec<f32>, Vec<f32>);

/// Scoring function of one model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringFunction {
    /// TransE: -||h + r - t||
    TransE { norm: Norm },
    /// DistMult: <h, r, t>
    DistMult,
    /// ComplEx: Re(<h, r, conj(t)>)
    ComplEx,
}

impl ScoringFunction {
    /// The scorer registered for a model tag.
    pub fn for_kind(kind: ModelKind, norm: Norm) -> Self {
        match kind {
            ModelKind::TransE => Self::TransE { norm },
            ModelKind::DistMult => Self::DistMult,
            ModelKind::ComplEx => Self::ComplEx,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::TransE { .. } => ModelKind::TransE,
            Self::DistMult => ModelKind::DistMult,
            Self::ComplEx => ModelKind::ComplEx,
        }
    }

    /// Stored row width for embedding size `k`.
    ///
    /// Fails when the width overflows or exceeds what one `f32` table can hold.
    pub fn row_width(&self, k: usize) -> Result<usize> {
        let width = match self {
            Self::ComplEx => k.checked_mul(2),
            _ => Some(k),
        };
        width
            .filter(|&w| w <= MAX_ROW_WIDTH)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("k = {} is too large for {}", k, self.kind()))
            })
    }

    /// Compute score for embeddings.
    pub fn score(&self, head: &[f32], relation: &[f32], tail: &[f32]) -> f32 {
        match self {
            Self::TransE { norm } => score_transe(head, relation, tail, *norm),
            Self::DistMult => score_distmult(head, relation, tail),
            Self::ComplEx => score_complex(head, relation, tail),
        }
    }

    /// Partial derivatives of [`score`](Self::score).
    pub fn gradients(&self, head: &[f32], relation: &[f32], tail: &[f32]) -> Gradients {
        match self {
            Self::TransE { norm } => grad_transe(head, relation, tail, *norm),
            Self::DistMult => grad_distmult(head, relation, tail),
            Self::ComplEx => grad_complex(head, relation, tail),
        }
    }

    /// Partner vector for the unknown endpoint of a triple.
    pub fn invert(&self, known: &[f32], relation: &[f32], orientation: Orientation) -> Vec<f32> {
        match (self, orientation) {
            (Self::TransE { .. }, Orientation::KnownSubject) => {
                known.iter().zip(relation).map(|(h, r)| h + r).collect()
            }
            (Self::TransE { .. }, Orientation::KnownObject) => {
                known.iter().zip(relation).map(|(t, r)| t - r).collect()
            }
            (Self::DistMult, _) => known.iter().zip(relation).map(|(e, r)| e * r).collect(),
            (Self::ComplEx, Orientation::KnownSubject) => complex_product(known, relation, false),
            (Self::ComplEx, Orientation::KnownObject) => complex_product(known, relation, true),
        }
    }
}

/// TransE scoring: -||h + r - t||_p
fn score_transe(head: &[f32], relation: &[f32], tail: &[f32], norm: Norm) -> f32 {
    let diffs = head.iter().zip(relation).zip(tail).map(|((h, r), t)| h + r - t);
    match norm {
        Norm::L1 => -diffs.map(f32::abs).sum::<f32>(),
        Norm::L2 => -diffs.map(|d| d * d).sum::<f32>().sqrt(),
    }
}

fn grad_transe(head: &[f32], relation: &[f32], tail: &[f32], norm: Norm) -> Gradients {
    let diff: Vec<f32> = head
        .iter()
        .zip(relation)
        .zip(tail)
        .map(|((h, r), t)| h + r - t)
        .collect();

    // d(score)/dt; head and relation get the negation.
    let dt: Vec<f32> = match norm {
        Norm::L1 => diff
            .iter()
            .map(|&d| if d > 0.0 { 1.0 } else if d < 0.0 { -1.0 } else { 0.0 })
            .collect(),
        Norm::L2 => {
            let len = diff.iter().map(|d| d * d).sum::<f32>().sqrt().max(1e-8);
            diff.iter().map(|d| d / len).collect()
        }
    };
    let dh: Vec<f32> = dt.iter().map(|g| -g).collect();
    (dh.clone(), dh, dt)
}

/// DistMult scoring: <h, r, t>
fn score_distmult(head: &[f32], relation: &[f32], tail: &[f32]) -> f32 {
    head.iter()
        .zip(relation)
        .zip(tail)
        .map(|((h, r), t)| h * r * t)
        .sum()
}

fn grad_distmult(head: &[f32], relation: &[f32], tail: &[f32]) -> Gradients {
    let dh = relation.iter().zip(tail).map(|(r, t)| r * t).collect();
    let dr = head.iter().zip(tail).map(|(h, t)| h * t).collect();
    let dt = head.iter().zip(relation).map(|(h, r)| h * r).collect();
    (dh, dr, dt)
}

/// ComplEx scoring: Re(<h, r, conj(t)>).
fn score_complex(head: &[f32], relation: &[f32], tail: &[f32]) -> f32 {
    let dim = head.len() / 2;
    let mut score = 0.0;

    for i in 0..dim {
        let (h_re, h_im) = (head[2 * i], head[2 * i + 1]);
        let (r_re, r_im) = (relation[2 * i], relation[2 * i + 1]);
        let (t_re, t_im) = (tail[2 * i], tail[2 * i + 1]);

        // (h * r) = x + yi; Re((x + yi)(t_re - t_im i)) = x t_re + y t_im
        let x = h_re * r_re - h_im * r_im;
        let y = h_re * r_im + h_im * r_re;

        score += x * t_re + y * t_im;
    }
    score
}

fn grad_complex(head: &[f32], relation: &[f32], tail: &[f32]) -> Gradients {
    let n = head.len();
    let (mut dh, mut dr, mut dt) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);

    for i in 0..n / 2 {
        let (a, b) = (head[2 * i], head[2 * i + 1]);
        let (c, d) = (relation[2 * i], relation[2 * i + 1]);
        let (e, f) = (tail[2 * i], tail[2 * i + 1]);

        dh[2 * i] = c * e + d * f;
        dh[2 * i + 1] = c * f - d * e;
        dr[2 * i] = a * e + b * f;
        dr[2 * i + 1] = a * f - b * e;
        dt[2 * i] = a * c - b * d;
        dt[2 * i + 1] = a * d + b * c;
    }
    (dh, dr, dt)
}

/// Elementwise complex product `known * r`, or `known * conj(r)`.
fn complex_product(known: &[f32], relation: &[f32], conjugate: bool) -> Vec<f32> {
    let mut out = vec![0.0; known.len()];
    for i in 0..known.len() / 2 {
        let (a, b) = (known[2 * i], known[2 * i + 1]);
        let (c, d) = (relation[2 * i], relation[2 * i + 1]);
        let d = if conjugate { -d } else { d };
        out[2 * i] = a * c - b * d;
        out[2 * i + 1] = a * d + b * c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSE_L2: ScoringFunction = ScoringFunction::TransE { norm: Norm::L2 };
    const TRANSE_L1: ScoringFunction = ScoringFunction::TransE { norm: Norm::L1 };

    #[test]
    fn test_transe_scoring() {
        // h + r = t should have score close to 0 (best)
        let h = vec![1.0, 0.0, 0.0];
        let r = vec![0.0, 1.0, 0.0];
        let t = vec![1.0, 1.0, 0.0];

        assert!(TRANSE_L2.score(&h, &r, &t).abs() < 1e-6);
        assert!(TRANSE_L1.score(&h, &r, &t).abs() < 1e-6);

        let far = vec![0.0, 0.0, 2.0];
        assert!((TRANSE_L1.score(&h, &r, &far) + 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_distmult_scoring() {
        let h = vec![1.0, 0.5, 0.0];
        let r = vec![1.0, 1.0, 1.0];
        let t = vec![0.5, 1.0, 0.0];

        let score = ScoringFunction::DistMult.score(&h, &r, &t);
        assert!((score - 1.0).abs() < 1e-6); // 1*1*0.5 + 0.5*1*1 + 0*1*0 = 1.0
    }

    #[test]
    fn test_complex_scoring() {
        // h = 1+0i, r = 0+1i, t = 0+1i: h*r = i, Re(i * conj(i)) = 1
        let h = vec![1.0, 0.0];
        let r = vec![0.0, 1.0];
        let t = vec![0.0, 1.0];

        let score = ScoringFunction::ComplEx.score(&h, &r, &t);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_complex_is_asymmetric() {
        let h = vec![1.0, 0.0];
        let r = vec![0.0, 1.0];
        let t = vec![0.0, 1.0];

        let forward = ScoringFunction::ComplEx.score(&h, &r, &t);
        let backward = ScoringFunction::ComplEx.score(&t, &r, &h);
        assert!((forward - backward).abs() > 0.5);
    }

    /// Compare analytic gradients with central differences.
    fn check_gradients(scorer: ScoringFunction, h: &[f32], r: &[f32], t: &[f32]) {
        let eps = 1e-3;
        let (dh, dr, dt) = scorer.gradients(h, r, t);

        for (slot, grad) in [(0, &dh), (1, &dr), (2, &dt)] {
            for i in 0..h.len() {
                let mut args = [h.to_vec(), r.to_vec(), t.to_vec()];
                args[slot][i] += eps;
                let plus = scorer.score(&args[0], &args[1], &args[2]);
                args[slot][i] -= 2.0 * eps;
                let minus = scorer.score(&args[0], &args[1], &args[2]);
                let numeric = (plus - minus) / (2.0 * eps);
                assert!(
                    (numeric - grad[i]).abs() < 1e-2,
                    "{:?} slot {} index {}: numeric {} vs analytic {}",
                    scorer,
                    slot,
                    i,
                    numeric,
                    grad[i]
                );
            }
        }
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let h = [0.3, -0.2, 0.5, 0.1];
        let r = [-0.4, 0.6, 0.2, -0.3];
        let t = [0.1, 0.7, -0.5, 0.4];

        check_gradients(TRANSE_L1, &h, &r, &t);
        check_gradients(TRANSE_L2, &h, &r, &t);
        check_gradients(ScoringFunction::DistMult, &h, &r, &t);
        check_gradients(ScoringFunction::ComplEx, &h, &r, &t);
    }

    #[test]
    fn test_transe_invert_is_exact() {
        let h = vec![0.2, -0.4, 0.1];
        let r = vec![0.5, 0.5, -0.25];

        let t = TRANSE_L2.invert(&h, &r, Orientation::KnownSubject);
        assert!(TRANSE_L2.score(&h, &r, &t).abs() < 1e-6);

        let back = TRANSE_L2.invert(&t, &r, Orientation::KnownObject);
        for (a, b) in back.iter().zip(&h) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bilinear_invert_maximizes_score() {
        let known = vec![0.3, -0.2, 0.5, 0.1];
        let r = vec![-0.4, 0.6, 0.2, -0.3];
        let other = vec![0.1, 0.7, -0.5, 0.4];

        for scorer in [ScoringFunction::DistMult, ScoringFunction::ComplEx] {
            let tail = scorer.invert(&known, &r, Orientation::KnownSubject);
            let norm = tail.iter().map(|x| x * x).sum::<f32>().sqrt();
            let scale = norm / other.iter().map(|x| x * x).sum::<f32>().sqrt();
            let rival: Vec<f32> = other.iter().map(|x| x * scale).collect();
            assert!(scorer.score(&known, &r, &tail) >= scorer.score(&known, &r, &rival));

            let head = scorer.invert(&known, &r, Orientation::KnownObject);
            assert!(scorer.score(&head, &r, &known) >= scorer.score(&rival, &r, &known));
        }
    }

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("transe".parse::<ModelKind>().unwrap(), ModelKind::TransE);
        assert_eq!("ComplEx".parse::<ModelKind>().unwrap(), ModelKind::ComplEx);
        assert!("RotatE".parse::<ModelKind>().is_err());

        for kind in ModelKind::ALL {
            assert_eq!(ScoringFunction::for_kind(kind, Norm::L1).kind(), kind);
        }
    }

    #[test]
    fn test_row_width() {
        assert_eq!(TRANSE_L1.row_width(10).unwrap(), 10);
        assert_eq!(ScoringFunction::DistMult.row_width(10).unwrap(), 10);
        assert_eq!(ScoringFunction::ComplEx.row_width(10).unwrap(), 20);
    }

    #[test]
    fn test_row_width_overflow() {
        assert!(matches!(
            ScoringFunction::ComplEx.row_width(usize::MAX / 2 + 1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(TRANSE_L1.row_width(usize::MAX).is_err());
        assert!(ScoringFunction::ComplEx.row_width(MAX_ROW_WIDTH / 2).is_ok());
        assert!(ScoringFunction::ComplEx.row_width(MAX_ROW_WIDTH / 2 + 1).is_err());
    }
}
