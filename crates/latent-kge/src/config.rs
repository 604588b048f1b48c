//! Model hyperparameters.

use crate::error::{Error, Result};
use crate::scoring::{Norm, MAX_ROW_WIDTH};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parameter update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Optimizer {
    /// Plain stochastic gradient descent.
    Sgd,
    /// AdaGrad: per-parameter step sizes from accumulated squared gradients.
    #[default]
    Adagrad,
}

/// Hyperparameters shared by every model variant.
///
/// Stored verbatim in snapshots; two models with equal hyperparameters and
/// equal training triples produce bit-identical embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    /// Embedding size (default: 100). ComplEx stores `2k` floats per row.
    pub k: usize,
    /// Negative samples per positive triple (default: 2).
    pub eta: usize,
    /// Training epochs (default: 100).
    pub epochs: usize,
    /// Number of batches per epoch (default: 100).
    pub batches_count: usize,
    /// Random seed (default: 0).
    pub seed: u64,
    /// Learning rate (default: 0.1).
    pub learning_rate: f32,
    /// Margin for the pairwise ranking loss (default: 1.0).
    pub margin: f32,
    /// Distance norm, TransE only (default: L1).
    pub norm: Norm,
    /// Update rule (default: AdaGrad).
    pub optimizer: Optimizer,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            k: 100,
            eta: 2,
            epochs: 100,
            batches_count: 100,
            seed: 0,
            learning_rate: 0.1,
            margin: 1.0,
            norm: Norm::L1,
            optimizer: Optimizer::Adagrad,
        }
    }
}

impl Hyperparams {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_eta(mut self, eta: usize) -> Self {
        self.eta = eta;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batches_count(mut self, batches_count: usize) -> Self {
        self.batches_count = batches_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let params: Self = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject values the trainer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be positive".into()));
        }
        // ComplEx stores 2k floats per row
        if self.k > MAX_ROW_WIDTH / 2 {
            return Err(Error::InvalidConfig(format!("k = {} is too large", self.k)));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be positive".into()));
        }
        if self.batches_count == 0 {
            return Err(Error::InvalidConfig("batches_count must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}
