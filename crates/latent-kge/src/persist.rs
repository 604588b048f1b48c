//! Model snapshots on disk.
//!
//! A snapshot is a directory:
//!
//! ```text
//! model/
//! ├── metadata.json    format version, variant, hyperparameters, vocabularies
//! └── embeddings.bin   entity and relation tables (bincode)
//! ```
//!
//! Saving writes both files into a staging directory beside the target and
//! renames it into place, so readers never observe a half-written snapshot.
//! Every failure on the restore path is reported as [`Error::Persistence`].

use crate::config::{Hyperparams, Optimizer};
use crate::error::{Error, Result};
use crate::model::EmbeddingModel;
use crate::scoring::{ModelKind, Norm};
use crate::store::EmbeddingStore;
use crate::vocab::{Kind, Vocabulary};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

const METADATA_FILE: &str = "metadata.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    format_version: u32,
    model: String,
    hyperparams: StoredHyperparams,
    is_fitted: bool,
    entities: Vocabulary,
    relations: Vocabulary,
}

/// [`Hyperparams`] as written to `metadata.json`: every field is required.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredHyperparams {
    k: usize,
    eta: usize,
    epochs: usize,
    batches_count: usize,
    seed: u64,
    learning_rate: f32,
    margin: f32,
    norm: Norm,
    optimizer: Optimizer,
}

impl From<&Hyperparams> for StoredHyperparams {
    fn from(params: &Hyperparams) -> Self {
        Self {
            k: params.k,
            eta: params.eta,
            epochs: params.epochs,
            batches_count: params.batches_count,
            seed: params.seed,
            learning_rate: params.learning_rate,
            margin: params.margin,
            norm: params.norm,
            optimizer: params.optimizer,
        }
    }
}

impl From<StoredHyperparams> for Hyperparams {
    fn from(stored: StoredHyperparams) -> Self {
        Self {
            k: stored.k,
            eta: stored.eta,
            epochs: stored.epochs,
            batches_count: stored.batches_count,
            seed: stored.seed,
            learning_rate: stored.learning_rate,
            margin: stored.margin,
            norm: stored.norm,
            optimizer: stored.optimizer,
        }
    }
}

/// Write `model` to the snapshot directory `path`, replacing any existing one.
pub fn save_model(model: &EmbeddingModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let staging = staging_dir(path)?;

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| persistence(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| persistence(&staging, e))?;

    if let Err(e) = write_snapshot(model, &staging).and_then(|()| replace(&staging, path)) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    info!(
        path = %path.display(),
        model = %model.kind(),
        entities = model.num_entities(),
        relations = model.num_relations(),
        "saved model"
    );
    Ok(())
}

/// Load a model previously written by [`save_model`].
pub fn restore_model(path: impl AsRef<Path>) -> Result<EmbeddingModel> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(Error::Persistence(format!(
            "{}: no model snapshot found",
            path.display()
        )));
    }

    let metadata_path = path.join(METADATA_FILE);
    let file = File::open(&metadata_path).map_err(|e| persistence(&metadata_path, e))?;
    let metadata: Metadata = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| persistence(&metadata_path, e))?;

    if metadata.format_version != FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "{}: unsupported format version {} (expected {})",
            metadata_path.display(),
            metadata.format_version,
            FORMAT_VERSION
        )));
    }
    let kind: ModelKind = metadata
        .model
        .parse()
        .map_err(|e| persistence(&metadata_path, e))?;

    let embeddings_path = path.join(EMBEDDINGS_FILE);
    let file = File::open(&embeddings_path).map_err(|e| persistence(&embeddings_path, e))?;
    let mut store: EmbeddingStore = bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| persistence(&embeddings_path, e))?;
    store.entities = store.entities.with_kind(Kind::Entity);
    store.relations = store.relations.with_kind(Kind::Relation);

    let model = EmbeddingModel::from_parts(
        kind,
        metadata.hyperparams.into(),
        metadata.entities.with_kind(Kind::Entity),
        metadata.relations.with_kind(Kind::Relation),
        store,
        metadata.is_fitted,
    )
    .map_err(|e| persistence(path, e))?;

    info!(
        path = %path.display(),
        model = %kind,
        entities = model.num_entities(),
        relations = model.num_relations(),
        "restored model"
    );
    Ok(model)
}

fn write_snapshot(model: &EmbeddingModel, dir: &Path) -> Result<()> {
    let metadata = Metadata {
        format_version: FORMAT_VERSION,
        model: model.kind().name().to_string(),
        hyperparams: model.hyperparams().into(),
        is_fitted: model.is_fitted(),
        entities: model.entity_vocabulary().clone(),
        relations: model.relation_vocabulary().clone(),
    };

    let metadata_path = dir.join(METADATA_FILE);
    let mut writer = create(&metadata_path)?;
    serde_json::to_writer_pretty(&mut writer, &metadata)
        .map_err(|e| persistence(&metadata_path, e))?;
    finish(writer, &metadata_path)?;

    let embeddings_path = dir.join(EMBEDDINGS_FILE);
    let mut writer = create(&embeddings_path)?;
    bincode::serialize_into(&mut writer, model.store())
        .map_err(|e| persistence(&embeddings_path, e))?;
    finish(writer, &embeddings_path)
}

/// Move the finished staging directory over `path`.
fn replace(staging: &Path, path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| persistence(path, e))?;
    }
    fs::rename(staging, path).map_err(|e| persistence(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| persistence(path, e))
}

/// Flush and fsync.
fn finish(writer: BufWriter<File>, path: &Path) -> Result<()> {
    let file = writer
        .into_inner()
        .map_err(|e| persistence(path, e.error()))?;
    file.sync_all().map_err(|e| persistence(path, e))
}

fn staging_dir(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        Error::Persistence(format!("{}: not a snapshot directory name", path.display()))
    })?;
    let mut staging = std::ffi::OsString::from(".");
    staging.push(name);
    staging.push(".staging");
    Ok(path.with_file_name(staging))
}

fn persistence(path: &Path, err: impl Display) -> Error {
    Error::Persistence(format!("{}: {}", path.display(), err))
}
