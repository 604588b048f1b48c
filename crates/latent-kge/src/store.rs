//! Dense embedding tables addressed by vocabulary index.
//!
//! One table per [`Kind`]. Rows have a fixed width chosen at construction
//! and tables grow strictly by appending: writing row `n` of an `n`-row table
//! appends, writing any row beyond that is an error.

use crate::error::{Error, Result};
use crate::vocab::Kind;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Fixed-width row table backed by an `Array2<f32>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTable {
    kind: Kind,
    rows: Array2<f32>,
}

impl EmbeddingTable {
    /// Create an empty table with rows of `width` floats.
    pub fn new(kind: Kind, width: usize) -> Self {
        Self {
            kind,
            rows: Array2::zeros((0, width)),
        }
    }

    /// Wrap an existing `[rows, width]` matrix.
    pub fn from_array(kind: Kind, rows: Array2<f32>) -> Self {
        Self { kind, rows }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.rows.ncols()
    }

    pub fn row_count(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Row at `index`.
    pub fn get(&self, index: usize) -> Result<ArrayView1<'_, f32>> {
        if index >= self.row_count() {
            return Err(self.out_of_range(index));
        }
        Ok(self.rows.row(index))
    }

    /// Row at `index` as a contiguous slice.
    pub fn row_slice(&self, index: usize) -> Result<&[f32]> {
        self.get(index)?.to_slice().ok_or_else(|| {
            Error::InvalidInput(format!("{} row {} is not contiguous", self.kind, index))
        })
    }

    /// Overwrite row `index`, or append when `index == row_count()`.
    pub fn set(&mut self, index: usize, vector: &[f32]) -> Result<()> {
        if vector.len() != self.width() {
            return Err(Error::DimensionMismatch {
                expected: self.width(),
                got: vector.len(),
            });
        }

        let len = self.row_count();
        if index < len {
            self.rows
                .row_mut(index)
                .iter_mut()
                .zip(vector)
                .for_each(|(dst, src)| *dst = *src);
            Ok(())
        } else if index == len {
            self.rows
                .push(Axis(0), ArrayView1::from(vector))
                .map_err(|e| Error::InvalidInput(format!("cannot append row: {}", e)))
        } else {
            Err(self.out_of_range(index))
        }
    }

    /// Append a row and return its index.
    pub fn push(&mut self, vector: &[f32]) -> Result<usize> {
        let index = self.row_count();
        self.set(index, vector)?;
        Ok(index)
    }

    /// The whole table as a `[rows, width]` view.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.rows.view()
    }

    pub(crate) fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::IndexOutOfRange {
            kind: self.kind,
            index,
            len: self.row_count(),
        }
    }
}

/// Entity and relation tables of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStore {
    pub(crate) entities: EmbeddingTable,
    pub(crate) relations: EmbeddingTable,
}

impl EmbeddingStore {
    /// Empty tables sharing one row width.
    pub fn new(width: usize) -> Self {
        Self {
            entities: EmbeddingTable::new(Kind::Entity, width),
            relations: EmbeddingTable::new(Kind::Relation, width),
        }
    }

    pub fn table(&self, kind: Kind) -> &EmbeddingTable {
        match kind {
            Kind::Entity => &self.entities,
            Kind::Relation => &self.relations,
        }
    }

    pub fn table_mut(&mut self, kind: Kind) -> &mut EmbeddingTable {
        match kind {
            Kind::Entity => &mut self.entities,
            Kind::Relation => &mut self.relations,
        }
    }

    pub fn get(&self, index: usize, kind: Kind) -> Result<ArrayView1<'_, f32>> {
        self.table(kind).get(index)
    }

    pub fn set(&mut self, index: usize, kind: Kind, vector: &[f32]) -> Result<()> {
        self.table_mut(kind).set(index, vector)
    }

    pub fn width(&self) -> usize {
        self.entities.width()
    }
}
