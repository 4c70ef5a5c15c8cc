//! Error and warning types shared by the loaders and the numeric core

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::data::{ClusterLabel, Feature};

/// Errors raised by table loading, item-set parsing and the projection
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("insufficient data: need at least {required} {what}, found {found}")]
    InsufficientData {
        required: usize,
        found: usize,
        what: &'static str,
    },

    #[error("file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' has no value at row {row}")]
    NullValue { column: String, row: usize },

    #[error("column '{column}' has invalid value {value} at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("invalid item set '{input}': {reason}")]
    InvalidItemSet { input: String, reason: String },

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SegmentError {
    pub fn is_missing_file(&self) -> bool {
        matches!(self, SegmentError::MissingFile { .. })
    }
}

/// Non-fatal conditions surfaced alongside a result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// The selected cluster matched no records; averages are undefined
    EmptySelection { cluster: ClusterLabel },
    /// A feature has zero variance and was standardized to a constant zero
    DegenerateFeature { feature: Feature },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::EmptySelection { cluster } => {
                write!(f, "cluster {} has no customers", cluster)
            }
            DataWarning::DegenerateFeature { feature } => {
                write!(f, "feature {} has zero variance", feature)
            }
        }
    }
}

pub type SegmentResult<T> = std::result::Result<T, SegmentError>;
