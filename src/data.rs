//! Customer segment table: record types and CSV loading using Polars

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::Array2;
use polars::prelude::*;
use serde::Serialize;

use crate::error::{SegmentError, SegmentResult};

const CUSTOMER_ID: &str = "CustomerID";

/// Segment label assigned to a customer by the upstream clustering step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClusterLabel(pub i64);

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClusterLabel {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ClusterLabel)
    }
}

/// The three behavioral features, in matrix column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Feature {
    Recency,
    Frequency,
    Monetary,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Recency, Feature::Frequency, Feature::Monetary];

    /// Column index in the feature matrix
    pub fn index(self) -> usize {
        match self {
            Feature::Recency => 0,
            Feature::Frequency => 1,
            Feature::Monetary => 2,
        }
    }

    /// Column name in the RFM CSV
    pub fn column_name(self) -> &'static str {
        match self {
            Feature::Recency => "Recency",
            Feature::Frequency => "Frequency",
            Feature::Monetary => "Monetary",
        }
    }

    pub fn value(self, record: &CustomerSegmentRecord) -> f64 {
        match self {
            Feature::Recency => record.recency,
            Feature::Frequency => record.frequency as f64,
            Feature::Monetary => record.monetary,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One customer row of the RFM table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSegmentRecord {
    /// `CustomerID` column, or the 1-based row number when the column is absent
    pub customer_id: String,
    /// Days since last purchase
    pub recency: f64,
    /// Number of purchases
    pub frequency: u64,
    /// Total spend
    pub monetary: f64,
    pub cluster: ClusterLabel,
}

impl CustomerSegmentRecord {
    pub fn new(
        customer_id: impl Into<String>,
        recency: f64,
        frequency: u64,
        monetary: f64,
        cluster: ClusterLabel,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            recency,
            frequency,
            monetary,
            cluster,
        }
    }
}

/// Load the RFM table with its upstream cluster assignments
///
/// # Arguments
/// * `file_path` - Path to a CSV with `Recency`, `Frequency`, `Monetary`,
///   `Cluster` and optionally `CustomerID` columns
///
/// # Returns
/// * One record per row, in file order
pub fn load_rfm_table(file_path: impl AsRef<Path>) -> SegmentResult<Vec<CustomerSegmentRecord>> {
    let frame = read_csv_with_text_columns(file_path.as_ref(), &[CUSTOMER_ID])?;
    let records = records_from_frame(&frame)?;

    tracing::debug!(
        path = %file_path.as_ref().display(),
        customers = records.len(),
        "loaded RFM table"
    );

    Ok(records)
}

/// Convert an RFM DataFrame into validated records
pub fn records_from_frame(frame: &DataFrame) -> SegmentResult<Vec<CustomerSegmentRecord>> {
    let recency = float_values(frame, Feature::Recency.column_name())?;
    let frequency = int_values(frame, Feature::Frequency.column_name())?;
    let monetary = float_values(frame, Feature::Monetary.column_name())?;
    let clusters = int_values(frame, "Cluster")?;

    let customer_ids = if frame.column(CUSTOMER_ID).is_ok() {
        string_values(frame, CUSTOMER_ID)?
    } else {
        (1..=frame.height()).map(|row| row.to_string()).collect()
    };

    let mut records = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let recency = non_negative(Feature::Recency.column_name(), row, recency[row])?;
        let monetary = non_negative(Feature::Monetary.column_name(), row, monetary[row])?;
        let frequency = u64::try_from(frequency[row]).map_err(|_| SegmentError::InvalidValue {
            column: Feature::Frequency.column_name().to_string(),
            row,
            value: frequency[row].to_string(),
        })?;

        records.push(CustomerSegmentRecord {
            customer_id: customer_ids[row].clone(),
            recency,
            frequency,
            monetary,
            cluster: ClusterLabel(clusters[row]),
        });
    }

    Ok(records)
}

/// Distinct cluster labels present in the table, ascending
pub fn distinct_clusters(records: &[CustomerSegmentRecord]) -> Vec<ClusterLabel> {
    records
        .iter()
        .map(|record| record.cluster)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Records belonging to one cluster, in table order
pub fn cluster_members(
    records: &[CustomerSegmentRecord],
    cluster: ClusterLabel,
) -> Vec<&CustomerSegmentRecord> {
    records
        .iter()
        .filter(|record| record.cluster == cluster)
        .collect()
}

/// Raw feature matrix (n_customers, 3) in `Feature::ALL` column order
pub fn feature_matrix(records: &[CustomerSegmentRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), Feature::ALL.len()), |(row, col)| {
        Feature::ALL[col].value(&records[row])
    })
}

pub(crate) fn read_csv(path: &Path) -> SegmentResult<DataFrame> {
    read_csv_with_text_columns(path, &[])
}

/// Read a CSV, keeping `text_columns` as strings instead of inferring numbers
///
/// Identifiers such as `007` keep their leading zeros.
pub(crate) fn read_csv_with_text_columns(path: &Path, text_columns: &[&str]) -> SegmentResult<DataFrame> {
    if !path.exists() {
        return Err(SegmentError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let mut overwrite = Schema::default();
    if !text_columns.is_empty() {
        let header = CsvReadOptions::default()
            .with_has_header(true)
            .with_n_rows(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        for &name in text_columns {
            if header.column(name).is_ok() {
                overwrite.with_column(name.into(), DataType::String);
            }
        }
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(overwrite)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(frame)
}

fn column<'a>(frame: &'a DataFrame, name: &str) -> SegmentResult<&'a Column> {
    frame.column(name).map_err(|_| SegmentError::MissingColumn {
        column: name.to_string(),
    })
}

pub(crate) fn float_values(frame: &DataFrame, name: &str) -> SegmentResult<Vec<f64>> {
    let values = column(frame, name)?.cast(&DataType::Float64)?;
    values
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| null_value(name, row)))
        .collect()
}

/// Integer column values; float columns must hold whole numbers
pub(crate) fn int_values(frame: &DataFrame, name: &str) -> SegmentResult<Vec<i64>> {
    let source = column(frame, name)?;
    if source.dtype().is_float() {
        return float_values(frame, name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| whole_number(name, row, value))
            .collect();
    }

    let values = source.strict_cast(&DataType::Int64)?;
    values
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| null_value(name, row)))
        .collect()
}

pub(crate) fn string_values(frame: &DataFrame, name: &str) -> SegmentResult<Vec<String>> {
    let values = column(frame, name)?.cast(&DataType::String)?;
    values
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(|text| text.to_string())
                .ok_or_else(|| null_value(name, row))
        })
        .collect()
}

fn null_value(column: &str, row: usize) -> SegmentError {
    SegmentError::NullValue {
        column: column.to_string(),
        row,
    }
}

fn whole_number(column: &str, row: usize, value: f64) -> SegmentResult<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(SegmentError::InvalidValue {
            column: column.to_string(),
            row,
            value: value.to_string(),
        })
    }
}

fn non_negative(column: &str, row: usize, value: f64) -> SegmentResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SegmentError::InvalidValue {
            column: column.to_string(),
            row,
            value: value.to_string(),
        })
    }
}
