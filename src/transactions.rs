//! Transaction lines and the country/season breakdowns shown beside the segments

use std::collections::{HashMap, HashSet};
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;

use crate::data::{float_values, int_values, read_csv, string_values};
use crate::error::{SegmentError, SegmentResult};

const COUNTRY: &str = "Country";
const SEASON: &str = "Season";
const CATEGORY: &str = "Category";
const SIZE: &str = "Size";
const GENDER: &str = "Gender";
const LINE_TOTAL: &str = "LineTotal";
const COUNT: &str = "count";
const REVENUE: &str = "revenue";

const REQUIRED_COLUMNS: [&str; 6] = [COUNTRY, SEASON, CATEGORY, SIZE, GENDER, LINE_TOTAL];

/// Size curve order; sizes outside it are not charted
pub const SIZE_ORDER: [&str; 5] = ["XS", "S", "M", "L", "XL"];
/// Calendar order of seasons for the revenue breakdown
pub const SEASON_ORDER: [&str; 4] = ["Winter", "Spring", "Summer", "Fall"];

/// Country and season selected by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionFilter {
    pub country: String,
    pub season: String,
}

/// Number of transaction lines carrying a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonRevenue {
    pub season: String,
    pub revenue: f64,
}

/// Transaction lines held as a Polars DataFrame
#[derive(Debug, Clone)]
pub struct TransactionTable {
    frame: DataFrame,
}

impl TransactionTable {
    /// Load transaction lines from CSV
    pub fn load(file_path: impl AsRef<Path>) -> SegmentResult<Self> {
        let table = Self::from_frame(read_csv(file_path.as_ref())?)?;

        tracing::debug!(
            path = %file_path.as_ref().display(),
            lines = table.len(),
            "loaded transactions"
        );

        Ok(table)
    }

    pub fn from_frame(frame: DataFrame) -> SegmentResult<Self> {
        for column in REQUIRED_COLUMNS {
            if frame.column(column).is_err() {
                return Err(SegmentError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }

        Ok(Self { frame })
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Countries in order of first appearance
    pub fn countries(&self) -> SegmentResult<Vec<String>> {
        self.distinct(COUNTRY)
    }

    /// Seasons in order of first appearance
    pub fn seasons(&self) -> SegmentResult<Vec<String>> {
        self.distinct(SEASON)
    }

    /// Lines matching both the country and the season of `filter`
    pub fn filtered(&self, filter: &TransactionFilter) -> SegmentResult<Self> {
        let frame = self
            .frame
            .clone()
            .lazy()
            .filter(
                col(COUNTRY)
                    .cast(DataType::String)
                    .eq(lit(filter.country.as_str()))
                    .and(col(SEASON).cast(DataType::String).eq(lit(filter.season.as_str()))),
            )
            .collect()?;

        tracing::debug!(
            country = %filter.country,
            season = %filter.season,
            lines = frame.height(),
            "filtered transactions"
        );

        Ok(Self { frame })
    }

    /// The `limit` most frequent categories, most frequent first
    pub fn top_categories(&self, limit: usize) -> SegmentResult<Vec<LabelCount>> {
        let mut counts = self.value_counts(CATEGORY)?;
        counts.truncate(limit);
        Ok(counts)
    }

    /// Line counts per size in `SIZE_ORDER`, zero for absent sizes
    pub fn size_distribution(&self) -> SegmentResult<Vec<LabelCount>> {
        let counts: HashMap<String, u64> = self
            .value_counts(SIZE)?
            .into_iter()
            .map(|entry| (entry.label, entry.count))
            .collect();

        Ok(SIZE_ORDER
            .iter()
            .map(|&size| LabelCount {
                label: size.to_string(),
                count: counts.get(size).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Line counts per gender, most frequent first
    pub fn gender_distribution(&self) -> SegmentResult<Vec<LabelCount>> {
        self.value_counts(GENDER)
    }

    /// Summed `LineTotal` per season in `SEASON_ORDER`, zero for absent seasons
    pub fn seasonal_revenue(&self) -> SegmentResult<Vec<SeasonRevenue>> {
        let totals = self
            .frame
            .clone()
            .lazy()
            .filter(col(SEASON).is_not_null())
            .group_by([col(SEASON).cast(DataType::String)])
            .agg([col(LINE_TOTAL).cast(DataType::Float64).sum().alias(REVENUE)])
            .collect()?;

        let revenue: HashMap<String, f64> = string_values(&totals, SEASON)?
            .into_iter()
            .zip(float_values(&totals, REVENUE)?)
            .collect();

        Ok(SEASON_ORDER
            .iter()
            .map(|&season| SeasonRevenue {
                season: season.to_string(),
                revenue: revenue.get(season).copied().unwrap_or(0.0),
            })
            .collect())
    }

    fn value_counts(&self, column: &str) -> SegmentResult<Vec<LabelCount>> {
        let grouped = self
            .frame
            .clone()
            .lazy()
            .filter(col(column).is_not_null())
            .group_by([col(column).cast(DataType::String)])
            .agg([len().alias(COUNT)])
            .collect()?;

        let mut counts: Vec<LabelCount> = string_values(&grouped, column)?
            .into_iter()
            .zip(int_values(&grouped, COUNT)?)
            .map(|(label, count)| LabelCount {
                label,
                count: count.max(0) as u64,
            })
            .collect();

        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        Ok(counts)
    }

    fn distinct(&self, column: &str) -> SegmentResult<Vec<String>> {
        let values = self
            .frame
            .clone()
            .lazy()
            .filter(col(column).is_not_null())
            .select([col(column).cast(DataType::String)])
            .collect()?;

        let mut seen = HashSet::new();
        Ok(string_values(&values, column)?
            .into_iter()
            .filter(|value| seen.insert(value.clone()))
            .collect())
    }
}
