//! Per-segment descriptive statistics

use serde::Serialize;

use crate::data::{distinct_clusters, ClusterLabel, CustomerSegmentRecord};
use crate::error::DataWarning;

/// Mean RFM values over a non-empty segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RfmAverages {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
}

/// Summary of one segment
///
/// `averages` is `None` when the segment has no customers, so callers check
/// it (or `count`) before display instead of trusting a NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub cluster: ClusterLabel,
    pub count: usize,
    pub averages: Option<RfmAverages>,
}

impl SegmentStats {
    pub fn avg_recency(&self) -> Option<f64> {
        self.averages.map(|avg| avg.recency)
    }

    pub fn avg_frequency(&self) -> Option<f64> {
        self.averages.map(|avg| avg.frequency)
    }

    pub fn avg_monetary(&self) -> Option<f64> {
        self.averages.map(|avg| avg.monetary)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn warning(&self) -> Option<DataWarning> {
        self.is_empty().then_some(DataWarning::EmptySelection {
            cluster: self.cluster,
        })
    }

    /// Percentage of `total` customers that fall in this segment
    pub fn share_of(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64 * 100.0
        }
    }
}

/// Summarize the customers of `selected_cluster`
///
/// # Arguments
/// * `records` - Full RFM table
/// * `selected_cluster` - Segment to summarize
///
/// # Returns
/// * Count and mean recency/frequency/monetary of the matching records
pub fn summarize(records: &[CustomerSegmentRecord], selected_cluster: ClusterLabel) -> SegmentStats {
    let mut count = 0usize;
    let mut recency_sum = 0.0;
    let mut frequency_sum = 0.0;
    let mut monetary_sum = 0.0;

    for record in records.iter().filter(|record| record.cluster == selected_cluster) {
        count += 1;
        recency_sum += record.recency;
        frequency_sum += record.frequency as f64;
        monetary_sum += record.monetary;
    }

    let averages = (count > 0).then(|| {
        let n = count as f64;
        RfmAverages {
            recency: recency_sum / n,
            frequency: frequency_sum / n,
            monetary: monetary_sum / n,
        }
    });

    let stats = SegmentStats {
        cluster: selected_cluster,
        count,
        averages,
    };

    if let Some(warning) = stats.warning() {
        tracing::warn!("{}", warning);
    }

    stats
}

/// Summaries for every cluster present in the table, ascending by label
pub fn summarize_all(records: &[CustomerSegmentRecord]) -> Vec<SegmentStats> {
    distinct_clusters(records)
        .into_iter()
        .map(|cluster| summarize(records, cluster))
        .collect()
}
