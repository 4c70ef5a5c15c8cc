//! SegmentScope: customer segment insights for fashion retail
//!
//! Reads pre-computed RFM (Recency, Frequency, Monetary) features with
//! upstream cluster labels, summarizes segments, projects customers to 2D
//! with PCA, and breaks transactions down by category, size, gender and season.

pub mod cli;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod export;
pub mod logging;
pub mod projection;
pub mod rules;
pub mod summary;
pub mod transactions;

// Re-export public items for easier access
pub use cli::Args;
pub use dashboard::{build_dashboard, render_text, DashboardData, DashboardOptions, DashboardReport};
pub use data::{distinct_clusters, load_rfm_table, ClusterLabel, CustomerSegmentRecord, Feature};
pub use error::{DataWarning, SegmentError};
pub use projection::{fit_projection, project, ProjectedPoint, Projection};
pub use rules::{load_rules, AssociationRule, ItemSet};
pub use summary::{summarize, summarize_all, SegmentStats};
pub use transactions::{TransactionFilter, TransactionTable};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
