//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::dashboard::DashboardOptions;
use crate::data::ClusterLabel;

/// Fashion retail customer insights: segment statistics, PCA projection and sales breakdowns
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the RFM table with upstream cluster assignments
    #[arg(short, long, default_value = "rfm_with_clusters.csv")]
    pub rfm: PathBuf,

    /// Path to the transaction lines CSV
    #[arg(short, long, default_value = "clothing_retail_300.csv")]
    pub transactions: PathBuf,

    /// Path to the sorted association rules CSV (optional panel)
    #[arg(long, default_value = "rules_sorted.csv")]
    pub rules: PathBuf,

    /// Customer segment to summarize (default: lowest cluster label)
    #[arg(short, long)]
    pub cluster: Option<ClusterLabel>,

    /// Country filter for the transaction panels (default: first in file)
    #[arg(long)]
    pub country: Option<String>,

    /// Season filter for the transaction panels (default: first in file)
    #[arg(long)]
    pub season: Option<String>,

    /// Number of product categories to list
    #[arg(long, default_value = "5")]
    pub top_categories: usize,

    /// Number of association rules to list
    #[arg(long, default_value = "10")]
    pub top_rules: usize,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write projected points (PC1, PC2, Cluster) to this CSV
    #[arg(long)]
    pub projection_out: Option<PathBuf>,

    /// Write the RFM segment table to this CSV
    #[arg(long)]
    pub export_rfm: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> crate::Result<()> {
        if self.top_categories == 0 {
            anyhow::bail!("--top-categories must be at least 1");
        }
        if self.top_rules == 0 {
            anyhow::bail!("--top-rules must be at least 1");
        }
        for (flag, value) in [("--country", &self.country), ("--season", &self.season)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                anyhow::bail!("{} must not be empty", flag);
            }
        }
        Ok(())
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            cluster: self.cluster,
            country: self.country.as_ref().map(|v| v.trim().to_string()),
            season: self.season.as_ref().map(|v| v.trim().to_string()),
            top_categories: self.top_categories,
            top_rules: self.top_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["segmentscope"]).unwrap();

        assert_eq!(args.rfm, PathBuf::from("rfm_with_clusters.csv"));
        assert_eq!(args.transactions, PathBuf::from("clothing_retail_300.csv"));
        assert_eq!(args.rules, PathBuf::from("rules_sorted.csv"));
        assert_eq!(args.cluster, None);
        assert!(args.validate().is_ok());
        assert_eq!(args.dashboard_options(), DashboardOptions::default());
    }

    #[test]
    fn test_parse_selection() {
        let args = Args::try_parse_from([
            "segmentscope",
            "--cluster",
            "2",
            "--country",
            " UK ",
            "--season",
            "Winter",
            "--json",
        ])
        .unwrap();

        let options = args.dashboard_options();
        assert_eq!(options.cluster, Some(ClusterLabel(2)));
        assert_eq!(options.country.as_deref(), Some("UK"));
        assert_eq!(options.season.as_deref(), Some("Winter"));
        assert!(args.json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Args::try_parse_from(["segmentscope", "--cluster", "gold"]).is_err());

        let args = Args::try_parse_from(["segmentscope", "--top-rules", "0"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["segmentscope", "--season", "  "]).unwrap();
        assert!(args.validate().is_err());
    }
}
