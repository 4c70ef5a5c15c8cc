//! Dashboard assembly: every panel computed from explicitly passed tables

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::data::{cluster_members, distinct_clusters, load_rfm_table, ClusterLabel, CustomerSegmentRecord};
use crate::error::SegmentError;
use crate::projection::{fit_projection, Projection};
use crate::rules::{load_top_rules, AssociationRule};
use crate::summary::{summarize, summarize_all, SegmentStats};
use crate::transactions::{LabelCount, SeasonRevenue, TransactionFilter, TransactionTable};

/// User selections; `None` falls back to the first available value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub cluster: Option<ClusterLabel>,
    pub country: Option<String>,
    pub season: Option<String>,
    pub top_categories: usize,
    pub top_rules: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            cluster: None,
            country: None,
            season: None,
            top_categories: 5,
            top_rules: 10,
        }
    }
}

/// Association rules, or the reason they cannot be shown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RulesPanel {
    Ready { rules: Vec<AssociationRule> },
    Unavailable { notice: String },
}

impl RulesPanel {
    /// Load the top rules; a missing rules file becomes a notice
    pub fn load(file_path: impl AsRef<Path>, limit: usize) -> crate::Result<Self> {
        let file_path = file_path.as_ref();
        match load_top_rules(file_path, limit) {
            Ok(rules) => Ok(RulesPanel::Ready { rules }),
            Err(err) if err.is_missing_file() => {
                tracing::warn!("{}", err);
                Ok(RulesPanel::Unavailable {
                    notice: format!(
                        "No association rules file found. Generate '{}' to see this panel.",
                        file_path.display()
                    ),
                })
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to load association rules from {}", file_path.display())),
        }
    }
}

/// PCA projection, or the reason it cannot be drawn
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectionPanel {
    Ready { projection: Projection },
    Unavailable { notice: String },
}

impl ProjectionPanel {
    pub fn build(records: &[CustomerSegmentRecord]) -> crate::Result<Self> {
        match fit_projection(records) {
            Ok(projection) => Ok(ProjectionPanel::Ready { projection }),
            Err(err @ SegmentError::InsufficientData { .. }) => {
                tracing::warn!("{}", err);
                Ok(ProjectionPanel::Unavailable {
                    notice: format!("Projection unavailable: {}", err),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn projection(&self) -> Option<&Projection> {
        match self {
            ProjectionPanel::Ready { projection } => Some(projection),
            ProjectionPanel::Unavailable { .. } => None,
        }
    }
}

/// Tables loaded once per session and handed to `build_dashboard`
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub customers: Vec<CustomerSegmentRecord>,
    pub transactions: TransactionTable,
    pub rules: RulesPanel,
}

impl DashboardData {
    pub fn load(
        rfm_path: impl AsRef<Path>,
        transactions_path: impl AsRef<Path>,
        rules_path: impl AsRef<Path>,
        top_rules: usize,
    ) -> crate::Result<Self> {
        let rfm_path = rfm_path.as_ref();
        let transactions_path = transactions_path.as_ref();

        let customers = load_rfm_table(rfm_path)
            .with_context(|| format!("failed to load RFM table from {}", rfm_path.display()))?;
        let transactions = TransactionTable::load(transactions_path)
            .with_context(|| format!("failed to load transactions from {}", transactions_path.display()))?;
        let rules = RulesPanel::load(rules_path, top_rules)?;

        Ok(Self {
            customers,
            transactions,
            rules,
        })
    }
}

/// Everything the renderer needs for one page view
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub filter: TransactionFilter,
    pub clusters: Vec<ClusterLabel>,
    pub total_customers: usize,
    pub selected: SegmentStats,
    /// Customer rows of the selected segment, in table order
    pub members: Vec<CustomerSegmentRecord>,
    pub segments: Vec<SegmentStats>,
    pub projection: ProjectionPanel,
    pub filtered_lines: usize,
    pub top_categories: Vec<LabelCount>,
    pub sizes: Vec<LabelCount>,
    pub genders: Vec<LabelCount>,
    pub seasonal_revenue: Vec<SeasonRevenue>,
    pub rules: RulesPanel,
}

/// Compute every dashboard panel for the given selections
///
/// # Arguments
/// * `data` - Customer, transaction and rule tables
/// * `options` - Selected cluster, country, season and panel sizes
pub fn build_dashboard(data: &DashboardData, options: &DashboardOptions) -> crate::Result<DashboardReport> {
    let clusters = distinct_clusters(&data.customers);
    let cluster = match options.cluster {
        Some(cluster) => cluster,
        None => *clusters
            .first()
            .context("the RFM table has no customers to select a segment from")?,
    };

    let filter = TransactionFilter {
        country: select_or_first(options.country.as_deref(), data.transactions.countries()?, "country"),
        season: select_or_first(options.season.as_deref(), data.transactions.seasons()?, "season"),
    };

    let filtered = data.transactions.filtered(&filter)?;
    if filtered.is_empty() {
        tracing::warn!(
            country = %filter.country,
            season = %filter.season,
            "no transactions match the selected filters"
        );
    }

    Ok(DashboardReport {
        clusters,
        total_customers: data.customers.len(),
        selected: summarize(&data.customers, cluster),
        members: cluster_members(&data.customers, cluster).into_iter().cloned().collect(),
        segments: summarize_all(&data.customers),
        projection: ProjectionPanel::build(&data.customers)?,
        filtered_lines: filtered.len(),
        top_categories: filtered.top_categories(options.top_categories)?,
        sizes: filtered.size_distribution()?,
        genders: filtered.gender_distribution()?,
        seasonal_revenue: data.transactions.seasonal_revenue()?,
        rules: data.rules.clone(),
        filter,
    })
}

/// An empty transactions table selects the empty string, which matches no rows
fn select_or_first(selected: Option<&str>, available: Vec<String>, what: &str) -> String {
    match selected {
        Some(value) => value.to_string(),
        None => available.into_iter().next().unwrap_or_else(|| {
            tracing::warn!("the transactions table has no {} values", what);
            String::new()
        }),
    }
}

/// Plain-text rendering of a report for the terminal
pub fn render_text(report: &DashboardReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &DashboardReport) -> std::fmt::Result {
    writeln!(
        out,
        "=== Showing data for {} during {} ===\n",
        report.filter.country, report.filter.season
    )?;

    let selected = &report.selected;
    writeln!(out, "=== Customer Segment {} ===", selected.cluster)?;
    match selected.averages {
        Some(averages) => {
            writeln!(
                out,
                "Customers: {} ({:.1}% of total)",
                selected.count,
                selected.share_of(report.total_customers)
            )?;
            writeln!(out, "Avg. Recency:   {:.1} days", averages.recency)?;
            writeln!(out, "Avg. Frequency: {:.1} purchases", averages.frequency)?;
            writeln!(out, "Avg. Monetary:  {}", format_currency(averages.monetary))?;

            writeln!(out, "\n  CustomerID   | Recency | Frequency |     Monetary")?;
            writeln!(out, "  -------------|---------|-----------|-------------")?;
            for member in &report.members {
                writeln!(
                    out,
                    "  {:<12} | {:>7.1} | {:>9} | {:>12}",
                    member.customer_id,
                    member.recency,
                    member.frequency,
                    format_currency(member.monetary)
                )?;
            }
        }
        None => writeln!(out, "No customers in this segment")?,
    }

    writeln!(out, "\n=== All Segments ===")?;
    writeln!(out, "  Cluster | Customers | Recency | Frequency |     Monetary")?;
    writeln!(out, "  --------|-----------|---------|-----------|-------------")?;
    for stats in &report.segments {
        if let Some(averages) = stats.averages {
            writeln!(
                out,
                "  {:>7} | {:>9} | {:>7.1} | {:>9.1} | {:>12}",
                stats.cluster.to_string(),
                stats.count,
                averages.recency,
                averages.frequency,
                format_currency(averages.monetary)
            )?;
        }
    }

    writeln!(out, "\n=== PCA Cluster Projection ===")?;
    match &report.projection {
        ProjectionPanel::Ready { projection } => {
            let ratios = projection.explained_variance_ratio();
            writeln!(
                out,
                "{} customers projected; PC1 explains {:.1}%, PC2 {:.1}% of variance",
                projection.points.len(),
                ratios[0] * 100.0,
                ratios[1] * 100.0
            )?;
            for warning in &projection.warnings {
                writeln!(out, "  note: {}", warning)?;
            }
        }
        ProjectionPanel::Unavailable { notice } => writeln!(out, "{}", notice)?,
    }

    writeln!(out, "\n=== Top Product Categories ({} lines) ===", report.filtered_lines)?;
    write_counts(out, &report.top_categories)?;

    writeln!(out, "\n=== Size Distribution ===")?;
    write_counts(out, &report.sizes)?;

    writeln!(out, "\n=== Gender Distribution ===")?;
    write_counts(out, &report.genders)?;

    writeln!(out, "\n=== Seasonal Revenue ===")?;
    for entry in &report.seasonal_revenue {
        writeln!(out, "  {:<8} {:>14}", entry.season, format_currency(entry.revenue))?;
    }

    writeln!(out, "\n=== Association Rules ===")?;
    match &report.rules {
        RulesPanel::Ready { rules } if rules.is_empty() => writeln!(out, "No rules")?,
        RulesPanel::Ready { rules } => {
            for rule in rules {
                writeln!(out, "  {}", rule)?;
            }
        }
        RulesPanel::Unavailable { notice } => writeln!(out, "{}", notice)?,
    }

    Ok(())
}

fn write_counts(out: &mut String, counts: &[LabelCount]) -> std::fmt::Result {
    if counts.is_empty() {
        return writeln!(out, "  (no data)");
    }
    for entry in counts {
        writeln!(out, "  {:<12} {:>6}", entry.label, entry.count)?;
    }
    Ok(())
}

/// `$1,234.50` style amount
fn format_currency(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}
