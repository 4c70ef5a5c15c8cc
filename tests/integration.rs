//! Integration tests for SegmentScope

use segmentscope::dashboard::{ProjectionPanel, RulesPanel};
use segmentscope::{
    build_dashboard, distinct_clusters, export, load_rfm_table, project, render_text, summarize,
    ClusterLabel, DashboardData, DashboardOptions, SegmentError,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create an RFM table with upstream cluster labels
fn create_rfm_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "CustomerID,Recency,Frequency,Monetary,Cluster").unwrap();
    writeln!(file, "17850,2,12,1800.0,2").unwrap();
    writeln!(file, "13047,35,4,420.0,1").unwrap();
    writeln!(file, "12345,40,3,380.0,1").unwrap();
    writeln!(file, "98765,300,1,10.0,0").unwrap();
    writeln!(file, "12346,280,1,20.0,0").unwrap();
    writeln!(file, "12347,310,2,30.0,0").unwrap();
    file
}

fn create_transactions_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "InvoiceNo,InvoiceDate,CustomerID,Country,Season,Category,Size,Gender,LineTotal").unwrap();
    writeln!(file, "1,2023-01-02,17850,United Kingdom,Winter,Jackets,M,Women,120.0").unwrap();
    writeln!(file, "2,2023-01-03,13047,United Kingdom,Winter,Jeans,L,Men,60.0").unwrap();
    writeln!(file, "3,2023-01-04,12345,United Kingdom,Winter,Jackets,S,Women,110.0").unwrap();
    writeln!(file, "4,2023-06-10,98765,Germany,Summer,Dresses,XS,Women,70.0").unwrap();
    writeln!(file, "5,2023-10-01,12346,United Kingdom,Fall,Knitwear,XL,Men,55.5").unwrap();
    file
}

fn create_rules_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "antecedents,consequents,support,confidence,lift").unwrap();
    writeln!(file, "\"frozenset({{'Jeans'}})\",\"frozenset({{'Jackets'}})\",0.1,0.7,2.1").unwrap();
    file
}

#[test]
fn test_summary_of_loaded_table() {
    let rfm_file = create_rfm_csv();
    let records = load_rfm_table(rfm_file.path()).unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(
        distinct_clusters(&records),
        vec![ClusterLabel(0), ClusterLabel(1), ClusterLabel(2)]
    );

    let stats = summarize(&records, ClusterLabel(0));
    assert_eq!(stats.count, 3);
    assert_eq!(stats.avg_monetary(), Some(20.0));
    assert!((stats.avg_recency().unwrap() - 890.0 / 3.0).abs() < 1e-9);

    let absent = summarize(&records, ClusterLabel(5));
    assert_eq!(absent.count, 0);
    assert!(absent.averages.is_none());
}

#[test]
fn test_projection_of_loaded_table() {
    let rfm_file = create_rfm_csv();
    let records = load_rfm_table(rfm_file.path()).unwrap();

    let points = project(&records).unwrap();
    assert_eq!(points.len(), records.len());
    for (point, record) in points.iter().zip(&records) {
        assert_eq!(point.cluster, record.cluster);
    }

    let err = project(&records[..1]).unwrap_err();
    assert!(matches!(err, SegmentError::InsufficientData { .. }));
}

#[test]
fn test_end_to_end_dashboard() {
    let rfm_file = create_rfm_csv();
    let transactions_file = create_transactions_csv();
    let rules_file = create_rules_csv();

    let data = DashboardData::load(rfm_file.path(), transactions_file.path(), rules_file.path(), 10).unwrap();
    let options = DashboardOptions {
        cluster: Some(ClusterLabel(1)),
        ..DashboardOptions::default()
    };
    let report = build_dashboard(&data, &options).unwrap();

    assert_eq!(report.filter.country, "United Kingdom");
    assert_eq!(report.filter.season, "Winter");
    assert_eq!(report.filtered_lines, 3);
    assert_eq!(report.selected.count, 2);
    assert_eq!(report.top_categories[0].label, "Jackets");
    assert_eq!(report.top_categories[0].count, 2);
    assert!(matches!(report.projection, ProjectionPanel::Ready { .. }));

    match &report.rules {
        RulesPanel::Ready { rules } => {
            assert_eq!(rules.len(), 1);
            assert!(rules[0].antecedents.contains("Jeans"));
        }
        RulesPanel::Unavailable { .. } => panic!("rules file should have loaded"),
    }

    let text = render_text(&report);
    assert!(text.contains("Customer Segment 1"));
    assert!(text.contains("Seasonal Revenue"));
}

#[test]
fn test_dashboard_without_rules_file() {
    let rfm_file = create_rfm_csv();
    let transactions_file = create_transactions_csv();
    let dir = tempdir().unwrap();

    let data = DashboardData::load(
        rfm_file.path(),
        transactions_file.path(),
        dir.path().join("rules_sorted.csv"),
        10,
    )
    .unwrap();

    assert!(matches!(data.rules, RulesPanel::Unavailable { .. }));
    let report = build_dashboard(&data, &DashboardOptions::default()).unwrap();
    assert!(render_text(&report).contains("No association rules file found"));
}

#[test]
fn test_missing_rfm_table_fails() {
    let transactions_file = create_transactions_csv();
    let dir = tempdir().unwrap();

    let result = DashboardData::load(
        dir.path().join("rfm_with_clusters.csv"),
        transactions_file.path(),
        dir.path().join("rules_sorted.csv"),
        10,
    );
    assert!(result.is_err());
}

#[test]
fn test_exports() {
    let rfm_file = create_rfm_csv();
    let records = load_rfm_table(rfm_file.path()).unwrap();
    let dir = tempdir().unwrap();

    let rfm_out = dir.path().join("rfm_export.csv");
    export::write_rfm_csv(&records, &rfm_out).unwrap();
    assert_eq!(load_rfm_table(&rfm_out).unwrap(), records);

    let projection_out = dir.path().join("projection.csv");
    export::write_projection_csv(&project(&records).unwrap(), &projection_out).unwrap();
    assert!(projection_out.exists());
}

#[test]
fn test_export_keeps_customer_id_text() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "CustomerID,Recency,Frequency,Monetary,Cluster").unwrap();
    writeln!(file, "007,12,3,150.0,1").unwrap();
    writeln!(file, "0100,40,1,20.0,0").unwrap();

    let records = load_rfm_table(file.path()).unwrap();
    assert_eq!(records[0].customer_id, "007");

    let dir = tempdir().unwrap();
    let out = dir.path().join("rfm_export.csv");
    export::write_rfm_csv(&records, &out).unwrap();

    let reloaded = load_rfm_table(&out).unwrap();
    assert_eq!(reloaded, records);
    assert_eq!(reloaded[1].customer_id, "0100");
}
