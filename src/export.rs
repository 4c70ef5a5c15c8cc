//! CSV export of the segment table and of projected points

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::data::CustomerSegmentRecord;
use crate::error::SegmentResult;
use crate::projection::ProjectedPoint;

/// Build a DataFrame with the same columns the RFM table is loaded from
pub fn rfm_frame(records: &[CustomerSegmentRecord]) -> SegmentResult<DataFrame> {
    let frame = df!(
        "CustomerID" => records.iter().map(|r| r.customer_id.clone()).collect::<Vec<_>>(),
        "Recency" => records.iter().map(|r| r.recency).collect::<Vec<_>>(),
        "Frequency" => records.iter().map(|r| r.frequency).collect::<Vec<_>>(),
        "Monetary" => records.iter().map(|r| r.monetary).collect::<Vec<_>>(),
        "Cluster" => records.iter().map(|r| r.cluster.0).collect::<Vec<_>>(),
    )?;
    Ok(frame)
}

pub fn projection_frame(points: &[ProjectedPoint]) -> SegmentResult<DataFrame> {
    let frame = df!(
        "PC1" => points.iter().map(|p| p.pc1).collect::<Vec<_>>(),
        "PC2" => points.iter().map(|p| p.pc2).collect::<Vec<_>>(),
        "Cluster" => points.iter().map(|p| p.cluster.0).collect::<Vec<_>>(),
    )?;
    Ok(frame)
}

/// Write the RFM segment table, e.g. for download
pub fn write_rfm_csv(records: &[CustomerSegmentRecord], output_path: impl AsRef<Path>) -> SegmentResult<()> {
    let mut frame = rfm_frame(records)?;
    write_frame(&mut frame, output_path.as_ref())
}

/// Write projected points as `PC1,PC2,Cluster` rows for a chart renderer
pub fn write_projection_csv(points: &[ProjectedPoint], output_path: impl AsRef<Path>) -> SegmentResult<()> {
    let mut frame = projection_frame(points)?;
    write_frame(&mut frame, output_path.as_ref())
}

fn write_frame(frame: &mut DataFrame, output_path: &Path) -> SegmentResult<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    CsvWriter::new(&mut file).include_header(true).finish(frame)?;

    tracing::debug!(path = %output_path.display(), rows = frame.height(), "wrote CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{load_rfm_table, read_csv, ClusterLabel};
    use tempfile::tempdir;

    fn create_test_records() -> Vec<CustomerSegmentRecord> {
        vec![
            CustomerSegmentRecord::new("C001", 12.0, 3, 250.5, ClusterLabel(1)),
            CustomerSegmentRecord::new("C002", 40.0, 1, 80.0, ClusterLabel(0)),
        ]
    }

    #[test]
    fn test_exported_table_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfm_with_clusters.csv");
        let records = create_test_records();

        write_rfm_csv(&records, &path).unwrap();
        assert_eq!(load_rfm_table(&path).unwrap(), records);
    }

    #[test]
    fn test_write_projection_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("projection.csv");
        let points = vec![
            ProjectedPoint { pc1: 1.5, pc2: -0.25, cluster: ClusterLabel(0) },
            ProjectedPoint { pc1: -1.5, pc2: 0.25, cluster: ClusterLabel(2) },
        ];

        write_projection_csv(&points, &path).unwrap();

        let frame = read_csv(&path).unwrap();
        assert_eq!(frame.height(), 2);
        assert!(frame.column("PC1").is_ok());
        assert!(frame.column("PC2").is_ok());
        assert!(frame.column("Cluster").is_ok());
    }
}
