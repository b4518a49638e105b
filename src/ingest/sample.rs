//! Synthetic dataset generator for trying the pipeline locally.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub const CATEGORY_BUCKETS: usize = 5;

/// Write `rows` rows of `id,value1,category,description` to `path`.
///
/// `value1` grows by 0.5 per row, so rows past id 80000 land above the
/// default high-value threshold.
pub fn write_sample_csv(path: &Path, rows: usize) -> Result<()> {
    info!(path = %path.display(), rows, "Writing sample CSV");

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["id", "value1", "category", "description"])?;
    for i in 0..rows {
        wtr.write_record([
            i.to_string(),
            (i as f64 * 0.5).to_string(),
            format!("cat_{}", i % CATEGORY_BUCKETS),
            format!("This is a description for item {}. It might contain some keywords.", i),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Cell, ChunkReader};

    #[test]
    fn test_sample_is_readable_in_chunks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sample.csv");
        write_sample_csv(&path, 25).unwrap();

        let chunks: Vec<_> = ChunkReader::open(&path, 10)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].headers.len(), 4);
        assert_eq!(chunks[2].records[3][1], Cell::Float(11.5));
        assert_eq!(chunks[2].records[4][1].as_f64(), Some(12.0));
        assert_eq!(chunks[2].records[4][2], Cell::Text("cat_4".to_string()));
    }
}
