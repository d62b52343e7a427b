//! Whole-file passes over collected comment tables.

use crate::normalize::clean_text;
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

/// Column holding the comment body.
pub const TEXT_COLUMN: &str = "text";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_kept: usize,
}

fn csv_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
    }
    csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))
}

/// Run every `text` cell through the cleaning chain and keep only rows that
/// survive it. Other columns pass through untouched.
pub fn clean_comments_file(input: &Path, output: &Path) -> Result<CleanReport> {
    let mut rdr = csv::Reader::from_path(input).with_context(|| format!("open {}", input.display()))?;
    let headers = rdr.headers()?.clone();
    let col = headers
        .iter()
        .position(|h| h == TEXT_COLUMN)
        .ok_or_else(|| anyhow!("{} has no '{}' column", input.display(), TEXT_COLUMN))?;

    let mut w = csv_writer(output)?;
    w.write_record(&headers)?;

    let mut report = CleanReport::default();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("read {}", input.display()))?;
        report.rows_in += 1;
        let Some(text) = rec.get(col).and_then(clean_text) else { continue };
        let row: csv::StringRecord = rec
            .iter()
            .enumerate()
            .map(|(i, cell)| if i == col { text.as_str() } else { cell })
            .collect();
        w.write_record(&row)?;
        report.rows_kept += 1;
    }
    w.flush()?;

    tracing::info!(
        rows_in = report.rows_in,
        kept = report.rows_kept,
        dropped = report.rows_in - report.rows_kept,
        "cleaned {}",
        input.display()
    );
    Ok(report)
}

/// Write a reproducible random `round(n * fraction)` sample of the rows of
/// `input` to `output`. Rows keep their original relative order.
pub fn downsample_rows(input: &Path, output: &Path, fraction: f64, seed: u64) -> Result<usize> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(anyhow!("fraction must be within [0, 1], got {fraction}"));
    }
    let mut rdr = csv::Reader::from_path(input).with_context(|| format!("open {}", input.display()))?;
    let headers = rdr.headers()?.clone();
    let rows: Vec<csv::StringRecord> = rdr
        .records()
        .collect::<Result<_, _>>()
        .with_context(|| format!("read {}", input.display()))?;

    let k = ((rows.len() as f64) * fraction).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = sample(&mut rng, rows.len(), k.min(rows.len())).into_vec();
    picked.sort_unstable();

    let mut w = csv_writer(output)?;
    w.write_record(&headers)?;
    for i in &picked {
        w.write_record(&rows[*i])?;
    }
    w.flush()?;

    tracing::info!(original = rows.len(), subset = picked.len(), "downsampled {}", input.display());
    Ok(picked.len())
}
