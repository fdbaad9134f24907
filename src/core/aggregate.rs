use crate::domain::model::{CumulativeSeries, Record, SearchHit};
use crate::utils::error::{Result, ScurveError};
use std::collections::BTreeMap;

/// Reduces hits to dated records. Hits without a parseable publication date
/// are dropped.
pub fn records_from_hits(hits: &[SearchHit]) -> Vec<Record> {
    let records: Vec<Record> = hits.iter().filter_map(Record::from_hit).collect();

    let skipped = hits.len() - records.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} hits without a usable publication date", skipped);
    }

    records
}

/// Running total of records carrying `code`, one point per distinct year.
pub fn yearly_cumulative(records: &[Record], code: &str) -> Result<CumulativeSeries> {
    let mut per_year: BTreeMap<i32, u64> = BTreeMap::new();
    for record in records.iter().filter(|record| record.has_code(code)) {
        *per_year.entry(record.published_year).or_insert(0) += 1;
    }

    if per_year.is_empty() {
        return Err(ScurveError::not_found(format!(
            "No data found for CPC code {}",
            code
        )));
    }

    let mut total = 0u64;
    let points = per_year
        .into_iter()
        .map(|(year, count)| {
            total += count;
            (year, total)
        })
        .collect();
    let series = CumulativeSeries::from_points(points);

    tracing::info!(
        "Cumulative data for CPC code {}: {:?}",
        code,
        series.points()
    );

    Ok(series)
}
