use crate::domain::model::{CodeCount, SearchHit};
use std::collections::HashMap;

pub const TOP_CODE_LIMIT: usize = 5;

/// Counts every code occurrence across `hits` and returns the `limit` most
/// frequent. Equal counts keep the order in which codes were first seen.
pub fn top_codes(hits: &[SearchHit], limit: usize) -> Vec<CodeCount> {
    let mut counts: Vec<CodeCount> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for code in hits
        .iter()
        .filter_map(|hit| hit.source.cpc_subgroup_id.as_deref())
        .flatten()
    {
        match positions.get(code.as_str()) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(code.as_str(), counts.len());
                counts.push(CodeCount(code.clone(), 1));
            }
        }
    }

    // stable: ties stay in first-seen order
    counts.sort_by(|a, b| b.count().cmp(&a.count()));
    counts.truncate(limit);

    tracing::debug!("Top {} CPC codes: {:?}", limit, counts);
    counts
}
