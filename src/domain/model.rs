use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// One scored document as returned by the vector index, kept in the
/// engine's own hit shape so cached payloads match what `/search` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: f64,
    #[serde(rename = "_source", default)]
    pub source: PatentSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentSource {
    /// Absent when the stored field is missing or is not a list.
    #[serde(
        default,
        deserialize_with = "lenient_code_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub cpc_subgroup_id: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_published: Option<String>,
}

fn lenient_code_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(code) => Some(code),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(date)) => Some(date),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Extracts the publication year from the date formats seen in patent
/// indices: `YYYY-MM-DD` (optionally followed by a time), `YYYYMMDD`,
/// `YYYY-MM` and a bare `YYYY`. Month and day need not be zero-padded.
/// Anything else, including impossible calendar dates, yields `None`.
pub fn parse_published_year(date: &str) -> Option<i32> {
    let date = date.trim();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if date.contains('-') {
        let day = date.split(['T', ' ']).next()?;
        let year = day.split('-').next()?;
        if year.len() != 4 || !all_digits(year) {
            return None;
        }
        let parsed = match day.matches('-').count() {
            1 => NaiveDate::parse_from_str(&format!("{day}-1"), "%Y-%m-%d").ok(),
            2 => NaiveDate::parse_from_str(day, "%Y-%m-%d").ok(),
            _ => None,
        };
        return parsed.map(|d| d.year());
    }

    match date.len() {
        4 if all_digits(date) => date.parse().ok(),
        8 if all_digits(date) => NaiveDate::parse_from_str(date, "%Y%m%d")
            .ok()
            .map(|d| d.year()),
        _ => None,
    }
}

/// A dated patent reduced to what the aggregator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub classification_codes: BTreeSet<String>,
    pub published_year: i32,
}

impl Record {
    pub fn new<I, S>(codes: I, published_year: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classification_codes: codes.into_iter().map(Into::into).collect(),
            published_year,
        }
    }

    /// `None` when the hit has no usable publication date.
    pub fn from_hit(hit: &SearchHit) -> Option<Self> {
        let year = hit
            .source
            .date_published
            .as_deref()
            .and_then(parse_published_year)?;
        Some(Self::new(
            hit.source.cpc_subgroup_id.iter().flatten().cloned(),
            year,
        ))
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.classification_codes.contains(code)
    }
}

/// Year → running total, strictly increasing in year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CumulativeSeries(Vec<(i32, u64)>);

impl CumulativeSeries {
    /// Builds a series from points that are already ordered; used by the
    /// aggregator and by callers that load a stored series.
    pub fn from_points(points: Vec<(i32, u64)>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[(i32, u64)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.0.last().map(|(year, _)| *year)
    }

    pub fn total(&self) -> u64 {
        self.0.last().map(|(_, count)| *count).unwrap_or(0)
    }

    pub fn is_well_formed(&self) -> bool {
        self.0
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0 && pair[0].1 <= pair[1].1)
    }
}

/// `f(t) = K / (1 + exp(-r (t - t_m)))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    #[serde(rename = "K")]
    pub k: f64,
    pub t_m: f64,
    pub r: f64,
}

impl LogisticModel {
    pub fn evaluate(&self, t: f64) -> f64 {
        self.k * sigmoid(self.r * (t - self.t_m))
    }
}

/// Logistic sigmoid written so neither branch can overflow.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(rename = "cpc_code")]
    pub code: String,
    #[serde(rename = "historical_data")]
    pub historical: CumulativeSeries,
    #[serde(rename = "future_predictions")]
    pub future: Vec<(i32, f64)>,
    #[serde(rename = "logistic_parameters")]
    pub model: LogisticModel,
    #[serde(rename = "99_saturation_level")]
    pub saturation_level: f64,
    /// `None` when no projected year reaches the saturation level.
    #[serde(rename = "estimated_saturation_year")]
    pub saturation_year: Option<i32>,
    pub saturation_beyond_horizon: bool,
    /// Last projected year; a lower bound for saturation when it lies
    /// beyond the horizon.
    pub horizon_end_year: Option<i32>,
}

/// Cumulative series per top code, kept in rank order. Serializes as a JSON
/// object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopCodeSeries(Vec<(String, CumulativeSeries)>);

impl TopCodeSeries {
    pub fn push(&mut self, code: String, series: CumulativeSeries) {
        self.0.push((code, series));
    }

    pub fn get(&self, code: &str) -> Option<&CumulativeSeries> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == code)
            .map(|(_, series)| series)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(code, _)| code.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TopCodeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (code, series) in &self.0 {
            map.serialize_entry(code, series)?;
        }
        map.end()
    }
}

/// `(code, count)`; serializes as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCount(pub String, pub usize);

impl CodeCount {
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn count(&self) -> usize {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_deserializes_engine_shape() {
        let hit: SearchHit = serde_json::from_value(json!({
            "_index": "aerospace_index",
            "_id": "US1234",
            "_score": 0.83,
            "_source": {
                "cpc_subgroup_id": ["B64C39/024", "B64U10/13"],
                "date_published": "2018-04-03"
            }
        }))
        .unwrap();

        assert_eq!(hit.id, "US1234");
        assert_eq!(hit.source.cpc_subgroup_id.as_ref().unwrap().len(), 2);
        assert_eq!(hit.source.date_published.as_deref(), Some("2018-04-03"));
    }

    #[test]
    fn test_non_list_code_field_becomes_absent() {
        let hit: SearchHit = serde_json::from_value(json!({
            "_id": "x",
            "_score": 0.9,
            "_source": { "cpc_subgroup_id": "B64C39/024" }
        }))
        .unwrap();
        assert!(hit.source.cpc_subgroup_id.is_none());

        let hit: SearchHit = serde_json::from_value(json!({
            "_id": "y",
            "_score": 0.9,
            "_source": { "cpc_subgroup_id": null }
        }))
        .unwrap();
        assert!(hit.source.cpc_subgroup_id.is_none());
    }

    #[test]
    fn test_parse_published_year_formats() {
        assert_eq!(parse_published_year("2015-06-23"), Some(2015));
        assert_eq!(parse_published_year("2015-06-23T00:00:00Z"), Some(2015));
        assert_eq!(parse_published_year("20150623"), Some(2015));
        assert_eq!(parse_published_year("2015-06"), Some(2015));
        assert_eq!(parse_published_year("2015"), Some(2015));
        assert_eq!(parse_published_year("2015-6-3"), Some(2015));
        assert_eq!(parse_published_year("2015-6"), Some(2015));
        assert_eq!(parse_published_year("15-06-23"), None);
        assert_eq!(parse_published_year(""), None);
        assert_eq!(parse_published_year("2015-13-40"), None);
        assert_eq!(parse_published_year("unknown"), None);
    }

    #[test]
    fn test_record_from_hit_without_date_is_skipped() {
        let hit = SearchHit {
            id: "a".to_string(),
            score: 1.0,
            source: PatentSource {
                cpc_subgroup_id: Some(vec!["A01B".to_string()]),
                date_published: None,
            },
        };
        assert!(Record::from_hit(&hit).is_none());
    }

    #[test]
    fn test_logistic_parameters_serialize_with_capital_k() {
        let model = LogisticModel {
            k: 100.0,
            t_m: 2010.0,
            r: 0.3,
        };
        let value = serde_json::to_value(model).unwrap();
        assert_eq!(value["K"], 100.0);
        assert!((model.evaluate(2010.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_code_series_serializes_in_rank_order() {
        let mut top = TopCodeSeries::default();
        top.push("Z99Z".to_string(), CumulativeSeries::from_points(vec![(2010, 4)]));
        top.push("A01B".to_string(), CumulativeSeries::from_points(vec![(2011, 1)]));

        let text = serde_json::to_string(&top).unwrap();

        assert_eq!(text, r#"{"Z99Z":[[2010,4]],"A01B":[[2011,1]]}"#);
        assert_eq!(top.get("A01B").unwrap().total(), 1);
        assert!(top.get("B64C").is_none());
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(-1.0e4), 0.0);
        assert_eq!(sigmoid(1.0e4), 1.0);
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
    }
}
