use crate::core::aggregate::{records_from_hits, yearly_cumulative};
use crate::core::forecast::SCurveForecaster;
use crate::core::ranker::{top_codes, TOP_CODE_LIMIT};
use crate::core::search::SearchService;
use crate::domain::model::{CodeCount, CumulativeSeries, Forecast, SearchHit, TopCodeSeries};
use crate::domain::ports::TitleLookup;
use crate::utils::error::{Result, ScurveError};
use std::sync::Arc;

/// Search → rank → aggregate → forecast, wired over injected collaborators.
pub struct PatentAnalytics {
    search: SearchService,
    forecaster: SCurveForecaster,
    titles: Arc<dyn TitleLookup>,
}

impl PatentAnalytics {
    pub fn new(
        search: SearchService,
        forecaster: SCurveForecaster,
        titles: Arc<dyn TitleLookup>,
    ) -> Self {
        Self {
            search,
            forecaster,
            titles,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        threshold: Option<f64>,
        batch_size: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.search.search(query, threshold, batch_size).await
    }

    pub async fn top_codes(&self, query: &str) -> Result<Vec<CodeCount>> {
        let hits = self.search.search(query, None, None).await?;
        Ok(top_codes(&hits, TOP_CODE_LIMIT))
    }

    pub async fn yearly_cumulative(&self, code: &str, query: &str) -> Result<CumulativeSeries> {
        let hits = self.search.search(query, None, None).await?;
        yearly_cumulative(&records_from_hits(&hits), code)
    }

    /// Cumulative series for each of the top codes, in rank order. A top
    /// code whose hits all lack a usable date has no series and is left out.
    pub async fn yearly_for_top_codes(&self, query: &str) -> Result<TopCodeSeries> {
        let hits = self.search.search(query, None, None).await?;
        let records = records_from_hits(&hits);

        let mut yearly = TopCodeSeries::default();
        for CodeCount(code, _) in top_codes(&hits, TOP_CODE_LIMIT) {
            match yearly_cumulative(&records, &code) {
                Ok(series) => {
                    yearly.push(code, series);
                }
                Err(ScurveError::NotFound { .. }) => {
                    tracing::warn!("Top CPC code {} has no dated records, skipping", code);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(yearly)
    }

    pub async fn predict_saturation(
        &self,
        code: &str,
        query: &str,
        future_years: usize,
    ) -> Result<Forecast> {
        let series = self.yearly_cumulative(code, query).await?;

        let forecaster = self.forecaster;
        let code = code.to_string();
        // CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || forecaster.forecast(&code, &series, future_years))
            .await
            .map_err(|e| ScurveError::FitDivergence {
                message: format!("fit task aborted: {}", e),
            })?
    }

    pub async fn classification_title(&self, code: &str) -> String {
        self.titles.title(code).await
    }
}
