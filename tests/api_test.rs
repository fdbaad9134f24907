use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use patent_scurve::adapters::{
    ElasticsearchIndex, ElasticsearchSettings, HttpEmbedder, MemoryCache, UsptoTitleLookup,
};
use patent_scurve::core::search::SearchSettings;
use patent_scurve::server::{build_router, AppState};
use patent_scurve::{PatentAnalytics, SCurveForecaster, SearchService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const GROWING_CODE: &str = "B64C39/024";
const SIDE_CODE: &str = "B64U10/13";
const LONE_CODE: &str = "G05D1/00";

/// Hits whose yearly counts follow K=200, t_m=2010, r=0.6 over 2000..=2020.
/// Every other hit also carries a second code, and one hit carries a code
/// published in a single year only.
fn logistic_hits() -> Value {
    let cumulative = |year: i32| {
        let x = 0.6 * (year as f64 - 2010.0);
        (200.0 / (1.0 + (-x).exp())).round() as i64
    };

    let mut hits = Vec::new();
    let mut id = 0;
    for year in 2000..=2020 {
        let new = cumulative(year) - cumulative(year - 1);
        for _ in 0..new {
            let codes = if id % 2 == 0 {
                json!([GROWING_CODE, SIDE_CODE])
            } else {
                json!([GROWING_CODE])
            };
            hits.push(json!({
                "_id": format!("doc-{}", id),
                "_score": 0.8,
                "_source": {"cpc_subgroup_id": codes, "date_published": format!("{}-06-01", year)}
            }));
            id += 1;
        }
    }
    hits.push(json!({
        "_id": "doc-lone",
        "_score": 0.9,
        "_source": {"cpc_subgroup_id": [LONE_CODE], "date_published": "2015-03-03"}
    }));
    // below the default threshold
    hits.push(json!({
        "_id": "doc-weak",
        "_score": 0.2,
        "_source": {"cpc_subgroup_id": ["A01B1/00"], "date_published": "2012-01-01"}
    }));

    Value::Array(hits)
}

struct Backends {
    server: MockServer,
}

impl Backends {
    async fn start() -> Self {
        Self {
            server: MockServer::start_async().await,
        }
    }

    async fn mock_healthy(&self, hits: Value) -> httpmock::Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).json_body(json!({"tagline": "You Know, for Search"}));
            })
            .await;
        self.server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(json!([[0.1, 0.2, 0.3]]));
            })
            .await;
        self.server
            .mock_async(|when, then| {
                when.method(POST).path("/aerospace_index/_search");
                then.status(200)
                    .json_body(json!({"hits": {"total": {"value": 1}, "hits": hits}}));
            })
            .await
    }

    fn router(&self) -> Router {
        let index = ElasticsearchIndex::new(ElasticsearchSettings {
            url: self.server.base_url(),
            ..ElasticsearchSettings::default()
        })
        .unwrap();
        let embedder = HttpEmbedder::new(self.server.url("/embed"), None, 5).unwrap();
        let titles = UsptoTitleLookup::new(self.server.url("/cpc/cpc-{}.html"), 5).unwrap();

        let search = SearchService::new(
            Arc::new(index),
            Arc::new(embedder),
            Arc::new(MemoryCache::new()),
            SearchSettings::default(),
        );
        let analytics = PatentAnalytics::new(search, SCurveForecaster::default(), Arc::new(titles));
        build_router(Arc::new(AppState::new(Arc::new(analytics))))
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_search_filters_and_caches() {
    let backends = Backends::start().await;
    let search_mock = backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, first) = get(&router, "/search?search_query=drones").await;
    assert_eq!(status, StatusCode::OK);
    let hits = first.as_array().unwrap();
    assert!(hits.iter().all(|h| h["_score"].as_f64().unwrap() >= 0.5));
    assert!(hits.iter().all(|h| h["_id"] != "doc-weak"));

    // a different threshold still gets the cached entry
    let (status, second) = get(&router, "/search?search_query=drones&threshold=0.85").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    search_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_top_codes_ranked_by_frequency() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(&router, "/top-cpc-codes?search_query=drones").await;

    assert_eq!(status, StatusCode::OK);
    let top = body.as_array().unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0][0], GROWING_CODE);
    assert_eq!(top[1][0], SIDE_CODE);
    assert_eq!(top[2], json!([LONE_CODE, 1]));
    assert!(top[0][1].as_u64().unwrap() > top[1][1].as_u64().unwrap());
}

#[tokio::test]
async fn test_yearly_cumulative_is_running_total() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(
        &router,
        "/yearly-cumulative-data?cpc_code=B64C39%2F024&search_query=drones",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpc_code"], GROWING_CODE);
    let series = body["cumulative_years"].as_array().unwrap();
    let counts: Vec<u64> = series.iter().map(|p| p[1].as_u64().unwrap()).collect();
    assert!(counts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*counts.last().unwrap(), 200);
}

#[tokio::test]
async fn test_unknown_code_is_404_with_detail() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(
        &router,
        "/yearly-cumulative-data?cpc_code=H04W4%2F00&search_query=drones",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No data found for CPC code H04W4/00");
}

#[tokio::test]
async fn test_yearly_data_for_top_codes() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(&router, "/yearly-data-for-top-cpc-codes?search_query=drones").await;

    assert_eq!(status, StatusCode::OK);
    let map = body.as_object().unwrap();
    assert_eq!(map.len(), 3);
    assert_eq!(map[LONE_CODE], json!([[2015, 1]]));
}

#[tokio::test]
async fn test_predict_s_curve() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(
        &router,
        "/predict-s-curve?cpc_code=B64C39%2F024&search_query=drones&future_years=10",
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let params = &body["logistic_parameters"];
    let k = params["K"].as_f64().unwrap();
    assert!((k - 200.0).abs() < 10.0, "K = {}", k);
    assert!((params["t_m"].as_f64().unwrap() - 2010.0).abs() < 1.0);
    assert_eq!(body["future_predictions"].as_array().unwrap().len(), 10);
    assert_eq!(body["future_predictions"][0][0], 2021);
    assert!((body["99_saturation_level"].as_f64().unwrap() - 0.99 * k).abs() < 1e-6);
    assert!(body.get("estimated_saturation_year").is_some());
}

#[tokio::test]
async fn test_predict_with_single_year_is_400() {
    let backends = Backends::start().await;
    backends.mock_healthy(logistic_hits()).await;
    let router = backends.router();

    let (status, body) = get(
        &router,
        "/predict-s-curve?cpc_code=G05D1%2F00&search_query=drones",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Not enough data points"));
}

#[tokio::test]
async fn test_blank_query_is_400() {
    let backends = Backends::start().await;
    let router = backends.router();

    let (status, body) = get(&router, "/search?search_query=%20").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("search_query"));
}

#[tokio::test]
async fn test_backend_down_is_500() {
    let backends = Backends::start().await;
    backends
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!([0.5, 0.5]));
        })
        .await;
    backends
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        })
        .await;
    let router = backends.router();

    let (status, body) = get(&router, "/top-cpc-codes?search_query=drones").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Elasticsearch"));
}

#[tokio::test]
async fn test_cpc_title_accepts_slash_codes() {
    let backends = Backends::start().await;
    let page = backends
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/cpc/cpc-B64C39-024.html");
            then.status(200).body(
                r#"<html><body><div class="class-title">
                   B64C39/024 AIRCRAFT NOT OTHERWISE PROVIDED FOR characterised by special use
                   </div></body></html>"#,
            );
        })
        .await;
    let router = backends.router();

    let (status, body) = get(&router, "/cpc-title/B64C39/024").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpc_code"], GROWING_CODE);
    assert_eq!(body["title"], "AIRCRAFT NOT OTHERWISE PROVIDED FOR");
    page.assert_async().await;
}

#[tokio::test]
async fn test_cpc_title_missing_page() {
    let backends = Backends::start().await;
    let router = backends.router();

    let (status, body) = get(&router, "/cpc-title/Z99Z1/00").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "CPC not found");
}

#[tokio::test]
async fn test_cors_headers_and_preflight() {
    let backends = Backends::start().await;
    let router = backends.router();

    let (status, _) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/search")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_malformed_query_string_is_400_with_detail() {
    let backends = Backends::start().await;
    let router = backends.router();

    let (status, body) = get(
        &router,
        "/predict-s-curve?cpc_code=A01B1%2F00&search_query=drones&future_years=-1",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request: Failed to deserialize query string"));

    let (status, body) = get(&router, "/top-cpc-codes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("search_query"));
}
