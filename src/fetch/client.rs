//! Point data source: the trait the viewport session fetches through, and
//! its HTTP implementation against the SkyTrade data API.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::planner::{DetailLevel, FetchArea};
use crate::error::{ConfigError, ExplorerError, FetchError};
use crate::models::{DataType, GeoBounds, Point, RawPoint};

/// Upper bound on points requested per sub-area
pub const MAX_POINTS_PER_REQUEST: u32 = 500;

/// One bounded query against a data endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub data_type: DataType,
    pub bounds: GeoBounds,
    /// `None` leaves the page size to the server
    pub limit: Option<u32>,
    pub detail: DetailLevel,
}

impl FetchRequest {
    pub fn new(data_type: DataType, bounds: GeoBounds) -> Self {
        Self {
            data_type,
            bounds,
            limit: None,
            detail: DetailLevel::Standard,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }
}

impl From<&FetchArea> for FetchRequest {
    fn from(area: &FetchArea) -> Self {
        FetchRequest::new(area.data_type, area.bounds).with_detail(area.detail)
    }
}

/// Anything the explorer can pull points from.
pub trait PointSource: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Vec<Point>, ExplorerError>> + Send;

    /// Fails when the source cannot issue requests at all
    fn ensure_ready(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// HTTP client for the `droneRadar` and `properties` endpoints
#[derive(Debug, Clone)]
pub struct HttpPointSource {
    client: Client,
    base_url: Option<Url>,
}

impl HttpPointSource {
    /// A missing base URL is accepted here and reported on every fetch.
    pub fn new(base_url: Option<Url>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("skytrade-explorer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

/// `{base}/{endpoint}/?maxLatitude=..&minLatitude=..&maxLongitude=..&minLongitude=..`
pub fn request_url(base: &Url, request: &FetchRequest) -> Result<Url, FetchError> {
    let endpoint = format!(
        "{}/{}/",
        base.as_str().trim_end_matches('/'),
        request.data_type.endpoint()
    );
    let mut url = Url::parse(&endpoint)?;

    {
        let b = &request.bounds;
        let mut query = url.query_pairs_mut();
        query
            .append_pair("maxLatitude", &b.north.to_string())
            .append_pair("minLatitude", &b.south.to_string())
            .append_pair("maxLongitude", &b.east.to_string())
            .append_pair("minLongitude", &b.west.to_string());
        if let Some(limit) = request.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if request.detail == DetailLevel::High {
            query.append_pair("detailLevel", "high");
        }
    }

    Ok(url)
}

impl PointSource for HttpPointSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Point>, ExplorerError> {
        let base = self.base_url.as_ref().ok_or(ConfigError::MissingApiUrl)?;
        let url = request_url(base, request)?;

        debug!("Fetching {} points from {}", request.data_type, url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Fetch of {} failed with status {}", url, status);
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let body = response.text().await.map_err(FetchError::from)?;
        let raw: Vec<RawPoint> = serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("Received {} {} points", raw.len(), request.data_type);

        Ok(raw
            .into_iter()
            .map(|r| Point::from_raw(request.data_type, r))
            .collect())
    }

    fn ensure_ready(&self) -> Result<(), ConfigError> {
        match self.base_url {
            Some(_) => Ok(()),
            None => Err(ConfigError::MissingApiUrl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    fn bounds() -> GeoBounds {
        GeoBounds::new(41.5, 40.25, -99.0, -100.75)
    }

    fn query_of(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_request_url_parameters() {
        let base = Url::parse("https://api.example.com/v1").unwrap();
        let request = FetchRequest::new(DataType::Drone, bounds()).with_limit(MAX_POINTS_PER_REQUEST);
        let url = request_url(&base, &request).unwrap();

        assert_eq!(url.path(), "/v1/droneRadar/");
        assert_eq!(
            query_of(&url),
            vec![
                ("maxLatitude".to_string(), "41.5".to_string()),
                ("minLatitude".to_string(), "40.25".to_string()),
                ("maxLongitude".to_string(), "-99".to_string()),
                ("minLongitude".to_string(), "-100.75".to_string()),
                ("limit".to_string(), "500".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_url_high_detail_and_trailing_slash() {
        let base = Url::parse("https://api.example.com/").unwrap();
        let request = FetchRequest::new(DataType::AirSpace, bounds()).with_detail(DetailLevel::High);
        let url = request_url(&base, &request).unwrap();

        assert_eq!(url.path(), "/properties/");
        let query = query_of(&url);
        assert!(query.contains(&("detailLevel".to_string(), "high".to_string())));
        assert!(!query.iter().any(|(k, _)| k == "limit"));
    }

    #[tokio::test]
    async fn test_missing_base_url_is_configuration_error() {
        let source = HttpPointSource::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(source.ensure_ready(), Err(ConfigError::MissingApiUrl)));

        let err = source
            .fetch(&FetchRequest::new(DataType::Drone, bounds()))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}/api", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_decodes_points() {
        let router = Router::new().route(
            "/api/properties/",
            get(|| async {
                Json(json!([
                    { "id": 7, "latitude": 40.5, "longitude": -100.0, "price": 12.5 },
                    { "id": "p2", "address": "1 Main St" }
                ]))
            }),
        );
        let base = serve(router).await;
        let source = HttpPointSource::new(Some(base), Duration::from_secs(5)).unwrap();

        let points = source
            .fetch(&FetchRequest::new(DataType::AirSpace, bounds()))
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id(), "7");
        assert_eq!(points[0].coordinates(), Some((40.5, -100.0)));
        assert_eq!(points[1].coordinates(), None);
        assert!(points.iter().all(|p| p.data_type() == DataType::AirSpace));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let router = Router::new().route(
            "/api/droneRadar/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::Null)) }),
        );
        let base = serve(router).await;
        let source = HttpPointSource::new(Some(base), Duration::from_secs(5)).unwrap();

        let err = source
            .fetch(&FetchRequest::new(DataType::Drone, bounds()))
            .await
            .unwrap_err();

        match err {
            ExplorerError::Fetch(FetchError::Status { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected error: {other}"),
        }
    }
}
