//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::{CacheStatus, GeoFilter, SpotFilters, SpotPage, SpotStats};
use crate::domain::{ParkingError, ParkingSpot};
use crate::geo::Coordinates;
use crate::geocode::{GeocodeError, resolve_location};
use crate::search::{CostEstimate, EnrichedSpot, MatchReport, ZoneStats};

use super::dto::*;
use super::rate_limit::limit_requests;
use super::state::AppState;

/// Page size for the spot listing when none is given.
const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_PAGE_SIZE: usize = 10_000;

/// Listing radius (km) when a centre is given without one.
const DEFAULT_LIST_RADIUS_KM: f64 = 1.0;

const DEFAULT_TEXT_LIMIT: usize = 50;

/// Create the application router.
///
/// Everything under `/api` is rate limited per client.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/parking", get(list_spots))
        .route("/api/parking/refresh", post(refresh_spots))
        .route("/api/parking/status", get(cache_status))
        .route("/api/parking/stats", get(spot_stats))
        .route("/api/parking/search", get(search_spots))
        .route("/api/parking/spot/:id", get(spot_by_id))
        .route("/api/parking-info/rates", get(zone_rates))
        .route("/api/parking-info/search", post(search_area))
        .route("/api/parking-info/recommendations", get(recommendations))
        .route("/api/parking-info/calculate-cost", post(calculate_cost))
        .route("/api/parking-info/zone-stats", get(zone_stats))
        .route("/api/parking-info/debug-match", get(debug_match))
        .route("/api/parking-info/spot/:id", get(spot_details))
        .route("/api/parking-info/reload", post(reload_zones))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            limit_requests,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Filtered, paginated spot listing.
async fn list_spots(
    State(state): State<AppState>,
    Query(query): Query<SpotsQuery>,
) -> Result<Json<SpotPage>, AppError> {
    let near = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => {
            let center = Coordinates::parse_pair(&format!("{lat},{lng}")).map_err(|e| {
                AppError::BadRequest {
                    message: e.to_string(),
                }
            })?;
            let radius_km = query.radius.unwrap_or(DEFAULT_LIST_RADIUS_KM);
            positive(radius_km, "radius")?;
            Some(GeoFilter { center, radius_km })
        }
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest {
                message: "lat and lng must be given together".to_string(),
            });
        }
    };

    let filters = SpotFilters {
        status: query.status.filter(|s| !s.trim().is_empty()),
        near,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let page = state.cache.get(&filters, limit, offset).await?;
    Ok(Json(page))
}

/// Refresh from upstream now.
async fn refresh_spots(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let total = state.cache.refresh().await?;
    Ok(Json(RefreshResponse {
        updated: true,
        total,
    }))
}

async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.cache.status().await)
}

async fn spot_stats(State(state): State<AppState>) -> Json<SpotStats> {
    Json(state.cache.stats().await)
}

/// Case-insensitive text search over name, street and area.
async fn search_spots(
    State(state): State<AppState>,
    Query(query): Query<TextSearchQuery>,
) -> Result<Json<TextSearchResponse>, AppError> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest {
            message: "Missing search query parameter q".to_string(),
        })?;
    let limit = query.limit.unwrap_or(DEFAULT_TEXT_LIMIT).min(MAX_PAGE_SIZE);

    // Make sure there is data to search
    state.cache.serve().await?;

    let spots = state.cache.find_by_text(&q, limit).await;
    Ok(Json(TextSearchResponse {
        count: spots.len(),
        spots,
    }))
}

async fn spot_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ParkingSpot>, AppError> {
    state.cache.serve().await?;

    state
        .cache
        .find_by_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Parking spot {id} not found"),
        })
}

/// All zone restriction records.
async fn zone_rates(State(state): State<AppState>) -> Json<RatesResponse> {
    let zones = state.zones.records().await;
    Json(RatesResponse {
        count: zones.len(),
        zones,
    })
}

/// Enriched spots around a location.
async fn search_area(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AreaSearchResponse>, AppError> {
    let req: AreaSearchRequest = parse_json(&body)?;

    let radius_m = req
        .radius
        .unwrap_or(state.search.config().search_radius_km * 1000.0);
    positive(radius_m, "radius")?;

    let location = resolve_location(state.geocoder.as_ref(), &req.location).await?;
    let spots = state.search.search(location, radius_m / 1000.0).await?;

    Ok(Json(AreaSearchResponse {
        location,
        radius_m,
        count: spots.len(),
        spots,
    }))
}

async fn recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<RecommendResponse>, AppError> {
    let text = query.location.ok_or_else(|| AppError::BadRequest {
        message: "Missing location parameter".to_string(),
    })?;
    let limit = query.limit.unwrap_or(state.search.config().recommend_limit);

    let location = resolve_location(state.geocoder.as_ref(), &text).await?;
    let recommendations = state.search.recommend(location, limit).await?;

    Ok(Json(RecommendResponse {
        location,
        recommendations,
    }))
}

async fn calculate_cost(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CostEstimate>, AppError> {
    let req: CostRequest = parse_json(&body)?;

    let zone_id = req.zone_key().ok_or_else(|| AppError::BadRequest {
        message: "zone_id must be a non-empty string or integer".to_string(),
    })?;
    positive(req.duration, "duration")?;

    let estimate = state.search.cost(&zone_id, req.duration).await?;
    Ok(Json(estimate))
}

async fn zone_stats(State(state): State<AppState>) -> Json<ZoneStats> {
    Json(state.search.zone_stats().await)
}

/// One spot with its zone restrictions.
async fn spot_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EnrichedSpot>, AppError> {
    state
        .search
        .spot_details(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Parking spot {id} not found"),
        })
}

/// Join diagnostics between live spots and zone records.
async fn debug_match(State(state): State<AppState>) -> Result<Json<MatchReport>, AppError> {
    let sample = state.search.config().match_sample;
    Ok(Json(state.search.match_report(sample).await?))
}

/// Reload zone reference data from its source.
async fn reload_zones(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let zones = state.zones.reload().await?;
    info!(zones, "zone data reloaded on request");
    Ok(Json(ReloadResponse {
        success: true,
        zones,
    }))
}

/// Parse a JSON body, reporting failures as bad requests.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest {
        message: format!("Invalid JSON: {e}"),
    })
}

fn positive(value: f64, name: &str) -> Result<(), AppError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AppError::BadRequest {
            message: format!("{name} must be a positive number"),
        })
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Unavailable { message: String },
    Internal { message: String },
    TooManyRequests,
}

impl From<ParkingError> for AppError {
    fn from(e: ParkingError) -> Self {
        let message = e.to_string();
        match e {
            ParkingError::UnknownZone { .. } => AppError::NotFound { message },
            ParkingError::AllEndpointsFailed { .. } | ParkingError::DataUnavailable { .. } => {
                AppError::Unavailable { message }
            }
            ParkingError::UnrecognizedFormat { .. } => AppError::Internal { message },
        }
    }
}

impl From<GeocodeError> for AppError {
    fn from(e: GeocodeError) -> Self {
        let message = e.to_string();
        match e {
            GeocodeError::EmptyQuery
            | GeocodeError::NotConfigured
            | GeocodeError::NotFound { .. } => AppError::BadRequest { message },
            GeocodeError::Http(_) | GeocodeError::Api { .. } | GeocodeError::Json { .. } => {
                AppError::Unavailable { message }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
        };

        if status.is_server_error() {
            warn!(%status, error = %message, "request failed");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{CacheConfig, SpotCache};
    use crate::geocode::CoordinateGeocoder;
    use crate::search::SearchConfig;
    use crate::upstream::MockSpotSource;
    use crate::zones::fixtures::zone_csv;
    use crate::zones::{InlineZoneSource, ZoneReferenceStore};

    fn payload() -> Value {
        json!({
            "results": [
                {
                    "kerbsideid": "101",
                    "zone_number": 7551,
                    "status_description": "Unoccupied",
                    "location": {"lat": -37.8136, "lon": 144.9631}
                },
                {
                    "kerbsideid": "102",
                    "zone_number": 7552,
                    "status_description": "Present",
                    "location": {"lat": -37.8140, "lon": 144.9635}
                },
                {
                    "kerbsideid": "103",
                    "status_description": "Unoccupied",
                    "location": {"lat": -37.9000, "lon": 144.9631}
                }
            ]
        })
    }

    fn app_with(mock: MockSpotSource) -> Router {
        let cache = Arc::new(SpotCache::new(
            Arc::new(mock),
            vec!["a".into()],
            CacheConfig::default(),
        ));
        let zones = ZoneReferenceStore::load(Arc::new(InlineZoneSource::new(zone_csv(&[
            ("7551", "4P"),
            ("7552", "1P"),
        ]))))
        .unwrap();
        let state = AppState::new(
            cache,
            zones,
            SearchConfig::default(),
            Arc::new(CoordinateGeocoder),
        );
        create_router(state)
    }

    fn app() -> Router {
        app_with(MockSpotSource::new().with_payload("a", payload()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response<Body> = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lists_spots_with_filters() {
        let (status, body) = get(app(), "/api/parking?status=available&limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["cached"], false);
        assert!(body.get("warning").is_none());

        let (_, body) = get(app(), "/api/parking?lat=-37.8136&lng=144.9631&radius=0.5").await;
        assert_eq!(body["total"], 2);

        let (_, body) = get(app(), "/api/parking?limit=1&offset=1").await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["spots"][0]["id"], "102");
    }

    #[tokio::test]
    async fn listing_rejects_half_a_centre() {
        let (status, body) = get(app(), "/api/parking?lat=-37.8").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = get(app(), "/api/parking?lat=-37.8&lng=144.9&radius=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cold_upstream_failure_is_503() {
        let app = app_with(MockSpotSource::new().with_status("a", 500));
        let (status, body) = get(app, "/api/parking").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "all 1 upstream endpoints failed");
    }

    #[tokio::test]
    async fn refresh_then_status_and_stats() {
        let app = app();

        let (status, body) = post_json(app.clone(), "/api/parking/refresh", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"updated": true, "total": 3}));

        let (_, body) = get(app.clone(), "/api/parking/status").await;
        assert_eq!(body["spots"], 3);
        assert_eq!(body["fresh"], true);

        let (_, body) = get(app, "/api/parking/stats").await;
        assert_eq!(body["available"], 2);
        assert_eq!(body["occupied"], 1);
        assert_eq!(body["availability_rate"], 66.7);
    }

    #[tokio::test]
    async fn text_search_and_lookup() {
        let app = app();

        let (status, body) = get(app.clone(), "/api/parking/search?q=melbourne&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (status, _) = get(app.clone(), "/api/parking/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(app.clone(), "/api/parking/spot/102").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Occupied");

        let (status, _) = get(app, "/api/parking/spot/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rates_and_zone_stats() {
        let app = app();

        let (_, body) = get(app.clone(), "/api/parking-info/rates").await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["zones"][0]["parking_zone_id"], "7551");

        let (_, body) = get(app, "/api/parking-info/zone-stats").await;
        assert_eq!(body["total_zones"], 2);
        assert_eq!(body["restriction_type_counts"]["4P"], 1);
        assert_eq!(body["average_hours"], 2.5);
    }

    #[tokio::test]
    async fn area_search_with_coordinate_literal() {
        let (status, body) = post_json(
            app(),
            "/api/parking-info/search",
            json!({"location": "-37.8136,144.9631", "radius": 300}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["spots"][0]["id"], "101");
        assert_eq!(body["spots"][0]["restriction_display"], "4P");
    }

    #[tokio::test]
    async fn area_search_needs_geocoder_for_names() {
        let (status, body) = post_json(
            app(),
            "/api/parking-info/search",
            json!({"location": "Flinders Street"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("lat,lng"));

        let request = Request::post("/api/parking-info/search")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recommendations_rank_by_restriction() {
        let (status, body) = get(
            app(),
            "/api/parking-info/recommendations?location=-37.8138,144.9633&limit=5",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["101", "102"]);

        let (status, _) = get(app(), "/api/parking-info/recommendations").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cost_calculation() {
        let (status, body) = post_json(
            app(),
            "/api/parking-info/calculate-cost",
            json!({"zone_id": 7551, "duration": 3}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cost"], 4.5);
        assert_eq!(body["currency"], "AUD");

        let (status, _) = post_json(
            app(),
            "/api/parking-info/calculate-cost",
            json!({"zone_id": "9999", "duration": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(
            app(),
            "/api/parking-info/calculate-cost",
            json!({"zone_id": "7551", "duration": 0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn debug_match_and_reload() {
        let app = app();

        let (status, body) = get(app.clone(), "/api/parking-info/debug-match").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spots_with_zone"], 2);
        assert_eq!(body["matched"], 2);

        let (status, body) = post_json(app, "/api/parking-info/reload", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "zones": 2}));
    }

    #[test]
    fn error_status_mapping() {
        let status = |e: AppError| e.into_response().status();

        assert_eq!(
            status(ParkingError::UnknownZone { zone_id: "1".into() }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ParkingError::AllEndpointsFailed { attempts: 3 }.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(
                ParkingError::DataUnavailable {
                    message: "gone".into()
                }
                .into()
            ),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(ParkingError::UnrecognizedFormat { keys: vec![] }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(GeocodeError::NotConfigured.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AppError::TooManyRequests),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn enriched_spot_details() {
        let app = app();

        let (status, body) = get(app.clone(), "/api/parking-info/spot/101").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "101");
        assert_eq!(body["restriction_display"], "4P");
        assert_eq!(body["distance_km"], 0.0);

        let (status, _) = get(app, "/api/parking-info/spot/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_is_rate_limited_after_a_thousand_requests() {
        let app = app();

        for _ in 0..1000 {
            let (status, _) = get(app.clone(), "/api/parking/status").await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = get(app.clone(), "/api/parking/status").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, json!({"error": "Too many requests"}));

        // Outside /api
        let (status, _) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_is_per_client() {
        use std::net::SocketAddr;

        use axum::extract::ConnectInfo;

        use crate::web::RateLimitConfig;

        let mock = MockSpotSource::new().with_payload("a", payload());
        let cache = Arc::new(SpotCache::new(
            Arc::new(mock),
            vec!["a".into()],
            CacheConfig::default(),
        ));
        let zones =
            ZoneReferenceStore::load(Arc::new(InlineZoneSource::new(zone_csv(&[])))).unwrap();
        let state = AppState::new(
            cache,
            zones,
            SearchConfig::default(),
            Arc::new(CoordinateGeocoder),
        )
        .with_rate_limit(RateLimitConfig::default().with_max_requests(2));
        let app = create_router(state);

        let from = |addr: &str| {
            let mut request = Request::get("/api/parking/stats")
                .body(Body::empty())
                .unwrap();
            let addr: SocketAddr = addr.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
            request
        };

        for _ in 0..2 {
            let (status, _) = send(app.clone(), from("10.0.0.1:5000")).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = send(app.clone(), from("10.0.0.1:5001")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = send(app, from("10.0.0.2:5000")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
