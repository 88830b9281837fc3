use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Html,
};
use serde::{Deserialize, Serialize};

use crate::{
    analytics::{AnalyticsDescriptor, AnalyticsReport},
    service::{pages, UserUrl},
    web::{
        error::{Result, WebError},
        state::AppState,
    },
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParamsResponse {
    pub schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsListResponse {
    pub available_queries: &'static [AnalyticsDescriptor],
}

#[derive(Debug, Deserialize)]
pub struct UserUrlParams {
    #[serde(rename = "activityID")]
    pub activity_id: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GameParams {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryRequest {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    /// Accepted for contract compatibility; no query reads it yet.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsQueryResponse {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    pub query: String,
    pub result: AnalyticsReport,
}

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn config_url(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let base = public_base_url(&headers);
    Html(state.service.config_page(base.as_deref()))
}

pub async fn json_params_url(State(state): State<AppState>) -> Json<ParamsResponse> {
    Json(ParamsResponse {
        schema: state.service.params_schema(),
    })
}

pub async fn user_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UserUrlParams>,
) -> Result<Json<UserUrl>> {
    let activity_id = params
        .activity_id
        .ok_or_else(|| WebError::Input("activityID query parameter is required".to_string()))?;
    let base = public_base_url(&headers);
    let url = state
        .service
        .resolve_instance(&activity_id, params.user_id.as_deref(), base.as_deref())
        .await?;
    Ok(Json(url))
}

pub async fn analytics_list_url(State(state): State<AppState>) -> Json<AnalyticsListResponse> {
    Json(AnalyticsListResponse {
        available_queries: state.service.list_analytics(),
    })
}

pub async fn analytics_url(
    State(state): State<AppState>,
    Json(request): Json<AnalyticsQueryRequest>,
) -> Result<Json<AnalyticsQueryResponse>> {
    let report = state
        .service
        .query_analytics(
            &request.activity_id,
            request.user_id.as_deref(),
            request.query.as_deref(),
        )
        .await?;
    Ok(Json(AnalyticsQueryResponse {
        activity_id: report.activity_id.clone(),
        query: report.query.clone(),
        result: report,
    }))
}

pub async fn game_page(
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
    Query(params): Query<GameParams>,
) -> Result<Html<String>> {
    let record = state
        .service
        .track_access(&activity_id, params.user_id.as_deref())
        .await?;
    let user = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|user| !user.is_empty());
    Ok(Html(pages::game_page(
        &record.activity_id,
        user,
        record.access_count,
    )))
}

/// Public base URL as seen by the client, honouring reverse-proxy headers.
/// `None` when the request carries no host information at all.
pub fn public_base_url(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let host = header("x-forwarded-host").or_else(|| header("host"))?;
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let prefix = header("x-forwarded-prefix").unwrap_or("").trim_end_matches('/');
    Some(format!("{}://{}{}", proto, host, prefix))
}
