use crate::error::HttpResult;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pdp_core::PdpService;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(Debug, Deserialize)]
struct RegisterProviderRequest {
    name: String,
    description: String,
}

#[utoipa::path(post, path = "/pdp/provider/register", tag = "Provider",
    responses((status = 201, description = "Registration submitted")))]
async fn register_provider(
    State(state): State<Arc<PdpService>>,
    Json(req): Json<RegisterProviderRequest>,
) -> HttpResult<impl IntoResponse> {
    let tx_hash = state.registration.register_provider(&req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "txHash": tx_hash }))))
}

#[utoipa::path(get, path = "/pdp/provider/status", tag = "Provider",
    responses((status = 200, description = "Provider registration status")))]
async fn provider_status(State(state): State<Arc<PdpService>>) -> HttpResult<impl IntoResponse> {
    let status = state.registration.get_provider_status().await?;
    Ok(Json(status))
}

#[derive(OpenApi)]
#[openapi(paths(register_provider, provider_status))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<Arc<PdpService>> {
    Router::new()
        .route("/register", post(register_provider))
        .route("/status", get(provider_status))
}
