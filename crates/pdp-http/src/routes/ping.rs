use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use pdp_core::PdpService;
use serde::Serialize;
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(Debug, Serialize)]
struct PingResponse {
    #[serde(rename = "type")]
    node_type: String,
    version: String,
}

#[utoipa::path(get, path = "/pdp/ping", tag = "Ping",
    responses((status = 200, description = "Node identity")))]
async fn ping(State(state): State<Arc<PdpService>>) -> Json<PingResponse> {
    Json(PingResponse { node_type: state.node_type().to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

#[derive(OpenApi)]
#[openapi(paths(ping))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<Arc<PdpService>> {
    Router::new().route("/", get(ping))
}
