mod pieces;
mod ping;
mod proof_sets;
mod provider;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::Router;
use pdp_core::PdpService;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(title = "PDP Storage Provider API", version = "1.0", description = "Filecoin PDP storage provider node API"),
    tags(
        (name = "Ping", description = "Node identity"),
        (name = "ProofSets", description = "Proof-set lifecycle and root management"),
        (name = "Pieces", description = "Piece allocation, upload, and retrieval"),
        (name = "Provider", description = "Provider registration lifecycle"),
    )
)]
struct Docs;

fn create_docs() -> utoipa::openapi::OpenApi {
    [ping::create_docs(), proof_sets::create_docs(), pieces::create_docs(), provider::create_docs()]
        .into_iter()
        .fold(Docs::openapi(), |mut doc, sub_doc| {
            doc.merge(sub_doc);
            doc
        })
}

/// Builds the full router, state-bound to a single shared
/// [`PdpService`].
pub fn create_router(service: Arc<PdpService>, max_body_size_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::HEAD,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::ACCEPT, header::CONTENT_TYPE, header::RANGE])
        .allow_origin(cors::Any);
    let compression = CompressionLayer::new();

    let middleware_stack = ServiceBuilder::new().layer(cors).layer(compression).layer(
        SetResponseHeaderLayer::overriding(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
    );

    let trace = TraceLayer::new_for_http();
    let docs = create_docs();

    Router::new()
        .nest("/pdp/proof-sets", proof_sets::create_router())
        .merge(pieces::create_router())
        .nest("/pdp/provider", provider::create_router())
        .nest("/pdp/ping", ping::create_router())
        .layer(DefaultBodyLimit::max(max_body_size_bytes))
        .layer(middleware_stack)
        .layer(trace)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs.clone()))
        .merge(Scalar::with_url("/scalar", docs))
        .fallback(|uri: Uri| async move { (StatusCode::NOT_FOUND, format!("no handler for {uri}")) })
        .with_state(service)
}
