use crate::error::HttpResult;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pdp_core::{PdpService, RootAddRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::OpenApi;

/// `POST /pdp/proof-sets` body: the recordkeeper address the created
/// dataset should be registered against.
#[derive(Debug, Deserialize)]
struct CreateProofSetRequest {
    #[allow(dead_code)]
    record_keeper: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateProofSetResponse {
    tx_hash: String,
    location: String,
}

#[utoipa::path(post, path = "/pdp/proof-sets", tag = "ProofSets",
    responses((status = 201, description = "Proof set creation submitted")))]
async fn create_proof_set(
    State(state): State<Arc<PdpService>>,
    Json(_req): Json<CreateProofSetRequest>,
) -> HttpResult<impl IntoResponse> {
    let tx_hash = state.proof_sets.create_proof_set("default").await?;
    let location = format!("/pdp/proof-sets/created/{tx_hash}");
    let body = CreateProofSetResponse { tx_hash, location: location.clone() };
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)))
}

#[utoipa::path(get, path = "/pdp/proof-sets/created/{tx_hash}", tag = "ProofSets",
    responses((status = 200, description = "Proof set creation status")))]
async fn get_proof_set_status(
    State(state): State<Arc<PdpService>>,
    Path(tx_hash): Path<String>,
) -> HttpResult<impl IntoResponse> {
    let status = state.proof_sets.get_proof_set_status(&tx_hash).await?;
    Ok(Json(status))
}

#[utoipa::path(get, path = "/pdp/proof-sets", tag = "ProofSets",
    responses((status = 200, description = "All proof sets for this node's service")))]
async fn list_proof_sets(State(state): State<Arc<PdpService>>) -> HttpResult<impl IntoResponse> {
    let sets = state.proof_sets.list_proof_sets("default").await?;
    Ok(Json(sets))
}

#[utoipa::path(get, path = "/pdp/proof-sets/{id}", tag = "ProofSets",
    responses((status = 200, description = "Proof set with its roots")))]
async fn get_proof_set(State(state): State<Arc<PdpService>>, Path(id): Path<i64>) -> HttpResult<impl IntoResponse> {
    let result = state.proof_sets.get_proof_set(id).await?;
    Ok(Json(serde_json::json!({
        "proofSet": result.proof_set,
        "roots": result.roots,
    })))
}

#[utoipa::path(delete, path = "/pdp/proof-sets/{id}", tag = "ProofSets",
    responses((status = 200, description = "Proof set deletion submitted")))]
async fn delete_proof_set(State(state): State<Arc<PdpService>>, Path(id): Path<i64>) -> HttpResult<impl IntoResponse> {
    let tx_hash = state.proof_sets.delete_proof_set(id).await?;
    Ok(Json(serde_json::json!({ "txHash": tx_hash })))
}

#[utoipa::path(get, path = "/pdp/proof-sets/{id}/state", tag = "ProofSets",
    responses((status = 200, description = "Proof set state combining DB and chain views")))]
async fn get_proof_set_state(State(state): State<Arc<PdpService>>, Path(id): Path<i64>) -> HttpResult<impl IntoResponse> {
    let result = state.proof_sets.get_proof_set_state(id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct AddRootsRequest {
    roots: Vec<RootAddRequestBody>,
}

#[derive(Debug, Deserialize)]
struct RootAddRequestBody {
    root_cid: String,
    subroots: Vec<SubrootBody>,
}

#[derive(Debug, Deserialize)]
struct SubrootBody {
    subroot_cid: String,
}

#[utoipa::path(post, path = "/pdp/proof-sets/{id}/roots", tag = "ProofSets",
    responses((status = 201, description = "Roots added to the proof set")))]
async fn add_roots(
    State(state): State<Arc<PdpService>>,
    Path(id): Path<i64>,
    Json(req): Json<AddRootsRequest>,
) -> HttpResult<impl IntoResponse> {
    let requested = req
        .roots
        .into_iter()
        .map(|r| RootAddRequest {
            root_cid: r.root_cid,
            subroots: r.subroots.into_iter().map(|s| pdp_core::SubrootRequest { subroot_cid: s.subroot_cid }).collect(),
        })
        .collect();
    let tx_hash = state.add_roots_coordinated("default", id, requested).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "txHash": tx_hash }))))
}

#[utoipa::path(delete, path = "/pdp/proof-sets/{id}/roots/{root_id}", tag = "ProofSets",
    responses((status = 204, description = "Root removed")))]
async fn remove_root(
    State(state): State<Arc<PdpService>>,
    Path((id, root_id)): Path<(i64, i64)>,
) -> HttpResult<impl IntoResponse> {
    let tx_hash = state.proof_sets.remove_root(id, root_id).await?;
    Ok((StatusCode::NO_CONTENT, Json(serde_json::json!({ "txHash": tx_hash }))))
}

#[derive(OpenApi)]
#[openapi(paths(
    create_proof_set,
    get_proof_set_status,
    list_proof_sets,
    get_proof_set,
    delete_proof_set,
    get_proof_set_state,
    add_roots,
    remove_root
))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<Arc<PdpService>> {
    Router::new()
        .route("/", post(create_proof_set).get(list_proof_sets))
        .route("/created/:tx_hash", get(get_proof_set_status))
        .route("/:id", get(get_proof_set).delete(delete_proof_set))
        .route("/:id/state", get(get_proof_set_state))
        .route("/:id/roots", post(add_roots))
        .route("/:id/roots/:root_id", delete(remove_root))
}
