use crate::error::{HttpError, HttpResult};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::TryStreamExt;
use pdp_core::service::InFlightGuard;
use pdp_core::{PdpService, PieceCheck};
use pdp_types::PdpError;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use utoipa::OpenApi;
use uuid::Uuid;

/// Pairs a blob reader with the download-admission guard so the guard's
/// counter decrement happens when response-body streaming actually
/// finishes, not when the handler function returns.
struct GuardedReader<R> {
    inner: R,
    _guard: Option<InFlightGuard>,
}

impl<R: AsyncRead + Unpin> AsyncRead for GuardedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[derive(Debug, Deserialize)]
struct AllocateRequest {
    check: PieceCheckBody,
    notify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PieceCheckBody {
    name: String,
    hash: String,
    size: u64,
}

#[utoipa::path(post, path = "/pdp/piece", tag = "Pieces",
    responses((status = 201, description = "New upload allocated"), (status = 200, description = "Piece already stored")))]
async fn allocate(
    State(state): State<Arc<PdpService>>,
    Json(req): Json<AllocateRequest>,
) -> HttpResult<impl IntoResponse> {
    let check = PieceCheck { name: req.check.name, hash: req.check.hash, size: req.check.size };
    let result = state.pieces.allocate("default", check, req.notify).await?;
    let status = if result.allocated { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(result)))
}

#[utoipa::path(put, path = "/pdp/piece/upload/{upload_uuid}", tag = "Pieces",
    responses((status = 204, description = "Upload verified and stored")))]
async fn upload(
    State(state): State<Arc<PdpService>>,
    Path(upload_uuid): Path<Uuid>,
    body: Body,
) -> HttpResult<impl IntoResponse> {
    let guard = state.begin_upload();
    if guard.is_none() {
        return Err(HttpError::from(PdpError::internal(anyhow::anyhow!("upload capacity exceeded, retry later"))));
    }
    let stream = body.into_data_stream().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let reader = tokio_util::io::StreamReader::new(stream);
    state.pieces.upload(upload_uuid, reader, "default").await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PieceLookupQuery {
    name: String,
    hash: String,
    size: u64,
}

#[utoipa::path(get, path = "/pdp/piece", tag = "Pieces",
    responses((status = 200, description = "Piece found"), (status = 404, description = "Piece not stored")))]
async fn find_piece(
    State(state): State<Arc<PdpService>>,
    Query(query): Query<PieceLookupQuery>,
) -> HttpResult<impl IntoResponse> {
    let check = PieceCheck { name: query.name, hash: query.hash, size: query.size };
    let piece_cid = state
        .pieces
        .find_existing(&check)
        .await?
        .ok_or_else(|| pdp_core::CoreError::NotFound("no piece matches the given check hash".to_string()))?;
    Ok(Json(serde_json::json!({ "piece_cid": piece_cid })))
}

fn parse_range(headers: &HeaderMap, full_size: u64) -> HttpResult<Option<(u64, u64)>> {
    let Some(value) = headers.get(axum::http::header::RANGE) else { return Ok(None) };
    let value = value
        .to_str()
        .map_err(|_| HttpError::from(pdp_core::CoreError::InvalidInput("malformed Range header".to_string())))?;
    let spec = value
        .strip_prefix("bytes=")
        .ok_or_else(|| HttpError::from(pdp_core::CoreError::InvalidInput("only byte ranges are supported".to_string())))?;
    let (start, end) = spec
        .split_once('-')
        .ok_or_else(|| HttpError::from(pdp_core::CoreError::InvalidInput("malformed Range header".to_string())))?;
    let start: u64 = start.parse().unwrap_or(0);
    let end: u64 = if end.is_empty() { full_size.saturating_sub(1) } else { end.parse().unwrap_or(full_size.saturating_sub(1)) };
    if end < start {
        return Err(HttpError::from(pdp_core::CoreError::InvalidInput("range end precedes range start".to_string())));
    }
    Ok(Some((start, end)))
}

#[utoipa::path(get, path = "/piece/{cid}", tag = "Pieces",
    responses((status = 200, description = "Piece bytes, range-capable")))]
async fn get_piece(
    State(state): State<Arc<PdpService>>,
    Path(cid): Path<String>,
    headers: HeaderMap,
) -> HttpResult<impl IntoResponse> {
    serve_piece(state, cid, headers, true).await
}

#[utoipa::path(head, path = "/piece/{cid}", tag = "Pieces",
    responses((status = 200, description = "Piece metadata only")))]
async fn head_piece(
    State(state): State<Arc<PdpService>>,
    Path(cid): Path<String>,
    headers: HeaderMap,
) -> HttpResult<impl IntoResponse> {
    serve_piece(state, cid, headers, false).await
}

async fn serve_piece(state: Arc<PdpService>, cid: String, headers: HeaderMap, include_body: bool) -> HttpResult<impl IntoResponse> {
    // the resolver's commP mapping already carries the blob's raw byte size,
    // so a Range header can be validated before opening the file at all.
    let (blob_mhash, full_size) = state
        .resolver
        .resolve_to_blob(&cid)
        .await?
        .ok_or_else(|| pdp_core::CoreError::NotFound(format!("no blob for piece {cid}")))?;
    let full_size = full_size as u64;
    let range = parse_range(&headers, full_size)?;

    let guard = state.begin_download();
    let object = state.pieces.open_blob(&blob_mhash, range).await?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(axum::http::header::ACCEPT_RANGES, "bytes".parse().unwrap());
    response_headers.insert(axum::http::header::CONTENT_LENGTH, full_size.to_string().parse().unwrap());

    if !include_body {
        return Ok((StatusCode::OK, response_headers, Body::empty()));
    }

    let status = if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
    let body_reader = object.body().await.map_err(|e| HttpError::from(pdp_core::CoreError::Store(e)))?;
    let guarded = GuardedReader { inner: body_reader, _guard: guard };
    let stream = tokio_util::io::ReaderStream::new(guarded);
    Ok((status, response_headers, Body::from_stream(stream)))
}

#[derive(OpenApi)]
#[openapi(paths(allocate, upload, find_piece, get_piece, head_piece))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<Arc<PdpService>> {
    Router::new()
        .route("/pdp/piece", post(allocate).get(find_piece))
        .route("/pdp/piece/upload/:upload_uuid", put(upload))
        .route("/piece/:cid", get(get_piece).head(head_piece))
}
