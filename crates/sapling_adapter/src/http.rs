#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use sapling_kernel_contracts::petition::Principal;
use sapling_os::PetitionError;
use tracing::warn;

use crate::{
    error_response, http_status_for, log_request_failure, principal_from_headers,
    AdapterErrorResponse, AdapterHealthResponse, AdapterRuntime, CreatePetitionAdapterRequest,
    CreatePetitionAdapterResponse, LinkImageAdapterRequest, LinkImageAdapterResponse,
    MyPetitionsAdapterResponse, PetitionAdapterResponse, SignatureAdapterResponse,
};

type Rejection = (StatusCode, Json<AdapterErrorResponse>);
type SharedRuntime = Arc<AdapterRuntime>;

/// Builds the petition HTTP surface.
///
/// An all-punctuation title produces the empty slug, which a `:slug` segment never
/// matches. The `/v1/petitions/`, `/v1/petitions//images` and `/v1/petitions//signature`
/// routes address that petition explicitly.
pub fn router(runtime: SharedRuntime) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/petitions", post(create_petition))
        .route("/v1/petitions/", get(get_empty_slug_petition))
        .route("/v1/petitions/:slug", get(get_petition))
        .route("/v1/petitions//images", post(link_empty_slug_image))
        .route("/v1/petitions/:slug/images", post(link_image))
        .route("/v1/petitions//signature", post(request_empty_slug_signature))
        .route("/v1/petitions/:slug/signature", post(request_signature))
        .route("/v1/me/petitions", get(my_petitions))
        .with_state(runtime)
}

fn reject(route: &'static str, err: PetitionError) -> Rejection {
    log_request_failure(route, &err);
    let status =
        StatusCode::from_u16(http_status_for(&err)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error_response(&err)))
}

fn caller_principal(
    route: &'static str,
    headers: &HeaderMap,
) -> Result<Option<Principal>, Rejection> {
    principal_from_headers(|key| {
        headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
    .map_err(|err| reject(route, err))
}

async fn healthz(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<AdapterHealthResponse>, Rejection> {
    runtime
        .health_report()
        .map(Json)
        .map_err(|err| reject("healthz", err))
}

async fn create_petition(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Json(request): Json<CreatePetitionAdapterRequest>,
) -> Result<(StatusCode, Json<CreatePetitionAdapterResponse>), Rejection> {
    const ROUTE: &str = "create_petition";
    let principal = caller_principal(ROUTE, &headers)?;
    runtime
        .create_petition(principal.as_ref(), request)
        .map(|out| (StatusCode::CREATED, Json(out)))
        .map_err(|err| reject(ROUTE, err))
}

async fn get_petition(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<PetitionAdapterResponse>, Rejection> {
    petition_at(&runtime, &headers, &slug)
}

async fn get_empty_slug_petition(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<Json<PetitionAdapterResponse>, Rejection> {
    petition_at(&runtime, &headers, "")
}

fn petition_at(
    runtime: &AdapterRuntime,
    headers: &HeaderMap,
    slug: &str,
) -> Result<Json<PetitionAdapterResponse>, Rejection> {
    const ROUTE: &str = "get_petition";
    let principal = caller_principal(ROUTE, headers)?;
    runtime
        .get_petition(Some(slug), principal.as_ref())
        .map(Json)
        .map_err(|err| reject(ROUTE, err))
}

async fn link_image(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(request): Json<LinkImageAdapterRequest>,
) -> Result<Json<LinkImageAdapterResponse>, Rejection> {
    link_image_at(&runtime, &headers, &slug, request)
}

async fn link_empty_slug_image(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Json(request): Json<LinkImageAdapterRequest>,
) -> Result<Json<LinkImageAdapterResponse>, Rejection> {
    link_image_at(&runtime, &headers, "", request)
}

fn link_image_at(
    runtime: &AdapterRuntime,
    headers: &HeaderMap,
    slug: &str,
    request: LinkImageAdapterRequest,
) -> Result<Json<LinkImageAdapterResponse>, Rejection> {
    const ROUTE: &str = "link_image";
    let principal = caller_principal(ROUTE, headers)?;
    runtime
        .link_image(principal.as_ref(), slug, request)
        .map(Json)
        .map_err(|err| reject(ROUTE, err))
}

async fn request_signature(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<SignatureAdapterResponse>, Rejection> {
    signature_at(runtime, &headers, slug).await
}

async fn request_empty_slug_signature(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<Json<SignatureAdapterResponse>, Rejection> {
    signature_at(runtime, &headers, String::new()).await
}

async fn signature_at(
    runtime: SharedRuntime,
    headers: &HeaderMap,
    slug: String,
) -> Result<Json<SignatureAdapterResponse>, Rejection> {
    const ROUTE: &str = "request_signature";
    let principal = caller_principal(ROUTE, headers)?;
    // Provider calls block; keep them off the async workers.
    let joined = tokio::task::spawn_blocking(move || {
        runtime.request_signature(principal.as_ref(), &slug)
    })
    .await;
    match joined {
        Ok(result) => result.map(Json).map_err(|err| reject(ROUTE, err)),
        Err(err) => {
            warn!(error = %err, "signature task did not complete");
            Err(reject(
                ROUTE,
                PetitionError::Internal("signature task did not complete"),
            ))
        }
    }
}

async fn my_petitions(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<Json<MyPetitionsAdapterResponse>, Rejection> {
    const ROUTE: &str = "my_petitions";
    let principal = caller_principal(ROUTE, &headers)?;
    runtime
        .my_petitions(principal.as_ref())
        .map(Json)
        .map_err(|err| reject(ROUTE, err))
}
