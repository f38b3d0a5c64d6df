//!
//! src/routes.rs
//!
//! HTTP surface: four track endpoints mapped onto the reconciler, plus
//! the api document and a liveness check
//!

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::debug;

use crate::docs;
use crate::errors::ServiceError;
use crate::service::{Lookup, TrackService};
use crate::types::{CreateTrackRequest, CreatedTrack, Isrc, TrackDetails, UpdateTrackRequest};

#[derive(Clone)]
pub struct AppState {
    pub tracks: TrackService,
}

// axum 0.7 path syntax
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/track", post(create_track))
        .route("/track/:isrc", get(get_track).put(update_track))
        .route("/track/artist/:artist_name", get(search_by_artist))
        .route("/api-docs/openapi.json", get(openapi))
        .route("/health", get(health))
        .with_state(state)
}

fn invalid_body(rejection: JsonRejection) -> ServiceError {
    debug!(reason = %rejection.body_text(), "http.invalid_body");
    ServiceError::InvalidRequest("Invalid request body".to_string())
}

fn path_param(param: Result<Path<String>, PathRejection>) -> Result<String, ServiceError> {
    param
        .map(|Path(p)| p)
        .map_err(|e| ServiceError::InvalidRequest(e.body_text()))
}

/// GET /track/:isrc
async fn get_track(
    State(state): State<AppState>,
    isrc: Result<Path<String>, PathRejection>,
) -> Result<Json<TrackDetails>, ServiceError> {
    let isrc = Isrc::parse(&path_param(isrc)?)?;
    let details = state.tracks.get_track_details_by_isrc(&isrc).await?;
    Ok(Json(details))
}

/// GET /track/artist/:artist_name
async fn search_by_artist(
    State(state): State<AppState>,
    artist_name: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<TrackDetails>>, ServiceError> {
    let artist_name = path_param(artist_name)?;
    let tracks = state.tracks.search_tracks_by_artist_name(&artist_name).await?;
    Ok(Json(tracks))
}

/// POST /track
///
/// 200 with the stored details when the ISRC is already known, 201 when the
/// record had to be fetched from the catalog and written.
async fn create_track(
    State(state): State<AppState>,
    body: Result<Json<CreateTrackRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(body) = body.map_err(invalid_body)?;
    let isrc = Isrc::parse(&body.isrc)?;

    let response = match state.tracks.get_or_create_track_details(&isrc).await? {
        Lookup::Stored(track) => (StatusCode::OK, Json(track)).into_response(),
        Lookup::Created(track) => {
            let created = CreatedTrack {
                message: "Track record created successfully".to_string(),
                track,
            };
            (StatusCode::CREATED, Json(created)).into_response()
        }
    };
    Ok(response)
}

/// PUT /track/:isrc
async fn update_track(
    State(state): State<AppState>,
    isrc: Result<Path<String>, PathRejection>,
    body: Result<Json<UpdateTrackRequest>, JsonRejection>,
) -> Result<Json<TrackDetails>, ServiceError> {
    let isrc = Isrc::parse(&path_param(isrc)?)?;
    let Json(body) = body.map_err(invalid_body)?;

    if let Some(body_isrc) = body.isrc.as_deref() {
        if Isrc::parse(body_isrc).ok().as_ref() != Some(&isrc) {
            return Err(ServiceError::InvalidRequest(
                "isrc in body does not match path".to_string()
            ));
        }
    }

    let details = state.tracks.update_track(&isrc, &body).await?;
    Ok(Json(details))
}

async fn openapi() -> Json<Value> {
    Json(docs::openapi())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
