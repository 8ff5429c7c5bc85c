//! Worksite API endpoints.
//!
//! CRUD for worksite records plus the map view, which projects every
//! tracked entity of a worksite into the frame of its site image.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::persistence::worksites as worksites_db;
use crate::state::AppState;
use siteguard_core::{project, EntityKind, LocalPoint, Projection, Worksite};

const DEFAULT_FRAME_PX: u32 = 1000;

/// List all worksites.
pub async fn list_worksites(State(state): State<Arc<AppState>>) -> Json<Vec<Worksite>> {
    Json(state.get_all_worksites())
}

pub async fn get_worksite(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Worksite>, StatusCode> {
    state.get_worksite(&name).map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
pub struct PutWorksiteRequest {
    pub top_left_gps: String,
    pub bottom_right_gps: String,
    #[serde(default)]
    pub worker_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    pub machine_ids: Option<BTreeSet<String>>,
}

/// Create or replace a worksite. Membership is kept unless the request
/// carries new member lists.
pub async fn put_worksite(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<PutWorksiteRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut site = Worksite::new(name.clone(), req.top_left_gps, req.bottom_right_gps);
    if let Err(err) = site.corners() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("invalid corner: {}", err) })),
        );
    }

    let existing = state.get_worksite(&name);
    site.worker_ids = req
        .worker_ids
        .or_else(|| existing.as_ref().map(|s| s.worker_ids.clone()))
        .unwrap_or_default();
    site.machine_ids = req
        .machine_ids
        .or_else(|| existing.as_ref().map(|s| s.machine_ids.clone()))
        .unwrap_or_default();

    if let Err(err) = site.bounds() {
        tracing::warn!("Worksite {} saved with unusable bounds: {}", name, err);
    }

    if let Some(db) = state.database() {
        if let Err(err) = worksites_db::upsert_worksite(db.pool(), &site).await {
            tracing::error!("Failed to persist worksite {}: {}", name, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to persist worksite" })),
            );
        }
    }

    state.upsert_worksite(site.clone());
    tracing::info!("Saved worksite '{}'", name);

    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(json!(site)))
}

pub async fn delete_worksite(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.remove_worksite(&name).is_none() {
        return StatusCode::NOT_FOUND;
    }
    if let Some(db) = state.database() {
        if let Err(err) = worksites_db::delete_worksite(db.pool(), &name).await {
            tracing::error!("Failed to delete worksite {} from store: {}", name, err);
        }
    }
    tracing::info!("Deleted worksite '{}'", name);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct MapQuery {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One entity as drawn on the worksite map.
#[derive(Debug, Serialize)]
pub struct MapMarker {
    pub entity_id: String,
    pub kind: EntityKind,
    pub alerting: bool,
    /// Absent while the entity has no fix
    pub projection: Option<Projection>,
    pub render_point: Option<LocalPoint>,
}

#[derive(Debug, Serialize)]
pub struct WorksiteMap {
    pub worksite: String,
    pub width: u32,
    pub height: u32,
    pub markers: Vec<MapMarker>,
}

pub async fn worksite_map(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<MapQuery>,
) -> Result<Json<WorksiteMap>, (StatusCode, Json<serde_json::Value>)> {
    let site = state.get_worksite(&name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown worksite: {}", name) })),
        )
    })?;

    let unprocessable = |err: siteguard_core::ProjectionError| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
    };
    let bounds = site.bounds().map_err(|err| {
        tracing::warn!("Worksite {} has unusable bounds: {}", name, err);
        unprocessable(err)
    })?;
    let width = query.width.unwrap_or(DEFAULT_FRAME_PX);
    let height = query.height.unwrap_or(DEFAULT_FRAME_PX);

    let bus = state.bus();
    let mut markers = Vec::new();
    for entity in state.entities_in(&name) {
        let projection = match entity.current_fix.as_ref() {
            Some(fix) => Some(project(&fix.point(), &bounds, width, height).map_err(unprocessable)?),
            None => None,
        };
        markers.push(MapMarker {
            alerting: bus.current(&entity.id).unwrap_or(false),
            render_point: projection.as_ref().map(Projection::render_point),
            projection,
            entity_id: entity.id,
            kind: entity.kind,
        });
    }

    Ok(Json(WorksiteMap {
        worksite: name,
        width,
        height,
        markers,
    }))
}
