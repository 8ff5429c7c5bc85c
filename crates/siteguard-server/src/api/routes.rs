//! REST API routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::{worksites, ws};
use crate::persistence::{entities as entities_db, worksites as worksites_db};
use crate::state::{AppState, SensorEvent, StateError};
use siteguard_core::{
    AlertState, EntityKind, GeoPoint, PositionFix, Provider, TrackedEntity,
};

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/fixes", post(receive_fix))
        .route("/v1/entities", get(list_entities).post(register_entity))
        .route("/v1/entities/:entity_id", delete(delete_entity))
        .route("/v1/alerts", get(list_alerts))
        .route(
            "/v1/settings/threshold",
            get(get_threshold).put(set_threshold),
        )
        .route("/v1/worksites", get(worksites::list_worksites))
        .route(
            "/v1/worksites/:name",
            get(worksites::get_worksite)
                .put(worksites::put_worksite)
                .delete(worksites::delete_worksite),
        )
        .route("/v1/worksites/:name/map", get(worksites::worksite_map))
        .route("/v1/ws", get(ws::ws_handler))
}

/// Position feed record.
#[derive(Debug, Deserialize)]
pub struct FixRequest {
    pub entity_id: String,
    /// `"<lat>,<lon>"` in decimal degrees
    pub gps: String,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

async fn receive_fix(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FixRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let point = match GeoPoint::parse(&req.gps) {
        Ok(point) => point,
        Err(err) => {
            tracing::warn!("Rejected position for {}: {}", req.entity_id, err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            );
        }
    };

    let fix = PositionFix::from_point(
        point,
        req.provider.unwrap_or_default(),
        req.accuracy_m
            .filter(|a| a.is_finite() && *a >= 0.0)
            .unwrap_or(PositionFix::UNKNOWN_ACCURACY_M),
        req.timestamp.unwrap_or_else(Utc::now),
    );

    match state.queue_fix(SensorEvent::new(req.entity_id.trim(), fix)) {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({}))),
        Err(err @ StateError::UnknownEntity(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        ),
        Err(err) => {
            tracing::warn!("Position for {} not queued: {}", req.entity_id, err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

async fn list_entities(State(state): State<Arc<AppState>>) -> Json<Vec<TrackedEntity>> {
    Json(state.get_all_entities())
}

#[derive(Debug, Deserialize)]
pub struct RegisterEntityRequest {
    pub id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub name: Option<String>,
    pub worksite_id: String,
}

async fn register_entity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterEntityRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = req.id.trim().to_string();
    if id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "entity id must not be empty" })),
        );
    }

    let previous_site = state.get_entity(&id).map(|entity| entity.worksite_id);
    let mut entity = TrackedEntity::new(id.clone(), req.kind, req.worksite_id);
    entity.name = req.name;
    let created = state.register_entity(entity);

    if let Some(db) = state.database() {
        let stored = state.get_entity(&id);
        if let Some(entity) = stored.as_ref() {
            if let Err(err) = entities_db::upsert_entity(db.pool(), entity).await {
                tracing::error!("Failed to persist entity {}: {}", id, err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "failed to persist entity" })),
                );
            }
            let mut touched = vec![entity.worksite_id.clone()];
            touched.extend(previous_site.filter(|name| *name != entity.worksite_id));
            for name in touched {
                let Some(site) = state.get_worksite(&name) else {
                    continue;
                };
                if let Err(err) = worksites_db::upsert_worksite(db.pool(), &site).await {
                    tracing::warn!("Failed to persist membership of {}: {}", site.name, err);
                }
            }
        }
    }

    tracing::info!(
        "{} {:?} {}",
        if created { "Registered" } else { "Updated" },
        req.kind,
        id
    );
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(json!(state.get_entity(&id))))
}

async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> StatusCode {
    let Some(removed) = state.remove_entity(&entity_id) else {
        return StatusCode::NOT_FOUND;
    };

    if let Some(db) = state.database() {
        if let Err(err) = entities_db::delete_entity(db.pool(), &entity_id).await {
            tracing::error!("Failed to delete entity {} from store: {}", entity_id, err);
        }
        if let Some(site) = state.get_worksite(&removed.worksite_id) {
            if let Err(err) = worksites_db::upsert_worksite(db.pool(), &site).await {
                tracing::warn!("Failed to persist membership of {}: {}", site.name, err);
            }
        }
    }

    tracing::info!("Removed {:?} {}", removed.kind, entity_id);
    StatusCode::NO_CONTENT
}

async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<AlertState>> {
    Json(state.bus().snapshot())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdBody {
    pub threshold_deg: f64,
}

async fn get_threshold(State(state): State<Arc<AppState>>) -> Json<ThresholdBody> {
    Json(ThresholdBody {
        threshold_deg: state.threshold(),
    })
}

async fn set_threshold(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ThresholdBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.set_threshold(body.threshold_deg) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "threshold_deg": state.threshold() })),
        ),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}
