//! Worker and machine persistence operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use siteguard_core::{EntityKind, GeoPoint, PositionFix, Provider, TrackedEntity};
use sqlx::SqlitePool;

/// Insert or update an entity record, including its current fix if any.
pub async fn upsert_entity(pool: &SqlitePool, entity: &TrackedEntity) -> Result<()> {
    let fix = entity.current_fix.as_ref();

    sqlx::query(
        r#"
        INSERT INTO entities (entity_id, kind, name, worksite_id, gps, provider, accuracy_m, fix_time, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(entity_id) DO UPDATE SET
            kind = ?2,
            name = COALESCE(?3, name),
            worksite_id = ?4,
            gps = COALESCE(?5, gps),
            provider = COALESCE(?6, provider),
            accuracy_m = COALESCE(?7, accuracy_m),
            fix_time = COALESCE(?8, fix_time),
            updated_at = ?9
        "#,
    )
    .bind(&entity.id)
    .bind(kind_label(entity.kind))
    .bind(&entity.name)
    .bind(&entity.worksite_id)
    .bind(fix.map(|f| f.point().to_feed_string()))
    .bind(fix.map(|f| provider_label(f.provider)))
    .bind(fix.map(|f| f.accuracy_m))
    .bind(fix.map(|f| f.timestamp.to_rfc3339()))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Publish a new position for an existing entity in the feed format.
///
/// Returns false when the entity is not in the store.
pub async fn update_entity_gps(pool: &SqlitePool, entity_id: &str, fix: &PositionFix) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE entities
        SET gps = ?2, provider = ?3, accuracy_m = ?4, fix_time = ?5, updated_at = ?6
        WHERE entity_id = ?1
        "#,
    )
    .bind(entity_id)
    .bind(fix.point().to_feed_string())
    .bind(provider_label(fix.provider))
    .bind(fix.accuracy_m)
    .bind(fix.timestamp.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an entity record. Returns true if a row was removed.
pub async fn delete_entity(pool: &SqlitePool, entity_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM entities WHERE entity_id = ?1")
        .bind(entity_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all entities. Unreadable stored positions leave the entity without a fix.
pub async fn load_entities(pool: &SqlitePool) -> Result<Vec<TrackedEntity>> {
    let rows = sqlx::query_as::<_, EntityRow>(
        "SELECT entity_id, kind, name, worksite_id, gps, provider, accuracy_m, fix_time FROM entities ORDER BY entity_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TrackedEntity::from).collect())
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct EntityRow {
    entity_id: String,
    kind: String,
    name: Option<String>,
    worksite_id: String,
    gps: Option<String>,
    provider: Option<String>,
    accuracy_m: Option<f64>,
    fix_time: Option<String>,
}

impl From<EntityRow> for TrackedEntity {
    fn from(row: EntityRow) -> Self {
        let kind = match row.kind.as_str() {
            "machine" => EntityKind::Machine,
            _ => EntityKind::Worker,
        };

        let current_fix = row.gps.as_deref().and_then(|gps| match GeoPoint::parse(gps) {
            Ok(point) => {
                let timestamp = row
                    .fix_time
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);
                Some(PositionFix::from_point(
                    point,
                    parse_provider(row.provider.as_deref()),
                    row.accuracy_m.unwrap_or(PositionFix::UNKNOWN_ACCURACY_M),
                    timestamp,
                ))
            }
            Err(err) => {
                tracing::warn!("Stored position for {} is unreadable: {}", row.entity_id, err);
                None
            }
        });

        TrackedEntity {
            id: row.entity_id,
            kind,
            name: row.name,
            worksite_id: row.worksite_id,
            current_fix,
        }
    }
}

fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Worker => "worker",
        EntityKind::Machine => "machine",
    }
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Gps => "gps",
        Provider::Network => "network",
        Provider::Fused => "fused",
        Provider::Remote => "remote",
    }
}

fn parse_provider(raw: Option<&str>) -> Provider {
    match raw {
        Some("gps") => Provider::Gps,
        Some("network") => Provider::Network,
        Some("fused") => Provider::Fused,
        _ => Provider::Remote,
    }
}
