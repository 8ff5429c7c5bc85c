//! Worksite persistence operations.

use anyhow::Result;
use chrono::Utc;
use siteguard_core::Worksite;
use sqlx::SqlitePool;
use std::collections::BTreeSet;

/// Insert or replace a worksite record.
pub async fn upsert_worksite(pool: &SqlitePool, worksite: &Worksite) -> Result<()> {
    let worker_ids = serde_json::to_string(&worksite.worker_ids)?;
    let machine_ids = serde_json::to_string(&worksite.machine_ids)?;

    sqlx::query(
        r#"
        INSERT INTO worksites (name, top_left_gps, bottom_right_gps, worker_ids, machine_ids, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(name) DO UPDATE SET
            top_left_gps = ?2, bottom_right_gps = ?3,
            worker_ids = ?4, machine_ids = ?5,
            updated_at = ?6
        "#,
    )
    .bind(&worksite.name)
    .bind(&worksite.top_left_gps)
    .bind(&worksite.bottom_right_gps)
    .bind(worker_ids)
    .bind(machine_ids)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a worksite record. Returns true if a row was removed.
pub async fn delete_worksite(pool: &SqlitePool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM worksites WHERE name = ?1")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all worksite records.
pub async fn load_worksites(pool: &SqlitePool) -> Result<Vec<Worksite>> {
    let rows = sqlx::query_as::<_, WorksiteRow>(
        "SELECT name, top_left_gps, bottom_right_gps, worker_ids, machine_ids FROM worksites ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Worksite::from).collect())
}

#[derive(sqlx::FromRow)]
struct WorksiteRow {
    name: String,
    top_left_gps: String,
    bottom_right_gps: String,
    worker_ids: String,
    machine_ids: String,
}

impl From<WorksiteRow> for Worksite {
    fn from(row: WorksiteRow) -> Self {
        Worksite {
            worker_ids: parse_id_set(&row.name, &row.worker_ids),
            machine_ids: parse_id_set(&row.name, &row.machine_ids),
            name: row.name,
            top_left_gps: row.top_left_gps,
            bottom_right_gps: row.bottom_right_gps,
        }
    }
}

fn parse_id_set(worksite: &str, raw: &str) -> BTreeSet<String> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::warn!("Worksite {} has unreadable member list: {}", worksite, err);
        BTreeSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use siteguard_core::EntityKind;

    #[tokio::test]
    async fn upsert_and_load_roundtrip_membership() {
        let db = init_database(":memory:", 1).await.unwrap();

        let mut site = Worksite::new("quarry", "33.6860,-117.8280", "33.6840,-117.8250");
        site.add_entity(EntityKind::Worker, "W1");
        site.add_entity(EntityKind::Machine, "M1");
        upsert_worksite(db.pool(), &site).await.unwrap();

        site.add_entity(EntityKind::Machine, "M2");
        upsert_worksite(db.pool(), &site).await.unwrap();

        let loaded = load_worksites(db.pool()).await.unwrap();
        assert_eq!(loaded, vec![site]);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let db = init_database(":memory:", 1).await.unwrap();
        let site = Worksite::new("quarry", "1,0", "0,1");
        upsert_worksite(db.pool(), &site).await.unwrap();

        assert!(delete_worksite(db.pool(), "quarry").await.unwrap());
        assert!(!delete_worksite(db.pool(), "quarry").await.unwrap());
        assert!(load_worksites(db.pool()).await.unwrap().is_empty());
    }
}
