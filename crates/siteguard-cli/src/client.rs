//! HTTP client for the tracking server API.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use siteguard_core::{AlertState, EntityKind, GeoPoint, Provider, TrackedEntity, Worksite};

#[derive(Debug, Serialize)]
struct FixRequest<'a> {
    entity_id: &'a str,
    gps: String,
    accuracy_m: f64,
    provider: Provider,
    timestamp: chrono::DateTime<Utc>,
}

/// Client for one tracking server.
pub struct SiteClient {
    base_url: String,
    client: reqwest::Client,
}

impl SiteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register (or re-register) a worker or machine.
    pub async fn register_entity(
        &self,
        id: &str,
        kind: EntityKind,
        worksite_id: &str,
    ) -> Result<TrackedEntity> {
        let response = self
            .client
            .post(format!("{}/v1/entities", self.base_url))
            .json(&json!({ "id": id, "kind": kind, "worksite_id": worksite_id }))
            .send()
            .await
            .context("register request failed")?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Push one position into the feed.
    pub async fn post_fix(
        &self,
        entity_id: &str,
        point: GeoPoint,
        accuracy_m: f64,
        provider: Provider,
    ) -> Result<()> {
        let request = FixRequest {
            entity_id,
            gps: point.to_feed_string(),
            accuracy_m,
            provider,
            timestamp: Utc::now(),
        };
        let response = self
            .client
            .post(format!("{}/v1/fixes", self.base_url))
            .json(&request)
            .send()
            .await
            .context("fix request failed")?;
        check(response).await?;
        Ok(())
    }

    pub async fn put_worksite(&self, worksite: &Worksite) -> Result<Worksite> {
        let response = self
            .client
            .put(format!("{}/v1/worksites/{}", self.base_url, worksite.name))
            .json(&json!({
                "top_left_gps": worksite.top_left_gps,
                "bottom_right_gps": worksite.bottom_right_gps,
            }))
            .send()
            .await
            .context("worksite request failed")?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Current alert flags on the server's bus.
    pub async fn alerts(&self) -> Result<Vec<AlertState>> {
        let response = self
            .client
            .get(format!("{}/v1/alerts", self.base_url))
            .send()
            .await
            .context("alerts request failed")?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn set_threshold(&self, threshold_deg: f64) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/v1/settings/threshold", self.base_url))
            .json(&json!({ "threshold_deg": threshold_deg }))
            .send()
            .await
            .context("threshold request failed")?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("server returned {}: {}", status, body);
}
