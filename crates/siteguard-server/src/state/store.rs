//! In-memory state store.
//!
//! The fusion cache (id -> entity) sits behind one `RwLock` so a detection
//! pass copies every worker and machine from the same instant. Worksite
//! records are independent of each other and live in a `DashMap`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use dashmap::DashMap;
use siteguard_core::{
    evaluate_fix, AlertState, CollisionEngine, FixDecision, FleetSnapshot, FusionPolicy, PositionFix,
    RulesError, TrackedEntity, Worksite,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::alerts::AlertBus;
use crate::config::Config;
use crate::persistence::{entities as entities_db, worksites as worksites_db, Database};

/// A position reading pushed by a sensor or the position feed.
#[derive(Debug, Clone)]
pub struct SensorEvent {
    pub entity_id: String,
    pub fix: PositionFix,
}

impl SensorEvent {
    pub fn new(entity_id: impl Into<String>, fix: PositionFix) -> Self {
        Self {
            entity_id: entity_id.into(),
            fix,
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("sensor queue is full")]
    QueueFull,
    #[error("sensor queue is closed")]
    QueueClosed,
}

/// Application state shared by the loops and the API.
pub struct AppState {
    config: Config,
    entities: RwLock<HashMap<String, TrackedEntity>>,
    policy: FusionPolicy,
    engine: RwLock<CollisionEngine>,
    worksites: DashMap<String, Worksite>,
    bus: Arc<dyn AlertBus>,
    sensor_tx: mpsc::Sender<SensorEvent>,
    database: Option<Database>,
}

impl AppState {
    /// Build the state and the sensor queue the fix-intake loop drains.
    pub fn new(config: Config, bus: Arc<dyn AlertBus>) -> (Self, mpsc::Receiver<SensorEvent>) {
        let (sensor_tx, sensor_rx) = mpsc::channel(config.queue_depth.max(1));
        let policy = FusionPolicy::from_rules(&config.rules);
        let engine = CollisionEngine::new(config.rules.collision_threshold_deg).unwrap_or_else(|err| {
            tracing::warn!("{}; using default threshold", err);
            CollisionEngine::default()
        });

        let state = Self {
            config,
            entities: RwLock::new(HashMap::new()),
            policy,
            engine: RwLock::new(engine),
            worksites: DashMap::new(),
            bus,
            sensor_tx,
            database: None,
        };
        (state, sensor_rx)
    }

    /// Attach the record store used by the API and the location loop.
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> Arc<dyn AlertBus> {
        self.bus.clone()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    // === Fusion cache ===

    /// Register or re-register an entity. A known entity keeps its current fix
    /// unless the new record carries one, and moves out of its old worksite
    /// membership when its worksite or kind changed. Returns true if the id
    /// was new.
    pub fn register_entity(&self, mut entity: TrackedEntity) -> bool {
        let (id, kind, worksite_id) = (entity.id.clone(), entity.kind, entity.worksite_id.clone());

        let previous = {
            let mut entities = self.write_entities();
            let previous = entities.remove(&id);
            if entity.current_fix.is_none() {
                entity.current_fix = previous.as_ref().and_then(|old| old.current_fix.clone());
            }
            entities.insert(id.clone(), entity);
            previous
        };

        if let Some(old) = previous.as_ref() {
            if old.worksite_id != worksite_id || old.kind != kind {
                if let Some(mut site) = self.worksites.get_mut(&old.worksite_id) {
                    site.remove_entity(&id);
                }
            }
        }
        if let Some(mut site) = self.worksites.get_mut(&worksite_id) {
            site.add_entity(kind, id);
        }

        previous.is_none()
    }

    /// Drop an entity from the cache and its worksite. Its alert flag is
    /// cleared since no detection pass will publish it again.
    pub fn remove_entity(&self, entity_id: &str) -> Option<TrackedEntity> {
        let removed = self.write_entities().remove(entity_id)?;
        if let Some(mut site) = self.worksites.get_mut(&removed.worksite_id) {
            site.remove_entity(entity_id);
        }
        if let Err(err) = self.bus.publish(&AlertState::new(entity_id, false)) {
            tracing::error!("Failed to clear alert for removed {}: {}", entity_id, err);
        }
        Some(removed)
    }

    /// Run best-fix arbitration for one entity and keep the winner.
    ///
    /// Returns `None` for an unknown entity.
    pub fn submit_fix(&self, entity_id: &str, fix: PositionFix) -> Option<FixDecision> {
        let mut entities = self.write_entities();
        let entity = entities.get_mut(entity_id)?;
        let decision = evaluate_fix(entity.current_fix.as_ref(), &fix, &self.policy);
        if decision.accepted() {
            entity.current_fix = Some(fix);
        }
        Some(decision)
    }

    /// Hand a fix to the fix-intake loop without waiting.
    pub fn queue_fix(&self, event: SensorEvent) -> Result<(), StateError> {
        if !self.contains_entity(&event.entity_id) {
            return Err(StateError::UnknownEntity(event.entity_id));
        }
        self.sensor_tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => StateError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => StateError::QueueClosed,
        })
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.read_entities().contains_key(entity_id)
    }

    pub fn current_fix(&self, entity_id: &str) -> Option<PositionFix> {
        self.read_entities()
            .get(entity_id)
            .and_then(|entity| entity.current_fix.clone())
    }

    pub fn get_entity(&self, entity_id: &str) -> Option<TrackedEntity> {
        self.read_entities().get(entity_id).cloned()
    }

    /// All entities, sorted by id.
    pub fn get_all_entities(&self) -> Vec<TrackedEntity> {
        let mut entities: Vec<TrackedEntity> = self.read_entities().values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    /// Copy workers and machines under a single read lock, optionally limited
    /// to one worksite.
    pub fn snapshot_for(&self, worksite: Option<&str>) -> FleetSnapshot {
        let entities = self.read_entities();
        FleetSnapshot::from_entities(
            entities
                .values()
                .filter(|entity| worksite.map_or(true, |name| entity.worksite_id == name)),
        )
    }

    // === Collision threshold ===

    pub fn collision_engine(&self) -> CollisionEngine {
        match self.engine.read() {
            Ok(engine) => engine.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.collision_engine().threshold()
    }

    pub fn set_threshold(&self, threshold_deg: f64) -> Result<(), RulesError> {
        let mut engine = match self.engine.write() {
            Ok(engine) => engine,
            Err(poisoned) => poisoned.into_inner(),
        };
        engine.set_threshold(threshold_deg)?;
        tracing::info!("Collision threshold set to {}", threshold_deg);
        Ok(())
    }

    // === Worksites ===

    pub fn upsert_worksite(&self, worksite: Worksite) {
        self.worksites.insert(worksite.name.clone(), worksite);
    }

    pub fn get_worksite(&self, name: &str) -> Option<Worksite> {
        self.worksites.get(name).map(|site| site.value().clone())
    }

    /// All worksites, sorted by name.
    pub fn get_all_worksites(&self) -> Vec<Worksite> {
        let mut sites: Vec<Worksite> = self.worksites.iter().map(|r| r.value().clone()).collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        sites
    }

    pub fn remove_worksite(&self, name: &str) -> Option<Worksite> {
        self.worksites.remove(name).map(|(_, site)| site)
    }

    /// Entities of one worksite, sorted by id.
    pub fn entities_in(&self, worksite: &str) -> Vec<TrackedEntity> {
        let mut entities: Vec<TrackedEntity> = self
            .read_entities()
            .values()
            .filter(|entity| entity.worksite_id == worksite)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    // === Record store ===

    /// Load worksites and entities from the record store into memory.
    ///
    /// When a worksite is configured only its entities are tracked.
    pub async fn load_from_database(&self) -> Result<()> {
        let Some(db) = self.database.as_ref() else {
            return Ok(());
        };

        let worksites = worksites_db::load_worksites(db.pool()).await?;
        let worksite_count = worksites.len();
        for site in worksites {
            self.upsert_worksite(site);
        }

        let mut entity_count = 0;
        for entity in entities_db::load_entities(db.pool()).await? {
            if let Some(name) = self.config.worksite.as_deref() {
                if entity.worksite_id != name {
                    continue;
                }
            }
            self.register_entity(entity);
            entity_count += 1;
        }

        tracing::info!(
            "Loaded {} worksite(s) and {} entities from the record store",
            worksite_count,
            entity_count
        );
        Ok(())
    }

    fn read_entities(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TrackedEntity>> {
        match self.entities.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entities(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TrackedEntity>> {
        match self.entities.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
