//! Background service that mirrors item documents into the catalog tables.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        armor::{Armor, UpsertArmor},
        artefact::{Artefact, UpsertArtefact},
        container::{Container, UpsertContainer},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::RwLock, time::interval};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use super::{
    item_parser::{ItemParseError, ItemParser, ParsedItem},
    item_source::{ItemCategory, ItemRef, ItemSource, ItemSourceError},
};

#[derive(Debug, Error)]
pub enum ItemSyncError {
    #[error("an item sync is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Source(#[from] ItemSourceError),
    #[error(transparent)]
    Parse(#[from] ItemParseError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CategorySyncReport {
    pub category: ItemCategory,
    pub listed: usize,
    pub synced: usize,
    pub failed: usize,
    /// Set when the category could not be listed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategorySyncReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SyncStatus {
    pub running: bool,
    pub last_report: Option<SyncReport>,
}

#[derive(Debug, Default)]
struct SyncState {
    running: AtomicBool,
    last_report: RwLock<Option<SyncReport>>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard {
    state: Arc<SyncState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ItemSyncService {
    db: DBService,
    source: Arc<dyn ItemSource>,
    parser: ItemParser,
    state: Arc<SyncState>,
}

impl ItemSyncService {
    pub fn new(db: DBService, source: Arc<dyn ItemSource>, parser: ItemParser) -> Self {
        Self {
            db,
            source,
            parser,
            state: Arc::new(SyncState::default()),
        }
    }

    /// Spawn the periodic sync. The first run starts immediately.
    pub fn spawn(self, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start(period).await;
        })
    }

    async fn start(&self, period: Duration) {
        info!("Starting item sync service with interval {:?}", period);

        let mut interval = interval(period);
        loop {
            interval.tick().await;
            match self.run_once().await {
                Ok(_) => {}
                Err(ItemSyncError::AlreadyRunning) => {
                    debug!("Item sync still running, skipping this tick");
                }
                Err(e) => error!("Item sync failed: {}", e),
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            running: self.state.running.load(Ordering::Acquire),
            last_report: self.state.last_report.read().await.clone(),
        }
    }

    fn begin(&self) -> Result<RunGuard, ItemSyncError> {
        self.state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ItemSyncError::AlreadyRunning)?;
        Ok(RunGuard {
            state: self.state.clone(),
        })
    }

    /// Run one sync now, or fail with [`ItemSyncError::AlreadyRunning`].
    pub async fn run_once(&self) -> Result<SyncReport, ItemSyncError> {
        let guard = self.begin()?;
        Ok(self.run(guard).await)
    }

    /// Start a run on a background task; fails right away if one is running.
    pub fn trigger(&self) -> Result<(), ItemSyncError> {
        let guard = self.begin()?;
        let service = self.clone();
        tokio::spawn(async move {
            service.run(guard).await;
        });
        Ok(())
    }

    async fn run(&self, _guard: RunGuard) -> SyncReport {
        let started_at = Utc::now();
        info!("Item sync started");

        let mut categories = Vec::with_capacity(ItemCategory::ALL.len());
        for category in ItemCategory::ALL {
            categories.push(self.sync_category(category).await);
        }

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            categories,
        };

        let synced: usize = report.categories.iter().map(|c| c.synced).sum();
        let failed: usize = report.categories.iter().map(|c| c.failed).sum();
        info!(
            synced,
            failed,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Item sync finished"
        );

        *self.state.last_report.write().await = Some(report.clone());
        report
    }

    async fn sync_category(&self, category: ItemCategory) -> CategorySyncReport {
        let mut report = CategorySyncReport {
            category,
            listed: 0,
            synced: 0,
            failed: 0,
            error: None,
        };

        let items = match self.source.list_items(category).await {
            Ok(items) => items,
            Err(e) => {
                error!(category = %category, error = %e, "Failed to list items");
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.listed = items.len();

        for item in &items {
            match self.sync_item(category, item).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    warn!(
                        category = %category,
                        item_id = %item.id,
                        error = %e,
                        "Skipping item"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            category = %category,
            listed = report.listed,
            synced = report.synced,
            failed = report.failed,
            "Category synced"
        );
        report
    }

    async fn sync_item(&self, category: ItemCategory, item: &ItemRef) -> Result<(), ItemSyncError> {
        let document = self.source.fetch_item(item).await?;
        let parsed = self.parser.parse(&document, category)?;
        let icon_url = Some(self.source.icon_url(item));

        let mut tx = self.db.pool.begin().await?;
        match category {
            ItemCategory::Armor => Armor::upsert(&mut tx, &armor_row(parsed, icon_url)).await?,
            ItemCategory::Artefact => {
                Artefact::upsert(&mut tx, &artefact_row(parsed, icon_url)).await?
            }
            ItemCategory::Containers => {
                Container::upsert(&mut tx, &container_row(parsed, icon_url)).await?
            }
        }
        tx.commit().await?;

        debug!(category = %category, item_id = %item.id, "Item upserted");
        Ok(())
    }
}

fn armor_row(item: ParsedItem, icon_url: Option<String>) -> UpsertArmor {
    UpsertArmor {
        id: item.id,
        category: item.category,
        class: item.class,
        rank: item.rank,
        color: item.color,
        state: item.state,
        weight: item.weight,
        durability: item.durability,
        price: item.price,
        description: item.description,
        icon_url,
        names: item.names,
        stats: item.stats,
    }
}

fn artefact_row(item: ParsedItem, icon_url: Option<String>) -> UpsertArtefact {
    UpsertArtefact {
        id: item.id,
        category: item.category,
        artefact_class: item.class,
        rank: item.rank,
        color: item.color,
        state: item.state,
        weight: item.weight,
        price: item.price,
        description: item.description,
        icon_url,
        names: item.names,
        effects: item.effects,
    }
}

fn container_row(item: ParsedItem, icon_url: Option<String>) -> UpsertContainer {
    UpsertContainer {
        id: item.id,
        category: item.category,
        container_class: item.class,
        rank: item.rank,
        color: item.color,
        state: item.state,
        capacity: item.capacity,
        weight: item.weight,
        price: item.price,
        description: item.description,
        icon_url,
        names: item.names,
        stats: item.stats,
    }
}
