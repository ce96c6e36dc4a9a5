//! Reconciliation sweep over all subscribed series
//!
//! One sweep fetches the subscription list once, groups it by series and
//! reconciles each series independently. Series-level isolation is the unit
//! of concurrency: no two workers ever touch the same series, and a failure
//! on one series never aborts the sweep.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::db::{Database, EpisodeRecord, SubscriptionRecord};
use crate::portal::{Portal, PortalClient, SeriesSnapshot};
use crate::services::classifier::{self, ChangeSet};
use crate::services::router::{self, NotificationRouter};
use crate::services::telegram::Messenger;

/// Orchestrates the periodic reconciliation passes
pub struct SweepService {
    db: Database,
    aniworld: PortalClient,
    sto: PortalClient,
    messenger: Arc<dyn Messenger>,
    admin_chat: Option<String>,
    concurrency: usize,
    /// Reentrancy guard: at most one sweep runs at a time
    running: Mutex<()>,
}

impl SweepService {
    pub fn new(
        db: Database,
        aniworld: PortalClient,
        sto: PortalClient,
        messenger: Arc<dyn Messenger>,
        admin_chat: Option<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            db,
            aniworld,
            sto,
            messenger,
            admin_chat,
            concurrency: concurrency.max(1),
            running: Mutex::new(()),
        }
    }

    fn client_for(&self, portal: Portal) -> &PortalClient {
        match portal {
            Portal::AniWorld => &self.aniworld,
            Portal::Sto => &self.sto,
        }
    }

    /// Scheduler entry point. A trigger arriving while a sweep is running
    /// is dropped, not queued.
    pub async fn run(&self) {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Sweep trigger dropped, previous sweep still running");
            return;
        };

        if let Err(e) = self.run_sweep().await {
            error!(error = %e, "Sweep aborted");
        }
    }

    async fn run_sweep(&self) -> Result<()> {
        let subscriptions = self
            .db
            .subscriptions()
            .list_all()
            .await
            .context("Failed to load subscriptions")?;

        if subscriptions.is_empty() {
            info!("No active subscriptions, nothing to sweep");
            return Ok(());
        }

        let mut groups: BTreeMap<i64, Vec<SubscriptionRecord>> = BTreeMap::new();
        for subscription in subscriptions {
            groups
                .entry(subscription.series_id)
                .or_default()
                .push(subscription);
        }

        info!(series = groups.len(), "Starting reconciliation sweep");

        futures::stream::iter(groups.into_values())
            .for_each_concurrent(self.concurrency, |group| async move {
                let series_name = group[0].series_name.clone();

                if let Err(e) = self.process_series(&group).await {
                    // Persistence failures are fatal for this series only
                    error!(series = %series_name, error = %e, "Series processing failed, continuing sweep");
                }
            })
            .await;

        info!("Reconciliation sweep finished");
        Ok(())
    }

    async fn process_series(&self, group: &[SubscriptionRecord]) -> Result<()> {
        let series = &group[0];

        let Some(portal) = Portal::parse(&series.portal) else {
            warn!(series = %series.series_name, portal = %series.portal, "Unknown portal, skipping series");
            return Ok(());
        };

        let snapshot = match self.client_for(portal).fetch_series(&series.series_path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Unreachable, parse failure and not-found all mean the same
                // thing here: skip the series until the next sweep
                warn!(series = %series.series_name, error = %e, "Scrape failed, skipping series");
                return Ok(());
            }
        };

        let persisted = self.db.episodes().list_by_series(series.series_id).await?;
        let changes = classifier::classify(&snapshot, &persisted);

        if !changes.has_writes() {
            debug!(series = %series.series_name, "No changes detected");
            return Ok(());
        }

        self.persist_changes(series.series_id, &snapshot, &changes)
            .await?;

        if !changes.update_available() {
            // Only silent flag syncs; nothing to tell anyone
            return Ok(());
        }

        info!(
            series = %series.series_name,
            new = changes.new_episodes.len(),
            language_updates = changes.language_updates.len(),
            renames = changes.renames.len(),
            "Changes detected"
        );

        self.notify(group, &snapshot, &changes).await;
        Ok(())
    }

    /// Apply the change set in write order renames, then language flags,
    /// then inserts; refresh the series header when episodes were added.
    async fn persist_changes(
        &self,
        series_id: i64,
        snapshot: &SeriesSnapshot,
        changes: &ChangeSet,
    ) -> Result<()> {
        let episodes = self.db.episodes();

        if !changes.renames.is_empty() {
            episodes.update_batch(&changes.renames).await?;
        }

        let mut flag_writes: Vec<EpisodeRecord> = changes
            .language_updates
            .iter()
            .map(|update| update.record.clone())
            .collect();
        flag_writes.extend(changes.flag_syncs.iter().cloned());

        if !flag_writes.is_empty() {
            episodes.update_batch(&flag_writes).await?;
        }

        if !changes.new_episodes.is_empty() {
            episodes.insert_batch(series_id, &changes.new_episodes).await?;
            self.db.series().update_info(series_id, snapshot).await?;
        }

        Ok(())
    }

    /// Fan out to every matching subscriber, then the admin audit channel.
    /// Delivery failures are logged per recipient and never block the rest.
    async fn notify(
        &self,
        group: &[SubscriptionRecord],
        snapshot: &SeriesSnapshot,
        changes: &ChangeSet,
    ) {
        let subscriptions_repo = self.db.subscriptions();
        let notification_router =
            NotificationRouter::new(self.messenger.as_ref(), self.admin_chat.as_deref());

        for subscription in group {
            let entries = router::relevant_entries(changes, subscription.preference());

            if entries.is_empty() {
                continue;
            }

            let settings = match subscriptions_repo.get_settings(subscription.user_id).await {
                Ok(settings) => settings.unwrap_or_default(),
                Err(e) => {
                    warn!(chat = %subscription.chat_id, error = %e, "Failed to load subscriber settings, using defaults");
                    Default::default()
                }
            };

            match notification_router
                .notify_subscriber(subscription, settings, snapshot, &entries)
                .await
            {
                Ok(()) => {
                    let delivered: Vec<(i32, i32)> =
                        entries.iter().map(|e| (e.season, e.episode)).collect();

                    if let Err(e) = subscriptions_repo
                        .insert_deliveries(subscription.user_id, subscription.series_id, &delivered)
                        .await
                    {
                        warn!(chat = %subscription.chat_id, error = %e, "Failed to record delivery audit");
                    }
                }
                Err(e) => {
                    warn!(chat = %subscription.chat_id, error = %e, "Notification delivery failed");
                }
            }
        }

        if let Err(e) = notification_router.notify_admin(&snapshot.name, changes).await {
            warn!(error = %e, "Admin notification failed");
        }
    }
}
