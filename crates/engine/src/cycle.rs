use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use orderwatch_core_types::{Region, StoreCheckResult};
use orderwatch_storefront::{OrderFilter, OrderSource, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::classify::{classify, RegionFetch};
use super::dispatch::AlertDispatcher;
use super::EngineSettings;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub success: bool,
    pub results: Vec<StoreCheckResult>,
    pub checked: DateTime<Utc>,
}

impl CheckReport {
    pub fn failed_regions(&self) -> Vec<Region> {
        self.results
            .iter()
            .filter(|result| result.is_failed())
            .map(|result| result.store)
            .collect()
    }
}

#[derive(Clone)]
pub struct OrderEngine {
    source: Arc<dyn OrderSource>,
    settings: Arc<EngineSettings>,
    /// Held for the whole of a check cycle; shared by every engine derived via `with_source`.
    cycle_lock: Arc<Mutex<()>>,
}

impl OrderEngine {
    pub fn new(source: Arc<dyn OrderSource>, settings: EngineSettings) -> Self {
        Self {
            source,
            settings: Arc::new(settings),
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Same settings and cycle lock, different order source. Cycles run through either engine
    /// never overlap.
    pub fn with_source(&self, source: Arc<dyn OrderSource>) -> Self {
        Self {
            source,
            settings: self.settings.clone(),
            cycle_lock: self.cycle_lock.clone(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn source(&self) -> &dyn OrderSource {
        self.source.as_ref()
    }

    /// One check cycle across every store, sampling the clock once.
    pub async fn run_cycle(&self, dispatcher: &AlertDispatcher) -> CheckReport {
        self.run_cycle_at(dispatcher, Utc::now()).await
    }

    pub async fn run_cycle_at(
        &self,
        dispatcher: &AlertDispatcher,
        now: DateTime<Utc>,
    ) -> CheckReport {
        let _cycle = self.cycle_lock.lock().await;
        let regions = self.settings.regions();
        let results = join_all(
            regions
                .iter()
                .map(|region| self.check_region(*region, dispatcher, now)),
        )
        .await;

        let failed = results.iter().filter(|result| result.is_failed()).count();
        info!(
            regions = results.len(),
            failed,
            overdue = results.iter().map(|r| r.overdue_orders).sum::<usize>(),
            incomplete = results.iter().map(|r| r.incomplete_orders).sum::<usize>(),
            commented = results.iter().map(|r| r.orders_with_comments).sum::<usize>(),
            "order check cycle completed"
        );
        CheckReport {
            success: true,
            results,
            checked: now,
        }
    }

    async fn check_region(
        &self,
        region: Region,
        dispatcher: &AlertDispatcher,
        now: DateTime<Utc>,
    ) -> StoreCheckResult {
        let fetch = match self.fetch_region(region).await {
            Ok(fetch) => fetch,
            Err(error) => {
                warn!(
                    region = %region,
                    kind = error.kind(),
                    error = %error,
                    "store check failed"
                );
                return StoreCheckResult::failed(region, error.to_string());
            }
        };

        let profile = self.settings.profile(region);
        let evaluation = classify(
            fetch,
            &profile,
            &self.settings.thresholds,
            self.settings.limits.recent as usize,
            now,
        );
        let view = evaluation.view;
        let outcome = dispatcher.dispatch(&view, &profile).await;
        StoreCheckResult {
            store: region,
            overdue_orders: view.overdue.len(),
            incomplete_orders: view.incomplete_stuck.len(),
            orders_with_comments: view.commented.len(),
            overdue_email_sent: outcome.overdue.is_sent(),
            incomplete_email_sent: outcome.incomplete.is_sent(),
            comments_email_sent: outcome.commented.is_sent(),
            error: None,
        }
    }

    /// All three reads must succeed for the store to be classified in a check cycle.
    async fn fetch_region(&self, region: Region) -> Result<RegionFetch, StoreError> {
        let limits = self.settings.limits;
        let awaiting_filter = OrderFilter::awaiting_shipment(limits.status_page);
        let recent_filter = OrderFilter::Recent {
            limit: limits.recent,
        };
        let incomplete_filter = OrderFilter::incomplete(limits.status_page);
        let (awaiting, recent, incomplete) = tokio::try_join!(
            self.source.fetch_orders(region, &awaiting_filter),
            self.source.fetch_orders(region, &recent_filter),
            self.source.fetch_orders(region, &incomplete_filter),
        )?;
        Ok(RegionFetch {
            awaiting,
            recent,
            incomplete,
        })
    }
}
