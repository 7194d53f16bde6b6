use chrono::{DateTime, Utc};
use orderwatch_core_types::{ClassifiedView, EnrichedOrder, Order, Region};
use orderwatch_storefront::{OrderFilter, StoreError};
use serde::Serialize;
use tracing::{debug, warn};

use super::classify::{classify, RegionFetch};
use super::cycle::OrderEngine;

/// On-demand view of one store, as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    pub store: Region,
    /// All awaiting-shipment orders, most overdue first.
    pub orders: Vec<EnrichedOrder>,
    pub overdue: Vec<EnrichedOrder>,
    pub recent_orders: Vec<EnrichedOrder>,
    pub incomplete_orders: Vec<EnrichedOrder>,
    pub incomplete_stuck: Vec<EnrichedOrder>,
    pub orders_with_comments: Vec<EnrichedOrder>,
    pub total: usize,
    pub overdue_count: usize,
    pub incomplete_alerts: usize,
    pub comment_count: usize,
    pub threshold_hours: i64,
    pub incomplete_threshold_minutes: i64,
    pub last_checked: DateTime<Utc>,
}

impl OrderEngine {
    /// Fetch, enrich and classify one store without notifying anyone.
    ///
    /// The awaiting-shipment read is required; the recent and incomplete reads degrade to empty
    /// sets when they fail.
    pub async fn query_region(
        &self,
        region: Region,
        now: DateTime<Utc>,
    ) -> Result<RegionSnapshot, StoreError> {
        let limits = self.settings().limits;
        let awaiting_filter = OrderFilter::awaiting_shipment(limits.status_page);
        let recent_filter = OrderFilter::Recent {
            limit: limits.recent,
        };
        let incomplete_filter = OrderFilter::incomplete(limits.status_page);
        let (awaiting, recent, incomplete) = tokio::join!(
            self.source().fetch_orders(region, &awaiting_filter),
            self.source().fetch_orders(region, &recent_filter),
            self.source().fetch_orders(region, &incomplete_filter),
        );
        let awaiting = awaiting?;
        let fetch = RegionFetch {
            awaiting,
            recent: secondary_or_empty(region, &recent_filter, recent),
            incomplete: secondary_or_empty(region, &incomplete_filter, incomplete),
        };

        let settings = self.settings();
        let profile = settings.profile(region);
        let evaluation = classify(
            fetch,
            &profile,
            &settings.thresholds,
            limits.recent as usize,
            now,
        );
        let ClassifiedView {
            overdue,
            incomplete_stuck,
            recent,
            commented,
            ..
        } = evaluation.view;
        debug!(
            region = %region,
            awaiting = evaluation.awaiting.len(),
            overdue = overdue.len(),
            incomplete_stuck = incomplete_stuck.len(),
            commented = commented.len(),
            "store query classified"
        );
        Ok(RegionSnapshot {
            store: region,
            total: evaluation.awaiting.len(),
            overdue_count: overdue.len(),
            incomplete_alerts: incomplete_stuck.len(),
            comment_count: commented.len(),
            threshold_hours: settings.thresholds.overdue_hours,
            incomplete_threshold_minutes: settings.thresholds.incomplete_minutes,
            last_checked: now,
            orders: evaluation.awaiting,
            overdue,
            recent_orders: recent,
            incomplete_orders: evaluation.incomplete,
            incomplete_stuck,
            orders_with_comments: commented,
        })
    }
}

fn secondary_or_empty(
    region: Region,
    filter: &OrderFilter,
    result: Result<Vec<Order>, StoreError>,
) -> Vec<Order> {
    result.unwrap_or_else(|error| {
        warn!(
            region = %region,
            filter = filter.label(),
            error = %error,
            "secondary order fetch failed, continuing with empty set"
        );
        Vec::new()
    })
}
