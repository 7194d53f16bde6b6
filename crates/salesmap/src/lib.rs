//! Live sales map feed.
//!
//! A single polling loop owns a [`SalesMapState`] and advances it with [`poll_tick`]: new orders
//! since the previous successful poll are geocoded by billing postcode and turned into map
//! markers. Each order id is counted at most once for the lifetime of the process.

mod geocode;

use chrono::{DateTime, NaiveDate, Utc};
use orderwatch_core_types::{Order, Region};
use orderwatch_storefront::{OrderFilter, OrderSource, StoreError};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

pub use self::geocode::{
    normalize_postcode, Coordinates, GeocodeError, Geocoder, PostcodesIoGeocoder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Connecting,
    Live,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub order_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub area: String,
    pub created_at: DateTime<Utc>,
    pub total: f64,
}

/// Published view of the feed, as served by `GET /api/sales-map`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesMapSnapshot {
    pub status: FeedStatus,
    pub today_count: u64,
    pub total_count: u64,
    pub markers: Vec<MapMarker>,
    pub last_poll: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub fetched: usize,
    pub new_orders: usize,
    pub new_markers: usize,
}

#[derive(Debug, Clone)]
pub struct SalesMapState {
    since: DateTime<Utc>,
    seen: HashSet<u64>,
    geocode_cache: HashMap<String, Coordinates>,
    today: NaiveDate,
    today_count: u64,
    total_count: u64,
    markers: VecDeque<MapMarker>,
    max_markers: usize,
    status: FeedStatus,
    last_poll: Option<DateTime<Utc>>,
}

impl SalesMapState {
    /// Fresh state whose first poll covers everything created since the start of `now`'s UTC day.
    pub fn new(now: DateTime<Utc>, max_markers: usize) -> Self {
        let today = now.date_naive();
        let since = today.and_hms_opt(0, 0, 0).map_or(now, |midnight| midnight.and_utc());
        Self {
            since,
            seen: HashSet::new(),
            geocode_cache: HashMap::new(),
            today,
            today_count: 0,
            total_count: 0,
            markers: VecDeque::new(),
            max_markers: max_markers.max(1),
            status: FeedStatus::Connecting,
            last_poll: None,
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn has_seen(&self, order_id: u64) -> bool {
        self.seen.contains(&order_id)
    }

    pub fn cached_postcodes(&self) -> usize {
        self.geocode_cache.len()
    }

    pub fn snapshot(&self) -> SalesMapSnapshot {
        SalesMapSnapshot {
            status: self.status,
            today_count: self.today_count,
            total_count: self.total_count,
            markers: self.markers.iter().cloned().collect(),
            last_poll: self.last_poll,
        }
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.today {
            debug!(previous = %self.today, today = %today, "sales map day rolled over");
            self.today = today;
            self.today_count = 0;
        }
    }

    fn push_marker(&mut self, marker: MapMarker) {
        if self.markers.len() >= self.max_markers {
            self.markers.pop_front();
        }
        self.markers.push_back(marker);
        self.today_count += 1;
        self.total_count += 1;
    }

    async fn resolve(
        &mut self,
        geocoder: &dyn Geocoder,
        raw_postcode: &str,
    ) -> Option<Coordinates> {
        let postcode = normalize_postcode(raw_postcode);
        if postcode.is_empty() {
            return None;
        }
        if let Some(coords) = self.geocode_cache.get(&postcode) {
            return Some(coords.clone());
        }
        match geocoder.lookup(&postcode).await {
            Ok(Some(coords)) => {
                self.geocode_cache.insert(postcode, coords.clone());
                Some(coords)
            }
            Ok(None) => {
                debug!(postcode = %postcode, "postcode did not resolve");
                None
            }
            Err(error) => {
                warn!(postcode = %postcode, error = %error, "postcode lookup failed");
                None
            }
        }
    }

    async fn process_order(&mut self, geocoder: &dyn Geocoder, order: &Order) -> bool {
        if !self.seen.insert(order.id) {
            return false;
        }
        let Some(coords) = self.resolve(geocoder, &order.billing_address.zip).await else {
            return false;
        };
        self.push_marker(MapMarker {
            order_id: order.id,
            lat: coords.lat,
            lng: coords.lng,
            area: coords.area,
            created_at: order.date_created,
            total: order.total_inc_tax,
        });
        true
    }
}

/// One poll of the feed. Orders are processed one at a time in the order the store returned
/// them; `since` only advances when the fetch succeeds.
pub async fn poll_tick(
    state: &mut SalesMapState,
    source: &dyn OrderSource,
    geocoder: &dyn Geocoder,
    region: Region,
    page_limit: u32,
    now: DateTime<Utc>,
) -> Result<PollSummary, StoreError> {
    state.roll_day(now);
    let filter = OrderFilter::CreatedSince {
        since: state.since,
        limit: page_limit,
    };
    let orders = match source.fetch_orders(region, &filter).await {
        Ok(orders) => orders,
        Err(error) => {
            state.status = FeedStatus::Reconnecting;
            return Err(error);
        }
    };
    state.since = now;
    state.last_poll = Some(now);
    state.status = FeedStatus::Live;

    let mut summary = PollSummary {
        fetched: orders.len(),
        ..PollSummary::default()
    };
    for order in &orders {
        if state.has_seen(order.id) {
            continue;
        }
        summary.new_orders += 1;
        if state.process_order(geocoder, order).await {
            summary.new_markers += 1;
        }
    }
    if summary.new_orders > 0 {
        debug!(
            region = %region,
            fetched = summary.fetched,
            new_orders = summary.new_orders,
            new_markers = summary.new_markers,
            "sales map updated"
        );
    }
    Ok(summary)
}
