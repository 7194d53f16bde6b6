//! Order classification and alert dispatch.
//!
//! Raw orders from every configured store are enriched with age and store identity, classified
//! into alert categories and either handed to the [`AlertDispatcher`] (check cycle) or returned
//! as a [`RegionSnapshot`] (query path). Nothing here keeps state between cycles.

mod alerts;
mod classify;
mod cycle;
mod dispatch;
mod enrich;
mod query;

use orderwatch_config::AppConfig;
use orderwatch_core_types::Region;
use std::collections::BTreeMap;

pub use self::alerts::{escape_html, render_alert, subject, AlertMessage};
pub use self::classify::{
    classify, commented, overdue, stuck_incomplete, RegionEvaluation, RegionFetch,
};
pub use self::cycle::{CheckReport, OrderEngine};
pub use self::dispatch::{AlertDispatcher, DispatchOutcome, TrackOutcome};
pub use self::enrich::{age_minutes, enrich, enrich_order, AlertThresholds, RegionProfile};
pub use self::query::RegionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Size of the "most recent orders" window.
    pub recent: u32,
    /// Page size for status-filtered reads.
    pub status_page: u32,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            recent: 20,
            status_page: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub thresholds: AlertThresholds,
    pub limits: FetchLimits,
    profiles: BTreeMap<Region, RegionProfile>,
}

impl EngineSettings {
    pub fn new(
        thresholds: AlertThresholds,
        limits: FetchLimits,
        profiles: impl IntoIterator<Item = RegionProfile>,
    ) -> Self {
        Self {
            thresholds,
            limits,
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.region, profile))
                .collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            AlertThresholds::from_config(&config.alerts),
            FetchLimits {
                recent: config.stores.recent_orders_limit,
                status_page: config.stores.status_page_limit,
            },
            Region::ALL
                .into_iter()
                .map(|region| RegionProfile::from_config(&config.stores, region)),
        )
    }

    pub fn profile(&self, region: Region) -> RegionProfile {
        self.profiles
            .get(&region)
            .cloned()
            .unwrap_or_else(|| RegionProfile {
                region,
                identity: String::new(),
                currency_symbol: region.default_currency_symbol().to_string(),
            })
    }

    /// Regions visited by a check cycle, in stable order.
    pub fn regions(&self) -> Vec<Region> {
        self.profiles.keys().copied().collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use orderwatch_core_types::{BillingAddress, Order, STATUS_AWAITING_SHIPMENT, STATUS_INCOMPLETE};
    use orderwatch_notify::{Notifier, NotifierError};
    use orderwatch_storefront::{OrderFilter, OrderSource, StoreError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub fn uk_profile() -> RegionProfile {
        RegionProfile {
            region: Region::Uk,
            identity: "ukhash".to_string(),
            currency_symbol: "£".to_string(),
        }
    }

    pub fn us_profile() -> RegionProfile {
        RegionProfile {
            region: Region::Us,
            identity: "ushash".to_string(),
            currency_symbol: "$".to_string(),
        }
    }

    pub fn settings() -> EngineSettings {
        EngineSettings::new(
            AlertThresholds::default(),
            FetchLimits::default(),
            [uk_profile(), us_profile()],
        )
    }

    pub fn order_at(id: u64, created: DateTime<Utc>) -> Order {
        Order {
            id,
            date_created: created,
            status: "Awaiting Shipment".to_string(),
            status_id: STATUS_AWAITING_SHIPMENT,
            total_inc_tax: 25.0,
            items_total: 1,
            billing_address: BillingAddress {
                first_name: "Test".to_string(),
                last_name: format!("Customer{id}"),
                zip: "SW1A 1AA".to_string(),
                ..BillingAddress::default()
            },
            customer_message: String::new(),
        }
    }

    pub fn commented_order(id: u64, created: DateTime<Utc>, message: &str) -> Order {
        Order {
            customer_message: message.to_string(),
            ..order_at(id, created)
        }
    }

    pub fn incomplete_order(id: u64, created: DateTime<Utc>) -> Order {
        Order {
            status: "Incomplete".to_string(),
            status_id: STATUS_INCOMPLETE,
            ..order_at(id, created)
        }
    }

    /// In-memory order source keyed by region and filter label; unknown keys return no orders.
    #[derive(Default)]
    pub struct FakeSource {
        responses: HashMap<(Region, &'static str), Result<Vec<Order>, StoreError>>,
        calls: Mutex<Vec<(Region, &'static str)>>,
    }

    impl FakeSource {
        pub fn with(
            mut self,
            region: Region,
            label: &'static str,
            response: Result<Vec<Order>, StoreError>,
        ) -> Self {
            self.responses.insert((region, label), response);
            self
        }

        pub fn calls(&self) -> Vec<(Region, &'static str)> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl OrderSource for FakeSource {
        async fn fetch_orders(
            &self,
            region: Region,
            filter: &OrderFilter,
        ) -> Result<Vec<Order>, StoreError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((region, filter.label()));
            }
            self.responses
                .get(&(region, filter.label()))
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Records every send attempt as `(to, subject)`; fails sends whose subject contains the
    /// configured needle.
    #[derive(Default)]
    pub struct RecordingNotifier {
        fail_subject_containing: Option<&'static str>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn failing_on(needle: &'static str) -> Self {
            Self {
                fail_subject_containing: Some(needle),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), NotifierError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((to.to_string(), subject.to_string()));
            }
            match self.fail_subject_containing {
                Some(needle) if subject.contains(needle) => Err(NotifierError::Rejected {
                    status: 500,
                    body: "provider unavailable".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    pub fn uk_config_error() -> StoreError {
        StoreError::Config {
            region: Region::Uk,
            missing: "store_hash",
        }
    }
}
