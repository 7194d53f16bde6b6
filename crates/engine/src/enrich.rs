use chrono::{DateTime, Utc};
use orderwatch_config::{AlertsConfig, StoresConfig};
use orderwatch_core_types::{EnrichedOrder, Order, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    pub overdue_hours: i64,
    pub incomplete_minutes: i64,
}

impl AlertThresholds {
    pub fn from_config(config: &AlertsConfig) -> Self {
        Self {
            overdue_hours: config.overdue_threshold_hours,
            incomplete_minutes: config.incomplete_threshold_minutes,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            overdue_hours: 24,
            incomplete_minutes: 15,
        }
    }
}

/// Store-specific attributes stamped onto every order of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionProfile {
    pub region: Region,
    /// Store hash; used to build admin links.
    pub identity: String,
    pub currency_symbol: String,
}

impl RegionProfile {
    pub fn from_config(config: &StoresConfig, region: Region) -> Self {
        Self {
            region,
            identity: config.store(region).store_hash.trim().to_string(),
            currency_symbol: config.currency_symbol(region),
        }
    }

    pub fn admin_orders_url(&self) -> String {
        format!(
            "https://store-{}.mybigcommerce.com/manage/orders",
            self.identity
        )
    }
}

/// Whole minutes between creation and `now`; creation times in the future count as zero.
pub fn age_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_minutes().max(0)
}

pub fn enrich_order(
    order: Order,
    profile: &RegionProfile,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> EnrichedOrder {
    let age_minutes = age_minutes(order.date_created, now);
    let age_hours = age_minutes / 60;
    EnrichedOrder {
        order,
        age_minutes,
        age_hours,
        is_overdue: age_hours >= thresholds.overdue_hours,
        region: profile.region,
        region_identity: profile.identity.clone(),
        currency: profile.currency_symbol.clone(),
    }
}

pub fn enrich(
    orders: Vec<Order>,
    profile: &RegionProfile,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<EnrichedOrder> {
    orders
        .into_iter()
        .map(|order| enrich_order(order, profile, thresholds, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{order_at, uk_profile};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn future_creation_times_clamp_to_zero_age() {
        let created = now() + Duration::minutes(90);
        assert_eq!(age_minutes(created, now()), 0);
        let enriched = enrich_order(
            order_at(1, created),
            &uk_profile(),
            &AlertThresholds::default(),
            now(),
        );
        assert_eq!(enriched.age_minutes, 0);
        assert_eq!(enriched.age_hours, 0);
        assert!(!enriched.is_overdue);
    }

    #[test]
    fn partial_minutes_are_floored() {
        let created = now() - Duration::seconds(59 * 60 + 59);
        assert_eq!(age_minutes(created, now()), 59);
        let created = now() - Duration::minutes(125);
        let enriched = enrich_order(
            order_at(1, created),
            &uk_profile(),
            &AlertThresholds::default(),
            now(),
        );
        assert_eq!(enriched.age_minutes, 125);
        assert_eq!(enriched.age_hours, 2);
    }

    #[test]
    fn overdue_flag_matches_threshold_for_edge_values() {
        let created = now() - Duration::hours(24);
        let cases = [
            (0, true),
            (23, true),
            (24, true),
            (25, false),
            (i64::MAX, false),
        ];
        for (threshold, expected) in cases {
            let thresholds = AlertThresholds {
                overdue_hours: threshold,
                incomplete_minutes: 15,
            };
            let enriched = enrich_order(order_at(1, created), &uk_profile(), &thresholds, now());
            assert_eq!(enriched.is_overdue, expected, "threshold={threshold}");
            assert_eq!(
                enriched.is_overdue,
                enriched.age_hours >= thresholds.overdue_hours
            );
        }
        let fresh = enrich_order(
            order_at(2, now()),
            &uk_profile(),
            &AlertThresholds {
                overdue_hours: 0,
                incomplete_minutes: 15,
            },
            now(),
        );
        assert!(fresh.is_overdue);
    }

    #[test]
    fn enrichment_stamps_region_identity_and_currency() {
        let orders = vec![order_at(1, now()), order_at(2, now())];
        let enriched = enrich(orders, &uk_profile(), &AlertThresholds::default(), now());
        assert!(enriched.iter().all(|order| order.region == Region::Uk
            && order.region_identity == "ukhash"
            && order.currency == "£"));
        assert_eq!(
            uk_profile().admin_orders_url(),
            "https://store-ukhash.mybigcommerce.com/manage/orders"
        );
    }
}
