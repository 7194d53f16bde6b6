use chrono::{DateTime, Utc};
use orderwatch_core_types::{ClassifiedView, EnrichedOrder, Order, STATUS_INCOMPLETE};
use std::collections::HashSet;

use super::enrich::{enrich, AlertThresholds, RegionProfile};

/// The three raw order sets read for one store in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionFetch {
    pub awaiting: Vec<Order>,
    pub recent: Vec<Order>,
    pub incomplete: Vec<Order>,
}

/// Enriched sets plus the classification derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEvaluation {
    pub view: ClassifiedView,
    /// Every awaiting-shipment order, most overdue first.
    pub awaiting: Vec<EnrichedOrder>,
    /// Every incomplete order, longest open first.
    pub incomplete: Vec<EnrichedOrder>,
}

pub fn overdue(awaiting: &[EnrichedOrder]) -> Vec<EnrichedOrder> {
    let mut overdue: Vec<EnrichedOrder> = awaiting
        .iter()
        .filter(|order| order.is_overdue)
        .cloned()
        .collect();
    sort_by_age_hours(&mut overdue);
    overdue
}

pub fn stuck_incomplete(
    incomplete: &[EnrichedOrder],
    thresholds: &AlertThresholds,
) -> Vec<EnrichedOrder> {
    let mut stuck: Vec<EnrichedOrder> = incomplete
        .iter()
        .filter(|order| {
            order.order.status_id == STATUS_INCOMPLETE
                && order.age_minutes >= thresholds.incomplete_minutes
        })
        .cloned()
        .collect();
    sort_by_age_minutes(&mut stuck);
    stuck
}

/// First occurrence of each id wins, in input order; the comment filter runs afterwards so a
/// later duplicate can never resurrect an id.
pub fn commented<'a, I>(sets: I) -> Vec<EnrichedOrder>
where
    I: IntoIterator<Item = &'a [EnrichedOrder]>,
{
    let mut seen = HashSet::new();
    sets.into_iter()
        .flatten()
        .filter(|order| seen.insert(order.id()))
        .filter(|order| order.order.has_customer_message())
        .cloned()
        .collect()
}

pub fn classify(
    fetch: RegionFetch,
    profile: &RegionProfile,
    thresholds: &AlertThresholds,
    recent_limit: usize,
    now: DateTime<Utc>,
) -> RegionEvaluation {
    let mut awaiting = enrich(fetch.awaiting, profile, thresholds, now);
    let mut recent = enrich(fetch.recent, profile, thresholds, now);
    let mut incomplete = enrich(fetch.incomplete, profile, thresholds, now);
    recent.truncate(recent_limit);

    let commented = commented([
        awaiting.as_slice(),
        recent.as_slice(),
        incomplete.as_slice(),
    ]);
    let view = ClassifiedView {
        region: profile.region,
        overdue: overdue(&awaiting),
        incomplete_stuck: stuck_incomplete(&incomplete, thresholds),
        recent,
        commented,
    };

    sort_by_age_hours(&mut awaiting);
    sort_by_age_minutes(&mut incomplete);
    RegionEvaluation {
        view,
        awaiting,
        incomplete,
    }
}

fn sort_by_age_hours(orders: &mut [EnrichedOrder]) {
    orders.sort_by(|a, b| b.age_hours.cmp(&a.age_hours).then(a.id().cmp(&b.id())));
}

fn sort_by_age_minutes(orders: &mut [EnrichedOrder]) {
    orders.sort_by(|a, b| {
        b.age_minutes
            .cmp(&a.age_minutes)
            .then(a.id().cmp(&b.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commented_order, incomplete_order, order_at, uk_profile};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn ids(orders: &[EnrichedOrder]) -> Vec<u64> {
        orders.iter().map(EnrichedOrder::id).collect()
    }

    fn enriched(orders: Vec<Order>) -> Vec<EnrichedOrder> {
        enrich(orders, &uk_profile(), &AlertThresholds::default(), now())
    }

    #[test]
    fn overdue_ties_are_ordered_by_ascending_id() {
        let awaiting = enriched(vec![
            order_at(30, now() - Duration::minutes(26 * 60 + 5)),
            order_at(10, now() - Duration::minutes(26 * 60 + 40)),
            order_at(20, now() - Duration::hours(40)),
            order_at(5, now() - Duration::hours(2)),
        ]);
        assert_eq!(ids(&overdue(&awaiting)), vec![20, 10, 30]);
    }

    #[test]
    fn stuck_incomplete_requires_status_and_age() {
        let thresholds = AlertThresholds::default();
        let mut paid = order_at(4, now() - Duration::minutes(60));
        paid.status_id = 11;
        let incomplete = enriched(vec![
            incomplete_order(1, now() - Duration::minutes(14)),
            incomplete_order(2, now() - Duration::minutes(15)),
            incomplete_order(3, now() - Duration::minutes(45)),
            paid,
        ]);
        assert_eq!(ids(&stuck_incomplete(&incomplete, &thresholds)), vec![3, 2]);
    }

    #[test]
    fn commented_dedup_is_idempotent_over_repeated_sets() {
        let a = enriched(vec![
            commented_order(1, now(), "gift wrap please"),
            order_at(2, now()),
            commented_order(3, now(), "  "),
        ]);
        let b = enriched(vec![
            commented_order(4, now(), "call before delivery"),
            commented_order(1, now(), "gift wrap please"),
        ]);
        let doubled = commented([a.as_slice(), a.as_slice(), b.as_slice()]);
        let single = commented([a.as_slice(), b.as_slice()]);
        assert_eq!(doubled, single);
        assert_eq!(ids(&single), vec![1, 4]);
    }

    #[test]
    fn first_occurrence_wins_even_without_comment() {
        let awaiting = enriched(vec![order_at(7, now())]);
        let recent = enriched(vec![commented_order(7, now(), "late edit")]);
        assert!(commented([awaiting.as_slice(), recent.as_slice()]).is_empty());
    }

    #[test]
    fn order_in_awaiting_and_recent_is_listed_once() {
        let order = commented_order(9, now() - Duration::hours(30), "fragile");
        let fetch = RegionFetch {
            awaiting: vec![order.clone()],
            recent: vec![order_at(8, now()), order],
            incomplete: Vec::new(),
        };
        let evaluation = classify(fetch, &uk_profile(), &AlertThresholds::default(), 20, now());
        assert_eq!(ids(&evaluation.view.commented), vec![9]);
        assert_eq!(ids(&evaluation.view.overdue), vec![9]);
    }

    #[test]
    fn recent_is_truncated_to_limit() {
        let fetch = RegionFetch {
            recent: (1..=5).map(|id| order_at(id, now())).collect(),
            ..RegionFetch::default()
        };
        let evaluation = classify(fetch, &uk_profile(), &AlertThresholds::default(), 3, now());
        assert_eq!(ids(&evaluation.view.recent), vec![1, 2, 3]);
    }

    #[test]
    fn classification_is_repeatable() {
        let fetch = RegionFetch {
            awaiting: vec![
                order_at(1, now() - Duration::hours(25)),
                commented_order(2, now() - Duration::hours(3), "hi"),
            ],
            recent: vec![commented_order(2, now() - Duration::hours(3), "hi")],
            incomplete: vec![incomplete_order(3, now() - Duration::minutes(30))],
        };
        let first = classify(fetch.clone(), &uk_profile(), &AlertThresholds::default(), 20, now());
        let second = classify(fetch, &uk_profile(), &AlertThresholds::default(), 20, now());
        assert_eq!(first, second);
    }
}
