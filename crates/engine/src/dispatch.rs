use orderwatch_core_types::{AlertCategory, ClassifiedView};
use orderwatch_notify::Notifier;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::alerts::render_alert;
use super::enrich::{AlertThresholds, RegionProfile};

/// Result of one alert track in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Nothing to report; the notifier was not called.
    Skipped,
    Sent,
    Failed(String),
}

impl TrackOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub overdue: TrackOutcome,
    pub incomplete: TrackOutcome,
    pub commented: TrackOutcome,
}

#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    alert_email: Option<String>,
    brand_name: String,
    thresholds: AlertThresholds,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        alert_email: &str,
        brand_name: &str,
        thresholds: AlertThresholds,
    ) -> Self {
        let alert_email = alert_email.trim();
        Self {
            notifier,
            alert_email: (!alert_email.is_empty()).then(|| alert_email.to_string()),
            brand_name: brand_name.to_string(),
            thresholds,
        }
    }

    /// Run the three tracks for one store. Each track is independent: one failing never
    /// prevents the others from being attempted.
    pub async fn dispatch(
        &self,
        view: &ClassifiedView,
        profile: &RegionProfile,
    ) -> DispatchOutcome {
        let (overdue, incomplete, commented) = tokio::join!(
            self.dispatch_track(AlertCategory::OverdueUnshipped, view, profile),
            self.dispatch_track(AlertCategory::StuckIncomplete, view, profile),
            self.dispatch_track(AlertCategory::HasComment, view, profile),
        );
        DispatchOutcome {
            overdue,
            incomplete,
            commented,
        }
    }

    async fn dispatch_track(
        &self,
        category: AlertCategory,
        view: &ClassifiedView,
        profile: &RegionProfile,
    ) -> TrackOutcome {
        let orders = view.category(category);
        if orders.is_empty() {
            return TrackOutcome::Skipped;
        }
        let Some(to) = self.alert_email.as_deref() else {
            error!(
                region = %profile.region,
                category = %category,
                "alert email is not configured, alert not sent"
            );
            return TrackOutcome::Failed("alert email is not configured".to_string());
        };

        let message = render_alert(
            category,
            orders,
            profile,
            &self.thresholds,
            &self.brand_name,
        );
        match self.notifier.send(to, &message.subject, &message.html).await {
            Ok(()) => {
                info!(
                    region = %profile.region,
                    category = %category,
                    orders = orders.len(),
                    "alert sent"
                );
                TrackOutcome::Sent
            }
            Err(send_error) => {
                warn!(
                    region = %profile.region,
                    category = %category,
                    orders = orders.len(),
                    error = %send_error,
                    "alert delivery failed"
                );
                TrackOutcome::Failed(send_error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich;
    use crate::test_support::{commented_order, order_at, uk_profile, RecordingNotifier};
    use chrono::{Duration, TimeZone, Utc};
    use orderwatch_core_types::Region;

    fn view_with_overdue_and_comment() -> ClassifiedView {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let overdue = enrich(
            vec![order_at(1, now - Duration::hours(30))],
            &uk_profile(),
            &AlertThresholds::default(),
            now,
        );
        let commented = enrich(
            vec![commented_order(2, now, "ring the bell")],
            &uk_profile(),
            &AlertThresholds::default(),
            now,
        );
        ClassifiedView {
            overdue,
            commented,
            ..ClassifiedView::empty(Region::Uk)
        }
    }

    #[tokio::test]
    async fn empty_categories_never_call_the_notifier() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = AlertDispatcher::new(
            notifier.clone(),
            "ops@example.com",
            "Order Watch",
            AlertThresholds::default(),
        );
        let outcome = dispatcher
            .dispatch(&ClassifiedView::empty(Region::Uk), &uk_profile())
            .await;
        assert_eq!(outcome.overdue, TrackOutcome::Skipped);
        assert_eq!(outcome.incomplete, TrackOutcome::Skipped);
        assert_eq!(outcome.commented, TrackOutcome::Skipped);
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn one_failing_track_does_not_block_another() {
        let notifier = Arc::new(RecordingNotifier::failing_on("Unshipped"));
        let dispatcher = AlertDispatcher::new(
            notifier.clone(),
            "ops@example.com",
            "Order Watch",
            AlertThresholds::default(),
        );
        let outcome = dispatcher
            .dispatch(&view_with_overdue_and_comment(), &uk_profile())
            .await;
        assert!(matches!(outcome.overdue, TrackOutcome::Failed(_)));
        assert_eq!(outcome.incomplete, TrackOutcome::Skipped);
        assert_eq!(outcome.commented, TrackOutcome::Sent);
        let calls = notifier.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(to, _)| to == "ops@example.com"));
    }

    #[tokio::test]
    async fn missing_alert_email_records_not_sent() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher =
            AlertDispatcher::new(notifier.clone(), "  ", "Order Watch", AlertThresholds::default());
        let outcome = dispatcher
            .dispatch(&view_with_overdue_and_comment(), &uk_profile())
            .await;
        assert!(!outcome.overdue.is_sent());
        assert!(!outcome.commented.is_sent());
        assert!(notifier.calls().is_empty());
    }
}
