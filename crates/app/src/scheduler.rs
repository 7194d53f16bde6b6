use anyhow::Result;
use chrono::Utc;
use orderwatch_core_types::Region;
use orderwatch_engine::{AlertDispatcher, OrderEngine};
use orderwatch_salesmap::{poll_tick, Geocoder, SalesMapState};
use orderwatch_storefront::OrderSource;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::telemetry::format_error_chain;
use crate::web::WebRuntimeHandle;

pub(crate) struct ScheduledCheck {
    pub engine: OrderEngine,
    pub dispatcher: AlertDispatcher,
    pub interval_seconds: u64,
}

pub(crate) struct SalesMapPoller {
    pub source: Arc<dyn OrderSource>,
    pub geocoder: Arc<dyn Geocoder>,
    pub region: Region,
    pub page_limit: u32,
    pub poll_seconds: u64,
    pub state: SalesMapState,
}

impl SalesMapPoller {
    async fn tick(&mut self, web: &WebRuntimeHandle) {
        let result = poll_tick(
            &mut self.state,
            self.source.as_ref(),
            self.geocoder.as_ref(),
            self.region,
            self.page_limit,
            Utc::now(),
        )
        .await;
        match result {
            Ok(summary) => debug!(
                region = %self.region,
                fetched = summary.fetched,
                new_markers = summary.new_markers,
                "sales map poll completed"
            ),
            Err(error) => warn!(
                region = %self.region,
                error = %error,
                "sales map poll failed"
            ),
        }
        web.set_sales_map_snapshot(self.state.snapshot());
    }
}

/// Drives the periodic check cycle and the sales map feed until shutdown or web server exit.
pub(crate) async fn run_app_loop(
    web: WebRuntimeHandle,
    mut server_task: JoinHandle<Result<()>>,
    scheduled: Option<ScheduledCheck>,
    mut sales_map: Option<SalesMapPoller>,
) -> Result<()> {
    let check_seconds = scheduled
        .as_ref()
        .map_or(1, |scheduled| scheduled.interval_seconds.max(1));
    let poll_seconds = sales_map
        .as_ref()
        .map_or(1, |poller| poller.poll_seconds.max(1));
    let mut check_interval = time::interval(Duration::from_secs(check_seconds));
    let mut sales_map_interval = time::interval(Duration::from_secs(poll_seconds));
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    sales_map_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if let Some(poller) = sales_map.as_mut() {
        web.set_sales_map_snapshot(poller.state.snapshot());
    }
    info!(
        scheduler_enabled = scheduled.is_some(),
        check_interval_seconds = check_seconds,
        sales_map_enabled = sales_map.is_some(),
        "app loop started"
    );

    loop {
        tokio::select! {
            _ = check_interval.tick(), if scheduled.is_some() => {
                if let Some(scheduled) = scheduled.as_ref() {
                    let report = scheduled.engine.run_cycle(&scheduled.dispatcher).await;
                    web.set_last_report(report);
                }
            }
            _ = sales_map_interval.tick(), if sales_map.is_some() => {
                if let Some(poller) = sales_map.as_mut() {
                    poller.tick(&web).await;
                }
            }
            joined = &mut server_task => {
                return match joined {
                    Ok(Ok(())) => {
                        warn!("web server exited");
                        Ok(())
                    }
                    Ok(Err(error)) => {
                        warn!(error = %format_error_chain(&error), "web server failed");
                        Err(error)
                    }
                    Err(join_error) => {
                        Err(anyhow::Error::new(join_error).context("web server task panicked"))
                    }
                };
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                server_task.abort();
                break;
            }
        }
    }
    Ok(())
}
