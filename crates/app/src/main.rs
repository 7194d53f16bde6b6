use anyhow::{Context, Result};
use chrono::Utc;
use orderwatch_config::{load_from_env_or_default, AppConfig};
use orderwatch_core_types::Region;
use orderwatch_engine::{AlertDispatcher, EngineSettings, OrderEngine};
use orderwatch_notify::{Notifier, ResendNotifier};
use orderwatch_salesmap::{Geocoder, PostcodesIoGeocoder, SalesMapState};
use orderwatch_storefront::{OrderSource, RetryingOrderSource, StoreClient};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod scheduler;
mod telemetry;
mod web;

use crate::scheduler::{run_app_loop, SalesMapPoller, ScheduledCheck};
use crate::telemetry::init_tracing;
use crate::web::WebRuntimeHandle;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = parse_config_arg();
    let default_path = cli_config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, loaded_config_path) = load_from_env_or_default(&default_path)?;

    init_tracing(&config.system.log_level, config.system.log_json);
    info!(
        config_path = %loaded_config_path.display(),
        env = %config.system.env,
        "configuration loaded"
    );

    let store_client =
        Arc::new(StoreClient::from_config(&config.stores).context("failed to build store client")?);
    let configured = store_client.configured_regions();
    for region in Region::ALL {
        if !configured.contains(&region) {
            warn!(region = %region, "store credentials missing, region will report a config error");
        }
    }

    let resend = ResendNotifier::from_config(&config.notifier, &config.alerts.from_address)
        .context("failed to build notifier")?;
    if !resend.is_configured() {
        warn!("notifier API key missing, alerts will be recorded as not sent");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(resend);

    let settings = EngineSettings::from_config(&config);
    let dispatcher = AlertDispatcher::new(
        notifier,
        &config.alerts.alert_email,
        &config.alerts.brand_name,
        settings.thresholds,
    );
    let engine = OrderEngine::new(store_client.clone(), settings);

    let scheduled = config.scheduler.enabled.then(|| {
        let retrying: Arc<dyn OrderSource> = Arc::new(RetryingOrderSource::new(
            store_client.clone(),
            config.scheduler.max_fetch_attempts,
            Duration::from_millis(config.scheduler.retry_delay_ms),
        ));
        ScheduledCheck {
            engine: engine.with_source(retrying),
            dispatcher: dispatcher.clone(),
            interval_seconds: config.scheduler.interval_seconds,
        }
    });

    let web = WebRuntimeHandle::new(&config, engine, dispatcher.clone());
    let server_task = tokio::spawn(web.clone().run_server(config.web.clone()));
    let sales_map = if config.sales_map.enabled {
        Some(build_sales_map_poller(&config, store_client.clone())?)
    } else {
        None
    };

    run_app_loop(web, server_task, scheduled, sales_map).await
}

fn build_sales_map_poller(
    config: &AppConfig,
    source: Arc<dyn OrderSource>,
) -> Result<SalesMapPoller> {
    let region = config
        .sales_map
        .region
        .trim()
        .parse::<Region>()
        .context("invalid sales_map.region")?;
    let geocoder: Arc<dyn Geocoder> = Arc::new(
        PostcodesIoGeocoder::from_config(&config.sales_map, region.label())
            .context("failed to build geocoder")?,
    );
    Ok(SalesMapPoller {
        source,
        geocoder,
        region,
        page_limit: config.sales_map.page_limit,
        poll_seconds: config.sales_map.poll_seconds,
        state: SalesMapState::new(Utc::now(), config.sales_map.max_markers),
    })
}

fn parse_config_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(inline) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(inline));
        }
    }
    None
}
