use anyhow::{Context, Result};
use orderwatch_core_types::Region;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::env_parsing::{non_empty_env, parse_env_flag, parse_env_number, validate_config};
use super::AppConfig;

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    Ok(cfg)
}

/// Loads the TOML config named by `ORDERWATCH_CONFIG` (or `default_path`) and layers the
/// `ORDERWATCH_*` environment overrides on top. A missing default file yields defaults so an
/// environment-only deployment works; an explicitly configured path must exist.
pub fn load_from_env_or_default(default_path: &Path) -> Result<(AppConfig, PathBuf)> {
    let explicit = non_empty_env("ORDERWATCH_CONFIG").map(PathBuf::from);
    let configured = explicit
        .clone()
        .unwrap_or_else(|| default_path.to_path_buf());
    let mut config = if explicit.is_none() && !configured.exists() {
        AppConfig::default()
    } else {
        load_from_path(&configured)?
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok((config, configured))
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Some(level) = non_empty_env("ORDERWATCH_LOG_LEVEL") {
        config.system.log_level = level;
    }
    if let Some(json) = parse_env_flag("ORDERWATCH_LOG_JSON")? {
        config.system.log_json = json;
    }
    if let Some(env_name) = non_empty_env("ORDERWATCH_ENV") {
        config.system.env = env_name;
    }

    if let Some(host) = non_empty_env("ORDERWATCH_WEB_HOST") {
        config.web.host = host;
    }
    if let Some(port) = parse_env_number::<u16>("ORDERWATCH_WEB_PORT")? {
        config.web.port = port;
    }
    if let Some(secret) = non_empty_env("ORDERWATCH_CRON_SECRET") {
        config.web.cron_secret = secret;
    }

    if let Some(base_url) = non_empty_env("ORDERWATCH_STORE_API_BASE_URL") {
        config.stores.api_base_url = base_url;
    }
    for region in Region::ALL {
        let prefix = format!("ORDERWATCH_{}", region.label());
        let store = config.stores.store_mut(region);
        if let Some(hash) = non_empty_env(&format!("{prefix}_STORE_HASH")) {
            store.store_hash = hash;
        }
        if let Some(token) = non_empty_env(&format!("{prefix}_ACCESS_TOKEN")) {
            store.access_token = token;
        }
        if let Some(symbol) = non_empty_env(&format!("{prefix}_CURRENCY_SYMBOL")) {
            store.currency_symbol = symbol;
        }
    }

    if let Some(email) = non_empty_env("ORDERWATCH_ALERT_EMAIL") {
        config.alerts.alert_email = email;
    }
    if let Some(from) = non_empty_env("ORDERWATCH_ALERT_FROM") {
        config.alerts.from_address = from;
    }
    if let Some(hours) = parse_env_number::<i64>("ORDERWATCH_THRESHOLD_HOURS")? {
        config.alerts.overdue_threshold_hours = hours;
    }
    if let Some(minutes) = parse_env_number::<i64>("ORDERWATCH_INCOMPLETE_THRESHOLD_MINUTES")? {
        config.alerts.incomplete_threshold_minutes = minutes;
    }

    if let Some(api_key) = non_empty_env("ORDERWATCH_NOTIFIER_API_KEY") {
        config.notifier.api_key = api_key;
    }

    if let Some(enabled) = parse_env_flag("ORDERWATCH_SCHEDULER_ENABLED")? {
        config.scheduler.enabled = enabled;
    }
    if let Some(seconds) = parse_env_number::<u64>("ORDERWATCH_SCHEDULER_INTERVAL_SECONDS")? {
        config.scheduler.interval_seconds = seconds;
    }

    if let Some(enabled) = parse_env_flag("ORDERWATCH_SALES_MAP_ENABLED")? {
        config.sales_map.enabled = enabled;
    }
    if let Some(region) = non_empty_env("ORDERWATCH_SALES_MAP_REGION") {
        config.sales_map.region = region.to_ascii_lowercase();
    }
    Ok(())
}
