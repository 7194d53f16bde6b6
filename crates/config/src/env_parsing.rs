use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;

use super::AppConfig;

pub(crate) fn parse_env_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns the trimmed value of `key`, treating an empty value as unset.
pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_env_number<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
{
    let Some(raw) = non_empty_env(key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| anyhow!("{key} must be a valid number, got: {raw}"))
}

pub(crate) fn parse_env_flag(key: &str) -> Result<Option<bool>> {
    let Some(raw) = non_empty_env(key) else {
        return Ok(None);
    };
    parse_env_bool(raw.clone())
        .map(Some)
        .ok_or_else(|| {
            anyhow!("{key} must be a boolean (true/false/1/0/yes/no/on/off), got: {raw}")
        })
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<()> {
    if config.web.port == 0 {
        return Err(anyhow!("web.port must be greater than zero"));
    }
    if config.alerts.overdue_threshold_hours < 0 {
        return Err(anyhow!(
            "alerts.overdue_threshold_hours must not be negative, got {}",
            config.alerts.overdue_threshold_hours
        ));
    }
    if config.alerts.incomplete_threshold_minutes < 0 {
        return Err(anyhow!(
            "alerts.incomplete_threshold_minutes must not be negative, got {}",
            config.alerts.incomplete_threshold_minutes
        ));
    }
    if config.stores.recent_orders_limit == 0 || config.stores.status_page_limit == 0 {
        return Err(anyhow!(
            "stores.recent_orders_limit and stores.status_page_limit must be greater than zero"
        ));
    }
    if config.scheduler.enabled {
        if config.scheduler.interval_seconds == 0 {
            return Err(anyhow!(
                "scheduler.interval_seconds must be greater than zero when the scheduler is enabled"
            ));
        }
        if config.scheduler.max_fetch_attempts == 0 {
            return Err(anyhow!("scheduler.max_fetch_attempts must be at least 1"));
        }
    }
    if config.sales_map.enabled {
        config
            .sales_map
            .region
            .trim()
            .parse::<orderwatch_core_types::Region>()
            .map_err(|error| anyhow!("sales_map.region is invalid: {error}"))?;
        if config.sales_map.poll_seconds == 0 {
            return Err(anyhow!(
                "sales_map.poll_seconds must be greater than zero when the sales map is enabled"
            ));
        }
    }
    Ok(())
}
