use orderwatch_core_types::Region;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub system: SystemConfig,
    pub web: WebConfig,
    pub stores: StoresConfig,
    pub alerts: AlertsConfig,
    pub notifier: NotifierConfig,
    pub scheduler: SchedulerConfig,
    pub sales_map: SalesMapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub env: String,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret the external scheduler sends as a bearer token.
    pub cron_secret: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cron_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub recent_orders_limit: u32,
    pub status_page_limit: u32,
    pub uk: StoreConfig,
    pub us: StoreConfig,
}

impl StoresConfig {
    pub fn store(&self, region: Region) -> &StoreConfig {
        match region {
            Region::Uk => &self.uk,
            Region::Us => &self.us,
        }
    }

    /// Configured currency symbol, falling back to the region's own currency.
    pub fn currency_symbol(&self, region: Region) -> String {
        let symbol = self.store(region).currency_symbol.trim();
        if symbol.is_empty() {
            region.default_currency_symbol().to_string()
        } else {
            symbol.to_string()
        }
    }

    pub fn store_mut(&mut self, region: Region) -> &mut StoreConfig {
        match region {
            Region::Uk => &mut self.uk,
            Region::Us => &mut self.us,
        }
    }
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.bigcommerce.com".to_string(),
            request_timeout_ms: 10_000,
            recent_orders_limit: 20,
            status_page_limit: 250,
            uk: StoreConfig::with_currency(Region::Uk.default_currency_symbol()),
            us: StoreConfig::with_currency(Region::Us.default_currency_symbol()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub store_hash: String,
    pub access_token: String,
    pub currency_symbol: String,
}

impl StoreConfig {
    fn with_currency(symbol: &str) -> Self {
        Self {
            currency_symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.store_hash.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub overdue_threshold_hours: i64,
    pub incomplete_threshold_minutes: i64,
    pub alert_email: String,
    pub from_address: String,
    pub brand_name: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            overdue_threshold_hours: 24,
            incomplete_threshold_minutes: 15,
            alert_email: String::new(),
            from_address: "Order Watch <onboarding@resend.dev>".to_string(),
            brand_name: "Order Watch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.resend.com".to_string(),
            api_key: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub max_fetch_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 3 * 60 * 60,
            max_fetch_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesMapConfig {
    pub enabled: bool,
    pub region: String,
    pub poll_seconds: u64,
    pub page_limit: u32,
    pub max_markers: usize,
    pub geocoder_base_url: String,
    pub geocoder_timeout_ms: u64,
}

impl Default for SalesMapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            region: "uk".to_string(),
            poll_seconds: 30,
            page_limit: 50,
            max_markers: 500,
            geocoder_base_url: "https://api.postcodes.io".to_string(),
            geocoder_timeout_ms: 5_000,
        }
    }
}
