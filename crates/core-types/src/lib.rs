use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status code for a checkout that was started but never paid.
pub const STATUS_INCOMPLETE: u32 = 0;
/// Lifecycle status code for a paid order that has not been fulfilled yet.
pub const STATUS_AWAITING_SHIPMENT: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Uk,
    Us,
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Uk, Region::Us];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uk => "uk",
            Self::Us => "us",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Uk => "UK",
            Self::Us => "US",
        }
    }

    pub fn default_currency_symbol(self) -> &'static str {
        match self {
            Self::Uk => "£",
            Self::Us => "$",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown store region: {0}")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uk" => Ok(Self::Uk),
            "us" => Ok(Self::Us),
            other => Err(UnknownRegion(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub email: String,
    pub zip: String,
    pub city: String,
    pub country: String,
}

/// An order as returned by a storefront, after boundary validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub date_created: DateTime<Utc>,
    pub status: String,
    pub status_id: u32,
    pub total_inc_tax: f64,
    pub items_total: u32,
    pub billing_address: BillingAddress,
    pub customer_message: String,
}

impl Order {
    /// Company name when present, otherwise the billing person, otherwise the email.
    pub fn customer_name(&self) -> String {
        let billing = &self.billing_address;
        let company = billing.company.trim();
        if !company.is_empty() {
            return company.to_string();
        }
        let person = format!("{} {}", billing.first_name.trim(), billing.last_name.trim());
        let person = person.trim();
        if !person.is_empty() {
            return person.to_string();
        }
        let email = billing.email.trim();
        if !email.is_empty() {
            return email.to_string();
        }
        "Unknown customer".to_string()
    }

    pub fn has_customer_message(&self) -> bool {
        !self.customer_message.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub age_minutes: i64,
    pub age_hours: i64,
    pub is_overdue: bool,
    pub region: Region,
    pub region_identity: String,
    pub currency: String,
}

impl EnrichedOrder {
    pub fn id(&self) -> u64 {
        self.order.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    OverdueUnshipped,
    StuckIncomplete,
    HasComment,
}

impl AlertCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverdueUnshipped => "overdue_unshipped",
            Self::StuckIncomplete => "stuck_incomplete",
            Self::HasComment => "has_comment",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-store classification produced by one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedView {
    pub region: Region,
    pub overdue: Vec<EnrichedOrder>,
    pub incomplete_stuck: Vec<EnrichedOrder>,
    pub recent: Vec<EnrichedOrder>,
    pub commented: Vec<EnrichedOrder>,
}

impl ClassifiedView {
    pub fn empty(region: Region) -> Self {
        Self {
            region,
            overdue: Vec::new(),
            incomplete_stuck: Vec::new(),
            recent: Vec::new(),
            commented: Vec::new(),
        }
    }

    pub fn category(&self, category: AlertCategory) -> &[EnrichedOrder] {
        match category {
            AlertCategory::OverdueUnshipped => &self.overdue,
            AlertCategory::StuckIncomplete => &self.incomplete_stuck,
            AlertCategory::HasComment => &self.commented,
        }
    }
}

/// Outcome of one store within a check cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheckResult {
    pub store: Region,
    pub overdue_orders: usize,
    pub incomplete_orders: usize,
    pub orders_with_comments: usize,
    pub overdue_email_sent: bool,
    pub incomplete_email_sent: bool,
    pub comments_email_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreCheckResult {
    pub fn failed(store: Region, error: impl Into<String>) -> Self {
        Self {
            store,
            overdue_orders: 0,
            incomplete_orders: 0,
            orders_with_comments: 0,
            overdue_email_sent: false,
            incomplete_email_sent: false,
            comments_email_sent: false,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
