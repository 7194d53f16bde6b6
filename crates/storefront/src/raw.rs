use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use orderwatch_core_types::{BillingAddress, Order};
use serde::Deserialize;

/// Order shape as the storefront API emits it. Almost everything is optional or loosely typed;
/// [`RawOrder::into_order`] is the single place where it becomes a validated [`Order`].
#[derive(Debug, Deserialize)]
pub(crate) struct RawOrder {
    id: u64,
    date_created: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_id: Option<u32>,
    #[serde(default)]
    total_inc_tax: Option<RawMoney>,
    #[serde(default)]
    items_total: Option<u32>,
    #[serde(default)]
    billing_address: Option<RawBillingAddress>,
    #[serde(default)]
    customer_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMoney {
    Text(String),
    Number(f64),
}

#[derive(Debug, Default, Deserialize)]
struct RawBillingAddress {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl RawOrder {
    pub(crate) fn into_order(self) -> Result<Order> {
        let date_created = parse_order_timestamp(&self.date_created)
            .with_context(|| format!("order {} has invalid date_created", self.id))?;
        let total_inc_tax = match self.total_inc_tax {
            None => 0.0,
            Some(RawMoney::Number(value)) => value,
            Some(RawMoney::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    0.0
                } else {
                    text.parse::<f64>().map_err(|_| {
                        anyhow!("order {} has invalid total_inc_tax: {}", self.id, text)
                    })?
                }
            }
        };
        let billing = self.billing_address.unwrap_or_default();
        Ok(Order {
            id: self.id,
            date_created,
            status: self.status.unwrap_or_default(),
            status_id: self.status_id.unwrap_or_default(),
            total_inc_tax,
            items_total: self.items_total.unwrap_or_default(),
            billing_address: BillingAddress {
                first_name: billing.first_name.unwrap_or_default(),
                last_name: billing.last_name.unwrap_or_default(),
                company: billing.company.unwrap_or_default(),
                email: billing.email.unwrap_or_default(),
                zip: billing.zip.unwrap_or_default(),
                city: billing.city.unwrap_or_default(),
                country: billing.country.unwrap_or_default(),
            },
            customer_message: self.customer_message.unwrap_or_default(),
        })
    }
}

/// The v2 orders API reports RFC 2822 dates; RFC 3339 is accepted as well.
pub(crate) fn parse_order_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| anyhow!("unparseable timestamp {value:?}: {error}"))
}

pub(crate) fn decode_orders(body: &str) -> Result<Vec<Order>> {
    let raw: Vec<RawOrder> =
        serde_json::from_str(body).context("response body is not an order array")?;
    raw.into_iter().map(RawOrder::into_order).collect()
}
