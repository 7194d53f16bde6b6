//! Storefront order access.
//!
//! [`StoreClient`] talks to the storefront REST API for each configured region and normalizes
//! its quirks (no-content responses, empty bodies, loosely typed JSON) into validated
//! [`Order`] records. Everything downstream consumes orders through the [`OrderSource`] trait so
//! the check cycle, the query surface and the sales map can be exercised against fakes.

mod client;
mod error;
mod http_utils;
mod raw;
mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderwatch_core_types::{Order, Region, STATUS_AWAITING_SHIPMENT, STATUS_INCOMPLETE};
use std::sync::Arc;

pub use self::client::StoreClient;
pub use self::error::StoreError;
pub use self::http_utils::redacted_endpoint_label;
pub use self::retry::RetryingOrderSource;

/// Selects which slice of a store's orders to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFilter {
    /// Orders currently in the given lifecycle status.
    Status { status_id: u32, limit: u32 },
    /// The most recently created orders regardless of status, newest first.
    Recent { limit: u32 },
    /// Orders created at or after `since`, newest first.
    CreatedSince { since: DateTime<Utc>, limit: u32 },
}

impl OrderFilter {
    pub fn awaiting_shipment(limit: u32) -> Self {
        Self::Status {
            status_id: STATUS_AWAITING_SHIPMENT,
            limit,
        }
    }

    pub fn incomplete(limit: u32) -> Self {
        Self::Status {
            status_id: STATUS_INCOMPLETE,
            limit,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Status {
                status_id: STATUS_AWAITING_SHIPMENT,
                ..
            } => "awaiting_shipment",
            Self::Status {
                status_id: STATUS_INCOMPLETE,
                ..
            } => "incomplete",
            Self::Status { .. } => "status",
            Self::Recent { .. } => "recent",
            Self::CreatedSince { .. } => "created_since",
        }
    }
}

#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetch one slice of orders for `region`. An empty store is `Ok(vec![])`, never an error.
    async fn fetch_orders(
        &self,
        region: Region,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
impl<S> OrderSource for Arc<S>
where
    S: OrderSource + ?Sized,
{
    async fn fetch_orders(
        &self,
        region: Region,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, StoreError> {
        (**self).fetch_orders(region, filter).await
    }
}
