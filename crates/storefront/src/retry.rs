use async_trait::async_trait;
use orderwatch_core_types::{Order, Region};
use std::time::Duration;
use tracing::warn;

use super::{OrderFilter, OrderSource, StoreError};

/// Wraps another source and re-issues reads that failed with a retryable error.
#[derive(Debug, Clone)]
pub struct RetryingOrderSource<S> {
    inner: S,
    max_attempts: u32,
    delay: Duration,
}

impl<S> RetryingOrderSource<S> {
    pub fn new(inner: S, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[cfg(test)]
    fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S> OrderSource for RetryingOrderSource<S>
where
    S: OrderSource,
{
    async fn fetch_orders(
        &self,
        region: Region,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, StoreError> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch_orders(region, filter).await {
                Ok(orders) => return Ok(orders),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        region = %region,
                        filter = filter.label(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "store fetch failed, retrying"
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}
