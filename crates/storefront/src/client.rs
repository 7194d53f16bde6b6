use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use orderwatch_config::StoresConfig;
use orderwatch_core_types::{Order, Region};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::http_utils::{classify_request_error, redacted_endpoint_label, truncate_error_body};
use super::raw::decode_orders;
use super::{OrderFilter, OrderSource, StoreError};

#[derive(Debug, Clone)]
struct StoreCredentials {
    store_hash: String,
    access_token: String,
}

/// HTTP client for the storefront orders API, one credential pair per region.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: Client,
    api_base_url: String,
    credentials: BTreeMap<Region, StoreCredentials>,
}

impl StoreClient {
    pub fn from_config(config: &StoresConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(500)))
            .build()
            .context("failed to build reqwest client")?;
        let credentials = Region::ALL
            .into_iter()
            .map(|region| {
                let store = config.store(region);
                (
                    region,
                    StoreCredentials {
                        store_hash: store.store_hash.trim().to_string(),
                        access_token: store.access_token.trim().to_string(),
                    },
                )
            })
            .collect();
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn configured_regions(&self) -> Vec<Region> {
        self.credentials
            .iter()
            .filter(|(_, credentials)| {
                !credentials.store_hash.is_empty() && !credentials.access_token.is_empty()
            })
            .map(|(region, _)| *region)
            .collect()
    }

    fn credentials(&self, region: Region) -> Result<&StoreCredentials, StoreError> {
        let credentials = self.credentials.get(&region).ok_or(StoreError::Config {
            region,
            missing: "store_hash",
        })?;
        if credentials.store_hash.is_empty() {
            return Err(StoreError::Config {
                region,
                missing: "store_hash",
            });
        }
        if credentials.access_token.is_empty() {
            return Err(StoreError::Config {
                region,
                missing: "access_token",
            });
        }
        Ok(credentials)
    }

    fn orders_url(&self, credentials: &StoreCredentials) -> String {
        format!(
            "{}/stores/{}/v2/orders",
            self.api_base_url, credentials.store_hash
        )
    }
}

fn filter_query(filter: &OrderFilter) -> Vec<(&'static str, String)> {
    match filter {
        OrderFilter::Status { status_id, limit } => vec![
            ("status_id", status_id.to_string()),
            ("limit", limit.to_string()),
        ],
        OrderFilter::Recent { limit } => vec![
            ("sort", "date_created:desc".to_string()),
            ("limit", limit.to_string()),
        ],
        OrderFilter::CreatedSince { since, limit } => vec![
            (
                "min_date_created",
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("sort", "date_created:desc".to_string()),
            ("limit", limit.to_string()),
        ],
    }
}

#[async_trait]
impl OrderSource for StoreClient {
    async fn fetch_orders(
        &self,
        region: Region,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, StoreError> {
        let credentials = self.credentials(region)?;
        let url = self.orders_url(credentials);
        let endpoint_label = redacted_endpoint_label(&url);
        debug!(
            region = %region,
            filter = filter.label(),
            endpoint = %endpoint_label,
            "fetching store orders"
        );

        let response = self
            .http
            .get(&url)
            .header("X-Auth-Token", &credentials.access_token)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .query(&filter_query(filter))
            .send()
            .await
            .map_err(|error| StoreError::Transport {
                region,
                class: classify_request_error(&error),
                endpoint: endpoint_label.clone(),
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!(region = %region, filter = filter.label(), "store returned no content");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Upstream {
                region,
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| StoreError::Transport {
                region,
                class: classify_request_error(&error),
                endpoint: endpoint_label.clone(),
            })?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let orders = decode_orders(&body).map_err(|error| StoreError::Decode {
            region,
            detail: format!("{error:#}"),
        })?;
        debug!(
            region = %region,
            filter = filter.label(),
            orders = orders.len(),
            "store orders fetched"
        );
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orderwatch_config::StoreConfig;
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    fn stores_config(base_url: &str, uk: bool, us: bool) -> StoresConfig {
        let mut config = StoresConfig {
            api_base_url: base_url.to_string(),
            request_timeout_ms: 2_000,
            ..StoresConfig::default()
        };
        if uk {
            config.uk = StoreConfig {
                store_hash: "ukhash".to_string(),
                access_token: "uk-token".to_string(),
                currency_symbol: "£".to_string(),
            };
        }
        if us {
            config.us = StoreConfig {
                store_hash: "ushash".to_string(),
                access_token: "us-token".to_string(),
                currency_symbol: "$".to_string(),
            };
        }
        config
    }

    #[test]
    fn created_since_query_uses_utc_seconds() {
        let since = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let query = filter_query(&OrderFilter::CreatedSince { since, limit: 50 });
        assert_eq!(
            query,
            vec![
                ("min_date_created", "2026-03-01T00:00:00Z".to_string()),
                ("sort", "date_created:desc".to_string()),
                ("limit", "50".to_string()),
            ]
        );
    }

    #[test]
    fn only_regions_with_both_credentials_are_configured() {
        let mut config = stores_config("http://127.0.0.1:1", false, true);
        config.uk.store_hash = "ukhash".to_string();
        let client = StoreClient::from_config(&config).expect("build client");
        assert_eq!(client.configured_regions(), vec![Region::Us]);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let client = StoreClient::from_config(&stores_config("http://127.0.0.1:1", false, true))
            .expect("build client");
        let error = client
            .fetch_orders(Region::Uk, &OrderFilter::awaiting_shipment(250))
            .await
            .expect_err("uk has no credentials");
        assert!(error.is_config());
        assert_eq!(error.region(), Region::Uk);
    }

    #[tokio::test]
    async fn no_content_is_an_empty_order_list() {
        let Some((url, handle)) = spawn_one_shot_upstream_raw(204, "application/json", "") else {
            return;
        };
        let client = StoreClient::from_config(&stores_config(&url, true, false)).expect("client");
        let orders = client
            .fetch_orders(Region::Uk, &OrderFilter::awaiting_shipment(250))
            .await
            .expect("204 is not an error");
        assert!(orders.is_empty());
        let _ = handle.join();
    }

    #[tokio::test]
    async fn blank_success_body_is_an_empty_order_list() {
        let Some((url, handle)) = spawn_one_shot_upstream_raw(200, "application/json", "  \n")
        else {
            return;
        };
        let client = StoreClient::from_config(&stores_config(&url, true, false)).expect("client");
        let orders = client
            .fetch_orders(Region::Uk, &OrderFilter::Recent { limit: 20 })
            .await
            .expect("blank body is not an error");
        assert!(orders.is_empty());
        let _ = handle.join();
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error_with_region() {
        let Some((url, handle)) =
            spawn_one_shot_upstream_raw(500, "text/plain", "internal failure")
        else {
            return;
        };
        let client = StoreClient::from_config(&stores_config(&url, false, true)).expect("client");
        let error = client
            .fetch_orders(Region::Us, &OrderFilter::incomplete(250))
            .await
            .expect_err("500 must fail");
        match error {
            StoreError::Upstream {
                region,
                status,
                body,
            } => {
                assert_eq!(region, Region::Us);
                assert_eq!(status, 500);
                assert!(body.contains("internal failure"), "body={body}");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
        let _ = handle.join();
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let client = StoreClient::from_config(&stores_config("http://127.0.0.1:1", true, false))
            .expect("client");
        let error = client
            .fetch_orders(Region::Uk, &OrderFilter::Recent { limit: 20 })
            .await
            .expect_err("closed port must fail");
        assert_eq!(error.kind(), "transport");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let Some((url, handle)) =
            spawn_one_shot_upstream_raw(200, "application/json", "{\"unexpected\":true}")
        else {
            return;
        };
        let client = StoreClient::from_config(&stores_config(&url, true, false)).expect("client");
        let error = client
            .fetch_orders(Region::Uk, &OrderFilter::Recent { limit: 20 })
            .await
            .expect_err("object body must fail");
        assert_eq!(error.kind(), "decode");
        let _ = handle.join();
    }

    #[tokio::test]
    async fn sends_auth_token_and_status_filter() {
        let body = r#"[{"id": 42, "date_created": "Mon, 02 Mar 2026 10:00:00 +0000",
            "status": "Awaiting Shipment", "status_id": 9, "total_inc_tax": "10.00",
            "customer_message": "leave by the door"}]"#;
        let Some((url, handle)) = spawn_one_shot_upstream_capture(body) else {
            return;
        };
        let client = StoreClient::from_config(&stores_config(&url, true, false)).expect("client");
        let orders = client
            .fetch_orders(Region::Uk, &OrderFilter::awaiting_shipment(250))
            .await
            .expect("orders decode");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 42);
        assert_eq!(orders[0].customer_message, "leave by the door");

        let request = handle.join().expect("capture thread");
        let request_line = request.lines().next().unwrap_or_default().to_string();
        assert!(
            request_line.starts_with("GET /stores/ukhash/v2/orders?"),
            "request_line={request_line}"
        );
        assert!(request_line.contains("status_id=9"), "request_line={request_line}");
        assert!(request_line.contains("limit=250"), "request_line={request_line}");
        assert!(
            request
                .lines()
                .any(|line| line.eq_ignore_ascii_case("x-auth-token: uk-token")),
            "request={request}"
        );
    }

    fn spawn_one_shot_upstream_raw(
        status: u16,
        content_type: &str,
        body: &str,
    ) -> Option<(String, thread::JoinHandle<()>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        let response_body = body.to_string();
        let content_type = content_type.to_string();
        let reason = match status {
            200 => "OK",
            204 => "No Content",
            401 => "Unauthorized",
            404 => "Not Found",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
        .to_string();
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request_buf = [0u8; 8192];
                let _ = stream.read(&mut request_buf);
                let response = if status == 204 {
                    format!("HTTP/1.1 {} {}\r\nConnection: close\r\n\r\n", status, reason)
                } else {
                    format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reason,
                        content_type,
                        response_body.len(),
                        response_body
                    )
                };
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        Some((format!("http://{}", addr), handle))
    }

    fn spawn_one_shot_upstream_capture(body: &str) -> Option<(String, thread::JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        let response_body = body.to_string();
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return String::new();
            };
            let mut request_buf = [0u8; 8192];
            let bytes_read = stream.read(&mut request_buf).unwrap_or(0);
            let request_raw = String::from_utf8_lossy(&request_buf[..bytes_read]).to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response_body.len(),
                response_body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            request_raw
        });
        Some((format!("http://{}", addr), handle))
    }
}
