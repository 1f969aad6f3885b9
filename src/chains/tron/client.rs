use crate::chains::tron::{
    config::TronConfig,
    errors::{TronError, TronResult},
    types::{TimeWindow, TransferEvent, TrongridResponse},
};
use crate::logging::mask_address;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// Source of confirmed incoming TRC20 transfers for the receiving address.
#[async_trait]
pub trait TransferFeed: Send + Sync {
    /// All transfers whose block timestamp falls inside `window`.
    async fn fetch_incoming(&self, window: TimeWindow) -> TronResult<Vec<TransferEvent>>;
}

#[derive(Debug, Clone)]
pub struct TrongridClient {
    http_client: Client,
    base_url: String,
    address: String,
    api_key: Option<String>,
    request_timeout: Duration,
    page_limit: u32,
    max_pages: u32,
}

impl TrongridClient {
    pub fn new(config: &TronConfig) -> TronResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("paykit/0.1")
            .build()
            .map_err(|e| TronError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            network = config.network_name(),
            url = %config.api_base_url(),
            address = %mask_address(&config.address),
            "Trongrid client initialized"
        );

        Ok(Self {
            http_client,
            base_url: config.api_base_url().trim_end_matches('/').to_string(),
            address: config.address.clone(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
            page_limit: config.page_limit,
            max_pages: config.max_pages,
        })
    }

    pub fn transfers_url(&self) -> String {
        format!(
            "{}/v1/accounts/{}/transactions/trc20",
            self.base_url, self.address
        )
    }

    fn page_url(&self, window: TimeWindow, fingerprint: Option<&str>) -> TronResult<Url> {
        let mut url = Url::parse(&self.transfers_url())
            .map_err(|e| TronError::config_error(format!("Invalid Trongrid URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("only_confirmed", "true")
                .append_pair("only_to", "true")
                .append_pair("limit", &self.page_limit.to_string())
                .append_pair("min_timestamp", &window.min_timestamp_ms.to_string())
                .append_pair("max_timestamp", &window.max_timestamp_ms.to_string());
            if let Some(fingerprint) = fingerprint {
                query.append_pair("fingerprint", fingerprint);
            }
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        window: TimeWindow,
        fingerprint: Option<&str>,
    ) -> TronResult<TrongridResponse> {
        let url = self.page_url(window, fingerprint)?;
        let mut request = self.http_client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| TronError::timeout(self.request_timeout.as_secs()))??;

        let response = response
            .error_for_status()
            .map_err(|e| TronError::poll_fetch_failure(format!("Trongrid API error: {}", e)))?;

        let body = timeout(self.request_timeout, response.text())
            .await
            .map_err(|_| TronError::timeout(self.request_timeout.as_secs()))??;

        parse_page(&body)
    }
}

/// Decode one Trongrid page, treating `success: false` as a failed fetch.
pub(crate) fn parse_page(body: &str) -> TronResult<TrongridResponse> {
    let page: TrongridResponse = serde_json::from_str(body)?;
    if !page.success {
        return Err(TronError::poll_fetch_failure(format!(
            "Trongrid reported failure: {}",
            page.error.as_deref().unwrap_or("no error message")
        )));
    }
    Ok(page)
}

#[async_trait]
impl TransferFeed for TrongridClient {
    async fn fetch_incoming(&self, window: TimeWindow) -> TronResult<Vec<TransferEvent>> {
        let mut events = Vec::new();
        let mut fingerprint: Option<String> = None;

        for page_number in 1..=self.max_pages {
            let page = self.fetch_page(window, fingerprint.as_deref()).await?;
            let page_len = page.data.len();
            events.extend(page.data.into_iter().map(TransferEvent::from));

            fingerprint = page.meta.and_then(|meta| meta.fingerprint);
            if fingerprint.is_none() || page_len == 0 {
                break;
            }
            if page_number == self.max_pages {
                warn!(
                    pages = self.max_pages,
                    transfers = events.len(),
                    "Transfer window truncated at page limit"
                );
            }
        }

        debug!(
            transfers = events.len(),
            min_timestamp = window.min_timestamp_ms,
            max_timestamp = window.max_timestamp_ms,
            "Fetched incoming transfers"
        );
        Ok(events)
    }
}
