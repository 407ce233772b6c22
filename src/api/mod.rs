//! HTTP client for the aggregator API.
//!
//! The server owns search aggregation, cart persistence and checkout; this
//! module only speaks its JSON contract. Every endpoint takes and returns
//! JSON, there is no authentication, and no request carries a timeout beyond
//! the TCP connect timeout.

pub mod error;
pub mod types;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

pub use error::ApiError;
pub use types::{CartItem, MessageResponse, Product, SearchResults, ShopResult};

use types::{
    AddToCartRequest, ErrorResponse, RemoveFromCartRequest, SearchRequest, UpdateCartRequest,
};

/// The two search endpoints, split out so the search controller can run
/// against an in-memory backend in tests.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// `POST /api/search`: starts aggregation and returns what is known so far.
    async fn search(&self, query: &str) -> Result<SearchResults, ApiError>;

    /// `POST /api/search/update`: current accumulated state for `query`.
    async fn search_update(&self, query: &str) -> Result<SearchResults, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub base_url: String,
    pub(crate) inner: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let inner = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            inner,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        // Keep the existing client if the builder fails.
        if let Ok(c) = reqwest::Client::builder().connect_timeout(timeout).build() {
            self.inner = c;
        }
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of the server-side image cache for `img_url`.
    pub fn cached_image_url(&self, img_url: &str) -> Result<String, ApiError> {
        let url = Url::parse_with_params(&self.endpoint("/cached_image"), &[("url", img_url)])
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(endpoint = %url, "POST");
        let resp = self.inner.post(&url).json(body).send().await?;
        Self::decode(&url, resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(endpoint = %url, "GET");
        let resp = self.inner.get(&url).send().await?;
        Self::decode(&url, resp).await
    }

    async fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            error!(endpoint = %url, status = %status.as_u16(), body = %text, "non-success status");
            return Err(match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(body) => ApiError::Rejected {
                    status,
                    message: body.error,
                },
                Err(_) => ApiError::Status { status, body: text },
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn cart(&self) -> Result<Vec<CartItem>, ApiError> {
        self.get_json("/api/cart").await
    }

    pub async fn cart_add(&self, product: &Product) -> Result<MessageResponse, ApiError> {
        self.post_json("/api/cart/add", &AddToCartRequest { product })
            .await
    }

    /// Sends the quantity as given; clamping is the caller's job.
    pub async fn cart_update(&self, link: &str, quantity: u32) -> Result<MessageResponse, ApiError> {
        self.post_json("/api/cart/update", &UpdateCartRequest { link, quantity })
            .await
    }

    pub async fn cart_remove(&self, link: &str) -> Result<MessageResponse, ApiError> {
        self.post_json("/api/cart/remove", &RemoveFromCartRequest { link })
            .await
    }

    pub async fn cart_checkout(&self) -> Result<MessageResponse, ApiError> {
        self.post_json("/api/cart/checkout", &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl SearchApi for ApiClient {
    async fn search(&self, query: &str) -> Result<SearchResults, ApiError> {
        self.post_json("/api/search", &SearchRequest { query }).await
    }

    async fn search_update(&self, query: &str) -> Result<SearchResults, ApiError> {
        self.post_json("/api/search/update", &SearchRequest { query })
            .await
    }
}
