//! REST implementation of [`RemoteCartStore`].
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | `GET` | `carts/{user}` | response `{"items": [...]}`, 404 = empty |
//! | `PUT` | `carts/{user}` | request `{"items": [...]}` |
//! | `DELETE` | `carts/{user}` | none, 404 tolerated |

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use suitcart_core::{LineItem, UserId};
use tracing::{debug, instrument};
use url::Url;

use super::{RemoteCartStore, RemoteError};
use crate::config::RemoteApiConfig;
use crate::local::{decode_snapshot, serialize_snapshot};

const ERROR_BODY_PREVIEW: usize = 200;

/// HTTP client for the cart API.
#[derive(Clone)]
pub struct HttpCartStore {
    inner: Arc<HttpCartStoreInner>,
}

struct HttpCartStoreInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpCartStore {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RemoteApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(HttpCartStoreInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.expose_secret().to_string(),
            }),
        })
    }

    fn cart_url(&self, user: &UserId) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidEndpoint(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(["carts", user.as_str()]);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(&self.inner.api_key)
            .header("Accept", "application/json")
    }

    /// Send a request and return the body of a successful response.
    ///
    /// `Ok(None)` means 404 Not Found.
    async fn send(&self, builder: RequestBuilder) -> Result<Option<String>, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Cart API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        Ok(Some(body))
    }
}

#[async_trait]
impl RemoteCartStore for HttpCartStore {
    #[instrument(skip(self), fields(user = %user))]
    async fn fetch_items(&self, user: &UserId) -> Result<Vec<LineItem>, RemoteError> {
        let url = self.cart_url(user)?;
        let Some(body) = self.send(self.request(Method::GET, url)).await? else {
            debug!("No server cart yet");
            return Ok(Vec::new());
        };

        let items = decode_snapshot(&body)?;
        debug!(items = items.len(), "Fetched server cart");
        Ok(items)
    }

    #[instrument(skip(self, items), fields(user = %user, items = items.len()))]
    async fn replace_items(&self, user: &UserId, items: &[LineItem]) -> Result<(), RemoteError> {
        let url = self.cart_url(user)?;
        let body = serialize_snapshot(items)?;
        let builder = self
            .request(Method::PUT, url)
            .header("Content-Type", "application/json")
            .body(body);

        match self.send(builder).await? {
            Some(_) => Ok(()),
            None => Err(RemoteError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: "cart endpoint not found".to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn clear_items(&self, user: &UserId) -> Result<(), RemoteError> {
        let url = self.cart_url(user)?;
        // 404 means there was nothing to delete
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
