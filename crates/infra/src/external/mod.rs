//! HTTP clients for the bookstore backend.
//!
//! Both clients share one shape: a base URL, an optional bearer token and a
//! `reqwest::Client` built with the configured request timeout. Neither retries
//! on its own.

mod coupons;
mod orders;

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub use coupons::HttpCouponValidator;
pub use orders::{HttpOrderApi, IDEMPOTENCY_KEY_HEADER};

/// Failure to construct a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Connection settings shared by the backend clients.
#[derive(Debug, Clone)]
struct Backend {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl Backend {
    fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token,
        })
    }

    /// `{base_url}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> Backend {
        Backend::new(base, None, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn endpoint_appends_segments_once() {
        assert_eq!(
            backend("http://localhost:8080").endpoint(&["orders"]).as_str(),
            "http://localhost:8080/orders"
        );
        assert_eq!(
            backend("http://localhost:8080/api/").endpoint(&["coupons", "READ10"]).as_str(),
            "http://localhost:8080/api/coupons/READ10"
        );
    }

    #[test]
    fn endpoint_encodes_user_input() {
        let url = backend("http://localhost:8080").endpoint(&["coupons", "A B/C"]);
        assert_eq!(url.as_str(), "http://localhost:8080/coupons/A%20B%2FC");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for bad in ["not a url", "mailto:orders@example.in"] {
            match Backend::new(bad, None, Duration::from_secs(1)) {
                Err(ClientError::InvalidBaseUrl { url, .. }) => assert_eq!(url, bad),
                _ => panic!("Expected InvalidBaseUrl for {bad}"),
            }
        }
    }
}
