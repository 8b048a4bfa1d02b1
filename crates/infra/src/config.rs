//! Configuration loading and representation.
//!
//! Everything comes from `BOOKSTORE_*` environment variables. Pricing
//! constants, coupons and the pincode table are data, so each can be supplied
//! as a JSON file; when the variable is unset the built-in defaults apply.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use bookstore_checkout::DeliveryTable;
use bookstore_pricing::{CouponTable, PricingPolicy};

use crate::external::{HttpCouponValidator, HttpOrderApi};

pub const API_URL_VAR: &str = "BOOKSTORE_API_URL";
pub const API_TOKEN_VAR: &str = "BOOKSTORE_API_TOKEN";
pub const HTTP_TIMEOUT_VAR: &str = "BOOKSTORE_HTTP_TIMEOUT_SECS";
pub const PRICING_FILE_VAR: &str = "BOOKSTORE_PRICING_FILE";
pub const COUPONS_FILE_VAR: &str = "BOOKSTORE_COUPONS_FILE";
pub const DELIVERY_FILE_VAR: &str = "BOOKSTORE_DELIVERY_FILE";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub http_timeout: Duration,
    pub pricing: PricingPolicy,
    pub coupons: CouponTable,
    pub delivery: DeliveryTable,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            pricing: PricingPolicy::default(),
            coupons: CouponTable::default(),
            delivery: DeliveryTable::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_url = var(API_URL_VAR).unwrap_or_else(|| {
            tracing::warn!("{API_URL_VAR} not set; using {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });

        let http_timeout = match var(HTTP_TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{HTTP_TIMEOUT_VAR} must be a whole number of seconds, got {raw:?}"))?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let pricing: PricingPolicy = match var(PRICING_FILE_VAR) {
            Some(path) => load_json(Path::new(&path))?,
            None => PricingPolicy::default(),
        };
        pricing
            .validate()
            .context("pricing policy is not usable")?;

        let coupons = match var(COUPONS_FILE_VAR) {
            Some(path) => load_json(Path::new(&path))?,
            None => CouponTable::default(),
        };

        let delivery = match var(DELIVERY_FILE_VAR) {
            Some(path) => load_json(Path::new(&path))?,
            None => DeliveryTable::default(),
        };

        tracing::info!(
            api_url = %api_url,
            timeout_secs = http_timeout.as_secs(),
            coupons = coupons.len(),
            "configuration loaded"
        );

        Ok(Self {
            api_url,
            api_token: var(API_TOKEN_VAR),
            http_timeout,
            pricing,
            coupons,
            delivery,
        })
    }

    pub fn order_api(&self) -> Result<HttpOrderApi> {
        HttpOrderApi::new(&self.api_url, self.api_token.clone(), self.http_timeout)
            .context("building order API client")
    }

    pub fn coupon_validator(&self) -> Result<HttpCouponValidator> {
        HttpCouponValidator::new(&self.api_url, self.api_token.clone(), self.http_timeout)
            .context("building coupon client")
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
