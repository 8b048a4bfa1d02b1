use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use bookstore_core::Money;
use bookstore_pricing::{CouponError, CouponValidator, normalize_code};

use super::{Backend, ClientError};

/// `GET {base_url}/coupons/{code}?subtotal=N`.
///
/// 200 carries `{ "discount": N }`, 404 means the code is unknown and 422
/// carries `{ "min_subtotal": N }`. Anything else, including transport
/// failures, is reported as [`CouponError::Unavailable`].
#[derive(Debug, Clone)]
pub struct HttpCouponValidator {
    backend: Backend,
}

#[derive(Deserialize)]
struct Granted {
    discount: Money,
}

#[derive(Deserialize)]
struct BelowMinimum {
    #[serde(default)]
    min_subtotal: Money,
}

impl HttpCouponValidator {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            backend: Backend::new(base_url, token, timeout)?,
        })
    }
}

#[async_trait]
impl CouponValidator for HttpCouponValidator {
    async fn validate(&self, code: &str, subtotal: Money) -> Result<Money, CouponError> {
        let code = normalize_code(code);
        let mut url = self.backend.endpoint(&["coupons", &code]);
        url.query_pairs_mut()
            .append_pair("subtotal", &subtotal.to_string());

        let req = self.backend.client.get(url);
        let resp = self
            .backend
            .authorize(req)
            .send()
            .await
            .map_err(|e| CouponError::Unavailable(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let granted: Granted = resp
                    .json()
                    .await
                    .map_err(|e| CouponError::Unavailable(e.to_string()))?;
                // The pricing calculator clamps too; never trust more than the subtotal.
                Ok(granted.discount.min(subtotal))
            }
            StatusCode::NOT_FOUND => Err(CouponError::Unknown(code)),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body: BelowMinimum = resp
                    .json()
                    .await
                    .map_err(|e| CouponError::Unavailable(e.to_string()))?;
                Err(CouponError::BelowMinimum {
                    min_subtotal: body.min_subtotal,
                })
            }
            status => Err(CouponError::Unavailable(format!(
                "coupon service answered {status}"
            ))),
        }
    }
}
