use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use bookstore_checkout::{OrderApi, OrderApiError, OrderConfirmation, PlaceOrderRequest};

use super::{Backend, ClientError};

/// Header carrying the request's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// `POST {base_url}/orders` against the bookstore backend.
#[derive(Debug, Clone)]
pub struct HttpOrderApi {
    backend: Backend,
}

impl HttpOrderApi {
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
impl OrderApi for HttpOrderApi {
    async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<OrderConfirmation, OrderApiError> {
        let url = self.backend.endpoint(&["orders"]);
        let key = request.idempotency_key.to_string();
        debug!(url = %url, idempotency_key = %key, "posting order");

        let req = self
            .backend
            .client
            .post(url)
            .header(IDEMPOTENCY_KEY_HEADER, key.as_str())
            .json(request);
        let resp = self
            .backend
            .authorize(req)
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), idempotency_key = %key, "order rejected by backend");
            return Err(OrderApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<OrderConfirmation>()
            .await
            .map_err(|e| OrderApiError::Decode(e.to_string()))
    }
}
