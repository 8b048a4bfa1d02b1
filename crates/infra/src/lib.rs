//! Infrastructure layer: configuration and adapters for the external services
//! checkout talks to.

pub mod config;
pub mod external;
pub mod order_store;

pub use config::AppConfig;
pub use external::{ClientError, HttpCouponValidator, HttpOrderApi};
pub use order_store::InMemoryOrderApi;
