//! Tuya Cloud OpenAPI access: request signing, token sessions, and the
//! device endpoints the poller needs.

mod client;
mod session;
pub mod signer;

pub use client::{parse_base_url, CloudClient, Credentials, DEFAULT_REQUEST_TIMEOUT};
pub use session::{Session, DEFAULT_TOKEN_LIFETIME_SECS, REFRESH_MARGIN_MS};
