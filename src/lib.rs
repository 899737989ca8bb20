//! `sensorsink`: poll Tuya Cloud sensors and persist readings to
//! time-series stores.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): each
//! module owns one concern and the gateway below re-exports what callers
//! need, so `main.rs` and the integration tests never reach into module
//! internals.
//!
//! - `cloud` – request signing, token sessions, device endpoints
//! - `parser` – raw properties to [`SensorReading`]
//! - `orchestrator` – the batch pass over devices and sinks
//! - `sinks` – the [`TimeSeriesSink`] trait and its InfluxDB/QuestDB backends
//! - `schema` – QuestDB table bootstrap
//! - `config` – environment configuration

pub mod cloud;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod schema;
pub mod sinks;

pub use cloud::{CloudClient, Credentials, Session};
pub use config::{Config, SinkKind};
pub use error::{Error, Result};
pub use models::{DeviceNameIndex, FetchOutcome, SensorReading, SkipReason, WriteOutcome};
pub use orchestrator::{fetch_all, run, RunReport, SinkReport};
pub use sinks::{build_sinks, InfluxSink, QuestDbSink, TimeSeriesSink};
