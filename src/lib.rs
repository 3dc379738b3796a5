//! Companion-side telemetry pipeline for a ventilator controller.
//!
//! Two independent pipelines:
//! - link text → [`frame`] → [`fields`] → [`decoder`] → [`link`] → [`store`]
//! - [`store`] → [`correction`] → [`sweep`], driven by [`monitor`]

pub mod config;
pub mod correction;
pub mod decoder;
pub mod error;
pub mod fields;
pub mod frame;
pub mod link;
pub mod monitor;
pub mod store;
pub mod sweep;
pub mod timeseries;
