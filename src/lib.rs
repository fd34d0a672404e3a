//! Dataset preparation and result analysis for PV generation forecasting.
//!
//! * [`prepare`] cleans a raw solar-manager export, sums readings per
//!   gateway and timestamp, and splits whole gateways into train/dev/test.
//! * [`analyse`] turns saved `pred`/`true` arrays into per-lag error metrics
//!   and charts.
//! * [`tracking`] forwards configuration and metrics to a run logger.

pub mod analyse;
pub mod constants;
pub mod data;
pub mod error;
pub mod prepare;
pub mod results;
pub mod tracking;

pub use data::model::{Table, Value};
pub use data::split::{split_by_group, Partitions, SplitLabel, SplitRatios};
pub use error::PrepError;
