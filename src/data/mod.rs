/// Data layer: table types, loading, cleaning, aggregation and splitting.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐     ┌────────────┐
///   │  filter   │ ──▶ │ aggregate  │  drop negatives, sum per (gateway, timestamp)
///   └───────────┘     └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  split   │  whole gateways → train / dev / test
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer  │  Table → .csv / .parquet
///   └──────────┘
/// ```

pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod split;
pub mod writer;
