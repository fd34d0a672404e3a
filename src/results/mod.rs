/// Result layer: forecast arrays, error metrics and charts.
///
/// ```text
///  pred.npy / true.npy        (samples × lags × features)
///        │
///        ▼
///   ┌──────────┐
///   │  arrays  │  parse file → ForecastArray
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ metrics  │  MAE / MSE / RMSE / MAPE / MSPE per lag
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   plot   │  lag curves → PNG
///   └──────────┘
/// ```

pub mod arrays;
pub mod color;
pub mod metrics;
pub mod plot;
