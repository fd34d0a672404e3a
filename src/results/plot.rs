use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;

use super::color::series_palette;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;

/// One named curve over the lag axis.
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

/// Axis range covering every finite value, padded by 5 %.
fn value_range<'a>(series: impl IntoIterator<Item = &'a Series<'a>>) -> (f64, f64) {
    let (lo, hi) = series
        .into_iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if (hi - lo).abs() < f64::EPSILON {
        1.0
    } else {
        (hi - lo) * 0.05
    };
    (lo - pad, hi + pad)
}

/// Draw `series` against lags `1..=n` as line-and-marker curves into a PNG.
///
/// Non-finite values are skipped.
pub fn plot_lag_series(path: &Path, title: &str, series: &[Series<'_>]) -> Result<()> {
    let lags = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let (y_min, y_max) = value_range(series);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..(lags as f64 + 1.0), y_min..y_max)?;

    chart.configure_mesh().x_desc("Lag").draw()?;

    for (s, color) in series.iter().zip(series_palette(series.len())) {
        let points: Vec<(f64, f64)> = s
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| ((i + 1) as f64, v))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(s.name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(
            points
                .iter()
                .map(|&p| Circle::new(p, 3, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("saving plot {}", path.display()))?;
    log::info!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_ignores_non_finite_values() {
        let a = [1.0, f64::NAN, 3.0];
        let b = [f64::INFINITY, 2.0];
        let series = [
            Series { name: "a", values: &a },
            Series { name: "b", values: &b },
        ];
        let (lo, hi) = value_range(&series);
        assert!((lo - 0.9).abs() < 1e-12);
        assert!((hi - 3.1).abs() < 1e-12);
    }

    #[test]
    fn flat_or_empty_series_get_a_usable_range() {
        let flat = [2.0, 2.0];
        assert_eq!(value_range(&[Series { name: "f", values: &flat }]), (1.0, 3.0));
        assert_eq!(value_range(&[Series { name: "e", values: &[] }]), (0.0, 1.0));
    }
}
