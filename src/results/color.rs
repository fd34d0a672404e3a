use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

/// Hue of the first series; later series step around the wheel from here.
const BASE_HUE: f32 = 215.0;

fn to_rgb(hsl: Hsl) -> RGBColor {
    let rgb: Srgb = hsl.into_color();
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    RGBColor(channel(rgb.red), channel(rgb.green), channel(rgb.blue))
}

/// Line colours for `n` series of one chart.
///
/// The first series is the metric itself and is drawn darker; the rest
/// (mean predictions, mean targets) get evenly spaced lighter hues.
pub fn series_palette(n: usize) -> Vec<RGBColor> {
    (0..n)
        .map(|i| {
            let hue = BASE_HUE + (i as f32 / n as f32) * 360.0;
            let lightness = if i == 0 { 0.35 } else { 0.5 };
            to_rgb(Hsl::new(hue, 0.7, lightness))
        })
        .collect()
}
