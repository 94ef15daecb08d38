//! PNG bar charts returned inline with every prediction.
//!
//! Charts are drawn into an in-memory RGB buffer with plotters, encoded as
//! PNG and wrapped in a `data:` URI. Text uses an embedded DejaVu Sans so
//! rendering does not depend on fonts installed on the host.

use std::ops::Range;
use std::sync::OnceLock;

use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle};
use thiserror::Error;

use crate::types::RiskClass;

pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 200;

const FONT_FAMILY: &str = "sans-serif";
static DEJAVU_SANS: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

const RED: RGBColor = RGBColor(0xFF, 0x00, 0x00);
const GREEN: RGBColor = RGBColor(0x00, 0x80, 0x00);
const BLUE_BAR: RGBColor = RGBColor(0x00, 0x00, 0xFF);
const ORANGE: RGBColor = RGBColor(0xFF, 0xA5, 0x00);

const BAR_INSET: f64 = 0.15;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to register chart font: {0}")]
    Font(String),
    #[error("failed to draw chart: {0}")]
    Draw(String),
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),
}

/// Both charts of a prediction, as `data:image/png;base64,...` strings.
#[derive(Debug, Clone)]
pub struct Charts {
    pub probability: String,
    pub features: String,
}

pub fn render(
    risk: RiskClass,
    probability: f64,
    slope_angle: f64,
    rainfall: f64,
) -> Result<Charts, ChartError> {
    Ok(Charts {
        probability: data_uri(&probability_chart(risk, probability)?),
        features: data_uri(&feature_chart(slope_angle, rainfall)?),
    })
}

/// Register the embedded font. Safe to call repeatedly.
pub fn register_fonts() -> Result<(), ChartError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, DEJAVU_SANS)
                .map_err(|_| "embedded DejaVu Sans is not a valid font".to_string())
        })
        .clone()
        .map_err(ChartError::Font)
}

pub fn probability_chart(risk: RiskClass, probability: f64) -> Result<Vec<u8>, ChartError> {
    let color = if risk.is_high() { RED } else { GREEN };
    bar_chart(
        "Rockfall Risk Probability",
        Some("Risk %"),
        &[Bar {
            label: "Probability",
            value: probability,
            color,
        }],
        0.0..100.0,
    )
}

pub fn feature_chart(slope_angle: f64, rainfall: f64) -> Result<Vec<u8>, ChartError> {
    let bars = [
        Bar {
            label: "Slope Angle",
            value: slope_angle,
            color: BLUE_BAR,
        },
        Bar {
            label: "Rainfall",
            value: rainfall,
            color: ORANGE,
        },
    ];
    let y_range = value_range(&bars);
    bar_chart("Mine Feature Values", None, &bars, y_range)
}

pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", base64::encode(png))
}

struct Bar {
    label: &'static str,
    value: f64,
    color: RGBColor,
}

/// Span 0 and every bar, with 5% headroom.
fn value_range(bars: &[Bar]) -> Range<f64> {
    let lo = bars.iter().map(|b| b.value).fold(0.0, f64::min);
    let hi = bars.iter().map(|b| b.value).fold(0.0, f64::max);
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        return 0.0..1.0;
    }
    let pad = span * 0.05;
    let lo = if lo < 0.0 { lo - pad } else { lo };
    lo..hi + pad
}

fn draw_err<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Draw(err.to_string())
}

fn bar_chart(
    title: &str,
    y_desc: Option<&str>,
    bars: &[Bar],
    y_range: Range<f64>,
) -> Result<Vec<u8>, ChartError> {
    register_fonts()?;

    let mut pixels = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        // One unit of x per bar; categories are labelled by hand below.
        let y_floor = y_range.start;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT_FAMILY, 16).into_font())
            .margin(8)
            .x_label_area_size(22)
            .y_label_area_size(if y_desc.is_some() { 44 } else { 36 })
            .build_cartesian_2d(0f64..bars.len() as f64, y_range)
            .map_err(draw_err)?;

        let blank = |_: &f64| String::new();
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .x_label_formatter(&blank)
            .label_style((FONT_FAMILY, 11));
        if let Some(desc) = y_desc {
            mesh.y_desc(desc);
        }
        mesh.draw().map_err(draw_err)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(i, bar)| {
                let x = i as f64;
                Rectangle::new(
                    [(x + BAR_INSET, 0.0), (x + 1.0 - BAR_INSET, bar.value)],
                    bar.color.filled(),
                )
            }))
            .map_err(draw_err)?;

        let label_style = TextStyle::from((FONT_FAMILY, 11).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (i, bar) in bars.iter().enumerate() {
            let (px, py) = chart.backend_coord(&(i as f64 + 0.5, y_floor));
            root.draw(&Text::new(bar.label, (px, py + 4), label_style.clone()))
                .map_err(draw_err)?;
        }

        root.present().map_err(draw_err)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&pixels, WIDTH, HEIGHT, ColorType::Rgb8)?;
    Ok(png)
}
