//! Bar charts of category frequencies, encoded as PNG.
//!
//! Each chart is drawn by `plotters` into an in-memory RGB buffer and then
//! PNG-encoded with `image`. Text uses the bundled DejaVu Sans, so output
//! does not depend on the fonts installed on the host.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use log::debug;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::color::{bar_colors, named_color};
use crate::config::ChartStyle;
use crate::data::model::{PartitionKind, TableView};
use crate::error::{PipelineError, Result};
use crate::summary::FrequencyTable;

const FONT_FAMILY: &str = "sans-serif";
static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const MARGIN: u32 = 15;
const X_LABEL_AREA: u32 = 45;
const Y_LABEL_AREA: u32 = 60;

// ---------------------------------------------------------------------------
// ChartArtifact
// ---------------------------------------------------------------------------

/// One rendered chart: its title and the encoded PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    pub title: String,
    pub png: Vec<u8>,
}

impl ChartArtifact {
    /// PNG bytes as standard base64, for embedding in text documents.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the four views (full, train, validation, test) in that order.
pub fn render_partitions(
    views: &[TableView<'_>; 4],
    column: &str,
    style: &ChartStyle,
) -> Result<Vec<ChartArtifact>> {
    PartitionKind::ALL
        .iter()
        .zip(views)
        .map(|(kind, view)| render_chart(view, column, style.title(*kind), style))
        .collect()
}

/// Bar chart of the category counts of `column` in `view`, bars ordered by
/// descending count.
pub fn render_chart(
    view: &TableView<'_>,
    column: &str,
    title: &str,
    style: &ChartStyle,
) -> Result<ChartArtifact> {
    if view.is_empty() {
        return Err(PipelineError::Render(format!("'{title}' has no rows")));
    }
    let freq = FrequencyTable::from_view(view, column).ok_or_else(|| {
        PipelineError::Render(format!("column '{column}' does not exist"))
    })?;

    let image = draw_bar_chart(&freq, title, style)?;
    let png = encode_png(&image)?;
    debug!("rendered '{title}': {} bars, {} bytes", freq.len(), png.len());

    Ok(ChartArtifact {
        title: title.to_string(),
        png,
    })
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PipelineError::Render(format!("PNG encoding failed: {e}")))?;
    Ok(buffer)
}

/// Make the bundled font available to plotters under [`FONT_FAMILY`].
fn register_fonts() -> Result<()> {
    static REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_DATA).map_err(|_| "InvalidFont".to_string())
        })
        .clone()
        .map_err(|e| PipelineError::Render(format!("loading chart font: {e}")))
}

fn rgb(color: Rgb<u8>) -> RGBColor {
    let [r, g, b] = color.0;
    RGBColor(r, g, b)
}

fn render_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Render(e.to_string())
}

fn draw_bar_chart(freq: &FrequencyTable, title: &str, style: &ChartStyle) -> Result<RgbImage> {
    register_fonts()?;
    let ink = rgb(named_color(&style.edge_color)?);
    let fills = bar_colors(freq.len(), named_color(&style.bar_color)?, style.distinct_colors);
    let bars: Vec<(&str, usize)> = freq.iter().collect();

    let (width, height) = (style.width, style.height);
    let plot_width = width.saturating_sub(Y_LABEL_AREA + 2 * MARGIN);
    let gap = plot_width / bars.len().max(1) as u32 / 5;
    // Headroom above the tallest bar.
    let y_max = freq.max_count() + freq.max_count() / 10 + 1;

    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT_FAMILY, 24).into_font().color(&ink))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d((0..bars.len()).into_segmented(), 0..y_max)
            .map_err(render_error)?;

        let category_of = |value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(i) => {
                bars.get(*i).map(|(c, _)| c.to_string()).unwrap_or_default()
            }
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .axis_style(ink.stroke_width(1))
            .x_labels(bars.len())
            .x_label_formatter(&category_of)
            .label_style((FONT_FAMILY, 12).into_font().color(&ink))
            .axis_desc_style((FONT_FAMILY, 14).into_font().color(&ink))
            .x_desc(style.x_label.as_str())
            .y_desc(style.y_label.as_str())
            .draw()
            .map_err(render_error)?;

        let bar_at = |i: usize, count: usize, shape: ShapeStyle| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0), (SegmentValue::Exact(i + 1), count)],
                shape,
            );
            bar.set_margin(0, 0, gap, gap);
            bar
        };
        chart
            .draw_series(
                bars.iter()
                    .zip(&fills)
                    .enumerate()
                    .map(|(i, ((_, count), fill))| bar_at(i, *count, rgb(*fill).filled())),
            )
            .map_err(render_error)?;
        chart
            .draw_series(
                bars.iter()
                    .enumerate()
                    .map(|(i, (_, count))| bar_at(i, *count, ink.stroke_width(1))),
            )
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| PipelineError::Render(format!("{width}x{height} buffer is incomplete")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Attribute, AttributeType, RowTable, Value};

    fn table(labels: &[&str]) -> RowTable {
        RowTable::new(
            "t".into(),
            vec![Attribute {
                name: "protocol_type".into(),
                kind: AttributeType::String,
            }],
            labels
                .iter()
                .map(|l| vec![Value::Text(l.to_string())])
                .collect(),
        )
    }

    #[test]
    fn renders_decodable_png_of_configured_size() {
        let t = table(&["tcp", "tcp", "udp", "icmp"]);
        let style = ChartStyle::default();
        let chart = render_chart(&t.full_view(), "protocol_type", "Full dataset", &style).unwrap();

        assert_eq!(chart.title, "Full dataset");
        assert!(chart.png.starts_with(b"\x89PNG"));
        let decoded = image::load_from_memory(&chart.png).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);

        // The default bar fill appears somewhere in the image.
        let sky = named_color("skyblue").unwrap();
        assert!(decoded.to_rgb8().pixels().any(|p| *p == sky));
    }

    #[test]
    fn same_input_renders_identical_bytes() {
        let t = table(&["udp", "tcp", "udp"]);
        let style = ChartStyle {
            distinct_colors: true,
            ..ChartStyle::default()
        };
        let a = render_chart(&t.full_view(), "protocol_type", "Validación", &style).unwrap();
        let b = render_chart(&t.full_view(), "protocol_type", "Validación", &style).unwrap();
        assert_eq!(a, b);
        assert!(!a.to_base64().is_empty());
    }

    #[test]
    fn captions_are_drawn_with_bundled_font() {
        let t = table(&["tcp", "udp", "udp"]);
        let style = ChartStyle::default();
        let training = render_chart(&t.full_view(), "protocol_type", "Training", &style).unwrap();
        let test = render_chart(&t.full_view(), "protocol_type", "Test", &style).unwrap();
        assert_ne!(training.png, test.png);

        let ink = named_color(&style.edge_color).unwrap();
        let decoded = image::load_from_memory(&test.png).unwrap().to_rgb8();
        assert!(decoded.pixels().any(|p| *p == ink));
    }

    #[test]
    fn empty_view_is_a_render_error() {
        let t = table(&["tcp"]);
        let err = render_chart(&t.view(Vec::new()), "protocol_type", "Test", &ChartStyle::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[test]
    fn missing_column_is_a_render_error() {
        let t = table(&["tcp"]);
        assert!(matches!(
            render_chart(&t.full_view(), "service", "Full", &ChartStyle::default()),
            Err(PipelineError::Render(_))
        ));
    }

    #[test]
    fn renders_four_views_in_order() {
        let t = table(&["tcp", "udp", "tcp", "udp"]);
        let views = [
            t.full_view(),
            t.view(vec![0, 1]),
            t.view(vec![2]),
            t.view(vec![3]),
        ];
        let charts = render_partitions(&views, "protocol_type", &ChartStyle::default()).unwrap();
        let titles: Vec<_> = charts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Full dataset", "Training", "Validation", "Test"]);
        assert!(charts.iter().all(|c| !c.png.is_empty()));
    }
}
