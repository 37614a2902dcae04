use image::Rgb;
use palette::{Hsl, IntoColor, Srgb};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.65);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            Rgb([rgb.red, rgb.green, rgb.blue])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Named colours
// ---------------------------------------------------------------------------

/// Resolve a CSS/SVG colour name such as `"skyblue"`.
pub fn named_color(name: &str) -> Result<Rgb<u8>, PipelineError> {
    let lowered = name.trim().to_ascii_lowercase();
    palette::named::from_str(&lowered)
        .map(|c| Rgb([c.red, c.green, c.blue]))
        .ok_or_else(|| PipelineError::Render(format!("unknown colour name '{name}'")))
}

/// Per-bar fill colours: one shared colour, or a distinct hue per bar.
pub fn bar_colors(n: usize, base: Rgb<u8>, distinct: bool) -> Vec<Rgb<u8>> {
    if distinct {
        generate_palette(n)
    } else {
        vec![base; n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_css_names() {
        assert_eq!(named_color("skyblue").unwrap(), Rgb([135, 206, 235]));
        assert_eq!(named_color(" Black ").unwrap(), Rgb([0, 0, 0]));
        assert!(named_color("blurple").is_err());
    }

    #[test]
    fn palette_hues_are_distinct() {
        let colors = generate_palette(3);
        assert_eq!(colors.len(), 3);
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn shared_colour_is_repeated() {
        let base = Rgb([1, 2, 3]);
        assert_eq!(bar_colors(2, base, false), vec![base, base]);
        assert_eq!(bar_colors(4, base, true).len(), 4);
    }
}
