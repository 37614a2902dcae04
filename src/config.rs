use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::PartitionKind;
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Everything one report invocation needs besides the dataset bytes.
///
/// Loaded from JSON; every field has a default so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where the dataset lives. Resolved by the caller, never by the pipeline.
    pub dataset_path: Option<PathBuf>,
    /// Categorical column whose distribution every partition preserves.
    pub stratify_column: String,
    pub split: SplitRatios,
    pub seed: u64,
    /// Decoding applied to textual cells that are not valid UTF-8.
    pub fallback_encoding: TextEncoding,
    pub chart: ChartStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            stratify_column: "protocol_type".to_string(),
            split: SplitRatios::default(),
            seed: 42,
            fallback_encoding: TextEncoding::default(),
            chart: ChartStyle::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: PipelineConfig =
            serde_json::from_str(&text).context("parsing config JSON")?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honour before any work starts.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        self.split.validate()?;
        self.chart.validate()?;
        if self.stratify_column.trim().is_empty() {
            return Err(PipelineError::Stratification(
                "no stratification column configured".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Split ratios
// ---------------------------------------------------------------------------

/// Two-stage split proportions.
///
/// `holdout` is the share of the full table set aside from training;
/// `test_within_holdout` is the share of that holdout that becomes the
/// test set, the rest being validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    pub holdout: f64,
    pub test_within_holdout: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            holdout: 0.4,
            test_within_holdout: 0.5,
        }
    }
}

impl SplitRatios {
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        for (name, value) in [
            ("holdout", self.holdout),
            ("test_within_holdout", self.test_within_holdout),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(PipelineError::Stratification(format!(
                    "split ratio {name} must be strictly between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    #[default]
    Utf8Lossy,
    /// Every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn decode(self, raw: &[u8]) -> String {
        match self {
            TextEncoding::Utf8Lossy => String::from_utf8_lossy(raw).into_owned(),
            TextEncoding::Latin1 => raw.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chart style
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    /// CSS colour name of the bar fill.
    pub bar_color: String,
    /// CSS colour name of bar outlines, axes and text.
    pub edge_color: String,
    /// Give every bar its own hue instead of `bar_color`.
    pub distinct_colors: bool,
    pub x_label: String,
    pub y_label: String,
    /// Titles in report order: full, train, validation, test.
    pub titles: [String; 4],
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            bar_color: "skyblue".to_string(),
            edge_color: "black".to_string(),
            distinct_colors: false,
            x_label: "Protocol Type".to_string(),
            y_label: "Frequency".to_string(),
            titles: [
                "Full dataset".to_string(),
                "Training".to_string(),
                "Validation".to_string(),
                "Test".to_string(),
            ],
        }
    }
}

impl ChartStyle {
    pub const MIN_WIDTH: u32 = 200;
    pub const MIN_HEIGHT: u32 = 150;

    pub fn title(&self, kind: PartitionKind) -> &str {
        let idx = PartitionKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &self.titles[idx]
    }

    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        if self.width < Self::MIN_WIDTH || self.height < Self::MIN_HEIGHT {
            return Err(PipelineError::Render(format!(
                "chart size {}x{} is below the {}x{} minimum",
                self.width,
                self.height,
                Self::MIN_WIDTH,
                Self::MIN_HEIGHT
            )));
        }
        for name in [&self.bar_color, &self.edge_color] {
            crate::color::named_color(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.split.holdout, 0.4);
        assert_eq!(config.seed, 42);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "seed": 7, "split": { "holdout": 0.3 }, "fallback_encoding": "latin1" }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.split.holdout, 0.3);
        assert_eq!(config.split.test_within_holdout, 0.5);
        assert_eq!(config.fallback_encoding, TextEncoding::Latin1);
    }

    #[test]
    fn ratios_outside_unit_interval_are_rejected() {
        for bad in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let ratios = SplitRatios {
                holdout: bad,
                ..SplitRatios::default()
            };
            assert!(matches!(
                ratios.validate(),
                Err(PipelineError::Stratification(_))
            ));
        }
    }

    #[test]
    fn unknown_colour_name_is_rejected() {
        let style = ChartStyle {
            bar_color: "not-a-colour".into(),
            ..ChartStyle::default()
        };
        assert!(matches!(style.validate(), Err(PipelineError::Render(_))));
    }

    #[test]
    fn latin1_decoding_maps_bytes_to_code_points() {
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xe9"), "café");
        assert_eq!(TextEncoding::Utf8Lossy.decode(b"caf\xe9"), "caf\u{FFFD}");
    }
}
