use std::io::Read;

use log::{info, warn};
use serde::Serialize;

use crate::chart::{render_partitions, ChartArtifact};
use crate::config::PipelineConfig;
use crate::data::loader::{load_reader, load_source, DatasetSource};
use crate::data::model::RowTable;
use crate::data::split::stratified_split;
use crate::error::{PipelineError, Result};
use crate::summary::{summarize, FrequencyTable, PartitionSizes};

// ---------------------------------------------------------------------------
// Result bundle
// ---------------------------------------------------------------------------

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportBundle {
    /// Charts in order: full, train, validation, test.
    pub charts: Vec<ChartArtifact>,
    pub sizes: PartitionSizes,
    /// Category counts of the stratification column over the full table.
    pub protocol_counts: FrequencyTable,
}

/// Load `reader` and build the full report.
pub fn build_report<R: Read>(reader: R, config: &PipelineConfig) -> Result<ReportBundle> {
    config.validate()?;
    let table = load_reader(reader, config.fallback_encoding)?;
    report_for_table(&table, config)
}

/// Open `source` and build the full report.
pub fn build_report_from(
    source: &mut dyn DatasetSource,
    config: &PipelineConfig,
) -> Result<ReportBundle> {
    config.validate()?;
    let table = load_source(source, config.fallback_encoding)?;
    report_for_table(&table, config)
}

/// Split, summarize and render an already-loaded table.
pub fn report_for_table(table: &RowTable, config: &PipelineConfig) -> Result<ReportBundle> {
    let column = config.stratify_column.as_str();
    let parts = stratified_split(table, column, config.split, config.seed)?;
    let views = [
        table.full_view(),
        table.view(parts.train),
        table.view(parts.validation),
        table.view(parts.test),
    ];

    let summary = summarize(&views, column)?;
    let charts = render_partitions(&views, column, &config.chart)?;

    info!(
        "report ready: total={}, train={}, val={}, test={}, {} categories",
        summary.sizes.total,
        summary.sizes.train,
        summary.sizes.val,
        summary.sizes.test,
        summary.protocol_counts.len()
    );
    Ok(ReportBundle {
        charts,
        sizes: summary.sizes,
        protocol_counts: summary.protocol_counts,
    })
}

// ---------------------------------------------------------------------------
// Presentation view
// ---------------------------------------------------------------------------

/// What the presentation layer receives: either every field but `error`, or
/// only `error` with no charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    /// Base64-encoded PNG charts in report order.
    pub charts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<PartitionSizes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_counts: Option<FrequencyTable>,
    pub error: Option<String>,
}

impl From<Result<ReportBundle>> for ReportView {
    fn from(outcome: Result<ReportBundle>) -> Self {
        match outcome {
            Ok(bundle) => ReportView {
                charts: bundle.charts.iter().map(ChartArtifact::to_base64).collect(),
                sizes: Some(bundle.sizes),
                protocol_counts: Some(bundle.protocol_counts),
                error: None,
            },
            Err(err) => ReportView::failed(&err),
        }
    }
}

impl ReportView {
    pub fn failed(err: &PipelineError) -> Self {
        warn!("report failed: {err}");
        ReportView {
            charts: Vec::new(),
            sizes: None,
            protocol_counts: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
@relation small
@attribute duration numeric
@attribute protocol_type {tcp,udp}
@data
0,tcp
1,udp
2,tcp
3,tcp
4,udp
5,tcp
6,udp
7,tcp
8,udp
9,tcp
";

    #[test]
    fn ten_rows_produce_four_charts() {
        let bundle = build_report(SMALL.as_bytes(), &PipelineConfig::default()).unwrap();
        assert_eq!(bundle.charts.len(), 4);
        assert!(bundle.charts.iter().all(|c| !c.png.is_empty()));
        assert_eq!(bundle.charts[0].title, "Full dataset");
        assert_eq!(bundle.charts[3].title, "Test");
        assert_eq!(bundle.sizes.total, 10);
        assert_eq!(bundle.sizes.train + bundle.sizes.val + bundle.sizes.test, 10);
        assert_eq!(bundle.protocol_counts.get("tcp"), Some(6));
    }

    #[test]
    fn failure_view_has_only_error() {
        let view = ReportView::from(build_report(&b""[..], &PipelineConfig::default()));
        assert!(view.is_error());
        assert!(view.charts.is_empty());
        assert!(view.sizes.is_none());
        assert!(view.protocol_counts.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("sizes").is_none());
        assert!(json["error"].as_str().unwrap().contains("malformed dataset"));
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let config = PipelineConfig {
            split: crate::config::SplitRatios {
                holdout: 1.0,
                test_within_holdout: 0.5,
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(
            build_report(SMALL.as_bytes(), &config),
            Err(PipelineError::Stratification(_))
        ));
    }

    #[test]
    fn success_view_serializes_base64_charts() {
        let view = ReportView::from(build_report(SMALL.as_bytes(), &PipelineConfig::default()));
        assert!(!view.is_error());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["charts"].as_array().unwrap().len(), 4);
        assert!(json["charts"][0].as_str().unwrap().starts_with("iVBOR"));
        assert_eq!(json["sizes"]["total"], 10);
        assert!(json["error"].is_null());
    }
}
