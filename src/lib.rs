//! Stratified train/validation/test partitioning of ARFF network-traffic
//! datasets, with per-partition frequency charts and summary statistics.
//!
//! ```text
//!  .arff stream
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse + decode → RowTable
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  split    │  stratified → train / validation / test
//!   └──────────┘
//!        │
//!   ┌────┴──────────┐
//!   ▼               ▼
//! ┌─────────┐   ┌─────────┐
//! │ summary │   │  chart  │   sizes, counts  /  4 PNGs
//! └─────────┘   └─────────┘
//!        │
//!        ▼
//!   ReportBundle
//! ```

pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod summary;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use report::{build_report, build_report_from, ReportBundle, ReportView};
