/// Data layer: row table, ARFF loading, and stratified partitioning.
///
/// Architecture:
/// ```text
///  .arff bytes
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse header + rows, decode raw text → RowTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ RowTable  │  Vec<Vec<Value>>, column index
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  split    │  stratified two-stage split → row ids per partition
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod split;
