use std::collections::HashMap;
use std::io::Write;

use anyhow::Context;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::data::model::{PartitionKind, TableView};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// FrequencyTable – category → count
// ---------------------------------------------------------------------------

/// Category counts ordered by descending count, ties in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, usize)>,
}

impl FrequencyTable {
    /// Count the values of `column` across `view`.
    pub fn from_view(view: &TableView<'_>, column: &str) -> Option<Self> {
        let values = view.column(column)?;
        Some(Self::from_labels(values.map(|v| v.category())))
    }

    pub fn from_labels<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<(String, usize)> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            match index.get(label) {
                Some(&slot) => entries[slot].1 += 1,
                None => {
                    index.insert(label.to_string(), entries.len());
                    entries.push((label.to_string(), 1));
                }
            }
        }
        // Stable sort keeps first-seen order among equal counts.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn get(&self, category: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(k, _)| k == category)
            .map(|(_, v)| *v)
    }

    /// Number of distinct categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    pub fn max_count(&self) -> usize {
        self.entries.first().map(|(_, v)| *v).unwrap_or(0)
    }

    /// Fraction of rows in `category`; 0.0 for an empty table.
    pub fn share(&self, category: &str) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(category).unwrap_or(0) as f64 / total as f64
    }

    /// Write `category,count` rows with a header line.
    pub fn write_csv<W: Write>(&self, writer: W, column: &str) -> anyhow::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record([column, "count"])
            .context("writing CSV header")?;
        for (category, count) in self.iter() {
            out.write_record([category, count.to_string().as_str()])
                .with_context(|| format!("writing CSV row for '{category}'"))?;
        }
        out.flush().context("flushing CSV")?;
        Ok(())
    }
}

/// Serialized as a JSON object preserving count order.
impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, count) in &self.entries {
            map.serialize_entry(category, count)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Partition sizes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PartitionSizes {
    pub total: usize,
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl PartitionSizes {
    pub fn get(&self, kind: PartitionKind) -> usize {
        match kind {
            PartitionKind::Full => self.total,
            PartitionKind::Train => self.train,
            PartitionKind::Validation => self.val,
            PartitionKind::Test => self.test,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub sizes: PartitionSizes,
    /// Category counts over the full table.
    pub protocol_counts: FrequencyTable,
}

/// Sizes of the four views and the category counts of the full one.
///
/// `views` are in report order: full, train, validation, test.
pub fn summarize(views: &[TableView<'_>; 4], column: &str) -> Result<Summary> {
    let [full, train, validation, test] = views;
    let protocol_counts = FrequencyTable::from_view(full, column).ok_or_else(|| {
        PipelineError::Stratification(format!("column '{column}' does not exist"))
    })?;
    Ok(Summary {
        sizes: PartitionSizes {
            total: full.len(),
            train: train.len(),
            val: validation.len(),
            test: test.len(),
        },
        protocol_counts,
    })
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
    fn orders_by_count_then_first_seen() {
        let freq = FrequencyTable::from_labels(["udp", "tcp", "icmp", "tcp", "icmp", "arp"]);
        let order: Vec<_> = freq.iter().collect();
        assert_eq!(order, vec![("tcp", 2), ("icmp", 2), ("udp", 1), ("arp", 1)]);
        assert_eq!(freq.total(), 6);
        assert_eq!(freq.max_count(), 2);
        assert!((freq.share("udp") - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(freq.get("sctp"), None);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let freq = FrequencyTable::from_labels(["udp", "tcp", "tcp"]);
        assert_eq!(serde_json::to_string(&freq).unwrap(), r#"{"tcp":2,"udp":1}"#);

        let sizes = PartitionSizes {
            total: 10,
            train: 6,
            val: 2,
            test: 2,
        };
        assert_eq!(
            serde_json::to_value(sizes).unwrap(),
            serde_json::json!({ "total": 10, "train": 6, "val": 2, "test": 2 })
        );
    }

    #[test]
    fn summarize_counts_views() {
        let t = table(&["tcp", "udp", "tcp", "tcp", "udp"]);
        let views = [
            t.full_view(),
            t.view(vec![0, 1, 2]),
            t.view(vec![3]),
            t.view(vec![4]),
        ];
        let summary = summarize(&views, "protocol_type").unwrap();
        assert_eq!(summary.sizes.total, 5);
        assert_eq!(
            summary.sizes.train + summary.sizes.val + summary.sizes.test,
            summary.sizes.total
        );
        assert_eq!(summary.protocol_counts.get("tcp"), Some(3));

        assert!(matches!(
            summarize(&views, "service"),
            Err(PipelineError::Stratification(_))
        ));
    }

    #[test]
    fn writes_csv() {
        let freq = FrequencyTable::from_labels(["udp", "tcp", "tcp"]);
        let mut out = Vec::new();
        freq.write_csv(&mut out, "protocol_type").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "protocol_type,count\ntcp,2\nudp,1\n"
        );
    }
}
