use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Value – a single cell of the row table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
///
/// `Bytes` only exists between parsing and the decoding pass: textual cells
/// that were not valid UTF-8 are kept raw until [`RowTable::decode_text`]
/// turns them into `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bytes(Vec<u8>),
    Missing,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Missing => write!(f, "?"),
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The label this value is counted under when used as a category.
    pub fn category(&self) -> Cow<'_, str> {
        match self {
            Value::Text(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute schema
// ---------------------------------------------------------------------------

/// Declared type of an attribute in the file header.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    Numeric,
    /// Allowed values in declaration order.
    Nominal(Vec<String>),
    String,
    /// Date column; the optional format is kept verbatim, values stay text.
    Date(Option<String>),
}

impl AttributeType {
    pub fn is_textual(&self) -> bool {
        !matches!(self, AttributeType::Numeric)
    }

    /// Value of a cell that a sparse row leaves out.
    pub fn sparse_default(&self) -> Value {
        match self {
            AttributeType::Numeric => Value::Number(0.0),
            AttributeType::Nominal(values) => values
                .first()
                .map(|v| Value::Text(v.clone()))
                .unwrap_or(Value::Missing),
            AttributeType::String | AttributeType::Date(_) => Value::Text(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
}

// ---------------------------------------------------------------------------
// RowTable – the loaded dataset
// ---------------------------------------------------------------------------

/// The parsed dataset: column order follows the header declaration order.
#[derive(Debug, Clone)]
pub struct RowTable {
    pub relation: String,
    attributes: Vec<Attribute>,
    rows: Vec<Vec<Value>>,
    column_index: HashMap<String, usize>,
}

impl RowTable {
    /// Build a table. Every row must have exactly one cell per attribute.
    pub fn new(relation: String, attributes: Vec<Attribute>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == attributes.len()));
        let column_index = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();
        RowTable {
            relation,
            attributes,
            rows,
            column_index,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn row(&self, id: usize) -> Option<&[Value]> {
        self.rows.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any textual cell is still raw bytes.
    pub fn has_undecoded(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|v| matches!(v, Value::Bytes(_)))
    }

    /// Replace every `Bytes` cell by decoded text, returning how many cells
    /// were converted.
    pub fn decode_text(&mut self, decode: impl Fn(&[u8]) -> String) -> usize {
        let mut decoded = 0;
        for cell in self.rows.iter_mut().flatten() {
            if let Value::Bytes(raw) = cell {
                *cell = Value::Text(decode(raw));
                decoded += 1;
            }
        }
        decoded
    }

    /// A view over every row in table order.
    pub fn full_view(&self) -> TableView<'_> {
        TableView {
            table: self,
            row_ids: (0..self.rows.len()).collect(),
        }
    }

    /// A view over the given row ids. Ids must be in range.
    pub fn view(&self, row_ids: Vec<usize>) -> TableView<'_> {
        debug_assert!(row_ids.iter().all(|&id| id < self.rows.len()));
        TableView {
            table: self,
            row_ids,
        }
    }
}

// ---------------------------------------------------------------------------
// TableView – a partition of the table
// ---------------------------------------------------------------------------

/// A subset of a [`RowTable`], identified by row ids.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    table: &'a RowTable,
    row_ids: Vec<usize>,
}

impl<'a> TableView<'a> {
    pub fn table(&self) -> &'a RowTable {
        self.table
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Values of one column in view order, or `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &'a Value> + '_> {
        let table: &'a RowTable = self.table;
        let col = table.column_position(name)?;
        let rows = &table.rows;
        Some(self.row_ids.iter().map(move |&id| &rows[id][col]))
    }
}

// ---------------------------------------------------------------------------
// Partition names
// ---------------------------------------------------------------------------

/// The four table views a report is built from, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Full,
    Train,
    Validation,
    Test,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 4] = [
        PartitionKind::Full,
        PartitionKind::Train,
        PartitionKind::Validation,
        PartitionKind::Test,
    ];

    /// Key used in size mappings.
    pub fn key(self) -> &'static str {
        match self {
            PartitionKind::Full => "total",
            PartitionKind::Train => "train",
            PartitionKind::Validation => "val",
            PartitionKind::Test => "test",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PartitionKind::Full => "full",
            PartitionKind::Train => "train",
            PartitionKind::Validation => "validation",
            PartitionKind::Test => "test",
        }
    }
}
