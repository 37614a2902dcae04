use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::model::{Attribute, AttributeType, RowTable, Value};
use crate::config::TextEncoding;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Dataset sources
// ---------------------------------------------------------------------------

/// Supplies the raw dataset stream. Locating and opening the data is the
/// caller's business; the loader only reads what it is handed.
pub trait DatasetSource {
    /// Open the stream, failing with [`PipelineError::DatasetNotFound`].
    fn open(&mut self) -> Result<Box<dyn Read + '_>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// A dataset stored in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for FileSource {
    fn open(&mut self) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::DatasetNotFound(format!("{}: {e}", self.path.display()))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An already-open stream.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> DatasetSource for ReaderSource<R> {
    fn open(&mut self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(&mut self.reader))
    }

    fn describe(&self) -> String {
        "<stream>".to_string()
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Open `source` and load it.
pub fn load_source(source: &mut dyn DatasetSource, encoding: TextEncoding) -> Result<RowTable> {
    debug!("opening dataset {}", source.describe());
    let reader = source.open()?;
    load_reader(reader, encoding)
}

/// Load an ARFF file from disk.
pub fn load_path(path: &Path, encoding: TextEncoding) -> Result<RowTable> {
    load_source(&mut FileSource::new(path), encoding)
}

/// Read an ARFF document from `reader`, then decode every raw textual cell
/// with `encoding` and check nominal values against their declarations.
pub fn load_reader<R: Read>(mut reader: R, encoding: TextEncoding) -> Result<RowTable> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| PipelineError::DatasetNotFound(format!("reading dataset stream: {e}")))?;

    let Parsed {
        mut table,
        row_lines,
    } = parse_arff(&bytes, encoding)?;

    let decoded = table.decode_text(|raw| encoding.decode(raw));
    if decoded > 0 {
        info!("decoded {decoded} non-UTF-8 cells using {encoding:?}");
    }
    check_nominal_values(&table, &row_lines)?;

    info!(
        "loaded relation '{}': {} rows, {} attributes",
        table.relation,
        table.len(),
        table.attributes().len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// ARFF parser
// ---------------------------------------------------------------------------

struct Parsed {
    table: RowTable,
    /// 1-based source line of every data row.
    row_lines: Vec<usize>,
}

/// Header text (relation, attribute names, nominal values, date formats)
/// goes through `encoding`, the same as raw data cells do later, so declared
/// nominal values and decoded cells always agree.
fn parse_arff(bytes: &[u8], encoding: TextEncoding) -> Result<Parsed> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(PipelineError::format_global("empty dataset"));
    }

    let mut relation: Option<String> = None;
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut names: HashSet<String> = HashSet::new();
    let mut in_data = false;
    let mut rows = Vec::new();
    let mut row_lines = Vec::new();

    for (idx, raw_line) in bytes.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_ascii();
        if line.is_empty() || line[0] == b'%' {
            continue;
        }

        if in_data {
            let row = if line[0] == b'{' {
                parse_sparse_row(line, &attributes, line_no)?
            } else {
                parse_dense_row(line, &attributes, line_no)?
            };
            rows.push(row);
            row_lines.push(line_no);
            continue;
        }

        if line[0] != b'@' {
            return Err(PipelineError::format(
                line_no,
                "expected a header declaration before @data",
            ));
        }

        let split_at = line
            .iter()
            .position(u8::is_ascii_whitespace)
            .unwrap_or(line.len());
        let (keyword, rest) = line.split_at(split_at);

        match keyword.to_ascii_lowercase().as_slice() {
            b"@relation" => {
                if relation.is_some() {
                    return Err(PipelineError::format(line_no, "duplicate @relation"));
                }
                let mut sc = Scanner::new(rest, line_no);
                relation = Some(encoding.decode(&sc.token(b"")?.bytes));
            }
            b"@attribute" => {
                let attr = parse_attribute(rest, line_no, encoding)?;
                if !names.insert(attr.name.clone()) {
                    return Err(PipelineError::format(
                        line_no,
                        format!("duplicate attribute '{}'", attr.name),
                    ));
                }
                attributes.push(attr);
            }
            b"@data" => {
                if attributes.is_empty() {
                    return Err(PipelineError::format(line_no, "@data before any @attribute"));
                }
                in_data = true;
            }
            _ => {
                return Err(PipelineError::format(
                    line_no,
                    format!("unknown declaration '{}'", lossy(keyword.to_vec())),
                ));
            }
        }
    }

    if !in_data {
        let message = if attributes.is_empty() {
            "no @attribute declarations"
        } else {
            "missing @data section"
        };
        return Err(PipelineError::format_global(message));
    }

    debug!("parsed {} data rows", rows.len());
    Ok(Parsed {
        table: RowTable::new(relation.unwrap_or_default(), attributes, rows),
        row_lines,
    })
}

fn parse_attribute(rest: &[u8], line_no: usize, encoding: TextEncoding) -> Result<Attribute> {
    let mut sc = Scanner::new(rest, line_no);
    let name = sc.token(b" \t{")?;
    if name.bytes.is_empty() {
        return Err(PipelineError::format(line_no, "missing attribute name"));
    }
    let name = encoding.decode(&name.bytes);

    sc.skip_ws();
    if sc.peek() == Some(b'{') {
        sc.bump();
        let values = parse_nominal_values(&mut sc, encoding)?;
        return Ok(Attribute {
            name,
            kind: AttributeType::Nominal(values),
        });
    }

    let type_name = lossy(sc.token(b" \t")?.bytes).to_ascii_lowercase();
    let kind = match type_name.as_str() {
        "numeric" | "real" | "integer" => AttributeType::Numeric,
        "string" => AttributeType::String,
        "date" => {
            sc.skip_ws();
            let format = if sc.at_end() {
                None
            } else {
                Some(encoding.decode(&sc.token(b"")?.bytes))
            };
            AttributeType::Date(format)
        }
        "relational" => {
            return Err(PipelineError::format(
                line_no,
                "relational attributes are not supported",
            ))
        }
        "" => {
            return Err(PipelineError::format(
                line_no,
                format!("attribute '{name}' has no type"),
            ))
        }
        other => {
            return Err(PipelineError::format(
                line_no,
                format!("attribute '{name}' has unknown type '{other}'"),
            ))
        }
    };

    sc.skip_ws();
    if !sc.at_end() {
        return Err(PipelineError::format(
            line_no,
            format!("unexpected text after type of attribute '{name}'"),
        ));
    }
    Ok(Attribute { name, kind })
}

/// Values of `{a, b, c}`, scanner positioned just past the `{`.
fn parse_nominal_values(sc: &mut Scanner<'_>, encoding: TextEncoding) -> Result<Vec<String>> {
    sc.skip_ws();
    if sc.peek() == Some(b'}') {
        return Err(sc.error("nominal attribute declares no values"));
    }
    let mut values = Vec::new();
    loop {
        values.push(encoding.decode(&sc.token(b",}")?.bytes));
        sc.skip_ws();
        match sc.peek() {
            Some(b',') => sc.bump(),
            Some(b'}') => {
                sc.bump();
                return Ok(values);
            }
            _ => return Err(sc.error("unterminated nominal value list")),
        }
    }
}

fn parse_dense_row(line: &[u8], attributes: &[Attribute], line_no: usize) -> Result<Vec<Value>> {
    let mut sc = Scanner::new(line, line_no);
    let mut tokens = Vec::with_capacity(attributes.len());
    loop {
        tokens.push(sc.token(b",")?);
        sc.skip_ws();
        match sc.peek() {
            None => break,
            Some(b',') => sc.bump(),
            Some(other) => {
                return Err(sc.error(format!("unexpected '{}' in data row", other as char)))
            }
        }
    }

    if tokens.len() != attributes.len() {
        return Err(PipelineError::format(
            line_no,
            format!(
                "expected {} values, found {}",
                attributes.len(),
                tokens.len()
            ),
        ));
    }

    tokens
        .into_iter()
        .zip(attributes)
        .map(|(token, attr)| convert_cell(token, attr, line_no))
        .collect()
}

/// `{index value, ...}` rows; omitted columns take their type's default.
fn parse_sparse_row(line: &[u8], attributes: &[Attribute], line_no: usize) -> Result<Vec<Value>> {
    let mut cells: Vec<Value> = attributes.iter().map(|a| a.kind.sparse_default()).collect();
    let mut sc = Scanner::new(line, line_no);
    sc.bump();

    loop {
        sc.skip_ws();
        match sc.peek() {
            Some(b'}') => {
                sc.bump();
                break;
            }
            None => return Err(sc.error("unterminated sparse row")),
            Some(_) => {}
        }

        let index_token = sc.token(b" \t,}")?;
        let index_text = lossy(index_token.bytes);
        let index: usize = index_text
            .parse()
            .map_err(|_| sc.error(format!("'{index_text}' is not a column index")))?;
        let attr = attributes.get(index).ok_or_else(|| {
            sc.error(format!(
                "column index {index} out of range ({} attributes)",
                attributes.len()
            ))
        })?;

        let value = sc.token(b",}")?;
        cells[index] = convert_cell(value, attr, line_no)?;

        sc.skip_ws();
        match sc.peek() {
            Some(b',') => sc.bump(),
            Some(b'}') => {}
            _ => return Err(sc.error("expected ',' or '}' in sparse row")),
        }
    }

    sc.skip_ws();
    if !sc.at_end() {
        return Err(sc.error("unexpected text after sparse row"));
    }
    Ok(cells)
}

fn convert_cell(token: Token, attr: &Attribute, line_no: usize) -> Result<Value> {
    if !token.quoted && token.bytes == b"?" {
        return Ok(Value::Missing);
    }
    if attr.kind.is_textual() {
        return Ok(match String::from_utf8(token.bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        });
    }

    let text = lossy(token.bytes);
    text.trim().parse::<f64>().map(Value::Number).map_err(|_| {
        PipelineError::format(
            line_no,
            format!("attribute '{}': '{text}' is not a number", attr.name),
        )
    })
}

fn check_nominal_values(table: &RowTable, row_lines: &[usize]) -> Result<()> {
    for (col, attr) in table.attributes().iter().enumerate() {
        let AttributeType::Nominal(declared) = &attr.kind else {
            continue;
        };
        let allowed: HashSet<&str> = declared.iter().map(String::as_str).collect();
        for (id, &line_no) in row_lines.iter().enumerate() {
            let Some(Value::Text(value)) = table.row(id).map(|row| &row[col]) else {
                continue;
            };
            if !allowed.contains(value.as_str()) {
                return Err(PipelineError::format(
                    line_no,
                    format!(
                        "value '{value}' is not declared for nominal attribute '{}'",
                        attr.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

// -- Byte scanner --

struct Token {
    bytes: Vec<u8>,
    quoted: bool,
}

/// Cursor over one line of the document.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8], line: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            line,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::format(self.line, message)
    }

    /// Read one value: a quoted string with backslash escapes, or raw bytes
    /// up to (not including) the first byte in `delims`, trailing blanks trimmed.
    fn token(&mut self, delims: &[u8]) -> Result<Token> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ (b'\'' | b'"')) => {
                self.bump();
                let mut bytes = Vec::new();
                loop {
                    let Some(b) = self.peek() else {
                        return Err(self.error("unterminated quoted value"));
                    };
                    self.bump();
                    match b {
                        b'\\' => {
                            let Some(escaped) = self.peek() else {
                                return Err(self.error("dangling escape at end of line"));
                            };
                            self.bump();
                            bytes.push(match escaped {
                                b'n' => b'\n',
                                b't' => b'\t',
                                b'r' => b'\r',
                                other => other,
                            });
                        }
                        b if b == quote => break,
                        b => bytes.push(b),
                    }
                }
                Ok(Token {
                    bytes,
                    quoted: true,
                })
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|b| !delims.contains(&b)) {
                    self.pos += 1;
                }
                Ok(Token {
                    bytes: self.bytes[start..self.pos].trim_ascii_end().to_vec(),
                    quoted: false,
                })
            }
        }
    }
}
