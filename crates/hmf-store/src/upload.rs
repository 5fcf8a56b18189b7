//! Delimited upload files for bulk loaders.
//!
//! ```text
//!   dimension|field_label|hecke_eigenvalues|...      sorted column names
//!   bigint|text|jsonb|...                             column types
//!                                                     blank separator
//!   1|2.2.5.1|["1","-2","3"]|...                      one row per record
//! ```
//!
//! Cells are `|`-separated; `\N` is null; backslash escapes `\\`, `\|`,
//! `\n` and `\r` inside text. The header is the union of the keys of all
//! rows; a row without one of the keys gets `\N` there, and reading leaves
//! `\N` cells out of the decoded record.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::record::HilbertNewform;
use crate::{Result, StoreError};

const NULL: &str = "\\N";

fn column_type(name: &str, sample: &Value) -> &'static str {
    match name {
        "_id" | "level_norm" | "dimension" | "deg" | "disc" | "label_nsuffix"
        | "parallel_weight" => "bigint",
        "hecke_eigenvalues" | "AL_eigenvalues" => "jsonb",
        _ => match sample {
            Value::Number(_) => "bigint",
            Value::Bool(_) => "boolean",
            Value::Array(_) | Value::Object(_) => "jsonb",
            _ => "text",
        },
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn encode_cell(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => NULL.to_string(),
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => escape(&serde_json::to_string(other)?),
    })
}

/// Split on unescaped `|` and undo the escapes. `None` marks `\N`.
fn split_row(line: &str) -> Vec<Option<String>> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut raw_null = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => cur.push('\n'),
                Some('r') => cur.push('\r'),
                Some('N') if cur.is_empty() => raw_null = true,
                Some(other) => cur.push(other),
                None => cur.push('\\'),
            },
            '|' => {
                cells.push(if raw_null { None } else { Some(std::mem::take(&mut cur)) });
                raw_null = false;
            }
            _ => cur.push(c),
        }
    }
    cells.push(if raw_null { None } else { Some(cur) });
    cells
}

// ============================================================================
// Writer
// ============================================================================

/// Collects records, then writes one upload file.
pub struct UploadWriter {
    path: PathBuf,
    /// Column name -> type of the first non-null value seen.
    columns: BTreeMap<String, Option<&'static str>>,
    rows: Vec<BTreeMap<String, Value>>,
}

impl UploadWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names so far, in header order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn push(&mut self, form: &HilbertNewform) -> Result<()> {
        let Value::Object(doc) = serde_json::to_value(form)? else {
            return Err(self.error(format!("{} does not serialize to an object", form.label)));
        };
        self.push_document(doc);
        Ok(())
    }

    fn push_document(&mut self, doc: Map<String, Value>) {
        let row: BTreeMap<String, Value> = doc.into_iter().collect();
        for (key, value) in &row {
            let slot = self.columns.entry(key.clone()).or_insert(None);
            if slot.is_none() && !value.is_null() {
                *slot = Some(column_type(key, value));
            }
        }
        self.rows.push(row);
    }

    fn error(&self, message: String) -> StoreError {
        StoreError::Upload {
            path: self.path.clone(),
            line: self.rows.len() + 4,
            message,
        }
    }

    /// Write the file; returns the number of rows. Nothing is written for zero rows.
    pub fn finish(self) -> Result<usize> {
        if self.rows.is_empty() {
            return Ok(0);
        }
        let mut lines = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let cells = self
                .columns
                .keys()
                .map(|col| row.get(col).map_or(Ok(NULL.to_string()), encode_cell))
                .collect::<Result<Vec<_>>>()?;
            lines.push(cells.join("|"));
        }

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        let types: Vec<&str> = self
            .columns
            .values()
            .map(|ty| ty.unwrap_or("text"))
            .collect();
        let mut out = BufWriter::new(File::create(&self.path).map_err(io_err)?);
        writeln!(out, "{}", names.join("|")).map_err(io_err)?;
        writeln!(out, "{}", types.join("|")).map_err(io_err)?;
        writeln!(out).map_err(io_err)?;
        for line in &lines {
            writeln!(out, "{line}").map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
        tracing::info!(
            path = %self.path.display(),
            rows = lines.len(),
            columns = names.len(),
            "wrote upload file"
        );
        Ok(lines.len())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// A parsed upload file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTable {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub types: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl UploadTable {
    /// Decode every row back into a record.
    pub fn records(&self) -> Result<Vec<HilbertNewform>> {
        let mut out = Vec::with_capacity(self.rows.len());
        for (r, row) in self.rows.iter().enumerate() {
            let mut doc = Map::new();
            for ((col, ty), cell) in self.columns.iter().zip(&self.types).zip(row) {
                let Some(text) = cell else {
                    continue;
                };
                let value = match ty.as_str() {
                    "jsonb" | "bigint" | "smallint" | "integer" | "boolean" => {
                        serde_json::from_str(text).map_err(|e| StoreError::Upload {
                            path: self.path.clone(),
                            line: r + 4,
                            message: format!("column {col}: {e}"),
                        })?
                    }
                    _ => Value::String(text.clone()),
                };
                doc.insert(col.clone(), value);
            }
            out.push(serde_json::from_value(Value::Object(doc))?);
        }
        Ok(out)
    }
}

pub fn read_upload_file(path: impl AsRef<Path>) -> Result<UploadTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let err = |line: usize, message: &str| StoreError::Upload {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    };
    let mut lines = text.lines();
    let columns: Vec<String> = lines
        .next()
        .ok_or_else(|| err(1, "missing column header"))?
        .split('|')
        .map(str::to_string)
        .collect();
    let types: Vec<String> = lines
        .next()
        .ok_or_else(|| err(2, "missing type header"))?
        .split('|')
        .map(str::to_string)
        .collect();
    if types.len() != columns.len() {
        return Err(err(2, "type header does not match column header"));
    }
    if lines.next().map_or(true, |l| !l.is_empty()) {
        return Err(err(3, "expected blank separator line"));
    }
    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let cells = split_row(line);
        if cells.len() != columns.len() {
            return Err(err(i + 4, "wrong number of cells"));
        }
        rows.push(cells);
    }
    Ok(UploadTable {
        path: path.to_path_buf(),
        columns,
        types,
        rows,
    })
}
