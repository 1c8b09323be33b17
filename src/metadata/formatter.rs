use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

/// Textual formats metadata tables can be exported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFormat {
    Csv,
    Json,
}

impl MetadataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MetadataFormat::Csv => "csv",
            MetadataFormat::Json => "json",
        }
    }
}

/// A named table of records.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DumpTable {
    pub fn new<S: Into<String>>(name: S, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(MediaError::conversion(
                self.name.clone(),
                format!(
                    "row has {} values but the table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, format: MetadataFormat) -> Result<String> {
        match format {
            MetadataFormat::Csv => Ok(self.to_csv()),
            MetadataFormat::Json => self.to_json(),
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_field(c)).collect();
        out.push_str(&header.join(","));
        out.push('\n');

        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|v| csv_field(&cell_text(v))).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }

        out
    }

    pub fn to_json(&self) -> Result<String> {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(record)
            })
            .collect();

        let mut text = serde_json::to_string_pretty(&Value::Array(records))?;
        text.push('\n');
        Ok(text)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Tables from one producer, exported under an optional path prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpBatch {
    pub prefix: Option<String>,
    pub tables: Vec<DumpTable>,
}

impl DumpBatch {
    pub fn new(tables: Vec<DumpTable>) -> Self {
        Self {
            prefix: None,
            tables,
        }
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub relative_path: PathBuf,
    pub content: String,
}

/// Serializes dump batches into files laid out as `<prefix>/<name>.<format>`.
pub struct DataFormatter {
    formats: Vec<MetadataFormat>,
}

impl DataFormatter {
    pub fn new(formats: &[MetadataFormat]) -> Self {
        let mut unique = Vec::new();
        for format in formats {
            if !unique.contains(format) {
                unique.push(*format);
            }
        }
        Self { formats: unique }
    }

    pub fn formats(&self) -> &[MetadataFormat] {
        &self.formats
    }

    pub fn export(&self, batch: &DumpBatch) -> Result<Vec<ExportFile>> {
        let base = match batch.prefix {
            Some(ref prefix) => checked_relative(prefix)?,
            None => PathBuf::new(),
        };

        let mut files = Vec::new();
        for table in &batch.tables {
            let stem = checked_relative(&table.name)?;
            for format in &self.formats {
                files.push(ExportFile {
                    relative_path: base.join(format!("{}.{}", stem.display(), format.extension())),
                    content: table.render(*format)?,
                });
            }
        }

        Ok(files)
    }
}

fn checked_relative(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let clean = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if clean {
        Ok(path.to_path_buf())
    } else {
        Err(MediaError::InvalidPath {
            path: format!("Unusable export name: '{}'", name),
        })
    }
}
