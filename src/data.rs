use crate::error::{Result, VizError};
use serde_json::Value;
use std::fmt;
use std::io::Read;

/// Identity of an uploaded dataset, used to cache its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tabular data as uploaded: a header row plus string cells.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: DatasetId,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(id: DatasetId, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { id, headers, rows }
    }

    /// Read delimited text with a header row.
    pub fn from_csv<R: Read>(id: DatasetId, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let malformed = |e: csv::Error| VizError::Introspection {
            dataset: id.to_string(),
            reason: e.to_string(),
        };

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(malformed)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(malformed)?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(Self { id, headers, rows })
    }

    /// Create a Dataset from a JSON Array of Objects
    pub fn from_json(id: DatasetId, value: &Value) -> Result<Self> {
        let fail = |reason: &str| VizError::Introspection {
            dataset: id.to_string(),
            reason: reason.to_string(),
        };

        let array = value
            .as_array()
            .ok_or_else(|| fail("input data must be a JSON array of objects"))?;

        if array.is_empty() {
            return Err(fail("input data array is empty"));
        }

        // Extract headers from the first object
        let first_obj = array[0]
            .as_object()
            .ok_or_else(|| fail("items in array must be objects"))?;

        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| fail("items in array must be objects"))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let val_str = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => return Err(fail(&format!("unsupported value type for field '{}'", header))),
                };
                row.push(val_str);
            }
            rows.push(row);
        }

        Ok(Self { id, headers, rows })
    }

    /// Position of a column by exact (case-sensitive) name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Iterate the cells of one column.
    pub fn column<'a>(&'a self, index: usize) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}
