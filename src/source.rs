//! Record sources: turn a raw key/value pair into a [Record].

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecodeError};
use crate::types::Record;

/// Decodes raw input pairs into records.
pub trait RecordSource {
  fn decode(&self, key: &[u8], value: &[u8]) -> Result<Record, DecodeError>;
}

/// Value bytes hold one JSON object; the key is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordSource;

impl RecordSource for JsonRecordSource {
  fn decode(&self, _key: &[u8], value: &[u8]) -> Result<Record, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(value)?;
    Record::from_value(value).ok_or(DecodeError::NotAnObject)
  }
}

/// Value bytes hold one delimited line with the declared fields, in order.
#[derive(Debug, Clone)]
pub struct DelimitedRecordSource {
  fields: Vec<String>,
  delimiter: u8,
}

impl DelimitedRecordSource {
  pub fn new<I, S>(fields: I, delimiter: u8) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      fields: fields.into_iter().map(Into::into).collect(),
      delimiter,
    }
  }
}

impl RecordSource for DelimitedRecordSource {
  fn decode(&self, _key: &[u8], value: &[u8]) -> Result<Record, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
      .has_headers(false)
      .delimiter(self.delimiter)
      .from_reader(value);
    let row = reader.records().next().ok_or(DecodeError::Empty)??;
    if row.len() != self.fields.len() {
      return Err(DecodeError::FieldCount {
        expected: self.fields.len(),
        actual: row.len(),
      });
    }
    Ok(Record::from_pairs(
      self.fields.iter().cloned().zip(row.iter().map(str::to_string)),
    ))
  }
}

/// Record format named in a flow descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
  #[default]
  Json,
  Delimited {
    fields: Vec<String>,
    #[serde(default = "default_delimiter")]
    delimiter: char,
  },
}

fn default_delimiter() -> char {
  ','
}

impl SourceFormat {
  /// Builds the decoder. Fails when a delimited format names a non-ASCII delimiter.
  pub fn into_source(self) -> Result<Box<dyn RecordSource>, ConfigError> {
    match self {
      SourceFormat::Json => Ok(Box::new(JsonRecordSource)),
      SourceFormat::Delimited { fields, delimiter } => {
        if !delimiter.is_ascii() {
          return Err(ConfigError::Delimiter(delimiter));
        }
        Ok(Box::new(DelimitedRecordSource::new(fields, delimiter as u8)))
      }
    }
  }
}
