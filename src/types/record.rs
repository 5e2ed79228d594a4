//! Canonical record flowing through the stage chain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OperatorError;

/// Key of the grouping envelope produced at a group boundary.
pub const KEY_FIELD: &str = "key";
/// Value of the grouping envelope produced at a group boundary.
pub const VALUE_FIELD: &str = "value";

/// A record: an ordered set of named JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
  pub fn new() -> Self {
    Self(Map::new())
  }

  /// Builds a record from `(name, value)` pairs.
  pub fn from_pairs<K, V, I>(pairs: I) -> Self
  where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
  {
    Self(
      pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }

  /// Converts a JSON value into a record; `None` unless it is an object.
  pub fn from_value(value: Value) -> Option<Self> {
    match value {
      Value::Object(map) => Some(Self(map)),
      _ => None,
    }
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.0.get(field)
  }

  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(field.into(), value.into());
  }

  pub fn remove(&mut self, field: &str) -> Option<Value> {
    self.0.shift_remove(field)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  /// Returns the string value of `field`, failing if absent or not a string.
  pub fn get_str(&self, field: &str) -> Result<&str, OperatorError> {
    match self.0.get(field) {
      Some(Value::String(s)) => Ok(s),
      Some(_) => Err(OperatorError::WrongType {
        field: field.to_string(),
        expected: "a string",
      }),
      None => Err(OperatorError::MissingField(field.to_string())),
    }
  }

  /// Returns the numeric value of `field`, failing if absent or not a number.
  pub fn get_f64(&self, field: &str) -> Result<f64, OperatorError> {
    match self.0.get(field) {
      Some(v) => v.as_f64().ok_or_else(|| OperatorError::WrongType {
        field: field.to_string(),
        expected: "a number",
      }),
      None => Err(OperatorError::MissingField(field.to_string())),
    }
  }

  /// Projects the record onto `fields`, in the given order.
  pub fn select(&self, fields: &[String]) -> Result<Record, OperatorError> {
    let mut out = Map::with_capacity(fields.len());
    for field in fields {
      let value = self
        .0
        .get(field)
        .ok_or_else(|| OperatorError::MissingField(field.clone()))?;
      out.insert(field.clone(), value.clone());
    }
    Ok(Self(out))
  }

  /// Projects onto `fields` when given, otherwise clones the whole record.
  pub fn select_or_all(&self, fields: Option<&[String]>) -> Result<Record, OperatorError> {
    match fields {
      Some(fields) => self.select(fields),
      None => Ok(self.clone()),
    }
  }

  /// Returns this record with every field of `other` written over it.
  pub fn overlay(mut self, other: Record) -> Record {
    for (k, v) in other.0 {
      self.0.insert(k, v);
    }
    self
  }

  /// Wraps a grouping key and value into a single envelope record.
  pub fn keyed(key: Record, value: Record) -> Record {
    let mut out = Map::with_capacity(2);
    out.insert(KEY_FIELD.to_string(), Value::Object(key.0));
    out.insert(VALUE_FIELD.to_string(), Value::Object(value.0));
    Self(out)
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.0)
  }
}

impl std::fmt::Display for Record {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match serde_json::to_string(&self.0) {
      Ok(s) => f.write_str(&s),
      Err(_) => write!(f, "{:?}", self.0),
    }
  }
}
