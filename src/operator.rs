//! Per-record operators applied by transform stages.
//!
//! An operator returns zero (filter), one (map) or many (flatmap) records per input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::OperatorError;
use crate::types::{Record, Scope};

/// A per-record operator.
pub trait RecordOperator: Send + Sync {
  /// Applies the operator to the argument record selected by `scope`.
  fn operate(&self, scope: &Scope, args: &Record) -> Result<Vec<Record>, OperatorError>;

  /// Releases operator state. Called once when the owning stage closes.
  fn cleanup(&self) {}
}

impl<F> RecordOperator for F
where
  F: Fn(&Scope, &Record) -> Result<Vec<Record>, OperatorError> + Send + Sync,
{
  fn operate(&self, scope: &Scope, args: &Record) -> Result<Vec<Record>, OperatorError> {
    self(scope, args)
  }
}

/// Operators that can be named in a flow descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuiltinOperator {
  Identity,
  Uppercase { field: String },
  Lowercase { field: String },
  /// Writes `numerator / divisor` into `into`.
  Divide {
    numerator: String,
    divisor: String,
    into: String,
  },
  FilterEquals {
    field: String,
    value: serde_json::Value,
  },
  FilterMatches {
    field: String,
    pattern: String,
  },
  /// Emits one record per piece of `field` split on `separator`.
  Split { field: String, separator: String },
  Rename { from: String, to: String },
}

impl BuiltinOperator {
  /// Compiles the operator; fails only for an invalid `filter_matches` pattern.
  pub fn compile(self) -> Result<CompiledOperator, regex::Error> {
    let pattern = match &self {
      BuiltinOperator::FilterMatches { pattern, .. } => Some(Regex::new(pattern)?),
      _ => None,
    };
    Ok(CompiledOperator {
      op: self,
      pattern,
    })
  }
}

/// A [BuiltinOperator] ready to run.
#[derive(Debug, Clone)]
pub struct CompiledOperator {
  op: BuiltinOperator,
  pattern: Option<Regex>,
}

fn map_str(
  args: &Record,
  field: &str,
  f: impl Fn(&str) -> String,
) -> Result<Vec<Record>, OperatorError> {
  let value = f(args.get_str(field)?);
  let mut out = args.clone();
  out.insert(field, value);
  Ok(vec![out])
}

impl RecordOperator for CompiledOperator {
  #[instrument(level = "trace", skip(self, _scope, args))]
  fn operate(&self, _scope: &Scope, args: &Record) -> Result<Vec<Record>, OperatorError> {
    match &self.op {
      BuiltinOperator::Identity => Ok(vec![args.clone()]),
      BuiltinOperator::Uppercase { field } => map_str(args, field, str::to_uppercase),
      BuiltinOperator::Lowercase { field } => map_str(args, field, str::to_lowercase),
      BuiltinOperator::Divide {
        numerator,
        divisor,
        into,
      } => {
        let d = args.get_f64(divisor)?;
        if d == 0.0 {
          return Err(OperatorError::DivideByZero(divisor.clone()));
        }
        let n = args.get_f64(numerator)?;
        let mut out = args.clone();
        out.insert(into.clone(), n / d);
        Ok(vec![out])
      }
      BuiltinOperator::FilterEquals { field, value } => {
        let keep = args.get(field).is_some_and(|v| v == value);
        Ok(if keep { vec![args.clone()] } else { vec![] })
      }
      BuiltinOperator::FilterMatches { field, .. } => {
        let text = args.get_str(field)?;
        let keep = self.pattern.as_ref().is_some_and(|re| re.is_match(text));
        Ok(if keep { vec![args.clone()] } else { vec![] })
      }
      BuiltinOperator::Split { field, separator } => {
        let text = args.get_str(field)?;
        Ok(
          text
            .split(separator.as_str())
            .map(|piece| {
              let mut out = args.clone();
              out.insert(field.clone(), piece);
              out
            })
            .collect(),
        )
      }
      BuiltinOperator::Rename { from, to } => {
        let mut out = args.clone();
        let value = out
          .remove(from)
          .ok_or_else(|| OperatorError::MissingField(from.clone()))?;
        out.insert(to.clone(), value);
        Ok(vec![out])
      }
    }
  }
}
