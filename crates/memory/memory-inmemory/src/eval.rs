//! Native evaluation of the condition AST against stored records.

use std::cmp::Ordering;

use anyhow::{anyhow, bail};
use memory_core::{Column, Condition, Record, Value};

/// Evaluates `condition` against `record`.
///
/// A column that does not belong to the record's table is an error, so a malformed query fails
/// instead of silently matching nothing.
pub(crate) fn matches<R: Record>(record: &R, condition: &Condition) -> anyhow::Result<bool> {
    match condition {
        Condition::All(conditions) => {
            for c in conditions {
                if !matches(record, c)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Eq(column, expected) => {
            let actual = column_of(record, *column)?;
            Ok(!actual.is_null() && !expected.is_null() && &actual == expected)
        }
        Condition::Ne(column, expected) => {
            let actual = column_of(record, *column)?;
            Ok(!actual.is_null() && !expected.is_null() && &actual != expected)
        }
        Condition::In(column, values) => {
            let actual = column_of(record, *column)?;
            Ok(!actual.is_null() && values.iter().any(|v| v == &actual))
        }
        Condition::Ge(column, bound) => {
            let actual = column_of(record, *column)?;
            Ok(matches!(
                compare(&actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ))
        }
        Condition::Le(column, bound) => {
            let actual = column_of(record, *column)?;
            Ok(matches!(
                compare(&actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ))
        }
        Condition::Contains(column, needle) => match column_of(record, *column)? {
            Value::Text(text) => Ok(text.contains(needle.as_str())),
            Value::List(items) => Ok(items.iter().any(|item| item.contains(needle.as_str()))),
            Value::Null => Ok(false),
            other => bail!("Contains is not supported on {} ({:?})", column.name(), other),
        },
        Condition::MapEntry { column, key, value } => match column_of(record, *column)? {
            Value::Map(map) => Ok(map.get(key) == Some(value)),
            Value::Null => Ok(false),
            other => bail!("{} is not a map column ({:?})", column.name(), other),
        },
        Condition::Native { clause, .. } => {
            bail!("Native conditions are not supported in memory: {}", clause)
        }
    }
}

fn column_of<R: Record>(record: &R, column: Column) -> anyhow::Result<Value> {
    record
        .column_value(column)
        .ok_or_else(|| anyhow!("Unknown column for this table: {}", column.name()))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
