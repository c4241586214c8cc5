//! Compilation of the condition AST into SQLite `WHERE` clauses with bound parameters.

use anyhow::bail;
use chrono::{DateTime, SecondsFormat, Utc};
use memory_core::{Column, Condition, Table, Value};
use sqlx::sqlite::{SqliteArguments, Sqlite};
use sqlx::query::Query;

use crate::schema::{has_column, quoted};

/// A bindable SQLite value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Null,
    Text(String),
    Integer(i64),
    Blob(Vec<u8>),
}

pub(crate) fn timestamp_text(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn to_param(value: &Value) -> anyhow::Result<SqlParam> {
    Ok(match value {
        Value::Null => SqlParam::Null,
        Value::Text(s) => SqlParam::Text(s.clone()),
        Value::Integer(i) => SqlParam::Integer(*i),
        Value::Timestamp(t) => SqlParam::Text(timestamp_text(t)),
        Value::List(list) => SqlParam::Text(serde_json::to_string(list)?),
        Value::Map(map) => SqlParam::Text(serde_json::to_string(map)?),
    })
}

pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Vec<SqlParam>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(None::<String>),
            SqlParam::Text(s) => query.bind(s),
            SqlParam::Integer(i) => query.bind(i),
            SqlParam::Blob(b) => query.bind(b),
        };
    }
    query
}

/// Clause matching rows whose JSON object `column` maps one bound key to one bound value.
/// Keys are compared as values so they never take part in path syntax.
pub(crate) fn object_entry_clause(column: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.key = ? AND json_each.value = ?)",
        column
    )
}

fn is_list_column(column: Column) -> bool {
    matches!(
        column,
        Column::HarmCategories
            | Column::Authors
            | Column::Groups
            | Column::Parameters
            | Column::ConverterIdentifiers
    )
}

const NEVER: &str = "0 = 1";
const ALWAYS: &str = "1 = 1";

/// Compiles `condition` for `table`, appending its parameters to `params`.
pub(crate) fn compile(
    table: Table,
    condition: &Condition,
    params: &mut Vec<SqlParam>,
) -> anyhow::Result<String> {
    let check = |column: Column| -> anyhow::Result<String> {
        if !has_column(table, column) {
            bail!("Unknown column for {}: {}", table.name(), column.name());
        }
        Ok(quoted(column))
    };

    let clause = match condition {
        Condition::All(conditions) if conditions.is_empty() => ALWAYS.to_string(),
        Condition::All(conditions) => {
            let parts = conditions
                .iter()
                .map(|c| compile(table, c, params))
                .collect::<anyhow::Result<Vec<_>>>()?;
            format!("({})", parts.join(" AND "))
        }
        Condition::Eq(column, value) | Condition::Ne(column, value) if value.is_null() => {
            check(*column)?;
            NEVER.to_string()
        }
        Condition::Eq(column, value) => {
            let col = check(*column)?;
            params.push(to_param(value)?);
            format!("{} = ?", col)
        }
        Condition::Ne(column, value) => {
            let col = check(*column)?;
            params.push(to_param(value)?);
            format!("{} <> ?", col)
        }
        Condition::In(column, values) => {
            let col = check(*column)?;
            let values: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
            if values.is_empty() {
                NEVER.to_string()
            } else {
                for value in &values {
                    params.push(to_param(value)?);
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", col, placeholders)
            }
        }
        Condition::Ge(column, value) => {
            let col = check(*column)?;
            params.push(to_param(value)?);
            format!("{} >= ?", col)
        }
        Condition::Le(column, value) => {
            let col = check(*column)?;
            params.push(to_param(value)?);
            format!("{} <= ?", col)
        }
        Condition::Contains(column, needle) => {
            let col = check(*column)?;
            params.push(SqlParam::Text(needle.clone()));
            if is_list_column(*column) {
                format!(
                    "EXISTS (SELECT 1 FROM json_each({}) WHERE instr(json_each.value, ?) > 0)",
                    col
                )
            } else {
                format!("instr({}, ?) > 0", col)
            }
        }
        Condition::MapEntry { column, key, value } => {
            let col = check(*column)?;
            params.push(SqlParam::Text(key.clone()));
            params.push(SqlParam::Text(value.clone()));
            object_entry_clause(&col)
        }
        Condition::Native {
            clause,
            params: native,
        } => {
            for value in native {
                params.push(to_param(value)?);
            }
            format!("({})", clause)
        }
    };
    Ok(clause)
}
