use chrono::{DateTime, Duration, Utc};
use pg_grab_shared::{type_oid, CmdType, Datum, PARAM_DELIMITER};
use rusqlite::{Connection, Row};
use serde::Serialize;

use super::catalog::quote_ident;
use crate::config::GrabConfig;
use crate::error::{GrabError, Result};
use crate::monitoring::LogLayout;
use crate::types::TypeRegistry;

/// Parameters as stored by one of the two layouts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LoggedParams {
    Typed {
        values: Vec<Option<String>>,
        types: Vec<String>,
    },
    Delimited(String),
}

/// One row of the statement log, read back for inspection or replay.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggedStatement {
    pub transaction_id: i64,
    pub command_id: i64,
    pub pid: i64,
    pub user_id: i64,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub elapsed_seconds: Option<f64>,
    /// Absent in the delimited layout.
    pub command_type: Option<CmdType>,
    pub source_text: String,
    pub params: Option<LoggedParams>,
}

impl LoggedStatement {
    /// When the statement finished, to millisecond precision.
    pub fn end_timestamp(&self) -> Option<DateTime<Utc>> {
        let start = self.start_timestamp?;
        let elapsed = self.elapsed_seconds?;
        Some(start + Duration::milliseconds((elapsed * 1000.0).round() as i64))
    }

    /// Stored parameter texts in position order. The delimited layout
    /// cannot tell a NULL from an empty string; both come back as `Some("")`.
    pub fn param_texts(&self) -> Option<Vec<Option<String>>> {
        match self.params.as_ref()? {
            LoggedParams::Typed { values, .. } => Some(values.clone()),
            LoggedParams::Delimited(blob) => Some(
                blob.split(PARAM_DELIMITER)
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ),
        }
    }

    /// Re-parses every stored parameter under its stored type. The delimited
    /// layout keeps no types, so its values come back as text.
    pub fn decode_params(&self, types: &TypeRegistry) -> Result<Option<Vec<Option<Datum>>>> {
        let Some(params) = &self.params else {
            return Ok(None);
        };

        match params {
            LoggedParams::Typed {
                values,
                types: names,
            } => {
                if values.len() != names.len() {
                    return Err(GrabError::InvalidInput {
                        type_name: "regtype[]".to_string(),
                        input: format!("{} values for {} types", values.len(), names.len()),
                    });
                }

                let mut decoded = Vec::with_capacity(values.len());
                for (value, name) in values.iter().zip(names) {
                    let oid = types
                        .lookup_type_name(name)
                        .ok_or_else(|| GrabError::InvalidInput {
                            type_name: "regtype".to_string(),
                            input: name.clone(),
                        })?;
                    decoded.push(match value {
                        Some(text) => Some(types.parse(oid, text)?),
                        None => None,
                    });
                }
                Ok(Some(decoded))
            }
            LoggedParams::Delimited(_) => Ok(self
                .param_texts()
                .map(|texts| texts.into_iter().map(|t| t.map(Datum::Text)).collect())),
        }
    }
}

/// Reads the whole log table in insertion order, bypassing the hooks.
pub(crate) fn read_statement_log(
    conn: &Connection,
    types: &TypeRegistry,
    config: &GrabConfig,
) -> Result<Vec<LoggedStatement>> {
    let columns = config
        .layout
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {}.{} ORDER BY rowid",
        columns,
        quote_ident(&config.schema),
        quote_ident(&config.table)
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut statements = Vec::new();
    while let Some(row) = rows.next()? {
        let statement = match config.layout {
            LogLayout::TypedArrays => typed_arrays_row(row, types)?,
            LogLayout::Delimited => delimited_row(row, types)?,
        };
        statements.push(statement);
    }
    Ok(statements)
}

fn start_timestamp(text: Option<String>, types: &TypeRegistry) -> Result<Option<DateTime<Utc>>> {
    let Some(text) = text else {
        return Ok(None);
    };
    match types.parse(type_oid::TIMESTAMPTZ, &text)? {
        Datum::TimestampTz(ts) => Ok(Some(ts)),
        _ => Err(GrabError::InvalidInput {
            type_name: "timestamp with time zone".to_string(),
            input: text,
        }),
    }
}

fn typed_arrays_row(row: &Row<'_>, types: &TypeRegistry) -> Result<LoggedStatement> {
    let values: Option<String> = row.get(8)?;
    let names: Option<String> = row.get(9)?;
    let params = match (values, names) {
        (Some(values), Some(names)) => Some(LoggedParams::Typed {
            values: serde_json::from_str(&values)?,
            types: serde_json::from_str(&names)?,
        }),
        _ => None,
    };

    Ok(LoggedStatement {
        transaction_id: row.get(0)?,
        command_id: row.get(1)?,
        pid: row.get(2)?,
        user_id: row.get(3)?,
        start_timestamp: start_timestamp(row.get(4)?, types)?,
        elapsed_seconds: row.get(5)?,
        command_type: Some(CmdType::from_id(row.get(6)?)),
        source_text: row.get(7)?,
        params,
    })
}

fn delimited_row(row: &Row<'_>, types: &TypeRegistry) -> Result<LoggedStatement> {
    let params: Option<String> = row.get(7)?;

    Ok(LoggedStatement {
        transaction_id: row.get(0)?,
        command_id: row.get(1)?,
        pid: row.get(2)?,
        user_id: row.get(3)?,
        start_timestamp: start_timestamp(row.get(4)?, types)?,
        elapsed_seconds: row.get(5)?,
        command_type: None,
        source_text: row.get(6)?,
        params: params.map(LoggedParams::Delimited),
    })
}
