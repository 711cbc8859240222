use pg_grab_shared::{type_oid, Datum};
use rusqlite::types::Value;

use crate::error::Result;
use crate::types::TypeRegistry;

/// Storage form of a value in SQLite. Types without a native SQLite
/// representation are stored as their canonical text; arrays as JSON.
pub(crate) fn to_sql_value(datum: &Datum, types: &TypeRegistry) -> Result<Value> {
    let value = match datum {
        Datum::Bool(b) => Value::Integer(i64::from(*b)),
        Datum::Int2(v) => Value::Integer(i64::from(*v)),
        Datum::Int4(v) => Value::Integer(i64::from(*v)),
        Datum::Int8(v) => Value::Integer(*v),
        Datum::Float4(v) => Value::Real(f64::from(*v)),
        Datum::Float8(v) => Value::Real(*v),
        Datum::Text(s) => Value::Text(s.clone()),
        Datum::Bytea(bytes) => Value::Blob(bytes.clone()),
        Datum::Oid(oid) => Value::Integer(i64::from(oid.0)),
        Datum::TextArray(items) => Value::Text(serde_json::to_string(items)?),
        Datum::RegTypeArray(oids) => {
            let names: Vec<String> = oids
                .iter()
                .map(|oid| types.render(type_oid::REGTYPE, &Datum::RegType(*oid)))
                .collect::<Result<_>>()?;
            Value::Text(serde_json::to_string(&names)?)
        }
        other => Value::Text(types.render(other.natural_type(), other)?),
    };
    Ok(value)
}
