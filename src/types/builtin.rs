use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use pg_grab_shared::{type_oid, Datum, Oid};
use std::sync::Arc;

use super::array::{format_array_literal, parse_array_literal};
use super::{InputFn, OutputFn, TypeEntry, TypeRegistry};
use crate::error::{GrabError, Result};

pub(super) fn entries() -> Vec<TypeEntry> {
    vec![
        entry(type_oid::BOOL, "boolean", &["bool"], bool_out, bool_in),
        entry(type_oid::INT2, "smallint", &["int2"], int2_out, int2_in),
        entry(type_oid::INT4, "integer", &["int4", "int"], int4_out, int4_in),
        entry(type_oid::INT8, "bigint", &["int8"], int8_out, int8_in),
        entry(type_oid::FLOAT4, "real", &["float4"], float4_out, float4_in),
        entry(type_oid::FLOAT8, "double precision", &["float8"], float8_out, float8_in),
        entry(type_oid::NUMERIC, "numeric", &["decimal"], numeric_out, numeric_in),
        entry(type_oid::TEXT, "text", &[], text_out, text_in),
        entry(type_oid::VARCHAR, "character varying", &["varchar"], text_out, varchar_in),
        entry(type_oid::BYTEA, "bytea", &[], bytea_out, bytea_in),
        entry(type_oid::DATE, "date", &[], date_out, date_in),
        entry(type_oid::TIMESTAMP, "timestamp without time zone", &["timestamp"], timestamp_out, timestamp_in),
        entry(type_oid::TIMESTAMPTZ, "timestamp with time zone", &["timestamptz"], timestamptz_out, timestamptz_in),
        entry(type_oid::UUID, "uuid", &[], uuid_out, uuid_in),
        entry(type_oid::JSON, "json", &[], json_out, json_in),
        entry(type_oid::OID, "oid", &[], oid_out, oid_in),
        entry(type_oid::REGTYPE, "regtype", &[], regtype_out, regtype_in),
        entry(type_oid::TEXT_ARRAY, "text[]", &["_text"], text_array_out, text_array_in),
        entry(type_oid::REGTYPE_ARRAY, "regtype[]", &["_regtype"], regtype_array_out, regtype_array_in),
    ]
}

fn entry(
    oid: Oid,
    name: &str,
    aliases: &[&str],
    output: fn(&Datum, &TypeRegistry) -> Result<String>,
    input: fn(&str, &TypeRegistry) -> Result<Datum>,
) -> TypeEntry {
    let output: OutputFn = Arc::new(output);
    let input: InputFn = Arc::new(input);
    TypeEntry::new(oid, name, output)
        .with_input(input)
        .with_aliases(aliases)
}

fn mismatch(expected: Oid, value: &Datum) -> GrabError {
    GrabError::TypeMismatch {
        expected,
        found: value.natural_type(),
    }
}

fn invalid(type_name: &str, input: &str) -> GrabError {
    GrabError::InvalidInput {
        type_name: type_name.to_string(),
        input: input.to_string(),
    }
}

// ==================== bool ====================

fn bool_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Bool(true) => Ok("t".to_string()),
        Datum::Bool(false) => Ok("f".to_string()),
        other => Err(mismatch(type_oid::BOOL, other)),
    }
}

fn bool_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    match text.trim().to_lowercase().as_str() {
        "t" | "true" | "yes" | "on" | "1" => Ok(Datum::Bool(true)),
        "f" | "false" | "no" | "off" | "0" => Ok(Datum::Bool(false)),
        _ => Err(invalid("boolean", text)),
    }
}

// ==================== integers ====================

fn int2_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Int2(v) => Ok(v.to_string()),
        other => Err(mismatch(type_oid::INT2, other)),
    }
}

fn int2_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(Datum::Int2)
        .map_err(|_| invalid("smallint", text))
}

fn int4_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Int4(v) => Ok(v.to_string()),
        other => Err(mismatch(type_oid::INT4, other)),
    }
}

fn int4_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(Datum::Int4)
        .map_err(|_| invalid("integer", text))
}

fn int8_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Int8(v) => Ok(v.to_string()),
        other => Err(mismatch(type_oid::INT8, other)),
    }
}

fn int8_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(Datum::Int8)
        .map_err(|_| invalid("bigint", text))
}

// ==================== floats ====================

/// Shortest round-trip text, switching to exponent form outside
/// `1e-4 <= |v| < 10^max_exp` the way the host prints floats.
fn float_text(v: f64, shortest: String, scientific: String, max_exp: i32) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // `{:e}` yields e.g. "1.5e-7" / "1e20"
    let (mantissa, exp) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return shortest,
    };

    if exp < -4 || exp >= max_exp {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        shortest
    }
}

fn float4_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Float4(v) => Ok(float_text(f64::from(*v), v.to_string(), format!("{:e}", v), 6)),
        other => Err(mismatch(type_oid::FLOAT4, other)),
    }
}

fn float4_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(Datum::Float4)
        .map_err(|_| invalid("real", text))
}

fn float8_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Float8(v) => Ok(float_text(*v, v.to_string(), format!("{:e}", v), 15)),
        other => Err(mismatch(type_oid::FLOAT8, other)),
    }
}

fn float8_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(Datum::Float8)
        .map_err(|_| invalid("double precision", text))
}

// ==================== numeric ====================

fn numeric_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Numeric(v) => canonical_numeric(v).ok_or_else(|| invalid("numeric", v)),
        other => Err(mismatch(type_oid::NUMERIC, other)),
    }
}

fn numeric_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    canonical_numeric(text)
        .map(Datum::Numeric)
        .ok_or_else(|| invalid("numeric", text))
}

const MAX_NUMERIC_EXPONENT: i64 = 1000;

/// Numeric text as the server prints it: no `+`, no leading integer zeros,
/// exponent expanded, fraction scale kept. `None` when malformed.
fn canonical_numeric(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        return Some("NaN".to_string());
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (mantissa, exponent) = match unsigned.split_once(&['e', 'E'][..]) {
        Some((mantissa, exp)) => (mantissa, exp.parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    if exponent.abs() > MAX_NUMERIC_EXPONENT {
        return None;
    }

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    // Decimal point position within the concatenated digits.
    let digits = format!("{}{}", int_part, frac_part);
    let point = int_part.len() as i64 + exponent;
    let (int_digits, frac_digits) = if point <= 0 {
        (String::new(), "0".repeat((-point) as usize) + &digits)
    } else if point as usize >= digits.len() {
        (digits.clone() + &"0".repeat(point as usize - digits.len()), String::new())
    } else {
        let (i, f) = digits.split_at(point as usize);
        (i.to_string(), f.to_string())
    };

    let int_digits = int_digits.trim_start_matches('0');
    let mut out = String::with_capacity(int_digits.len() + frac_digits.len() + 3);
    if negative && digits.chars().any(|c| c != '0') {
        out.push('-');
    }
    out.push_str(if int_digits.is_empty() { "0" } else { int_digits });
    if !frac_digits.is_empty() {
        out.push('.');
        out.push_str(&frac_digits);
    }
    Some(out)
}

// ==================== text ====================

fn text_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Text(v) => Ok(v.clone()),
        other => Err(mismatch(type_oid::TEXT, other)),
    }
}

fn text_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    Ok(Datum::Text(text.to_string()))
}

fn varchar_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    Ok(Datum::Text(text.to_string()))
}

// ==================== bytea ====================

fn bytea_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Bytea(bytes) => {
            let mut out = String::with_capacity(2 + bytes.len() * 2);
            out.push_str("\\x");
            for b in bytes {
                out.push_str(&format!("{:02x}", b));
            }
            Ok(out)
        }
        other => Err(mismatch(type_oid::BYTEA, other)),
    }
}

fn bytea_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    let hex = text
        .strip_prefix("\\x")
        .ok_or_else(|| invalid("bytea", text))?;
    if hex.len() % 2 != 0 {
        return Err(invalid("bytea", text));
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let pair = hex.get(i..i + 2).ok_or_else(|| invalid("bytea", text))?;
        let byte = u8::from_str_radix(pair, 16).map_err(|_| invalid("bytea", text))?;
        bytes.push(byte);
    }
    Ok(Datum::Bytea(bytes))
}

// ==================== date / time ====================

/// Fractional seconds with trailing zeros trimmed, empty when whole.
fn fraction(micros: u32) -> String {
    if micros == 0 {
        return String::new();
    }
    let digits = format!("{:06}", micros);
    format!(".{}", digits.trim_end_matches('0'))
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    format!(
        "{}{}",
        ts.format("%Y-%m-%d %H:%M:%S"),
        fraction(ts.nanosecond() / 1_000)
    )
}

pub(crate) fn format_timestamptz(ts: &DateTime<Utc>) -> String {
    format!("{}+00", format_timestamp(&ts.naive_utc()))
}

fn date_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
        other => Err(mismatch(type_oid::DATE, other)),
    }
}

fn date_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map(Datum::Date)
        .map_err(|_| invalid("date", text))
}

fn timestamp_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Timestamp(ts) => Ok(format_timestamp(ts)),
        other => Err(mismatch(type_oid::TIMESTAMP, other)),
    }
}

fn timestamp_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    let trimmed = text.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(Datum::Timestamp)
        .map_err(|_| invalid("timestamp without time zone", text))
}

fn timestamptz_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::TimestampTz(ts) => Ok(format_timestamptz(ts)),
        other => Err(mismatch(type_oid::TIMESTAMPTZ, other)),
    }
}

pub(crate) fn parse_timestamptz(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn timestamptz_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    parse_timestamptz(text)
        .map(Datum::TimestampTz)
        .ok_or_else(|| invalid("timestamp with time zone", text))
}

// ==================== uuid / json ====================

fn uuid_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Uuid(u) => Ok(u.hyphenated().to_string()),
        other => Err(mismatch(type_oid::UUID, other)),
    }
}

fn uuid_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    uuid::Uuid::parse_str(text.trim())
        .map(Datum::Uuid)
        .map_err(|_| invalid("uuid", text))
}

fn json_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Json(v) => Ok(serde_json::to_string(v)?),
        other => Err(mismatch(type_oid::JSON, other)),
    }
}

fn json_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    serde_json::from_str(text)
        .map(Datum::Json)
        .map_err(|_| invalid("json", text))
}

// ==================== oid / regtype ====================

fn oid_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::Oid(oid) => Ok(oid.0.to_string()),
        other => Err(mismatch(type_oid::OID, other)),
    }
}

fn oid_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    text.trim()
        .parse()
        .map(|v| Datum::Oid(Oid(v)))
        .map_err(|_| invalid("oid", text))
}

fn regtype_name(oid: Oid, types: &TypeRegistry) -> String {
    types.type_name(oid).unwrap_or_else(|| oid.0.to_string())
}

fn regtype_from_name(text: &str, types: &TypeRegistry) -> Result<Oid> {
    if let Some(oid) = types.lookup_type_name(text) {
        return Ok(oid);
    }
    text.trim()
        .parse()
        .map(Oid)
        .map_err(|_| invalid("regtype", text))
}

fn regtype_out(value: &Datum, types: &TypeRegistry) -> Result<String> {
    match value {
        Datum::RegType(oid) => Ok(regtype_name(*oid, types)),
        other => Err(mismatch(type_oid::REGTYPE, other)),
    }
}

fn regtype_in(text: &str, types: &TypeRegistry) -> Result<Datum> {
    regtype_from_name(text, types).map(Datum::RegType)
}

// ==================== arrays ====================

fn text_array_out(value: &Datum, _: &TypeRegistry) -> Result<String> {
    match value {
        Datum::TextArray(items) => Ok(format_array_literal(items.iter().map(|i| i.as_deref()))),
        other => Err(mismatch(type_oid::TEXT_ARRAY, other)),
    }
}

fn text_array_in(text: &str, _: &TypeRegistry) -> Result<Datum> {
    parse_array_literal(text)
        .map(Datum::TextArray)
        .ok_or_else(|| invalid("text[]", text))
}

fn regtype_array_out(value: &Datum, types: &TypeRegistry) -> Result<String> {
    match value {
        Datum::RegTypeArray(oids) => {
            let names: Vec<String> = oids.iter().map(|o| regtype_name(*o, types)).collect();
            Ok(format_array_literal(names.iter().map(|n| Some(n.as_str()))))
        }
        other => Err(mismatch(type_oid::REGTYPE_ARRAY, other)),
    }
}

fn regtype_array_in(text: &str, types: &TypeRegistry) -> Result<Datum> {
    let items = parse_array_literal(text).ok_or_else(|| invalid("regtype[]", text))?;
    items
        .into_iter()
        .map(|item| match item {
            Some(name) => regtype_from_name(&name, types),
            None => Err(invalid("regtype[]", text)),
        })
        .collect::<Result<Vec<_>>>()
        .map(Datum::RegTypeArray)
}
