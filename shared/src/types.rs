use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Object identifier of a host catalog entry (type, namespace, relation, role).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(pub u32);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builtin type identifiers, numbered as the PostgreSQL catalog numbers them.
pub mod type_oid {
    use super::Oid;

    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const OID: Oid = Oid(26);
    pub const JSON: Oid = Oid(114);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const TEXT_ARRAY: Oid = Oid(1009);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const NUMERIC: Oid = Oid(1700);
    pub const REGTYPE: Oid = Oid(2206);
    pub const REGTYPE_ARRAY: Oid = Oid(2211);
    pub const UUID: Oid = Oid(2950);
}

/// A typed, non-null value as the host passes it around.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// Arbitrary precision number kept in its decimal text form.
    Numeric(String),
    Text(String),
    Bytea(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Oid(Oid),
    RegType(Oid),
    TextArray(Vec<Option<String>>),
    RegTypeArray(Vec<Oid>),
}

impl Datum {
    /// The type a value of this variant carries when no type was declared.
    pub fn natural_type(&self) -> Oid {
        match self {
            Datum::Bool(_) => type_oid::BOOL,
            Datum::Int2(_) => type_oid::INT2,
            Datum::Int4(_) => type_oid::INT4,
            Datum::Int8(_) => type_oid::INT8,
            Datum::Float4(_) => type_oid::FLOAT4,
            Datum::Float8(_) => type_oid::FLOAT8,
            Datum::Numeric(_) => type_oid::NUMERIC,
            Datum::Text(_) => type_oid::TEXT,
            Datum::Bytea(_) => type_oid::BYTEA,
            Datum::Date(_) => type_oid::DATE,
            Datum::Timestamp(_) => type_oid::TIMESTAMP,
            Datum::TimestampTz(_) => type_oid::TIMESTAMPTZ,
            Datum::Uuid(_) => type_oid::UUID,
            Datum::Json(_) => type_oid::JSON,
            Datum::Oid(_) => type_oid::OID,
            Datum::RegType(_) => type_oid::REGTYPE,
            Datum::TextArray(_) => type_oid::TEXT_ARRAY,
            Datum::RegTypeArray(_) => type_oid::REGTYPE_ARRAY,
        }
    }
}

/// One bound parameter: its declared type and its value, `None` for SQL NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub ptype: Oid,
    pub value: Option<Datum>,
}

impl Param {
    pub fn new(ptype: Oid, value: Datum) -> Self {
        Self { ptype, value: Some(value) }
    }

    pub fn null(ptype: Oid) -> Self {
        Self { ptype, value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

impl From<Datum> for Param {
    fn from(value: Datum) -> Self {
        Self {
            ptype: value.natural_type(),
            value: Some(value),
        }
    }
}

/// Positional parameters bound to one statement execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }
}

impl FromIterator<Param> for ParamList {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ParamList {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Top-level operation of a statement. Discriminants are the values stored
/// in the log table's command type column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum CmdType {
    Unknown = 0,
    Select = 1,
    Update = 2,
    Insert = 3,
    Delete = 4,
    Utility = 5,
    Nothing = 6,
}

impl CmdType {
    pub const ALL: [CmdType; 7] = [
        CmdType::Unknown,
        CmdType::Select,
        CmdType::Update,
        CmdType::Insert,
        CmdType::Delete,
        CmdType::Utility,
        CmdType::Nothing,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    /// Codes outside the known range decode as `Unknown`.
    pub fn from_id(id: i32) -> CmdType {
        CmdType::ALL
            .get(usize::try_from(id).unwrap_or(usize::MAX))
            .copied()
            .unwrap_or(CmdType::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            CmdType::Unknown => "UNKNOWN",
            CmdType::Select => "SELECT",
            CmdType::Update => "UPDATE",
            CmdType::Insert => "INSERT",
            CmdType::Delete => "DELETE",
            CmdType::Utility => "UTILITY",
            CmdType::Nothing => "NOTHING",
        }
    }

    /// Everything except a plain SELECT counts as modifying.
    pub fn is_modify(self) -> bool {
        self != CmdType::Select
    }
}

impl fmt::Display for CmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
