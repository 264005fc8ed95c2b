//! Row decoding for query results.
//!
//! Rows are returned to callers as JSON maps so that results coming from the read
//! pool and the write pool have the same shape whatever the vendor.
//!
//! Decoding happens in two steps: the column's declared type is mapped to a
//! [`TypeCategory`], then a vendor-specific decoder extracts the value.

use crate::models::{DatabaseType, JsonRow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Uuid,
    Timestamp,
    Date,
    Time,
    Text,
}

/// Classify a vendor type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();

    match lower.as_str() {
        // SQLite's NUMERIC affinity stores floats
        "numeric" if db == DatabaseType::SQLite => return TypeCategory::Float,
        "bool" | "boolean" => return TypeCategory::Boolean,
        "json" | "jsonb" => return TypeCategory::Json,
        "uuid" => return TypeCategory::Uuid,
        "date" => return TypeCategory::Date,
        "time" | "timetz" => return TypeCategory::Time,
        "real" | "float4" | "float8" => return TypeCategory::Float,
        _ => {}
    }

    if lower.contains("decimal") || lower.contains("numeric") {
        TypeCategory::Decimal
    } else if lower.contains("int") || lower.contains("serial") {
        TypeCategory::Integer
    } else if lower.contains("float") || lower.contains("double") {
        TypeCategory::Float
    } else if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        TypeCategory::Binary
    } else if lower.starts_with("timestamp") || lower == "datetime" {
        TypeCategory::Timestamp
    } else {
        TypeCategory::Text
    }
}

/// DECIMAL/NUMERIC carried as its exact textual representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        matches!(categorize_type(ty.name(), DatabaseType::MySQL), TypeCategory::Decimal)
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <&str as Decode<sqlx::MySql>>::decode(value).map(|s| RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(
            categorize_type(ty.name(), DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        )
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <&str as Decode<sqlx::Postgres>>::decode(value).map(|s| RawDecimal(s.to_string()))
    }
}

/// Binary values are returned base64 encoded.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Try each Rust type in turn and convert the first non-null success.
///
/// sqlx checks type compatibility strictly, so integer columns must be read with
/// the exact width the server reports.
macro_rules! first_decoded {
    ($row:expr, $idx:expr, $convert:expr, [$($ty:ty),+ $(,)?]) => {{
        let mut value = JsonValue::Null;
        $(
            if value.is_null() {
                if let Ok(Some(v)) = $row.try_get::<Option<$ty>, _>($idx) {
                    value = $convert(v);
                }
            }
        )+
        value
    }};
}

/// Conversion of driver rows into [`JsonRow`].
pub trait RowToJson {
    fn to_json_row(&self) -> JsonRow;
}

impl RowToJson for MySqlRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let category =
                    categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                (col.name().to_string(), postgres::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), sqlite::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => first_decoded!(
                row,
                idx,
                JsonValue::from,
                [i64, i32, i16, i8, u64, u32, u16, u8]
            ),
            TypeCategory::Decimal => {
                first_decoded!(row, idx, |v: RawDecimal| JsonValue::String(v.0), [RawDecimal])
            }
            TypeCategory::Float => first_decoded!(
                row,
                idx,
                |v: f64| float_value(v),
                [f64]
            ),
            TypeCategory::Boolean => first_decoded!(row, idx, JsonValue::Bool, [bool]),
            TypeCategory::Binary => {
                first_decoded!(row, idx, |v: Vec<u8>| encode_binary(&v), [Vec<u8>])
            }
            TypeCategory::Json => first_decoded!(row, idx, |v: JsonValue| v, [JsonValue]),
            TypeCategory::Timestamp => first_decoded!(
                row,
                idx,
                |v: NaiveDateTime| JsonValue::String(v.to_string()),
                [NaiveDateTime]
            ),
            TypeCategory::Date => first_decoded!(
                row,
                idx,
                |v: NaiveDate| JsonValue::String(v.to_string()),
                [NaiveDate]
            ),
            TypeCategory::Time => first_decoded!(
                row,
                idx,
                |v: NaiveTime| JsonValue::String(v.to_string()),
                [NaiveTime]
            ),
            TypeCategory::Uuid | TypeCategory::Text => {
                first_decoded!(row, idx, JsonValue::String, [String])
            }
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => first_decoded!(row, idx, JsonValue::from, [i64, i32, i16]),
            TypeCategory::Decimal => {
                first_decoded!(row, idx, |v: RawDecimal| JsonValue::String(v.0), [RawDecimal])
            }
            TypeCategory::Float => first_decoded!(
                row,
                idx,
                |v: f64| float_value(v),
                [f64]
            ),
            TypeCategory::Boolean => first_decoded!(row, idx, JsonValue::Bool, [bool]),
            TypeCategory::Binary => {
                first_decoded!(row, idx, |v: Vec<u8>| encode_binary(&v), [Vec<u8>])
            }
            TypeCategory::Json => first_decoded!(row, idx, |v: JsonValue| v, [JsonValue]),
            TypeCategory::Timestamp => {
                let value = first_decoded!(
                    row,
                    idx,
                    |v: DateTime<Utc>| JsonValue::String(v.to_rfc3339()),
                    [DateTime<Utc>]
                );
                if value.is_null() {
                    first_decoded!(
                        row,
                        idx,
                        |v: NaiveDateTime| JsonValue::String(v.to_string()),
                        [NaiveDateTime]
                    )
                } else {
                    value
                }
            }
            TypeCategory::Date => first_decoded!(
                row,
                idx,
                |v: NaiveDate| JsonValue::String(v.to_string()),
                [NaiveDate]
            ),
            TypeCategory::Time => first_decoded!(
                row,
                idx,
                |v: NaiveTime| JsonValue::String(v.to_string()),
                [NaiveTime]
            ),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::Text => first_decoded!(row, idx, JsonValue::String, [String]),
        }
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> JsonValue {
        first_decoded!(
            row,
            idx,
            |v: sqlx::types::Uuid| JsonValue::String(v.to_string()),
            [sqlx::types::Uuid]
        )
    }
}

mod sqlite {
    use super::*;

    pub fn decode(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => first_decoded!(row, idx, JsonValue::from, [i64]),
            TypeCategory::Boolean => first_decoded!(row, idx, JsonValue::Bool, [bool]),
            TypeCategory::Float | TypeCategory::Decimal => first_decoded!(
                row,
                idx,
                |v: f64| float_value(v),
                [f64]
            ),
            TypeCategory::Binary => {
                first_decoded!(row, idx, |v: Vec<u8>| encode_binary(&v), [Vec<u8>])
            }
            _ => decode_text(row, idx),
        }
    }

    /// SQLite columns without a declared type report their runtime storage class.
    fn decode_text(row: &SqliteRow, idx: usize) -> JsonValue {
        let value = first_decoded!(row, idx, JsonValue::String, [String]);
        if !value.is_null() {
            return value;
        }
        first_decoded!(row, idx, JsonValue::from, [i64])
    }
}
