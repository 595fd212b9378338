//! Column-ordered result rows and their cell values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo};

/// A single cell as returned by the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::UInt(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// One result row: column name to value, in select-list order.
///
/// Serializes as a JSON object whose keys keep the column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell, replacing any earlier cell of the same name in place.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Decode a MySQL row into a [`Row`], choosing the Rust type from the column's SQL type.
pub fn decode_row(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = decode_cell(row, index, column.type_info().name())?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

/// How a column's cells are read, chosen from its SQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    Decimal,
    Date,
    DateTime,
    Time,
    Json,
    Bytes,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        "NULL" => ColumnKind::Null,
        "BOOLEAN" => ColumnKind::Bool,
        "YEAR" => ColumnKind::Year,
        name if name.ends_with("UNSIGNED") => ColumnKind::Unsigned,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
        "FLOAT" => ColumnKind::Float,
        "DOUBLE" => ColumnKind::Double,
        "DECIMAL" => ColumnKind::Decimal,
        "DATE" => ColumnKind::Date,
        "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
        "TIME" => ColumnKind::Time,
        "JSON" => ColumnKind::Json,
        // Binary payloads, including WKB geometry, never decode as UTF-8 text.
        name if name.contains("BLOB")
            || name.contains("BINARY")
            || name == "BIT"
            || name == "GEOMETRY" =>
        {
            ColumnKind::Bytes
        }
        _ => ColumnKind::Text,
    }
}

fn decode_cell(row: &MySqlRow, index: usize, type_name: &str) -> Result<CellValue, sqlx::Error> {
    let value = match column_kind(type_name) {
        ColumnKind::Null => None,
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(index)?.map(CellValue::Bool),
        ColumnKind::Unsigned => row.try_get::<Option<u64>, _>(index)?.map(CellValue::UInt),
        ColumnKind::Year => row
            .try_get::<Option<u16>, _>(index)?
            .map(|year| CellValue::UInt(u64::from(year))),
        ColumnKind::Signed => row.try_get::<Option<i64>, _>(index)?.map(CellValue::Int),
        ColumnKind::Float => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| CellValue::Float(f64::from(v))),
        ColumnKind::Double => row.try_get::<Option<f64>, _>(index)?.map(CellValue::Float),
        // DECIMAL travels as its decimal text in both wire formats.
        ColumnKind::Decimal => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map(|text| match text.parse::<f64>() {
                Ok(v) => CellValue::Float(v),
                Err(_) => CellValue::Text(text),
            }),
        ColumnKind::Date => row.try_get::<Option<NaiveDate>, _>(index)?.map(CellValue::Date),
        ColumnKind::DateTime => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(CellValue::DateTime),
        ColumnKind::Time => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|t| CellValue::Text(t.to_string())),
        ColumnKind::Json => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(CellValue::Json),
        ColumnKind::Bytes => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
            .map(|bytes| CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())),
        ColumnKind::Text => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map(CellValue::Text),
    };
    Ok(value.unwrap_or(CellValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new()
            .with("period", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .with("cy_revenue", 1234.5)
            .with("chain", "Customer A")
            .with("store_count", CellValue::Null);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"period":"2024-01-01","cy_revenue":1234.5,"chain":"Customer A","store_count":null}"#
        );
    }

    #[test]
    fn test_push_replaces_existing_column() {
        let mut row = Row::new().with("a", 1i64);
        row.push("a", 2i64);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("a"), Some(&CellValue::Int(2)));
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(CellValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::UInt(4).as_f64(), Some(4.0));
        assert_eq!(CellValue::from("3").as_f64(), None);
        assert!(CellValue::from(None::<f64>).is_null());
    }

    #[test]
    fn test_column_kind_by_type_name() {
        assert_eq!(column_kind("YEAR"), ColumnKind::Year);
        assert_eq!(column_kind("GEOMETRY"), ColumnKind::Bytes);
        assert_eq!(column_kind("LONGBLOB"), ColumnKind::Bytes);
        assert_eq!(column_kind("VARBINARY"), ColumnKind::Bytes);
        assert_eq!(column_kind("INT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("BIGINT"), ColumnKind::Signed);
        assert_eq!(column_kind("BOOLEAN"), ColumnKind::Bool);
        assert_eq!(column_kind("DECIMAL"), ColumnKind::Decimal);
        assert_eq!(column_kind("TIMESTAMP"), ColumnKind::DateTime);
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("ENUM"), ColumnKind::Text);
    }
}
