//! Synthesise the SpatiaLite statements that materialise a layer.
//!
//! Identifiers derived from layer and field names are double-quote escaped.
//! Attribute values and WKT travel as bound parameters, so no value is ever
//! spliced into statement text.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{FieldDefinition, FieldTypeError, GeometryLiteral, GeometryType, PolylineMode};

/// Name of the geometry column added to every layer table.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Errors raised while synthesising statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    /// A field type has no column mapping.
    #[error(transparent)]
    FieldType(#[from] FieldTypeError),
    /// The layer declared no fields, so no table can be created.
    #[error("layer {table:?} declares no fields")]
    NoFields {
        /// Target table name.
        table: String,
    },
}

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
}

impl SqlValue {
    /// Convert a JSON attribute value into a bindable value.
    ///
    /// Strings lose any embedded double quote characters. Arrays and objects
    /// are stored as their JSON text.
    #[must_use]
    pub fn from_attribute(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Integer(i64::from(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Real))
                .unwrap_or_else(|| Self::Text(number.to_string())),
            Value::String(text) => Self::Text(strip_quotes(text)),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// Statement text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text using `?N` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// Statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Quote an identifier for SQLite, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use mapharvest_core::sql::quote_identifier;
///
/// assert_eq!(quote_identifier(r#"say "hi""#), r#""say ""hi""""#);
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Remove double quote characters from a string value.
#[must_use]
pub fn strip_quotes(text: &str) -> String {
    text.replace('"', "")
}

/// `CREATE TABLE IF NOT EXISTS` with one typed column per field.
pub fn create_table(table: &str, fields: &[FieldDefinition]) -> Result<SqlStatement, StatementError> {
    if fields.is_empty() {
        return Err(StatementError::NoFields {
            table: table.to_owned(),
        });
    }
    let columns = fields
        .iter()
        .map(|field| {
            field
                .column_type()
                .map(|column| format!("{} {column}", quote_identifier(&field.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SqlStatement::new(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        columns.join(", ")
    )))
}

/// `AddGeometryColumn` call registering the `geometry` column as `XY`.
#[must_use]
pub fn add_geometry_column(
    table: &str,
    srid: i64,
    geometry_type: GeometryType,
    mode: PolylineMode,
) -> SqlStatement {
    SqlStatement {
        sql: "SELECT AddGeometryColumn(?1, ?2, ?3, ?4, 'XY')".to_owned(),
        params: vec![
            SqlValue::Text(table.to_owned()),
            SqlValue::Text(GEOMETRY_COLUMN.to_owned()),
            SqlValue::Integer(srid),
            SqlValue::Text(geometry_type.column_type(mode).to_owned()),
        ],
    }
}

/// `INSERT` for one feature: every attribute plus the geometry column.
///
/// A missing geometry is stored as `NULL`.
#[must_use]
pub fn insert_feature(
    table: &str,
    attributes: &Map<String, Value>,
    geometry: Option<&GeometryLiteral>,
) -> SqlStatement {
    let mut columns = Vec::with_capacity(attributes.len() + 1);
    let mut placeholders = Vec::with_capacity(attributes.len() + 1);
    let mut params = Vec::with_capacity(attributes.len() + 2);

    for (name, value) in attributes {
        params.push(SqlValue::from_attribute(value));
        columns.push(quote_identifier(name));
        placeholders.push(format!("?{}", params.len()));
    }

    columns.push(quote_identifier(GEOMETRY_COLUMN));
    match geometry {
        Some(literal) => {
            params.push(SqlValue::Text(literal.wkt.clone()));
            params.push(SqlValue::Integer(literal.srid));
            placeholders.push(format!(
                "GeometryFromText(?{}, ?{})",
                params.len() - 1,
                params.len()
            ));
        }
        None => placeholders.push("NULL".to_owned()),
    }

    SqlStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    }
}
