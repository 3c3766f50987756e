//! Map service field types onto SQLite column types.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned when a field type has no column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldTypeError {
    /// The service reported a field type outside the mapping table.
    #[error("unknown field type {tag:?}")]
    UnknownFieldType {
        /// Tag as reported by the service.
        tag: String,
    },
}

/// Field types a layer may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `esriFieldTypeString`.
    String,
    /// `esriFieldTypeSmallInteger` (16 bit).
    SmallInteger,
    /// `esriFieldTypeInteger` (32 bit).
    Integer,
    /// `esriFieldTypeSingle` (32 bit float).
    Single,
    /// `esriFieldTypeDouble` (64 bit float).
    Double,
    /// `esriFieldTypeDate`, reported as epoch milliseconds.
    Date,
    /// `esriFieldTypeOID`, the object identifier used for paging.
    ObjectId,
}

impl FieldType {
    /// Every mapped field type.
    pub const ALL: [Self; 7] = [
        Self::String,
        Self::SmallInteger,
        Self::Integer,
        Self::Single,
        Self::Double,
        Self::Date,
        Self::ObjectId,
    ];

    /// Tag used by the service.
    #[must_use]
    pub const fn esri_tag(self) -> &'static str {
        match self {
            Self::String => "esriFieldTypeString",
            Self::SmallInteger => "esriFieldTypeSmallInteger",
            Self::Integer => "esriFieldTypeInteger",
            Self::Single => "esriFieldTypeSingle",
            Self::Double => "esriFieldTypeDouble",
            Self::Date => "esriFieldTypeDate",
            Self::ObjectId => "esriFieldTypeOID",
        }
    }

    /// Column type used for this field.
    #[must_use]
    pub const fn column_type(self) -> ColumnType {
        match self {
            Self::String => ColumnType::Text,
            Self::SmallInteger | Self::Integer | Self::ObjectId => ColumnType::Integer,
            Self::Single | Self::Double => ColumnType::Real,
            Self::Date => ColumnType::Timestamp,
        }
    }
}

impl FromStr for FieldType {
    type Err = FieldTypeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field_type| field_type.esri_tag() == tag)
            .ok_or_else(|| FieldTypeError::UnknownFieldType {
                tag: tag.to_owned(),
            })
    }
}

/// SQLite column types produced by the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `text`.
    Text,
    /// `integer`.
    Integer,
    /// `real`.
    Real,
    /// `timestamp`.
    Timestamp,
}

impl ColumnType {
    /// SQL spelling of the column type.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Look up the column type for a service field type tag.
///
/// # Examples
///
/// ```
/// use mapharvest_core::{ColumnType, fields::map_type};
///
/// assert_eq!(map_type("esriFieldTypeOID")?, ColumnType::Integer);
/// assert!(map_type("esriFieldTypeBlob").is_err());
/// # Ok::<(), mapharvest_core::fields::FieldTypeError>(())
/// ```
pub fn map_type(tag: &str) -> Result<ColumnType, FieldTypeError> {
    tag.parse::<FieldType>().map(FieldType::column_type)
}

/// One attribute column declared by a layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldDefinition {
    /// Column name.
    pub name: String,
    /// Raw field type tag, e.g. `esriFieldTypeString`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Human-readable alias, when the service provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl FieldDefinition {
    /// Construct a definition from a name and a raw type tag.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            alias: None,
        }
    }

    /// Column type for this field.
    pub fn column_type(&self) -> Result<ColumnType, FieldTypeError> {
        map_type(&self.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("esriFieldTypeString", ColumnType::Text)]
    #[case("esriFieldTypeSmallInteger", ColumnType::Integer)]
    #[case("esriFieldTypeInteger", ColumnType::Integer)]
    #[case("esriFieldTypeOID", ColumnType::Integer)]
    #[case("esriFieldTypeSingle", ColumnType::Real)]
    #[case("esriFieldTypeDouble", ColumnType::Real)]
    #[case("esriFieldTypeDate", ColumnType::Timestamp)]
    fn maps_every_listed_type(#[case] tag: &str, #[case] expected: ColumnType) {
        assert_eq!(map_type(tag), Ok(expected));
    }

    #[rstest]
    #[case("esriFieldTypeGlobalID")]
    #[case("esriFieldTypeGeometry")]
    #[case("esrifieldtypestring")]
    #[case("")]
    fn unlisted_types_fail(#[case] tag: &str) {
        assert_eq!(
            map_type(tag),
            Err(FieldTypeError::UnknownFieldType {
                tag: tag.to_owned()
            })
        );
    }

    #[rstest]
    fn every_variant_round_trips_through_its_tag() {
        for field_type in FieldType::ALL {
            assert_eq!(field_type.esri_tag().parse::<FieldType>(), Ok(field_type));
        }
    }

    #[rstest]
    fn deserialises_service_field() {
        let field: FieldDefinition = serde_json::from_str(
            r#"{ "name": "NOME", "type": "esriFieldTypeString", "alias": "Nome", "length": 50 }"#,
        )
        .expect("field deserialises");
        assert_eq!(field.name, "NOME");
        assert_eq!(field.alias.as_deref(), Some("Nome"));
        assert_eq!(field.column_type(), Ok(ColumnType::Text));
    }
}
