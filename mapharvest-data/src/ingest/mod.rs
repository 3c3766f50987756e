//! Materialise fetched feature pages as SpatiaLite tables.
//!
//! [`ingest_layer`] turns the pages of one layer into a table: the schema
//! comes from the first page, every feature becomes one row, and the whole
//! layer is written inside a single transaction. Statements run through
//! [`SpatialDatabase`], implemented for SQLite by [`SpatialiteDatabase`].

mod sqlite;

use log::{debug, info, warn};
use mapharvest_core::geometry::convert;
use mapharvest_core::sql::{add_geometry_column, create_table, insert_feature};
use mapharvest_core::{
    FeaturePage, GeometryError, GeometryLiteral, GeometryType, PolylineMode, SqlStatement,
    StatementError,
};
use rusqlite::Error as SqliteError;
use serde_json::Value;
use thiserror::Error;

pub use sqlite::{DEFAULT_SPATIALITE_EXTENSION, OpenDatabaseError, SpatialiteConfig, SpatialiteDatabase};

/// A statement the database rejected.
#[derive(Debug, Error)]
#[error("failed to execute {sql:?}")]
pub struct DatabaseError {
    /// SQL text of the rejected statement.
    pub sql: String,
    /// Source error returned by `rusqlite`.
    #[source]
    pub source: SqliteError,
}

/// Store able to run the statements produced for a layer.
pub trait SpatialDatabase {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the store refuses the transaction.
    fn begin(&mut self) -> Result<(), DatabaseError>;

    /// Run a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the statement fails.
    fn execute(&mut self, statement: &SqlStatement) -> Result<(), DatabaseError>;

    /// Run a statement and read the integer in its first column, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the statement fails.
    fn query_integer(&mut self, statement: &SqlStatement) -> Result<Option<i64>, DatabaseError>;

    /// Commit the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the commit fails.
    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Roll back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the rollback fails.
    fn rollback(&mut self) -> Result<(), DatabaseError>;
}

/// Knobs applied while writing a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// How polylines with several paths are stored.
    pub polyline_mode: PolylineMode,
}

/// Errors raised while writing a layer.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The schema could not be synthesised.
    #[error("failed to build schema for {table}")]
    Statement {
        /// Target table.
        table: String,
        /// Underlying synthesis error.
        #[source]
        source: StatementError,
    },
    /// A geometry could not be converted.
    #[error("failed to convert geometry for {table}")]
    Geometry {
        /// Target table.
        table: String,
        /// Underlying conversion error.
        #[source]
        source: GeometryError,
    },
    /// The first page carries a geometry type but no spatial reference.
    #[error("layer {table} declares no spatial reference")]
    MissingSpatialReference {
        /// Target table.
        table: String,
    },
    /// The database rejected a statement.
    #[error("failed to write {table}")]
    Database {
        /// Target table.
        table: String,
        /// Underlying database error.
        #[source]
        source: DatabaseError,
    },
}

/// Result of writing one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Table the layer was written to.
    pub table: String,
    /// Geometry type declared by the first page.
    pub geometry_type: GeometryType,
    /// SRID registered for the geometry column.
    pub srid: i64,
    /// Rows inserted.
    pub rows: usize,
}

/// Write the pages of one layer into table `name`.
///
/// The first page supplies the geometry type, spatial reference and field
/// definitions. Pages without a geometry type are non-spatial tables and are
/// skipped, as is an empty page list; both return `Ok(None)`.
///
/// Within one transaction the writer creates the table if missing, registers
/// the `geometry` column, then inserts one row per feature. A failure rolls
/// the transaction back so a layer is either fully written or untouched.
/// Features with an empty geometry are stored with a `NULL` geometry.
///
/// # Errors
///
/// Returns [`IngestError`] when the schema cannot be synthesised, a geometry
/// is malformed, or the database rejects a statement.
pub fn ingest_layer<D>(
    name: &str,
    pages: &[FeaturePage],
    database: &mut D,
    options: IngestOptions,
) -> Result<Option<IngestSummary>, IngestError>
where
    D: SpatialDatabase + ?Sized,
{
    let Some(first) = pages.first() else {
        debug!("{name}: no pages to ingest");
        return Ok(None);
    };
    let Some(tag) = first.geometry_type.as_deref() else {
        info!("{name}: no geometry type; skipping non-spatial layer");
        return Ok(None);
    };

    let geometry_type: GeometryType = tag.parse().map_err(|source| IngestError::Geometry {
        table: name.to_owned(),
        source,
    })?;
    let srid = first
        .spatial_reference
        .and_then(|reference| reference.srid())
        .ok_or_else(|| IngestError::MissingSpatialReference {
            table: name.to_owned(),
        })?;
    let create = create_table(name, &first.fields).map_err(|source| IngestError::Statement {
        table: name.to_owned(),
        source,
    })?;
    let register = add_geometry_column(name, srid, geometry_type, options.polyline_mode);

    let writer = LayerWriter {
        table: name,
        geometry_type,
        srid,
        mode: options.polyline_mode,
    };

    database.begin().map_err(|source| writer.database_error(source))?;
    let outcome = writer
        .write(database, &create, &register, pages)
        .and_then(|rows| {
            database
                .commit()
                .map(|()| rows)
                .map_err(|source| writer.database_error(source))
        });
    // A failed COMMIT leaves the transaction open, so it is rolled back too.
    let rows = match outcome {
        Ok(rows) => rows,
        Err(err) => {
            if let Err(rollback) = database.rollback() {
                warn!("{name}: rollback failed: {rollback}");
            }
            return Err(err);
        }
    };

    info!("{name}: inserted {rows} rows ({geometry_type}, SRID {srid})");
    Ok(Some(IngestSummary {
        table: name.to_owned(),
        geometry_type,
        srid,
        rows,
    }))
}

struct LayerWriter<'a> {
    table: &'a str,
    geometry_type: GeometryType,
    srid: i64,
    mode: PolylineMode,
}

impl LayerWriter<'_> {
    fn write<D: SpatialDatabase + ?Sized>(
        &self,
        database: &mut D,
        create: &SqlStatement,
        register: &SqlStatement,
        pages: &[FeaturePage],
    ) -> Result<usize, IngestError> {
        database
            .execute(create)
            .map_err(|source| self.database_error(source))?;
        let registered = database
            .query_integer(register)
            .map_err(|source| self.database_error(source))?;
        if registered == Some(0) {
            warn!(
                "{}: AddGeometryColumn returned 0; the column may already exist",
                self.table
            );
        }

        let mut rows = 0;
        for feature in pages.iter().flat_map(|page| &page.features) {
            let literal = self.literal(feature.geometry.as_ref())?;
            let statement = insert_feature(self.table, &feature.attributes, literal.as_ref());
            database
                .execute(&statement)
                .map_err(|source| self.database_error(source))?;
            rows += 1;
        }
        Ok(rows)
    }

    fn literal(&self, geometry: Option<&Value>) -> Result<Option<GeometryLiteral>, IngestError> {
        let Some(encoded) = geometry.filter(|value| !value.is_null()) else {
            return Ok(None);
        };
        match convert(self.geometry_type, encoded, self.srid, self.mode) {
            Ok(literal) => Ok(Some(literal)),
            Err(GeometryError::Empty { .. }) => {
                debug!("{}: empty {} stored as NULL", self.table, self.geometry_type);
                Ok(None)
            }
            Err(source) => Err(IngestError::Geometry {
                table: self.table.to_owned(),
                source,
            }),
        }
    }

    fn database_error(&self, source: DatabaseError) -> IngestError {
        IngestError::Database {
            table: self.table.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DatabaseEvent, RecordingDatabase};
    use mapharvest_core::{Feature, FieldDefinition, SpatialReference, SqlValue};
    use rstest::{fixture, rstest};
    use serde_json::{Map, json};

    fn attributes(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[fixture]
    fn point_page() -> FeaturePage {
        FeaturePage {
            geometry_type: Some("esriGeometryPoint".to_owned()),
            spatial_reference: Some(SpatialReference {
                wkid: Some(3003),
                latest_wkid: None,
            }),
            fields: vec![
                FieldDefinition::new("OBJECTID", "esriFieldTypeOID"),
                FieldDefinition::new("NOME", "esriFieldTypeString"),
            ],
            features: vec![
                Feature {
                    attributes: attributes(json!({ "OBJECTID": 1, "NOME": "Pozzo \"A\"" })),
                    geometry: Some(json!({ "x": 1.5, "y": 2.5 })),
                },
                Feature {
                    attributes: attributes(json!({ "OBJECTID": 2, "NOME": "B" })),
                    geometry: None,
                },
            ],
        }
    }

    #[rstest]
    fn writes_schema_then_rows_in_one_transaction(point_page: FeaturePage) {
        let mut database = RecordingDatabase::new();
        let summary = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect("ingestion succeeds")
            .expect("layer is spatial");
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.srid, 3003);

        let events = database.events();
        assert!(matches!(events.first(), Some(DatabaseEvent::Begin)));
        assert!(matches!(&events[1], DatabaseEvent::Execute(s) if s.sql.starts_with("CREATE TABLE IF NOT EXISTS \"pozzi\"")));
        assert!(matches!(&events[2], DatabaseEvent::Query(s) if s.sql.contains("AddGeometryColumn")));
        assert!(matches!(&events[3], DatabaseEvent::Execute(s) if s.sql.starts_with("INSERT")));
        assert!(matches!(&events[4], DatabaseEvent::Execute(s) if s.sql.ends_with("NULL)")));
        assert!(matches!(events.last(), Some(DatabaseEvent::Commit)));
        assert_eq!(events.len(), 6);
    }

    #[rstest]
    fn string_values_lose_double_quotes(point_page: FeaturePage) {
        let mut database = RecordingDatabase::new();
        ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect("ingestion succeeds");
        let insert = database
            .statements()
            .into_iter()
            .find(|s| s.sql.starts_with("INSERT"))
            .expect("an insert ran");
        assert!(insert.params.contains(&SqlValue::Text("Pozzo A".to_owned())));
        assert!(insert.params.contains(&SqlValue::Text("POINT(1.5 2.5)".to_owned())));
    }

    #[rstest]
    fn rows_span_every_page(point_page: FeaturePage) {
        let second = FeaturePage {
            features: vec![Feature {
                attributes: attributes(json!({ "OBJECTID": 1001, "NOME": "C" })),
                geometry: Some(json!({ "x": 0.0, "y": 0.0 })),
            }],
            ..FeaturePage::default()
        };
        let mut database = RecordingDatabase::new();
        let summary = ingest_layer("pozzi", &[point_page, second], &mut database, IngestOptions::default())
            .expect("ingestion succeeds")
            .expect("layer is spatial");
        assert_eq!(summary.rows, 3);
        let commits = database
            .events()
            .iter()
            .filter(|event| matches!(event, DatabaseEvent::Commit))
            .count();
        assert_eq!(commits, 1);
    }

    #[rstest]
    fn non_spatial_pages_are_skipped() {
        let page = FeaturePage {
            fields: vec![FieldDefinition::new("A", "esriFieldTypeString")],
            ..FeaturePage::default()
        };
        let mut database = RecordingDatabase::new();
        let outcome = ingest_layer("tabella", &[page], &mut database, IngestOptions::default())
            .expect("skip is not an error");
        assert!(outcome.is_none());
        assert!(database.events().is_empty());
    }

    #[rstest]
    fn unknown_field_type_fails_before_writing(mut point_page: FeaturePage) {
        point_page
            .fields
            .push(FieldDefinition::new("GUID", "esriFieldTypeGUID"));
        let mut database = RecordingDatabase::new();
        let err = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect_err("GUID is unmapped");
        assert!(matches!(err, IngestError::Statement { .. }));
        assert!(database.events().is_empty());
    }

    #[rstest]
    fn failed_insert_rolls_back(point_page: FeaturePage) {
        let mut database = RecordingDatabase::failing_on("INSERT");
        let err = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect_err("insert fails");
        assert!(matches!(err, IngestError::Database { .. }));
        let events = database.events();
        assert!(matches!(events.last(), Some(DatabaseEvent::Rollback)));
        assert!(!events.iter().any(|event| matches!(event, DatabaseEvent::Commit)));
    }

    #[rstest]
    fn failed_commit_rolls_back(point_page: FeaturePage) {
        let mut database = RecordingDatabase::failing_commit();
        let err = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect_err("commit fails");
        assert!(matches!(err, IngestError::Database { .. }));
        let tail: Vec<&DatabaseEvent> = database.events().iter().rev().take(2).collect();
        assert!(matches!(
            tail.as_slice(),
            [DatabaseEvent::Rollback, DatabaseEvent::Commit]
        ));
    }

    #[rstest]
    fn malformed_geometry_fails_the_layer(mut point_page: FeaturePage) {
        point_page.features[0].geometry = Some(json!({ "paths": [] }));
        let mut database = RecordingDatabase::new();
        let err = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect_err("point without x/y");
        assert!(matches!(err, IngestError::Geometry { .. }));
        assert!(matches!(database.events().last(), Some(DatabaseEvent::Rollback)));
    }

    #[rstest]
    fn missing_spatial_reference_is_reported(mut point_page: FeaturePage) {
        point_page.spatial_reference = None;
        let mut database = RecordingDatabase::new();
        let err = ingest_layer("pozzi", &[point_page], &mut database, IngestOptions::default())
            .expect_err("no SRID");
        assert!(matches!(err, IngestError::MissingSpatialReference { .. }));
    }
}
