//! SQLite store with the SpatiaLite extension loaded.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::{debug, info};
use mapharvest_core::{SqlStatement, SqlValue};
use rusqlite::types::Value as SqliteValue;
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, params_from_iter};
use thiserror::Error;

use super::{DatabaseError, SpatialDatabase};

/// Extension name passed to `load_extension` by default.
pub const DEFAULT_SPATIALITE_EXTENSION: &str = "mod_spatialite";

/// Errors raised while opening a SpatiaLite database.
#[derive(Debug, Error)]
pub enum OpenDatabaseError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        /// Path of the directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The SpatiaLite extension could not be loaded.
    #[error("failed to load SQLite extension {extension:?}")]
    LoadExtension {
        /// Extension name or path.
        extension: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the spatial metadata tables failed.
    #[error("failed to initialise spatial metadata")]
    InitialiseMetadata {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Settings for [`SpatialiteDatabase::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialiteConfig {
    /// Extension name or path handed to SQLite's loader.
    pub extension: String,
}

impl Default for SpatialiteConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_SPATIALITE_EXTENSION.to_owned(),
        }
    }
}

/// [`SpatialDatabase`] over a `rusqlite` connection.
#[derive(Debug)]
pub struct SpatialiteDatabase {
    connection: Connection,
}

impl SpatialiteDatabase {
    /// Open (or create) the database at `path` with SpatiaLite loaded.
    ///
    /// Parent directories are created automatically. Spatial metadata is
    /// initialised when the file does not carry it yet.
    ///
    /// # Errors
    ///
    /// Returns [`OpenDatabaseError`] naming the step that failed.
    pub fn open(path: &Utf8Path, config: &SpatialiteConfig) -> Result<Self, OpenDatabaseError> {
        ensure_parent_dir(path)?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| OpenDatabaseError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        load_spatialite(&connection, &config.extension).map_err(|source| {
            OpenDatabaseError::LoadExtension {
                extension: config.extension.clone(),
                source,
            }
        })?;
        let database = Self::from_connection(connection);
        database.initialise_metadata()?;
        info!("opened spatial database {path}");
        Ok(database)
    }

    /// Wrap an already configured connection.
    ///
    /// No extension is loaded; the connection must provide
    /// `AddGeometryColumn` and `GeometryFromText` itself.
    #[must_use]
    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// Run `InitSpatialMetadata(1)` unless metadata is already present.
    ///
    /// # Errors
    ///
    /// Returns [`OpenDatabaseError::InitialiseMetadata`] when either check or
    /// initialisation fails.
    pub fn initialise_metadata(&self) -> Result<(), OpenDatabaseError> {
        let layout: i64 = self
            .connection
            .query_row("SELECT CheckSpatialMetaData()", [], |row| row.get(0))
            .map_err(|source| OpenDatabaseError::InitialiseMetadata { source })?;
        if layout != 0 {
            debug!("spatial metadata already present (layout {layout})");
            return Ok(());
        }
        self.connection
            .query_row("SELECT InitSpatialMetadata(1)", [], |_| Ok(()))
            .map_err(|source| OpenDatabaseError::InitialiseMetadata { source })?;
        info!("initialised spatial metadata");
        Ok(())
    }

    /// Underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn run_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        self.connection
            .execute_batch(sql)
            .map_err(|source| DatabaseError {
                sql: sql.to_owned(),
                source,
            })
    }
}

impl SpatialDatabase for SpatialiteDatabase {
    fn begin(&mut self) -> Result<(), DatabaseError> {
        self.run_batch("BEGIN")
    }

    fn execute(&mut self, statement: &SqlStatement) -> Result<(), DatabaseError> {
        let wrap = |source| DatabaseError {
            sql: statement.sql.clone(),
            source,
        };
        let mut prepared = self.connection.prepare_cached(&statement.sql).map_err(wrap)?;
        prepared
            .execute(params_from_iter(statement.params.iter().map(to_sqlite)))
            .map_err(wrap)?;
        Ok(())
    }

    fn query_integer(&mut self, statement: &SqlStatement) -> Result<Option<i64>, DatabaseError> {
        self.connection
            .query_row(
                &statement.sql,
                params_from_iter(statement.params.iter().map(to_sqlite)),
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(|source| DatabaseError {
                sql: statement.sql.clone(),
                source,
            })
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.run_batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.run_batch("ROLLBACK")
    }
}

fn to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Integer(number) => SqliteValue::Integer(*number),
        SqlValue::Real(number) => SqliteValue::Real(*number),
        SqlValue::Text(text) => SqliteValue::Text(text.clone()),
    }
}

#[expect(unsafe_code, reason = "SQLite extension loading is an unsafe rusqlite API")]
fn load_spatialite(connection: &Connection, extension: &str) -> Result<(), SqliteError> {
    // SAFETY: loading is enabled only for the duration of this call and the
    // extension is the one named in configuration.
    unsafe {
        connection.load_extension_enable()?;
        let loaded = connection.load_extension(extension, None);
        connection.load_extension_disable()?;
        loaded
    }
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), OpenDatabaseError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    let map_io = |source| OpenDatabaseError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    };
    fs_utf8::Dir::open_ambient_dir(base, ambient_authority())
        .map_err(map_io)?
        .create_dir_all(relative)
        .map_err(map_io)
}
