use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::info;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to the schema version before it is written to `PRAGMA user_version`,
/// so that a database that was never created by this crate reads as "too old".
pub const BASE_DB_VERSION: usize = 70000;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn from_sql(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Cascade,
    SetNull,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Cascade => "CASCADE",
            ForeignKeyOnChange::SetNull => "SET NULL",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    def.push_str(" NOT NULL");
                }
                if column.is_unique {
                    def.push_str(" UNIQUE");
                }
                if let Some(default_value) = column.default_value {
                    def.push_str(&format!(" DEFAULT {}", default_value));
                }
                if let Some(fk) = column.foreign_key {
                    def.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE {}",
                        fk.foreign_table,
                        fk.foreign_column,
                        fk.on_delete.as_sql()
                    ));
                }
                def
            })
            .chain(
                self.unique_constraints
                    .iter()
                    .map(|cols| format!("UNIQUE ({})", cols.join(", "))),
            )
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? > 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}",
                self.name,
                actual.len(),
                self.columns.len(),
                actual
                    .iter()
                    .map(|(name, ..)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in actual.iter().zip(self.columns) {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::from_sql(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                );
            }
            if *non_null != expected.non_null || *is_pk != expected.is_primary_key {
                bail!(
                    "Table {} column {} constraint mismatch",
                    self.name,
                    expected.name
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }

        let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", self.name))?;
        let actual_fks: Vec<(String, String, String)> = fk_stmt
            .query_map([], |row| Ok((row.get(3)?, row.get(2)?, row.get(6)?)))?
            .filter_map(|r| r.ok())
            .collect();
        for column in self.columns {
            let Some(fk) = column.foreign_key else {
                continue;
            };
            let found = actual_fks.iter().any(|(from, table, on_delete)| {
                from == column.name && table == fk.foreign_table && on_delete == fk.on_delete.as_sql()
            });
            if !found {
                bail!(
                    "Table {} column {} is missing foreign key REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    fk.foreign_table,
                    fk.foreign_column,
                    fk.on_delete.as_sql()
                );
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        set_user_version(conn, self.version)
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

fn set_user_version(conn: &Connection, version: usize) -> Result<()> {
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + version),
        [],
    )?;
    Ok(())
}

fn read_user_version(conn: &Connection) -> Result<i64> {
    Ok(conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?
        - BASE_DB_VERSION as i64)
}

/// Validates the schema of an opened database against `schemas` and runs every
/// migration newer than the stored version.
pub fn validate_and_migrate(conn: &Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let db_version = read_user_version(conn)?;
    if db_version < 0 {
        bail!(
            "Database version {} is too old, does not contain base db version {}",
            db_version,
            BASE_DB_VERSION
        );
    }
    if db_version >= schemas.len() as i64 {
        bail!("Database version {} is too new", db_version);
    }
    let version = db_version as usize;
    schemas
        .get(version)
        .context("Failed to get schema")?
        .validate(conn)?;

    let mut latest_from = version;
    for schema in schemas.iter().skip(version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating db from version {} to {}",
                latest_from, schema.version
            );
            migration_fn(conn)?;
            latest_from = schema.version;
        }
    }
    set_user_version(conn, latest_from)?;
    conn.execute("PRAGMA foreign_keys = ON;", params![])?;
    Ok(())
}

/// Opens (or creates with the latest schema) the database at `db_path`.
pub fn open_versioned<P: AsRef<Path>>(db_path: P, schemas: &[VersionedSchema]) -> Result<Connection> {
    let latest = schemas.last().context("No schema versions declared")?;
    let conn = if db_path.as_ref().exists() {
        Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        info!("Creating new database at {:?}", db_path.as_ref());
        let conn = Connection::open(db_path)?;
        latest.create(&conn)?;
        conn
    };
    validate_and_migrate(&conn, schemas)?;
    Ok(conn)
}

/// In-memory database with the latest schema, used by tests and the CLI `--memory` mode.
pub fn open_in_memory(schemas: &[VersionedSchema]) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schemas
        .last()
        .context("No schema versions declared")?
        .create(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT_TABLE: Table = Table {
        name: "parent",
        columns: &[sqlite_column!("id", &SqlType::Integer, is_primary_key = true)],
        indices: &[],
        unique_constraints: &[],
    };

    const CHILD_TABLE: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!(
                "parent_id",
                &SqlType::Integer,
                non_null = true,
                foreign_key = Some(&ForeignKey {
                    foreign_table: "parent",
                    foreign_column: "id",
                    on_delete: ForeignKeyOnChange::Cascade,
                })
            ),
            sqlite_column!("label", &SqlType::Text),
        ],
        indices: &[("idx_child_parent", "parent_id")],
        unique_constraints: &[&["parent_id", "label"]],
    };

    const CHILD_TABLE_V_1: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!(
                "parent_id",
                &SqlType::Integer,
                non_null = true,
                foreign_key = Some(&ForeignKey {
                    foreign_table: "parent",
                    foreign_column: "id",
                    on_delete: ForeignKeyOnChange::Cascade,
                })
            ),
            sqlite_column!("label", &SqlType::Text),
            sqlite_column!("weight", &SqlType::Integer, non_null = true, default_value = Some("0")),
        ],
        indices: &[("idx_child_parent", "parent_id")],
        unique_constraints: &[&["parent_id", "label"]],
    };

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[PARENT_TABLE, CHILD_TABLE],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[PARENT_TABLE, CHILD_TABLE_V_1],
            migration: Some(|conn: &Connection| {
                conn.execute(
                    "ALTER TABLE child ADD COLUMN weight INTEGER NOT NULL DEFAULT 0",
                    [],
                )?;
                Ok(())
            }),
        },
    ];

    #[test]
    fn create_sql_includes_constraints() {
        let sql = CHILD_TABLE.create_sql();
        assert!(sql.contains("parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE CASCADE"));
        assert!(sql.contains("UNIQUE (parent_id, label)"));
    }

    #[test]
    fn freshly_created_schema_validates() {
        let conn = open_in_memory(SCHEMAS).unwrap();
        validate_and_migrate(&conn, SCHEMAS).unwrap();
        assert_eq!(read_user_version(&conn).unwrap(), 1);
    }

    #[test]
    fn old_schema_is_migrated_forward() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();
        conn.execute("INSERT INTO parent (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO child (parent_id, label) VALUES (1, 'a')", [])
            .unwrap();

        validate_and_migrate(&conn, SCHEMAS).unwrap();

        assert_eq!(read_user_version(&conn).unwrap(), 1);
        SCHEMAS[1].validate(&conn).unwrap();
        let weight: i64 = conn
            .query_row("SELECT weight FROM child WHERE label = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(weight, 0);
    }

    #[test]
    fn foreign_database_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        let err = validate_and_migrate(&conn, SCHEMAS).unwrap_err();
        assert!(err.to_string().contains("too old"));
    }

    #[test]
    fn missing_foreign_key_is_detected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL, label TEXT, UNIQUE (parent_id, label))",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_child_parent ON child(parent_id)", [])
            .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing foreign key"));
        assert!(err.contains("parent_id"));
    }

    #[test]
    fn missing_index_is_detected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE CASCADE, label TEXT)",
            [],
        )
        .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index 'idx_child_parent'"));
    }
}
