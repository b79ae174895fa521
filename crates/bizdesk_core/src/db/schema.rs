//! Schema readiness checks shared by repositories.
//!
//! Repositories borrow caller-provided connections, so they verify on
//! construction that the connection went through `open_db*` and carries the
//! tables and columns they query.

use super::migrations::latest_version;
use super::{DbError, DbResult};
use rusqlite::Connection;

/// One table and the columns a repository relies on.
pub struct TableRequirement {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

/// Verifies migration version, tables and columns for a repository.
pub fn ensure_schema_ready(conn: &Connection, requirements: &[TableRequirement]) -> DbResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for requirement in requirements {
        if !table_exists(conn, requirement.table)? {
            return Err(DbError::MissingRequiredTable(requirement.table));
        }
        for &column in requirement.columns {
            if !table_has_column(conn, requirement.table, column)? {
                return Err(DbError::MissingRequiredColumn {
                    table: requirement.table,
                    column,
                });
            }
        }
    }
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;

    #[test]
    fn raw_connection_is_reported_uninitialized() {
        let conn = Connection::open_in_memory().unwrap();
        let err = ensure_schema_ready(&conn, &[]).unwrap_err();
        assert!(matches!(
            err,
            DbError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let conn = open_db_in_memory().unwrap();
        let err = ensure_schema_ready(
            &conn,
            &[TableRequirement {
                table: "documents",
                columns: &["document_number", "not_a_column"],
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::MissingRequiredColumn {
                table: "documents",
                column: "not_a_column"
            }
        ));
    }
}
