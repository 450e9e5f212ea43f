use anyhow::{Context, Result};
use sqlx::{AnyPool, Column, Executor, Statement, TypeInfo};
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::value::ValueKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Type name as reported by the driver, e.g. `BIGINT` or `TEXT`.
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        ValueKind::from_type_name(&self.type_name)
    }
}

/// Live columns of one table in one database, in the database's native order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<ColumnInfo>,
}

impl ColumnSet {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Builds a set of untyped columns.
    #[cfg(test)]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(|n| ColumnInfo::new(n, "")).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

pub fn column_query(dialect: Dialect, table: &str) -> String {
    format!("SELECT * FROM {} LIMIT 1", dialect.quote_ident(table))
}

/// Outcome of reading a table in the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetTable {
    Present(ColumnSet),
    Missing,
    /// The table may exist but its columns could not be read, e.g. a column
    /// type the driver cannot map.
    Unreadable(String),
}

async fn read_columns(pool: &AnyPool, dialect: Dialect, table: &str) -> sqlx::Result<ColumnSet> {
    let sql = column_query(dialect, table);
    let statement = pool.prepare(&sql).await?;
    let columns = statement
        .columns()
        .iter()
        .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
        .collect();
    Ok(ColumnSet::new(columns))
}

/// Reads the live column set of a source table. Any failure is fatal.
///
/// The query is prepared rather than executed so empty tables still report
/// their columns.
pub async fn introspect(pool: &AnyPool, dialect: Dialect, table: &str) -> Result<ColumnSet> {
    read_columns(pool, dialect, table)
        .await
        .with_context(|| format!("Failed to read columns of source table {}", table))
}

/// Reads the columns of a target table. Failures never abort the run; they are told apart
/// into a missing table and a table whose columns cannot be read.
pub async fn introspect_target(pool: &AnyPool, dialect: Dialect, table: &str) -> TargetTable {
    match read_columns(pool, dialect, table).await {
        Ok(columns) if columns.is_empty() => TargetTable::Missing,
        Ok(columns) => TargetTable::Present(columns),
        Err(e) if is_missing_table(&e) => {
            debug!(table, error = %e, "Target table does not exist");
            TargetTable::Missing
        }
        Err(e) => {
            warn!(table, error = %e, "Failed to read columns of target table");
            TargetTable::Unreadable(e.to_string())
        }
    }
}

/// Postgres `undefined_table`, MySQL `ER_NO_SUCH_TABLE` and SQLite's "no such table".
fn is_missing_table(error: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = error else {
        return false;
    };
    matches!(db.code().as_deref(), Some("42P01") | Some("42S02"))
        || db.message().contains("no such table")
}
