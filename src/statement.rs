use anyhow::{Result, bail};

use crate::dialect::Dialect;
use crate::plan::ColumnPlan;

/// Duplicate-tolerant insert compiled once per table and reused for every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTemplate {
    sql: String,
    arity: usize,
}

impl InsertTemplate {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of positional parameters a row must supply.
    pub fn arity(&self) -> usize {
        self.arity
    }
}

pub fn build_insert(table: &str, plan: &ColumnPlan, dialect: Dialect) -> Result<InsertTemplate> {
    if plan.is_empty() {
        bail!("Cannot build an insert for table {} without columns", table);
    }

    let columns = plan
        .columns()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(",");
    let placeholders = (1..=plan.len())
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(",");
    let table = dialect.quote_ident(table);

    let sql = match dialect {
        Dialect::MySql => format!("INSERT IGNORE INTO {} ({}) VALUES ({})", table, columns, placeholders),
        Dialect::Sqlite => {
            format!("INSERT OR IGNORE INTO {} ({}) VALUES ({})", table, columns, placeholders)
        }
        Dialect::Postgres => format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
            table, columns, placeholders
        ),
    };

    Ok(InsertTemplate {
        sql,
        arity: plan.len(),
    })
}
