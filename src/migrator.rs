use anyhow::{Context, Result, bail};
use futures_util::stream::StreamExt;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::fmt;
use tracing::{error, info, warn};

use crate::dialect::{ConnectionTarget, Dialect};
use crate::plan::{Binding, ColumnPlan, reconcile};
use crate::remap::Remapper;
use crate::schema::{TargetTable, introspect, introspect_target};
use crate::statement::{InsertTemplate, build_insert};
use crate::value::Value;

/// Tables copied by the tool, in migration order.
pub const TABLES: [&str; 7] = [
    "abilities",
    "channels",
    "logs",
    "options",
    "redemptions",
    "tokens",
    "users",
];

const PROGRESS_INTERVAL: u64 = 100;

/// A connected database together with the dialect its statements use.
#[derive(Debug, Clone)]
pub struct Database {
    pub dialect: Dialect,
    pub pool: AnyPool,
}

impl Database {
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&target.url)
            .await
            .with_context(|| format!("Failed to connect to {} database", target.dialect))?;
        Ok(Self {
            dialect: target.dialect,
            pool,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTargetTable,
    /// The target table could not be read; carries the driver error.
    TargetUnreadable(String),
    NoSourceColumns,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::MissingTargetTable => "missing_target_table",
            SkipReason::TargetUnreadable(_) => "target_unreadable",
            SkipReason::NoSourceColumns => "no_source_columns",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTargetTable => f.write_str("table not found in target database"),
            SkipReason::TargetUnreadable(e) => {
                write!(f, "columns of target table could not be read: {}", e)
            }
            SkipReason::NoSourceColumns => f.write_str("source table has no columns"),
        }
    }
}

#[derive(Debug)]
pub enum TableOutcome {
    Migrated { processed: u64, inserted: u64 },
    Skipped(SkipReason),
    Failed(anyhow::Error),
}

impl TableOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TableOutcome::Failed(_))
    }
}

/// What the run driver does after a table fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Continue,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub tables: Vec<(String, TableOutcome)>,
    /// True when a failure stopped the run before every table was attempted.
    pub halted: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        !self.tables.iter().any(|(_, outcome)| outcome.is_failed())
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, outcome)| outcome)
    }
}

pub struct Migrator {
    source: Database,
    target: Database,
    remapper: Remapper,
}

impl Migrator {
    pub fn new(source: Database, target: Database, remapper: Remapper) -> Self {
        Self {
            source,
            target,
            remapper,
        }
    }

    /// Migrates `tables` one after another, applying `policy` on failure.
    pub async fn run(&self, tables: &[&str], policy: FailurePolicy) -> RunSummary {
        let mut summary = RunSummary::default();
        info!("Migration started");

        for (i, &table) in tables.iter().enumerate() {
            let outcome = self.migrate_table(table).await;
            let failed = outcome.is_failed();
            summary.tables.push((table.to_string(), outcome));

            if failed && policy == FailurePolicy::FailFast {
                summary.halted = i + 1 < tables.len();
                if summary.halted {
                    warn!(remaining = tables.len() - i - 1, "Stopping after failed table");
                }
                break;
            }
        }

        info!("Migration finished");
        summary
    }

    pub async fn migrate_table(&self, table: &str) -> TableOutcome {
        info!(table, "Processing table");
        let outcome = self.copy_table(table).await.unwrap_or_else(TableOutcome::Failed);
        match &outcome {
            TableOutcome::Migrated {
                processed,
                inserted,
            } => info!(table, processed, inserted, "Table migrated"),
            TableOutcome::Skipped(reason) => warn!(table, %reason, "Table skipped"),
            TableOutcome::Failed(e) => {
                error!(table, error = %format!("{:#}", e), "Table migration failed")
            }
        }
        outcome
    }

    async fn copy_table(&self, table: &str) -> Result<TableOutcome> {
        let source_columns = introspect(&self.source.pool, self.source.dialect, table).await?;
        let target_columns =
            match introspect_target(&self.target.pool, self.target.dialect, table).await {
                TargetTable::Present(columns) => columns,
                TargetTable::Missing => {
                    return Ok(TableOutcome::Skipped(SkipReason::MissingTargetTable));
                }
                TargetTable::Unreadable(e) => {
                    return Ok(TableOutcome::Skipped(SkipReason::TargetUnreadable(e)));
                }
            };
        if source_columns.is_empty() {
            return Ok(TableOutcome::Skipped(SkipReason::NoSourceColumns));
        }

        let reconciliation = reconcile(&source_columns, &target_columns);
        if !reconciliation.missing.is_empty() {
            warn!(
                table,
                columns = ?reconciliation.missing,
                "Source columns missing from target, their data will not be copied"
            );
        }
        let plan = reconciliation.plan;
        let template = build_insert(table, &plan, self.target.dialect)?;

        let select = format!("SELECT * FROM {}", self.source.dialect.quote_ident(table));
        let mut rows = sqlx::query(&select).fetch(&self.source.pool);

        let mut tx = self
            .target
            .pool
            .begin()
            .await
            .context("Failed to begin target transaction")?;

        let mut processed: u64 = 0;
        let mut inserted: u64 = 0;
        while let Some(row) = rows
            .next()
            .await
            .transpose()
            .with_context(|| format!("Failed to read source table {}", table))?
        {
            let raw = Value::decode_row(&row)
                .with_context(|| format!("Failed to read row {} of {}", processed + 1, table))?;
            let values = build_row(&self.remapper, table, &plan, raw)?;
            check_arity(&template, &values)?;

            let query = values
                .into_iter()
                .zip(plan.entries())
                .fold(sqlx::query(template.sql()), |q, (v, entry)| v.bind(q, entry.kind));
            let result = query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert into target table {}", table))?;
            inserted += result.rows_affected();

            processed += 1;
            if processed % PROGRESS_INTERVAL == 0 {
                info!(table, rows = processed, "Progress");
            }
        }

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit target table {}", table))?;

        Ok(TableOutcome::Migrated {
            processed,
            inserted,
        })
    }
}

/// Orders one source row into the value list the insert template expects.
///
/// Bound columns take the remapped source value at their ordinal, unbound
/// columns a default chosen by declared kind or by the row's first value.
pub fn build_row(
    remapper: &Remapper,
    table: &str,
    plan: &ColumnPlan,
    mut raw: Vec<Value>,
) -> Result<Vec<Value>> {
    let observed = raw.first().cloned();
    let mut values = Vec::with_capacity(plan.len());

    for entry in plan.entries() {
        let value = match entry.binding {
            Binding::Bound { source_ordinal } => {
                let Some(cell) = raw.get_mut(source_ordinal) else {
                    bail!(
                        "Row of {} has {} values, column {} expects ordinal {}",
                        table,
                        raw.len(),
                        entry.column,
                        source_ordinal
                    );
                };
                let cell = std::mem::replace(cell, Value::Null);
                remapper.transform(table, &entry.column, cell)
            }
            Binding::Unbound => Value::placeholder_for(entry.kind, observed.as_ref()),
        };
        values.push(value);
    }

    Ok(values)
}

/// Checks a value list against the template before it reaches the driver.
pub fn check_arity(template: &InsertTemplate, values: &[Value]) -> Result<()> {
    if template.arity() != values.len() {
        bail!(
            "Insert expects {} values but {} were built",
            template.arity(),
            values.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::ChannelTypeMap;
    use crate::schema::{ColumnInfo, ColumnSet};
    use crate::value::{ValueKind, null_kind};

    fn remapper() -> Remapper {
        Remapper::with_channel_types(ChannelTypeMap::default())
    }

    #[test]
    fn builds_values_in_target_order_with_remap_and_defaults() {
        let source = ColumnSet::from_names(["id", "type", "key"]);
        let target = ColumnSet::new(vec![
            ColumnInfo::new("id", "BIGINT"),
            ColumnInfo::new("key", "TEXT"),
            ColumnInfo::new("type", "BIGINT"),
            ColumnInfo::new("created_via", "INTEGER"),
            ColumnInfo::new("remark", "TEXT"),
            ColumnInfo::new("ratio", "REAL"),
            ColumnInfo::new("enabled", "BOOLEAN"),
        ]);
        let plan = reconcile(&source, &target).plan;
        let raw = vec![
            Value::Integer(7),
            Value::Bytes(b"24".to_vec()),
            Value::Text("sk-abc".into()),
        ];

        let values = build_row(&remapper(), "channels", &plan, raw).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Integer(7),
                Value::Text("sk-abc".into()),
                Value::Integer(25),
                Value::Integer(0),
                Value::Text(String::new()),
                Value::Float(0.0),
                Value::Boolean(false),
            ]
        );
        let template = build_insert("channels", &plan, Dialect::Sqlite).unwrap();
        check_arity(&template, &values).unwrap();
    }

    #[test]
    fn untyped_unbound_columns_follow_the_first_source_value() {
        let source = ColumnSet::from_names(["name", "id"]);
        let target = ColumnSet::from_names(["id", "name", "extra"]);
        let plan = reconcile(&source, &target).plan;

        let values = build_row(
            &remapper(),
            "users",
            &plan,
            vec![Value::Text("root".into()), Value::Integer(1)],
        )
        .unwrap();
        assert_eq!(values[2], Value::Text(String::new()));

        let values = build_row(
            &remapper(),
            "users",
            &plan,
            vec![Value::Integer(5), Value::Integer(1)],
        )
        .unwrap();
        assert_eq!(values[2], Value::Integer(0));
    }

    #[test]
    fn source_nulls_are_copied_as_nulls() {
        let source = ColumnSet::from_names(["id", "username", "quota"]);
        let target = ColumnSet::new(vec![
            ColumnInfo::new("id", "BIGINT"),
            ColumnInfo::new("username", "TEXT"),
            ColumnInfo::new("quota", "BIGINT"),
        ]);
        let plan = reconcile(&source, &target).plan;

        let values = build_row(
            &remapper(),
            "users",
            &plan,
            vec![Value::Integer(2), Value::Null, Value::Null],
        )
        .unwrap();
        assert_eq!(values, vec![Value::Integer(2), Value::Null, Value::Null]);
        let kinds: Vec<_> = plan.entries().iter().map(|e| null_kind(e.kind)).collect();
        assert_eq!(kinds, vec![ValueKind::Integer, ValueKind::Text, ValueKind::Integer]);
    }

    #[test]
    fn remap_applies_only_to_the_registered_table() {
        let source = ColumnSet::from_names(["type"]);
        let target = ColumnSet::from_names(["type"]);
        let plan = reconcile(&source, &target).plan;

        let values = build_row(&remapper(), "tokens", &plan, vec![Value::Integer(24)]).unwrap();
        assert_eq!(values, vec![Value::Integer(24)]);
    }

    #[test]
    fn short_rows_are_an_error() {
        let source = ColumnSet::from_names(["id", "name"]);
        let target = ColumnSet::from_names(["name"]);
        let plan = reconcile(&source, &target).plan;
        assert!(build_row(&remapper(), "users", &plan, vec![Value::Integer(1)]).is_err());
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let plan = reconcile(
            &ColumnSet::from_names(["id"]),
            &ColumnSet::from_names(["id", "name"]),
        )
        .plan;
        let template = build_insert("users", &plan, Dialect::MySql).unwrap();
        assert!(check_arity(&template, &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn summary_tracks_failures() {
        let summary = RunSummary {
            tables: vec![
                (
                    "abilities".into(),
                    TableOutcome::Migrated {
                        processed: 3,
                        inserted: 3,
                    },
                ),
                (
                    "redemptions".into(),
                    TableOutcome::Skipped(SkipReason::MissingTargetTable),
                ),
            ],
            halted: false,
        };
        assert!(summary.is_success());
        assert!(matches!(
            summary.outcome("redemptions"),
            Some(TableOutcome::Skipped(SkipReason::MissingTargetTable))
        ));
        assert!(summary.outcome("users").is_none());
    }
}
