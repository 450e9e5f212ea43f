use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::migrator::{RunSummary, TableOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Migrated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    pub processed: u64,
    pub inserted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub halted: bool,
    pub tables: Vec<TableReport>,
}

impl RunSummary {
    pub fn to_report(&self) -> RunReport {
        let tables = self
            .tables
            .iter()
            .map(|(table, outcome)| {
                let mut report = TableReport {
                    table: table.clone(),
                    status: TableStatus::Migrated,
                    processed: 0,
                    inserted: 0,
                    skip_reason: None,
                    detail: None,
                };
                match outcome {
                    TableOutcome::Migrated {
                        processed,
                        inserted,
                    } => {
                        report.processed = *processed;
                        report.inserted = *inserted;
                    }
                    TableOutcome::Skipped(reason) => {
                        report.status = TableStatus::Skipped;
                        report.skip_reason = Some(reason.code());
                        report.detail = Some(reason.to_string());
                    }
                    TableOutcome::Failed(e) => {
                        report.status = TableStatus::Failed;
                        report.detail = Some(format!("{:#}", e));
                    }
                }
                report
            })
            .collect();

        RunReport {
            success: self.is_success(),
            halted: self.halted,
            tables,
        }
    }
}

impl RunReport {
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write run report to {}", path.display()))
    }
}
