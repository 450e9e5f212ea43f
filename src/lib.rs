//! Copies one-api data table by table from a legacy schema into the current
//! one, reconciling drifted column sets and upgrading legacy channel types.

pub mod config;
pub mod dialect;
pub mod logging;
pub mod migrator;
pub mod plan;
pub mod remap;
pub mod report;
pub mod schema;
pub mod statement;
pub mod value;

pub use config::{Cli, FileConfig, Settings};
pub use dialect::{ConnectionTarget, Dialect};
pub use migrator::{Database, FailurePolicy, Migrator, RunSummary, SkipReason, TABLES, TableOutcome};
pub use remap::{ChannelTypeMap, Remapper};
