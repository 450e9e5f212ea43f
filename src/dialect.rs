use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

/// SQL flavour spoken by one side of the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

/// A connection descriptor resolved to its dialect and a URL the driver accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub dialect: Dialect,
    pub url: String,
}

const POSTGRES_MARKERS: [&str; 2] = ["postgresql://", "postgres://"];
const MYSQL_MARKER: &str = "mysql://";

impl Dialect {
    /// Resolves a descriptor without touching the network or the filesystem.
    pub fn resolve(descriptor: &str) -> ConnectionTarget {
        let descriptor = descriptor.trim();

        for marker in POSTGRES_MARKERS {
            if let Some(pos) = descriptor.find(marker) {
                return ConnectionTarget {
                    dialect: Dialect::Postgres,
                    url: descriptor[pos..].to_string(),
                };
            }
        }

        if let Some(pos) = descriptor.find(MYSQL_MARKER) {
            let rest = &descriptor[pos + MYSQL_MARKER.len()..];
            return ConnectionTarget {
                dialect: Dialect::MySql,
                url: format!("{}{}", MYSQL_MARKER, strip_tcp_wrapper(rest)),
            };
        }

        // Go driver DSN without a scheme: user:pw@tcp(host:port)/db
        if descriptor.contains("@tcp(") {
            return ConnectionTarget {
                dialect: Dialect::MySql,
                url: format!("{}{}", MYSQL_MARKER, strip_tcp_wrapper(descriptor)),
            };
        }

        let url = if descriptor.starts_with("sqlite:") {
            descriptor.to_string()
        } else {
            format!("sqlite://{}", descriptor)
        };
        ConnectionTarget { dialect: Dialect::Sqlite, url }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => bail!("Unsupported database dialect: {}", other),
        }
    }
}

/// Rewrites `user:pw@tcp(host:port)/db` into `user:pw@host:port/db`.
fn strip_tcp_wrapper(dsn: &str) -> String {
    let Some(start) = dsn.find("@tcp(") else {
        return dsn.to_string();
    };
    let host_start = start + "@tcp(".len();
    let Some(close) = dsn[host_start..].find(')') else {
        return dsn.to_string();
    };
    format!(
        "{}@{}{}",
        &dsn[..start],
        &dsn[host_start..host_start + close],
        &dsn[host_start + close + 1..]
    )
}
