#![allow(dead_code)]

use oneapi_migrate::{ChannelTypeMap, Database, Dialect, Migrator, Remapper};
use sqlx::AnyPool;
use tempfile::TempDir;

pub const LEGACY_SCHEMA: &[&str] = &[
    "CREATE TABLE abilities (`group` TEXT NOT NULL, model TEXT NOT NULL, channel_id INTEGER NOT NULL, \
     PRIMARY KEY (`group`, model, channel_id))",
    "CREATE TABLE channels (id INTEGER PRIMARY KEY, type TEXT, name TEXT, weight INTEGER)",
    "CREATE TABLE redemptions (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE tokens (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT, quota INTEGER, ratio REAL, \
     access_token BLOB)",
    "CREATE TABLE options (`key` TEXT PRIMARY KEY, value TEXT)",
    "INSERT INTO channels VALUES (1, '2', 'api2d', 5)",
    "INSERT INTO channels VALUES (2, '24', 'gemini', 1)",
    "INSERT INTO channels VALUES (3, 'abc', 'broken', 0)",
    "INSERT INTO channels VALUES (4, X'3336', 'deepseek', 1)",
    "INSERT INTO redemptions VALUES (1, 'welcome')",
    "INSERT INTO tokens VALUES (1, 'a')",
    "INSERT INTO tokens VALUES (2, 'b')",
    "INSERT INTO tokens VALUES (3, 'c')",
    "INSERT INTO tokens VALUES (4, 'd')",
    "INSERT INTO users VALUES (1, 'root', 100, 1.5, X'01')",
    "INSERT INTO users VALUES (2, NULL, NULL, NULL, NULL)",
    "INSERT INTO options VALUES ('Theme', 'dark')",
];

pub const CURRENT_SCHEMA: &[&str] = &[
    "CREATE TABLE abilities (`group` TEXT NOT NULL, model TEXT NOT NULL, channel_id INTEGER NOT NULL, \
     PRIMARY KEY (`group`, model, channel_id))",
    "CREATE TABLE channels (id INTEGER PRIMARY KEY, type INTEGER NOT NULL, name TEXT, \
     created_via INTEGER NOT NULL, remark TEXT NOT NULL)",
    "CREATE TABLE tokens (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT, quota INTEGER, ratio REAL, \
     access_token BLOB)",
    "CREATE TABLE options (`key` TEXT PRIMARY KEY, value TEXT, updated_at datetime)",
    "CREATE TRIGGER reject_token BEFORE INSERT ON tokens WHEN NEW.id = 3 \
     BEGIN SELECT RAISE(ABORT, 'token 3 rejected'); END",
];

pub struct Fixture {
    pub dir: TempDir,
    pub source: Database,
    pub target: Database,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = sqlite_database(&dir, "legacy.db", LEGACY_SCHEMA).await;
        let target = sqlite_database(&dir, "current.db", CURRENT_SCHEMA).await;
        Self {
            dir,
            source,
            target,
        }
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(
            self.source.clone(),
            self.target.clone(),
            Remapper::with_channel_types(ChannelTypeMap::default()),
        )
    }

    pub async fn target_count(&self, table: &str) -> i64 {
        count(&self.target.pool, table).await
    }
}

pub async fn sqlite_database(dir: &TempDir, name: &str, statements: &[&str]) -> Database {
    let descriptor = format!("{}?mode=rwc", dir.path().join(name).display());
    let target = Dialect::resolve(&descriptor);
    assert_eq!(target.dialect, Dialect::Sqlite);

    let database = Database::connect(&target).await.unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&database.pool).await.unwrap();
    }
    database
}

pub async fn count(pool: &AnyPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM `{}`", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
