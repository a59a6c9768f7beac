//! Throwaway Postgres databases for integration tests.
//!
//! Each [`TestDatabase`] is a freshly created, migrated database with a
//! random name, so ignored Postgres suites can run in parallel.

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Where the test server lives. Read from `TEST_DB_*` variables.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Role allowed to create databases.
    pub username: String,
    /// Password of `username`.
    pub password: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        let var = |name: &str, fallback: &str| {
            std::env::var(name).unwrap_or_else(|_| fallback.to_string())
        };
        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: var("TEST_DB_PORT", "5433").parse().unwrap_or(5433),
            username: var("TEST_DB_USER", "classifieds_test"),
            password: var("TEST_DB_PASSWORD", "classifieds_test"),
        }
    }
}

impl TestDbConfig {
    /// URL of `database` on the test server.
    #[must_use]
    pub fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated database that exists for one test.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    config: TestDbConfig,
    name: String,
}

impl TestDatabase {
    /// Create and migrate a database with a random name.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let config = TestDbConfig::default();
        let name = unique_name();

        let admin = Database::connect(&config.url_for("postgres")).await?;
        admin
            .execute(Statement::from_string(
                admin.get_database_backend(),
                format!("CREATE DATABASE \"{name}\""),
            ))
            .await?;
        admin.close().await?;

        let conn = Database::connect(&config.url_for(&name)).await?;
        Migrator::up(&conn, None).await?;
        info!(database = %name, "Created test database");

        Ok(Self {
            conn: Arc::new(conn),
            config,
            name,
        })
    }

    /// Shared handle to the database, ready for repositories.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Drop the database. Open handles are terminated server-side.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        let admin = Database::connect(&self.config.url_for("postgres")).await?;
        let backend = admin.get_database_backend();

        // Pools cloned out of `connection()` may still be open
        admin
            .execute(Statement::from_string(
                backend,
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = '{}' AND pid <> pg_backend_pid()",
                    self.name
                ),
            ))
            .await?;
        admin
            .execute(Statement::from_string(
                backend,
                format!("DROP DATABASE IF EXISTS \"{}\"", self.name),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.name, "Dropped test database");
        Ok(())
    }
}

fn unique_name() -> String {
    format!("classifieds_test_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}
