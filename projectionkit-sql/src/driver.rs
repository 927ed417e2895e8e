use std::sync::Arc;

use async_trait::async_trait;
use projectionkit::{BoxError, Candidate, HandlerKey, Version};
use sqlx::{AnyConnection, AnyPool, Row};
use tracing::{debug, instrument};

/// A relational dialect able to maintain the `projection_occ` table.
///
/// Every method runs on a caller-supplied connection, which may be inside
/// an open transaction; drivers never begin or commit transactions
/// themselves. A duplicate-key or no-rows-matched outcome of a conditional
/// write is reported as `Ok(false)`, never as an error.
#[async_trait]
pub trait Driver: Candidate<AnyPool> {
    /// Create the OCC table if it does not exist.
    async fn create_schema(&self, conn: &mut AnyConnection) -> Result<(), sqlx::Error>;

    /// Drop the OCC table if it exists.
    async fn drop_schema(&self, conn: &mut AnyConnection) -> Result<(), sqlx::Error>;

    /// The stored version of `resource`, or absent.
    async fn query_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
    ) -> Result<Version, sqlx::Error>;

    /// Unconditionally set, or with an absent `version` remove, the record.
    async fn store_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), sqlx::Error>;

    /// Compare-and-set the record from `current` to `next`.
    async fn update_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, sqlx::Error>;

    /// Remove the record if present.
    async fn delete_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
    ) -> Result<(), sqlx::Error>;
}

/// Key column width of the MySQL `resource` column.
#[cfg(feature = "mysql")]
pub const MYSQL_MAX_RESOURCE_LEN: usize = 3000;

/// SQL text for one dialect.
///
/// Bind order is fixed per statement so that positional (`?`) and numbered
/// (`$n`) placeholder styles can share one executor:
///
/// | statement | binds |
/// |---|---|
/// | `select` | handler, resource |
/// | `insert_if_absent` | handler, resource, version |
/// | `upsert` | handler, resource, version |
/// | `update_if_current` | next, handler, resource, current |
/// | `delete_if_current` | handler, resource, current |
/// | `delete` | handler, resource |
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    /// Diagnostic name, e.g. `"postgres"`.
    pub name: &'static str,
    /// Statement that succeeds only on this dialect.
    pub probe: &'static str,
    /// `CREATE TABLE IF NOT EXISTS projection_occ ...`
    pub create_table: &'static str,
    /// `DROP TABLE IF EXISTS projection_occ`
    pub drop_table: &'static str,
    /// Select the version column of one record.
    pub select: &'static str,
    /// Insert of a new record. An existing record must surface as zero rows
    /// affected or as a duplicate-key error, never as a truncated write.
    pub insert_if_absent: &'static str,
    /// Insert-or-overwrite.
    pub upsert: &'static str,
    /// Overwrite guarded by the stored version.
    pub update_if_current: &'static str,
    /// Delete guarded by the stored version.
    pub delete_if_current: &'static str,
    /// Unconditional delete.
    pub delete: &'static str,
    /// Longest resource id the key column holds, if bounded.
    pub max_resource_len: Option<usize>,
}

impl Dialect {
    /// PostgreSQL.
    pub const POSTGRES: Self = Self {
        name: "postgres",
        probe: "SELECT pg_backend_pid()",
        create_table: "CREATE TABLE IF NOT EXISTS projection_occ (
            handler  BYTEA NOT NULL,
            resource BYTEA NOT NULL,
            version  BYTEA NOT NULL,
            PRIMARY KEY (handler, resource)
        )",
        drop_table: "DROP TABLE IF EXISTS projection_occ",
        select: "SELECT version FROM projection_occ WHERE handler = $1 AND resource = $2",
        insert_if_absent: "INSERT INTO projection_occ (handler, resource, version)
            VALUES ($1, $2, $3)
            ON CONFLICT (handler, resource) DO NOTHING",
        upsert: "INSERT INTO projection_occ (handler, resource, version) VALUES ($1, $2, $3)
            ON CONFLICT (handler, resource) DO UPDATE SET version = excluded.version",
        update_if_current: "UPDATE projection_occ SET version = $1
            WHERE handler = $2 AND resource = $3 AND version = $4",
        delete_if_current: "DELETE FROM projection_occ
            WHERE handler = $1 AND resource = $2 AND version = $3",
        delete: "DELETE FROM projection_occ WHERE handler = $1 AND resource = $2",
        max_resource_len: None,
    };

    /// SQLite 3.24 or later.
    pub const SQLITE: Self = Self {
        name: "sqlite",
        probe: "SELECT sqlite_version()",
        create_table: "CREATE TABLE IF NOT EXISTS projection_occ (
            handler  BLOB NOT NULL,
            resource BLOB NOT NULL,
            version  BLOB NOT NULL,
            PRIMARY KEY (handler, resource)
        )",
        drop_table: "DROP TABLE IF EXISTS projection_occ",
        select: "SELECT version FROM projection_occ WHERE handler = ? AND resource = ?",
        insert_if_absent: "INSERT INTO projection_occ (handler, resource, version) VALUES (?, ?, ?)
            ON CONFLICT (handler, resource) DO NOTHING",
        upsert: "INSERT INTO projection_occ (handler, resource, version) VALUES (?, ?, ?)
            ON CONFLICT (handler, resource) DO UPDATE SET version = excluded.version",
        update_if_current: "UPDATE projection_occ SET version = ?
            WHERE handler = ? AND resource = ? AND version = ?",
        delete_if_current: "DELETE FROM projection_occ
            WHERE handler = ? AND resource = ? AND version = ?",
        delete: "DELETE FROM projection_occ WHERE handler = ? AND resource = ?",
        max_resource_len: None,
    };

    /// MySQL 8 / MariaDB.
    ///
    /// InnoDB caps the primary key at 3072 bytes, so resource ids longer
    /// than [`MYSQL_MAX_RESOURCE_LEN`] are rejected before any statement
    /// runs. Versions are stored in a `LONGBLOB`.
    #[cfg(feature = "mysql")]
    pub const MYSQL: Self = Self {
        name: "mysql",
        probe: "SELECT CAST(CONNECTION_ID() AS CHAR)",
        create_table: "CREATE TABLE IF NOT EXISTS projection_occ (
            handler  BINARY(16) NOT NULL,
            resource VARBINARY(3000) NOT NULL,
            version  LONGBLOB NOT NULL,
            PRIMARY KEY (handler, resource)
        ) ENGINE=InnoDB",
        drop_table: "DROP TABLE IF EXISTS projection_occ",
        select: "SELECT version FROM projection_occ WHERE handler = ? AND resource = ?",
        insert_if_absent: "INSERT INTO projection_occ (handler, resource, version)
            VALUES (?, ?, ?)",
        upsert: "INSERT INTO projection_occ (handler, resource, version) VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE version = VALUES(version)",
        update_if_current: "UPDATE projection_occ SET version = ?
            WHERE handler = ? AND resource = ? AND version = ?",
        delete_if_current: "DELETE FROM projection_occ
            WHERE handler = ? AND resource = ? AND version = ?",
        delete: "DELETE FROM projection_occ WHERE handler = ? AND resource = ?",
        max_resource_len: Some(MYSQL_MAX_RESOURCE_LEN),
    };

    /// Reject a resource id the key column would truncate.
    fn check_resource(&self, resource: &[u8]) -> Result<(), sqlx::Error> {
        match self.max_resource_len {
            Some(max) if resource.len() > max => Err(sqlx::Error::Encode(
                format!(
                    "{} resource id is {} bytes, longer than the {max} byte key column",
                    self.name,
                    resource.len()
                )
                .into(),
            )),
            _ => Ok(()),
        }
    }

    async fn fetch_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
    ) -> Result<Version, sqlx::Error> {
        let row = sqlx::query(self.select)
            .bind(handler.to_bytes().to_vec())
            .bind(resource.to_vec())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Version::from(row.try_get::<Vec<u8>, _>(0)?)),
            None => Ok(Version::absent()),
        }
    }

    async fn execute(
        &self,
        conn: &mut AnyConnection,
        statement: &'static str,
        binds: [&[u8]; 4],
        count: usize,
    ) -> Result<u64, sqlx::Error> {
        let mut query = sqlx::query(statement);
        for bind in binds.iter().take(count) {
            query = query.bind(bind.to_vec());
        }
        Ok(query.execute(&mut *conn).await?.rows_affected())
    }
}

/// Whether `error` reports a primary-key collision.
fn is_duplicate_key(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

#[async_trait]
impl Candidate<AnyPool> for Dialect {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(name = "sql.probe", skip_all, fields(driver = self.name))]
    async fn is_compatible_with(&self, db: &AnyPool) -> Result<(), BoxError> {
        let _ = sqlx::query(self.probe).execute(db).await?;
        Ok(())
    }
}

#[async_trait]
impl Driver for Dialect {
    async fn create_schema(&self, conn: &mut AnyConnection) -> Result<(), sqlx::Error> {
        let _ = sqlx::query(self.create_table).execute(&mut *conn).await?;
        Ok(())
    }

    async fn drop_schema(&self, conn: &mut AnyConnection) -> Result<(), sqlx::Error> {
        let _ = sqlx::query(self.drop_table).execute(&mut *conn).await?;
        Ok(())
    }

    async fn query_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
    ) -> Result<Version, sqlx::Error> {
        self.check_resource(resource)?;
        self.fetch_version(conn, handler, resource).await
    }

    async fn store_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), sqlx::Error> {
        self.check_resource(resource)?;
        let key = handler.to_bytes();
        if version.is_absent() {
            let _ = self
                .execute(conn, self.delete, [&key, resource, &[], &[]], 2)
                .await?;
        } else {
            let _ = self
                .execute(conn, self.upsert, [&key, resource, version.as_bytes(), &[]], 3)
                .await?;
        }
        Ok(())
    }

    async fn update_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, sqlx::Error> {
        self.check_resource(resource)?;
        let key = handler.to_bytes();

        let outcome = match (current.is_absent(), next.is_absent()) {
            // Nothing to write: applied only if there is nothing to conflict with.
            (true, true) => {
                return Ok(self.fetch_version(conn, handler, resource).await?.is_absent());
            }
            (true, false) => {
                self.execute(
                    conn,
                    self.insert_if_absent,
                    [&key, resource, next.as_bytes(), &[]],
                    3,
                )
                .await
            }
            (false, true) => {
                self.execute(
                    conn,
                    self.delete_if_current,
                    [&key, resource, current.as_bytes(), &[]],
                    3,
                )
                .await
            }
            (false, false) => {
                self.execute(
                    conn,
                    self.update_if_current,
                    [next.as_bytes(), &key, resource, current.as_bytes()],
                    4,
                )
                .await
            }
        };

        match outcome {
            Ok(rows) => Ok(rows == 1),
            Err(error) if is_duplicate_key(&error) => {
                debug!(
                    driver = self.name,
                    error = %error,
                    "[sql.duplicate_key] concurrent insert lost the race"
                );
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    async fn delete_version(
        &self,
        conn: &mut AnyConnection,
        handler: &HandlerKey,
        resource: &[u8],
    ) -> Result<(), sqlx::Error> {
        self.check_resource(resource)?;
        let key = handler.to_bytes();
        let _ = self
            .execute(conn, self.delete, [&key, resource, &[], &[]], 2)
            .await?;
        Ok(())
    }
}

/// The PostgreSQL driver.
pub fn postgres() -> Arc<dyn Driver> {
    Arc::new(Dialect::POSTGRES)
}

/// The SQLite driver.
pub fn sqlite() -> Arc<dyn Driver> {
    Arc::new(Dialect::SQLITE)
}

/// The MySQL driver.
#[cfg(feature = "mysql")]
pub fn mysql() -> Arc<dyn Driver> {
    Arc::new(Dialect::MYSQL)
}

/// Every built-in driver, in probing order.
pub fn default_candidates() -> Vec<Arc<dyn Driver>> {
    let mut candidates = vec![postgres(), sqlite()];
    #[cfg(feature = "mysql")]
    candidates.push(mysql());
    candidates
}
