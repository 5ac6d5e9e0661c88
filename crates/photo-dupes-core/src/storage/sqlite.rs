use super::schema::{duplicate_basis, media_file};
use crate::error::Error;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub struct Database {
    conn: SqliteConnection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = SqliteConnection::establish(path)?;
        let mut db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        debug!("Opened database {}", path);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::open(":memory:")
    }

    fn configure_pragmas(&mut self) -> Result<(), Error> {
        self.conn.batch_execute(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    fn migrate_schema(&mut self) -> Result<(), Error> {
        let applied = self
            .conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::Migration(e.to_string()))?;
        if !applied.is_empty() {
            debug!("Applied {} schema migration(s)", applied.len());
        }
        Ok(())
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub fn truncate_all(&mut self) -> Result<(), Error> {
        self.conn.transaction::<_, Error, _>(|conn| {
            diesel::delete(duplicate_basis::table).execute(conn)?;
            diesel::delete(media_file::table).execute(conn)?;
            Ok(())
        })?;
        debug!("All tables truncated");
        Ok(())
    }
}
