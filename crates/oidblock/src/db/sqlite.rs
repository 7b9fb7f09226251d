use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rusqlite::{OpenFlags, params_from_iter, types::ToSqlOutput, types::ValueRef};

use crate::{Connection, ConnectionProvider, DbError, Dialect, Param, Value};

/// Default time a connection waits for another writer to release the database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens connections to a SQLite database file.
///
/// SQLite has no row locks, so a refill's `BEGIN IMMEDIATE` takes the
/// database write lock instead. That serializes refills across every
/// connection to the file, in this process or any other, which is the
/// guarantee `SELECT ... FOR UPDATE` gives elsewhere.
#[derive(Clone, Debug)]
pub struct SqliteProvider {
    path: Arc<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteProvider {
    /// A provider for the database file at `path`, created on first connect
    /// if missing.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// How long a connection waits on a locked database before failing.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// The database file connections are opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for SqliteProvider {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<Self::Connection, DbError> {
        let conn = rusqlite::Connection::open_with_flags(
            self.path.as_path(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(SqliteConnection { conn })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

/// A single SQLite connection, closed on drop.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Wraps an already opened connection.
    pub fn from_raw(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<usize, DbError> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn query_row(&mut self, sql: &str, params: &[Param<'_>]) -> Result<Option<Vec<Value>>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let values = (0..columns)
            .map(|idx| row.get_ref(idx).map(to_value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(values))
    }

    fn begin(&mut self) -> Result<(), DbError> {
        Ok(self.conn.execute_batch("BEGIN IMMEDIATE")?)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        Ok(self.conn.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        Ok(self.conn.execute_batch("ROLLBACK")?)
    }
}

impl rusqlite::ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match *self {
            Param::Text(s) => ToSqlOutput::from(s),
            Param::Int(v) => ToSqlOutput::from(v),
        })
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Real(v) => Value::Other(v.to_string()),
        ValueRef::Blob(bytes) => Value::Other(format!("<{} byte blob>", bytes.len())),
    }
}
