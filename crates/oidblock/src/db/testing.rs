use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{Connection, ConnectionProvider, DbError, Dialect, Param, SqliteConnection, SqliteProvider, Value};

/// Call counters shared by a [`CountingProvider`] and every connection it
/// opened.
#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub connects: AtomicUsize,
    pub transactions: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub creates: AtomicUsize,
    pub inserts: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Wraps a [`SqliteProvider`] and counts what allocators do with it.
#[derive(Clone, Debug)]
pub(crate) struct CountingProvider {
    inner: SqliteProvider,
    pub calls: Arc<Calls>,
}

impl CountingProvider {
    pub fn new(inner: SqliteProvider) -> Self {
        Self {
            inner,
            calls: Arc::default(),
        }
    }

    pub fn transactions(&self) -> usize {
        Calls::get(&self.calls.transactions)
    }

    pub fn creates(&self) -> usize {
        Calls::get(&self.calls.creates)
    }

    pub fn inserts(&self) -> usize {
        Calls::get(&self.calls.inserts)
    }
}

impl ConnectionProvider for CountingProvider {
    type Connection = CountingConnection;

    fn connect(&self) -> Result<Self::Connection, DbError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        Ok(CountingConnection {
            inner: self.inner.connect()?,
            calls: Arc::clone(&self.calls),
        })
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }
}

pub(crate) struct CountingConnection {
    inner: SqliteConnection,
    calls: Arc<Calls>,
}

impl Connection for CountingConnection {
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<usize, DbError> {
        let rows = self.inner.execute(sql, params)?;
        if sql.starts_with("CREATE TABLE") {
            self.calls.creates.fetch_add(1, Ordering::SeqCst);
        } else if sql.starts_with("INSERT") {
            self.calls.inserts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(rows)
    }

    fn query_row(&mut self, sql: &str, params: &[Param<'_>]) -> Result<Option<Vec<Value>>, DbError> {
        self.inner.query_row(sql, params)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.calls.transactions.fetch_add(1, Ordering::SeqCst);
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback()
    }
}

/// Runs one statement on a fresh connection, for test setup.
pub(crate) fn exec(provider: &SqliteProvider, sql: &str, params: &[Param<'_>]) {
    let mut conn = provider.connect().unwrap();
    conn.execute(sql, params).unwrap();
}

/// Reads the persisted `(next id, block size)` of `category` in the default
/// table layout.
pub(crate) fn stored_row(provider: &SqliteProvider, table: &str, category: &str) -> Option<(i64, i64)> {
    let mut conn = provider.connect().unwrap();
    let sql = format!("SELECT NEXTID, BLOCKSIZE FROM {table} WHERE CATEGORY = ?1");
    conn.query_row(&sql, &[Param::Text(category)])
        .unwrap()
        .map(|row| (row[0].as_i64().unwrap(), row[1].as_i64().unwrap()))
}

/// Counts the rows of `table`.
pub(crate) fn row_count(provider: &SqliteProvider, table: &str) -> i64 {
    let mut conn = provider.connect().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .unwrap()
        .and_then(|row| row[0].as_i64())
        .unwrap()
}
