use crate::{DbError, Param, Value};

/// SQL flavour spoken by a [`ConnectionProvider`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Databases supporting `SELECT ... FOR UPDATE` row locks.
    #[default]
    Standard,
    /// SQLite: no row locks; writers are serialized by `BEGIN IMMEDIATE`
    /// instead.
    Sqlite,
}

impl Dialect {
    /// Clause appended to the refill `SELECT` to lock the category row.
    pub const fn row_lock_suffix(self) -> &'static str {
        match self {
            Self::Standard => " FOR UPDATE",
            Self::Sqlite => "",
        }
    }
}

/// Hands out usable connections, or fails.
///
/// A provider is shared by every allocator built against the same database,
/// so it must be cheap to clone and safe to use from several threads. Pooling
/// is the provider's business; allocators only ever hold a connection for the
/// duration of one check or one refill.
pub trait ConnectionProvider: Clone + Send + Sync + 'static {
    /// The connection type produced.
    type Connection: Connection;

    /// Opens (or checks out) a connection.
    ///
    /// # Errors
    ///
    /// Returns the backend error if no connection can be obtained.
    fn connect(&self) -> Result<Self::Connection, DbError>;

    /// The SQL flavour of the connections produced.
    fn dialect(&self) -> Dialect {
        Dialect::Standard
    }
}

/// The narrow slice of a database connection the allocator needs.
///
/// Connections start in autocommit mode; [`Connection::begin`] switches to an
/// explicit transaction that lasts until [`Connection::commit`] or
/// [`Connection::rollback`]. Dropping a connection closes it.
pub trait Connection {
    /// Runs a statement that returns no rows and reports the affected count.
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<usize, DbError>;

    /// Runs a query and returns its first row, if any.
    fn query_row(&mut self, sql: &str, params: &[Param<'_>]) -> Result<Option<Vec<Value>>, DbError>;

    /// Leaves autocommit mode and opens a transaction.
    fn begin(&mut self) -> Result<(), DbError>;

    /// Commits the open transaction.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Rolls back the open transaction.
    fn rollback(&mut self) -> Result<(), DbError>;
}
