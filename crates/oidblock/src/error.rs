use core::fmt;

/// A result type defaulting to the allocator-level [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The step of the bootstrap or refill protocol that was running when a
/// database access failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Phase {
    /// Opening a connection from the provider.
    Connect,
    /// Probing whether the identifier table exists.
    ProbeTable,
    /// Creating the identifier table.
    CreateTable,
    /// Probing whether the category row exists.
    ProbeRow,
    /// Inserting the initial category row.
    InsertRow,
    /// Starting the refill transaction.
    Begin,
    /// Reading and locking the category row.
    Lock,
    /// Advancing the persisted next id.
    Update,
    /// Committing the refill transaction.
    Commit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Connect => "connect",
            Self::ProbeTable => "probe table",
            Self::CreateTable => "create table",
            Self::ProbeRow => "probe category row",
            Self::InsertRow => "insert category row",
            Self::Begin => "begin transaction",
            Self::Lock => "lock category row",
            Self::Update => "update next id",
            Self::Commit => "commit",
        };
        f.write_str(phase)
    }
}

/// A failure reported by a database backend.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DbError {
    /// The SQLite driver failed.
    #[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Any other driver failed.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The database answered, but not in the shape the protocol requires
    /// (e.g. the category row disappeared or `NEXTID` is not a number).
    #[error("{0}")]
    Protocol(String),
}

impl DbError {
    /// Wraps an arbitrary driver error.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// All errors a single identifier producer can emit.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Opening a connection, running a statement, or ending a transaction
    /// failed. The in-memory counter is untouched, so the call may be retried.
    #[error("{phase} failed for category '{category}' on table {table}")]
    DatabaseAccess {
        /// Category whose sequence was being accessed.
        category: String,
        /// Qualified table name.
        table: String,
        /// Step that failed.
        phase: Phase,
        /// Backend failure.
        #[source]
        source: DbError,
    },

    /// A configuration value was rejected at construction time.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human readable explanation.
        reason: String,
    },

    /// The allocator lock was poisoned by a panicking thread. When the
    /// `parking-lot` feature is enabled, mutexes do not poison and this
    /// variant is never produced.
    #[error("allocator lock poisoned")]
    LockPoisoned,

    /// The sequence reached `i64::MAX`; no larger value can be handed out.
    #[error("identifier sequence exhausted after {last}")]
    Exhausted {
        /// The largest value the sequence can hand out.
        last: i64,
    },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a [`Error::DatabaseAccess`].
    pub fn is_database_access(&self) -> bool {
        matches!(self, Self::DatabaseAccess { .. })
    }

    /// The failing [`Phase`] of a [`Error::DatabaseAccess`].
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::DatabaseAccess { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

/// Errors raised by a [`CategoryRegistry`].
///
/// [`CategoryRegistry`]: crate::CategoryRegistry
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum GenerationError {
    /// No producer is registered under the (trimmed) category.
    #[error("no identifier generator registered for category '{category}'")]
    UnknownCategory {
        /// The trimmed category that was requested.
        category: String,
    },

    /// The registered producer failed; the original error is kept as the
    /// source.
    #[error("unable to generate identifier for category '{category}'")]
    Producer {
        /// The trimmed category that was requested.
        category: String,
        /// The producer failure.
        #[source]
        source: Error,
    },
}

impl GenerationError {
    /// The underlying producer error, if any.
    pub fn producer_error(&self) -> Option<&Error> {
        match self {
            Self::Producer { source, .. } => Some(source),
            Self::UnknownCategory { .. } => None,
        }
    }
}
