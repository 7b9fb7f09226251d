use core::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocatorConfig, Connection, ConnectionProvider, DEFAULT_BLOCK_SIZE, DbError, Error,
    IdFormat, IdentifierProducer, Param, Phase, Result, Statements, Value, generator::Mutex,
};

/// How far this allocator has brought the backing schema.
///
/// Only ever moves forward. It is per allocator: another process racing to
/// bootstrap the same table is handled by re-checking the database, not by
/// any in-process lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Schema {
    Uninitialized,
    TableReady,
    CategoryReady,
}

/// In-memory range `[next_available, last_prefetched]` of reserved ids.
#[derive(Debug)]
struct State {
    next_available: i64,
    last_prefetched: i64,
    schema: Schema,
}

impl State {
    /// An empty range, so the first call always refills.
    const fn new(schema: Schema) -> Self {
        Self {
            next_available: i64::MIN + 1,
            last_prefetched: i64::MIN,
            schema,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.next_available > self.last_prefetched
    }
}

/// A block reserved in the database: `[start, end]` inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Block {
    start: i64,
    end: i64,
}

/// A database-backed identifier generator that reserves ids in blocks.
///
/// The authoritative state of a category is one row `(category, next id,
/// block size)` in a shared table. A refill locks that row, reads the next
/// unreserved id, advances it by the block size and commits; the reserved
/// range is then served from memory without touching the database.
///
/// ## Guarantees
/// - ✅ Values from one allocator increase by exactly one per call
/// - ✅ At most one refill in flight per allocator; other callers wait on the
///   allocator lock
/// - ✅ Allocators in other threads or processes never receive the same value,
///   as long as they share the table (the row lock serializes refills)
/// - ✅ A failed refill is rolled back and leaves the in-memory range intact,
///   so the call can simply be retried
///
/// ## Trade-offs
/// Ids reserved but not handed out before the process exits are lost. A larger
/// block size means fewer round trips and a larger possible gap after a crash.
///
/// ## Bootstrap
/// The table and the category row are created lazily on first use. Both steps
/// tolerate losing a race against another allocator: a failed `CREATE TABLE`
/// or `INSERT` is ignored if a follow-up check finds the table or row present.
/// With [`AllocatorConfig::table_already_created`] the table probe is skipped;
/// the category row is still checked.
pub struct BlockAllocator<P>
where
    P: ConnectionProvider,
{
    provider: P,
    category: String,
    start_id: i64,
    block_size: Option<u32>,
    format: IdFormat,
    table: String,
    sql: Statements,
    state: Mutex<State>,
}

impl<P> BlockAllocator<P>
where
    P: ConnectionProvider,
{
    /// Creates an allocator for the category described by `config`.
    ///
    /// No database access happens here; the schema is checked on the first
    /// call to [`IdentifierProducer::next_identifier`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    ///
    /// # Example
    /// ```
    /// use oidblock::{AllocatorConfig, BlockAllocator, CategorySpec, IdFormat, IdentifierProducer, SqliteProvider};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let provider = SqliteProvider::new(dir.path().join("ids.db"));
    /// let config = AllocatorConfig::new(
    ///     CategorySpec::new("Alpha")
    ///         .with_start_id(500)
    ///         .with_block_size(3)
    ///         .with_format(IdFormat::new(10).with_prefix("A:")),
    /// );
    ///
    /// let allocator = BlockAllocator::new(provider, config).unwrap();
    /// assert_eq!(allocator.new_identifier().unwrap(), "A:0000000500");
    /// assert_eq!(allocator.next_identifier().unwrap(), 501);
    /// ```
    pub fn new(provider: P, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        let AllocatorConfig {
            category,
            table,
            table_already_created,
        } = config;

        let schema = if table_already_created {
            Schema::TableReady
        } else {
            Schema::Uninitialized
        };

        Ok(Self {
            sql: Statements::new(&table, provider.dialect()),
            table: table.qualified_name(),
            category: category.trimmed_name().to_owned(),
            start_id: category.start_id,
            block_size: category.block_size,
            format: category.format,
            provider,
            state: Mutex::new(State::new(schema)),
        })
    }

    /// The (trimmed) category this allocator serves.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The qualified name of the backing table.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The configured block size override, if any.
    pub fn block_size(&self) -> Option<u32> {
        self.block_size
    }

    /// Whether the table and category row are known to exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if the allocator lock is poisoned.
    pub fn is_table_ready(&self) -> Result<bool> {
        Ok(self.lock()?.schema == Schema::CategoryReady)
    }

    #[cfg(not(feature = "parking-lot"))]
    fn lock(&self) -> Result<crate::generator::MutexGuard<'_, State>> {
        Ok(self.state.lock()?)
    }

    #[cfg(feature = "parking-lot")]
    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, State>> {
        Ok(self.state.lock())
    }

    /// Returns the next id, refilling from the database when the in-memory
    /// block is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatabaseAccess`] if bootstrap or refill fails, or
    /// [`Error::LockPoisoned`] if the allocator lock is poisoned.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(category = %self.category)))]
    pub fn try_next_identifier(&self) -> Result<i64> {
        let mut state = self.lock()?;
        if state.is_exhausted() {
            self.refill(&mut state)?;
        }

        let id = state.next_available;
        state.next_available += 1;
        Ok(id)
    }

    #[cold]
    #[inline(never)]
    fn refill(&self, state: &mut State) -> Result<()> {
        self.ensure_schema(state)?;
        let block = self.reserve_block()?;

        if block.start <= state.last_prefetched {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                category = %self.category,
                table = %self.table,
                block_start = block.start,
                last_prefetched = state.last_prefetched,
                "reserved block starts at or below an earlier block; the stored next id was moved back"
            );
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            category = %self.category,
            table = %self.table,
            start = block.start,
            end = block.end,
            "reserved identifier block"
        );

        state.next_available = block.start;
        state.last_prefetched = block.end;
        Ok(())
    }

    fn ensure_schema(&self, state: &mut State) -> Result<()> {
        if state.schema == Schema::Uninitialized {
            self.ensure_table()?;
            state.schema = Schema::TableReady;
        }
        if state.schema == Schema::TableReady {
            self.ensure_row()?;
            state.schema = Schema::CategoryReady;
        }
        Ok(())
    }

    fn ensure_table(&self) -> Result<()> {
        if self.table_exists()? {
            return Ok(());
        }

        let mut conn = self.connect()?;
        match conn.execute(&self.sql.create_table, &[]) {
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(table = %self.table, "created identifier table");
                Ok(())
            }
            Err(err) => {
                drop(conn);
                if self.table_exists()? {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(table = %self.table, error = %err, "table was created concurrently");
                    Ok(())
                } else {
                    Err(self.db_error(Phase::CreateTable, err))
                }
            }
        }
    }

    /// Any failure of the probe query counts as "missing"; a real problem
    /// surfaces when creating the table.
    fn table_exists(&self) -> Result<bool> {
        let mut conn = self.connect()?;
        match conn.query_row(&self.sql.probe_table, &[]) {
            Ok(_) => Ok(true),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(table = %self.table, error = %_err, "identifier table probe failed");
                Ok(false)
            }
        }
    }

    fn ensure_row(&self) -> Result<()> {
        if self.row_exists()? {
            return Ok(());
        }

        let block_size = self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        let params = [
            Param::Text(&self.category),
            Param::Int(self.start_id),
            Param::from(block_size),
        ];

        let mut conn = self.connect()?;
        match conn.execute(&self.sql.insert_row, &params) {
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    category = %self.category,
                    table = %self.table,
                    start_id = self.start_id,
                    block_size,
                    "inserted category row"
                );
                Ok(())
            }
            Err(err) => {
                drop(conn);
                if self.row_exists()? {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(category = %self.category, error = %err, "category row was inserted concurrently");
                    Ok(())
                } else {
                    Err(self.db_error(Phase::InsertRow, err))
                }
            }
        }
    }

    fn row_exists(&self) -> Result<bool> {
        let mut conn = self.connect()?;
        conn.query_row(&self.sql.probe_row, &[Param::Text(&self.category)])
            .map(|row| row.is_some())
            .map_err(|err| self.db_error(Phase::ProbeRow, err))
    }

    /// Locks the category row, advances it by one block and commits, all on
    /// one connection. Any failure after `begin` rolls back.
    fn reserve_block(&self) -> Result<Block> {
        let mut conn = self.connect()?;
        conn.begin().map_err(|err| self.db_error(Phase::Begin, err))?;

        let reserved = self.reserve_in_transaction(&mut conn);
        if reserved.is_err() {
            if let Err(_err) = conn.rollback() {
                #[cfg(feature = "tracing")]
                tracing::warn!(category = %self.category, error = %_err, "rollback after failed refill failed");
            }
        }
        reserved
    }

    fn reserve_in_transaction(&self, conn: &mut P::Connection) -> Result<Block> {
        let category = Param::Text(&self.category);

        let row = conn
            .query_row(&self.sql.lock_row, &[category])
            .and_then(|row| {
                row.ok_or_else(|| {
                    DbError::protocol(format!("category row '{}' does not exist", self.category))
                })
            })
            .map_err(|err| self.db_error(Phase::Lock, err))?;

        let start = row
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                self.db_error(
                    Phase::Lock,
                    DbError::protocol(format!("next id {:?} is not an integer", row.first())),
                )
            })?;
        let stored_block_size = row.get(1).and_then(Value::as_i64);
        let block_size = self.effective_block_size(stored_block_size);

        let next_block_start = start.checked_add(block_size).ok_or_else(|| {
            self.db_error(
                Phase::Update,
                DbError::protocol(format!("next id {start} + block size {block_size} overflows")),
            )
        })?;

        let updated = conn
            .execute(
                &self.sql.update_next_id,
                &[Param::Int(next_block_start), category],
            )
            .map_err(|err| self.db_error(Phase::Update, err))?;
        if updated == 0 {
            return Err(self.db_error(
                Phase::Update,
                DbError::protocol(format!("category row '{}' vanished", self.category)),
            ));
        }

        conn.commit().map_err(|err| self.db_error(Phase::Commit, err))?;

        Ok(Block {
            start,
            end: next_block_start - 1,
        })
    }

    /// The allocator's own block size wins; otherwise the stored one, unless
    /// it is not positive.
    fn effective_block_size(&self, stored: Option<i64>) -> i64 {
        match self.block_size {
            Some(size) => i64::from(size),
            None => stored
                .filter(|size| *size > 0)
                .unwrap_or(i64::from(DEFAULT_BLOCK_SIZE)),
        }
    }

    fn connect(&self) -> Result<P::Connection> {
        self.provider
            .connect()
            .map_err(|err| self.db_error(Phase::Connect, err))
    }

    fn db_error(&self, phase: Phase, source: DbError) -> Error {
        #[cfg(feature = "tracing")]
        tracing::error!(
            category = %self.category,
            table = %self.table,
            %phase,
            error = %source,
            "identifier table access failed"
        );
        Error::DatabaseAccess {
            category: self.category.clone(),
            table: self.table.clone(),
            phase,
            source,
        }
    }
}

impl<P> IdentifierProducer for BlockAllocator<P>
where
    P: ConnectionProvider,
{
    fn next_identifier(&self) -> Result<i64> {
        self.try_next_identifier()
    }

    fn id_format(&self) -> &IdFormat {
        &self.format
    }
}

impl<P> fmt::Display for BlockAllocator<P>
where
    P: ConnectionProvider,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockAllocator('{}', '{}')", self.table, self.category)
    }
}

impl<P> fmt::Debug for BlockAllocator<P>
where
    P: ConnectionProvider,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAllocator")
            .field("category", &self.category)
            .field("table", &self.table)
            .field("start_id", &self.start_id)
            .field("block_size", &self.block_size)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
