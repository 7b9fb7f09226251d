use crate::{Dialect, Error, Result};

/// Default name of the identifier table.
pub const DEFAULT_TABLE_NAME: &str = "OIDADMIN";
/// Default name of the category (sequence key) column.
pub const DEFAULT_CATEGORY_COLUMN: &str = "CATEGORY";
/// Default name of the next unreserved id column.
pub const DEFAULT_NEXT_ID_COLUMN: &str = "NEXTID";
/// Default name of the per-row block size column.
pub const DEFAULT_BLOCK_SIZE_COLUMN: &str = "BLOCKSIZE";

/// Names of the table that persists one `(category, next id, block size)` row
/// per sequence.
///
/// Table and column names are interpolated into SQL, so they are restricted to
/// plain identifiers by [`TableSpec::validate`]. Category values are always
/// bound as parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TableSpec {
    /// Schema (or attached database) the table lives in.
    pub qualifier: Option<String>,
    /// Unqualified table name.
    pub table_name: String,
    /// Column holding the category key.
    pub category_column: String,
    /// Column holding the next unreserved id.
    pub next_id_column: String,
    /// Column holding the row's block size.
    pub block_size_column: String,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            qualifier: None,
            table_name: DEFAULT_TABLE_NAME.to_owned(),
            category_column: DEFAULT_CATEGORY_COLUMN.to_owned(),
            next_id_column: DEFAULT_NEXT_ID_COLUMN.to_owned(),
            block_size_column: DEFAULT_BLOCK_SIZE_COLUMN.to_owned(),
        }
    }
}

impl TableSpec {
    /// A spec for `table_name` with the default column names.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Sets the schema the table lives in.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Renames the category column.
    pub fn with_category_column(mut self, name: impl Into<String>) -> Self {
        self.category_column = name.into();
        self
    }

    /// Renames the next id column.
    pub fn with_next_id_column(mut self, name: impl Into<String>) -> Self {
        self.next_id_column = name.into();
        self
    }

    /// Renames the block size column.
    pub fn with_block_size_column(mut self, name: impl Into<String>) -> Self {
        self.block_size_column = name.into();
        self
    }

    /// `qualifier.table_name`, or just `table_name` without a qualifier.
    pub fn qualified_name(&self) -> String {
        match self.qualifier.as_deref() {
            Some(qualifier) => format!("{qualifier}.{}", self.table_name),
            None => self.table_name.clone(),
        }
    }

    /// Checks that every name is a plain SQL identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(qualifier) = self.qualifier.as_deref() {
            check_identifier("table qualifier", qualifier)?;
        }
        check_identifier("table name", &self.table_name)?;
        check_identifier("category column", &self.category_column)?;
        check_identifier("next id column", &self.next_id_column)?;
        check_identifier("block size column", &self.block_size_column)
    }
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "{what} '{name}' is not a plain SQL identifier"
        )))
    }
}

/// The SQL one allocator issues, rendered once from a [`TableSpec`].
///
/// Every statement binds category and numeric values as positional
/// parameters (`?1`, `?2`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statements {
    /// Creates the table, keyed by category.
    pub create_table: String,
    /// Succeeds without rows iff the table exists.
    pub probe_table: String,
    /// Selects the category row (`?1` category).
    pub probe_row: String,
    /// Inserts a category row (`?1` category, `?2` next id, `?3` block size).
    pub insert_row: String,
    /// Reads next id and block size, locking the row where the dialect can.
    pub lock_row: String,
    /// Stores the next unreserved id (`?1` next id, `?2` category).
    pub update_next_id: String,
}

impl Statements {
    /// Renders every statement for `spec` in `dialect`.
    pub fn new(spec: &TableSpec, dialect: Dialect) -> Self {
        let table = spec.qualified_name();
        let TableSpec {
            category_column: cat,
            next_id_column: next,
            block_size_column: bs,
            ..
        } = spec;

        Self {
            create_table: format!(
                "CREATE TABLE {table} ({cat} VARCHAR(80) NOT NULL PRIMARY KEY, \
                 {next} BIGINT NOT NULL, {bs} INTEGER NOT NULL)"
            ),
            probe_table: format!("SELECT {cat} FROM {table} WHERE 1 = 0"),
            probe_row: format!("SELECT {cat} FROM {table} WHERE {cat} = ?1"),
            insert_row: format!("INSERT INTO {table} ({cat}, {next}, {bs}) VALUES (?1, ?2, ?3)"),
            lock_row: format!(
                "SELECT {next}, {bs} FROM {table} WHERE {cat} = ?1{}",
                dialect.row_lock_suffix()
            ),
            update_next_id: format!("UPDATE {table} SET {next} = ?1 WHERE {cat} = ?2"),
        }
    }
}
