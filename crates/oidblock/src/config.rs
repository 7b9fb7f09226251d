use crate::{Error, IdFormat, Result, TableSpec};

/// Category used when none is configured.
pub const DEFAULT_CATEGORY: &str = "$DEFAULT";
/// First value handed out when a category row does not exist yet.
pub const DEFAULT_START_ID: i64 = 1;
/// Block size used when neither the allocator nor the stored row sets one.
pub const DEFAULT_BLOCK_SIZE: u32 = 1;

/// Everything that describes one identifier sequence: its name, where it
/// starts, how many values are reserved per round trip, and how values are
/// rendered.
///
/// # Example
/// ```
/// use oidblock::{CategorySpec, IdFormat};
///
/// let spec = CategorySpec::new("Alpha")
///     .with_start_id(500)
///     .with_block_size(3)
///     .with_format(IdFormat::new(10).with_prefix("A:"));
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CategorySpec {
    /// Sequence key; surrounding whitespace is ignored.
    #[cfg_attr(feature = "serde", serde(rename = "category"))]
    pub name: String,
    /// First value used if the category row is absent.
    pub start_id: i64,
    /// Values reserved per database round trip. When unset, the block size
    /// stored in the category row is used, falling back to
    /// [`DEFAULT_BLOCK_SIZE`].
    pub block_size: Option<u32>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    /// How values are rendered by `new_identifier`.
    pub format: IdFormat,
}

impl Default for CategorySpec {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY)
    }
}

impl CategorySpec {
    /// A category starting at [`DEFAULT_START_ID`] with no block size
    /// override and the default format.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_id: DEFAULT_START_ID,
            block_size: None,
            format: IdFormat::default(),
        }
    }

    /// Sets the first value used when the row is created.
    pub fn with_start_id(mut self, start_id: i64) -> Self {
        self.start_id = start_id;
        self
    }

    /// Overrides the block size stored in the category row.
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Sets how values are rendered.
    pub fn with_format(mut self, format: IdFormat) -> Self {
        self.format = format;
        self
    }

    /// The name with surrounding whitespace removed.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a blank name, a negative start
    /// id, or a zero block size.
    pub fn validate(&self) -> Result<()> {
        if self.trimmed_name().is_empty() {
            return Err(Error::invalid_config("category name must not be blank"));
        }
        if self.start_id < 0 {
            return Err(Error::invalid_config(format!(
                "start id of category '{}' must not be negative (got {})",
                self.trimmed_name(),
                self.start_id
            )));
        }
        if self.block_size == Some(0) {
            return Err(Error::invalid_config(format!(
                "block size of category '{}' must be at least 1",
                self.trimmed_name()
            )));
        }
        Ok(())
    }
}

/// Configuration of a single [`BlockAllocator`].
///
/// [`BlockAllocator`]: crate::BlockAllocator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AllocatorConfig {
    /// The sequence this allocator serves.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub category: CategorySpec,
    /// Where the sequence row lives.
    pub table: TableSpec,
    /// Skip the table existence probe; the category row is still checked.
    pub table_already_created: bool,
}

impl AllocatorConfig {
    /// `category` on the default table, with the table probe enabled.
    pub fn new(category: CategorySpec) -> Self {
        Self {
            category,
            ..Self::default()
        }
    }

    /// Uses `table` instead of the default table.
    pub fn with_table(mut self, table: TableSpec) -> Self {
        self.table = table;
        self
    }

    /// Skips the table existence probe when `created` is `true`.
    pub fn with_table_already_created(mut self, created: bool) -> Self {
        self.table_already_created = created;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the category or table spec is
    /// invalid.
    pub fn validate(&self) -> Result<()> {
        self.category.validate()?;
        self.table.validate()
    }
}

/// Configuration of a whole registry: one table shared by many categories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Table shared by every category.
    pub table: TableSpec,
    /// Skip the table existence probe in every allocator.
    pub table_already_created: bool,
    /// Categories in registration order.
    pub categories: Vec<CategorySpec>,
}
