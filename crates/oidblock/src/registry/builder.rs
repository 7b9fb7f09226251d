use std::sync::Arc;

use crate::{
    AllocatorConfig, BlockAllocator, CategoryRegistry, CategorySpec, ConnectionProvider,
    RegistryConfig, Result, TableSpec,
};

/// Builds a [`CategoryRegistry`] with one [`BlockAllocator`] per category,
/// all sharing a connection provider and a table.
///
/// Blank names are skipped. A name that equals an already added category
/// when ASCII case is ignored is skipped too, so the first spelling wins.
///
/// # Example
/// ```
/// use oidblock::{CategorySpec, IdFormat, RegistryBuilder, SqliteProvider};
///
/// let dir = tempfile::tempdir().unwrap();
/// let registry = RegistryBuilder::new(SqliteProvider::new(dir.path().join("ids.db")))
///     .add(CategorySpec::new("Invoice").with_start_id(1000).with_block_size(50))
///     .add(CategorySpec::new("Order").with_format(IdFormat::new(8).with_prefix("ORD-")))
///     .add_names(["Customer", " ", "order"])
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.categories(), ["Customer", "Invoice", "Order"]);
/// assert_eq!(registry.new_identifier("Order").unwrap(), "ORD-00000001");
/// assert_eq!(registry.next_identifier("Invoice").unwrap(), 1000);
/// ```
#[derive(Clone, Debug)]
pub struct RegistryBuilder<P>
where
    P: ConnectionProvider,
{
    provider: P,
    table: TableSpec,
    table_already_created: bool,
    categories: Vec<CategorySpec>,
}

impl<P> RegistryBuilder<P>
where
    P: ConnectionProvider,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            table: TableSpec::default(),
            table_already_created: false,
            categories: Vec::new(),
        }
    }

    /// Starts from a deserialized [`RegistryConfig`].
    pub fn from_config(provider: P, config: RegistryConfig) -> Self {
        let RegistryConfig {
            table,
            table_already_created,
            categories,
        } = config;

        Self::new(provider)
            .table_spec(table)
            .table_already_created(table_already_created)
            .add_all(categories)
    }

    pub fn table_spec(mut self, table: TableSpec) -> Self {
        self.table = table;
        self
    }

    /// Skip the table probe in every allocator.
    pub fn table_already_created(mut self, created: bool) -> Self {
        self.table_already_created = created;
        self
    }

    pub fn add(mut self, category: CategorySpec) -> Self {
        let name = category.trimmed_name();
        if name.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("skipping category with a blank name");
            return self;
        }
        if let Some(existing) = self
            .categories
            .iter()
            .find(|added| added.trimmed_name().eq_ignore_ascii_case(name))
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                category = name,
                existing = existing.trimmed_name(),
                "skipping category that differs from an added one only in case"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = existing;
            return self;
        }

        self.categories.push(category);
        self
    }

    pub fn add_all<I>(self, categories: I) -> Self
    where
        I: IntoIterator<Item = CategorySpec>,
    {
        categories.into_iter().fold(self, Self::add)
    }

    /// Adds categories with default start id, block size and format.
    pub fn add_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_all(names.into_iter().map(CategorySpec::new))
    }

    /// Creates the allocators. No database access happens here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the table spec or any category
    /// does not validate.
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    pub fn build(self) -> Result<CategoryRegistry> {
        self.table.validate()?;

        let mut registry = CategoryRegistry::new();
        for category in self.categories {
            let config = AllocatorConfig::new(category)
                .with_table(self.table.clone())
                .with_table_already_created(self.table_already_created);
            let allocator = BlockAllocator::new(self.provider.clone(), config)?;

            #[cfg(feature = "tracing")]
            tracing::debug!(%allocator, "registered block allocator");

            let name = allocator.category().to_owned();
            registry.register(&name, Arc::new(allocator));
        }
        Ok(registry)
    }
}
