use core::fmt;
use std::{collections::HashMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{GenerationError, IdentifierProducer};

/// Dispatches identifier requests to one producer per category.
///
/// A registry is filled once through [`CategoryRegistry::register`] (which
/// needs `&mut self`) and then shared, typically behind an [`Arc`], for
/// lookups. Rust's borrow rules therefore enforce the "build, then use"
/// order: there is no way to register while another thread is generating.
///
/// Category names are trimmed on the way in and on lookup; matching is
/// otherwise exact and case-sensitive.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use oidblock::{CategoryRegistry, IdFormat, MemoryCounter};
///
/// let mut registry = CategoryRegistry::new();
/// registry.register("Order", Arc::new(MemoryCounter::new(1, IdFormat::new(6))));
///
/// assert_eq!(registry.new_identifier(" Order ").unwrap(), "000001");
/// assert_eq!(registry.next_identifier("Order").unwrap(), 2);
/// assert!(registry.next_identifier("Invoice").is_err());
/// ```
#[derive(Clone, Default)]
pub struct CategoryRegistry {
    producers: HashMap<String, Arc<dyn IdentifierProducer>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `category` (trimmed) to `producer`, replacing any earlier
    /// mapping of the same name. A blank category is ignored with a warning.
    pub fn register(
        &mut self,
        category: &str,
        producer: Arc<dyn IdentifierProducer>,
    ) -> &mut Self {
        let category = category.trim();
        if category.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("ignoring identifier producer registered under a blank category");
            return self;
        }

        self.producers.insert(category.to_owned(), producer);
        self
    }

    /// The producer registered under `category`, if any.
    pub fn get(&self, category: &str) -> Option<&Arc<dyn IdentifierProducer>> {
        self.producers.get(category.trim())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.producers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Returns the next raw value of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnknownCategory`] if nothing is registered
    /// under the trimmed name, or [`GenerationError::Producer`] wrapping the
    /// producer's own error.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_identifier(&self, category: &str) -> Result<i64, GenerationError> {
        let (category, producer) = self.lookup(category)?;
        producer
            .next_identifier()
            .map_err(|source| producer_error(category, source))
    }

    /// Returns the next value of `category` rendered with the producer's
    /// format.
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_identifier`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn new_identifier(&self, category: &str) -> Result<String, GenerationError> {
        let (category, producer) = self.lookup(category)?;
        producer
            .new_identifier()
            .map_err(|source| producer_error(category, source))
    }

    fn lookup<'a>(
        &'a self,
        category: &'a str,
    ) -> Result<(&'a str, &'a Arc<dyn IdentifierProducer>), GenerationError> {
        let category = category.trim();
        self.producers
            .get(category)
            .map(|producer| (category, producer))
            .ok_or_else(|| GenerationError::UnknownCategory {
                category: category.to_owned(),
            })
    }
}

fn producer_error(category: &str, source: crate::Error) -> GenerationError {
    #[cfg(feature = "tracing")]
    tracing::warn!(category, error = %source, "identifier generation failed");
    GenerationError::Producer {
        category: category.to_owned(),
        source,
    }
}

impl fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
